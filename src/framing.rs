//! Framing and rate-change processors: sliding window, overlap-add,
//! zero-padding, frame-number filtering, downsampling and resampling.

use crate::error::{format_error, parameter_error, Error, Result};
use crate::fanout::Fanout;
use crate::format::AudioFormat;
use crate::frame::{ComplexFrame, Frame, RealFrame};
use crate::node::Value;
use crate::processor::{Processor, Sink};
use crate::source::Source;
use std::fmt;

/// Splits an unbounded stream of real frames into fixed-length slices
/// with a given hop.
///
/// Each emitted slice has exactly `slice_length` samples; consecutive
/// slices start `hop` samples apart. A hop larger than the slice length
/// produces gapped slices. On flush the buffered residue is drained one
/// slice per hop position, each zero-padded on the right.
pub struct SlidingWindow {
    id: Option<String>,
    slice_length: usize,
    hop: usize,
    buffer: Vec<f32>,
    pending_skip: usize,
    base: Option<u64>,
    format: Option<AudioFormat>,
    emitted: u64,
    out: Fanout<RealFrame>,
    last: Option<RealFrame>,
    source: Option<Box<dyn Source<Output = RealFrame>>>,
}

impl SlidingWindow {
    /// Window with `hop == slice_length` (no overlap).
    pub fn new(slice_length: usize) -> Result<Self> {
        Self::with_hop(slice_length, slice_length)
    }

    pub fn with_hop(slice_length: usize, hop: usize) -> Result<Self> {
        if slice_length == 0 {
            return parameter_error("slice length must be positive");
        }
        if hop == 0 {
            return parameter_error("hop must be positive");
        }
        Ok(Self {
            id: None,
            slice_length,
            hop,
            buffer: Vec::new(),
            pending_skip: 0,
            base: None,
            format: None,
            emitted: 0,
            out: Fanout::new(),
            last: None,
            source: None,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn ingest(&mut self, frame: &RealFrame) {
        if self.base.is_none() {
            self.base = Some(frame.frame_index());
            self.format = Some(*frame.format());
        }
        let samples = frame.real();
        let skip = self.pending_skip.min(samples.len());
        self.pending_skip -= skip;
        self.buffer.extend_from_slice(&samples[skip..]);
    }

    /// Emit the slice at the front of the buffer and advance by one hop.
    /// `pad` allows a short residue slice; the result is zero-padded to
    /// the slice length.
    fn take_slice(&mut self, pad: bool) -> Option<RealFrame> {
        if self.buffer.is_empty() || (!pad && self.buffer.len() < self.slice_length) {
            return None;
        }
        let mut samples: Vec<f32> = self
            .buffer
            .iter()
            .take(self.slice_length)
            .copied()
            .collect();
        samples.resize(self.slice_length, 0.0);
        let index = self.base.unwrap_or(0) + self.emitted * self.hop as u64;
        let format = self.format.unwrap_or_else(|| AudioFormat::mono(44100.0));
        self.emitted += 1;
        let drained = self.hop.min(self.buffer.len());
        self.buffer.drain(..drained);
        self.pending_skip += self.hop - drained;
        Some(RealFrame::new(index, samples, format))
    }
}

impl fmt::Display for SlidingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlidingWindow{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        write!(
            f,
            "sliceLength={}, hop={}}}",
            self.slice_length, self.hop
        )
    }
}

crate::node::impl_node!(SlidingWindow, [slice_length, hop]);

impl Sink for SlidingWindow {
    type Input = RealFrame;

    fn process(&mut self, input: &RealFrame) -> Result<()> {
        self.ingest(input);
        while let Some(slice) = self.take_slice(false) {
            self.out.process(&slice)?;
            self.last = Some(slice);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        while let Some(slice) = self.take_slice(true) {
            self.out.process(&slice)?;
            self.last = Some(slice);
        }
        self.out.flush()
    }
}

impl Processor for SlidingWindow {
    type Output = RealFrame;

    fn output(&self) -> Option<&RealFrame> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<RealFrame>> {
        loop {
            if let Some(slice) = self.take_slice(false) {
                self.last = Some(slice.clone());
                return Ok(Some(slice));
            }
            let source = self.source.as_mut().ok_or(Error::NoSource)?;
            match source.read()? {
                Some(frame) => self.ingest(&frame),
                None => {
                    let residue = self.take_slice(true);
                    if let Some(slice) = &residue {
                        self.last = Some(slice.clone());
                    }
                    return Ok(residue);
                }
            }
        }
    }

    fn set_source(&mut self, source: Box<dyn Source<Output = RealFrame>>) {
        self.source = Some(source);
    }

    fn fanout(&self) -> &Fanout<RealFrame> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<RealFrame> {
        &mut self.out
    }
}

/// Overlap-add reconstruction: the inverse of a sliding window with the
/// same hop.
///
/// Each input slice is added into a running accumulator at the write
/// cursor, which then advances by `hop`. Whenever `slice_length`
/// positions are fully overlapped they are emitted as one output slice;
/// flush drains the remainder zero-padded on the right. The sum over
/// all emitted samples equals the sum over all inputs.
pub struct OverlapAdd {
    id: Option<String>,
    slice_length: usize,
    hop: usize,
    accumulator: Vec<f32>,
    cursor: usize,
    base: Option<u64>,
    format: Option<AudioFormat>,
    emit_position: u64,
    out: Fanout<RealFrame>,
    last: Option<RealFrame>,
    source: Option<Box<dyn Source<Output = RealFrame>>>,
}

impl OverlapAdd {
    pub fn new(slice_length: usize, hop: usize) -> Result<Self> {
        if slice_length == 0 {
            return parameter_error("slice length must be positive");
        }
        if hop == 0 {
            return parameter_error("hop must be positive");
        }
        Ok(Self {
            id: None,
            slice_length,
            hop,
            accumulator: Vec::new(),
            cursor: 0,
            base: None,
            format: None,
            emit_position: 0,
            out: Fanout::new(),
            last: None,
            source: None,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn ingest(&mut self, frame: &RealFrame) {
        if self.base.is_none() {
            self.base = Some(frame.frame_index());
            self.format = Some(*frame.format());
        }
        let samples = frame.real();
        if self.accumulator.len() < self.cursor + samples.len() {
            self.accumulator.resize(self.cursor + samples.len(), 0.0);
        }
        for (i, sample) in samples.iter().enumerate() {
            self.accumulator[self.cursor + i] += sample;
        }
        self.cursor += self.hop;
    }

    /// Emit the completed region at the front of the accumulator.
    fn take_completed(&mut self) -> Option<RealFrame> {
        if self.cursor < self.slice_length {
            return None;
        }
        Some(self.drain_slice())
    }

    fn drain_slice(&mut self) -> RealFrame {
        let taken = self.slice_length.min(self.accumulator.len());
        let mut samples: Vec<f32> = self.accumulator.drain(..taken).collect();
        samples.resize(self.slice_length, 0.0);
        self.cursor = self.cursor.saturating_sub(self.slice_length);
        let index = self.base.unwrap_or(0) + self.emit_position;
        self.emit_position += self.slice_length as u64;
        let format = self.format.unwrap_or_else(|| AudioFormat::mono(44100.0));
        RealFrame::new(index, samples, format)
    }
}

impl fmt::Display for OverlapAdd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OverlapAdd{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        write!(
            f,
            "sliceLength={}, hop={}}}",
            self.slice_length, self.hop
        )
    }
}

crate::node::impl_node!(OverlapAdd, [slice_length, hop]);

impl Sink for OverlapAdd {
    type Input = RealFrame;

    fn process(&mut self, input: &RealFrame) -> Result<()> {
        self.ingest(input);
        while let Some(slice) = self.take_completed() {
            self.out.process(&slice)?;
            self.last = Some(slice);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        while !self.accumulator.is_empty() {
            let slice = self.drain_slice();
            self.out.process(&slice)?;
            self.last = Some(slice);
        }
        self.out.flush()
    }
}

impl Processor for OverlapAdd {
    type Output = RealFrame;

    fn output(&self) -> Option<&RealFrame> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<RealFrame>> {
        loop {
            if let Some(slice) = self.take_completed() {
                self.last = Some(slice.clone());
                return Ok(Some(slice));
            }
            let source = self.source.as_mut().ok_or(Error::NoSource)?;
            match source.read()? {
                Some(frame) => self.ingest(&frame),
                None => {
                    if self.accumulator.is_empty() {
                        return Ok(None);
                    }
                    let slice = self.drain_slice();
                    self.last = Some(slice.clone());
                    return Ok(Some(slice));
                }
            }
        }
    }

    fn set_source(&mut self, source: Box<dyn Source<Output = RealFrame>>) {
        self.source = Some(source);
    }

    fn fanout(&self) -> &Fanout<RealFrame> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<RealFrame> {
        &mut self.out
    }
}

/// Where zero-padding is inserted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    Front,
    Back,
    Both,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Position::Front => "FRONT",
            Position::Back => "BACK",
            Position::Both => "BOTH",
        };
        f.write_str(name)
    }
}

/// Frames that can derive a zero-padded copy of themselves.
pub trait Pad: Frame + Clone {
    fn zero_pad(&self, front: usize, back: usize) -> Self;
}

fn pad_slice(values: &[f32], front: usize, back: usize) -> Vec<f32> {
    let mut padded = vec![0.0; front + values.len() + back];
    padded[front..front + values.len()].copy_from_slice(values);
    padded
}

impl Pad for RealFrame {
    fn zero_pad(&self, front: usize, back: usize) -> Self {
        self.derive(pad_slice(self.real(), front, back))
    }
}

impl Pad for ComplexFrame {
    fn zero_pad(&self, front: usize, back: usize) -> Self {
        self.derive(
            pad_slice(self.real(), front, back),
            pad_slice(self.imaginary(), front, back),
        )
    }
}

/// Pads every frame to a fixed total length.
pub struct Zeropad<F> {
    id: Option<String>,
    position: Position,
    size_after_padding: usize,
    out: Fanout<F>,
    last: Option<F>,
    source: Option<Box<dyn Source<Output = F>>>,
}

impl<F> Zeropad<F> {
    pub fn new(position: Position, size_after_padding: usize) -> Self {
        Self {
            id: None,
            position,
            size_after_padding,
            out: Fanout::new(),
            last: None,
            source: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl<F: Pad> Zeropad<F> {
    fn pad(&self, frame: &F) -> Result<F> {
        let length = frame.len();
        if length > self.size_after_padding {
            return format_error(format!(
                "frame with {} samples does not fit target length {}",
                length, self.size_after_padding
            ));
        }
        let missing = self.size_after_padding - length;
        let (front, back) = match self.position {
            Position::Front => (missing, 0),
            Position::Back => (0, missing),
            Position::Both => (missing / 2, missing - missing / 2),
        };
        Ok(frame.zero_pad(front, back))
    }
}

impl<F> fmt::Display for Zeropad<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Zeropad{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        write!(
            f,
            "{}, sizeAfterPadding={}}}",
            self.position, self.size_after_padding
        )
    }
}

crate::node::impl_node!(
    (F: Pad + Into<Value> + 'static) Zeropad<F>,
    [position, size_after_padding]
);

impl<F: Pad + Into<Value> + 'static> Sink for Zeropad<F> {
    type Input = F;

    fn process(&mut self, input: &F) -> Result<()> {
        let output = self.pad(input)?;
        self.out.process(&output)?;
        self.last = Some(output);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }
}

impl<F: Pad + Into<Value> + 'static> Processor for Zeropad<F> {
    type Output = F;

    fn output(&self) -> Option<&F> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<F>> {
        let source = self.source.as_mut().ok_or(Error::NoSource)?;
        match source.read()? {
            Some(frame) => {
                let output = self.pad(&frame)?;
                self.last = Some(output.clone());
                Ok(Some(output))
            }
            None => Ok(None),
        }
    }

    fn set_source(&mut self, source: Box<dyn Source<Output = F>>) {
        self.source = Some(source);
    }

    fn fanout(&self) -> &Fanout<F> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<F> {
        &mut self.out
    }
}

/// Passes only frames whose index lies in `[min, max]` (inclusive).
pub struct FrameNumberFilter<F> {
    id: Option<String>,
    min_frame_number: u64,
    max_frame_number: u64,
    out: Fanout<F>,
    last: Option<F>,
    source: Option<Box<dyn Source<Output = F>>>,
}

impl<F> FrameNumberFilter<F> {
    pub fn new(min_frame_number: u64, max_frame_number: u64) -> Result<Self> {
        if min_frame_number > max_frame_number {
            return parameter_error(format!(
                "min frame number {} exceeds max frame number {}",
                min_frame_number, max_frame_number
            ));
        }
        Ok(Self {
            id: None,
            min_frame_number,
            max_frame_number,
            out: Fanout::new(),
            last: None,
            source: None,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl<F> fmt::Display for FrameNumberFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameNumberFilter{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        write!(
            f,
            "minFrameNumber={}, maxFrameNumber={}}}",
            self.min_frame_number, self.max_frame_number
        )
    }
}

crate::node::impl_node!(
    (F: Frame + Clone + Into<Value> + 'static) FrameNumberFilter<F>,
    [min_frame_number, max_frame_number]
);

impl<F: Frame + Clone + Into<Value> + 'static> Sink for FrameNumberFilter<F> {
    type Input = F;

    fn process(&mut self, input: &F) -> Result<()> {
        let index = input.frame_index();
        if index < self.min_frame_number || index > self.max_frame_number {
            return Ok(());
        }
        self.out.process(input)?;
        self.last = Some(input.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }
}

impl<F: Frame + Clone + Into<Value> + 'static> Processor for FrameNumberFilter<F> {
    type Output = F;

    fn output(&self) -> Option<&F> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<F>> {
        loop {
            let source = self.source.as_mut().ok_or(Error::NoSource)?;
            match source.read()? {
                Some(frame) => {
                    let index = frame.frame_index();
                    if index >= self.min_frame_number && index <= self.max_frame_number {
                        self.last = Some(frame.clone());
                        return Ok(Some(frame));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    fn set_source(&mut self, source: Box<dyn Source<Output = F>>) {
        self.source = Some(source);
    }

    fn fanout(&self) -> &Fanout<F> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<F> {
        &mut self.out
    }
}

/// Keeps every nth sample frame, dividing the sample rate and the frame
/// index accordingly. The keep phase runs across input frames.
pub struct Downsample {
    id: Option<String>,
    nth_frame_to_keep: usize,
    position: u64,
    out: Fanout<RealFrame>,
    last: Option<RealFrame>,
    source: Option<Box<dyn Source<Output = RealFrame>>>,
}

impl Downsample {
    pub fn new(nth_frame_to_keep: usize) -> Result<Self> {
        if nth_frame_to_keep == 0 {
            return parameter_error("nth frame to keep must be positive");
        }
        Ok(Self {
            id: None,
            nth_frame_to_keep,
            position: 0,
            out: Fanout::new(),
            last: None,
            source: None,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn transform(&mut self, frame: &RealFrame) -> Option<RealFrame> {
        let channels = frame.format().channels.max(1) as usize;
        let n = self.nth_frame_to_keep as u64;
        let samples = frame.real();
        let mut kept = Vec::with_capacity(samples.len() / self.nth_frame_to_keep + channels);
        for (j, chunk) in samples.chunks_exact(channels).enumerate() {
            if (self.position + j as u64) % n == 0 {
                kept.extend_from_slice(chunk);
            }
        }
        self.position += (samples.len() / channels) as u64;
        if kept.is_empty() {
            return None;
        }
        let format = frame
            .format()
            .with_sample_rate(frame.format().sample_rate / self.nth_frame_to_keep as f32);
        Some(RealFrame::new(frame.frame_index() / n, kept, format))
    }
}

impl fmt::Display for Downsample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Downsample{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        write!(f, "nthFrameToKeep={}}}", self.nth_frame_to_keep)
    }
}

crate::node::impl_node!(Downsample, [nth_frame_to_keep]);

impl Sink for Downsample {
    type Input = RealFrame;

    fn process(&mut self, input: &RealFrame) -> Result<()> {
        if let Some(output) = self.transform(input) {
            self.out.process(&output)?;
            self.last = Some(output);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }
}

impl Processor for Downsample {
    type Output = RealFrame;

    fn output(&self) -> Option<&RealFrame> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<RealFrame>> {
        loop {
            let source = self.source.as_mut().ok_or(Error::NoSource)?;
            match source.read()? {
                Some(frame) => {
                    if let Some(output) = self.transform(&frame) {
                        self.last = Some(output.clone());
                        return Ok(Some(output));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    fn set_source(&mut self, source: Box<dyn Source<Output = RealFrame>>) {
        self.source = Some(source);
    }

    fn fanout(&self) -> &Fanout<RealFrame> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<RealFrame> {
        &mut self.out
    }
}

/// Resamples by a rational factor of which one side must be 1:
/// upsampling repeats sample frames, downsampling averages groups.
pub struct Resample {
    id: Option<String>,
    up: usize,
    down: usize,
    out: Fanout<RealFrame>,
    last: Option<RealFrame>,
    source: Option<Box<dyn Source<Output = RealFrame>>>,
}

impl Resample {
    pub fn new(up: usize, down: usize) -> Result<Self> {
        if up == 0 || down == 0 {
            return parameter_error("resampling factor must be positive");
        }
        if up != 1 && down != 1 {
            return parameter_error(format!(
                "unsupported resampling factor {}/{}: one side must be 1",
                up, down
            ));
        }
        Ok(Self {
            id: None,
            up,
            down,
            out: Fanout::new(),
            last: None,
            source: None,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn transform(&self, frame: &RealFrame) -> Result<RealFrame> {
        let channels = frame.format().channels.max(1) as usize;
        let samples = frame.real();
        let mut resampled;
        if self.up > 1 {
            resampled = Vec::with_capacity(samples.len() * self.up);
            for chunk in samples.chunks_exact(channels) {
                for _ in 0..self.up {
                    resampled.extend_from_slice(chunk);
                }
            }
        } else {
            let group = self.down * channels;
            if samples.len() % group != 0 {
                return format_error(format!(
                    "frame with {} samples is not divisible into groups of {}",
                    samples.len(),
                    self.down
                ));
            }
            resampled = Vec::with_capacity(samples.len() / self.down);
            for chunk in samples.chunks_exact(group) {
                for channel in 0..channels {
                    let mut sum = 0.0;
                    for j in 0..self.down {
                        sum += chunk[j * channels + channel];
                    }
                    resampled.push(sum / self.down as f32);
                }
            }
        }
        let rate = frame.format().sample_rate * self.up as f32 / self.down as f32;
        let index = frame.frame_index() * self.up as u64 / self.down as u64;
        Ok(RealFrame::new(
            index,
            resampled,
            frame.format().with_sample_rate(rate),
        ))
    }
}

impl fmt::Display for Resample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resample{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        if self.down > 1 {
            write!(f, "factor={}/{}}}", self.up, self.down)
        } else {
            write!(f, "factor={}}}", self.up)
        }
    }
}

crate::node::impl_node!(Resample, [up, down]);

impl Sink for Resample {
    type Input = RealFrame;

    fn process(&mut self, input: &RealFrame) -> Result<()> {
        let output = self.transform(input)?;
        self.out.process(&output)?;
        self.last = Some(output);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }
}

impl Processor for Resample {
    type Output = RealFrame;

    fn output(&self) -> Option<&RealFrame> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<RealFrame>> {
        let source = self.source.as_mut().ok_or(Error::NoSource)?;
        match source.read()? {
            Some(frame) => {
                let output = self.transform(&frame)?;
                self.last = Some(output.clone());
                Ok(Some(output))
            }
            None => Ok(None),
        }
    }

    fn set_source(&mut self, source: Box<dyn Source<Output = RealFrame>>) {
        self.source = Some(source);
    }

    fn fanout(&self) -> &Fanout<RealFrame> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<RealFrame> {
        &mut self.out
    }
}
