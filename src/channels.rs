//! Channel routing: mono mixdown, channel selection, interleaved
//! split and join.

use crate::error::{format_error, parameter_error, Error, Result};
use crate::fanout::Fanout;
use crate::frame::{Frame, RealFrame};
use crate::processor::{Processor, Sink};
use crate::source::Source;
use std::fmt;

/// Averages all channels sample-frame-wise into a mono stream.
pub struct Mono {
    id: Option<String>,
    out: Fanout<RealFrame>,
    last: Option<RealFrame>,
    source: Option<Box<dyn Source<Output = RealFrame>>>,
}

impl Mono {
    pub fn new() -> Self {
        Self {
            id: None,
            out: Fanout::new(),
            last: None,
            source: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn transform(&self, frame: &RealFrame) -> RealFrame {
        let channels = frame.format().channels.max(1) as usize;
        if channels == 1 {
            return frame.clone();
        }
        let samples = frame.real();
        let mixed: Vec<f32> = samples
            .chunks_exact(channels)
            .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
            .collect();
        RealFrame::new(frame.frame_index(), mixed, frame.format().with_channels(1))
    }
}

impl Default for Mono {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Mono {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "Mono{{id={id}}}"),
            None => f.write_str("Mono"),
        }
    }
}

crate::node::impl_node!(Mono, []);

impl Sink for Mono {
    type Input = RealFrame;

    fn process(&mut self, input: &RealFrame) -> Result<()> {
        let output = self.transform(input);
        self.out.process(&output)?;
        self.last = Some(output);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }
}

impl Processor for Mono {
    type Output = RealFrame;

    fn output(&self) -> Option<&RealFrame> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<RealFrame>> {
        let source = self.source.as_mut().ok_or(Error::NoSource)?;
        match source.read()? {
            Some(frame) => {
                let output = self.transform(&frame);
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

/// Extracts a single channel from an interleaved stream.
pub struct ChannelSelector {
    id: Option<String>,
    channel: usize,
    out: Fanout<RealFrame>,
    last: Option<RealFrame>,
    source: Option<Box<dyn Source<Output = RealFrame>>>,
}

impl ChannelSelector {
    pub fn new(channel: usize) -> Self {
        Self {
            id: None,
            channel,
            out: Fanout::new(),
            last: None,
            source: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn transform(&self, frame: &RealFrame) -> Result<RealFrame> {
        let channels = frame.format().channels.max(1) as usize;
        if self.channel >= channels {
            return format_error(format!(
                "channel {} out of range for {} channel stream",
                self.channel, channels
            ));
        }
        let selected: Vec<f32> = frame
            .real()
            .iter()
            .skip(self.channel)
            .step_by(channels)
            .copied()
            .collect();
        Ok(RealFrame::new(
            frame.frame_index(),
            selected,
            frame.format().with_channels(1),
        ))
    }
}

impl fmt::Display for ChannelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelSelector{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        write!(f, "channel={}}}", self.channel)
    }
}

crate::node::impl_node!(ChannelSelector, [channel]);

impl Sink for ChannelSelector {
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

impl Processor for ChannelSelector {
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

/// De-interleaves an N-channel frame, emitting channel i to the
/// downstreams keyed on channel i.
///
/// Push-only: splitting has no single pull output.
pub struct InterleavedChannelSplit {
    id: Option<String>,
    out: Fanout<RealFrame>,
    last: Option<RealFrame>,
}

impl InterleavedChannelSplit {
    pub fn new() -> Self {
        Self {
            id: None,
            out: Fanout::new(),
            last: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl Default for InterleavedChannelSplit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InterleavedChannelSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "InterleavedChannelSplit{{id={id}}}"),
            None => f.write_str("InterleavedChannelSplit"),
        }
    }
}

crate::node::impl_node!(InterleavedChannelSplit, []);

impl Sink for InterleavedChannelSplit {
    type Input = RealFrame;

    fn process(&mut self, input: &RealFrame) -> Result<()> {
        let channels = input.format().channels.max(1) as usize;
        let samples = input.real();
        for channel in 0..channels {
            let part: Vec<f32> = samples
                .iter()
                .skip(channel)
                .step_by(channels)
                .copied()
                .collect();
            let output = RealFrame::new(
                input.frame_index(),
                part,
                input.format().with_channels(1),
            );
            self.out.process_channel(channel, &output)?;
            self.last = Some(output);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }
}

impl Processor for InterleavedChannelSplit {
    type Output = RealFrame;

    fn output(&self) -> Option<&RealFrame> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<RealFrame>> {
        panic!("InterleavedChannelSplit supports push evaluation only");
    }

    fn set_source(&mut self, _source: Box<dyn Source<Output = RealFrame>>) {
        panic!("InterleavedChannelSplit supports push evaluation only");
    }

    fn fanout(&self) -> &Fanout<RealFrame> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<RealFrame> {
        &mut self.out
    }
}

/// Re-interleaves one frame per part into a single N-channel frame.
///
/// Parts arrive through `process_channel`; the join emits once every
/// part of a tick is present. Flush forwards without emitting partial
/// joins. Push-only.
pub struct InterleavedChannelJoin {
    id: Option<String>,
    parts: Vec<Option<RealFrame>>,
    out: Fanout<RealFrame>,
    last: Option<RealFrame>,
}

impl InterleavedChannelJoin {
    pub fn new(parts: usize) -> Result<Self> {
        if parts == 0 {
            return parameter_error("at least one part is required");
        }
        Ok(Self {
            id: None,
            parts: vec![None; parts],
            out: Fanout::new(),
            last: None,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Number of expected parts.
    #[inline]
    pub fn parts(&self) -> usize {
        self.parts.len()
    }

    fn slot(&mut self, channel: usize, input: &RealFrame) -> Result<()> {
        if channel >= self.parts.len() {
            return format_error(format!(
                "part {} out of range for join with {} parts",
                channel,
                self.parts.len()
            ));
        }
        self.parts[channel] = Some(input.clone());
        if self.parts.iter().any(Option::is_none) {
            return Ok(());
        }
        let collected: Vec<RealFrame> = self.parts.iter_mut().filter_map(Option::take).collect();
        let length = collected[0].len();
        if collected.iter().any(|part| part.len() != length) {
            return format_error("join parts must have equal length");
        }
        let channels = collected.len();
        let mut interleaved = vec![0.0; length * channels];
        for (channel, part) in collected.iter().enumerate() {
            for (i, sample) in part.real().iter().enumerate() {
                interleaved[i * channels + channel] = *sample;
            }
        }
        let output = RealFrame::new(
            collected[0].frame_index(),
            interleaved,
            collected[0].format().with_channels(channels as u32),
        );
        self.out.process(&output)?;
        self.last = Some(output);
        Ok(())
    }
}

impl fmt::Display for InterleavedChannelJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterleavedChannelJoin{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        write!(f, "parts={}}}", self.parts.len())
    }
}

impl crate::node::GraphNode for InterleavedChannelJoin {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn output_value(&self) -> Option<crate::node::Value> {
        self.last.clone().map(Into::into)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn shallow_equals(&self, other: &dyn crate::node::GraphNode) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(other) => self.id == other.id && self.parts.len() == other.parts.len(),
            None => false,
        }
    }

    fn merge_from(&mut self, other: &dyn crate::node::GraphNode) {
        if let Some(other) = other.as_any().downcast_ref::<Self>() {
            self.out.merge(&other.out);
        }
    }

    fn describe(&self) -> String {
        self.to_string()
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&dyn crate::node::GraphNode)) {
        self.out.for_each_child(f);
    }
}

impl Sink for InterleavedChannelJoin {
    type Input = RealFrame;

    fn process(&mut self, input: &RealFrame) -> Result<()> {
        self.slot(0, input)
    }

    /// Multi-channel: the channel selects the part.
    fn process_channel(&mut self, channel: usize, input: &RealFrame) -> Result<()> {
        self.slot(channel, input)
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }
}

impl Processor for InterleavedChannelJoin {
    type Output = RealFrame;

    fn output(&self) -> Option<&RealFrame> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<RealFrame>> {
        panic!("InterleavedChannelJoin supports push evaluation only");
    }

    fn set_source(&mut self, _source: Box<dyn Source<Output = RealFrame>>) {
        panic!("InterleavedChannelJoin supports push evaluation only");
    }

    fn fanout(&self) -> &Fanout<RealFrame> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<RealFrame> {
        &mut self.out
    }
}
