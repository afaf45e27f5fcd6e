//! Self-similarity matrix computation.

use crate::distance::Distance;
use crate::error::{Error, Result};
use crate::fanout::Fanout;
use crate::format::AudioFormat;
use crate::frame::Frame;
use crate::matrix::{AudioMatrix, Matrix};
use crate::node::{GraphNode, Value};
use crate::processor::{Processor, Sink};
use crate::source::Source;
use std::any::Any;
use std::fmt;

/// Pairwise measure matrix over a run of frames.
///
/// With a bandwidth, only entries with `|i - j| <= bandwidth / 2` are
/// computed; the rest stay 0.
pub(crate) fn measure_matrix<F: Frame>(
    frames: &[F],
    bandwidth: Option<usize>,
    distance: &dyn Distance,
) -> Matrix {
    let n = frames.len();
    let mut matrix = Matrix::zero(n, n);
    for i in 0..n {
        for j in 0..n {
            if let Some(bandwidth) = bandwidth {
                if i.abs_diff(j) > bandwidth / 2 {
                    continue;
                }
            }
            matrix.set(i, j, distance.measure(frames[i].data(), frames[j].data()));
        }
    }
    matrix
}

/// Accumulates frames and emits their self-similarity matrix at flush.
///
/// Every retained frame is cloned; entry `(i, j)` of the emitted matrix
/// is the injected measure between frames i and j.
pub struct SelfSimilarity<F> {
    id: Option<String>,
    bandwidth: Option<usize>,
    distance: Box<dyn Distance>,
    frames: Vec<F>,
    emitted: bool,
    out: Fanout<AudioMatrix>,
    last: Option<AudioMatrix>,
    source: Option<Box<dyn Source<Output = F>>>,
}

impl<F: Frame + Clone> SelfSimilarity<F> {
    pub fn new(distance: Box<dyn Distance>) -> Self {
        Self {
            id: None,
            bandwidth: None,
            distance,
            frames: Vec::new(),
            emitted: false,
            out: Fanout::new(),
            last: None,
            source: None,
        }
    }

    /// Restrict computation to `|i - j| <= bandwidth / 2`.
    pub fn with_bandwidth(mut self, bandwidth: usize) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn compute(&self) -> AudioMatrix {
        let matrix = measure_matrix(&self.frames, self.bandwidth, self.distance.as_ref());
        let index = self.frames.first().map_or(0, Frame::frame_index);
        let format = self
            .frames
            .first()
            .map_or_else(|| AudioFormat::mono(44100.0), |f| *f.format());
        AudioMatrix::new(index, matrix, format)
    }
}

impl<F> fmt::Display for SelfSimilarity<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SelfSimilarity{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        match self.bandwidth {
            Some(bandwidth) => write!(f, "bandwidth={bandwidth}}}"),
            None => write!(f, "bandwidth=full}}"),
        }
    }
}

impl<F: Frame + Clone + 'static> GraphNode for SelfSimilarity<F> {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn output_value(&self) -> Option<Value> {
        self.last.clone().map(Into::into)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn shallow_equals(&self, _other: &dyn GraphNode) -> bool {
        // The injected measure cannot be compared.
        false
    }

    fn merge_from(&mut self, _other: &dyn GraphNode) {}

    fn describe(&self) -> String {
        self.to_string()
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&dyn GraphNode)) {
        self.out.for_each_child(f);
    }
}

impl<F: Frame + Clone + 'static> Sink for SelfSimilarity<F> {
    type Input = F;

    fn process(&mut self, input: &F) -> Result<()> {
        self.frames.push(input.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let output = self.compute();
        self.out.process(&output)?;
        self.last = Some(output);
        self.emitted = true;
        self.out.flush()
    }
}

impl<F: Frame + Clone + 'static> Processor for SelfSimilarity<F> {
    type Output = AudioMatrix;

    fn output(&self) -> Option<&AudioMatrix> {
        self.last.as_ref()
    }

    /// Drives the upstream to exhaustion and returns the matrix once.
    fn read(&mut self) -> Result<Option<AudioMatrix>> {
        if self.emitted {
            return Ok(None);
        }
        let source = self.source.as_mut().ok_or(Error::NoSource)?;
        while let Some(frame) = source.read()? {
            self.frames.push(frame);
        }
        let output = self.compute();
        self.last = Some(output.clone());
        self.emitted = true;
        Ok(Some(output))
    }

    fn set_source(&mut self, source: Box<dyn Source<Output = F>>) {
        self.source = Some(source);
    }

    fn fanout(&self) -> &Fanout<AudioMatrix> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<AudioMatrix> {
        &mut self.out
    }
}
