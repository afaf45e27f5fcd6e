//! Novelty curve: checkerboard convolution along the self-similarity
//! diagonal.

use crate::distance::{CosineSimilarity, Distance};
use crate::error::{Error, Result};
use crate::fanout::Fanout;
use crate::format::AudioFormat;
use crate::frame::{Frame, RealFrame};
use crate::matrix::Matrix;
use crate::node::{GraphNode, Value};
use crate::processor::{Processor, Sink};
use crate::similarity::measure_matrix;
use crate::source::Source;
use std::any::Any;
use std::fmt;

/// Gaussian-tapered checkerboard kernel of the given dimension.
///
/// Entry `(i, j)` is `sign(u * v) * exp(-(u^2 + v^2))` with `u` and `v`
/// the offsets from the kernel centre; quadrants along the diagonal are
/// positive, the others negative, and for odd dimensions the centre row
/// and column are zero.
pub fn checkerboard_kernel(dimension: usize) -> Matrix {
    let mut kernel = Matrix::zero(dimension, dimension);
    let centre = (dimension as f32 - 1.0) / 2.0;
    for i in 0..dimension {
        for j in 0..dimension {
            let u = i as f32 - centre;
            let v = j as f32 - centre;
            let product = u * v;
            let sign = if product > 0.0 {
                1.0
            } else if product < 0.0 {
                -1.0
            } else {
                0.0
            };
            kernel.set(i, j, sign * (-(u * u + v * v)).exp());
        }
    }
    kernel
}

/// Accumulates frames and emits a novelty curve at flush.
///
/// The curve is the self-similarity matrix convolved along its diagonal
/// with a checkerboard kernel. With zero-padding, edge windows treat
/// out-of-range matrix entries as 0; without it, edge outputs are
/// exactly 0. The emitted curve's sample rate is the source rate
/// divided by the hop between consecutive input frames.
pub struct Novelty<F> {
    id: Option<String>,
    kernel_dimension: usize,
    zero_pad: bool,
    distance: Box<dyn Distance>,
    frames: Vec<F>,
    emitted: bool,
    out: Fanout<RealFrame>,
    last: Option<RealFrame>,
    source: Option<Box<dyn Source<Output = F>>>,
}

impl<F: Frame + Clone> Novelty<F> {
    /// Novelty over cosine similarity with the given kernel dimension.
    pub fn new(kernel_dimension: usize) -> Result<Self> {
        Self::with_distance(kernel_dimension, Box::new(CosineSimilarity))
    }

    pub fn with_distance(kernel_dimension: usize, distance: Box<dyn Distance>) -> Result<Self> {
        if kernel_dimension == 0 {
            return crate::error::parameter_error("kernel dimension must be positive");
        }
        Ok(Self {
            id: None,
            kernel_dimension,
            zero_pad: true,
            distance,
            frames: Vec::new(),
            emitted: false,
            out: Fanout::new(),
            last: None,
            source: None,
        })
    }

    /// Disable zero-padding: edge outputs become exactly 0.
    pub fn without_zero_pad(mut self) -> Self {
        self.zero_pad = false;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn compute(&self) -> RealFrame {
        let n = self.frames.len();
        let similarity = measure_matrix(&self.frames, None, self.distance.as_ref());
        let dimension = self.kernel_dimension;
        let kernel = checkerboard_kernel(dimension);
        let offset = (dimension / 2) as isize;
        let mut curve = vec![0.0f32; n];
        for (t, value) in curve.iter_mut().enumerate() {
            let start = t as isize - offset;
            if !self.zero_pad && (start < 0 || start + dimension as isize > n as isize) {
                continue;
            }
            let mut sum = 0.0;
            for i in 0..dimension {
                for j in 0..dimension {
                    let row = start + i as isize;
                    let column = start + j as isize;
                    if row < 0 || column < 0 || row >= n as isize || column >= n as isize {
                        continue;
                    }
                    sum += kernel.get(i, j) * similarity.get(row as usize, column as usize);
                }
            }
            *value = sum;
        }
        curve_frame(&self.frames, curve)
    }
}

/// Build the output curve frame: one value per input frame, at the
/// frame rate implied by the hop between consecutive inputs.
pub(crate) fn curve_frame<F: Frame>(frames: &[F], curve: Vec<f32>) -> RealFrame {
    let hop = frame_hop(frames);
    let (index, format) = match frames.first() {
        Some(first) => (
            first.frame_index() / hop,
            first
                .format()
                .with_sample_rate(first.format().sample_rate / hop as f32)
                .with_channels(1),
        ),
        None => (0, AudioFormat::mono(44100.0)),
    };
    RealFrame::new(index, curve, format)
}

/// Hop between consecutive frames, 1 when it cannot be derived.
pub(crate) fn frame_hop<F: Frame>(frames: &[F]) -> u64 {
    match frames {
        [first, second, ..] => (second.frame_index() - first.frame_index()).max(1),
        _ => 1,
    }
}

impl<F> fmt::Display for Novelty<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Novelty{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        write!(
            f,
            "kernelDimension={}, zeroPad={}}}",
            self.kernel_dimension, self.zero_pad
        )
    }
}

impl<F: Frame + Clone + 'static> GraphNode for Novelty<F> {
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

impl<F: Frame + Clone + 'static> Sink for Novelty<F> {
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

impl<F: Frame + Clone + 'static> Processor for Novelty<F> {
    type Output = RealFrame;

    fn output(&self) -> Option<&RealFrame> {
        self.last.as_ref()
    }

    /// Drives the upstream to exhaustion and returns the curve once.
    fn read(&mut self) -> Result<Option<RealFrame>> {
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

    fn fanout(&self) -> &Fanout<RealFrame> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<RealFrame> {
        &mut self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_quadrant_signs() {
        let kernel = checkerboard_kernel(4);
        assert!(kernel.get(0, 0) > 0.0);
        assert!(kernel.get(0, 3) < 0.0);
        assert!(kernel.get(3, 0) < 0.0);
        assert!(kernel.get(3, 3) > 0.0);
    }

    #[test]
    fn odd_kernel_has_zero_centre() {
        let kernel = checkerboard_kernel(5);
        for i in 0..5 {
            assert_eq!(kernel.get(2, i), 0.0);
            assert_eq!(kernel.get(i, 2), 0.0);
        }
    }
}
