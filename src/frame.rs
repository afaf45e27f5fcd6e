//! Time-domain frame carriers.
//!
//! Frames are the unit of data flowing through a graph: a header (frame
//! index and audio format) plus owned sample storage. Derived views
//! (`magnitudes`, `powers`, the zero imaginary part of a real frame)
//! are computed on first access and cached; the graph runtime is
//! single-threaded, so the caches are plain `OnceCell`s.

use crate::format::{timestamp, AudioFormat, TimeUnit};
use core::cell::OnceCell;

/// Common surface of every frame flowing through a graph.
///
/// The frame index counts sample frames since the start of the stream
/// and, together with the sample rate, determines the timestamp. It is
/// fixed at construction; only the owning node may overwrite it through
/// a `reuse` path.
pub trait Frame {
    /// Index of the first sample frame of this buffer within its stream.
    fn frame_index(&self) -> u64;

    /// Format of the stream this frame belongs to.
    fn format(&self) -> &AudioFormat;

    /// Number of samples carried by this frame.
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp of this frame in the requested unit, truncated toward
    /// zero.
    fn timestamp(&self, unit: TimeUnit) -> u64 {
        timestamp(self.frame_index(), self.format().sample_rate, unit)
    }

    /// The default view of this frame's payload.
    fn data(&self) -> &[f32];

    /// Real part of the payload.
    fn real(&self) -> &[f32];

    /// Imaginary part of the payload. All zeros for real-only frames.
    fn imaginary(&self) -> &[f32];

    /// Element-wise magnitudes.
    fn magnitudes(&self) -> &[f32];

    /// Element-wise powers.
    fn powers(&self) -> &[f32];
}

/// A real-valued frame.
#[derive(Debug)]
pub struct RealFrame {
    index: u64,
    format: AudioFormat,
    samples: Vec<f32>,
    magnitudes: OnceCell<Vec<f32>>,
    powers: OnceCell<Vec<f32>>,
    zeros: OnceCell<Vec<f32>>,
}

impl RealFrame {
    pub fn new(index: u64, samples: Vec<f32>, format: AudioFormat) -> Self {
        Self {
            index,
            format,
            samples,
            magnitudes: OnceCell::new(),
            powers: OnceCell::new(),
            zeros: OnceCell::new(),
        }
    }

    /// Derive a new frame with the same header and new samples.
    pub fn derive(&self, samples: Vec<f32>) -> Self {
        Self::new(self.index, samples, self.format)
    }

    /// Overwrite this frame in place, invalidating cached views.
    ///
    /// Only sound while the caller has exclusive ownership; downstream
    /// nodes receive frames by reference and must clone to retain them,
    /// so a producer reusing its own cached output cannot be observed.
    pub fn reuse(&mut self, index: u64, samples: Vec<f32>, format: AudioFormat) {
        self.index = index;
        self.format = format;
        self.samples = samples;
        self.magnitudes.take();
        self.powers.take();
        self.zeros.take();
    }

    /// Mutable access to the samples. Invalidates cached views.
    pub fn samples_mut(&mut self) -> &mut [f32] {
        self.magnitudes.take();
        self.powers.take();
        &mut self.samples
    }
}

impl Frame for RealFrame {
    #[inline]
    fn frame_index(&self) -> u64 {
        self.index
    }

    #[inline]
    fn format(&self) -> &AudioFormat {
        &self.format
    }

    #[inline]
    fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    fn data(&self) -> &[f32] {
        self.magnitudes()
    }

    #[inline]
    fn real(&self) -> &[f32] {
        &self.samples
    }

    fn imaginary(&self) -> &[f32] {
        self.zeros.get_or_init(|| vec![0.0; self.samples.len()])
    }

    fn magnitudes(&self) -> &[f32] {
        self.magnitudes
            .get_or_init(|| self.samples.iter().map(|x| x.abs()).collect())
    }

    fn powers(&self) -> &[f32] {
        self.powers
            .get_or_init(|| self.samples.iter().map(|x| x * x).collect())
    }
}

impl Clone for RealFrame {
    fn clone(&self) -> Self {
        Self::new(self.index, self.samples.clone(), self.format)
    }
}

impl PartialEq for RealFrame {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.format == other.format && self.samples == other.samples
    }
}

/// A complex-valued frame. Real and imaginary parts have equal length.
#[derive(Debug)]
pub struct ComplexFrame {
    index: u64,
    format: AudioFormat,
    real: Vec<f32>,
    imaginary: Vec<f32>,
    magnitudes: OnceCell<Vec<f32>>,
    powers: OnceCell<Vec<f32>>,
}

impl ComplexFrame {
    pub fn new(index: u64, real: Vec<f32>, imaginary: Vec<f32>, format: AudioFormat) -> Self {
        assert!(
            real.len() == imaginary.len(),
            "real and imaginary parts must have equal length"
        );
        Self {
            index,
            format,
            real,
            imaginary,
            magnitudes: OnceCell::new(),
            powers: OnceCell::new(),
        }
    }

    /// Derive a new frame with the same header and new parts.
    pub fn derive(&self, real: Vec<f32>, imaginary: Vec<f32>) -> Self {
        Self::new(self.index, real, imaginary, self.format)
    }

    /// Overwrite this frame in place, invalidating cached views.
    pub fn reuse(&mut self, index: u64, real: Vec<f32>, imaginary: Vec<f32>, format: AudioFormat) {
        assert!(real.len() == imaginary.len());
        self.index = index;
        self.format = format;
        self.real = real;
        self.imaginary = imaginary;
        self.magnitudes.take();
        self.powers.take();
    }
}

impl Frame for ComplexFrame {
    #[inline]
    fn frame_index(&self) -> u64 {
        self.index
    }

    #[inline]
    fn format(&self) -> &AudioFormat {
        &self.format
    }

    #[inline]
    fn len(&self) -> usize {
        self.real.len()
    }

    #[inline]
    fn data(&self) -> &[f32] {
        self.magnitudes()
    }

    #[inline]
    fn real(&self) -> &[f32] {
        &self.real
    }

    #[inline]
    fn imaginary(&self) -> &[f32] {
        &self.imaginary
    }

    fn magnitudes(&self) -> &[f32] {
        self.magnitudes.get_or_init(|| {
            self.real
                .iter()
                .zip(&self.imaginary)
                .map(|(re, im)| (re * re + im * im).sqrt())
                .collect()
        })
    }

    fn powers(&self) -> &[f32] {
        self.powers.get_or_init(|| {
            self.real
                .iter()
                .zip(&self.imaginary)
                .map(|(re, im)| re * re + im * im)
                .collect()
        })
    }
}

impl Clone for ComplexFrame {
    fn clone(&self) -> Self {
        Self::new(
            self.index,
            self.real.clone(),
            self.imaginary.clone(),
            self.format,
        )
    }
}

impl PartialEq for ComplexFrame {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.format == other.format
            && self.real == other.real
            && self.imaginary == other.imaginary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_frame_views() {
        let frame = RealFrame::new(3, vec![1.0, -2.0, 3.0], AudioFormat::mono(100.0));
        assert_eq!(frame.real(), &[1.0, -2.0, 3.0]);
        assert_eq!(frame.magnitudes(), &[1.0, 2.0, 3.0]);
        assert_eq!(frame.powers(), &[1.0, 4.0, 9.0]);
        assert_eq!(frame.data(), frame.magnitudes());
        assert_eq!(frame.imaginary(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn reuse_invalidates_caches() {
        let mut frame = RealFrame::new(0, vec![1.0, -1.0], AudioFormat::mono(100.0));
        assert_eq!(frame.magnitudes(), &[1.0, 1.0]);
        frame.reuse(1, vec![2.0, -2.0], AudioFormat::mono(100.0));
        assert_eq!(frame.magnitudes(), &[2.0, 2.0]);
        assert_eq!(frame.frame_index(), 1);
    }

    #[test]
    fn clone_is_deep() {
        let frame = RealFrame::new(7, vec![1.0, 2.0], AudioFormat::mono(100.0));
        let mut copy = frame.clone();
        assert_eq!(copy, frame);
        copy.reuse(7, vec![9.0, 9.0], AudioFormat::mono(100.0));
        assert_eq!(frame.real(), &[1.0, 2.0]);
    }
}
