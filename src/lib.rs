//! Audio signal processing graphs.
//!
//! This crate builds directed acyclic networks of typed processing
//! nodes that turn time-domain audio frames into derived
//! representations: windowed slices, spectra, banded and mel-filtered
//! views, self-similarity matrices and feature curves.
//!
//! Graphs evaluate in two interchangeable modes. In *push* mode a
//! driver (usually a [`pump::Pump`]) reads frames from a
//! [`source::Source`] and pushes them through every root processor,
//! finishing with a flush that drains buffered state. In *pull* mode
//! the caller reads from a terminal processor, which recursively pulls
//! from its upstream.
//!
//! ```no_run
//! use wavegraph::prelude::*;
//!
//! # fn main() -> wavegraph::error::Result<()> {
//! let frames = vec![RealFrame::new(0, vec![0.0; 512], AudioFormat::stereo(44100.0))];
//! let mono = shared(Mono::new());
//! let window = shared(SlidingWindow::with_hop(128, 64)?.with_id("slices"));
//! mono.borrow_mut().connect_to(window);
//!
//! let mut pump = Pump::new();
//! pump.set_signal_source(Box::new(BufferSource::new(frames)));
//! pump.add(mono);
//! let results = pump.pump()?;
//! let slices = &results["slices"];
//! # Ok(())
//! # }
//! ```
//!
//! The runtime is single-threaded and synchronous: one graph runs
//! entirely on the caller's thread, and independent graphs can run on
//! independent threads without shared state.

pub mod aggregate;
pub mod bands;
pub mod channels;
pub mod distance;
pub mod error;
pub mod fanout;
pub mod format;
pub mod frame;
pub mod framing;
pub mod logfreq;
pub mod mapping;
pub mod matrix;
pub mod node;
pub mod novelty;
pub mod onset;
pub mod pipeline;
pub mod processor;
pub mod pump;
pub mod similarity;
pub mod source;
pub mod spectrum;
pub mod transform;
pub mod window;

/// The commonly used surface of the crate.
pub mod prelude {
    pub use super::aggregate::{BandSplit, Join};
    pub use super::bands::{mel_bands, multi_band, MelSpectrum, MultiBandSpectrum};
    pub use super::channels::{
        ChannelSelector, InterleavedChannelJoin, InterleavedChannelSplit, Mono,
    };
    pub use super::distance::{CosineDistance, CosineSimilarity, Distance, EuclideanDistance};
    pub use super::error::{Error, Result};
    pub use super::format::{AudioFormat, TimeUnit};
    pub use super::frame::{ComplexFrame, Frame, RealFrame};
    pub use super::framing::{
        Downsample, FrameNumberFilter, OverlapAdd, Pad, Position, Resample, SlidingWindow,
        Zeropad,
    };
    pub use super::logfreq::LogFrequencySpectrum;
    pub use super::mapping::Mapping;
    pub use super::matrix::{AudioMatrix, Matrix, MatrixCollector};
    pub use super::node::{GraphNode, Value};
    pub use super::novelty::{checkerboard_kernel, Novelty};
    pub use super::onset::OnsetStrength;
    pub use super::pipeline::Pipeline;
    pub use super::processor::{shared, Processor, SharedSink, Sink, Tap};
    pub use super::pump::Pump;
    pub use super::similarity::SelfSimilarity;
    pub use super::source::{BufferSource, Closable, Source, TimestampLimited};
    pub use super::spectrum::{
        InstantaneousFrequencySpectrum, LinearFrequencySpectrum, Spectrum,
    };
    pub use super::transform::{Fft, Ifft};
    pub use super::window::WindowFunction;
}
