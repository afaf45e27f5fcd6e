//! Fan-in and band-routing processors.

use crate::bands::{band_values, check_boundaries};
use crate::error::{parameter_error, Error, Result};
use crate::fanout::Fanout;
use crate::format::AudioFormat;
use crate::frame::{Frame, RealFrame};
use crate::node::{GraphNode, Value};
use crate::processor::{Processor, Sink};
use crate::source::Source;
use crate::spectrum::LinearFrequencySpectrum;
use std::any::Any;
use std::fmt;

/// Tiles consecutive input spectra into per-band time series.
///
/// Every input spectrum is aggregated into band values over the
/// configured boundaries; once `window_length` spectra have been seen,
/// band i's series over the window is emitted to the downstreams keyed
/// on channel i. On flush a partial window is zero-padded to
/// `window_length`. Processing without boundaries is a state error.
/// Push-only.
pub struct BandSplit {
    id: Option<String>,
    window_length: usize,
    boundaries: Vec<f32>,
    rows: Vec<Vec<f32>>,
    window_index: Option<u64>,
    format: Option<AudioFormat>,
    out: Fanout<RealFrame>,
    last: Option<RealFrame>,
}

impl BandSplit {
    pub fn new(window_length: usize) -> Result<Self> {
        if window_length == 0 {
            return parameter_error("window length must be positive");
        }
        Ok(Self {
            id: None,
            window_length,
            boundaries: Vec::new(),
            rows: Vec::new(),
            window_index: None,
            format: None,
            out: Fanout::new(),
            last: None,
        })
    }

    pub fn with_bands(window_length: usize, boundaries: Vec<f32>) -> Result<Self> {
        let mut split = Self::new(window_length)?;
        split.set_bands(boundaries)?;
        Ok(split)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the band boundaries (length K+1 for K bands).
    pub fn set_bands(&mut self, boundaries: Vec<f32>) -> Result<()> {
        check_boundaries(&boundaries, 2)?;
        self.boundaries = boundaries;
        Ok(())
    }

    /// Number of bands, 0 while no boundaries are set.
    #[inline]
    pub fn bands(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    fn emit_window(&mut self) -> Result<()> {
        let index = self.window_index.take().unwrap_or(0);
        let format = self
            .format
            .unwrap_or_else(|| AudioFormat::mono(44100.0))
            .with_channels(1);
        for band in 0..self.bands() {
            let mut series: Vec<f32> = self.rows.iter().map(|row| row[band]).collect();
            series.resize(self.window_length, 0.0);
            let output = RealFrame::new(index, series, format);
            self.out.process_channel(band, &output)?;
            self.last = Some(output);
        }
        self.rows.clear();
        Ok(())
    }
}

impl fmt::Display for BandSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BandSplit{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        write!(
            f,
            "windowLength={}, bands={}}}",
            self.window_length,
            self.bands()
        )
    }
}

crate::node::impl_node!(BandSplit, [window_length, boundaries]);

impl Sink for BandSplit {
    type Input = LinearFrequencySpectrum;

    fn process(&mut self, input: &LinearFrequencySpectrum) -> Result<()> {
        if self.boundaries.len() < 2 {
            return Err(Error::MissingBands);
        }
        if self.window_index.is_none() {
            self.window_index = Some(input.frame_index());
            self.format = Some(*input.format());
        }
        let row = band_values(input, &self.boundaries);
        self.rows.push(row);
        if self.rows.len() == self.window_length {
            self.emit_window()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.rows.is_empty() {
            self.emit_window()?;
        }
        self.out.flush()
    }
}

impl Processor for BandSplit {
    type Output = RealFrame;

    fn output(&self) -> Option<&RealFrame> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<RealFrame>> {
        panic!("BandSplit supports push evaluation only");
    }

    fn set_source(&mut self, _source: Box<dyn Source<Output = LinearFrequencySpectrum>>) {
        panic!("BandSplit supports push evaluation only");
    }

    fn fanout(&self) -> &Fanout<RealFrame> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<RealFrame> {
        &mut self.out
    }
}

/// Fan-in by aggregation: collects one input per part and applies an
/// aggregation function to the completed tick.
///
/// Upstreams are connected as separate pipelines feeding this node;
/// within one tick their outputs arrive in connection order, which is
/// the order the aggregation function sees. Flush never emits a
/// partial aggregate. Push-only.
pub struct Join<I, O> {
    id: Option<String>,
    parts: usize,
    aggregate: Box<dyn FnMut(Vec<I>) -> Result<O>>,
    buffer: Vec<I>,
    out: Fanout<O>,
    last: Option<O>,
}

impl<I, O> Join<I, O> {
    pub fn new(
        parts: usize,
        aggregate: impl FnMut(Vec<I>) -> Result<O> + 'static,
    ) -> Result<Self> {
        if parts == 0 {
            return parameter_error("at least one part is required");
        }
        Ok(Self {
            id: None,
            parts,
            aggregate: Box::new(aggregate),
            buffer: Vec::with_capacity(parts),
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
        self.parts
    }
}

impl<I, O> fmt::Display for Join<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Join{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        write!(f, "parts={}}}", self.parts)
    }
}

impl<I: 'static, O: Clone + Into<Value> + 'static> GraphNode for Join<I, O> {
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
        // The aggregation function cannot be compared.
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

impl<I: Clone + 'static, O: Clone + Into<Value> + 'static> Sink for Join<I, O> {
    type Input = I;

    fn process(&mut self, input: &I) -> Result<()> {
        self.buffer.push(input.clone());
        if self.buffer.len() < self.parts {
            return Ok(());
        }
        let parts = std::mem::take(&mut self.buffer);
        let output = (self.aggregate)(parts)?;
        self.out.process(&output)?;
        self.last = Some(output);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }
}

impl<I: Clone + 'static, O: Clone + Into<Value> + 'static> Processor for Join<I, O> {
    type Output = O;

    fn output(&self) -> Option<&O> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<O>> {
        panic!("Join supports push evaluation only");
    }

    fn set_source(&mut self, _source: Box<dyn Source<Output = I>>) {
        panic!("Join supports push evaluation only");
    }

    fn fanout(&self) -> &Fanout<O> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<O> {
        &mut self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_join() -> Join<RealFrame, RealFrame> {
        Join::new(2, |parts: Vec<RealFrame>| {
            let summed: Vec<f32> = parts[0]
                .real()
                .iter()
                .zip(parts[1].real())
                .map(|(a, b)| a + b)
                .collect();
            Ok(parts[0].derive(summed))
        })
        .unwrap()
    }

    #[test]
    fn join_waits_for_all_parts() {
        let mut join = sum_join();
        let format = AudioFormat::mono(100.0);
        join.process(&RealFrame::new(0, vec![1.0, 2.0], format))
            .unwrap();
        assert!(join.output().is_none());
        join.process(&RealFrame::new(0, vec![10.0, 20.0], format))
            .unwrap();
        assert_eq!(join.output().unwrap().real(), &[11.0, 22.0]);
    }

    #[test]
    fn zero_parts_is_rejected() {
        assert!(Join::<RealFrame, RealFrame>::new(0, |_| {
            parameter_error("unused")
        })
        .is_err());
    }
}
