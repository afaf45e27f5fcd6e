//! Onset strength: half-wave-rectified spectral flux of log-magnitudes.

use crate::error::{parameter_error, Error, Result};
use crate::fanout::Fanout;
use crate::frame::{Frame, RealFrame};
use crate::novelty::curve_frame;
use crate::processor::{Processor, Sink};
use crate::source::Source;
use crate::spectrum::{LinearFrequencySpectrum, Spectrum};
use std::fmt;

/// Magnitudes below this floor are clamped before taking the log.
const LOG_FLOOR: f32 = 1e-12;

/// Accumulates linear-frequency spectra and emits an onset-strength
/// curve at flush.
///
/// For every pair of consecutive spectra, the half-wave-rectified first
/// differences of log-magnitudes are summed over the bins whose
/// frequency lies in `[low, high]`. The curve's sample rate is the
/// source rate divided by the hop between consecutive spectra.
pub struct OnsetStrength {
    id: Option<String>,
    low_frequency: f32,
    high_frequency: f32,
    spectra: Vec<LinearFrequencySpectrum>,
    emitted: bool,
    out: Fanout<RealFrame>,
    last: Option<RealFrame>,
    source: Option<Box<dyn Source<Output = LinearFrequencySpectrum>>>,
}

impl OnsetStrength {
    pub fn new(low_frequency: f32, high_frequency: f32) -> Result<Self> {
        if low_frequency > high_frequency {
            return parameter_error(format!(
                "low frequency {} exceeds high frequency {}",
                low_frequency, high_frequency
            ));
        }
        Ok(Self {
            id: None,
            low_frequency,
            high_frequency,
            spectra: Vec::new(),
            emitted: false,
            out: Fanout::new(),
            last: None,
            source: None,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn compute(&self) -> RealFrame {
        let mut curve = Vec::new();
        for pair in self.spectra.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            let mut strength = 0.0;
            for (k, magnitude) in current.magnitudes().iter().enumerate() {
                let frequency = current.frequency(k as i64);
                if frequency < self.low_frequency || frequency > self.high_frequency {
                    continue;
                }
                let before = previous.magnitudes()[k].max(LOG_FLOOR).ln();
                let now = magnitude.max(LOG_FLOOR).ln();
                strength += (now - before).max(0.0);
            }
            curve.push(strength);
        }
        curve_frame(&self.spectra, curve)
    }
}

impl fmt::Display for OnsetStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OnsetStrength{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        write!(
            f,
            "lowFrequency={}, highFrequency={}}}",
            self.low_frequency, self.high_frequency
        )
    }
}

crate::node::impl_node!(OnsetStrength, [low_frequency, high_frequency]);

impl Sink for OnsetStrength {
    type Input = LinearFrequencySpectrum;

    fn process(&mut self, input: &LinearFrequencySpectrum) -> Result<()> {
        self.spectra.push(input.clone());
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

impl Processor for OnsetStrength {
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
        while let Some(spectrum) = source.read()? {
            self.spectra.push(spectrum);
        }
        let output = self.compute();
        self.last = Some(output.clone());
        self.emitted = true;
        Ok(Some(output))
    }

    fn set_source(&mut self, source: Box<dyn Source<Output = LinearFrequencySpectrum>>) {
        self.source = Some(source);
    }

    fn fanout(&self) -> &Fanout<RealFrame> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<RealFrame> {
        &mut self.out
    }
}
