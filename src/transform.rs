//! Forward and inverse FFT nodes.
//!
//! The numeric kernels come from `realfft`; plans are cached in a
//! process-global planner so repeated transforms of the same length
//! reuse their twiddle tables.

use crate::error::{format_error, Error, Result};
use crate::fanout::Fanout;
use crate::frame::{Frame, RealFrame};
use crate::processor::{Processor, Sink};
use crate::source::Source;
use crate::spectrum::LinearFrequencySpectrum;
use lazy_static::lazy_static;
use num_complex::Complex32;
use realfft::RealFftPlanner;
use std::fmt;
use std::sync::Mutex;

lazy_static! {
    static ref PLANNER: Mutex<RealFftPlanner<f32>> = Mutex::new(RealFftPlanner::new());
}

fn check_transformable(frame: &RealFrame) -> Result<usize> {
    if frame.format().channels != 1 {
        return format_error(format!(
            "transforms require mono input, got {} channels",
            frame.format().channels
        ));
    }
    let n = frame.len();
    if n < 2 || n % 2 != 0 {
        return format_error(format!("transform length {} must be even and at least 2", n));
    }
    Ok(n)
}

/// Real-input forward FFT producing a linear-frequency spectrum.
pub struct Fft {
    id: Option<String>,
    out: Fanout<LinearFrequencySpectrum>,
    last: Option<LinearFrequencySpectrum>,
    source: Option<Box<dyn Source<Output = RealFrame>>>,
}

impl Fft {
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

    fn transform(&self, frame: &RealFrame) -> Result<LinearFrequencySpectrum> {
        let n = check_transformable(frame)?;
        let plan = {
            let mut planner = PLANNER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            planner.plan_fft_forward(n)
        };
        let mut input = frame.real().to_vec();
        let mut spectrum = plan.make_output_vec();
        plan.process(&mut input, &mut spectrum)
            .map_err(|e| Error::Format(e.to_string()))?;
        // Store the full-length sequence; the upper half mirrors the
        // lower by conjugate symmetry.
        let mut real = vec![0.0; n];
        let mut imaginary = vec![0.0; n];
        for (k, value) in spectrum.iter().enumerate() {
            real[k] = value.re;
            imaginary[k] = value.im;
        }
        for k in 1..n / 2 {
            real[n - k] = real[k];
            imaginary[n - k] = -imaginary[k];
        }
        Ok(LinearFrequencySpectrum::new(
            frame.frame_index(),
            real,
            imaginary,
            *frame.format(),
        ))
    }
}

impl Default for Fft {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Fft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "FFT{{id={id}}}"),
            None => f.write_str("FFT"),
        }
    }
}

crate::node::impl_node!(Fft, []);

impl Sink for Fft {
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

impl Processor for Fft {
    type Output = LinearFrequencySpectrum;

    fn output(&self) -> Option<&LinearFrequencySpectrum> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<LinearFrequencySpectrum>> {
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

    fn fanout(&self) -> &Fanout<LinearFrequencySpectrum> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<LinearFrequencySpectrum> {
        &mut self.out
    }
}

/// Inverse FFT turning a linear-frequency spectrum back into a real
/// frame. Output is normalized by 1/N.
pub struct Ifft {
    id: Option<String>,
    out: Fanout<RealFrame>,
    last: Option<RealFrame>,
    source: Option<Box<dyn Source<Output = LinearFrequencySpectrum>>>,
}

impl Ifft {
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

    fn transform(&self, spectrum: &LinearFrequencySpectrum) -> Result<RealFrame> {
        let n = spectrum.len();
        if n < 2 || n % 2 != 0 {
            return format_error(format!("transform length {} must be even and at least 2", n));
        }
        let plan = {
            let mut planner = PLANNER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            planner.plan_fft_inverse(n)
        };
        let real = spectrum.real();
        let imaginary = spectrum.imaginary();
        let mut half: Vec<Complex32> = (0..=n / 2)
            .map(|k| Complex32::new(real[k], imaginary[k]))
            .collect();
        let mut output = plan.make_output_vec();
        plan.process(&mut half, &mut output)
            .map_err(|e| Error::Format(e.to_string()))?;
        let scale = 1.0 / n as f32;
        for value in &mut output {
            *value *= scale;
        }
        Ok(RealFrame::new(
            spectrum.frame_index(),
            output,
            *spectrum.format(),
        ))
    }
}

impl Default for Ifft {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Ifft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "IFFT{{id={id}}}"),
            None => f.write_str("IFFT"),
        }
    }
}

crate::node::impl_node!(Ifft, []);

impl Sink for Ifft {
    type Input = LinearFrequencySpectrum;

    fn process(&mut self, input: &LinearFrequencySpectrum) -> Result<()> {
        let output = self.transform(input)?;
        self.out.process(&output)?;
        self.last = Some(output);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }
}

impl Processor for Ifft {
    type Output = RealFrame;

    fn output(&self) -> Option<&RealFrame> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<RealFrame>> {
        let source = self.source.as_mut().ok_or(Error::NoSource)?;
        match source.read()? {
            Some(spectrum) => {
                let output = self.transform(&spectrum)?;
                self.last = Some(output.clone());
                Ok(Some(output))
            }
            None => Ok(None),
        }
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
