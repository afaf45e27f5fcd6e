//! Frequency-domain frame carriers.
//!
//! A spectrum is a frame whose payload is understood against a frequency
//! axis. The linear-frequency spectrum is the positive half of a
//! real-input DFT; the instantaneous-frequency spectrum refines the bin
//! frequencies by phase differencing two consecutive linear spectra.

use crate::format::AudioFormat;
use crate::frame::Frame;
use core::cell::OnceCell;
use std::f32::consts::PI;

/// A frame with a frequency axis.
pub trait Spectrum: Frame {
    /// Width of one bin in Hz.
    fn bandwidth(&self) -> f32;

    /// Frequency in Hz associated with `bin`.
    ///
    /// Out-of-range bins map to 0 Hz; bins in the mirrored upper half of
    /// a DFT map to their symmetric counterpart.
    fn frequency(&self, bin: i64) -> f32;

    /// Bin associated with `frequency`, if the frequency is addressable.
    fn bin(&self, frequency: f32) -> Option<usize>;
}

/// Positive half of a real-input DFT.
///
/// `len()` reports the length of the transformed input; `magnitudes`
/// and `powers` cover the `len() / 2` meaningful bins.
#[derive(Debug)]
pub struct LinearFrequencySpectrum {
    index: u64,
    format: AudioFormat,
    real: Vec<f32>,
    imaginary: Vec<f32>,
    magnitudes: OnceCell<Vec<f32>>,
    powers: OnceCell<Vec<f32>>,
}

impl LinearFrequencySpectrum {
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

    /// Number of meaningful bins, i.e. half the transform length.
    #[inline]
    pub fn bins(&self) -> usize {
        self.real.len() / 2
    }

    /// Phase angle of `bin`.
    #[inline]
    pub fn phase(&self, bin: usize) -> f32 {
        self.imaginary[bin].atan2(self.real[bin])
    }

    /// Derive a new spectrum with the same header and new parts.
    pub fn derive(&self, real: Vec<f32>, imaginary: Vec<f32>) -> Self {
        Self::new(self.index, real, imaginary, self.format)
    }
}

impl Frame for LinearFrequencySpectrum {
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
            let bins = self.real.len() / 2;
            (0..bins)
                .map(|k| (self.real[k] * self.real[k] + self.imaginary[k] * self.imaginary[k]).sqrt())
                .collect()
        })
    }

    fn powers(&self) -> &[f32] {
        self.powers.get_or_init(|| {
            let bins = self.real.len() / 2;
            (0..bins)
                .map(|k| self.real[k] * self.real[k] + self.imaginary[k] * self.imaginary[k])
                .collect()
        })
    }
}

impl Spectrum for LinearFrequencySpectrum {
    #[inline]
    fn bandwidth(&self) -> f32 {
        self.format.sample_rate / self.real.len() as f32
    }

    fn frequency(&self, bin: i64) -> f32 {
        let n = self.real.len() as i64;
        if bin < 0 || bin >= n {
            return 0.0;
        }
        // The upper half mirrors the lower half of a real-input DFT.
        let bin = if bin < n / 2 { bin } else { n - bin };
        bin as f32 * self.bandwidth()
    }

    fn bin(&self, frequency: f32) -> Option<usize> {
        if self.bins() == 0 {
            return None;
        }
        let bin = (frequency / self.bandwidth()).round() as i64;
        Some(bin.clamp(0, self.bins() as i64 - 1) as usize)
    }
}

impl Clone for LinearFrequencySpectrum {
    fn clone(&self) -> Self {
        Self::new(
            self.index,
            self.real.clone(),
            self.imaginary.clone(),
            self.format,
        )
    }
}

impl PartialEq for LinearFrequencySpectrum {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.format == other.format
            && self.real == other.real
            && self.imaginary == other.imaginary
    }
}

/// Wrap an angle to the interval (-pi, pi].
#[inline]
fn principal_argument(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(2.0 * PI);
    if wrapped > PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

/// Magnitudes plus per-bin instantaneous frequencies.
#[derive(Debug)]
pub struct InstantaneousFrequencySpectrum {
    index: u64,
    format: AudioFormat,
    length: usize,
    magnitudes: Vec<f32>,
    frequencies: Vec<f32>,
    powers: OnceCell<Vec<f32>>,
    zeros: OnceCell<Vec<f32>>,
}

impl InstantaneousFrequencySpectrum {
    /// Build from explicit magnitudes and frequencies over `length / 2`
    /// bins.
    pub fn new(
        index: u64,
        length: usize,
        magnitudes: Vec<f32>,
        frequencies: Vec<f32>,
        format: AudioFormat,
    ) -> Self {
        assert!(
            magnitudes.len() == frequencies.len() && magnitudes.len() == length / 2,
            "magnitudes and frequencies must cover length / 2 bins"
        );
        Self {
            index,
            format,
            length,
            magnitudes,
            frequencies,
            powers: OnceCell::new(),
            zeros: OnceCell::new(),
        }
    }

    /// Derive instantaneous frequencies from two consecutive spectra by
    /// phase differencing over their hop. Identical spectra (zero hop)
    /// yield all-zero frequencies.
    pub fn from_spectra(
        first: &LinearFrequencySpectrum,
        second: &LinearFrequencySpectrum,
    ) -> Self {
        assert!(first.len() == second.len(), "spectra must have equal length");
        let n = second.len();
        let bins = n / 2;
        let hop = second.frame_index().saturating_sub(first.frame_index());
        let bandwidth = second.bandwidth();
        let mut frequencies = vec![0.0; bins];
        if hop > 0 {
            for (k, frequency) in frequencies.iter_mut().enumerate() {
                let expected = 2.0 * PI * k as f32 * hop as f32 / n as f32;
                let deviation =
                    principal_argument(second.phase(k) - first.phase(k) - expected);
                *frequency =
                    (k as f32 + deviation * n as f32 / (2.0 * PI * hop as f32)) * bandwidth;
            }
        }
        Self {
            index: second.frame_index(),
            format: *second.format(),
            length: n,
            magnitudes: second.magnitudes().to_vec(),
            frequencies,
            powers: OnceCell::new(),
            zeros: OnceCell::new(),
        }
    }

    /// The explicit per-bin frequencies.
    #[inline]
    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }
}

impl Frame for InstantaneousFrequencySpectrum {
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
        self.length
    }

    #[inline]
    fn data(&self) -> &[f32] {
        &self.magnitudes
    }

    #[inline]
    fn real(&self) -> &[f32] {
        &self.magnitudes
    }

    fn imaginary(&self) -> &[f32] {
        self.zeros.get_or_init(|| vec![0.0; self.magnitudes.len()])
    }

    #[inline]
    fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    fn powers(&self) -> &[f32] {
        self.powers
            .get_or_init(|| self.magnitudes.iter().map(|m| m * m).collect())
    }
}

impl Spectrum for InstantaneousFrequencySpectrum {
    #[inline]
    fn bandwidth(&self) -> f32 {
        self.format.sample_rate / self.length as f32
    }

    fn frequency(&self, bin: i64) -> f32 {
        let n = self.length as i64;
        if bin < 0 || bin >= n {
            return 0.0;
        }
        let bin = if bin < n / 2 { bin } else { n - bin };
        self.frequencies.get(bin as usize).copied().unwrap_or(0.0)
    }

    fn bin(&self, frequency: f32) -> Option<usize> {
        if self.magnitudes.is_empty() {
            return None;
        }
        let bin = (frequency / self.bandwidth()).round() as i64;
        Some(bin.clamp(0, self.magnitudes.len() as i64 - 1) as usize)
    }
}

impl Clone for InstantaneousFrequencySpectrum {
    fn clone(&self) -> Self {
        Self::new(
            self.index,
            self.length,
            self.magnitudes.clone(),
            self.frequencies.clone(),
            self.format,
        )
    }
}

impl PartialEq for InstantaneousFrequencySpectrum {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.format == other.format
            && self.length == other.length
            && self.magnitudes == other.magnitudes
            && self.frequencies == other.frequencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_spectra_have_zero_instantaneous_frequency() {
        let spectrum = LinearFrequencySpectrum::new(
            0,
            vec![1.0, 0.5, 0.25, 0.0],
            vec![0.0; 4],
            AudioFormat::mono(1000.0),
        );
        let derived = InstantaneousFrequencySpectrum::from_spectra(&spectrum, &spectrum.clone());
        assert_eq!(derived.frequencies(), &[0.0, 0.0]);
    }

    #[test]
    fn principal_argument_wraps() {
        assert!((principal_argument(3.0 * PI) - PI).abs() < 1e-6);
        assert!((principal_argument(-0.5 * PI) + 0.5 * PI).abs() < 1e-6);
    }
}
