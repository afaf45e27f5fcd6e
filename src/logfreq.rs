//! Log-frequency (constant-Q) spectrum carrier.

use crate::error::{parameter_error, Result};
use crate::format::AudioFormat;
use crate::frame::Frame;
use crate::spectrum::Spectrum;
use core::cell::OnceCell;

/// Spectrum over logarithmically spaced band centres, as produced by a
/// constant-Q transform.
///
/// The `frequencies` array lists the centre of every band explicitly;
/// bin lookup finds the nearest centre.
#[derive(Debug)]
pub struct LogFrequencySpectrum {
    index: u64,
    format: AudioFormat,
    real: Vec<f32>,
    imaginary: Vec<f32>,
    frequencies: Vec<f32>,
    q: f32,
    magnitudes: OnceCell<Vec<f32>>,
    powers: OnceCell<Vec<f32>>,
}

impl LogFrequencySpectrum {
    pub fn new(
        index: u64,
        real: Vec<f32>,
        imaginary: Vec<f32>,
        frequencies: Vec<f32>,
        q: f32,
        format: AudioFormat,
    ) -> Result<Self> {
        if real.len() != imaginary.len() {
            return parameter_error("real and imaginary parts must have equal length");
        }
        if frequencies.len() != real.len() {
            return parameter_error(format!(
                "frequency array length {} does not match data length {}",
                frequencies.len(),
                real.len()
            ));
        }
        if q <= 0.0 {
            return parameter_error("Q must be positive");
        }
        Ok(Self {
            index,
            format,
            real,
            imaginary,
            frequencies,
            q,
            magnitudes: OnceCell::new(),
            powers: OnceCell::new(),
        })
    }

    /// Constant-Q quality factor.
    #[inline]
    pub fn q(&self) -> f32 {
        self.q
    }

    /// Explicit band centre frequencies.
    #[inline]
    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    /// Number of bins per semitone implied by Q.
    pub fn bins_per_semitone(&self) -> f32 {
        1.0 / (12.0 * ((self.q + 1.0) / self.q).log2())
    }

    /// Derive a copy shifted by `bins`, zero-padded at the vacated end.
    ///
    /// A positive shift moves content toward higher bins.
    pub fn shift(&self, bins: i64) -> Self {
        let n = self.real.len() as i64;
        let mut real = vec![0.0; self.real.len()];
        let mut imaginary = vec![0.0; self.imaginary.len()];
        for i in 0..n {
            let target = i + bins;
            if target >= 0 && target < n {
                real[target as usize] = self.real[i as usize];
                imaginary[target as usize] = self.imaginary[i as usize];
            }
        }
        Self {
            index: self.index,
            format: self.format,
            real,
            imaginary,
            frequencies: self.frequencies.clone(),
            q: self.q,
            magnitudes: OnceCell::new(),
            powers: OnceCell::new(),
        }
    }
}

impl Frame for LogFrequencySpectrum {
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

impl Spectrum for LogFrequencySpectrum {
    /// Average bandwidth; individual band widths grow with frequency.
    fn bandwidth(&self) -> f32 {
        match (self.frequencies.first(), self.frequencies.last()) {
            (Some(first), Some(last)) if self.frequencies.len() > 1 => {
                (last - first) / (self.frequencies.len() - 1) as f32
            }
            _ => 0.0,
        }
    }

    fn frequency(&self, bin: i64) -> f32 {
        if bin < 0 || bin as usize >= self.frequencies.len() {
            return 0.0;
        }
        self.frequencies[bin as usize]
    }

    /// Nearest band centre.
    fn bin(&self, frequency: f32) -> Option<usize> {
        if self.frequencies.is_empty() {
            return None;
        }
        let mut best = 0;
        let mut best_distance = f32::INFINITY;
        for (i, centre) in self.frequencies.iter().enumerate() {
            let distance = (centre - frequency).abs();
            if distance < best_distance {
                best = i;
                best_distance = distance;
            }
        }
        Some(best)
    }
}

impl Clone for LogFrequencySpectrum {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            format: self.format,
            real: self.real.clone(),
            imaginary: self.imaginary.clone(),
            frequencies: self.frequencies.clone(),
            q: self.q,
            magnitudes: OnceCell::new(),
            powers: OnceCell::new(),
        }
    }
}

impl PartialEq for LogFrequencySpectrum {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.format == other.format
            && self.q == other.q
            && self.real == other.real
            && self.imaginary == other.imaginary
            && self.frequencies == other.frequencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum() -> LogFrequencySpectrum {
        LogFrequencySpectrum::new(
            0,
            vec![1.0, 2.0, 3.0, 4.0],
            vec![0.0; 4],
            vec![110.0, 220.0, 440.0, 880.0],
            17.0,
            AudioFormat::mono(11025.0),
        )
        .unwrap()
    }

    #[test]
    fn nearest_bin_lookup() {
        let s = spectrum();
        assert_eq!(s.bin(430.0), Some(2));
        assert_eq!(s.bin(1.0), Some(0));
        assert_eq!(s.bin(10_000.0), Some(3));
    }

    #[test]
    fn shift_pads_with_zeros() {
        let s = spectrum();
        let up = s.shift(1);
        assert_eq!(up.real(), &[0.0, 1.0, 2.0, 3.0]);
        let down = s.shift(-2);
        assert_eq!(down.real(), &[3.0, 4.0, 0.0, 0.0]);
    }

    #[test]
    fn mismatched_frequency_array_is_rejected() {
        let result = LogFrequencySpectrum::new(
            0,
            vec![1.0, 2.0],
            vec![0.0; 2],
            vec![110.0],
            17.0,
            AudioFormat::mono(11025.0),
        );
        assert!(result.is_err());
    }
}
