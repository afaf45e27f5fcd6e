//! Banded spectrum carriers: multi-band aggregation and mel filtering.

use crate::error::{parameter_error, Result};
use crate::format::AudioFormat;
use crate::frame::Frame;
use crate::spectrum::Spectrum;
use core::cell::OnceCell;

/// Check that a boundary array is usable: strictly increasing and at
/// least `minimum` entries long.
pub(crate) fn check_boundaries(boundaries: &[f32], minimum: usize) -> Result<()> {
    if boundaries.len() < minimum {
        return parameter_error(format!(
            "at least {} band boundaries are required, got {}",
            minimum,
            boundaries.len()
        ));
    }
    if boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
        return parameter_error("band boundaries must be strictly increasing");
    }
    Ok(())
}

/// Root sum of the source powers whose frequency falls in `[low, high)`.
fn band_value(source: &dyn Spectrum, low: f32, high: f32) -> f32 {
    let powers = source.powers();
    let mut sum = 0.0;
    for (k, power) in powers.iter().enumerate() {
        let frequency = source.frequency(k as i64);
        if frequency >= low && frequency < high {
            sum += power;
        }
    }
    sum.sqrt()
}

/// Aggregate per-band values for every band of a boundary array.
pub(crate) fn band_values(source: &dyn Spectrum, boundaries: &[f32]) -> Vec<f32> {
    boundaries
        .windows(2)
        .map(|pair| band_value(source, pair[0], pair[1]))
        .collect()
}

/// A spectrum aggregated into K bands by an explicit boundary array of
/// length K+1.
#[derive(Debug)]
pub struct MultiBandSpectrum {
    index: u64,
    format: AudioFormat,
    bands: Vec<f32>,
    boundaries: Vec<f32>,
    powers: OnceCell<Vec<f32>>,
    zeros: OnceCell<Vec<f32>>,
}

impl MultiBandSpectrum {
    pub fn new(
        index: u64,
        bands: Vec<f32>,
        boundaries: Vec<f32>,
        format: AudioFormat,
    ) -> Result<Self> {
        check_boundaries(&boundaries, 2)?;
        if bands.len() + 1 != boundaries.len() {
            return parameter_error(format!(
                "{} bands do not match {} boundaries",
                bands.len(),
                boundaries.len()
            ));
        }
        Ok(Self {
            index,
            format,
            bands,
            boundaries,
            powers: OnceCell::new(),
            zeros: OnceCell::new(),
        })
    }

    /// Aggregate a source spectrum. Each band is the root sum of the
    /// source powers whose frequency falls inside the band; bands with
    /// no source bins are 0.
    pub fn from_spectrum(source: &dyn Spectrum, boundaries: Vec<f32>) -> Result<Self> {
        check_boundaries(&boundaries, 2)?;
        let bands = band_values(source, &boundaries);
        Self::new(source.frame_index(), bands, boundaries, *source.format())
    }

    /// Number of bands.
    #[inline]
    pub fn bands(&self) -> usize {
        self.bands.len()
    }

    /// The boundary array, length `bands() + 1`.
    #[inline]
    pub fn boundaries(&self) -> &[f32] {
        &self.boundaries
    }
}

impl Frame for MultiBandSpectrum {
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
        self.bands.len()
    }

    #[inline]
    fn data(&self) -> &[f32] {
        &self.bands
    }

    #[inline]
    fn real(&self) -> &[f32] {
        &self.bands
    }

    fn imaginary(&self) -> &[f32] {
        self.zeros.get_or_init(|| vec![0.0; self.bands.len()])
    }

    #[inline]
    fn magnitudes(&self) -> &[f32] {
        &self.bands
    }

    fn powers(&self) -> &[f32] {
        self.powers
            .get_or_init(|| self.bands.iter().map(|b| b * b).collect())
    }
}

impl Spectrum for MultiBandSpectrum {
    fn bandwidth(&self) -> f32 {
        let span = self.boundaries.last().unwrap_or(&0.0) - self.boundaries.first().unwrap_or(&0.0);
        span / self.bands.len().max(1) as f32
    }

    /// Centre of the band.
    fn frequency(&self, bin: i64) -> f32 {
        if bin < 0 || bin as usize >= self.bands.len() {
            return 0.0;
        }
        let i = bin as usize;
        (self.boundaries[i] + self.boundaries[i + 1]) / 2.0
    }

    /// Band containing the frequency, or `None` when out of range.
    fn bin(&self, frequency: f32) -> Option<usize> {
        self.boundaries
            .windows(2)
            .position(|pair| frequency >= pair[0] && frequency < pair[1])
    }
}

impl Clone for MultiBandSpectrum {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            format: self.format,
            bands: self.bands.clone(),
            boundaries: self.boundaries.clone(),
            powers: OnceCell::new(),
            zeros: OnceCell::new(),
        }
    }
}

impl PartialEq for MultiBandSpectrum {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.format == other.format
            && self.bands == other.bands
            && self.boundaries == other.boundaries
    }
}

/// Mapping node that aggregates linear-frequency spectra into
/// multi-band spectra over fixed boundaries.
pub fn multi_band(
    boundaries: Vec<f32>,
) -> Result<crate::mapping::Mapping<crate::spectrum::LinearFrequencySpectrum, MultiBandSpectrum>> {
    check_boundaries(&boundaries, 2)?;
    Ok(crate::mapping::Mapping::labeled(
        format!("MultiBand{boundaries:?}"),
        move |spectrum: &crate::spectrum::LinearFrequencySpectrum| {
            MultiBandSpectrum::from_spectrum(spectrum, boundaries.clone())
        },
    ))
}

/// Mapping node that filters linear-frequency spectra through a mel
/// filter bank.
pub fn mel_bands(
    boundaries: Vec<f32>,
) -> Result<crate::mapping::Mapping<crate::spectrum::LinearFrequencySpectrum, MelSpectrum>> {
    check_boundaries(&boundaries, 3)?;
    Ok(crate::mapping::Mapping::labeled(
        format!("MelBands{boundaries:?}"),
        move |spectrum: &crate::spectrum::LinearFrequencySpectrum| {
            MelSpectrum::from_spectrum(spectrum, boundaries.clone())
        },
    ))
}

/// A spectrum filtered into K mel channels by triangular filters.
///
/// The boundary array `[L, C1, .., CK, R]` has length K+2; channel i
/// rises over `[b[i], b[i+1]]` and falls over `[b[i+1], b[i+2]]`, so
/// adjacent triangles overlap.
#[derive(Debug)]
pub struct MelSpectrum {
    index: u64,
    format: AudioFormat,
    channels: Vec<f32>,
    boundaries: Vec<f32>,
    powers: OnceCell<Vec<f32>>,
    zeros: OnceCell<Vec<f32>>,
}

impl MelSpectrum {
    pub fn new(
        index: u64,
        channels: Vec<f32>,
        boundaries: Vec<f32>,
        format: AudioFormat,
    ) -> Result<Self> {
        check_boundaries(&boundaries, 3)?;
        if channels.len() + 2 != boundaries.len() {
            return parameter_error(format!(
                "{} channels do not match {} boundaries",
                channels.len(),
                boundaries.len()
            ));
        }
        Ok(Self {
            index,
            format,
            channels,
            boundaries,
            powers: OnceCell::new(),
            zeros: OnceCell::new(),
        })
    }

    /// Filter a source spectrum. Channel values are the square root of
    /// the triangle-weighted power sum.
    pub fn from_spectrum(source: &dyn Spectrum, boundaries: Vec<f32>) -> Result<Self> {
        check_boundaries(&boundaries, 3)?;
        let powers = source.powers();
        let mut channels = vec![0.0f32; boundaries.len() - 2];
        for (i, value) in channels.iter_mut().enumerate() {
            let (left, centre, right) = (boundaries[i], boundaries[i + 1], boundaries[i + 2]);
            let mut sum = 0.0;
            for (k, power) in powers.iter().enumerate() {
                let frequency = source.frequency(k as i64);
                let weight = if frequency >= left && frequency <= centre {
                    (frequency - left) / (centre - left)
                } else if frequency > centre && frequency <= right {
                    (right - frequency) / (right - centre)
                } else {
                    0.0
                };
                sum += weight * power;
            }
            *value = sum.sqrt();
        }
        Self::new(source.frame_index(), channels, boundaries, *source.format())
    }

    /// The boundary array, length `len() + 2`.
    #[inline]
    pub fn boundaries(&self) -> &[f32] {
        &self.boundaries
    }
}

impl Frame for MelSpectrum {
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
        self.channels.len()
    }

    #[inline]
    fn data(&self) -> &[f32] {
        &self.channels
    }

    #[inline]
    fn real(&self) -> &[f32] {
        &self.channels
    }

    fn imaginary(&self) -> &[f32] {
        self.zeros.get_or_init(|| vec![0.0; self.channels.len()])
    }

    #[inline]
    fn magnitudes(&self) -> &[f32] {
        &self.channels
    }

    fn powers(&self) -> &[f32] {
        self.powers
            .get_or_init(|| self.channels.iter().map(|c| c * c).collect())
    }
}

impl Spectrum for MelSpectrum {
    fn bandwidth(&self) -> f32 {
        let span = self.boundaries.last().unwrap_or(&0.0) - self.boundaries.first().unwrap_or(&0.0);
        span / self.channels.len().max(1) as f32
    }

    /// Peak of the channel's triangle.
    fn frequency(&self, bin: i64) -> f32 {
        if bin < 0 || bin as usize >= self.channels.len() {
            return 0.0;
        }
        self.boundaries[bin as usize + 1]
    }

    /// Channel whose peak is nearest, or `None` outside the filter bank.
    fn bin(&self, frequency: f32) -> Option<usize> {
        let first = *self.boundaries.first()?;
        let last = *self.boundaries.last()?;
        if frequency < first || frequency > last || self.channels.is_empty() {
            return None;
        }
        let centres = &self.boundaries[1..self.boundaries.len() - 1];
        let mut best = 0;
        let mut best_distance = f32::INFINITY;
        for (i, centre) in centres.iter().enumerate() {
            let distance = (centre - frequency).abs();
            if distance < best_distance {
                best = i;
                best_distance = distance;
            }
        }
        Some(best)
    }
}

impl Clone for MelSpectrum {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            format: self.format,
            channels: self.channels.clone(),
            boundaries: self.boundaries.clone(),
            powers: OnceCell::new(),
            zeros: OnceCell::new(),
        }
    }
}

impl PartialEq for MelSpectrum {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.format == other.format
            && self.channels == other.channels
            && self.boundaries == other.boundaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::LinearFrequencySpectrum;

    fn source() -> LinearFrequencySpectrum {
        // 8-point transform at 800 Hz: bins at 0, 100, 200, 300 Hz.
        LinearFrequencySpectrum::new(
            0,
            vec![1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0; 8],
            AudioFormat::mono(800.0),
        )
    }

    #[test]
    fn bands_aggregate_powers() {
        let spectrum =
            MultiBandSpectrum::from_spectrum(&source(), vec![0.0, 150.0, 350.0]).unwrap();
        assert_eq!(spectrum.bands(), 2);
        // First band holds bins 0 and 1, second band bins 2 and 3.
        assert!((spectrum.data()[0] - (1.0f32 + 4.0).sqrt()).abs() < 1e-6);
        assert!((spectrum.data()[1] - (9.0f32 + 16.0).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn empty_band_is_zero() {
        let spectrum =
            MultiBandSpectrum::from_spectrum(&source(), vec![400.0, 500.0]).unwrap();
        assert_eq!(spectrum.data(), &[0.0]);
    }

    #[test]
    fn band_lookup() {
        let spectrum =
            MultiBandSpectrum::from_spectrum(&source(), vec![0.0, 150.0, 350.0]).unwrap();
        assert_eq!(spectrum.bin(100.0), Some(0));
        assert_eq!(spectrum.bin(200.0), Some(1));
        assert_eq!(spectrum.bin(1000.0), None);
    }

    #[test]
    fn decreasing_boundaries_are_rejected() {
        assert!(MultiBandSpectrum::from_spectrum(&source(), vec![100.0, 50.0]).is_err());
        assert!(MultiBandSpectrum::from_spectrum(&source(), vec![100.0]).is_err());
    }

    #[test]
    fn mel_triangles_overlap() {
        let mel =
            MelSpectrum::from_spectrum(&source(), vec![0.0, 100.0, 200.0, 300.0]).unwrap();
        assert_eq!(mel.len(), 2);
        // Bin 1 (100 Hz) peaks in channel 0 and contributes nothing to
        // channel 1's rising edge start; bin 2 (200 Hz) is shared.
        assert!(mel.data()[0] > 0.0 && mel.data()[1] > 0.0);
    }
}
