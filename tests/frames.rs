//! Frame carrier tests: headers, derived views, spectra geometry.

use wavegraph::prelude::*;

fn is_near(a: &[f32], b: &[f32], tolerance: f32) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= tolerance)
}

#[test]
fn timestamps_scale_with_the_requested_unit() {
    let frame = RealFrame::new(100, vec![0.0; 8], AudioFormat::mono(10000.0));
    assert_eq!(frame.timestamp(TimeUnit::Seconds), 0);
    assert_eq!(frame.timestamp(TimeUnit::Millis), 10);
    assert_eq!(frame.timestamp(TimeUnit::Micros), 10_000);
    assert_eq!(frame.timestamp(TimeUnit::Nanos), 10_000_000);

    // frame_index * unit / sample_rate, truncated toward zero.
    let odd = RealFrame::new(999, vec![0.0], AudioFormat::mono(44100.0));
    assert_eq!(odd.timestamp(TimeUnit::Seconds), 0);
    assert_eq!(odd.timestamp(TimeUnit::Millis), 22);
}

#[test]
fn real_frame_views_and_equality() {
    let format = AudioFormat::mono(1000.0);
    let frame = RealFrame::new(5, vec![1.0, -2.0, 0.5], format);
    assert_eq!(frame.magnitudes(), &[1.0, 2.0, 0.5]);
    assert_eq!(frame.powers(), &[1.0, 4.0, 0.25]);
    assert_eq!(frame.data(), frame.magnitudes());
    assert_eq!(frame.imaginary(), &[0.0; 3]);

    // Equality covers index, format and payload.
    assert_eq!(frame, RealFrame::new(5, vec![1.0, -2.0, 0.5], format));
    assert_ne!(frame, RealFrame::new(6, vec![1.0, -2.0, 0.5], format));
    assert_ne!(
        frame,
        RealFrame::new(5, vec![1.0, -2.0, 0.5], AudioFormat::mono(2000.0))
    );
}

#[test]
fn clones_are_deep() {
    let frame = ComplexFrame::new(1, vec![1.0, 2.0], vec![3.0, 4.0], AudioFormat::mono(100.0));
    let mut copy = frame.clone();
    assert_eq!(copy, frame);
    copy.reuse(1, vec![9.0, 9.0], vec![9.0, 9.0], AudioFormat::mono(100.0));
    assert_eq!(frame.real(), &[1.0, 2.0]);
    assert_eq!(frame.imaginary(), &[3.0, 4.0]);
}

#[test]
fn complex_frame_magnitudes() {
    let frame = ComplexFrame::new(0, vec![3.0, 0.0], vec![4.0, 1.0], AudioFormat::mono(100.0));
    assert!(is_near(frame.magnitudes(), &[5.0, 1.0], 1e-6));
    assert!(is_near(frame.powers(), &[25.0, 1.0], 1e-6));
}

fn spectrum_of(real: Vec<f32>, sample_rate: f32) -> LinearFrequencySpectrum {
    let n = real.len();
    LinearFrequencySpectrum::new(0, real, vec![0.0; n], AudioFormat::mono(sample_rate))
}

#[test]
fn linear_spectrum_geometry() {
    // 8-point transform at 800 Hz: bandwidth 100 Hz.
    let spectrum = spectrum_of(vec![1.0; 8], 800.0);
    assert_eq!(spectrum.bandwidth(), 100.0);
    for k in 0..4i64 {
        assert_eq!(spectrum.frequency(k), k as f32 * 100.0);
        assert_eq!(spectrum.bin(spectrum.frequency(k)), Some(k as usize));
    }
    // Out of range maps to 0 Hz, the mirrored upper half is symmetric.
    assert_eq!(spectrum.frequency(-1), 0.0);
    assert_eq!(spectrum.frequency(8), 0.0);
    assert_eq!(spectrum.frequency(7), spectrum.frequency(1));
    // Bin lookup is clamped.
    assert_eq!(spectrum.bin(10_000.0), Some(3));
    assert_eq!(spectrum.bin(-10.0), Some(0));
}

#[test]
fn linear_spectrum_reports_half_length_views() {
    let spectrum = spectrum_of(vec![2.0; 8], 800.0);
    assert_eq!(spectrum.len(), 8);
    assert_eq!(spectrum.magnitudes().len(), 4);
    assert_eq!(spectrum.powers().len(), 4);
    assert_eq!(spectrum.data(), spectrum.magnitudes());
}

#[test]
fn log_spectrum_constant_q_identity() {
    // 36 bins per octave: Q = 1 / (2^(1/36) - 1), so three bins per
    // semitone.
    let q = 1.0 / (2f32.powf(1.0 / 36.0) - 1.0);
    let spectrum = LogFrequencySpectrum::new(
        0,
        vec![1.0; 4],
        vec![0.0; 4],
        vec![100.0, 200.0, 400.0, 800.0],
        q,
        AudioFormat::mono(11025.0),
    )
    .unwrap();
    assert!((spectrum.bins_per_semitone() - 3.0).abs() < 1e-3);
    assert_eq!(spectrum.bin(410.0), Some(2));
}

#[test]
fn instantaneous_frequency_tracks_phase_advance() {
    let n = 8usize;
    let sample_rate = 800.0;
    let hop = 2u64;
    // First spectrum with zero phase everywhere, second with exactly
    // the phase advance a stationary tone accrues over the hop.
    let first = LinearFrequencySpectrum::new(
        0,
        vec![1.0; n],
        vec![0.0; n],
        AudioFormat::mono(sample_rate),
    );
    let mut real = vec![0.0; n];
    let mut imaginary = vec![0.0; n];
    for k in 0..n / 2 {
        let phase = 2.0 * std::f32::consts::PI * k as f32 * hop as f32 / n as f32;
        real[k] = phase.cos();
        imaginary[k] = phase.sin();
    }
    let second =
        LinearFrequencySpectrum::new(hop, real, imaginary, AudioFormat::mono(sample_rate));
    let derived = InstantaneousFrequencySpectrum::from_spectra(&first, &second);
    for k in 0..(n / 2) as i64 {
        assert!(
            (derived.frequency(k) - k as f32 * derived.bandwidth()).abs() < 1e-3,
            "bin {k}: {} vs {}",
            derived.frequency(k),
            k as f32 * derived.bandwidth()
        );
    }
}

#[test]
fn identical_spectra_yield_zero_instantaneous_frequencies() {
    let spectrum = spectrum_of(vec![1.0, 2.0, 3.0, 4.0], 400.0);
    let derived = InstantaneousFrequencySpectrum::from_spectra(&spectrum, &spectrum.clone());
    assert_eq!(derived.frequencies(), &[0.0, 0.0]);
}

#[test]
fn multi_band_spectrum_aggregates_and_looks_up() {
    let source = spectrum_of(vec![1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0], 800.0);
    let bands = MultiBandSpectrum::from_spectrum(&source, vec![0.0, 150.0, 350.0]).unwrap();
    assert_eq!(bands.len(), 2);
    assert!(is_near(bands.data(), &[5f32.sqrt(), 25f32.sqrt()], 1e-5));
    assert_eq!(bands.bin(100.0), Some(0));
    assert_eq!(bands.bin(340.0), Some(1));
    assert_eq!(bands.bin(350.0), None);
    // Band centres round-trip through bin lookup.
    for band in 0..2i64 {
        assert_eq!(bands.bin(bands.frequency(band)), Some(band as usize));
    }
}

#[test]
fn mel_spectrum_weights_with_triangles() {
    let source = spectrum_of(vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 800.0);
    // Channel 0 peaks at 100 Hz, channel 1 at 200 Hz; the only energy
    // sits exactly on channel 0's peak.
    let mel = MelSpectrum::from_spectrum(&source, vec![0.0, 100.0, 200.0, 300.0]).unwrap();
    assert!((mel.data()[0] - 1.0).abs() < 1e-6);
    assert_eq!(mel.data()[1], 0.0);
    assert_eq!(mel.frequency(0), 100.0);
    assert_eq!(mel.bin(90.0), Some(0));
    assert_eq!(mel.bin(310.0), None);
}

#[test]
fn audio_matrix_exposes_row_zero() {
    let matrix = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    let frame = AudioMatrix::new(7, matrix, AudioFormat::mono(100.0));
    assert_eq!(frame.data(), &[1.0, 2.0, 3.0]);
    assert_eq!(frame.len(), 3);
    assert_eq!(frame.frame_index(), 7);
    assert_eq!(frame.matrix().get(1, 2), 6.0);
}

#[test]
fn log_spectrum_shift_derivation() {
    let spectrum = LogFrequencySpectrum::new(
        3,
        vec![1.0, 2.0, 3.0],
        vec![0.1, 0.2, 0.3],
        vec![100.0, 200.0, 400.0],
        17.0,
        AudioFormat::mono(8000.0),
    )
    .unwrap();
    let shifted = spectrum.shift(1);
    assert_eq!(shifted.real(), &[0.0, 1.0, 2.0]);
    assert_eq!(shifted.imaginary(), &[0.0, 0.1, 0.2]);
    assert_eq!(shifted.frame_index(), 3);
}
