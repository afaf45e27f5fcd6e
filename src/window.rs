//! Analysis window functions as mapping factories.

use crate::frame::{Frame, RealFrame};
use crate::mapping::Mapping;
use std::f32::consts::PI;
use std::fmt;

/// The classic analysis windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowFunction {
    Hamming,
    Hann,
    Blackman,
    Triangle,
}

impl WindowFunction {
    /// Window coefficient `i` of an `n`-point window.
    pub fn value(&self, i: usize, n: usize) -> f32 {
        if n < 2 {
            return 1.0;
        }
        let phase = i as f32 / (n - 1) as f32;
        match self {
            WindowFunction::Hamming => 0.54 - 0.46 * (2.0 * PI * phase).cos(),
            WindowFunction::Hann => 0.5 - 0.5 * (2.0 * PI * phase).cos(),
            WindowFunction::Blackman => {
                0.42 - 0.5 * (2.0 * PI * phase).cos() + 0.08 * (4.0 * PI * phase).cos()
            }
            WindowFunction::Triangle => 1.0 - (2.0 * phase - 1.0).abs(),
        }
    }

    /// All coefficients of an `n`-point window.
    pub fn coefficients(&self, n: usize) -> Vec<f32> {
        (0..n).map(|i| self.value(i, n)).collect()
    }
}

impl fmt::Display for WindowFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WindowFunction::Hamming => "Hamming",
            WindowFunction::Hann => "Hann",
            WindowFunction::Blackman => "Blackman",
            WindowFunction::Triangle => "Triangle",
        };
        f.write_str(name)
    }
}

/// A mapping node that scales every frame by the window of its length.
///
/// Coefficients are cached and recomputed only when the frame length
/// changes.
pub fn mapping(function: WindowFunction) -> Mapping<RealFrame, RealFrame> {
    let mut coefficients: Vec<f32> = Vec::new();
    Mapping::labeled(function.to_string(), move |frame: &RealFrame| {
        if coefficients.len() != frame.real().len() {
            coefficients = function.coefficients(frame.real().len());
        }
        let samples = frame
            .real()
            .iter()
            .zip(&coefficients)
            .map(|(x, w)| x * w)
            .collect();
        Ok(frame.derive(samples))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hamming_endpoints_and_peak() {
        let w = WindowFunction::Hamming.coefficients(11);
        assert!((w[0] - 0.08).abs() < 1e-6);
        assert!((w[10] - 0.08).abs() < 1e-6);
        assert!((w[5] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn hann_is_zero_at_edges() {
        let w = WindowFunction::Hann.coefficients(9);
        assert!(w[0].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
        assert!(w[8].abs() < 1e-6);
    }
}
