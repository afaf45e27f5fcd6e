//! Audio format record and time units.

use std::fmt;

/// Time units for timestamp derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Seconds,
    Millis,
    Micros,
    Nanos,
}

impl TimeUnit {
    /// Number of this unit per second.
    #[inline]
    pub fn per_second(&self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Millis => 1_000,
            TimeUnit::Micros => 1_000_000,
            TimeUnit::Nanos => 1_000_000_000,
        }
    }
}

/// Compact description of a PCM stream.
///
/// Only the channel count and the sample rate affect graph semantics;
/// the remaining fields are carried through untouched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Sample size in bits.
    pub sample_size: u32,
    /// Number of interleaved channels.
    pub channels: u32,
    /// Signed or unsigned samples.
    pub signed: bool,
    /// Little-endian byte order.
    pub little_endian: bool,
}

impl AudioFormat {
    pub fn new(sample_rate: f32, sample_size: u32, channels: u32) -> Self {
        Self {
            sample_rate,
            sample_size,
            channels,
            signed: true,
            little_endian: true,
        }
    }

    /// Mono 32-bit float convenience format.
    pub fn mono(sample_rate: f32) -> Self {
        Self::new(sample_rate, 32, 1)
    }

    /// Stereo 32-bit float convenience format.
    pub fn stereo(sample_rate: f32) -> Self {
        Self::new(sample_rate, 32, 2)
    }

    /// Copy of this format with a different channel count.
    pub fn with_channels(&self, channels: u32) -> Self {
        Self { channels, ..*self }
    }

    /// Copy of this format with a different sample rate.
    pub fn with_sample_rate(&self, sample_rate: f32) -> Self {
        Self {
            sample_rate,
            ..*self
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz/{}bit/{}ch",
            self.sample_rate, self.sample_size, self.channels
        )
    }
}

/// Derive a timestamp from a frame index.
///
/// The result is `frame_index * unit / sample_rate`, truncated toward
/// zero. Integral sample rates take an exact 128-bit integer path so
/// that nanosecond requests cannot overflow 64-bit counters.
pub(crate) fn timestamp(frame_index: u64, sample_rate: f32, unit: TimeUnit) -> u64 {
    let per_second = unit.per_second();
    if sample_rate > 0.0 && sample_rate.fract() == 0.0 {
        let numerator = frame_index as u128 * per_second as u128;
        (numerator / sample_rate as u128) as u64
    } else {
        (frame_index as f64 * per_second as f64 / sample_rate as f64) as u64
    }
}
