//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep replay speeds and millisecond quantities from
//! being mixed up with plain counters in function signatures.

use std::fmt;

/// A span of time in whole milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Millis(pub u64);

impl Millis {
    #[must_use]
    pub fn as_duration(self) -> std::time::Duration {
        std::time::Duration::from_millis(self.0)
    }

    /// Whole milliseconds of a duration, saturating at `u64::MAX`
    #[must_use]
    pub fn from_duration(duration: std::time::Duration) -> Self {
        Self(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Millis {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1000 {
            write!(f, "{:.2}s", self.0 as f64 / 1000.0)
        } else {
            write!(f, "{}ms", self.0)
        }
    }
}

/// Replay speed as a percentage of the recorded speed
///
/// 100 replays at the original pace, 200 twice as fast, 50 at half speed.
/// 0 is "full throttle": no pacing at all, and no percentiles are computed
/// because per-call latencies under unbounded concurrency say little.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpeedFactor(u32);

impl SpeedFactor {
    pub const ORIGINAL: Self = Self(100);
    pub const FULL_THROTTLE: Self = Self(0);

    #[must_use]
    pub const fn new(percent: u32) -> Self {
        Self(percent)
    }

    #[must_use]
    pub const fn percent(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_full_throttle(self) -> bool {
        self.0 == 0
    }

    /// Wall-clock offset at which a call recorded at `original` should leave
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn scale(self, original: Millis) -> Millis {
        if self.is_full_throttle() {
            return Millis(0);
        }
        let factor = 100.0 / f64::from(self.0);
        Millis((original.0 as f64 * factor) as u64)
    }
}

impl Default for SpeedFactor {
    fn default() -> Self {
        Self::ORIGINAL
    }
}

impl fmt::Display for SpeedFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_full_throttle() {
            write!(f, "full-throttle")
        } else {
            write!(f, "{}%", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_display() {
        assert_eq!(Millis(250).to_string(), "250ms");
        assert_eq!(Millis(1500).to_string(), "1.50s");
    }

    #[test]
    fn test_millis_duration_conversion() {
        let d = std::time::Duration::from_micros(2_500_900);
        assert_eq!(Millis::from_duration(d), Millis(2500));
        assert_eq!(Millis(40).as_duration(), std::time::Duration::from_millis(40));
    }

    #[test]
    fn test_speed_scaling() {
        assert_eq!(SpeedFactor::ORIGINAL.scale(Millis(1000)), Millis(1000));
        assert_eq!(SpeedFactor::new(200).scale(Millis(1000)), Millis(500));
        assert_eq!(SpeedFactor::new(50).scale(Millis(1000)), Millis(2000));
    }

    #[test]
    fn test_full_throttle_never_waits() {
        assert!(SpeedFactor::FULL_THROTTLE.is_full_throttle());
        assert_eq!(SpeedFactor::FULL_THROTTLE.scale(Millis(60_000)), Millis(0));
        assert_eq!(SpeedFactor::FULL_THROTTLE.to_string(), "full-throttle");
    }
}
