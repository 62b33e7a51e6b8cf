//! Explicit configuration for capture sessions and replay runs
//!
//! Command-line strings are parsed here (time specs such as `15s` or `3h`,
//! call-time constraints such as `5s/10/100`) into plain structs that the
//! capture and replay cores take by value. Nothing here is global.

use std::collections::BTreeMap;

use crate::domain::{ConfigError, Millis, SpeedFactor};

/// Default reorder tolerance (events held back before the oldest is emitted)
pub const DEFAULT_REORDER_TOLERANCE: usize = 1000;

/// Default capture and run duration: one hour
pub const DEFAULT_DURATION: Millis = Millis(60 * 60 * 1000);

/// Default call-time constraint: 10 of the last 100 calls slower than 5s
pub const DEFAULT_CALLTIME: &str = "5s/10/100";

/// Parse a time spec: a positive integer followed by `s`, `m`, `h` or `d`
///
/// # Errors
/// Returns `ConfigError::InvalidTimeSpec` for anything else, including zero.
pub fn parse_time_spec(spec: &str) -> Result<Millis, ConfigError> {
    let invalid = || ConfigError::InvalidTimeSpec(spec.to_string());

    let split = spec.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
    let (number, unit) = spec.split_at(split);
    let number: u64 = number.parse().map_err(|_| invalid())?;
    if number < 1 {
        return Err(invalid());
    }

    let unit_ms: u64 = match unit.to_ascii_lowercase().as_str() {
        "s" => 1000,
        "m" => 60 * 1000,
        "h" => 60 * 60 * 1000,
        "d" => 24 * 60 * 60 * 1000,
        _ => return Err(invalid()),
    };
    number.checked_mul(unit_ms).map(Millis).ok_or_else(invalid)
}

/// Parse the replay speed percentage (`0` = full throttle)
///
/// # Errors
/// Returns `ConfigError::InvalidSpeed` if the value is not a non-negative integer.
pub fn parse_speed(value: &str) -> Result<SpeedFactor, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map(SpeedFactor::new)
        .map_err(|_| ConfigError::InvalidSpeed(value.to_string()))
}

/// Parse a line limit (at least 1)
///
/// # Errors
/// Returns `ConfigError::InvalidLimit` for zero or non-numeric values.
pub fn parse_limit(value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(limit) if limit >= 1 => Ok(limit),
        _ => Err(ConfigError::InvalidLimit),
    }
}

/// Sliding-window call-time breaker settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthConfig {
    /// Calls strictly slower than this count as exceeding
    pub cutoff: Millis,
    /// Breach once more than this many exceeding calls are in the window
    pub max_exceeding: usize,
    /// Number of most recent calls considered
    pub window_size: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { cutoff: Millis(5000), max_exceeding: 10, window_size: 100 }
    }
}

impl HealthConfig {
    /// Parse `CUTOFF/MAX-CALLS/WINDOW`, e.g. `5s/10/100`
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidCallTime` if any part is missing or invalid.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidCallTime(spec.to_string());

        let mut parts = spec.splitn(3, '/');
        let (Some(cutoff), Some(max), Some(window)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let cutoff = parse_time_spec(cutoff).map_err(|_| invalid())?;
        let max_exceeding: usize = max.parse().map_err(|_| invalid())?;
        let window_size: usize = window.parse().map_err(|_| invalid())?;
        if window_size == 0 {
            return Err(invalid());
        }

        Ok(Self { cutoff, max_exceeding, window_size })
    }
}

impl std::fmt::Display for HealthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.cutoff.0, self.max_exceeding, self.window_size)
    }
}

/// Settings of one capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Events held in the reorder buffer before the oldest is forced out
    pub reorder_tolerance: usize,
    /// Stop once an emitted event is further than this from the first one
    pub duration_limit: Millis,
    /// Stop after this many emitted events
    pub line_limit: u64,
    /// Keep only events tagged with this application
    pub application: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            reorder_tolerance: DEFAULT_REORDER_TOLERANCE,
            duration_limit: DEFAULT_DURATION,
            line_limit: u64::MAX,
            application: None,
        }
    }
}

/// Settings of one replay run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayConfig {
    pub speed: SpeedFactor,
    /// Stop dispatching once the run has taken this long
    pub duration_limit: Millis,
    /// Only replay entries recorded within this offset
    pub replay_time: Millis,
    /// Stop after this many trace lines
    pub line_limit: u64,
    pub health: HealthConfig,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed: SpeedFactor::ORIGINAL,
            duration_limit: DEFAULT_DURATION,
            replay_time: DEFAULT_DURATION,
            line_limit: u64::MAX,
            health: HealthConfig::default(),
        }
    }
}

impl ReplayConfig {
    /// Settings as they appear under `configuration` in the run report
    #[must_use]
    pub fn effective_settings(&self) -> BTreeMap<String, String> {
        let mut settings = BTreeMap::new();
        settings.insert("durationConstraint".to_string(), self.duration_limit.0.to_string());
        settings.insert("replayTime".to_string(), self.replay_time.0.to_string());
        settings.insert("callConstraint".to_string(), self.health.to_string());
        settings.insert("limit".to_string(), self.line_limit.to_string());
        settings.insert("replay".to_string(), self.speed.percent().to_string());
        settings
    }
}
