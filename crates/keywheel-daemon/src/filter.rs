use keywheel_proto::config::FilterConfig;
use keywheel_proto::protocol::FilterCommand;

use crate::track::TrackRecord;

/// Highest key distance still considered mixable.
const MAX_COMPATIBLE_DISTANCE: i32 = 3;

/// Open tempo interval, `lower < bpm < upper`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpmWindow {
    pub lower: f64,
    pub upper: f64,
}

impl BpmWindow {
    pub fn contains(&self, bpm: f64) -> bool {
        bpm > self.lower && bpm < self.upper
    }
}

/// Tempo anchor, tolerance and the two filter switches.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub bpm_reference: f64,
    pub bpm_tolerance_percent: f64,
    pub bpm_filter_enabled: bool,
    pub key_filter_enabled: bool,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::from_config(&FilterConfig::default())
    }
}

impl FilterState {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            bpm_reference: config.bpm_reference,
            bpm_tolerance_percent: config.bpm_tolerance_percent,
            bpm_filter_enabled: config.bpm_filter,
            key_filter_enabled: config.key_filter,
        }
    }

    /// Window derived from the current reference and tolerance.  Computed on
    /// every call; never cached.
    pub fn window(&self) -> BpmWindow {
        let factor = 1.0 + self.bpm_tolerance_percent / 100.0;
        BpmWindow {
            lower: self.bpm_reference / factor,
            upper: self.bpm_reference * factor,
        }
    }

    /// Apply a UI command.  `key_filter` shadows `bpm_percent` when both are
    /// present.  Returns whether anything changed.
    pub fn apply(&mut self, cmd: &FilterCommand) -> bool {
        let mut changed = false;

        if let Some(enabled) = cmd.bpm_filter {
            if enabled != self.bpm_filter_enabled {
                self.bpm_filter_enabled = enabled;
                changed = true;
            }
        }

        if let Some(enabled) = cmd.key_filter {
            if enabled != self.key_filter_enabled {
                self.key_filter_enabled = enabled;
                changed = true;
            }
        } else if let Some(percent) = cmd.bpm_percent {
            if percent != self.bpm_tolerance_percent {
                self.bpm_tolerance_percent = percent;
                changed = true;
            }
        }

        changed
    }

    pub fn includes(&self, record: &TrackRecord) -> bool {
        include(record, self)
    }
}

/// Whether `record` passes both enabled filters.
pub fn include(record: &TrackRecord, state: &FilterState) -> bool {
    let bpm_ok = !state.bpm_filter_enabled || state.window().contains(record.bpm_value());
    let key_ok = !state.key_filter_enabled || record.key_distance() <= MAX_COMPATIBLE_DISTANCE;
    bpm_ok && key_ok
}
