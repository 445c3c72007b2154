/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

use serde::{Deserialize, Serialize};

use crate::{JitterBufferError, Result};

/// Default slack (ms) tolerated above the target before shrinking
pub const DEFAULT_EXTRA_DELAY_MS: i64 = 30;
/// Default cooldown (ms) between two grow steps
pub const DEFAULT_WAIT_GROW_MS: i64 = 60;
/// Default cooldown (ms) between two shrink steps
pub const DEFAULT_WAIT_SHRINK_MS: i64 = 250;
/// Default target/current gap (ms) treated as a timestamp discontinuity
pub const DEFAULT_MAX_DIFF_MS: i64 = 6000;

/// Jitter buffer settings as exchanged with callers.
///
/// A zero field means "not set": `min_jb`, `max_jb` and
/// `max_successive_interp` are disabled at zero, and passing zero to
/// [`crate::JitterBuffer::set_settings`] leaves the current value unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Lower clamp on the buffer delay in milliseconds (0 = no clamp)
    pub min_jb: i64,
    /// Upper clamp on the buffer delay in milliseconds (0 = no clamp)
    pub max_jb: i64,
    /// Interpolations in a row before forcing silence (0 = unlimited)
    pub max_successive_interp: i64,
    /// Slack in milliseconds before the buffer shrinks
    pub extra_delay: i64,
    /// Milliseconds between two grow steps
    pub wait_grow: i64,
    /// Milliseconds between two shrink steps
    pub wait_shrink: i64,
    /// Largest target/current gap in milliseconds before resetting
    pub max_diff: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_jb: 0,
            max_jb: 0,
            max_successive_interp: 0,
            extra_delay: DEFAULT_EXTRA_DELAY_MS,
            wait_grow: DEFAULT_WAIT_GROW_MS,
            wait_shrink: DEFAULT_WAIT_SHRINK_MS,
            max_diff: DEFAULT_MAX_DIFF_MS,
        }
    }
}

impl Settings {
    /// Reject negative values, which have no meaning for any field
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("min_jb", self.min_jb),
            ("max_jb", self.max_jb),
            ("max_successive_interp", self.max_successive_interp),
            ("extra_delay", self.extra_delay),
            ("wait_grow", self.wait_grow),
            ("wait_shrink", self.wait_shrink),
            ("max_diff", self.max_diff),
        ];
        for (name, value) in fields {
            if value < 0 {
                return Err(JitterBufferError::InvalidSettings(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Settings as the playout logic consumes them, with unset fields explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tuning {
    pub min_jb: Option<i64>,
    pub max_jb: Option<i64>,
    pub max_successive_interp: Option<i64>,
    pub extra_delay: i64,
    pub wait_grow: i64,
    pub wait_shrink: i64,
    pub max_diff: i64,
}

impl Default for Tuning {
    fn default() -> Self {
        let defaults = Settings::default();
        Self {
            min_jb: set(defaults.min_jb),
            max_jb: set(defaults.max_jb),
            max_successive_interp: set(defaults.max_successive_interp),
            extra_delay: defaults.extra_delay,
            wait_grow: defaults.wait_grow,
            wait_shrink: defaults.wait_shrink,
            max_diff: defaults.max_diff,
        }
    }
}

impl Tuning {
    /// Overwrite every field that is non-zero in `settings`
    pub fn apply(&mut self, settings: &Settings) -> Result<()> {
        settings.validate()?;

        if let Some(v) = set(settings.min_jb) {
            self.min_jb = Some(v);
        }
        if let Some(v) = set(settings.max_jb) {
            self.max_jb = Some(v);
        }
        if let Some(v) = set(settings.max_successive_interp) {
            self.max_successive_interp = Some(v);
        }
        self.extra_delay = set(settings.extra_delay).unwrap_or(self.extra_delay);
        self.wait_grow = set(settings.wait_grow).unwrap_or(self.wait_grow);
        self.wait_shrink = set(settings.wait_shrink).unwrap_or(self.wait_shrink);
        self.max_diff = set(settings.max_diff).unwrap_or(self.max_diff);
        Ok(())
    }

    pub fn to_settings(self) -> Settings {
        Settings {
            min_jb: self.min_jb.unwrap_or(0),
            max_jb: self.max_jb.unwrap_or(0),
            max_successive_interp: self.max_successive_interp.unwrap_or(0),
            extra_delay: self.extra_delay,
            wait_grow: self.wait_grow,
            wait_shrink: self.wait_shrink,
            max_diff: self.max_diff,
        }
    }
}

fn set(value: i64) -> Option<i64> {
    (value != 0).then_some(value)
}
