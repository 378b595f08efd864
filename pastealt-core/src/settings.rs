use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::CoreError;

pub const DEFAULT_HISTORY_LIMIT: usize = 500;
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 500;
pub const HISTORY_LIMIT_RANGE: (usize, usize) = (1, 10_000);
pub const POLLING_INTERVAL_RANGE_MS: (u64, u64) = (100, 60_000);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelPosition {
    #[default]
    Bottom,
    Top,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
    Fr,
    De,
    Zh,
}

/// Process-wide configuration, stored as a flat JSON object.
///
/// Only `history_limit`, `polling_interval_ms`, `ignore_duplicates`,
/// `ignore_password_managers`, `clear_on_quit` and `paste_directly` are
/// consumed by the engine; the rest is kept for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub history_limit: usize,
    #[serde(rename = "pollingInterval")]
    pub polling_interval_ms: u64,
    pub ignore_duplicates: bool,
    pub ignore_password_managers: bool,
    pub clear_on_quit: bool,
    pub paste_directly: bool,
    pub launch_at_login: bool,
    pub show_in_dock: bool,
    pub hotkey: String,
    pub play_sound_on_copy: bool,
    pub panel_position: PanelPosition,
    pub language: Language,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            ignore_duplicates: true,
            ignore_password_managers: true,
            clear_on_quit: false,
            paste_directly: true,
            launch_at_login: false,
            show_in_dock: false,
            hotkey: "CommandOrControl+Shift+V".to_owned(),
            play_sound_on_copy: false,
            panel_position: PanelPosition::default(),
            language: Language::default(),
        }
    }
}

impl Settings {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Rejects values outside the supported ranges.
    pub fn validate(&self) -> Result<(), CoreError> {
        let (min_limit, max_limit) = HISTORY_LIMIT_RANGE;
        if !(min_limit..=max_limit).contains(&self.history_limit) {
            return Err(CoreError::InvalidSettings(format!(
                "historyLimit must be between {min_limit} and {max_limit}, got {}",
                self.history_limit
            )));
        }
        let (min_ms, max_ms) = POLLING_INTERVAL_RANGE_MS;
        if !(min_ms..=max_ms).contains(&self.polling_interval_ms) {
            return Err(CoreError::InvalidSettings(format!(
                "pollingInterval must be between {min_ms} and {max_ms} ms, got {}",
                self.polling_interval_ms
            )));
        }
        Ok(())
    }

    /// Clamps out-of-range values, for settings read back from disk.
    pub fn sanitized(mut self) -> Self {
        let (min_limit, max_limit) = HISTORY_LIMIT_RANGE;
        self.history_limit = self.history_limit.clamp(min_limit, max_limit);
        let (min_ms, max_ms) = POLLING_INTERVAL_RANGE_MS;
        self.polling_interval_ms = self.polling_interval_ms.clamp(min_ms, max_ms);
        self
    }
}
