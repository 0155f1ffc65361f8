//! Settings persistence using TOML
//!
//! Stores settings in ~/.config/versus-tetrs/settings.toml (or platform
//! equivalent)

use crate::board::Handling;
use crate::error::SettingsError;
use crate::matchmaking::DEFAULT_PORT;
use crate::ruleset::RulesetKind;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gameplay: GameplaySettings,
    pub network: NetworkSettings,
}

/// Gameplay settings, timings in 60 Hz frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplaySettings {
    /// Delayed Auto Shift
    pub das_frames: u32,
    /// Auto Repeat Rate, 0 slides straight to the wall
    pub arr_frames: u32,
    pub lock_delay_frames: u32,
    pub soft_drop_multiplier: f32,
    /// Lock delay is divided by this while soft dropping
    pub soft_drop_lock_divisor: u32,
    pub start_level: u32,
    /// Ruleset for hosted and joined rooms
    pub ruleset: RulesetKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Relay address as host:port
    pub server: String,
}

impl Default for GameplaySettings {
    fn default() -> Self {
        let handling = Handling::default();
        Self {
            das_frames: handling.das_frames,
            arr_frames: handling.arr_frames,
            lock_delay_frames: handling.lock_delay_frames,
            soft_drop_multiplier: handling.soft_drop_multiplier,
            soft_drop_lock_divisor: handling.soft_drop_lock_divisor,
            start_level: handling.start_level,
            ruleset: RulesetKind::default(),
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            server: format!("127.0.0.1:{DEFAULT_PORT}"),
        }
    }
}

impl GameplaySettings {
    /// Board timing, with out-of-range values pulled back to something playable
    pub fn handling(&self) -> Handling {
        Handling {
            das_frames: self.das_frames,
            arr_frames: self.arr_frames,
            lock_delay_frames: self.lock_delay_frames.max(1),
            soft_drop_multiplier: if self.soft_drop_multiplier.is_finite() {
                self.soft_drop_multiplier.max(1.0)
            } else {
                1.0
            },
            soft_drop_lock_divisor: self.soft_drop_lock_divisor.max(1),
            start_level: self.start_level.max(1),
        }
    }
}

impl Settings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "versus-tetrs", "versus-tetrs")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.toml"))
    }

    /// Load settings from the config dir, or defaults when there is no
    /// usable file
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!("ignoring settings at {}: {e}", path.display());
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save settings to the config dir
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
