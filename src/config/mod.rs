// Engine configuration
// Tunables for the transport, the marker/loop engine and the recording pipeline.
// Stored as RON next to the other per-user settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = "stemloop";
const CONFIG_FILE_NAME: &str = "config.ron";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Transport tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Slowest allowed playback rate
    pub min_playback_rate: f64,
    /// Fastest allowed playback rate
    pub max_playback_rate: f64,
    /// Maximum processed time updates per second and per track
    pub time_update_hz: f64,
    /// Drift (seconds) after which the UI clock is committed to `PlaybackState`
    pub clock_commit_interval: f64,
    /// Maximum number of tracks in one project
    pub max_tracks: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            min_playback_rate: 0.25,
            max_playback_rate: 4.0,
            time_update_hz: 50.0,
            clock_commit_interval: 0.25,
            max_tracks: 16,
        }
    }
}

impl TransportConfig {
    /// Minimum media-time distance between two processed updates of one track
    pub fn time_update_interval(&self) -> f64 {
        1.0 / self.time_update_hz
    }
}

/// Marker / loop tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub max_markers: usize,
    pub max_loops: usize,
    /// Gestures shorter than this (seconds) are taps and create a single marker
    pub tap_threshold: f64,
    /// Pointer-down closer than this fraction of the duration grabs an existing marker
    pub drag_proximity_ratio: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_markers: 20,
            max_loops: 10,
            tap_threshold: 0.5,
            drag_proximity_ratio: 0.02,
        }
    }
}

/// Recording pipeline tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Output sample rate of recorded takes
    pub sample_rate: u32,
    /// Peak level a take is normalized to
    pub normalize_target: f32,
    /// Takes already peaking at or above this level are left untouched
    pub normalize_skip_threshold: f32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            normalize_target: 0.95,
            normalize_skip_threshold: 0.99,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub transport: TransportConfig,
    pub loops: LoopConfig,
    pub recording: RecordingConfig,
    pub queues: QueueConfig,
}

/// Ring buffer capacities and history depth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub event_capacity: usize,
    pub notification_capacity: usize,
    pub undo_depth: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            notification_capacity: 256,
            undo_depth: 100,
        }
    }
}

impl EngineConfig {
    /// Default location: `<config dir>/stemloop/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load and validate a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = ron::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, falling back to defaults
    ///
    /// A missing file is not an error. A broken file is logged and ignored.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "Ignoring config file {}: {}, using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Write the config as pretty RON, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.validate()?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.transport;
        if !(t.min_playback_rate > 0.0 && t.min_playback_rate <= t.max_playback_rate) {
            return Err(ConfigError::Invalid(format!(
                "Playback rate range [{}, {}] is invalid",
                t.min_playback_rate, t.max_playback_rate
            )));
        }
        if t.time_update_hz <= 0.0 {
            return Err(ConfigError::Invalid(
                "Time update rate must be positive".to_string(),
            ));
        }
        if t.clock_commit_interval < 0.0 {
            return Err(ConfigError::Invalid(
                "Clock commit interval cannot be negative".to_string(),
            ));
        }
        if t.max_tracks == 0 {
            return Err(ConfigError::Invalid(
                "Track limit must be at least 1".to_string(),
            ));
        }

        let l = &self.loops;
        if l.max_markers < 2 || l.max_loops == 0 {
            return Err(ConfigError::Invalid(
                "Marker limit must be at least 2 and loop limit at least 1".to_string(),
            ));
        }
        if l.tap_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "Tap threshold cannot be negative".to_string(),
            ));
        }
        if !(0.0..0.5).contains(&l.drag_proximity_ratio) {
            return Err(ConfigError::Invalid(
                "Drag proximity ratio must be in [0, 0.5)".to_string(),
            ));
        }

        let r = &self.recording;
        if !(8000..=192000).contains(&r.sample_rate) {
            return Err(ConfigError::Invalid(
                "Recording sample rate must be between 8000 and 192000 Hz".to_string(),
            ));
        }
        if !(r.normalize_target > 0.0 && r.normalize_target <= 1.0) {
            return Err(ConfigError::Invalid(
                "Normalization target must be in (0, 1]".to_string(),
            ));
        }
        if r.normalize_skip_threshold < r.normalize_target {
            return Err(ConfigError::Invalid(
                "Normalization skip threshold must not be below the target".to_string(),
            ));
        }

        let q = &self.queues;
        if q.event_capacity == 0 || q.notification_capacity == 0 {
            return Err(ConfigError::Invalid(
                "Queue capacities must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.loops.max_markers, 20);
        assert_eq!(config.loops.max_loops, 10);
        assert_eq!(config.transport.max_playback_rate, 4.0);
        assert_eq!(config.recording.normalize_target, 0.95);
    }

    #[test]
    fn test_time_update_interval() {
        let config = TransportConfig::default();
        assert!((config.time_update_interval() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ron");

        let mut config = EngineConfig::default();
        config.loops.tap_threshold = 0.3;
        config.recording.sample_rate = 44100;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(&path, "(loops: (max_markers: 8))").unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.loops.max_markers, 8);
        assert_eq!(loaded.loops.max_loops, 10);
        assert_eq!(loaded.transport, TransportConfig::default());
    }

    #[test]
    fn test_invalid_rate_range_rejected() {
        let mut config = EngineConfig::default();
        config.transport.min_playback_rate = 5.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Playback rate range"));
    }

    #[test]
    fn test_invalid_normalization_rejected() {
        let mut config = EngineConfig::default();
        config.recording.normalize_skip_threshold = 0.5;
        assert!(config.validate().is_err());
    }
}
