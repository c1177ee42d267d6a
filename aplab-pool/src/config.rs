//! Configuration for aplab-pool
//!
//! Bootstrap TOML only; nothing is persisted at runtime.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--port, --preset, --interval)
//! 2. TOML configuration file (--config, then APLAB_CONFIG, then the platform
//!    config directory)
//! 3. Preset values
//! 4. Built-in defaults (code constants)
//!
//! A preset fixes the experiment shape (pool size, playlist length, interval,
//! activation mode). The `[run]` table overrides individual preset values.

use aplab_common::config::{load_or_default, resolve_config_path, LoggingConfig, CONFIG_ENV_VAR};
use aplab_common::time::millis_to_duration;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};
use crate::playback::playlist::{expand, ExtendedPlaylist, PlaylistItem};
use crate::playback::pool::ActivationMode;
use crate::playback::sequencer::{SequencerSettings, INTERVAL_RANGE};
use crate::playback::simulated::SimulatorConfig;

/// Experiment shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// 3 slots cover a 30-item playlist, activated one after another
    #[default]
    Pooled,
    /// One slot per position, all activated at once
    Preactivate,
    /// One slot per base item, no activation, slow interval
    Timeline,
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Preset::Pooled => "pooled",
            Preset::Preactivate => "preactivate",
            Preset::Timeline => "timeline",
        };
        f.write_str(name)
    }
}

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// HTTP server port
    ///
    /// Default: 5790
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub preset: Preset,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-field overrides of the preset
    #[serde(default)]
    pub run: RunOverrides,

    /// Base list of media items
    #[serde(default = "default_playlist")]
    pub playlist: Vec<PlaylistItem>,

    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            preset: Preset::default(),
            logging: LoggingConfig::default(),
            run: RunOverrides::default(),
            playlist: default_playlist(),
            simulator: SimulatorConfig::default(),
        }
    }
}

/// `[run]` table
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct RunOverrides {
    pub pool_size: Option<usize>,
    pub playlist_length: Option<usize>,
    pub interval_seconds: Option<u32>,
    pub settle_delay_ms: Option<u64>,
    pub activation: Option<ActivationMode>,
}

fn default_port() -> u16 {
    5790
}

const SAMPLE_BUCKET: &str = "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample";

fn default_playlist() -> Vec<PlaylistItem> {
    ["Escapes", "Joyrides", "Meltdowns"]
        .iter()
        .map(|name| PlaylistItem::new(format!("{}/ForBigger{}.mp4", SAMPLE_BUCKET, name), *name, 15))
        .collect()
}

/// Fully resolved run parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub preset: Preset,
    pub pool_size: usize,
    pub playlist_length: usize,
    pub interval_seconds: u32,
    pub settle_delay_ms: u64,
    pub activation: ActivationMode,
    pub base: Vec<PlaylistItem>,
}

impl RunConfig {
    /// Values a preset prescribes for a base list of `base_len` items
    pub fn for_preset(preset: Preset, base: Vec<PlaylistItem>) -> Self {
        let base_len = base.len();
        let (pool_size, playlist_length, interval_seconds, activation) = match preset {
            Preset::Pooled => (3, 30, 1, ActivationMode::Sequential),
            Preset::Preactivate => (30, 30, 1, ActivationMode::Concurrent),
            Preset::Timeline => (base_len, base_len, 5, ActivationMode::None),
        };
        Self {
            preset,
            pool_size,
            playlist_length,
            interval_seconds,
            settle_delay_ms: 100,
            activation,
            base,
        }
    }

    /// Reject shapes the scheduler cannot run
    pub fn validate(&self) -> Result<()> {
        if self.base.is_empty() {
            return Err(Error::Config("playlist must contain at least one item".to_string()));
        }
        if let Some(item) = self.base.iter().find(|i| i.source.trim().is_empty()) {
            return Err(Error::Config(format!("playlist item '{}' has an empty source", item.label)));
        }
        if self.pool_size == 0 {
            return Err(Error::Config("pool_size must be at least 1".to_string()));
        }
        if self.pool_size > self.playlist_length {
            return Err(Error::Config(format!(
                "pool_size ({}) must not exceed playlist_length ({})",
                self.pool_size, self.playlist_length
            )));
        }
        if !INTERVAL_RANGE.contains(&self.interval_seconds) {
            return Err(Error::Config(format!(
                "interval_seconds must be within {}..={}, got {}",
                INTERVAL_RANGE.start(),
                INTERVAL_RANGE.end(),
                self.interval_seconds
            )));
        }
        Ok(())
    }

    pub fn settings(&self) -> SequencerSettings {
        SequencerSettings {
            pool_size: self.pool_size,
            interval_seconds: self.interval_seconds,
            settle_delay: millis_to_duration(self.settle_delay_ms),
            activation: self.activation,
        }
    }

    pub fn extended_playlist(&self) -> ExtendedPlaylist {
        expand(&self.base, self.playlist_length)
    }
}

impl TomlConfig {
    /// Resolve and load the config file, or defaults when there is none
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR);
        let config: Self = load_or_default(path.as_deref())?;
        Ok(config)
    }

    /// Preset values with `[run]` overrides applied, validated
    pub fn run_config(&self) -> Result<RunConfig> {
        let mut run = RunConfig::for_preset(self.preset, self.playlist.clone());
        let overrides = &self.run;

        if let Some(pool_size) = overrides.pool_size {
            run.pool_size = pool_size;
        }
        if let Some(length) = overrides.playlist_length {
            run.playlist_length = length;
        }
        if let Some(seconds) = overrides.interval_seconds {
            run.interval_seconds = seconds;
        }
        if let Some(ms) = overrides.settle_delay_ms {
            run.settle_delay_ms = ms;
        }
        if let Some(mode) = overrides.activation {
            run.activation = mode;
        }

        run.validate()?;
        info!(
            "Run config: preset={} K={} N={} interval={}s activation={:?}",
            run.preset, run.pool_size, run.playlist_length, run.interval_seconds, run.activation
        );
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_pooled() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5790);
        assert_eq!(config.playlist.len(), 3);

        let run = config.run_config().unwrap();
        assert_eq!(run.pool_size, 3);
        assert_eq!(run.playlist_length, 30);
        assert_eq!(run.activation, ActivationMode::Sequential);
        assert_eq!(run.extended_playlist().len(), 30);
    }

    #[test]
    fn test_presets() {
        let base = default_playlist();

        let pre = RunConfig::for_preset(Preset::Preactivate, base.clone());
        assert_eq!((pre.pool_size, pre.playlist_length), (30, 30));
        assert_eq!(pre.activation, ActivationMode::Concurrent);

        let timeline = RunConfig::for_preset(Preset::Timeline, base);
        assert_eq!((timeline.pool_size, timeline.playlist_length), (3, 3));
        assert_eq!(timeline.interval_seconds, 5);
        assert_eq!(timeline.activation, ActivationMode::None);
    }

    #[test]
    fn test_overrides_from_toml() {
        let config: TomlConfig = toml::from_str(
            r#"
            preset = "timeline"

            [run]
            interval_seconds = 2
            activation = "sequential"

            [[playlist]]
            source = "/api/video?delay=5000"
            label = "Slow"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 5790);
        let run = config.run_config().unwrap();
        assert_eq!(run.pool_size, 1);
        assert_eq!(run.playlist_length, 1);
        assert_eq!(run.interval_seconds, 2);
        assert_eq!(run.activation, ActivationMode::Sequential);
        assert_eq!(run.base[0].duration_hint_secs, 0);
    }

    #[test]
    fn test_validation_rejects_bad_shapes() {
        let mut run = RunConfig::for_preset(Preset::Pooled, default_playlist());
        run.pool_size = 31;
        assert!(matches!(run.validate(), Err(Error::Config(_))));

        let mut run = RunConfig::for_preset(Preset::Pooled, default_playlist());
        run.interval_seconds = 0;
        assert!(run.validate().is_err());

        let run = RunConfig::for_preset(Preset::Pooled, Vec::new());
        assert!(run.validate().is_err());
    }
}
