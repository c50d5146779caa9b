// crates/vidtex-core/src/config.rs
//
// PlaybackConfig: the knobs a host can set on a player. Every field has a
// default matching the usual 50ms-slack pacing, so `PlaybackConfig::default()`
// is what most hosts want. Hosts that ship a settings file can deserialize it
// from JSON; unknown fields are rejected.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PlaybackError;

/// Slack added to the sleep debt when a decoded frame is still in the future.
pub const DEFAULT_SLEEP_TOLERANCE_MS: u64 = 50;

/// How each published picture is serialized before the host decodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitmapFormat {
    /// Uncompressed Windows bitmap.
    #[default]
    Bmp,
    /// Lossless PNG; smaller blobs, more CPU per frame.
    Png,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackConfig {
    pub sleep_tolerance_ms: u64,
    pub placeholder_width:  u32,
    pub placeholder_height: u32,
    /// Host asset used as the stopped-state frame instead of a generated one.
    pub placeholder_asset:  Option<PathBuf>,
    pub bitmap_format:      BitmapFormat,
    /// Extra reads allowed per tick after a demux error the backend marks as
    /// transient. 0 = every demux error ends playback.
    pub transient_retry_limit: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sleep_tolerance_ms:    DEFAULT_SLEEP_TOLERANCE_MS,
            placeholder_width:     1,
            placeholder_height:    1,
            placeholder_asset:     None,
            bitmap_format:         BitmapFormat::Bmp,
            transient_retry_limit: 0,
        }
    }
}

impl PlaybackConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s).context("parsing playback config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading playback config {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("loading playback config {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), PlaybackError> {
        if self.placeholder_width == 0 || self.placeholder_height == 0 {
            return Err(PlaybackError::InvalidConfig(format!(
                "placeholder size {}x{} must be non-zero",
                self.placeholder_width, self.placeholder_height,
            )));
        }
        Ok(())
    }

    pub fn sleep_tolerance_us(&self) -> i64 {
        (self.sleep_tolerance_ms as i64).saturating_mul(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_fifty_ms_tolerance() {
        let c = PlaybackConfig::default();
        assert_eq!(c.sleep_tolerance_ms, 50);
        assert_eq!(c.sleep_tolerance_us(), 50_000);
        assert_eq!(c.bitmap_format, BitmapFormat::Bmp);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = PlaybackConfig::from_json_str(r#"{ "bitmap_format": "png", "sleep_tolerance_ms": 20 }"#).unwrap();
        assert_eq!(c.bitmap_format, BitmapFormat::Png);
        assert_eq!(c.sleep_tolerance_ms, 20);
        assert_eq!(c.placeholder_width, 1);
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(PlaybackConfig::from_json_str(r#"{ "speed": 2.0 }"#).is_err());
    }

    #[test]
    fn zero_placeholder_is_invalid() {
        let c = PlaybackConfig { placeholder_width: 0, ..PlaybackConfig::default() };
        assert!(matches!(c.validate(), Err(PlaybackError::InvalidConfig(_))));
        assert!(PlaybackConfig::from_json_str(r#"{ "placeholder_height": 0 }"#).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = PlaybackConfig::load(Path::new("/nonexistent/vidtex.json")).unwrap_err();
        assert!(format!("{err:#}").contains("reading playback config"));
    }
}
