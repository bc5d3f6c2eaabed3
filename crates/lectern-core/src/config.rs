// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// Every section has defaults, so a partial JSON file (or none at all) is a
// valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Top-level settings for preprocessing, recognition and document extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LecternConfig {
    pub assets: AssetConfig,
    pub preprocess: PreprocessConfig,
    pub recognition: RecognitionConfig,
    pub extraction: ExtractionConfig,
}

impl LecternConfig {
    /// Read a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&data)?;
        debug!(path = %path.as_ref().display(), "configuration loaded");
        Ok(config)
    }

    /// Read a configuration, falling back to defaults if the file is missing
    /// or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.as_ref().display(), %err, "using default configuration");
                Self::default()
            }
        }
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

/// Where language models come from and where they are materialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Read-only bundle holding one `<code>.traineddata` per language.
    pub bundle_dir: PathBuf,
    /// Writable directory; models are copied into `<data_dir>/tessdata`.
    pub data_dir: PathBuf,
    /// Files smaller than this are treated as corrupt.
    pub min_model_bytes: u64,
    /// Language used when nothing else is valid.
    pub default_language: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            bundle_dir: data_dir.join("bundle"),
            data_dir,
            min_model_bytes: 64 * 1024,
            default_language: "eng".into(),
        }
    }
}

/// Raster preprocessing bounds and contrast factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Longest edge allowed after resizing.
    pub max_dimension: u32,
    /// Shortest edge wanted after resizing.
    pub min_dimension: u32,
    /// Side of the square sampled by the quality analyser.
    pub sample_window: u32,
    pub contrast_high: f32,
    pub contrast_medium: f32,
    pub contrast_low: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2400,
            min_dimension: 600,
            sample_window: 100,
            contrast_high: 1.2,
            contrast_medium: 1.5,
            contrast_low: 2.0,
        }
    }
}

/// Confidence gates for the retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Below this confidence a short result triggers alternate segmentation passes.
    pub retry_floor: u8,
    /// Results shorter than this many characters count as "short" for retries.
    pub short_text_chars: usize,
    /// Below this confidence a very short result is reported as empty.
    pub hard_floor: u8,
    /// Results shorter than this many characters count as "short" for the hard floor.
    pub empty_text_chars: usize,
    /// A retry must beat the best confidence by at least this much.
    pub material_confidence_gain: u8,
    /// ...or be this many times longer...
    pub material_length_ratio: f32,
    /// ...while staying within this many points of the best confidence.
    pub comparable_confidence_band: u8,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            retry_floor: 60,
            short_text_chars: 50,
            hard_floor: 30,
            empty_text_chars: 10,
            material_confidence_gain: 10,
            material_length_ratio: 1.5,
            comparable_confidence_band: 5,
        }
    }
}

/// Page rendering and blank-page detection for documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Density for the bulk recognition pass.
    pub render_dpi: u32,
    /// Density for the one-off script detection pass on page 1.
    pub detection_dpi: u32,
    /// Rendered pages are capped to this many pixels on the long edge.
    pub max_render_dimension: u32,
    /// Longest edge of the document thumbnail.
    pub thumbnail_size: u32,
    /// Pages whose sampled brightness standard deviation is below this are blank.
    pub blank_stddev: f32,
    /// Samples per axis used by the blank-page check.
    pub blank_sample_grid: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            render_dpi: 300,
            detection_dpi: 100,
            max_render_dimension: 4000,
            thumbnail_size: 256,
            blank_stddev: 6.0,
            blank_sample_grid: 64,
        }
    }
}

/// Default data directory: `$XDG_DATA_HOME/lectern`, then
/// `~/.local/share/lectern`, then a relative fallback.
pub fn default_data_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg).join("lectern")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".local").join("share").join("lectern")
    } else {
        PathBuf::from("lectern-data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "preprocess": { "max_dimension": 1800 }, "recognition": { "retry_floor": 70 } }"#;
        let config: LecternConfig = serde_json::from_str(json).expect("valid config");
        assert_eq!(config.preprocess.max_dimension, 1800);
        assert_eq!(config.preprocess.min_dimension, 600);
        assert_eq!(config.recognition.retry_floor, 70);
        assert_eq!(config.recognition.hard_floor, 30);
        assert_eq!(config.assets.default_language, "eng");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lectern.json");

        let mut config = LecternConfig::default();
        config.extraction.render_dpi = 200;
        config.save(&path).expect("save");

        let loaded = LecternConfig::load(&path).expect("load");
        assert_eq!(loaded.extraction.render_dpi, 200);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").expect("write");

        let config = LecternConfig::load_or_default(&path);
        assert_eq!(config.extraction.render_dpi, 300);
    }
}
