// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Language model assets — materializes bundled `.traineddata` files into the
// writable data directory and keeps them validated.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use lectern_core::config::AssetConfig;
use lectern_core::error::{LecternError, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

/// File extension of a language model.
const MODEL_EXTENSION: &str = "traineddata";

/// Languages the bundle may ship, with their display names.
const SUPPORTED: &[(&str, &str)] = &[
    ("ara", "Arabic"),
    ("fas", "Persian"),
    ("urd", "Urdu"),
    ("eng", "English"),
    ("fra", "French"),
    ("deu", "German"),
    ("spa", "Spanish"),
    ("ita", "Italian"),
    ("por", "Portuguese"),
    ("nld", "Dutch"),
    ("tur", "Turkish"),
    ("pol", "Polish"),
    ("vie", "Vietnamese"),
    ("rus", "Russian"),
    ("ukr", "Ukrainian"),
    ("bul", "Bulgarian"),
    ("srp", "Serbian"),
    ("chi_sim", "Chinese (Simplified)"),
    ("chi_tra", "Chinese (Traditional)"),
    ("jpn", "Japanese"),
    ("kor", "Korean"),
];

/// Display name of a supported language code.
pub fn display_name(code: &str) -> Option<&'static str> {
    SUPPORTED
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// A language model on disk.
///
/// `validated` implies the file existed with at least the configured minimum
/// size when it was last checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageAsset {
    pub code: String,
    pub display_name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Lowercase hex SHA-256 of the file.
    pub sha256: String,
    pub validated: bool,
}

/// Keeps the engine's model directory populated from the bundle.
#[derive(Debug)]
pub struct LanguageAssetManager {
    config: AssetConfig,
    assets: HashMap<String, LanguageAsset>,
}

impl LanguageAssetManager {
    pub fn new(config: AssetConfig) -> Self {
        Self {
            config,
            assets: HashMap::new(),
        }
    }

    /// Directory the engine loads models from (`<data>/tessdata`).
    pub fn tessdata_dir(&self) -> PathBuf {
        self.config.data_dir.join("tessdata")
    }

    pub fn default_language(&self) -> &str {
        &self.config.default_language
    }

    /// Last known state of a materialized asset.
    pub fn asset(&self, code: &str) -> Option<LanguageAsset> {
        self.assets.get(code).cloned()
    }

    /// Supported codes from `codes`, in order, without duplicates. Falls back
    /// to the default language when nothing usable remains.
    pub fn normalize(&self, codes: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(codes.len());
        for code in codes {
            let code = code.trim();
            if display_name(code).is_none() {
                warn!(code, "Unsupported language dropped");
                continue;
            }
            if !out.iter().any(|c| c == code) {
                out.push(code.to_string());
            }
        }
        if out.is_empty() {
            out.push(self.config.default_language.clone());
        }
        out
    }

    /// `+`-joined selector for the engine, e.g. `ara+eng`.
    pub fn language_selector(&self, codes: &[String]) -> String {
        self.normalize(codes).join("+")
    }

    /// Make every code in `codes` available as a validated model.
    ///
    /// Idempotent. Returns `false` when any code could not be made valid;
    /// the remaining codes are still processed.
    #[instrument(skip(self))]
    pub fn ensure_available(&mut self, codes: &[String]) -> bool {
        let mut all_valid = true;
        for code in codes {
            match self.ensure_one(code) {
                Ok(asset) => {
                    debug!(code = %asset.code, size = asset.size, "Language model ready");
                    self.assets.insert(asset.code.clone(), asset);
                }
                Err(err) => {
                    warn!(code = %code, error = %err, "Language model unavailable");
                    self.assets.remove(code.as_str());
                    all_valid = false;
                }
            }
        }
        all_valid
    }

    fn ensure_one(&self, code: &str) -> Result<LanguageAsset> {
        let display =
            display_name(code).ok_or_else(|| LecternError::AssetMissing(code.to_string()))?;
        let file_name = format!("{code}.{MODEL_EXTENSION}");
        let target = self.tessdata_dir().join(&file_name);
        let bundled = self.config.bundle_dir.join(&file_name);
        let minimum = self.config.min_model_bytes;

        // Cached and still intact on disk.
        if let Some(cached) = self.assets.get(code) {
            if cached.validated && file_size(&target) >= minimum {
                return Ok(cached.clone());
            }
        }

        // A copy from an earlier run.
        if target.exists() {
            let size = file_size(&target);
            if size >= minimum {
                let digest = sha256_file(&target)?;
                let matches_bundle = !bundled.exists() || sha256_file(&bundled)? == digest;
                if matches_bundle {
                    return Ok(asset(code, display, target, size, digest));
                }
                warn!(code, "Installed model differs from bundle, replacing");
            } else {
                warn!(code, size, minimum, "Partial model removed");
            }
            fs::remove_file(&target)?;
        }

        if !bundled.exists() {
            return Err(LecternError::AssetMissing(format!(
                "{code} (looked for {})",
                bundled.display()
            )));
        }
        let bundled_size = file_size(&bundled);
        if bundled_size < minimum {
            return Err(LecternError::AssetCorrupt {
                code: code.to_string(),
                size: bundled_size,
                minimum,
            });
        }

        fs::create_dir_all(self.tessdata_dir())?;
        fs::copy(&bundled, &target)?;
        info!(
            code,
            from = %bundled.display(),
            to = %target.display(),
            "Language model materialized"
        );

        let size = file_size(&target);
        let digest = if size >= minimum {
            let copied = sha256_file(&target)?;
            (copied == sha256_file(&bundled)?).then_some(copied)
        } else {
            None
        };
        match digest {
            Some(digest) => Ok(asset(code, display, target, size, digest)),
            None => {
                fs::remove_file(&target)?;
                Err(LecternError::AssetCorrupt {
                    code: code.to_string(),
                    size,
                    minimum,
                })
            }
        }
    }
}

fn asset(code: &str, display: &str, path: PathBuf, size: u64, sha256: String) -> LanguageAsset {
    LanguageAsset {
        code: code.to_string(),
        display_name: display.to_string(),
        path,
        size,
        sha256,
        validated: true,
    }
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Lowercase hex SHA-256 of a file, streamed.
fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
