// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recognition backend built on `ocrs`, a pure-Rust OCR engine whose neural
// network models run on `rten`.
//
// # Feature Gate
//
// Only compiled with the `ocr` feature:
//
// ```toml
// lectern-recognition = { path = "crates/lectern-recognition", features = ["ocr"] }
// ```
//
// # Models
//
// Two `.rten` model files are required: `text-detection.rten` locates text
// regions and `text-recognition.rten` decodes characters. Running `ocrs-cli`
// once downloads both to `$XDG_CACHE_HOME/ocrs` (typically `~/.cache/ocrs`).
//
// `ocrs` ships a single Latin-alphabet recognizer and does not expose
// segmentation modes or tuning variables; only the blacklist is applied, to
// its output. Selectors naming a non-Latin language are refused at start-up.
// The engine reports no confidence; one is estimated from how much of the
// output is letters and digits. The `tesseract` backend honours all of these.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage};
use lectern_core::Script;
use lectern_core::error::{LecternError, Result};
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use tracing::{debug, info, instrument};

use crate::engine::{EngineFactory, EngineOutput, EngineRequest, RecognitionEngine};
use crate::script::languages_for;

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, then `~/.cache/ocrs`.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Locations of the two `ocrs` model files.
#[derive(Debug, Clone)]
pub struct OcrsModels {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrsModels {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrsModels {
    /// Expects `text-detection.rten` and `text-recognition.rten` in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Verify that both model files exist.
    pub fn validate(&self) -> Result<()> {
        for path in [&self.detection_model_path, &self.recognition_model_path] {
            if !path.exists() {
                return Err(LecternError::EngineInit(format!(
                    "model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Builds [`OcrsEngine`]s. Model loading is the expensive step, so the
/// orchestrator keeps the engine for as long as the language set is unchanged.
#[derive(Debug, Clone, Default)]
pub struct OcrsEngineFactory {
    models: OcrsModels,
}

impl OcrsEngineFactory {
    pub fn new(models: OcrsModels) -> Self {
        Self { models }
    }
}

impl EngineFactory for OcrsEngineFactory {
    #[instrument(skip(self, tessdata_dir), fields(
        detection = %self.models.detection_model_path.display(),
        recognition = %self.models.recognition_model_path.display(),
    ))]
    fn create(&self, tessdata_dir: &Path, selector: &str) -> Result<Box<dyn RecognitionEngine>> {
        let latin = languages_for(Script::Latin);
        if let Some(code) = selector.split('+').find(|code| !latin.contains(code)) {
            return Err(LecternError::EngineInit(format!(
                "ocrs reads Latin script only; {code} needs the tesseract engine"
            )));
        }
        self.models.validate()?;
        debug!(tessdata = %tessdata_dir.display(), "Language models verified");

        let detection_model = Model::load_file(&self.models.detection_model_path).map_err(|err| {
            LecternError::EngineInit(format!(
                "failed to load detection model from {}: {err}",
                self.models.detection_model_path.display()
            ))
        })?;
        let recognition_path = &self.models.recognition_model_path;
        let recognition_model = Model::load_file(recognition_path).map_err(|err| {
            LecternError::EngineInit(format!(
                "failed to load recognition model from {}: {err}",
                recognition_path.display()
            ))
        })?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| LecternError::EngineInit(format!("failed to initialise ocrs: {err}")))?;

        info!("ocrs engine initialised");
        Ok(Box::new(OcrsEngine {
            engine,
            selector: selector.to_string(),
        }))
    }
}

/// A loaded `ocrs` engine.
pub struct OcrsEngine {
    engine: OcrEngine,
    selector: String,
}

impl RecognitionEngine for OcrsEngine {
    fn language_selector(&self) -> &str {
        &self.selector
    }

    #[instrument(skip_all, fields(
        width = request.image.width(),
        height = request.image.height(),
        mode = %request.mode,
    ))]
    fn recognize(&mut self, request: &EngineRequest<'_>) -> Result<EngineOutput> {
        let rgb = DynamicImage::ImageLuma8(GrayImage::clone(request.image)).into_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            LecternError::Recognition(format!(
                "failed to create image source ({width}x{height}): {err}"
            ))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| LecternError::Recognition(format!("preprocessing failed: {err}")))?;
        let raw = self
            .engine
            .get_text(&input)
            .map_err(|err| LecternError::Recognition(format!("text recognition failed: {err}")))?;

        let text: String = raw
            .chars()
            .filter(|c| !request.variables.blacklist.contains(*c))
            .collect();
        let confidence = estimate_confidence(&text);
        debug!(lines = text.lines().count(), confidence, "ocrs pass complete");

        Ok(EngineOutput { text, confidence })
    }
}

/// Share of non-space characters that are letters or digits, as 0..=100.
fn estimate_confidence(text: &str) -> u8 {
    let mut visible = 0usize;
    let mut alphanumeric = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        visible += 1;
        if c.is_alphanumeric() {
            alphanumeric += 1;
        }
    }
    if visible == 0 {
        0
    } else {
        ((alphanumeric * 100) / visible) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_tracks_alphanumeric_share() {
        assert_eq!(estimate_confidence(""), 0);
        assert_eq!(estimate_confidence("Hello world"), 100);
        assert_eq!(estimate_confidence("ab.."), 50);
    }

    #[test]
    fn non_latin_languages_are_refused() {
        let factory = OcrsEngineFactory::new(OcrsModels::from_dir("/nonexistent/ocrs"));
        match factory.create(Path::new("/tmp"), "eng+ara") {
            Err(LecternError::EngineInit(message)) => assert!(message.contains("ara"), "{message}"),
            _ => panic!("expected an engine init error"),
        }
    }

    #[test]
    fn missing_models_fail_to_start() {
        let factory = OcrsEngineFactory::new(OcrsModels::from_dir("/nonexistent/ocrs"));
        let err = factory.create(Path::new("/tmp"), "eng").err();
        assert!(matches!(err, Some(LecternError::EngineInit(_))));
    }
}
