// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// lectern-recognition — Script-aware text recognition for Lectern.
//
// Owns the (non-reentrant) recognition engine behind a single-flight
// orchestrator, picks per-script engine tuning, materializes language models,
// and drives page-by-page extraction of multi-page documents.

pub mod assets;
pub mod engine;
pub mod extractor;
pub mod orchestrator;
pub mod postprocess;
pub mod profile;
pub mod script;
pub mod service;

#[cfg(feature = "ocr")]
pub mod ocrs_engine;
#[cfg(feature = "tesseract")]
pub mod tesseract_engine;

pub use assets::{LanguageAsset, LanguageAssetManager};
pub use engine::{
    EngineFactory, EngineOutput, EngineRequest, EngineVariables, RecognitionEngine,
    SegmentationMode,
};
pub use extractor::{DocumentPageExtractor, ExtractionResult};
pub use orchestrator::{OrchestratorPhase, RecognitionOrchestrator};
pub use profile::{ScriptProfile, TuningDecision, candidate_modes};
pub use script::{detect_script, select_best_language};
pub use service::OcrService;

#[cfg(feature = "ocr")]
pub use ocrs_engine::{OcrsEngineFactory, OcrsModels};
#[cfg(feature = "tesseract")]
pub use tesseract_engine::TesseractEngineFactory;
