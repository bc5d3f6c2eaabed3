// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recognition orchestrator — owns the single engine instance, serializes
// access to it, and runs the primary pass plus alternate-segmentation retries.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use image::{DynamicImage, GrayImage};
use lectern_core::config::{LecternConfig, RecognitionConfig};
use lectern_core::error::{LecternError, Result};
use lectern_core::OcrResult;
use lectern_document::{ImageProcessor, PreprocessingPipeline};
use tracing::{debug, info, instrument, warn};

use crate::assets::LanguageAssetManager;
use crate::engine::{EngineFactory, EngineOutput, EngineRequest, RecognitionEngine};
use crate::postprocess::clean_text;
use crate::profile::{ScriptProfile, TuningDecision, candidate_modes};

/// Lifecycle of the engine held by a [`RecognitionOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OrchestratorPhase {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Recognizing = 3,
    Releasing = 4,
}

impl OrchestratorPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => OrchestratorPhase::Initializing,
            2 => OrchestratorPhase::Ready,
            3 => OrchestratorPhase::Recognizing,
            4 => OrchestratorPhase::Releasing,
            _ => OrchestratorPhase::Uninitialized,
        }
    }
}

/// Everything guarded by the orchestrator lock.
struct EngineState {
    engine: Option<Box<dyn RecognitionEngine>>,
    languages: Vec<String>,
    profile: Option<ScriptProfile>,
    assets: LanguageAssetManager,
}

/// Single-flight access to one recognition engine.
///
/// `initialize`, every recognition pass and `release` run under the same
/// mutex, so at most one thread is ever inside the engine.
pub struct RecognitionOrchestrator {
    state: Mutex<EngineState>,
    phase: AtomicU8,
    factory: Arc<dyn EngineFactory>,
    pipeline: PreprocessingPipeline,
    config: RecognitionConfig,
}

impl RecognitionOrchestrator {
    pub fn new(config: &LecternConfig, factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            state: Mutex::new(EngineState {
                engine: None,
                languages: Vec::new(),
                profile: None,
                assets: LanguageAssetManager::new(config.assets.clone()),
            }),
            phase: AtomicU8::new(OrchestratorPhase::Uninitialized as u8),
            factory,
            pipeline: PreprocessingPipeline::new(config.preprocess.clone()),
            config: config.recognition.clone(),
        }
    }

    // -- State ----------------------------------------------------------------

    /// Lock the engine state. A pass that panicked leaves the engine in an
    /// unknown state, so a poisoned lock drops it.
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Recognition pass panicked, dropping the engine");
            let mut state = poisoned.into_inner();
            Self::unload(&mut state);
            self.state.clear_poison();
            self.set_phase(OrchestratorPhase::Uninitialized);
            state
        })
    }

    fn set_phase(&self, phase: OrchestratorPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    pub fn phase(&self) -> OrchestratorPhase {
        OrchestratorPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// True once an engine is loaded (including while a pass is running).
    pub fn is_ready(&self) -> bool {
        matches!(
            self.phase(),
            OrchestratorPhase::Ready | OrchestratorPhase::Recognizing
        )
    }

    /// Languages of the loaded engine, in selector order.
    pub fn languages(&self) -> Vec<String> {
        self.lock().languages.clone()
    }

    pub fn profile(&self) -> Option<ScriptProfile> {
        self.lock().profile
    }

    pub fn pipeline(&self) -> &PreprocessingPipeline {
        &self.pipeline
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Load an engine for `codes`, replacing any previous one.
    ///
    /// Returns `false` when a model cannot be made available or the engine
    /// fails to start; the orchestrator is then left uninitialized.
    #[instrument(skip(self))]
    pub fn initialize(&self, codes: &[String]) -> bool {
        let mut state = self.lock();
        self.load(&mut state, codes)
    }

    /// Drop the engine. Safe to call repeatedly.
    #[instrument(skip(self))]
    pub fn release(&self) {
        let mut state = self.lock();
        if state.engine.is_some() {
            self.set_phase(OrchestratorPhase::Releasing);
            Self::unload(&mut state);
            info!("Recognition engine released");
        }
        self.set_phase(OrchestratorPhase::Uninitialized);
    }

    /// Release and load `codes` without letting a pass run in between.
    #[instrument(skip(self))]
    pub fn reinitialize(&self, codes: &[String]) -> bool {
        let mut state = self.lock();
        if state.engine.is_some() {
            self.set_phase(OrchestratorPhase::Releasing);
            Self::unload(&mut state);
            debug!("Previous engine released");
        }
        self.load(&mut state, codes)
    }

    fn unload(state: &mut EngineState) {
        state.engine = None;
        state.languages.clear();
        state.profile = None;
    }

    fn load(&self, state: &mut EngineState, codes: &[String]) -> bool {
        self.set_phase(OrchestratorPhase::Initializing);
        Self::unload(state);

        let languages = state.assets.normalize(codes);
        if !state.assets.ensure_available(&languages) {
            warn!(?languages, "Language models unavailable, engine not started");
            self.set_phase(OrchestratorPhase::Uninitialized);
            return false;
        }

        let selector = languages.join("+");
        let tessdata = state.assets.tessdata_dir();
        match self.factory.create(&tessdata, &selector) {
            Ok(engine) => {
                let profile = ScriptProfile::for_languages(&languages);
                info!(%selector, %profile, "Recognition engine ready");
                state.engine = Some(engine);
                state.languages = languages;
                state.profile = Some(profile);
                self.set_phase(OrchestratorPhase::Ready);
                true
            }
            Err(err) => {
                warn!(%selector, error = %err, "Recognition engine failed to start");
                self.set_phase(OrchestratorPhase::Uninitialized);
                false
            }
        }
    }

    // -- Recognition ----------------------------------------------------------

    /// Recognize text in `image`. `None` when no engine is loaded or the
    /// engine failed.
    pub fn recognize(&self, image: DynamicImage) -> Option<OcrResult> {
        match self.try_recognize(image) {
            Ok(result) => Some(result),
            Err(err) => {
                warn!(error = %err, "Recognition failed");
                None
            }
        }
    }

    /// Decode `bytes` and recognize them. Undecodable input gives `None`.
    pub fn recognize_bytes(&self, bytes: &[u8]) -> Option<OcrResult> {
        match ImageProcessor::from_bytes(bytes) {
            Ok(processor) => self.recognize(processor.into_dynamic()),
            Err(err) => {
                warn!(error = %err, "Input could not be decoded");
                None
            }
        }
    }

    /// Open an image file and recognize it. Undecodable input gives `None`.
    pub fn recognize_path(&self, path: impl AsRef<Path>) -> Option<OcrResult> {
        match ImageProcessor::open(path) {
            Ok(processor) => self.recognize(processor.into_dynamic()),
            Err(err) => {
                warn!(error = %err, "Input could not be decoded");
                None
            }
        }
    }

    /// Analyze, preprocess, tune and recognize.
    ///
    /// Preprocessing depends only on image quality and runs without the lock.
    /// The tuning is derived from the profile of the engine that runs the
    /// passes, under the same lock.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn try_recognize(&self, image: DynamicImage) -> Result<OcrResult> {
        let started = Instant::now();
        if self.profile().is_none() {
            return Err(LecternError::NotInitialized);
        }

        let report = self.pipeline.analyzer().analyze(&image);
        let prepared = self.pipeline.process(image, Some(report.quality));

        let mut state = self.lock();
        let profile = state.profile.ok_or(LecternError::NotInitialized)?;
        let decision = profile.decide(&report);
        debug!(%profile, quality = %decision.quality, mode = %decision.mode, "Tuning decided");
        self.run_passes(&mut state, prepared.image, &decision, started)
    }

    /// Recognize an already preprocessed raster with an explicit tuning.
    ///
    /// Fails when the loaded profile does not allow `decision.mode`.
    pub fn recognize_prepared(
        &self,
        image: GrayImage,
        decision: &TuningDecision,
    ) -> Result<OcrResult> {
        let mut state = self.lock();
        let profile = state.profile.ok_or(LecternError::NotInitialized)?;
        if !profile.permits(decision.mode) {
            return Err(LecternError::Recognition(format!(
                "{} is not available to the {profile} engine",
                decision.mode
            )));
        }
        self.run_passes(&mut state, image, decision, Instant::now())
    }

    fn run_passes(
        &self,
        state: &mut EngineState,
        image: GrayImage,
        decision: &TuningDecision,
        started: Instant,
    ) -> Result<OcrResult> {
        let engine = state.engine.as_mut().ok_or(LecternError::NotInitialized)?;
        let outcome = {
            let _pass = PassPhase::enter(self);
            self.passes(&mut **engine, &image, decision, &state.languages)
        };
        let best = outcome?;
        let languages = state.languages.clone();
        drop(image);

        let elapsed = started.elapsed().as_millis() as u64;
        let chars = best.text.trim().chars().count();
        if best.confidence < self.config.hard_floor && chars < self.config.empty_text_chars {
            debug!(confidence = best.confidence, chars, "Result below hard floor, reported empty");
            return Ok(OcrResult::new(String::new(), best.confidence, languages, elapsed));
        }

        let text = clean_text(&best.text);
        info!(
            confidence = best.confidence,
            chars = text.chars().count(),
            elapsed_ms = elapsed,
            "Recognition complete"
        );
        Ok(OcrResult::new(text, best.confidence, languages, elapsed))
    }

    /// Primary pass, then alternate modes for short low-confidence output.
    fn passes(
        &self,
        engine: &mut dyn RecognitionEngine,
        image: &GrayImage,
        decision: &TuningDecision,
        languages: &[String],
    ) -> Result<EngineOutput> {
        let mut best = engine.recognize(&EngineRequest {
            image,
            mode: decision.mode,
            variables: &decision.variables,
        })?;

        let chars = best.text.trim().chars().count();
        if best.confidence >= self.config.retry_floor || chars >= self.config.short_text_chars {
            return Ok(best);
        }

        debug!(confidence = best.confidence, chars, "Weak primary pass, trying alternate modes");
        for mode in candidate_modes(languages) {
            if mode == decision.mode {
                continue;
            }
            let request = EngineRequest {
                image,
                mode,
                variables: &decision.variables,
            };
            match engine.recognize(&request) {
                Ok(candidate) if self.is_material_improvement(&candidate, &best) => {
                    debug!(%mode, confidence = candidate.confidence, "Alternate mode kept");
                    best = candidate;
                }
                Ok(_) => {}
                Err(err) => debug!(%mode, error = %err, "Alternate mode failed"),
            }
        }
        Ok(best)
    }

    fn is_material_improvement(&self, candidate: &EngineOutput, best: &EngineOutput) -> bool {
        let gain = self.config.material_confidence_gain as u16;
        let band = self.config.comparable_confidence_band as u16;
        let (cand_conf, best_conf) = (candidate.confidence as u16, best.confidence as u16);

        if cand_conf >= best_conf + gain {
            return true;
        }
        let cand_len = candidate.text.trim().chars().count();
        let best_len = best.text.trim().chars().count();
        cand_len > best_len
            && cand_len as f32 >= best_len as f32 * self.config.material_length_ratio
            && cand_conf + band >= best_conf
    }
}

/// Marks the orchestrator `Recognizing` for the duration of a pass. A pass
/// that unwinds leaves the orchestrator uninitialized instead of stuck.
struct PassPhase<'a> {
    orchestrator: &'a RecognitionOrchestrator,
}

impl<'a> PassPhase<'a> {
    fn enter(orchestrator: &'a RecognitionOrchestrator) -> Self {
        orchestrator.set_phase(OrchestratorPhase::Recognizing);
        Self { orchestrator }
    }
}

impl Drop for PassPhase<'_> {
    fn drop(&mut self) {
        let phase = if std::thread::panicking() {
            OrchestratorPhase::Uninitialized
        } else {
            OrchestratorPhase::Ready
        };
        self.orchestrator.set_phase(phase);
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    /// Config whose bundle holds small models for `codes`.
    pub fn config_with_models(codes: &[&str]) -> (TempDir, LecternConfig) {
        let dir = TempDir::new().expect("tempdir");
        let bundle = dir.path().join("bundle");
        fs::create_dir_all(&bundle).expect("bundle dir");
        for code in codes {
            fs::write(bundle.join(format!("{code}.traineddata")), vec![1u8; 2048]).expect("model");
        }
        let mut config = LecternConfig::default();
        config.assets.bundle_dir = bundle;
        config.assets.data_dir = dir.path().join("data");
        config.assets.min_model_bytes = 1024;
        (dir, config)
    }

    pub fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }
}
