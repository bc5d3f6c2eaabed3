// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recognition engine seam.
//
// The orchestrator only talks to engines through these traits, so the
// concrete backend (Tesseract behind the `tesseract` feature, ocrs behind
// `ocr`, or a scripted engine in tests) can be swapped without touching the
// retry and tuning logic.

use std::path::Path;

use image::GrayImage;
use lectern_core::error::Result;

/// Page segmentation strategy. Discriminants follow the Tesseract page
/// segmentation mode numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentationMode {
    /// Fully automatic block layout.
    Auto = 3,
    /// A single column of text of variable sizes.
    SingleColumn = 4,
    /// One uniform block of text.
    SingleBlock = 6,
    /// As much text as possible, in no particular order.
    SparseText = 11,
}

impl SegmentationMode {
    /// Tesseract PSM number.
    pub fn psm(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for SegmentationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SegmentationMode::Auto => "auto",
            SegmentationMode::SingleColumn => "single-column",
            SegmentationMode::SingleBlock => "single-block",
            SegmentationMode::SparseText => "sparse-text",
        };
        write!(f, "{label} (psm {})", self.psm())
    }
}

/// Engine switches applied to every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVariables {
    pub use_dictionary: bool,
    pub reject_noise_words: bool,
    pub force_proportional_words: bool,
    pub preserve_interword_spaces: bool,
    pub penalize_non_dictionary: bool,
    /// Characters the engine must never emit.
    pub blacklist: String,
}

impl Default for EngineVariables {
    fn default() -> Self {
        Self {
            use_dictionary: true,
            reject_noise_words: true,
            force_proportional_words: false,
            preserve_interword_spaces: false,
            penalize_non_dictionary: false,
            blacklist: String::new(),
        }
    }
}

impl EngineVariables {
    /// The switches as Tesseract variable assignments. Every variable is
    /// always listed so a pass never inherits a previous pass's value.
    pub fn tesseract_settings(&self) -> Vec<(&'static str, String)> {
        let flag = |on: bool| if on { "1" } else { "0" }.to_string();
        let (non_dict, non_freq) = match (self.use_dictionary, self.penalize_non_dictionary) {
            (false, _) => ("0", "0"),
            (true, true) => ("0.3", "0.2"),
            (true, false) => ("0.15", "0.1"),
        };
        vec![
            ("language_model_penalty_non_dict_word", non_dict.to_string()),
            ("language_model_penalty_non_freq_dict_word", non_freq.to_string()),
            ("textord_heavy_nr", flag(self.reject_noise_words)),
            ("textord_force_make_prop_words", flag(self.force_proportional_words)),
            ("preserve_interword_spaces", flag(self.preserve_interword_spaces)),
            ("tessedit_char_blacklist", self.blacklist.clone()),
        ]
    }
}

/// One recognition pass.
#[derive(Debug, Clone, Copy)]
pub struct EngineRequest<'a> {
    pub image: &'a GrayImage,
    pub mode: SegmentationMode,
    pub variables: &'a EngineVariables,
}

/// Raw engine output, before post-processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub text: String,
    /// Mean word confidence, 0..=100.
    pub confidence: u8,
}

/// A loaded, non-reentrant recognition engine.
pub trait RecognitionEngine: Send {
    /// The `+`-joined language selector the engine was built for.
    fn language_selector(&self) -> &str;

    /// Run a single pass over a prepared grayscale raster.
    fn recognize(&mut self, request: &EngineRequest<'_>) -> Result<EngineOutput>;
}

/// Builds engines for a language selector from a model directory.
pub trait EngineFactory: Send + Sync {
    fn create(&self, tessdata_dir: &Path, selector: &str) -> Result<Box<dyn RecognitionEngine>>;
}
