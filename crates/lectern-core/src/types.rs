// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Lectern.

use serde::{Deserialize, Serialize};

/// Outcome of one recognition call.
///
/// Produced once per call and owned by the caller. An empty `text` means the
/// engine ran but found nothing worth keeping; a failed run is represented by
/// the absence of a result, never by an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrResult {
    /// Cleaned, post-processed text.
    pub text: String,
    /// Mean engine confidence, 0..=100.
    pub confidence: u8,
    /// Language codes the engine was configured with, in selector order.
    pub languages: Vec<String>,
    /// Wall-clock time spent preprocessing and recognising.
    pub processing_time_ms: u64,
}

impl OcrResult {
    pub fn new(
        text: String,
        confidence: u8,
        languages: Vec<String>,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            text,
            confidence: confidence.min(100),
            languages,
            processing_time_ms,
        }
    }

    /// True when the engine ran but nothing survived the confidence gate.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Coarse quality tier of a raster, driving how aggressively it is cleaned up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageQuality {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ImageQuality::High => "high",
            ImageQuality::Medium => "medium",
            ImageQuality::Low => "low",
        };
        f.write_str(label)
    }
}

/// Measurements taken from the centre sample window of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Tier derived from `contrast` and `noise`.
    pub quality: ImageQuality,
    /// (max - min brightness) / 255.
    pub contrast: f32,
    /// Mean absolute difference between horizontal neighbours, / 255.
    pub noise: f32,
    /// Share of horizontal neighbour pairs that differ sharply.
    pub edge_density: f32,
}

impl QualityReport {
    /// Report used when the raster is too small to sample.
    pub fn undersized() -> Self {
        Self {
            quality: ImageQuality::Medium,
            contrast: 0.0,
            noise: 0.0,
            edge_density: 0.0,
        }
    }
}

/// Writing system a piece of text is dominated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Script {
    Arabic,
    Latin,
    Cyrillic,
    Cjk,
    Unknown,
}

impl std::fmt::Display for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Script::Arabic => "Arabic",
            Script::Latin => "Latin",
            Script::Cyrillic => "Cyrillic",
            Script::Cjk => "CJK",
            Script::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// What happened to a single page of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageOutcome {
    /// Recognition ran; `chars` counts the characters kept.
    Recognized { confidence: u8, chars: usize },
    /// The page looked empty, so recognition was skipped.
    Blank,
    /// The page failed; the document carried on without it.
    Errored(String),
}

impl PageOutcome {
    /// Confidence recorded for the page (zero for blank and failed pages).
    pub fn confidence(&self) -> u8 {
        match self {
            PageOutcome::Recognized { confidence, .. } => *confidence,
            PageOutcome::Blank | PageOutcome::Errored(_) => 0,
        }
    }
}

/// Per-page entry in a document extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReport {
    /// Zero-based page index.
    pub index: usize,
    pub outcome: PageOutcome,
}

/// Progress of a document extraction, reported after every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Pages finished so far (recognised, blank or errored).
    pub done: usize,
    pub total: usize,
}

impl Progress {
    /// Completed fraction in 0.0..=1.0.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f32 / self.total as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        let result = OcrResult::new("abc".into(), 250, vec!["eng".into()], 4);
        assert_eq!(result.confidence, 100);
    }

    #[test]
    fn whitespace_only_result_is_empty() {
        let result = OcrResult::new(" \n ".into(), 20, vec!["eng".into()], 1);
        assert!(result.is_empty());
    }

    #[test]
    fn blank_and_errored_pages_have_zero_confidence() {
        assert_eq!(PageOutcome::Blank.confidence(), 0);
        assert_eq!(PageOutcome::Errored("boom".into()).confidence(), 0);
        let ok = PageOutcome::Recognized {
            confidence: 87,
            chars: 120,
        };
        assert_eq!(ok.confidence(), 87);
    }

    #[test]
    fn progress_fraction() {
        assert_eq!(Progress { done: 0, total: 0 }.fraction(), 1.0);
        assert_eq!(Progress { done: 1, total: 4 }.fraction(), 0.25);
    }
}
