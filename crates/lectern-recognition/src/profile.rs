// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Script profiles and per-call tuning.
//
// A profile is fixed when the engine is built. A tuning decision is derived
// per call from the profile and the measured image quality, then threaded
// through the passes explicitly.

use lectern_core::{ImageQuality, QualityReport};

use crate::engine::{EngineVariables, SegmentationMode};
use crate::postprocess::GARBAGE_CHARS;
use crate::script::is_arabic_language;

/// Edge density at or above which a clean page is treated as one text block.
const DENSE_EDGES: f32 = 0.15;
/// Edge density below which a poor page is treated as scattered text.
const SPARSE_EDGES: f32 = 0.02;

/// Engine policy for the lifetime of one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptProfile {
    /// Connected right-to-left scripts: automatic layout only, dictionaries
    /// on, proportional words, spacing preserved.
    ArabicTuned,
    /// Everything else: layout and dictionaries chosen from image quality.
    LatinTuned,
}

impl ScriptProfile {
    /// Profile for an enabled language set.
    pub fn for_languages(languages: &[String]) -> Self {
        if languages.iter().any(|code| is_arabic_language(code)) {
            ScriptProfile::ArabicTuned
        } else {
            ScriptProfile::LatinTuned
        }
    }

    /// Whether an engine under this profile may run `mode`.
    pub fn permits(self, mode: SegmentationMode) -> bool {
        !(self == ScriptProfile::ArabicTuned && mode == SegmentationMode::SparseText)
    }

    /// Tuning for one call.
    pub fn decide(self, report: &QualityReport) -> TuningDecision {
        match self {
            ScriptProfile::ArabicTuned => TuningDecision {
                quality: report.quality,
                mode: SegmentationMode::Auto,
                variables: EngineVariables {
                    use_dictionary: true,
                    reject_noise_words: false,
                    force_proportional_words: true,
                    preserve_interword_spaces: true,
                    penalize_non_dictionary: true,
                    blacklist: GARBAGE_CHARS.to_string(),
                },
            },
            ScriptProfile::LatinTuned => {
                let mode = match report.quality {
                    ImageQuality::High if report.edge_density >= DENSE_EDGES => {
                        SegmentationMode::SingleBlock
                    }
                    ImageQuality::Low if report.edge_density < SPARSE_EDGES => {
                        SegmentationMode::SparseText
                    }
                    _ => SegmentationMode::Auto,
                };
                TuningDecision {
                    quality: report.quality,
                    mode,
                    variables: EngineVariables {
                        use_dictionary: report.quality != ImageQuality::Low,
                        reject_noise_words: true,
                        force_proportional_words: false,
                        preserve_interword_spaces: false,
                        penalize_non_dictionary: false,
                        blacklist: GARBAGE_CHARS.to_string(),
                    },
                }
            }
        }
    }
}

impl std::fmt::Display for ScriptProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptProfile::ArabicTuned => f.write_str("arabic-tuned"),
            ScriptProfile::LatinTuned => f.write_str("latin-tuned"),
        }
    }
}

/// Immutable per-call engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuningDecision {
    pub quality: ImageQuality,
    /// Mode of the primary pass.
    pub mode: SegmentationMode,
    pub variables: EngineVariables,
}

/// Segmentation modes worth retrying for a language set, in order.
///
/// Sets containing an Arabic-script language never get `SparseText`.
pub fn candidate_modes(languages: &[String]) -> Vec<SegmentationMode> {
    if languages.iter().any(|code| is_arabic_language(code)) {
        vec![
            SegmentationMode::Auto,
            SegmentationMode::SingleColumn,
            SegmentationMode::SingleBlock,
        ]
    } else {
        vec![
            SegmentationMode::Auto,
            SegmentationMode::SingleBlock,
            SegmentationMode::SparseText,
            SegmentationMode::SingleColumn,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(quality: ImageQuality, edge_density: f32) -> QualityReport {
        QualityReport {
            quality,
            contrast: 0.5,
            noise: 0.05,
            edge_density,
        }
    }

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn any_arabic_language_selects_arabic_profile() {
        let profile = |list: &[&str]| ScriptProfile::for_languages(&codes(list));
        assert_eq!(profile(&["eng", "fas"]), ScriptProfile::ArabicTuned);
        assert_eq!(profile(&["eng", "fra"]), ScriptProfile::LatinTuned);
    }

    #[test]
    fn arabic_profile_never_goes_sparse() {
        for quality in [ImageQuality::High, ImageQuality::Medium, ImageQuality::Low] {
            for density in [0.0, 0.01, 0.5] {
                let decision = ScriptProfile::ArabicTuned.decide(&report(quality, density));
                assert_eq!(decision.mode, SegmentationMode::Auto);
                assert!(decision.variables.use_dictionary);
                assert!(decision.variables.preserve_interword_spaces);
                assert!(!decision.variables.reject_noise_words);
            }
        }
        assert!(!candidate_modes(&codes(&["ara", "eng"])).contains(&SegmentationMode::SparseText));
        assert!(!ScriptProfile::ArabicTuned.permits(SegmentationMode::SparseText));
        assert!(ScriptProfile::LatinTuned.permits(SegmentationMode::SparseText));
    }

    #[test]
    fn latin_mode_follows_quality_and_edges() {
        let mode = |quality, density| {
            ScriptProfile::LatinTuned.decide(&report(quality, density)).mode
        };
        assert_eq!(mode(ImageQuality::High, 0.2), SegmentationMode::SingleBlock);
        assert_eq!(mode(ImageQuality::High, 0.05), SegmentationMode::Auto);
        assert_eq!(mode(ImageQuality::Low, 0.01), SegmentationMode::SparseText);
        assert_eq!(mode(ImageQuality::Medium, 0.01), SegmentationMode::Auto);
    }

    #[test]
    fn latin_disables_dictionary_only_for_low_quality() {
        let latin = ScriptProfile::LatinTuned;
        assert!(latin.decide(&report(ImageQuality::Medium, 0.1)).variables.use_dictionary);
        assert!(!latin.decide(&report(ImageQuality::Low, 0.1)).variables.use_dictionary);
    }

    #[test]
    fn latin_candidates_cover_sparse_text() {
        assert_eq!(
            candidate_modes(&codes(&["eng"])),
            vec![
                SegmentationMode::Auto,
                SegmentationMode::SingleBlock,
                SegmentationMode::SparseText,
                SegmentationMode::SingleColumn,
            ]
        );
    }
}
