// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline — quality analysis, binarization, denoising, and the
// quality-adaptive preprocessing pipeline that chains them.

pub mod enhance;
pub mod pipeline;
pub mod quality;

pub use enhance::ScanEnhancer;
pub use pipeline::PreprocessingPipeline;
pub use quality::ImageQualityAnalyzer;
