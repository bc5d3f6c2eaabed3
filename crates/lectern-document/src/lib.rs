// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// lectern-document — Raster and document handling for Lectern.
//
// Provides image processing (decode, bounded resize, grayscale, contrast), a
// quality-adaptive preprocessing pipeline (quality analysis, Otsu binarization,
// median denoising), and page rendering for multi-page sources (scanned PDFs
// and image sequences).

pub mod image;
pub mod pdf;
pub mod render;
pub mod scan;

// Re-export the primary structs so callers can use `lectern_document::PdfReader` etc.
pub use self::image::processor::ImageProcessor;
pub use pdf::reader::PdfReader;
pub use render::{ImageSequence, PageRenderer, RenderRequest};
pub use scan::enhance::ScanEnhancer;
pub use scan::pipeline::{Preprocessed, PreprocessingPipeline, Stage, StageTrace};
pub use scan::quality::ImageQualityAnalyzer;
