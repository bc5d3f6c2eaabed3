// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quality-adaptive preprocessing pipeline.
//
// resize -> grayscale -> contrast for every raster; LOW quality input
// additionally goes through Otsu binarization and a 3x3 median filter.

use image::{DynamicImage, GrayImage};
use lectern_core::config::PreprocessConfig;
use lectern_core::ImageQuality;
use tracing::{debug, info, instrument};

use super::enhance::ScanEnhancer;
use super::quality::ImageQualityAnalyzer;
use crate::image::processor::ImageProcessor;

/// A pipeline stage that produced a new buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resize,
    Grayscale,
    Contrast,
    Threshold,
    Denoise,
}

/// Geometry of the buffer a stage produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTrace {
    pub stage: Stage,
    pub width: u32,
    pub height: u32,
}

/// Output of [`PreprocessingPipeline::process`].
#[derive(Debug)]
pub struct Preprocessed {
    /// Recognition-ready grayscale raster.
    pub image: GrayImage,
    /// Tier the stages were chosen for.
    pub quality: ImageQuality,
    /// Stages that ran, in order. Skipped stages are absent.
    pub stages: Vec<StageTrace>,
}

/// Resizes, desaturates, contrast-enhances and (for poor input) binarizes
/// and denoises a raster.
#[derive(Debug, Clone)]
pub struct PreprocessingPipeline {
    config: PreprocessConfig,
    analyzer: ImageQualityAnalyzer,
}

impl Default for PreprocessingPipeline {
    fn default() -> Self {
        Self::new(PreprocessConfig::default())
    }
}

impl PreprocessingPipeline {
    pub fn new(config: PreprocessConfig) -> Self {
        let analyzer = ImageQualityAnalyzer::new(config.sample_window);
        Self { config, analyzer }
    }

    /// The analyzer used when no quality hint is given.
    pub fn analyzer(&self) -> &ImageQualityAnalyzer {
        &self.analyzer
    }

    /// Contrast factor applied for a tier.
    pub fn contrast_factor(&self, quality: ImageQuality) -> f32 {
        match quality {
            ImageQuality::High => self.config.contrast_high,
            ImageQuality::Medium => self.config.contrast_medium,
            ImageQuality::Low => self.config.contrast_low,
        }
    }

    /// Run the pipeline, consuming `image`.
    ///
    /// Without a hint the quality tier is measured on the input first.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn process(&self, image: DynamicImage, hint: Option<ImageQuality>) -> Preprocessed {
        let quality = hint.unwrap_or_else(|| self.analyzer.detect_quality(&image));
        let mut stages = Vec::with_capacity(5);

        // Step 1: Resize into bounds (skipped when already inside them).
        let (before_w, before_h) = (image.width(), image.height());
        let processor = ImageProcessor::from_dynamic(image)
            .resize_within(self.config.min_dimension, self.config.max_dimension);
        if (processor.width(), processor.height()) != (before_w, before_h) {
            stages.push(trace(Stage::Resize, processor.width(), processor.height()));
        }

        // Step 2: Grayscale.
        let processor = processor.grayscale();
        stages.push(trace(Stage::Grayscale, processor.width(), processor.height()));

        // Step 3: Contrast, strength by tier.
        let processor = processor.adjust_contrast(self.contrast_factor(quality));
        stages.push(trace(Stage::Contrast, processor.width(), processor.height()));

        let mut gray = processor.into_dynamic().into_luma8();

        // Steps 4+5: Only poor scans are binarized and denoised.
        if quality == ImageQuality::Low {
            let enhancer = ScanEnhancer::from_gray(gray).binarize_otsu();
            stages.push(trace(
                Stage::Threshold,
                enhancer.as_gray().width(),
                enhancer.as_gray().height(),
            ));

            let enhancer = enhancer.denoise_median();
            stages.push(trace(
                Stage::Denoise,
                enhancer.as_gray().width(),
                enhancer.as_gray().height(),
            ));
            gray = enhancer.into_gray();
        } else {
            debug!(%quality, "Threshold and denoise skipped");
        }

        info!(
            %quality,
            width = gray.width(),
            height = gray.height(),
            stage_count = stages.len(),
            "Preprocessing complete"
        );

        Preprocessed {
            image: gray,
            quality,
            stages,
        }
    }
}

fn trace(stage: Stage, width: u32, height: u32) -> StageTrace {
    StageTrace {
        stage,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    fn stage_names(out: &Preprocessed) -> Vec<Stage> {
        out.stages.iter().map(|s| s.stage).collect()
    }

    fn page(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, _| {
            if x % 20 < 4 { Rgb([20, 20, 20]) } else { Rgb([240, 240, 240]) }
        }))
    }

    #[test]
    fn high_quality_path_skips_threshold_and_denoise() {
        let pipeline = PreprocessingPipeline::default();
        let high = pipeline.process(page(800, 1000), Some(ImageQuality::High));
        let low = pipeline.process(page(800, 1000), Some(ImageQuality::Low));

        assert_eq!(stage_names(&high), vec![Stage::Grayscale, Stage::Contrast]);
        assert_eq!(
            stage_names(&low),
            vec![
                Stage::Grayscale,
                Stage::Contrast,
                Stage::Threshold,
                Stage::Denoise
            ]
        );

        // Same geometry throughout; only the number of buffers differs.
        for t in high.stages.iter().chain(low.stages.iter()) {
            assert_eq!((t.width, t.height), (800, 1000));
        }
        assert_eq!(high.image.dimensions(), low.image.dimensions());
    }

    #[test]
    fn low_quality_output_is_binary() {
        let out = PreprocessingPipeline::default().process(page(700, 700), Some(ImageQuality::Low));
        assert!(out.image.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn oversized_input_is_resized_first() {
        let out =
            PreprocessingPipeline::default().process(page(4800, 3000), Some(ImageQuality::Medium));
        let first = out.stages[0];
        assert_eq!(first.stage, Stage::Resize);
        assert_eq!((first.width, first.height), (2400, 1500));
        assert_eq!(out.image.dimensions(), (2400, 1500));
    }

    #[test]
    fn quality_is_detected_without_hint() {
        let murky = DynamicImage::ImageLuma8(GrayImage::from_pixel(700, 700, Luma([128u8])));
        let out = PreprocessingPipeline::default().process(murky, None);
        assert_eq!(out.quality, ImageQuality::Low);
        assert_eq!(out.stages.len(), 4);
    }

    #[test]
    fn contrast_factor_grows_as_quality_drops() {
        let pipeline = PreprocessingPipeline::default();
        let factor = |quality| pipeline.contrast_factor(quality);
        assert!(factor(ImageQuality::High) < factor(ImageQuality::Medium));
        assert!(factor(ImageQuality::Medium) < factor(ImageQuality::Low));
    }
}
