// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image quality analysis — classifies a raster into a quality tier from a
// small window sampled at its centre.

use image::{DynamicImage, GrayImage};
use lectern_core::{ImageQuality, QualityReport};
use tracing::{debug, instrument};

/// Side of the default centre sample window, in pixels.
pub const DEFAULT_SAMPLE_WINDOW: u32 = 100;

/// Minimum contrast ratio for the HIGH tier.
const HIGH_CONTRAST: f32 = 0.7;
/// Maximum noise proxy for the HIGH tier.
const HIGH_MAX_NOISE: f32 = 0.1;
/// Minimum contrast ratio for the MEDIUM tier.
const MEDIUM_CONTRAST: f32 = 0.4;
/// Neighbour difference (0..=255) that counts as an edge.
const EDGE_STEP: u8 = 40;

/// Classifies rasters into [`ImageQuality`] tiers.
///
/// Pure and deterministic: the same raster always yields the same report.
#[derive(Debug, Clone, Copy)]
pub struct ImageQualityAnalyzer {
    window: u32,
}

impl Default for ImageQualityAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_WINDOW)
    }
}

impl ImageQualityAnalyzer {
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(2),
        }
    }

    /// Quality tier of `image`.
    pub fn detect_quality(&self, image: &DynamicImage) -> ImageQuality {
        self.analyze(image).quality
    }

    /// Full measurements for `image`.
    ///
    /// Rasters smaller than the sample window in either dimension are
    /// reported as MEDIUM with zeroed metrics.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn analyze(&self, image: &DynamicImage) -> QualityReport {
        let (width, height) = (image.width(), image.height());
        if width < self.window || height < self.window {
            debug!(window = self.window, "Image smaller than sample window");
            return QualityReport::undersized();
        }

        let x = (width - self.window) / 2;
        let y = (height - self.window) / 2;
        let sample = image.crop_imm(x, y, self.window, self.window).to_luma8();
        let report = measure(&sample);

        debug!(
            quality = %report.quality,
            contrast = report.contrast,
            noise = report.noise,
            edge_density = report.edge_density,
            "Image quality measured"
        );
        report
    }
}

/// Compute contrast, noise and edge density over a grayscale sample.
fn measure(sample: &GrayImage) -> QualityReport {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    let mut diff_sum: u64 = 0;
    let mut pairs: u64 = 0;
    let mut edges: u64 = 0;

    for row in sample.rows() {
        let mut previous: Option<u8> = None;
        for pixel in row {
            let value = pixel.0[0];
            min = min.min(value);
            max = max.max(value);
            if let Some(prev) = previous {
                let diff = value.abs_diff(prev);
                diff_sum += diff as u64;
                pairs += 1;
                if diff > EDGE_STEP {
                    edges += 1;
                }
            }
            previous = Some(value);
        }
    }

    let contrast = (max.saturating_sub(min)) as f32 / 255.0;
    let (noise, edge_density) = if pairs == 0 {
        (0.0, 0.0)
    } else {
        (
            diff_sum as f32 / pairs as f32 / 255.0,
            edges as f32 / pairs as f32,
        )
    };

    QualityReport {
        quality: classify(contrast, noise),
        contrast,
        noise,
        edge_density,
    }
}

/// Map the two metrics onto a tier.
pub fn classify(contrast: f32, noise: f32) -> ImageQuality {
    if contrast >= HIGH_CONTRAST && noise <= HIGH_MAX_NOISE {
        ImageQuality::High
    } else if contrast >= MEDIUM_CONTRAST {
        ImageQuality::Medium
    } else {
        ImageQuality::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// White page with a black text-like bar through the middle.
    fn clean_page() -> DynamicImage {
        let mut img = GrayImage::from_pixel(300, 300, Luma([250u8]));
        for y in 140..160 {
            for x in 60..240 {
                img.put_pixel(x, y, Luma([10u8]));
            }
        }
        DynamicImage::ImageLuma8(img)
    }

    /// Dull, low-contrast speckle.
    fn murky_page() -> DynamicImage {
        let img = GrayImage::from_fn(300, 300, |x, y| {
            Luma([if (x * 7 + y * 13) % 5 == 0 { 140 } else { 120 }])
        });
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn clean_page_is_high_quality() {
        let report = ImageQualityAnalyzer::default().analyze(&clean_page());
        assert_eq!(report.quality, ImageQuality::High);
        assert!(report.contrast >= 0.9);
        assert!(report.noise <= 0.1);
    }

    #[test]
    fn murky_page_is_low_quality() {
        let quality = ImageQualityAnalyzer::default().detect_quality(&murky_page());
        assert_eq!(quality, ImageQuality::Low);
    }

    #[test]
    fn mid_contrast_is_medium() {
        assert_eq!(classify(0.5, 0.05), ImageQuality::Medium);
        assert_eq!(classify(0.8, 0.3), ImageQuality::Medium);
        assert_eq!(classify(0.3, 0.0), ImageQuality::Low);
    }

    #[test]
    fn detection_is_deterministic() {
        let analyzer = ImageQualityAnalyzer::default();
        let page = murky_page();
        let first = analyzer.analyze(&page);
        for _ in 0..5 {
            assert_eq!(analyzer.analyze(&page), first);
        }
    }

    #[test]
    fn undersized_raster_degrades_to_medium() {
        let tiny = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 400, Luma([0u8])));
        assert_eq!(
            ImageQualityAnalyzer::default().detect_quality(&tiny),
            ImageQuality::Medium
        );
    }
}
