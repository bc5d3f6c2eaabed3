// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement — global Otsu binarization and median denoising for
// poor-quality grayscale scans.

use image::GrayImage;
use imageproc::stats::histogram;
use tracing::{debug, instrument};

/// Cleans up a grayscale scan before recognition.
///
/// Each operation consumes the enhancer and returns the cleaned result, so a
/// superseded buffer never outlives the step that replaced it.
pub struct ScanEnhancer {
    /// The working image.
    image: GrayImage,
}

impl ScanEnhancer {
    /// Wrap a grayscale image.
    pub fn from_gray(image: GrayImage) -> Self {
        Self { image }
    }

    /// Borrow the current working image.
    pub fn as_gray(&self) -> &GrayImage {
        &self.image
    }

    /// Consume the enhancer and return the underlying image.
    pub fn into_gray(self) -> GrayImage {
        self.image
    }

    // -- Binarization ---------------------------------------------------------

    /// Global binarization with the threshold chosen by Otsu's method.
    ///
    /// Pixels at or below the threshold become black, all others white. The
    /// buffer is rewritten in place.
    #[instrument(skip(self), fields(width = self.image.width(), height = self.image.height()))]
    pub fn binarize_otsu(mut self) -> Self {
        let threshold = otsu_threshold(&self.image);
        debug!(threshold, "Otsu threshold computed");

        for pixel in self.image.pixels_mut() {
            pixel.0[0] = if pixel.0[0] <= threshold { 0 } else { 255 };
        }
        self
    }

    // -- Denoising ------------------------------------------------------------

    /// 3x3 median filter over interior pixels. Border pixels are copied
    /// unchanged; images narrower or shorter than 3 pixels pass through.
    #[instrument(skip(self), fields(width = self.image.width(), height = self.image.height()))]
    pub fn denoise_median(self) -> Self {
        let (width, height) = self.image.dimensions();
        if width < 3 || height < 3 {
            return self;
        }

        let source = self.image;
        let mut output = source.clone();
        let mut window = [0u8; 9];

        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let mut i = 0;
                for dy in 0..3 {
                    for dx in 0..3 {
                        window[i] = source.get_pixel(x + dx - 1, y + dy - 1).0[0];
                        i += 1;
                    }
                }
                window.sort_unstable();
                output.get_pixel_mut(x, y).0[0] = window[4];
            }
        }

        debug!("Median denoise complete");
        Self { image: output }
    }
}

/// Compute the Otsu threshold for a grayscale image.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let counts = histogram(gray);
    let mut bins = [0u64; 256];
    for (bin, &count) in bins.iter_mut().zip(counts.channels[0].iter()) {
        *bin = count as u64;
    }
    otsu_threshold_from_histogram(&bins)
}

/// Otsu's method over a 256-bin histogram.
///
/// Scans every candidate threshold `t` (pixels `<= t` are background),
/// tracking cumulative weight and mean on each side, and maximises the
/// between-class variance `wB * wF * (mB - mF)^2`. Histograms with gaps give a
/// plateau of equally good thresholds; the midpoint of that plateau is
/// returned so the cut sits between the two populations rather than hugging
/// one of them.
pub fn otsu_threshold_from_histogram(histogram: &[u64; 256]) -> u8 {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 128;
    }

    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut sum_background = 0.0f64;
    let mut weight_background: u64 = 0;
    let mut max_variance = 0.0f64;
    let mut first_best: Option<usize> = None;
    let mut last_best = 0usize;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let between = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        let tolerance = max_variance * 1e-12;
        if between > max_variance + tolerance {
            max_variance = between;
            first_best = Some(t);
            last_best = t;
        } else if first_best.is_some() && (between - max_variance).abs() <= tolerance {
            last_best = t;
        }
    }

    match first_best {
        Some(first) => ((first + last_best) / 2) as u8,
        // Uniform image: keep light pages white and dark pages black.
        None => {
            let value = histogram.iter().position(|&c| c > 0).unwrap_or(128);
            if value >= 128 {
                (value - 1) as u8
            } else {
                value as u8
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn bimodal_histogram_threshold_sits_between_modes() {
        let mut bins = [0u64; 256];
        bins[50] = 5000;
        bins[200] = 5000;
        let t = otsu_threshold_from_histogram(&bins);
        assert!(t > 50 && t < 200, "threshold {t} not strictly between modes");
    }

    #[test]
    fn bimodal_image_binarizes_cleanly() {
        let img = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 50 } else { 200 }]));
        let t = otsu_threshold(&img);
        assert!(t > 50 && t < 200);

        let out = ScanEnhancer::from_gray(img).binarize_otsu().into_gray();
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(19, 19).0[0], 255);
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn empty_histogram_defaults_to_mid_gray() {
        assert_eq!(otsu_threshold_from_histogram(&[0u64; 256]), 128);
    }

    #[test]
    fn uniform_white_page_stays_white() {
        let img = GrayImage::from_pixel(8, 8, Luma([255u8]));
        let out = ScanEnhancer::from_gray(img).binarize_otsu().into_gray();
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn median_removes_salt_noise_and_keeps_border() {
        let mut img = GrayImage::from_pixel(5, 5, Luma([255u8]));
        img.put_pixel(2, 2, Luma([0u8]));
        img.put_pixel(0, 0, Luma([0u8]));

        let out = ScanEnhancer::from_gray(img).denoise_median().into_gray();
        assert_eq!(out.get_pixel(2, 2).0[0], 255, "isolated speck removed");
        assert_eq!(out.get_pixel(0, 0).0[0], 0, "border pixel untouched");
    }

    #[test]
    fn tiny_image_passes_through_median() {
        let img = GrayImage::from_pixel(2, 8, Luma([7u8]));
        let out = ScanEnhancer::from_gray(img).denoise_median().into_gray();
        assert_eq!(out.dimensions(), (2, 8));
    }
}
