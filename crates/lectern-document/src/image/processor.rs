// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode, bounded resize, grayscale, contrast adjustment and
// thumbnailing. Operates on in-memory images using the `image` crate.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, RgbImage};
use lectern_core::error::LecternError;
use tracing::{debug, info, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Every transformation consumes `self` and returns a new `ImageProcessor`, so
/// the superseded buffer is dropped as soon as its replacement exists and no
/// stage ever holds two copies of the same picture.
///
/// ```ignore
/// let gray = ImageProcessor::open("receipt.jpg")?
///     .resize_within(600, 2400)
///     .grayscale()
///     .adjust_contrast(1.5)
///     .into_dynamic();
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, LecternError> {
        let img = image::open(path.as_ref()).map_err(|err| {
            LecternError::Decode(format!("failed to open {}: {}", path.as_ref().display(), err))
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Read the pixel dimensions of an image file from its header, without
    /// decoding the pixels.
    pub fn read_dimensions(path: impl AsRef<std::path::Path>) -> Result<(u32, u32), LecternError> {
        let path = path.as_ref();
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        reader.into_dimensions().map_err(|err| {
            LecternError::Decode(format!("failed to open {}: {}", path.display(), err))
        })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, LecternError> {
        let img = image::load_from_memory(data)
            .map_err(|err| LecternError::Decode(format!("failed to decode image: {}", err)))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Scale so the long edge is at most `max_dimension` and the short edge at
    /// least `min_dimension`, preserving aspect ratio.
    ///
    /// Images already inside the bounds are passed through untouched. When both
    /// limits cannot hold at once (very elongated images) the long-edge limit
    /// wins.
    #[instrument(skip(self))]
    pub fn resize_within(self, min_dimension: u32, max_dimension: u32) -> Self {
        let (width, height) = (self.image.width(), self.image.height());
        let Some((new_w, new_h)) = scale_for(width, height, min_dimension, max_dimension) else {
            debug!(width, height, "Already within bounds; resize skipped");
            return self;
        };

        info!(from_w = width, from_h = height, new_w, new_h, "Resizing image");
        Self {
            image: self.image.resize_exact(new_w, new_h, FilterType::CatmullRom),
        }
    }

    /// Shrink the image so its long edge is at most `max_dimension`.
    /// Smaller images are returned unchanged.
    pub fn cap_dimension(self, max_dimension: u32) -> Self {
        let (width, height) = (self.image.width(), self.image.height());
        if width.max(height) <= max_dimension || max_dimension == 0 {
            return self;
        }
        debug!(width, height, max_dimension, "Capping image dimensions");
        Self {
            image: self
                .image
                .resize(max_dimension, max_dimension, FilterType::Triangle),
        }
    }

    /// Convert the image to 8-bit grayscale (luma).
    #[instrument(skip(self))]
    pub fn grayscale(self) -> Self {
        if matches!(self.image, DynamicImage::ImageLuma8(_)) {
            return self;
        }
        debug!("Converting to grayscale");
        Self {
            image: DynamicImage::ImageLuma8(self.image.into_luma8()),
        }
    }

    /// Adjust contrast by a factor around mid-gray. Values > 1.0 increase
    /// contrast; values < 1.0 decrease it. A value of 1.0 is a no-op.
    ///
    /// Grayscale images are rescaled in place; other formats go through RGBA.
    #[instrument(skip(self))]
    pub fn adjust_contrast(self, factor: f32) -> Self {
        if (factor - 1.0).abs() < f32::EPSILON {
            return self;
        }
        debug!(factor, "Adjusting contrast");

        let adjust = |channel: u8| -> u8 {
            let val = factor * (channel as f32 - 128.0) + 128.0;
            val.clamp(0.0, 255.0) as u8
        };

        match self.image {
            DynamicImage::ImageLuma8(mut gray) => {
                for pixel in gray.pixels_mut() {
                    pixel.0[0] = adjust(pixel.0[0]);
                }
                Self {
                    image: DynamicImage::ImageLuma8(gray),
                }
            }
            other => {
                let mut rgba = other.into_rgba8();
                for pixel in rgba.pixels_mut() {
                    let image::Rgba([r, g, b, a]) = *pixel;
                    *pixel = image::Rgba([adjust(r), adjust(g), adjust(b), a]);
                }
                Self {
                    image: DynamicImage::ImageRgba8(rgba),
                }
            }
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Produce an RGB thumbnail whose long edge is at most `max_edge`.
    pub fn thumbnail(&self, max_edge: u32) -> RgbImage {
        self.image.thumbnail(max_edge, max_edge).to_rgb8()
    }

    /// Encode the image losslessly as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, LecternError> {
        let mut buf = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|err| LecternError::ImageError(format!("failed to encode PNG: {}", err)))?;
        Ok(buf)
    }

    /// Write the image to a file. The format is inferred from the file extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), LecternError> {
        self.image.save(path.as_ref()).map_err(|err| {
            LecternError::ImageError(format!(
                "failed to save image to {}: {}",
                path.as_ref().display(),
                err
            ))
        })
    }
}

/// Compute the target size for [`ImageProcessor::resize_within`].
///
/// Returns `None` when the image is already inside the bounds (or empty).
/// Otherwise the scale is `max/long` if the long edge is too big, or
/// `min(min/short, max/long)` if the short edge is too small.
pub fn scale_for(
    width: u32,
    height: u32,
    min_dimension: u32,
    max_dimension: u32,
) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }

    let long = width.max(height) as f64;
    let short = width.min(height) as f64;

    let scale = if long > max_dimension as f64 {
        max_dimension as f64 / long
    } else if short < min_dimension as f64 {
        (min_dimension as f64 / short).min(max_dimension as f64 / long)
    } else {
        return None;
    };

    let new_w = ((width as f64 * scale).round() as u32).clamp(1, max_dimension.max(1));
    let new_h = ((height as f64 * scale).round() as u32).clamp(1, max_dimension.max(1));
    if (new_w, new_h) == (width, height) {
        return None;
    }
    Some((new_w, new_h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb};

    const MIN: u32 = 600;
    const MAX: u32 = 2400;

    #[test]
    fn resize_bounds_hold_for_many_shapes() {
        let shapes = [
            (100, 100),
            (300, 500),
            (640, 480),
            (1000, 1400),
            (2400, 600),
            (3000, 2000),
            (5000, 5000),
            (4032, 3024),
            (800, 12000),
            (599, 601),
        ];

        for (w, h) in shapes {
            let (nw, nh) = scale_for(w, h, MIN, MAX).unwrap_or((w, h));
            let long = nw.max(nh);
            let short = nw.min(nh);
            assert!(long <= MAX, "{w}x{h} -> {nw}x{nh}: long edge above max");

            // The short edge only falls below MIN when honouring it would push
            // the long edge past MAX.
            let source_ratio = w.max(h) as f64 / w.min(h) as f64;
            if source_ratio * MIN as f64 <= MAX as f64 {
                assert!(short >= MIN, "{w}x{h} -> {nw}x{nh}: short edge below min");
            }

            let before = w as f64 / h as f64;
            let after = nw as f64 / nh as f64;
            let tolerance = 1.0 / nw.min(nh) as f64 + 1e-9;
            assert!(
                (before - after).abs() / before <= tolerance * 2.0,
                "{w}x{h} -> {nw}x{nh}: aspect ratio drifted"
            );
        }
    }

    #[test]
    fn in_bounds_image_is_not_resized() {
        assert_eq!(scale_for(1200, 900, MIN, MAX), None);
        let img = DynamicImage::ImageLuma8(GrayImage::new(1200, 900));
        let out = ImageProcessor::from_dynamic(img).resize_within(MIN, MAX);
        assert_eq!((out.width(), out.height()), (1200, 900));
    }

    #[test]
    fn small_image_is_upscaled() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(300, 200));
        let out = ImageProcessor::from_dynamic(img).resize_within(MIN, MAX);
        assert_eq!((out.width(), out.height()), (900, 600));
    }

    #[test]
    fn grayscale_produces_luma8() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])));
        let out = ImageProcessor::from_dynamic(img).grayscale().into_dynamic();
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn contrast_stretches_around_mid_gray() {
        let mut gray = GrayImage::from_pixel(2, 1, Luma([100]));
        gray.put_pixel(1, 0, Luma([160]));
        let out = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(gray))
            .adjust_contrast(2.0)
            .into_dynamic()
            .into_luma8();
        assert_eq!(out.get_pixel(0, 0).0[0], 72);
        assert_eq!(out.get_pixel(1, 0).0[0], 192);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = ImageProcessor::from_bytes(b"definitely not an image").err();
        assert!(matches!(err, Some(LecternError::Decode(_))));
    }

    #[test]
    fn thumbnail_fits_requested_edge() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(1000, 500));
        let thumb = ImageProcessor::from_dynamic(img).thumbnail(256);
        assert_eq!(thumb.width(), 256);
        assert_eq!(thumb.height(), 128);
    }

    #[test]
    fn png_encoding_is_lossless() {
        let mut gray = GrayImage::from_pixel(40, 30, Luma([200]));
        gray.put_pixel(7, 9, Luma([3]));
        let bytes = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(gray.clone()))
            .encode_png()
            .expect("encode");
        let decoded = ImageProcessor::from_bytes(&bytes).expect("decode").into_dynamic();
        assert_eq!(decoded.into_luma8(), gray);
    }
}
