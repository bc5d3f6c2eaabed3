// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rendering — the seam between multi-page sources and the recognition
// path. Renderers produce one owned raster per request so that a document is
// processed with a single page alive at a time.

use std::path::PathBuf;

use image::DynamicImage;
use lectern_core::error::{LecternError, Result};
use tracing::{debug, instrument};

use crate::image::processor::ImageProcessor;

/// Density assumed for rasters that carry no physical size.
pub const DEFAULT_NATIVE_DPI: u32 = 300;

/// How a page should be rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    /// Target density in dots per inch.
    pub dpi: u32,
    /// Hard cap on the long edge of the rendered raster.
    pub max_dimension: u32,
}

/// A source of page rasters: scanned PDFs, image sequences, ...
pub trait PageRenderer: Send {
    /// Total number of pages.
    fn page_count(&self) -> usize;

    /// Rasterize page `index` (zero-based). Implementations must honour
    /// `request.max_dimension`.
    fn render_page(&mut self, index: usize, request: &RenderRequest) -> Result<DynamicImage>;
}

/// Scale `image` by `dpi / native_dpi`, then cap its long edge.
pub fn scale_to_density(
    image: DynamicImage,
    native_dpi: u32,
    request: &RenderRequest,
) -> DynamicImage {
    let scale = request.dpi as f64 / native_dpi.max(1) as f64;
    let processor = ImageProcessor::from_dynamic(image);
    let processor = if (scale - 1.0).abs() > 0.01 {
        let width = ((processor.width() as f64 * scale).round() as u32).max(1);
        let height = ((processor.height() as f64 * scale).round() as u32).max(1);
        let capped = fit_long_edge(width, height, request.max_dimension);
        ImageProcessor::from_dynamic(processor.into_dynamic().resize_exact(
            capped.0,
            capped.1,
            image::imageops::FilterType::Triangle,
        ))
    } else {
        processor
    };
    processor.cap_dimension(request.max_dimension).into_dynamic()
}

/// Shrink `(width, height)` proportionally so the long edge fits `max`.
pub fn fit_long_edge(width: u32, height: u32, max: u32) -> (u32, u32) {
    let long = width.max(height);
    if max == 0 || long <= max {
        return (width, height);
    }
    let scale = max as f64 / long as f64;
    (
        ((width as f64 * scale).round() as u32).clamp(1, max),
        ((height as f64 * scale).round() as u32).clamp(1, max),
    )
}

/// A page of an [`ImageSequence`]. Pages stay encoded until rendered, so the
/// only decoded copy of a page is the one handed to the caller.
enum SequencePage {
    Encoded(Vec<u8>),
    File(PathBuf),
}

/// A document made of one raster per page, held encoded in memory or read
/// from files.
pub struct ImageSequence {
    pages: Vec<SequencePage>,
    native_dpi: u32,
}

impl ImageSequence {
    /// Pages already decoded in memory. Each is re-encoded as PNG and dropped.
    pub fn from_images(pages: Vec<DynamicImage>) -> Result<Self> {
        let pages = pages
            .into_iter()
            .map(|page| ImageProcessor::from_dynamic(page).encode_png().map(SequencePage::Encoded))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            pages,
            native_dpi: DEFAULT_NATIVE_DPI,
        })
    }

    /// Pages given as encoded image files (PNG, JPEG, ...).
    pub fn from_encoded(pages: Vec<Vec<u8>>) -> Self {
        Self {
            pages: pages.into_iter().map(SequencePage::Encoded).collect(),
            native_dpi: DEFAULT_NATIVE_DPI,
        }
    }

    /// Pages decoded from files on demand, one at a time.
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            pages: paths.into_iter().map(SequencePage::File).collect(),
            native_dpi: DEFAULT_NATIVE_DPI,
        }
    }

    /// Override the density the source rasters were captured at.
    pub fn with_native_dpi(mut self, dpi: u32) -> Self {
        self.native_dpi = dpi.max(1);
        self
    }
}

impl PageRenderer for ImageSequence {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[instrument(skip(self, request), fields(dpi = request.dpi))]
    fn render_page(&mut self, index: usize, request: &RenderRequest) -> Result<DynamicImage> {
        let count = self.pages.len();
        let page = self
            .pages
            .get(index)
            .ok_or(LecternError::PageOutOfRange { index, count })?;

        let image = match page {
            SequencePage::Encoded(bytes) => ImageProcessor::from_bytes(bytes)?.into_dynamic(),
            SequencePage::File(path) => ImageProcessor::open(path)?.into_dynamic(),
        };
        debug!(index, width = image.width(), height = image.height(), "Sequence page loaded");

        Ok(scale_to_density(image, self.native_dpi, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn request(dpi: u32, max_dimension: u32) -> RenderRequest {
        RenderRequest { dpi, max_dimension }
    }

    fn sequence(pages: Vec<DynamicImage>) -> ImageSequence {
        ImageSequence::from_images(pages).expect("encode pages")
    }

    #[test]
    fn native_density_is_passthrough() {
        let mut seq = sequence(vec![DynamicImage::ImageLuma8(GrayImage::new(640, 480))]);
        let page = seq.render_page(0, &request(300, 4000)).expect("render");
        assert_eq!((page.width(), page.height()), (640, 480));
    }

    #[test]
    fn lower_density_shrinks_page() {
        let mut seq = sequence(vec![DynamicImage::ImageLuma8(GrayImage::new(600, 900))]);
        let page = seq.render_page(0, &request(100, 4000)).expect("render");
        assert_eq!((page.width(), page.height()), (200, 300));
    }

    #[test]
    fn render_is_capped() {
        let page = DynamicImage::ImageLuma8(GrayImage::from_pixel(3000, 1500, Luma([255u8])));
        let mut seq = sequence(vec![page]);
        let page = seq.render_page(0, &request(600, 2000)).expect("render");
        assert_eq!(page.width().max(page.height()), 2000);
    }

    #[test]
    fn out_of_range_page_is_an_error() {
        let mut seq = sequence(vec![]);
        let err = seq.render_page(3, &request(300, 4000)).err();
        assert!(matches!(err, Some(LecternError::PageOutOfRange { index: 3, count: 0 })));
    }

    #[test]
    fn missing_file_page_is_a_decode_error() {
        let mut seq = ImageSequence::from_paths(vec![PathBuf::from("/nonexistent/page-1.png")]);
        let err = seq.render_page(0, &request(300, 4000)).err();
        assert!(matches!(err, Some(LecternError::Decode(_))));
    }

    #[test]
    fn pages_render_repeatedly_from_encoded_form() {
        let mut gray = GrayImage::from_pixel(300, 300, Luma([240u8]));
        gray.put_pixel(10, 20, Luma([0u8]));
        let mut seq = sequence(vec![DynamicImage::ImageLuma8(gray.clone())]);

        let small = seq.render_page(0, &request(100, 4000)).expect("detection render");
        assert_eq!((small.width(), small.height()), (100, 100));
        let full = seq.render_page(0, &request(300, 4000)).expect("bulk render");
        assert_eq!(full.into_luma8(), gray);
    }

    #[test]
    fn undecodable_encoded_page_is_a_decode_error() {
        let mut seq = ImageSequence::from_encoded(vec![b"not an image".to_vec()]);
        let err = seq.render_page(0, &request(300, 4000)).err();
        assert!(matches!(err, Some(LecternError::Decode(_))));
    }

    #[test]
    fn fit_long_edge_preserves_ratio() {
        assert_eq!(fit_long_edge(8000, 4000, 4000), (4000, 2000));
        assert_eq!(fit_long_edge(100, 50, 4000), (100, 50));
    }
}
