// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — open scanned PDF documents and rasterize their pages using
// the `lopdf` crate.
//
// Scanned PDFs carry each page as one embedded picture. Rendering a page
// means finding the largest image XObject on it, decoding it, and scaling it
// to the requested density relative to the page's MediaBox. Vector-only pages
// have nothing to recognise and report a render error.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use lectern_core::error::{LecternError, Result};
use tracing::{debug, info, instrument, warn};

use crate::render::{
    DEFAULT_NATIVE_DPI, PageRenderer, RenderRequest, fit_long_edge, scale_to_density,
};

/// PDF user-space units per inch.
const POINTS_PER_INCH: f64 = 72.0;

/// How far up the page tree inherited attributes are searched.
const MAX_TREE_DEPTH: usize = 32;

/// Reads scanned PDF files and renders their pages.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
    /// Page object ids in page order.
    pages: Vec<ObjectId>,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            LecternError::PdfError(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        let mut reader = Self::from_document(document);
        reader.source_path = Some(path_ref.display().to_string());
        Ok(reader)
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            LecternError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;
        Ok(Self::from_document(document))
    }

    fn from_document(document: Document) -> Self {
        // lopdf keys pages by 1-indexed page number in a BTreeMap, so values()
        // are already in page order.
        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        debug!(pages = pages.len(), "PDF loaded");
        Self {
            document,
            pages,
            source_path: None,
        }
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Return the source path if the reader was created via [`PdfReader::open`].
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// Page width and height in points, from the (possibly inherited) MediaBox.
    pub fn page_size_points(&self, index: usize) -> Option<(f64, f64)> {
        let page_id = *self.pages.get(index)?;
        let media_box = self.inherited(page_id, b"MediaBox")?;
        let values = match media_box {
            Object::Array(values) => values,
            _ => return None,
        };
        if values.len() != 4 {
            return None;
        }
        let nums: Vec<f64> = values
            .iter()
            .filter_map(|v| number(self.resolve(v)?))
            .collect();
        if nums.len() != 4 {
            return None;
        }
        let width = (nums[2] - nums[0]).abs();
        let height = (nums[3] - nums[1]).abs();
        (width > 0.0 && height > 0.0).then_some((width, height))
    }

    // -- Rendering ------------------------------------------------------------

    /// Decode the page's main picture at its native resolution.
    fn page_image(&self, index: usize) -> Result<DynamicImage> {
        let count = self.pages.len();
        let page_id = *self
            .pages
            .get(index)
            .ok_or(LecternError::PageOutOfRange { index, count })?;

        let resources = self
            .inherited(page_id, b"Resources")
            .and_then(|obj| obj.as_dict().ok())
            .ok_or_else(|| LecternError::Render(format!("page {} has no resources", index + 1)))?;

        let xobjects = resources
            .get(b"XObject")
            .ok()
            .and_then(|obj| self.resolve(obj))
            .and_then(|obj| obj.as_dict().ok())
            .ok_or_else(|| LecternError::Render(format!("page {} has no images", index + 1)))?;

        let stream = self
            .largest_image(xobjects)
            .ok_or_else(|| LecternError::Render(format!("page {} has no images", index + 1)))?;

        self.decode_image(stream)
            .map_err(|err| LecternError::Render(format!("page {}: {}", index + 1, err)))
    }

    /// Pick the image XObject with the most pixels.
    fn largest_image<'a>(&'a self, xobjects: &'a Dictionary) -> Option<&'a Stream> {
        xobjects
            .iter()
            .filter_map(|(_, value)| match self.resolve(value)? {
                Object::Stream(stream) if is_name(stream.dict.get(b"Subtype").ok(), b"Image") => {
                    let width = self.dict_integer(&stream.dict, b"Width")?;
                    let height = self.dict_integer(&stream.dict, b"Height")?;
                    Some((width * height, stream))
                }
                _ => None,
            })
            .max_by_key(|(area, _)| *area)
            .map(|(_, stream)| stream)
    }

    fn decode_image(&self, stream: &Stream) -> std::result::Result<DynamicImage, String> {
        let filters = stream_filters(&stream.dict);
        if filters.iter().any(|f| f.as_slice() == b"DCTDecode") {
            // Filters before DCTDecode (rarely Flate) must be undone first.
            let data = if filters.len() > 1 {
                stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone())
            } else {
                stream.content.clone()
            };
            return image::load_from_memory_with_format(&data, ImageFormat::Jpeg)
                .map_err(|err| format!("JPEG decode failed: {err}"));
        }
        if let Some(unsupported) = filters
            .iter()
            .find(|f| f.as_slice() != b"FlateDecode")
        {
            return Err(format!(
                "unsupported image filter {}",
                String::from_utf8_lossy(unsupported)
            ));
        }

        let width = self
            .dict_integer(&stream.dict, b"Width")
            .ok_or("image has no width")? as u32;
        let height = self
            .dict_integer(&stream.dict, b"Height")
            .ok_or("image has no height")? as u32;
        let bits = self.dict_integer(&stream.dict, b"BitsPerComponent").unwrap_or(8);
        let components = self.color_components(&stream.dict)?;

        let data = if filters.is_empty() {
            stream.content.clone()
        } else {
            stream
                .decompressed_content()
                .map_err(|err| format!("failed to inflate image: {err}"))?
        };

        let pixels = width as usize * height as usize;
        match (components, bits) {
            (1, 8) => GrayImage::from_raw(width, height, truncate(data, pixels))
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| "gray image data too short".to_string()),
            (3, 8) => RgbImage::from_raw(width, height, truncate(data, pixels * 3))
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| "RGB image data too short".to_string()),
            (1, 1) => expand_bilevel(&data, width, height)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| "bilevel image data too short".to_string()),
            (components, bits) => Err(format!(
                "unsupported pixel layout ({components} components, {bits} bits)"
            )),
        }
    }

    fn color_components(&self, dict: &Dictionary) -> std::result::Result<u8, String> {
        if matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true))) {
            return Ok(1);
        }
        let space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|obj| self.resolve(obj))
            .ok_or("image has no colour space")?;
        match space {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"CalGray" => Ok(1),
                b"DeviceRGB" | b"CalRGB" => Ok(3),
                other => Err(format!(
                    "unsupported colour space {}",
                    String::from_utf8_lossy(other)
                )),
            },
            Object::Array(parts) if is_name(parts.first(), b"ICCBased") => {
                let profile = parts
                    .get(1)
                    .and_then(|obj| self.resolve(obj))
                    .and_then(|obj| obj.as_stream().ok())
                    .ok_or("ICC profile missing")?;
                match self.dict_integer(&profile.dict, b"N") {
                    Some(1) => Ok(1),
                    Some(3) => Ok(3),
                    other => Err(format!("unsupported ICC component count {other:?}")),
                }
            }
            _ => Err("unsupported colour space".into()),
        }
    }

    // -- Helpers --------------------------------------------------------------

    /// Follow a reference to the object it points at.
    fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(id) => self.document.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// Look up `key` on a page, walking /Parent for inherited attributes.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = self.document.get_object(page_id).ok()?.as_dict().ok()?;
        for _ in 0..MAX_TREE_DEPTH {
            if let Ok(value) = current.get(key) {
                return self.resolve(value);
            }
            let parent = current.get(b"Parent").ok()?;
            current = self.resolve(parent)?.as_dict().ok()?;
        }
        warn!("page tree deeper than {MAX_TREE_DEPTH} levels");
        None
    }

    fn dict_integer(&self, dict: &Dictionary, key: &[u8]) -> Option<i64> {
        match self.resolve(dict.get(key).ok()?)? {
            Object::Integer(value) => Some(*value),
            Object::Real(value) => Some(*value as i64),
            _ => None,
        }
    }
}

impl PageRenderer for PdfReader {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[instrument(skip(self, request), fields(dpi = request.dpi))]
    fn render_page(&mut self, index: usize, request: &RenderRequest) -> Result<DynamicImage> {
        let image = self.page_image(index)?;
        let (native_w, native_h) = (image.width(), image.height());

        let rendered = match self.page_size_points(index) {
            Some((width_pt, height_pt)) => {
                let dpi = request.dpi as f64;
                let to_pixels =
                    |points: f64| (points / POINTS_PER_INCH * dpi).round().max(1.0) as u32;
                let (target_w, target_h) = (to_pixels(width_pt), to_pixels(height_pt));
                let (target_w, target_h) = fit_long_edge(target_w, target_h, request.max_dimension);
                if (target_w, target_h) == (native_w, native_h) {
                    image
                } else {
                    image.resize_exact(target_w, target_h, image::imageops::FilterType::Triangle)
                }
            }
            None => scale_to_density(image, DEFAULT_NATIVE_DPI, request),
        };

        debug!(
            index,
            native_w,
            native_h,
            width = rendered.width(),
            height = rendered.height(),
            "PDF page rendered"
        );
        Ok(rendered)
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(*value as f64),
        _ => None,
    }
}

fn is_name(object: Option<&Object>, expected: &[u8]) -> bool {
    match object {
        Some(Object::Name(name)) => name.as_slice() == expected,
        _ => false,
    }
}

/// The /Filter entry as a list of filter names.
fn stream_filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(names)) => names
            .iter()
            .filter_map(|obj| match obj {
                Object::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn truncate(mut data: Vec<u8>, len: usize) -> Vec<u8> {
    data.truncate(len);
    data
}

/// Expand 1-bit-per-pixel rows (padded to whole bytes) to 8-bit gray, where a
/// set bit is white.
fn expand_bilevel(data: &[u8], width: u32, height: u32) -> Option<GrayImage> {
    let stride = (width as usize).div_ceil(8);
    if data.len() < stride * height as usize {
        return None;
    }
    Some(GrayImage::from_fn(width, height, |x, y| {
        let byte = data[y as usize * stride + x as usize / 8];
        let bit = (byte >> (7 - (x % 8))) & 1;
        image::Luma([if bit == 1 { 255 } else { 0 }])
    }))
}
