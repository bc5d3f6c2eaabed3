// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recognition backend built on Tesseract through the `tesseract` crate.
//
// # Feature Gate
//
// Only compiled with the `tesseract` feature, which links the system
// `libtesseract` and `libleptonica`:
//
// ```toml
// lectern-recognition = { path = "crates/lectern-recognition", features = ["tesseract"] }
// ```
//
// Models are the `<code>.traineddata` files that `LanguageAssetManager`
// materializes into `<data dir>/tessdata`. Every pass applies the requested
// segmentation mode and the full variable set, so nothing a retry changes
// leaks into the next call.

use std::path::Path;

use lectern_core::error::{LecternError, Result};
use tesseract::{PageSegMode, Tesseract};
use tracing::{debug, info, instrument};

use crate::engine::{
    EngineFactory, EngineOutput, EngineRequest, RecognitionEngine, SegmentationMode,
};

/// Density reported to Tesseract for every raster.
const SOURCE_DPI: u32 = 300;

/// Builds [`TesseractEngine`]s from a tessdata directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct TesseractEngineFactory;

impl EngineFactory for TesseractEngineFactory {
    #[instrument(skip(self, tessdata_dir), fields(tessdata = %tessdata_dir.display()))]
    fn create(&self, tessdata_dir: &Path, selector: &str) -> Result<Box<dyn RecognitionEngine>> {
        let datapath = tessdata_dir.to_str().ok_or_else(|| {
            LecternError::EngineInit(format!(
                "tessdata path is not UTF-8: {}",
                tessdata_dir.display()
            ))
        })?;
        let api = open_api(datapath, selector)?;
        info!(%selector, "Tesseract engine initialised");
        Ok(Box::new(TesseractEngine {
            api: Some(api),
            datapath: datapath.to_string(),
            selector: selector.to_string(),
        }))
    }
}

fn open_api(datapath: &str, selector: &str) -> Result<Tesseract> {
    Tesseract::new(Some(datapath), Some(selector)).map_err(|err| {
        LecternError::EngineInit(format!("tesseract could not load {selector}: {err}"))
    })
}

/// A loaded Tesseract instance.
///
/// The binding consumes the handle on every builder call, so a failed call
/// loses it; the next pass then loads the same languages again.
pub struct TesseractEngine {
    api: Option<Tesseract>,
    datapath: String,
    selector: String,
}

impl TesseractEngine {
    fn take_api(&mut self) -> Result<Tesseract> {
        match self.api.take() {
            Some(api) => Ok(api),
            None => {
                debug!(selector = %self.selector, "Reloading Tesseract after a failed pass");
                open_api(&self.datapath, &self.selector)
            }
        }
    }
}

impl RecognitionEngine for TesseractEngine {
    fn language_selector(&self) -> &str {
        &self.selector
    }

    #[instrument(skip_all, fields(
        width = request.image.width(),
        height = request.image.height(),
        mode = %request.mode,
    ))]
    fn recognize(&mut self, request: &EngineRequest<'_>) -> Result<EngineOutput> {
        let mut settings = request.variables.tesseract_settings();
        settings.push(("user_defined_dpi", SOURCE_DPI.to_string()));

        let mut api = self.take_api()?;
        for (name, value) in settings {
            api = api.set_variable(name, &value).map_err(|err| {
                LecternError::Recognition(format!("could not set {name}: {err}"))
            })?;
        }
        api.set_page_seg_mode(page_seg_mode(request.mode));

        let image = request.image;
        let (width, height) = (image.width() as i32, image.height() as i32);
        api = api
            .set_frame(image.as_raw(), width, height, 1, width)
            .map_err(|err| {
                LecternError::Recognition(format!(
                    "failed to hand {width}x{height} raster to tesseract: {err}"
                ))
            })?
            .recognize()
            .map_err(|err| {
                LecternError::Recognition(format!("tesseract recognition failed: {err}"))
            })?;

        let text = api.get_text().map_err(|err| {
            LecternError::Recognition(format!("tesseract returned no text: {err}"))
        })?;
        let confidence = api.mean_text_conf().clamp(0, 100) as u8;
        self.api = Some(api);

        debug!(lines = text.lines().count(), confidence, "Tesseract pass complete");
        Ok(EngineOutput { text, confidence })
    }
}

fn page_seg_mode(mode: SegmentationMode) -> PageSegMode {
    match mode {
        SegmentationMode::Auto => PageSegMode::PsmAuto,
        SegmentationMode::SingleColumn => PageSegMode::PsmSingleColumn,
        SegmentationMode::SingleBlock => PageSegMode::PsmSingleBlock,
        SegmentationMode::SparseText => PageSegMode::PsmSparseText,
    }
}
