// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Multi-page document extraction.
//
// Pages are rendered and recognized strictly one at a time. Page 1 is used to
// narrow a multi-language engine to the document's script before the bulk
// pass. Failed pages are recorded and skipped; cancellation is honoured
// between pages and returns what was extracted so far.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, RgbImage};
use lectern_core::config::ExtractionConfig;
use lectern_core::error::{LecternError, Result};
use lectern_core::human_errors::humanize_error;
use lectern_core::{PageOutcome, PageReport, Progress};
use lectern_document::{ImageProcessor, ImageSequence, PageRenderer, PdfReader, RenderRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::orchestrator::RecognitionOrchestrator;
use crate::script::{detect_script, select_best_language};

/// Leading bytes of every PDF file.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Everything extracted from one document.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    /// Page texts joined with page separators.
    pub text: String,
    /// Small preview of the first usable page.
    pub thumbnail: Option<RgbImage>,
    /// Language selected by script detection, or the full selector when no
    /// detection ran.
    pub detected_language: String,
    /// Mean confidence over recognized pages.
    pub average_confidence: u8,
    pub page_count: usize,
    pub pages: Vec<PageReport>,
    /// True when extraction stopped early on request.
    pub cancelled: bool,
    /// Set when the document could not be processed at all.
    pub error: Option<String>,
}

impl ExtractionResult {
    pub(crate) fn failed(err: &LecternError) -> Self {
        Self {
            text: humanize_error(err).to_text(),
            error: Some(err.to_string()),
            ..Self::default()
        }
    }
}

/// Drives page-by-page recognition of a document.
pub struct DocumentPageExtractor {
    orchestrator: Arc<RecognitionOrchestrator>,
    config: ExtractionConfig,
}

impl DocumentPageExtractor {
    pub fn new(orchestrator: Arc<RecognitionOrchestrator>, config: ExtractionConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Open `path` (PDF by magic bytes, any other file as a single image) and
    /// extract it.
    #[instrument(skip(self, path, on_progress, cancel), fields(path = %path.as_ref().display()))]
    pub fn extract_document(
        &self,
        path: impl AsRef<Path>,
        enabled: &[String],
        on_progress: impl FnMut(Progress),
        cancel: &CancellationToken,
    ) -> ExtractionResult {
        match open_document(path.as_ref()) {
            Ok(mut renderer) => self.extract(renderer.as_mut(), enabled, on_progress, cancel),
            Err(err) => {
                warn!(error = %err, "Document could not be opened");
                ExtractionResult::failed(&err)
            }
        }
    }

    /// Extract every page of `renderer`.
    #[instrument(skip_all, fields(pages = renderer.page_count()))]
    pub fn extract(
        &self,
        renderer: &mut dyn PageRenderer,
        enabled: &[String],
        mut on_progress: impl FnMut(Progress),
        cancel: &CancellationToken,
    ) -> ExtractionResult {
        let total = renderer.page_count();
        let mut result = ExtractionResult {
            page_count: total,
            ..ExtractionResult::default()
        };

        if (!self.orchestrator.is_ready() || self.orchestrator.languages() != enabled)
            && !self.orchestrator.initialize(enabled)
        {
            return ExtractionResult {
                page_count: total,
                ..ExtractionResult::failed(&LecternError::EngineInit(enabled.join("+")))
            };
        }
        result.detected_language = self.orchestrator.languages().join("+");

        if enabled.len() > 1 && total > 0 && !cancel.is_cancelled() {
            match self.detect_language(renderer) {
                Ok(Some(selected)) => result.detected_language = selected,
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "Engine lost during script detection");
                    return ExtractionResult {
                        page_count: total,
                        ..ExtractionResult::failed(&err)
                    };
                }
            }
        }

        let request = RenderRequest {
            dpi: self.config.render_dpi,
            max_dimension: self.config.max_render_dimension,
        };
        let mut confidence_sum: u64 = 0;
        let mut recognized: u64 = 0;

        for index in 0..total {
            if cancel.is_cancelled() {
                info!(done = index, total, "Extraction cancelled");
                result.cancelled = true;
                break;
            }

            let page = self.process_page(renderer, index, &request, &mut result.thumbnail);
            let outcome = match page {
                Ok((outcome, text)) => {
                    if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
                        push_block(&mut result.text, index + 1, &text);
                    }
                    outcome
                }
                Err(err) => {
                    warn!(page = index + 1, error = %err, "Page could not be processed");
                    push_block(
                        &mut result.text,
                        index + 1,
                        &format!("[Page {}: could not be processed]", index + 1),
                    );
                    PageOutcome::Errored(err.to_string())
                }
            };

            if let PageOutcome::Recognized { confidence, .. } = outcome {
                confidence_sum += confidence as u64;
                recognized += 1;
            }
            result.pages.push(PageReport { index, outcome });
            on_progress(Progress {
                done: index + 1,
                total,
            });
        }

        if recognized > 0 {
            result.average_confidence = (confidence_sum as f64 / recognized as f64).round() as u8;
        }
        info!(
            pages = result.pages.len(),
            total,
            average_confidence = result.average_confidence,
            language = %result.detected_language,
            cancelled = result.cancelled,
            "Document extraction finished"
        );
        result
    }

    /// Recognize page 1 at low density and narrow the engine to the best
    /// single language for its script. Returns the selected code, or `None`
    /// when the engine keeps the full language set.
    ///
    /// Fails only when narrowing failed and the full set could not be loaded
    /// again, leaving no engine for the bulk pass.
    fn detect_language(&self, renderer: &mut dyn PageRenderer) -> Result<Option<String>> {
        let request = RenderRequest {
            dpi: self.config.detection_dpi,
            max_dimension: self.config.max_render_dimension,
        };
        let page = match renderer.render_page(0, &request) {
            Ok(page) => page,
            Err(err) => {
                warn!(error = %err, "Script detection skipped, page 1 did not render");
                return Ok(None);
            }
        };
        let Some(sample) = self.orchestrator.recognize(page) else {
            return Ok(None);
        };
        let script = detect_script(&sample.text);
        let languages = self.orchestrator.languages();
        let selected = select_best_language(script, &languages);
        debug!(%script, %selected, "Document script detected");

        if languages.len() == 1 && languages[0] == selected {
            return Ok(Some(selected));
        }
        if self.orchestrator.reinitialize(std::slice::from_ref(&selected)) {
            info!(%selected, "Engine narrowed to detected language");
            return Ok(Some(selected));
        }

        warn!(%selected, "Narrowing failed, restoring full language set");
        if self.orchestrator.initialize(&languages) {
            Ok(None)
        } else {
            Err(LecternError::EngineInit(languages.join("+")))
        }
    }

    /// Render and recognize one page. Returns the outcome and the page text.
    fn process_page(
        &self,
        renderer: &mut dyn PageRenderer,
        index: usize,
        request: &RenderRequest,
        thumbnail: &mut Option<RgbImage>,
    ) -> Result<(PageOutcome, Option<String>)> {
        let mut page = renderer.render_page(index, request)?;
        if page.width().max(page.height()) > request.max_dimension {
            debug!(index, "Renderer exceeded the size cap, downscaling");
            page = ImageProcessor::from_dynamic(page)
                .cap_dimension(request.max_dimension)
                .into_dynamic();
        }

        if thumbnail.is_none() && page.width() > 1 && page.height() > 1 {
            let size = self.config.thumbnail_size;
            *thumbnail = Some(page.thumbnail(size, size).to_rgb8());
        }

        if is_blank(&page, self.config.blank_sample_grid, self.config.blank_stddev) {
            debug!(index, "Blank page skipped");
            return Ok((PageOutcome::Blank, None));
        }

        let result = self.orchestrator.try_recognize(page)?;
        let outcome = PageOutcome::Recognized {
            confidence: result.confidence,
            chars: result.text.chars().count(),
        };
        Ok((outcome, Some(result.text)))
    }
}

/// Open a document as a page source. Image files are only checked here and
/// decoded when their page is rendered.
fn open_document(path: &Path) -> Result<Box<dyn PageRenderer>> {
    let mut magic = [0u8; 5];
    let is_pdf = match File::open(path)?.read_exact(&mut magic) {
        Ok(()) => magic == PDF_MAGIC,
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => false,
        Err(err) => return Err(err.into()),
    };
    if is_pdf {
        return Ok(Box::new(PdfReader::open(path)?));
    }
    let (width, height) = ImageProcessor::read_dimensions(path)?;
    debug!(width, height, "Opening image file as a one-page document");
    Ok(Box::new(ImageSequence::from_paths(vec![path.to_path_buf()])))
}

fn push_block(text: &mut String, page_number: usize, block: &str) {
    if !text.is_empty() {
        text.push_str(&format!("\n\n--- Page {page_number} ---\n\n"));
    }
    text.push_str(block);
}

/// True when the brightness of a sampling grid barely varies.
pub fn is_blank(image: &DynamicImage, grid: u32, max_stddev: f32) -> bool {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return true;
    }
    let grid = grid.max(2);
    let mut samples: Vec<f64> = Vec::with_capacity((grid * grid) as usize);
    for gy in 0..grid {
        let y = (gy as u64 * (height - 1) as u64 / (grid - 1) as u64) as u32;
        for gx in 0..grid {
            let x = (gx as u64 * (width - 1) as u64 / (grid - 1) as u64) as u32;
            let [r, g, b, _] = image.get_pixel(x, y).0;
            samples.push(0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64);
        }
    }

    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    variance.sqrt() < max_stddev as f64
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use image::{GrayImage, Luma, Rgb};
    use lectern_core::LecternConfig;

    use super::*;
    use crate::engine::EngineOutput;
    use crate::engine::mock::MockFactory;
    use crate::orchestrator::fixtures::{codes, config_with_models};

    fn text_page() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(800, 1000, |x, y| {
            if y % 30 < 8 && x % 12 < 6 { Rgb([15, 15, 15]) } else { Rgb([245, 245, 245]) }
        }))
    }

    fn blank_page() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(800, 1000, Luma([250u8])))
    }

    fn document(pages: Vec<DynamicImage>) -> ImageSequence {
        ImageSequence::from_images(pages).expect("encode pages")
    }

    fn extractor(config: &LecternConfig, factory: &MockFactory) -> DocumentPageExtractor {
        let orchestrator = RecognitionOrchestrator::new(config, Arc::new(factory.clone()));
        DocumentPageExtractor::new(Arc::new(orchestrator), config.extraction.clone())
    }

    fn extract_with(
        extractor: &DocumentPageExtractor,
        doc: &mut dyn PageRenderer,
        languages: &[&str],
    ) -> ExtractionResult {
        extractor.extract(doc, &codes(languages), |_| {}, &CancellationToken::new())
    }

    fn extract_file(extractor: &DocumentPageExtractor, path: &Path) -> ExtractionResult {
        extractor.extract_document(path, &codes(&["eng"]), |_| {}, &CancellationToken::new())
    }

    /// Fails to render the listed pages.
    struct FlakyRenderer {
        pages: usize,
        broken: Vec<usize>,
    }

    impl PageRenderer for FlakyRenderer {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn render_page(&mut self, index: usize, _request: &RenderRequest) -> Result<DynamicImage> {
            if self.broken.contains(&index) {
                Err(LecternError::Render(format!("page {index} has no image")))
            } else {
                Ok(text_page())
            }
        }
    }

    #[test]
    fn blank_page_is_skipped_without_aborting() {
        let (_dir, config) = config_with_models(&["eng"]);
        let factory = MockFactory::fixed("Chapter one begins here and goes on for a while", 90);
        let extractor = extractor(&config, &factory);
        let mut doc = document(vec![text_page(), blank_page(), text_page()]);

        let result = extract_with(&extractor, &mut doc, &["eng"]);

        let outcomes: Vec<_> = result.pages.iter().map(|p| p.outcome.clone()).collect();
        assert!(matches!(outcomes[0], PageOutcome::Recognized { confidence: 90, .. }));
        assert_eq!(outcomes[1], PageOutcome::Blank);
        assert!(matches!(outcomes[2], PageOutcome::Recognized { .. }));
        assert_eq!(factory.calls().len(), 2, "blank page never reaches the engine");
        assert_eq!(result.average_confidence, 90);
        assert!(result.text.contains("\n\n--- Page 3 ---\n\n"));
        assert!(!result.text.starts_with("\n\n---"));
        assert!(!result.text.contains("--- Page 2 ---"));
    }

    #[test]
    fn multi_language_document_is_narrowed_after_page_one() {
        let (_dir, config) = config_with_models(&["eng", "ara", "fra"]);
        let arabic = "بسم الله الرحمن الرحيم هذا نص عربي طويل بما فيه الكفاية";
        let factory = MockFactory::fixed(arabic, 85);
        let extractor = extractor(&config, &factory);
        let mut doc = document(vec![text_page(), text_page()]);

        let result = extract_with(&extractor, &mut doc, &["eng", "ara", "fra"]);

        assert_eq!(result.detected_language, "ara");
        assert_eq!(factory.created(), vec!["eng+ara+fra".to_string(), "ara".to_string()]);

        let calls = factory.calls();
        assert_eq!(calls.len(), 3, "one detection pass plus two pages");
        assert_eq!(calls[0].selector, "eng+ara+fra");
        assert!(calls[1..].iter().all(|c| c.selector == "ara"));
        // Detection renders at a third of the bulk density.
        assert!(calls[0].width <= calls[1].width);
    }

    #[test]
    fn lost_engine_after_failed_narrowing_fails_the_document() {
        let (_dir, config) = config_with_models(&["eng", "ara"]);
        let arabic = "نص عربي طويل بما فيه الكفاية للكشف";
        let factory = MockFactory::fixed(arabic, 85).failing_after(1);
        let extractor = extractor(&config, &factory);
        let mut doc = document(vec![text_page(), text_page()]);

        let result = extract_with(&extractor, &mut doc, &["eng", "ara"]);

        assert!(result.error.is_some());
        assert!(result.pages.is_empty());
        assert_eq!(result.page_count, 2);
        assert!(!result.text.contains("could not be processed"));
        assert_eq!(factory.calls().len(), 1, "only the detection pass ran");
    }

    #[test]
    fn single_language_skips_detection() {
        let (_dir, config) = config_with_models(&["eng"]);
        let factory = MockFactory::fixed("Plain English text long enough to pass the gates", 80);
        let extractor = extractor(&config, &factory);
        let mut doc = document(vec![text_page()]);

        let result = extract_with(&extractor, &mut doc, &["eng"]);
        assert_eq!(result.detected_language, "eng");
        assert_eq!(factory.calls().len(), 1);
    }

    #[test]
    fn failed_page_is_marked_and_extraction_continues() {
        let (_dir, config) = config_with_models(&["eng"]);
        let factory = MockFactory::fixed("Readable page text that is plenty long", 70);
        let extractor = extractor(&config, &factory);
        let mut doc = FlakyRenderer {
            pages: 3,
            broken: vec![1],
        };

        let result = extract_with(&extractor, &mut doc, &["eng"]);

        assert_eq!(result.pages.len(), 3);
        assert!(matches!(result.pages[1].outcome, PageOutcome::Errored(_)));
        assert!(result.text.contains("[Page 2: could not be processed]"));
        assert!(matches!(result.pages[2].outcome, PageOutcome::Recognized { .. }));
        assert_eq!(result.average_confidence, 70);
        assert!(result.error.is_none());
    }

    #[test]
    fn progress_is_reported_per_page() {
        let (_dir, config) = config_with_models(&["eng"]);
        let factory = MockFactory::fixed("Some text on every page of this document", 75);
        let extractor = extractor(&config, &factory);
        let mut doc = document(vec![text_page(), blank_page(), text_page()]);

        let mut seen = Vec::new();
        extractor.extract(&mut doc, &codes(&["eng"]), |p| seen.push(p), &CancellationToken::new());
        assert_eq!(
            seen,
            vec![
                Progress { done: 1, total: 3 },
                Progress { done: 2, total: 3 },
                Progress { done: 3, total: 3 },
            ]
        );
    }

    #[test]
    fn cancellation_stops_between_pages() {
        let (_dir, config) = config_with_models(&["eng"]);
        let factory = MockFactory::fixed("First page text that is long enough here", 75);
        let extractor = extractor(&config, &factory);
        let mut doc = document(vec![text_page(), text_page(), text_page()]);
        let cancel = CancellationToken::new();
        let pages_done = Cell::new(0);

        let result = extractor.extract(
            &mut doc,
            &codes(&["eng"]),
            |p| {
                pages_done.set(p.done);
                cancel.cancel();
            },
            &cancel,
        );

        assert!(result.cancelled);
        assert_eq!(result.pages.len(), 1);
        assert_eq!(pages_done.get(), 1);
        assert_eq!(result.page_count, 3);
    }

    #[test]
    fn thumbnail_comes_from_first_page() {
        let (_dir, config) = config_with_models(&["eng"]);
        let factory = MockFactory::fixed("Thumbnail page text that is long enough", 75);
        let extractor = extractor(&config, &factory);
        let mut doc = document(vec![text_page()]);

        let result = extract_with(&extractor, &mut doc, &["eng"]);
        let thumb = result.thumbnail.expect("thumbnail");
        assert_eq!(thumb.width().max(thumb.height()), 256);
    }

    #[test]
    fn low_confidence_pages_still_count_as_recognized() {
        let (_dir, config) = config_with_models(&["eng"]);
        let factory = MockFactory::scripted(|_| EngineOutput {
            text: "~".into(),
            confidence: 5,
        });
        let extractor = extractor(&config, &factory);
        let mut doc = document(vec![text_page()]);

        let result = extract_with(&extractor, &mut doc, &["eng"]);
        assert!(matches!(
            result.pages[0].outcome,
            PageOutcome::Recognized { confidence: 5, chars: 0 }
        ));
        assert!(result.text.is_empty());
    }

    #[test]
    fn unopenable_document_reports_a_readable_error() {
        let (dir, config) = config_with_models(&["eng"]);
        let factory = MockFactory::fixed("unused", 90);
        let extractor = extractor(&config, &factory);

        let missing = dir.path().join("missing.pdf");
        let result = extract_file(&extractor, &missing);
        assert!(result.error.is_some());
        assert!(!result.text.is_empty());
        assert_eq!(result.page_count, 0);

        let garbage = dir.path().join("garbage.png");
        std::fs::write(&garbage, b"definitely not a png").expect("write");
        let result = extract_file(&extractor, &garbage);
        assert!(result.error.is_some());
        assert!(factory.calls().is_empty());
    }

    #[test]
    fn image_file_is_a_one_page_document() {
        let (dir, config) = config_with_models(&["eng"]);
        let factory = MockFactory::fixed("Photographed page with plenty of words", 88);
        let extractor = extractor(&config, &factory);

        let path = dir.path().join("page.png");
        text_page().save(&path).expect("save png");
        let result = extract_file(&extractor, &path);
        assert_eq!(result.page_count, 1);
        assert_eq!(result.text, "Photographed page with plenty of words");
    }

    #[test]
    fn short_file_is_not_mistaken_for_a_pdf() {
        let (dir, config) = config_with_models(&["eng"]);
        let factory = MockFactory::fixed("unused", 90);
        let extractor = extractor(&config, &factory);

        let stub = dir.path().join("stub");
        std::fs::write(&stub, b"%PD").expect("write");
        let result = extract_file(&extractor, &stub);
        let error = result.error.expect("error");
        assert!(error.starts_with("could not decode image"), "{error}");
        assert!(factory.calls().is_empty());
    }

    #[test]
    fn blank_detection_uses_brightness_spread() {
        assert!(is_blank(&blank_page(), 64, 6.0));
        assert!(!is_blank(&text_page(), 64, 6.0));
    }
}
