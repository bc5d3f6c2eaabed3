// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Async service layer — runs the blocking recognition work on tokio's
// blocking pool so async callers (the CLI, an embedding UI) never stall.

use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;
use lectern_core::{LecternConfig, LecternError, OcrResult, Progress};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::engine::EngineFactory;
use crate::extractor::{DocumentPageExtractor, ExtractionResult};
use crate::orchestrator::RecognitionOrchestrator;

/// Cheaply cloneable handle over one orchestrator and its extractor.
#[derive(Clone)]
pub struct OcrService {
    orchestrator: Arc<RecognitionOrchestrator>,
    extractor: Arc<DocumentPageExtractor>,
}

impl OcrService {
    pub fn new(config: &LecternConfig, factory: Arc<dyn EngineFactory>) -> Self {
        let orchestrator = Arc::new(RecognitionOrchestrator::new(config, factory));
        let extractor = Arc::new(DocumentPageExtractor::new(
            Arc::clone(&orchestrator),
            config.extraction.clone(),
        ));
        Self {
            orchestrator,
            extractor,
        }
    }

    pub fn orchestrator(&self) -> &Arc<RecognitionOrchestrator> {
        &self.orchestrator
    }

    // -- Engine lifecycle -----------------------------------------------------

    pub async fn initialize(&self, languages: Vec<String>) -> bool {
        let orchestrator = Arc::clone(&self.orchestrator);
        run_blocking("initialize", move || orchestrator.initialize(&languages), || false).await
    }

    pub async fn reinitialize(&self, languages: Vec<String>) -> bool {
        let orchestrator = Arc::clone(&self.orchestrator);
        run_blocking("reinitialize", move || orchestrator.reinitialize(&languages), || false).await
    }

    pub async fn release(&self) {
        let orchestrator = Arc::clone(&self.orchestrator);
        run_blocking("release", move || orchestrator.release(), || ()).await
    }

    // -- Recognition ----------------------------------------------------------

    pub async fn recognize(&self, image: DynamicImage) -> Option<OcrResult> {
        let orchestrator = Arc::clone(&self.orchestrator);
        run_blocking("recognize", move || orchestrator.recognize(image), || None).await
    }

    pub async fn recognize_bytes(&self, bytes: Vec<u8>) -> Option<OcrResult> {
        let orchestrator = Arc::clone(&self.orchestrator);
        run_blocking("recognize_bytes", move || orchestrator.recognize_bytes(&bytes), || None).await
    }

    /// Extract a whole document. `on_progress` is called from the worker
    /// thread after every page.
    pub async fn extract_document(
        &self,
        path: PathBuf,
        languages: Vec<String>,
        on_progress: impl FnMut(Progress) + Send + 'static,
        cancel: CancellationToken,
    ) -> ExtractionResult {
        let extractor = Arc::clone(&self.extractor);
        run_blocking(
            "extract_document",
            move || extractor.extract_document(&path, &languages, on_progress, &cancel),
            || {
                let err = LecternError::Recognition("background task failed".into());
                ExtractionResult::failed(&err)
            },
        )
        .await
    }
}

/// Run `job` on the blocking pool; a panicked or aborted task is logged and
/// replaced by `fallback`.
async fn run_blocking<T, F>(task: &'static str, job: F, fallback: impl FnOnce() -> T) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(value) => value,
        Err(err) => {
            error!(task, error = %err, "Background task failed");
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use image::{Rgb, RgbImage};

    use super::*;
    use crate::engine::mock::MockFactory;
    use crate::orchestrator::fixtures::{codes, config_with_models};

    fn page() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(640, 800, |x, y| {
            if y % 24 < 6 && x % 10 < 5 { Rgb([10, 10, 10]) } else { Rgb([240, 240, 240]) }
        }))
    }

    #[tokio::test]
    async fn recognize_runs_off_the_async_thread() {
        let (_dir, config) = config_with_models(&["eng"]);
        let factory = MockFactory::fixed("Service level text", 93);
        let service = OcrService::new(&config, Arc::new(factory));

        assert!(service.recognize(page()).await.is_none());
        assert!(service.initialize(codes(&["eng"])).await);

        let result = service.recognize(page()).await.expect("result");
        assert_eq!(result.text, "Service level text");
        assert_eq!(result.confidence, 93);

        service.release().await;
        assert!(!service.orchestrator().is_ready());
    }

    #[tokio::test]
    async fn undecodable_bytes_are_none() {
        let (_dir, config) = config_with_models(&["eng"]);
        let service = OcrService::new(&config, Arc::new(MockFactory::fixed("text", 90)));
        assert!(service.initialize(codes(&["eng"])).await);
        assert!(service.recognize_bytes(vec![0, 1, 2, 3]).await.is_none());
    }

    #[tokio::test]
    async fn extract_document_reports_progress() {
        let (dir, config) = config_with_models(&["eng"]);
        let factory = MockFactory::fixed("A page worth reading", 81);
        let service = OcrService::new(&config, Arc::new(factory));
        let path = dir.path().join("scan.png");
        page().save(&path).expect("save");

        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&progress);
        let result = service
            .extract_document(
                path,
                codes(&["eng"]),
                move |p| sink.lock().unwrap().push(p),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(result.text, "A page worth reading");
        assert_eq!(result.average_confidence, 81);
        assert_eq!(*progress.lock().unwrap(), vec![Progress { done: 1, total: 1 }]);
    }
}
