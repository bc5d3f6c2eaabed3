// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lectern — offline text extraction from photographed pages and scanned
// documents.
//
// Entry point. Initialises logging, loads configuration, builds the OCR
// service and runs one command.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use lectern_core::config::default_data_dir;
use lectern_core::human_errors::humanize_error;
use lectern_core::{LecternConfig, PageOutcome};
use lectern_document::{ImageProcessor, ImageQualityAnalyzer};
use lectern_recognition::{EngineFactory, OcrService};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Lectern — offline OCR for photos and scanned documents
#[derive(Parser, Debug)]
#[command(name = "lectern", version)]
#[command(about = "Extract text from photographed pages and scanned PDFs, offline")]
struct Args {
    /// Configuration file (JSON). Defaults to `<data dir>/config.json`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Languages to recognise, joined with `+` (e.g. `eng+ara`).
    #[arg(long, global = true)]
    lang: Option<String>,

    /// Directory holding the `ocrs` detection and recognition models. Unused
    /// by the Tesseract engine, which reads `<data dir>/tessdata`.
    #[arg(long, global = true)]
    models: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recognise a single image.
    Image { path: PathBuf },
    /// Extract every page of a scanned PDF (or an image) with progress.
    Document { path: PathBuf },
    /// Report the quality tier and metrics of an image.
    Quality { path: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| default_data_dir().join("config.json"));
    let config = LecternConfig::load_or_default(&config_path);

    let languages = parse_languages(args.lang.as_deref(), &config.assets.default_language);

    match args.command {
        Command::Quality { path } => quality(&config, path),
        Command::Image { path } => {
            let Some(service) = start_service(&config, args.models, &languages).await else {
                return ExitCode::FAILURE;
            };
            image(&service, path).await
        }
        Command::Document { path } => {
            let Some(service) = start_service(&config, args.models, &languages).await else {
                return ExitCode::FAILURE;
            };
            document(&service, path, languages).await
        }
    }
}

fn parse_languages(lang: Option<&str>, default: &str) -> Vec<String> {
    let codes: Vec<String> = lang
        .unwrap_or(default)
        .split('+')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect();
    if codes.is_empty() {
        vec![default.to_string()]
    } else {
        codes
    }
}

#[cfg(feature = "tesseract")]
fn engine_factory(_models: Option<PathBuf>) -> Option<Arc<dyn EngineFactory>> {
    Some(Arc::new(lectern_recognition::TesseractEngineFactory))
}

#[cfg(all(feature = "ocr", not(feature = "tesseract")))]
fn engine_factory(models: Option<PathBuf>) -> Option<Arc<dyn EngineFactory>> {
    use lectern_recognition::{OcrsEngineFactory, OcrsModels};

    let models = models.map(OcrsModels::from_dir).unwrap_or_default();
    Some(Arc::new(OcrsEngineFactory::new(models)))
}

#[cfg(not(any(feature = "ocr", feature = "tesseract")))]
fn engine_factory(_models: Option<PathBuf>) -> Option<Arc<dyn EngineFactory>> {
    eprintln!(
        "This build has no recognition engine. Rebuild with `--features tesseract` or `--features ocr`."
    );
    None
}

async fn start_service(
    config: &LecternConfig,
    models: Option<PathBuf>,
    languages: &[String],
) -> Option<OcrService> {
    let factory = engine_factory(models)?;
    let service = OcrService::new(config, factory);
    if !service.initialize(languages.to_vec()).await {
        eprintln!(
            "Text recognition couldn't start for {}. Check that the language packs and models are installed.",
            languages.join("+")
        );
        return None;
    }
    Some(service)
}

fn quality(config: &LecternConfig, path: PathBuf) -> ExitCode {
    match ImageProcessor::open(&path) {
        Ok(processor) => {
            let analyzer = ImageQualityAnalyzer::new(config.preprocess.sample_window);
            let report = analyzer.analyze(processor.as_dynamic());
            println!("quality:      {}", report.quality);
            println!("contrast:     {:.3}", report.contrast);
            println!("noise:        {:.3}", report.noise);
            println!("edge density: {:.3}", report.edge_density);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", humanize_error(&err).to_text());
            ExitCode::FAILURE
        }
    }
}

async fn image(service: &OcrService, path: PathBuf) -> ExitCode {
    let processor = match ImageProcessor::open(&path) {
        Ok(processor) => processor,
        Err(err) => {
            eprintln!("{}", humanize_error(&err).to_text());
            return ExitCode::FAILURE;
        }
    };

    let outcome = service.recognize(processor.into_dynamic()).await;
    service.release().await;
    match outcome {
        Some(result) if result.is_empty() => {
            eprintln!("No readable text found (confidence {}%).", result.confidence);
            ExitCode::SUCCESS
        }
        Some(result) => {
            println!("{}", result.text);
            eprintln!(
                "confidence {}% | {} | {} ms",
                result.confidence,
                result.languages.join("+"),
                result.processing_time_ms
            );
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("Text recognition didn't work on this image.");
            ExitCode::FAILURE
        }
    }
}

async fn document(service: &OcrService, path: PathBuf, languages: Vec<String>) -> ExitCode {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current page");
            on_interrupt.cancel();
        }
    });

    let result = service
        .extract_document(
            path,
            languages,
            |progress| eprintln!("page {}/{}", progress.done, progress.total),
            cancel,
        )
        .await;
    service.release().await;

    if let Some(error) = &result.error {
        info!(%error, "Document failed");
        eprintln!("{}", result.text);
        return ExitCode::FAILURE;
    }

    println!("{}", result.text);
    eprintln!();
    for page in &result.pages {
        let summary = match &page.outcome {
            PageOutcome::Recognized { confidence, chars } => {
                format!("{chars} chars, confidence {confidence}%")
            }
            PageOutcome::Blank => "blank".to_string(),
            PageOutcome::Errored(reason) => format!("failed: {reason}"),
        };
        eprintln!("page {:>3}: {summary}", page.index + 1);
    }
    eprintln!(
        "{} pages | language {} | average confidence {}%{}",
        result.page_count,
        result.detected_language,
        result.average_confidence,
        if result.cancelled { " | cancelled" } else { "" }
    );
    ExitCode::SUCCESS
}
