// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the preprocessing pipeline in the lectern-document
// crate. Compares the cheap HIGH-quality path against the LOW-quality path,
// which adds Otsu binarization and a median filter.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, Luma};

use lectern_core::ImageQuality;
use lectern_document::PreprocessingPipeline;

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// A 1000x1400 synthetic page: light background with dark text-like bars.
fn synthetic_page() -> DynamicImage {
    let img = GrayImage::from_fn(1000, 1400, |x, y| {
        if y % 40 < 12 && x % 17 < 11 {
            Luma([35u8])
        } else {
            Luma([215u8])
        }
    });
    DynamicImage::ImageLuma8(img)
}

fn bench_pipeline(c: &mut Criterion) {
    let page = synthetic_page();
    let pipeline = PreprocessingPipeline::default();

    c.bench_function("preprocess high quality (1000x1400)", |b| {
        b.iter(|| {
            let out = pipeline.process(black_box(page.clone()), Some(ImageQuality::High));
            black_box(out.image);
        });
    });

    c.bench_function("preprocess low quality (1000x1400)", |b| {
        b.iter(|| {
            let out = pipeline.process(black_box(page.clone()), Some(ImageQuality::Low));
            black_box(out.image);
        });
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
