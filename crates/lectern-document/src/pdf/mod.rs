// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — opening scanned PDFs and rendering their pages to rasters.

pub mod reader;

pub use reader::PdfReader;
