// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages and recovery classification.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Consumer-facing entry points never surface a raw error; they hand these
// messages to the UI instead.

use crate::error::LecternError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something went wrong internally but trying again may help.
    Transient,
    /// User must do something (pick another file, narrow the languages).
    ActionRequired,
    /// This input cannot be processed, whatever the user does.
    Permanent,
}

/// How the system should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Repair automatically (e.g. re-materialize a language model) and carry on.
    Recoverable,
    /// Hand back to the caller, who may retry with different inputs.
    Caller,
    /// Give up on this input.
    Fatal,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether retrying the same request can succeed.
    pub retriable: bool,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

impl HumanError {
    /// Message and suggestion on one line, for places that only carry text.
    pub fn to_text(&self) -> String {
        format!("{} {}", self.message, self.suggestion)
    }
}

/// Classify a `LecternError` for recovery decisions.
pub fn error_class(err: &LecternError) -> ErrorClass {
    match err {
        LecternError::AssetMissing(_) | LecternError::AssetCorrupt { .. } => {
            ErrorClass::Recoverable
        }

        LecternError::EngineInit(_)
        | LecternError::NotInitialized
        | LecternError::Recognition(_)
        | LecternError::Cancelled => ErrorClass::Caller,

        LecternError::Decode(_)
        | LecternError::ImageError(_)
        | LecternError::PdfError(_)
        | LecternError::PageOutOfRange { .. }
        | LecternError::Render(_)
        | LecternError::Serialization(_) => ErrorClass::Fatal,

        LecternError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ErrorClass::Caller
            }
            _ => ErrorClass::Fatal,
        },
    }
}

/// Convert a `LecternError` into a `HumanError` anyone can understand.
pub fn humanize_error(err: &LecternError) -> HumanError {
    match err {
        // -- Language assets --
        LecternError::AssetMissing(code) => HumanError {
            message: "A language pack is missing.".into(),
            suggestion: format!(
                "Reinstall the app or turn off the language that isn't available. (Language: {code})"
            ),
            retriable: true,
            severity: Severity::Transient,
        },

        LecternError::AssetCorrupt { code, .. } => HumanError {
            message: "A language pack is damaged.".into(),
            suggestion: format!("We'll try to restore it automatically. Please try again. (Language: {code})"),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Recognition engine --
        LecternError::EngineInit(_) => HumanError {
            message: "Text recognition couldn't start.".into(),
            suggestion: "Try again with fewer languages selected.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        LecternError::Recognition(_) => HumanError {
            message: "Text recognition didn't work on this page.".into(),
            suggestion: "Try taking the photo again with better lighting, making sure the text is clear and in focus.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        LecternError::NotInitialized => HumanError {
            message: "Text recognition isn't ready yet.".into(),
            suggestion: "Choose at least one language, then try again.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        // -- Input --
        LecternError::Decode(_) | LecternError::ImageError(_) => HumanError {
            message: "There's a problem with this image.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try saving it as a JPEG or PNG first.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        LecternError::PdfError(_) => HumanError {
            message: "This document couldn't be opened.".into(),
            suggestion: "The file may be damaged or password protected. Try opening it on a computer first to check it works.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        LecternError::PageOutOfRange { count, .. } => HumanError {
            message: "That page doesn't exist.".into(),
            suggestion: format!("This document only has {count} page(s)."),
            retriable: false,
            severity: Severity::Permanent,
        },

        LecternError::Render(_) => HumanError {
            message: "A page of this document couldn't be read.".into(),
            suggestion: "Only scanned pages with a picture of the text can be read. The other pages were still processed.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        LecternError::Cancelled => HumanError {
            message: "Reading was stopped.".into(),
            suggestion: "Any text found before stopping has been kept.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        // -- Storage --
        LecternError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "The app doesn't have permission to read that file.".into(),
                    suggestion: "Check the file permissions, or try copying the file to a different location first.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your device's storage may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        LecternError::Serialization(_) => HumanError {
            message: "The settings file couldn't be read.".into(),
            suggestion: "Default settings will be used. You can fix or delete the settings file.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}
