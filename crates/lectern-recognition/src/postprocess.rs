// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text clean-up applied to every recognition result.

use crate::script::is_arabic_char;

/// Symbols that are almost always recognition noise. Also passed to the
/// engine as its character blacklist.
pub const GARBAGE_CHARS: &str = "|~^`¦¬§•¤{}[]\\<>";

/// Right-to-left mark prefixed to Arabic-script lines.
const RLM: char = '\u{200F}';

/// Clean raw engine output.
///
/// Strips garbage symbols, collapses horizontal whitespace, drops empty lines
/// and lines with no letters or digits, and marks Arabic lines right-to-left.
pub fn clean_text(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in raw.lines() {
        let stripped: String = line.chars().filter(|c| !GARBAGE_CHARS.contains(*c)).collect();
        let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

        if !collapsed.chars().any(char::is_alphanumeric) {
            continue;
        }
        if collapsed.chars().any(is_arabic_char) {
            lines.push(format!("{RLM}{collapsed}"));
        } else {
            lines.push(collapsed);
        }
    }

    lines.join("\n")
}
