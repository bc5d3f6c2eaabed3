// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Script detection — coarse writing-system classification by Unicode block,
// used to narrow a multi-language engine down to a single model.

use lectern_core::Script;
use tracing::debug;

/// Language used when nothing better can be chosen.
pub const DEFAULT_LANGUAGE: &str = "eng";

const ARABIC_LANGUAGES: &[&str] = &["ara", "fas", "urd"];
const LATIN_LANGUAGES: &[&str] = &[
    "eng", "fra", "deu", "spa", "ita", "por", "nld", "tur", "pol", "vie",
];
const CYRILLIC_LANGUAGES: &[&str] = &["rus", "ukr", "bul", "srp"];
const CJK_LANGUAGES: &[&str] = &["chi_sim", "chi_tra", "jpn", "kor"];

/// Language codes written in `script`.
pub fn languages_for(script: Script) -> &'static [&'static str] {
    match script {
        Script::Arabic => ARABIC_LANGUAGES,
        Script::Latin => LATIN_LANGUAGES,
        Script::Cyrillic => CYRILLIC_LANGUAGES,
        Script::Cjk => CJK_LANGUAGES,
        Script::Unknown => &[],
    }
}

/// True when `code` belongs to the Arabic-script set.
pub fn is_arabic_language(code: &str) -> bool {
    ARABIC_LANGUAGES.contains(&code)
}

/// True for letters of the Arabic blocks, supplements and presentation forms.
pub fn is_arabic_char(c: char) -> bool {
    matches!(
        c as u32,
        0x0600..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF
    )
}

fn script_of(c: char) -> Option<Script> {
    if is_arabic_char(c) {
        return Some(Script::Arabic);
    }
    match c as u32 {
        0x0041..=0x005A | 0x0061..=0x007A | 0x00C0..=0x024F | 0x1E00..=0x1EFF => {
            Some(Script::Latin)
        }
        0x0400..=0x052F => Some(Script::Cyrillic),
        0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xAC00..=0xD7AF | 0xF900..=0xFAFF => {
            Some(Script::Cjk)
        }
        _ => None,
    }
}

/// Dominant script of `text`.
///
/// Ties go to the earlier of Arabic, Latin, Cyrillic, CJK; text with no
/// letters from any bucket is [`Script::Unknown`].
pub fn detect_script(text: &str) -> Script {
    let mut counts = [0usize; 4];
    for script in text.chars().filter_map(script_of) {
        let slot = match script {
            Script::Arabic => 0,
            Script::Latin => 1,
            Script::Cyrillic => 2,
            Script::Cjk => 3,
            Script::Unknown => continue,
        };
        counts[slot] += 1;
    }

    let order = [Script::Arabic, Script::Latin, Script::Cyrillic, Script::Cjk];
    let mut best = Script::Unknown;
    let mut best_count = 0;
    for (script, &count) in order.iter().zip(counts.iter()) {
        if count > best_count {
            best = *script;
            best_count = count;
        }
    }

    debug!(
        arabic = counts[0],
        latin = counts[1],
        cyrillic = counts[2],
        cjk = counts[3],
        %best,
        "Script detected"
    );
    best
}

/// Pick the single enabled language best suited to `script`.
pub fn select_best_language(script: Script, enabled: &[String]) -> String {
    if enabled.is_empty() {
        return DEFAULT_LANGUAGE.to_string();
    }

    let latin_like = matches!(script, Script::Latin | Script::Unknown);
    if latin_like && enabled.iter().any(|c| c == DEFAULT_LANGUAGE) {
        return DEFAULT_LANGUAGE.to_string();
    }

    let candidates = languages_for(script);
    enabled
        .iter()
        .find(|code| candidates.contains(&code.as_str()))
        .unwrap_or(&enabled[0])
        .clone()
}
