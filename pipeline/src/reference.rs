//! Reference Resolver (C8)
//!
//! Extracts character/location reference tokens from prompt text and
//! reconciles them against director-plan defaults, per spec.md §4.7
//! item 3.

use regex::Regex;
use std::sync::OnceLock;

fn character_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(([nN][vV]_?\d+)\.png\)").expect("static pattern"))
}

fn location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(([lL][oO][cC]_?\d+)\.png\)").expect("static pattern"))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedReferences {
    pub characters_used: Vec<String>,
    pub location_used: String,
    pub reference_files: Vec<String>,
}

/// `canonical("Nv_01")` -> `"nv01"`; strips underscores and lowercases
/// so `(NV_1.png)` and `(nv1.png)` resolve to the same id.
fn canonical(raw: &str) -> String {
    raw.to_lowercase().replace('_', "")
}

pub fn resolve(
    prompt: &str,
    fallback_characters: &[String],
    fallback_location: &str,
) -> ResolvedReferences {
    let mut characters: Vec<String> = Vec::new();
    for cap in character_pattern().captures_iter(prompt) {
        let id = canonical(&cap[1]);
        if !characters.contains(&id) {
            characters.push(id);
        }
    }
    if characters.is_empty() {
        characters = fallback_characters.to_vec();
    }

    let location = location_pattern()
        .captures_iter(prompt)
        .next()
        .map(|cap| canonical(&cap[1]))
        .unwrap_or_else(|| fallback_location.to_string());

    let mut reference_files: Vec<String> = characters.iter().map(|c| format!("{c}.png")).collect();
    if !location.is_empty() {
        reference_files.push(format!("{location}.png"));
    }

    ResolvedReferences {
        characters_used: characters,
        location_used: location,
        reference_files,
    }
}
