//! Fallback Generator (C9)
//!
//! Deterministic, unique, non-empty prompt text for when the LLM
//! produces nothing usable, per spec.md §4.7 item 2.

const SRT_EXCERPT_LEN: usize = 120;

/// Template: parameterized by `scene_id`, `segment_name`, and the first
/// `SRT_EXCERPT_LEN` characters of the concatenated SRT text. Distinct
/// `scene_id`s always yield distinct output, so a batch of fallbacks
/// never collides with itself.
pub fn generate(scene_id: &str, segment_name: &str, srt_text: &str) -> String {
    let excerpt: String = srt_text.chars().take(SRT_EXCERPT_LEN).collect();
    format!("[{scene_id}] {segment_name}: {excerpt}")
}

/// Exact-string duplicate rate among `prompts`, ignoring empty strings
/// (those are always replaced regardless of the rate). Used by the
/// Scene Synthesizer's batch-wide duplicate check (spec.md §4.7 item 2).
pub fn duplicate_rate(prompts: &[String]) -> f64 {
    let non_empty: Vec<&String> = prompts.iter().filter(|p| !p.is_empty()).collect();
    if non_empty.len() < 2 {
        return 0.0;
    }

    let mut counts = std::collections::HashMap::new();
    for p in &non_empty {
        *counts.entry(p.as_str()).or_insert(0usize) += 1;
    }
    let duplicates: usize = counts.values().filter(|&&c| c > 1).map(|&c| c).sum();
    duplicates as f64 / non_empty.len() as f64
}
