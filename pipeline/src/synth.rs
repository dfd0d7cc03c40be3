//! Scene Synthesizer (C7)
//!
//! Combines a director-plan entry, the LLM's per-scene prompt output,
//! and the batch's duplicate-rate signal into a final `Scene` row,
//! per spec.md §4.7. Every field the entity defines is set explicitly;
//! omitting a known field here would be a defect, not an oversight.

use crate::fallback;
use crate::reference::resolve;
use scenepipe_core::{DirectorPlanEntry, DuplicateDetectionConfig, DuplicateMode, Scene, VideoMode};

/// Raw LLM output for one director-plan entry before synthesis.
#[derive(Debug, Clone, Default)]
pub struct PromptOutput {
    pub img_prompt: String,
    pub video_prompt: String,
}

/// `video_note` per spec.md §4.7 item 4: `basic` skips every segment
/// after the first; `full` never skips.
pub fn video_note_for(mode: VideoMode, segment_id: u32) -> String {
    match mode {
        VideoMode::Basic if segment_id > 1 => "SKIP".to_string(),
        _ => String::new(),
    }
}

/// Exact/normalized match against `duplicate_detection.threshold`
/// (spec.md §9 open question, resolved in SPEC_FULL.md §10).
fn is_duplicate_worthy(rate: f64, config: &DuplicateDetectionConfig) -> bool {
    match config.mode {
        DuplicateMode::Exact | DuplicateMode::Normalized => rate > config.threshold,
    }
}

pub fn synthesize(
    entry: &DirectorPlanEntry,
    output: &PromptOutput,
    batch_duplicate_rate: f64,
    duplicate_config: &DuplicateDetectionConfig,
    segment_name: &str,
    srt_text: &str,
    srt_start_ms: u64,
    srt_end_ms: u64,
    video_mode: VideoMode,
) -> Scene {
    let needs_fallback =
        output.img_prompt.is_empty() || is_duplicate_worthy(batch_duplicate_rate, duplicate_config);

    let img_prompt = if needs_fallback {
        fallback::generate(&entry.scene_id, segment_name, srt_text)
    } else {
        output.img_prompt.clone()
    };

    let resolved = resolve(&img_prompt, &entry.characters_used, &entry.location_used);

    Scene {
        scene_id: entry.scene_id.clone(),
        srt_start_ms,
        srt_end_ms,
        planned_duration_ms: entry.planned_duration_ms,
        srt_text: srt_text.to_string(),
        img_prompt,
        video_prompt: output.video_prompt.clone(),
        characters_used: resolved.characters_used,
        location_used: resolved.location_used,
        reference_files: resolved.reference_files,
        status_img: "pending".to_string(),
        status_vid: "pending".to_string(),
        video_note: video_note_for(video_mode, entry.segment_id),
        segment_id: entry.segment_id,
    }
}
