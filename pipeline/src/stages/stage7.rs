//! Stage 7 — Scene Prompts (spec.md §4.5.7)
//!
//! Director-plan entries are chunked into `stage7_batch_size` batches,
//! fanned out through the Batch Executor. Each batch's raw output goes
//! through the Scene Synthesizer (C7), which applies the fallback path
//! for any entry the batch didn't cover and reconciles reference
//! tokens. Only entries not already present in the `scenes` sheet are
//! processed — this is the stage's resume point.

use crate::fallback::duplicate_rate;
use crate::llm_json::parse_json;
use crate::synth::{synthesize, PromptOutput};
use scenepipe_batch::run_batch;
use scenepipe_core::{
    DirectorPlanEntry, DuplicateDetectionConfig, PipelineError, Scene, Segment, SrtDocument,
    VideoMode,
};
use scenepipe_llm::LlmClient;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct RawPrompt {
    scene_id: String,
    #[serde(default)]
    img_prompt: String,
    #[serde(default)]
    video_prompt: String,
}

#[derive(Debug, Deserialize)]
struct ScenePromptsOutput {
    #[serde(default)]
    prompts: Vec<RawPrompt>,
}

async fn call_for_batch(
    client: &LlmClient,
    batch: &[DirectorPlanEntry],
) -> Result<Vec<RawPrompt>, PipelineError> {
    let scenes: Vec<String> = batch
        .iter()
        .map(|e| format!("{}: {}", e.scene_id, e.visual_moment))
        .collect();
    let prompt = format!(
        "For each of the following scenes, write an image generation prompt and a video \
         generation prompt. Reference any known character with `(id.png)` and any known \
         location with `(id.png)` inline in the image prompt. Respond with a single JSON \
         object: {{\"prompts\": [{{\"scene_id\": str, \"img_prompt\": str, \"video_prompt\": \
         str}}]}}, one entry per scene_id listed.\nScenes:\n{}",
        scenes.join("\n")
    );

    let response = client.complete(&prompt).await.ok_or_else(|| {
        PipelineError::UnrecoverableApi("no output for scene-prompts batch".to_string())
    })?;
    let parsed: ScenePromptsOutput = parse_json(&response)?;
    Ok(parsed.prompts)
}

fn segment_name_for(segments: &[Segment], segment_id: u32) -> String {
    segments
        .iter()
        .find(|s| s.segment_id == segment_id)
        .map(|s| s.name.clone())
        .unwrap_or_default()
}

pub async fn run(
    client: Arc<LlmClient>,
    entries: &[DirectorPlanEntry],
    segments: &[Segment],
    srt: &SrtDocument,
    existing_scene_ids: &HashSet<String>,
    batch_size: usize,
    max_parallel: usize,
    duplicate_config: &DuplicateDetectionConfig,
    video_mode: VideoMode,
) -> Result<Vec<Scene>, PipelineError> {
    let pending: Vec<DirectorPlanEntry> = entries
        .iter()
        .filter(|e| !existing_scene_ids.contains(&e.scene_id))
        .cloned()
        .collect();

    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let batches: Vec<Vec<DirectorPlanEntry>> = pending
        .chunks(batch_size.max(1))
        .map(|c| c.to_vec())
        .collect();

    let outcome = run_batch(batches, max_parallel, move |batch, _index| {
        let client = Arc::clone(&client);
        async move {
            let raw = call_for_batch(&client, &batch).await.unwrap_or_else(|err| {
                warn!(%err, "scene-prompts batch failed, falling back for its entries");
                Vec::new()
            });
            Ok::<_, PipelineError>((batch, raw))
        }
    })
    .await;

    let mut scenes = Vec::new();
    for batch_result in outcome.results.into_iter().flatten() {
        let (batch, raw_prompts) = batch_result;
        let by_scene_id: HashMap<String, RawPrompt> = raw_prompts
            .into_iter()
            .map(|p| (p.scene_id.clone(), p))
            .collect();

        let img_prompts: Vec<String> = batch
            .iter()
            .map(|e| {
                by_scene_id
                    .get(&e.scene_id)
                    .map(|p| p.img_prompt.clone())
                    .unwrap_or_default()
            })
            .collect();
        let rate = duplicate_rate(&img_prompts);

        for entry in &batch {
            let output = by_scene_id
                .get(&entry.scene_id)
                .map(|p| PromptOutput {
                    img_prompt: p.img_prompt.clone(),
                    video_prompt: p.video_prompt.clone(),
                })
                .unwrap_or_default();

            let srt_text = srt.text_range(entry.srt_start_index, entry.srt_end_index);
            let srt_start_ms = srt.entry(entry.srt_start_index).map(|e| e.start_ms).unwrap_or(0);
            let srt_end_ms = srt.entry(entry.srt_end_index).map(|e| e.end_ms).unwrap_or(srt_start_ms);
            let segment_name = segment_name_for(segments, entry.segment_id);

            scenes.push(synthesize(
                entry,
                &output,
                rate,
                duplicate_config,
                &segment_name,
                &srt_text,
                srt_start_ms,
                srt_end_ms,
                video_mode,
            ));
        }
    }

    Ok(scenes)
}
