//! Stage 6 — Scene Planning (spec.md §4.5.6)
//!
//! Director-plan entries are chunked into `stage6_batch_size` batches,
//! fanned out through the Batch Executor. A batch that fails still
//! leaves every entry in it with a planning row — its fields just
//! default to empty (spec.md §4.9), so completeness ("every
//! director-plan scene_id has a planning row") always holds.

use crate::llm_json::parse_json;
use scenepipe_batch::run_batch;
use scenepipe_core::{DirectorPlanEntry, PipelineError, ScenePlan};
use scenepipe_llm::LlmClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct RawPlan {
    scene_id: String,
    #[serde(default)]
    camera: String,
    #[serde(default)]
    lighting: String,
    #[serde(default)]
    composition: String,
}

#[derive(Debug, Deserialize)]
struct ScenePlanningOutput {
    #[serde(default)]
    plans: Vec<RawPlan>,
}

async fn call_for_batch(
    client: &LlmClient,
    batch: &[DirectorPlanEntry],
) -> Result<Vec<RawPlan>, PipelineError> {
    let scenes: Vec<String> = batch
        .iter()
        .map(|e| format!("{}: {}", e.scene_id, e.visual_moment))
        .collect();
    let prompt = format!(
        "For each of the following scenes, suggest camera, lighting, and composition \
         notes. Respond with a single JSON object: \
         {{\"plans\": [{{\"scene_id\": str, \"camera\": str, \"lighting\": str, \
         \"composition\": str}}]}}, one entry per scene_id listed.\nScenes:\n{}",
        scenes.join("\n")
    );

    let response = client
        .complete(&prompt)
        .await
        .ok_or_else(|| PipelineError::UnrecoverableApi("no output for scene-planning batch".to_string()))?;
    let parsed: ScenePlanningOutput = parse_json(&response)?;
    Ok(parsed.plans)
}

pub async fn run(
    client: Arc<LlmClient>,
    entries: &[DirectorPlanEntry],
    batch_size: usize,
    max_parallel: usize,
) -> Result<Vec<ScenePlan>, PipelineError> {
    let batches: Vec<Vec<DirectorPlanEntry>> = entries
        .chunks(batch_size.max(1))
        .map(|c| c.to_vec())
        .collect();

    let outcome = run_batch(batches.clone(), max_parallel, move |batch, _index| {
        let client = Arc::clone(&client);
        async move { call_for_batch(&client, &batch).await }
    })
    .await;

    let mut by_scene_id: HashMap<String, ScenePlan> = HashMap::new();
    for plans in outcome.results.into_iter().flatten() {
        for plan in plans {
            by_scene_id.insert(
                plan.scene_id.clone(),
                ScenePlan {
                    scene_id: plan.scene_id,
                    camera: plan.camera,
                    lighting: plan.lighting,
                    composition: plan.composition,
                },
            );
        }
    }

    Ok(entries
        .iter()
        .map(|e| {
            by_scene_id
                .remove(&e.scene_id)
                .unwrap_or_else(|| ScenePlan {
                    scene_id: e.scene_id.clone(),
                    camera: String::new(),
                    lighting: String::new(),
                    composition: String::new(),
                })
        })
        .collect())
}
