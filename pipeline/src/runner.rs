//! Stage Runner (C5)
//!
//! Drives stages 1–7 in order (spec.md §4.5). For each stage: skip and
//! log `SKIPPED` if its output is already complete; otherwise read
//! inputs from the workbook, run the stage, and write outputs. Any
//! error other than a tolerated per-task failure is wrapped as
//! `PipelineError::Terminal` and returned — whatever prior stages wrote
//! stays on disk, so a subsequent run resumes from there.

use crate::stages::{stage1, stage2, stage3, stage4, stage5, stage6, stage7};
use scenepipe_core::{DirectorPlanStatus, PipelineConfig, PipelineError, SrtDocument};
use scenepipe_llm::LlmClient;
use scenepipe_workbook::{
    read_characters, read_director_plan, read_locations, read_scene_planning, read_scenes,
    read_segments, read_story_analysis, schema_version, sheet_name_characters,
    sheet_name_director_plan, sheet_name_locations, sheet_name_scene_planning,
    sheet_name_scenes, sheet_name_segments, sheet_name_story_analysis, stage_is_complete,
    write_characters, write_director_plan, write_locations, write_scene_planning, write_scenes,
    write_schema_version, write_segments, write_story_analysis, WorkbookStore,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

fn terminal(stage: &str, err: PipelineError) -> PipelineError {
    PipelineError::Terminal {
        stage: stage.to_string(),
        source: Box::new(err),
    }
}

/// Advances every `director_plan` entry named in `ids` to `target`,
/// respecting the monotonic `can_advance_to` rule (spec.md §4.8), and
/// writes the sheet back only if something actually changed.
fn advance_director_plan_status(
    store: &mut WorkbookStore,
    ids: &HashSet<String>,
    target: DirectorPlanStatus,
) -> Result<(), PipelineError> {
    let mut entries = read_director_plan(store);
    let mut changed = false;
    for entry in entries.iter_mut() {
        if ids.contains(&entry.scene_id) && entry.status.can_advance_to(target) && entry.status != target {
            entry.status = target;
            changed = true;
        }
    }
    if changed {
        write_director_plan(store, &entries)?;
    }
    Ok(())
}

pub async fn run_pipeline(
    store: &mut WorkbookStore,
    client: Arc<LlmClient>,
    config: &PipelineConfig,
    srt: &SrtDocument,
) -> Result<(), PipelineError> {
    if schema_version(store) != scenepipe_core::SCHEMA_VERSION {
        write_schema_version(store)?;
    }

    // Stage 1 — Story Analysis
    if stage_is_complete(store, sheet_name_story_analysis()) {
        info!(stage = "story_analysis", "SKIPPED");
    } else {
        let analysis = stage1::run(&client, srt).await.map_err(|e| terminal("story_analysis", e))?;
        write_story_analysis(store, std::slice::from_ref(&analysis))?;
        info!(stage = "story_analysis", "completed");
    }
    let story = read_story_analysis(store)
        .into_iter()
        .next()
        .ok_or_else(|| terminal("story_analysis", PipelineError::Workbook("missing story_analysis row".to_string())))?;

    // Stage 2 — Segmentation
    if stage_is_complete(store, sheet_name_segments()) {
        info!(stage = "segments", "SKIPPED");
    } else {
        let segments = stage2::run(&client, srt).await.map_err(|e| terminal("segments", e))?;
        write_segments(store, &segments)?;
        info!(stage = "segments", count = segments.len(), "completed");
    }
    let segments = read_segments(store);

    // Stage 3 — Characters
    if store.sheet_exists(sheet_name_characters()) {
        info!(stage = "characters", "SKIPPED");
    } else {
        let characters = stage3::run(&client, srt, &story).await.map_err(|e| terminal("characters", e))?;
        write_characters(store, &characters)?;
        info!(stage = "characters", count = characters.len(), "completed");
    }
    let characters = read_characters(store);

    // Stage 4 — Locations
    if store.sheet_exists(sheet_name_locations()) {
        info!(stage = "locations", "SKIPPED");
    } else {
        let locations = stage4::run(&client, srt, &story).await.map_err(|e| terminal("locations", e))?;
        write_locations(store, &locations)?;
        info!(stage = "locations", count = locations.len(), "completed");
    }
    let locations = read_locations(store);

    // Stage 5 — Director Plan
    if stage_is_complete(store, sheet_name_director_plan()) {
        info!(stage = "director_plan", "SKIPPED");
    } else {
        let entries = stage5::run(
            Arc::clone(&client),
            srt,
            &segments,
            &characters,
            &locations,
            config.max_parallel_api,
        )
        .await
        .map_err(|e| terminal("director_plan", e))?;
        write_director_plan(store, &entries)?;
        info!(stage = "director_plan", count = entries.len(), "completed");
    }
    let director_plan = read_director_plan(store);

    // Stage 6 — Scene Planning
    let planned_ids: HashSet<String> = read_scene_planning(store).into_iter().map(|p| p.scene_id).collect();
    let all_planned = director_plan.iter().all(|e| planned_ids.contains(&e.scene_id));
    if !director_plan.is_empty() && all_planned {
        info!(stage = "scene_planning", "SKIPPED");
    } else {
        let plans = stage6::run(
            Arc::clone(&client),
            &director_plan,
            config.stage6_batch_size,
            config.max_parallel_api,
        )
        .await
        .map_err(|e| terminal("scene_planning", e))?;
        write_scene_planning(store, &plans)?;
        info!(stage = "scene_planning", count = plans.len(), "completed");
    }
    let planned_ids_after: HashSet<String> = read_scene_planning(store).into_iter().map(|p| p.scene_id).collect();
    advance_director_plan_status(store, &planned_ids_after, DirectorPlanStatus::Planned)?;
    let director_plan = read_director_plan(store);

    // Stage 7 — Scene Prompts
    let existing_scene_ids: HashSet<String> = read_scenes(store).into_iter().map(|s| s.scene_id).collect();
    let all_prompted = director_plan.iter().all(|e| existing_scene_ids.contains(&e.scene_id));
    if !director_plan.is_empty() && all_prompted {
        info!(stage = "scenes", "SKIPPED");
    } else {
        let new_scenes = stage7::run(
            Arc::clone(&client),
            &director_plan,
            &segments,
            srt,
            &existing_scene_ids,
            config.stage7_batch_size,
            config.max_parallel_api,
            &config.duplicate_detection,
            config.video_mode,
        )
        .await
        .map_err(|e| terminal("scenes", e))?;

        let mut all_scenes = read_scenes(store);
        all_scenes.extend(new_scenes);
        write_scenes(store, &all_scenes)?;
        info!(stage = "scenes", total = all_scenes.len(), "completed");
    }
    let prompted_ids: HashSet<String> = read_scenes(store).into_iter().map(|s| s.scene_id).collect();
    advance_director_plan_status(store, &prompted_ids, DirectorPlanStatus::Prompted)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenepipe_core::SrtEntry;
    use scenepipe_llm::FakeTransport;
    use tempfile::tempdir;

    fn srt_of_len(n: u32) -> SrtDocument {
        let entries = (1..=n)
            .map(|i| SrtEntry {
                index: i,
                start_ms: (i as u64 - 1) * 1000,
                end_ms: i as u64 * 1000,
                text: format!("line {i}"),
            })
            .collect();
        SrtDocument::from_entries(entries).unwrap()
    }

    fn always(text: &'static str) -> Arc<LlmClient> {
        Arc::new(LlmClient::new(
            Arc::new(FakeTransport::always(text)),
            PipelineConfig::default(),
        ))
    }

    #[tokio::test]
    async fn second_run_skips_every_stage_and_leaves_scenes_untouched() {
        let dir = tempdir().unwrap();
        let mut store = WorkbookStore::create(dir.path().join("p.xlsx"));
        let srt = srt_of_len(5);
        let config = PipelineConfig::default();

        // One fake response can't satisfy every stage's distinct JSON
        // shape, so this test only exercises a workbook whose earlier
        // stages are pre-populated and checks that a full second pass
        // makes no further writes.
        write_story_analysis(
            &mut store,
            &[scenepipe_core::StoryAnalysis {
                genre: "drama".to_string(),
                mood: "".to_string(),
                style: "".to_string(),
                summary: "".to_string(),
            }],
        )
        .unwrap();
        write_segments(
            &mut store,
            &[scenepipe_core::Segment {
                segment_id: 1,
                name: "Only".to_string(),
                srt_start_index: 1,
                srt_end_index: 5,
                image_count: 1,
            }],
        )
        .unwrap();
        write_characters(&mut store, &[]).unwrap();
        write_locations(&mut store, &[]).unwrap();
        write_director_plan(
            &mut store,
            &[scenepipe_core::DirectorPlanEntry {
                scene_id: "scene_001".to_string(),
                segment_id: 1,
                visual_moment: "open".to_string(),
                srt_start_index: 1,
                srt_end_index: 5,
                planned_duration_ms: 4000,
                characters_used: vec![],
                location_used: String::new(),
                status: scenepipe_core::DirectorPlanStatus::Pending,
            }],
        )
        .unwrap();
        write_scene_planning(
            &mut store,
            &[scenepipe_core::ScenePlan {
                scene_id: "scene_001".to_string(),
                camera: "wide".to_string(),
                lighting: "".to_string(),
                composition: "".to_string(),
            }],
        )
        .unwrap();
        write_scenes(
            &mut store,
            &[scenepipe_core::Scene {
                scene_id: "scene_001".to_string(),
                srt_start_ms: 0,
                srt_end_ms: 5000,
                planned_duration_ms: 4000,
                srt_text: "text".to_string(),
                img_prompt: "a prompt".to_string(),
                video_prompt: "a video prompt".to_string(),
                characters_used: vec![],
                location_used: String::new(),
                reference_files: vec![],
                status_img: "pending".to_string(),
                status_vid: "pending".to_string(),
                video_note: "".to_string(),
                segment_id: 1,
            }],
        )
        .unwrap();

        let client = always("should never be called");
        run_pipeline(&mut store, client, &config, &srt).await.unwrap();

        let scenes = read_scenes(&store);
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].img_prompt, "a prompt");

        // scene_001 already has both a planning row and a scenes row, so
        // the runner should have advanced its status past pending even
        // though both stages skipped their own work.
        let director_plan = read_director_plan(&store);
        assert_eq!(director_plan[0].status, DirectorPlanStatus::Prompted);
    }

    #[test]
    fn advance_director_plan_status_never_moves_backwards() {
        let dir = tempdir().unwrap();
        let mut store = WorkbookStore::create(dir.path().join("p.xlsx"));
        write_director_plan(
            &mut store,
            &[scenepipe_core::DirectorPlanEntry {
                scene_id: "scene_001".to_string(),
                segment_id: 1,
                visual_moment: "open".to_string(),
                srt_start_index: 1,
                srt_end_index: 5,
                planned_duration_ms: 4000,
                characters_used: vec![],
                location_used: String::new(),
                status: DirectorPlanStatus::Prompted,
            }],
        )
        .unwrap();

        let mut ids = HashSet::new();
        ids.insert("scene_001".to_string());
        advance_director_plan_status(&mut store, &ids, DirectorPlanStatus::Planned).unwrap();

        let entries = read_director_plan(&store);
        assert_eq!(entries[0].status, DirectorPlanStatus::Prompted);
    }
}
