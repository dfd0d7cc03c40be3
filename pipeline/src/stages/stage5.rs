//! Stage 5 — Director Plan (spec.md §4.5.5)
//!
//! One LLM call per segment, fanned out through the Batch Executor.
//! Per-segment output that spills outside its segment's range is
//! clipped (SPEC_FULL.md §10 decision on the spec's open question).
//! After all segment calls return, GAP-FILL synthesizes entries for
//! any SRT index left uncovered, and scene ids are assigned last by
//! stable `srt_start_index` order.

use crate::coverage::check_coverage;
use crate::llm_json::parse_json;
use scenepipe_batch::run_batch;
use scenepipe_core::{Character, DirectorPlanEntry, DirectorPlanStatus, Location, PipelineError, Segment, SrtDocument};
use scenepipe_llm::LlmClient;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize, Clone)]
struct RawEntry {
    #[serde(default)]
    visual_moment: String,
    srt_start_index: u32,
    srt_end_index: u32,
    #[serde(default)]
    planned_duration_ms: u64,
    #[serde(default)]
    characters_used: Vec<String>,
    #[serde(default)]
    location_used: String,
}

#[derive(Debug, Deserialize)]
struct DirectorPlanOutput {
    #[serde(default)]
    entries: Vec<RawEntry>,
}

fn duration_for_range(srt: &SrtDocument, start: u32, end: u32) -> u64 {
    let start_ms = srt.entry(start).map(|e| e.start_ms).unwrap_or(0);
    let end_ms = srt.entry(end).map(|e| e.end_ms).unwrap_or(start_ms);
    end_ms.saturating_sub(start_ms)
}

async fn call_for_segment(
    client: &LlmClient,
    srt: &SrtDocument,
    segment: &Segment,
    characters: &[Character],
    locations: &[Location],
) -> Result<Vec<RawEntry>, PipelineError> {
    let slice_text = srt.text_range(segment.srt_start_index, segment.srt_end_index);
    let character_ids: Vec<&str> = characters.iter().map(|c| c.character_id.as_str()).collect();
    let location_ids: Vec<&str> = locations.iter().map(|l| l.location_id.as_str()).collect();

    let prompt = format!(
        "Segment \"{}\" spans SRT indices {}-{} and needs {} director-plan entries whose \
         [srt_start_index, srt_end_index] sub-ranges partition that span exactly. Known \
         character ids: {:?}. Known location ids: {:?}. Respond with a single JSON object: \
         {{\"entries\": [{{\"visual_moment\": str, \"srt_start_index\": int, \
         \"srt_end_index\": int, \"planned_duration_ms\": int, \"characters_used\": [str], \
         \"location_used\": str}}]}}.\nExcerpt:\n{}",
        segment.name,
        segment.srt_start_index,
        segment.srt_end_index,
        segment.image_count,
        character_ids,
        location_ids,
        slice_text
    );

    let response = client.complete(&prompt).await.ok_or_else(|| PipelineError::StageFailed {
        stage: "director_plan".to_string(),
        reason: format!("LLM returned no output for segment {}", segment.segment_id),
    })?;
    let parsed: DirectorPlanOutput = parse_json(&response)?;
    Ok(parsed.entries)
}

/// Clips an entry to `segment`'s range; returns `None` if clipping
/// leaves no valid range (fully outside the segment).
fn clip_to_segment(entry: &RawEntry, segment: &Segment) -> Option<(u32, u32)> {
    let start = entry.srt_start_index.max(segment.srt_start_index);
    let end = entry.srt_end_index.min(segment.srt_end_index);
    if start > end {
        None
    } else {
        Some((start, end))
    }
}

fn owning_segment(segments: &[Segment], index: u32) -> Option<&Segment> {
    segments
        .iter()
        .find(|s| s.srt_start_index <= index && index <= s.srt_end_index)
}

pub async fn run(
    client: Arc<LlmClient>,
    srt: &SrtDocument,
    segments: &[Segment],
    characters: &[Character],
    locations: &[Location],
    max_parallel: usize,
) -> Result<Vec<DirectorPlanEntry>, PipelineError> {
    let total = srt.len() as u32;
    let srt_owned = srt.clone();
    let segments_owned: Vec<Segment> = segments.to_vec();
    let characters_owned: Vec<Character> = characters.to_vec();
    let locations_owned: Vec<Location> = locations.to_vec();

    let outcome = run_batch(segments.to_vec(), max_parallel, move |segment, _index| {
        let client = Arc::clone(&client);
        let srt = srt_owned.clone();
        let characters = characters_owned.clone();
        let locations = locations_owned.clone();
        async move { call_for_segment(&client, &srt, &segment, &characters, &locations).await }
    })
    .await;

    let mut entries: Vec<DirectorPlanEntry> = Vec::new();
    for (segment, raw_entries) in segments_owned.iter().zip(outcome.results.into_iter()) {
        let Some(raw_entries) = raw_entries else { continue };
        for raw in raw_entries {
            let Some((start, end)) = clip_to_segment(&raw, segment) else {
                continue;
            };
            entries.push(DirectorPlanEntry {
                scene_id: String::new(),
                segment_id: segment.segment_id,
                visual_moment: raw.visual_moment,
                srt_start_index: start,
                srt_end_index: end,
                planned_duration_ms: if raw.planned_duration_ms > 0 {
                    raw.planned_duration_ms
                } else {
                    duration_for_range(srt, start, end)
                },
                characters_used: raw.characters_used,
                location_used: raw.location_used,
                status: DirectorPlanStatus::Pending,
            });
        }
    }

    gap_fill(srt, &segments_owned, &mut entries, total);

    let ranges: Vec<(u32, u32)> = entries
        .iter()
        .map(|e| (e.srt_start_index, e.srt_end_index))
        .collect();
    if !check_coverage(&ranges, total).is_complete() {
        return Err(PipelineError::CoverageIrreparable(
            "GAP-FILL could not produce a full director-plan partition".to_string(),
        ));
    }

    entries.sort_by_key(|e| e.srt_start_index);
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.scene_id = format!("scene_{:03}", i + 1);
    }

    Ok(entries)
}

/// Synthesizes director-plan entries for every gap left after the
/// per-segment calls, each covering at most 10 SRT indices, inheriting
/// the owning segment's dominant entities (empty if none).
fn gap_fill(
    srt: &SrtDocument,
    segments: &[Segment],
    entries: &mut Vec<DirectorPlanEntry>,
    total: u32,
) {
    loop {
        let ranges: Vec<(u32, u32)> = entries
            .iter()
            .map(|e| (e.srt_start_index, e.srt_end_index))
            .collect();
        let report = check_coverage(&ranges, total);
        if report.gaps.is_empty() {
            return;
        }

        for gap in &report.gaps {
            let Some(segment) = owning_segment(segments, gap.start) else {
                continue;
            };
            let (default_characters, default_location) = dominant_entities(entries, segment.segment_id);

            let mut cursor = gap.start;
            while cursor <= gap.end {
                let chunk_end = (cursor + 9).min(gap.end);
                entries.push(DirectorPlanEntry {
                    scene_id: String::new(),
                    segment_id: segment.segment_id,
                    visual_moment: String::new(),
                    srt_start_index: cursor,
                    srt_end_index: chunk_end,
                    planned_duration_ms: duration_for_range(srt, cursor, chunk_end),
                    characters_used: default_characters.clone(),
                    location_used: default_location.clone(),
                    status: DirectorPlanStatus::Pending,
                });
                cursor = chunk_end + 1;
            }
        }
    }
}

fn dominant_entities(entries: &[DirectorPlanEntry], segment_id: u32) -> (Vec<String>, String) {
    let from_segment: Vec<&DirectorPlanEntry> = entries
        .iter()
        .filter(|e| e.segment_id == segment_id)
        .collect();
    let characters = from_segment
        .first()
        .map(|e| e.characters_used.clone())
        .unwrap_or_default();
    let location = from_segment
        .first()
        .map(|e| e.location_used.clone())
        .unwrap_or_default();
    (characters, location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenepipe_core::{PipelineConfig, SrtEntry};
    use scenepipe_llm::FakeTransport;

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

    fn segment(id: u32, start: u32, end: u32) -> Segment {
        Segment {
            segment_id: id,
            name: format!("seg{id}"),
            srt_start_index: start,
            srt_end_index: end,
            image_count: 1,
        }
    }

    #[tokio::test]
    async fn single_segment_partition_gets_scene_ids_by_start_order() {
        let srt = srt_of_len(10);
        let segments = vec![segment(1, 1, 10)];
        let transport = Arc::new(FakeTransport::always(
            r#"{"entries": [{"visual_moment": "open", "srt_start_index": 1, "srt_end_index": 10, "planned_duration_ms": 9000, "characters_used": ["nv1"], "location_used": ""}]}"#,
        ));
        let client = Arc::new(LlmClient::new(transport, PipelineConfig::default()));
        let entries = run(client, &srt, &segments, &[], &[], 4).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].scene_id, "scene_001");
    }

    #[tokio::test]
    async fn gap_fill_covers_a_missing_tail_range() {
        let srt = srt_of_len(120);
        let segments = vec![segment(1, 1, 120)];
        let transport = Arc::new(FakeTransport::always(
            r#"{"entries": [{"visual_moment": "a", "srt_start_index": 1, "srt_end_index": 100, "planned_duration_ms": 1000, "characters_used": [], "location_used": ""}]}"#,
        ));
        let client = Arc::new(LlmClient::new(transport, PipelineConfig::default()));
        let entries = run(client, &srt, &segments, &[], &[], 4).await.unwrap();

        let ranges: Vec<(u32, u32)> = entries.iter().map(|e| (e.srt_start_index, e.srt_end_index)).collect();
        assert!(check_coverage(&ranges, 120).is_complete());
        assert!(entries.iter().all(|e| e.srt_end_index - e.srt_start_index + 1 <= 10));
    }

    #[tokio::test]
    async fn out_of_range_entry_is_clipped_not_rejected_outright() {
        let srt = srt_of_len(10);
        let segments = vec![segment(1, 1, 5), segment(2, 6, 10)];
        // segment 1's entry spills into segment 2's range; it must be clipped to [1,5]
        let transport = Arc::new(FakeTransport::always(
            r#"{"entries": [{"visual_moment": "spill", "srt_start_index": 1, "srt_end_index": 8, "planned_duration_ms": 1000, "characters_used": [], "location_used": ""}]}"#,
        ));
        let client = Arc::new(LlmClient::new(transport, PipelineConfig::default()));
        let entries = run(client, &srt, &segments, &[], &[], 4).await.unwrap();

        let seg1_entries: Vec<&DirectorPlanEntry> = entries.iter().filter(|e| e.segment_id == 1).collect();
        assert!(seg1_entries.iter().all(|e| e.srt_end_index <= 5));
    }
}
