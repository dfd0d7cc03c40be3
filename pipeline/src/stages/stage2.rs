//! Stage 2 — Segmentation (spec.md §4.5.2)
//!
//! One LLM call for a first-pass partition, then two repair passes:
//! Validation A (disproportion: a segment's length-to-image_count ratio
//! must stay within a repairable band) and Validation B (gap repair:
//! fill every hole the first pass left in `[1..N]`). Coverage Validator
//! (C6) is the single source of truth for what counts as a gap.

use crate::coverage::check_coverage;
use crate::llm_json::parse_json;
use scenepipe_core::{PipelineError, Segment, SrtDocument};
use scenepipe_llm::LlmClient;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

const MAX_RECURSION_DEPTH: u32 = 3;

#[derive(Debug, Deserialize)]
struct RawSegment {
    #[serde(default)]
    name: String,
    srt_start_index: u32,
    srt_end_index: u32,
    #[serde(default = "default_image_count")]
    image_count: u32,
}

fn default_image_count() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct SegmentationOutput {
    #[serde(default)]
    segments: Vec<RawSegment>,
}

fn segment_length(start: u32, end: u32) -> u32 {
    end - start + 1
}

fn image_count_for_length(length: u32) -> u32 {
    (length + 9) / 10
}

async fn call_for_range(
    client: &LlmClient,
    srt: &SrtDocument,
    start: u32,
    end: u32,
) -> Result<Vec<RawSegment>, PipelineError> {
    let slice_text = srt.text_range(start, end);
    let prompt = format!(
        "Split the following subtitle excerpt (SRT indices {start}-{end}) into scene \
         segments. Respond with a single JSON object: \
         {{\"segments\": [{{\"name\": str, \"srt_start_index\": int, \"srt_end_index\": int, \
         \"image_count\": int}}]}} using absolute SRT indices in that range.\nExcerpt:\n{slice_text}"
    );
    let response = client.complete(&prompt).await.ok_or_else(|| PipelineError::StageFailed {
        stage: "segmentation".to_string(),
        reason: format!("LLM returned no output for range {start}..{end}"),
    })?;
    let parsed: SegmentationOutput = parse_json(&response)?;
    Ok(parsed.segments)
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Validation A: recursively repairs any segment whose ratio exceeds
/// the directly-splittable band, bounded at `MAX_RECURSION_DEPTH`.
/// Boxed because the recursive call makes the future self-referential.
fn repair_disproportion<'a>(
    client: &'a LlmClient,
    srt: &'a SrtDocument,
    raw: RawSegment,
    depth: u32,
) -> BoxFuture<'a, Result<Vec<RawSegment>, PipelineError>> {
    Box::pin(async move {
        let length = segment_length(raw.srt_start_index, raw.srt_end_index);
        let ratio = length as f64 / raw.image_count.max(1) as f64;

        if ratio <= 15.0 {
            return Ok(vec![raw]);
        }

        if ratio <= 30.0 {
            let sub_count = (ratio / 10.0).ceil().max(1.0) as u32;
            let sub_length = (length + sub_count - 1) / sub_count;
            let mut out = Vec::new();
            let mut cursor = raw.srt_start_index;
            while cursor <= raw.srt_end_index {
                let sub_end = (cursor + sub_length - 1).min(raw.srt_end_index);
                out.push(RawSegment {
                    name: raw.name.clone(),
                    srt_start_index: cursor,
                    srt_end_index: sub_end,
                    image_count: image_count_for_length(segment_length(cursor, sub_end)),
                });
                cursor = sub_end + 1;
            }
            return Ok(out);
        }

        if depth >= MAX_RECURSION_DEPTH {
            return Err(PipelineError::CoverageIrreparable(format!(
                "segment [{}, {}] still disproportionate at max recursion depth",
                raw.srt_start_index, raw.srt_end_index
            )));
        }

        let replacements =
            call_for_range(client, srt, raw.srt_start_index, raw.srt_end_index).await?;
        let mut repaired = Vec::new();
        for sub in replacements {
            repaired.extend(repair_disproportion(client, srt, sub, depth + 1).await?);
        }
        Ok(repaired)
    })
}

/// Validation B: fills every gap left after Validation A by calling the
/// LLM scoped to just that range.
async fn repair_gaps(
    client: &LlmClient,
    srt: &SrtDocument,
    mut segments: Vec<RawSegment>,
    total: u32,
) -> Result<Vec<RawSegment>, PipelineError> {
    loop {
        let ranges: Vec<(u32, u32)> = segments
            .iter()
            .map(|s| (s.srt_start_index, s.srt_end_index))
            .collect();
        let report = check_coverage(&ranges, total);
        if report.gaps.is_empty() {
            return Ok(segments);
        }

        for gap in &report.gaps {
            let replacements = call_for_range(client, srt, gap.start, gap.end).await?;
            if replacements.is_empty() {
                return Err(PipelineError::CoverageIrreparable(format!(
                    "gap [{}, {}] produced no replacement segments",
                    gap.start, gap.end
                )));
            }
            for r in replacements {
                segments.push(RawSegment {
                    name: r.name,
                    srt_start_index: r.srt_start_index,
                    srt_end_index: r.srt_end_index,
                    image_count: image_count_for_length(segment_length(
                        r.srt_start_index,
                        r.srt_end_index,
                    )),
                });
            }
        }
    }
}

pub async fn run(client: &LlmClient, srt: &SrtDocument) -> Result<Vec<Segment>, PipelineError> {
    let total = srt.len() as u32;
    let raw = call_for_range(client, srt, 1, total).await?;

    let mut disproportion_repaired = Vec::new();
    for segment in raw {
        disproportion_repaired.extend(repair_disproportion(client, srt, segment, 0).await?);
    }

    let repaired = repair_gaps(client, srt, disproportion_repaired, total).await?;

    let mut sorted = repaired;
    sorted.sort_by_key(|s| s.srt_start_index);

    Ok(sorted
        .into_iter()
        .enumerate()
        .map(|(i, s)| Segment {
            segment_id: (i + 1) as u32,
            name: s.name,
            srt_start_index: s.srt_start_index,
            srt_end_index: s.srt_end_index,
            image_count: s.image_count.max(1),
        })
        .collect())
}
