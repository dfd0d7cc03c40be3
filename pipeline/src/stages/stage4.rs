//! Stage 4 — Locations (spec.md §4.5.4)
//!
//! Same shape as Stage 3; IDs assigned `loc1, loc2, …`.

use crate::llm_json::parse_json;
use scenepipe_core::{Location, PipelineError, SrtDocument, StoryAnalysis};
use scenepipe_llm::LlmClient;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawLocation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    atmosphere: String,
}

#[derive(Debug, Deserialize)]
struct LocationsOutput {
    #[serde(default)]
    locations: Vec<RawLocation>,
}

pub async fn run(
    client: &LlmClient,
    srt: &SrtDocument,
    story: &StoryAnalysis,
) -> Result<Vec<Location>, PipelineError> {
    let full_text = srt.text_range(1, srt.len() as u32);
    let prompt = format!(
        "Given this {} transcript (style: {}), list every distinct setting/location. \
         Respond with a single JSON object: \
         {{\"locations\": [{{\"name\": str, \"description\": str, \"atmosphere\": str}}]}}. \
         If there are none, return an empty list.\nTranscript:\n{full_text}",
        story.genre, story.style
    );

    let response = client.complete(&prompt).await.ok_or_else(|| PipelineError::StageFailed {
        stage: "locations".to_string(),
        reason: "LLM returned no output after retries".to_string(),
    })?;

    let parsed: LocationsOutput = parse_json(&response)?;
    Ok(parsed
        .locations
        .into_iter()
        .enumerate()
        .map(|(i, l)| Location {
            location_id: format!("loc{}", i + 1),
            name: l.name,
            description: l.description,
            atmosphere: l.atmosphere,
        })
        .collect())
}
