//! Stage 1 — Story Analysis (spec.md §4.5.1)
//!
//! One LLM call over the full SRT text. Terminal if the LLM returns
//! `None` after its own retry budget (spec.md §4.9).

use crate::llm_json::parse_json;
use scenepipe_core::{PipelineError, SrtDocument, StoryAnalysis};
use scenepipe_llm::LlmClient;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct StoryAnalysisOutput {
    #[serde(default)]
    genre: String,
    #[serde(default)]
    mood: String,
    #[serde(default)]
    style: String,
    #[serde(default)]
    summary: String,
}

pub async fn run(client: &LlmClient, srt: &SrtDocument) -> Result<StoryAnalysis, PipelineError> {
    let full_text = srt.text_range(1, srt.len() as u32);
    let prompt = format!(
        "Analyze the following subtitle transcript and respond with a single \
         JSON object with keys \"genre\", \"mood\", \"style\", \"summary\". \
         Transcript:\n{full_text}"
    );

    let response = client.complete(&prompt).await.ok_or_else(|| {
        PipelineError::StageFailed {
            stage: "story_analysis".to_string(),
            reason: "LLM returned no output after retries".to_string(),
        }
    })?;

    let parsed: StoryAnalysisOutput = parse_json(&response)?;
    Ok(StoryAnalysis {
        genre: parsed.genre,
        mood: parsed.mood,
        style: parsed.style,
        summary: parsed.summary,
    })
}
