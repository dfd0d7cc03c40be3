//! Stage 3 — Characters (spec.md §4.5.3)
//!
//! One LLM call. IDs assigned `nv1, nv2, …` in returned order. An empty
//! result is acceptable (spec.md §4.9).

use crate::llm_json::parse_json;
use scenepipe_core::{Character, PipelineError, SrtDocument, StoryAnalysis};
use scenepipe_llm::LlmClient;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawCharacter {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    appearance: String,
}

#[derive(Debug, Deserialize)]
struct CharactersOutput {
    #[serde(default)]
    characters: Vec<RawCharacter>,
}

pub async fn run(
    client: &LlmClient,
    srt: &SrtDocument,
    story: &StoryAnalysis,
) -> Result<Vec<Character>, PipelineError> {
    let full_text = srt.text_range(1, srt.len() as u32);
    let prompt = format!(
        "Given this {} transcript (mood: {}), list every recurring on-screen \
         character. Respond with a single JSON object: \
         {{\"characters\": [{{\"name\": str, \"description\": str, \"appearance\": str}}]}}. \
         If there are none, return an empty list.\nTranscript:\n{full_text}",
        story.genre, story.mood
    );

    let response = client.complete(&prompt).await.ok_or_else(|| PipelineError::StageFailed {
        stage: "characters".to_string(),
        reason: "LLM returned no output after retries".to_string(),
    })?;

    let parsed: CharactersOutput = parse_json(&response)?;
    Ok(parsed
        .characters
        .into_iter()
        .enumerate()
        .map(|(i, c)| Character {
            character_id: format!("nv{}", i + 1),
            name: c.name,
            description: c.description,
            appearance: c.appearance,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenepipe_core::{PipelineConfig, SrtEntry};
    use scenepipe_llm::FakeTransport;
    use std::sync::Arc;

    fn sample_srt() -> SrtDocument {
        SrtDocument::from_entries(vec![SrtEntry {
            index: 1,
            start_ms: 0,
            end_ms: 1000,
            text: "Hello".to_string(),
        }])
        .unwrap()
    }

    #[tokio::test]
    async fn assigns_sequential_character_ids_in_returned_order() {
        let transport = Arc::new(FakeTransport::always(
            r#"{"characters": [
                {"name": "Aria", "description": "lead", "appearance": "tall"},
                {"name": "Borin", "description": "sidekick", "appearance": "short"}
            ]}"#,
        ));
        let client = LlmClient::new(transport, PipelineConfig::default());
        let story = StoryAnalysis {
            genre: "drama".to_string(),
            mood: "tense".to_string(),
            style: "".to_string(),
            summary: "".to_string(),
        };
        let characters = run(&client, &sample_srt(), &story).await.unwrap();
        assert_eq!(characters[0].character_id, "nv1");
        assert_eq!(characters[1].character_id, "nv2");
        assert_eq!(characters[1].name, "Borin");
    }

    #[tokio::test]
    async fn empty_character_list_is_acceptable() {
        let transport = Arc::new(FakeTransport::always(r#"{"characters": []}"#));
        let client = LlmClient::new(transport, PipelineConfig::default());
        let story = StoryAnalysis {
            genre: "".to_string(),
            mood: "".to_string(),
            style: "".to_string(),
            summary: "".to_string(),
        };
        let characters = run(&client, &sample_srt(), &story).await.unwrap();
        assert!(characters.is_empty());
    }
}
