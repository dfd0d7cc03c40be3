//! Core pipeline entities (spec.md §3).
//!
//! Each entity implements `to_row`/`from_row` against the contractual,
//! append-only column layout for its sheet. New columns are always
//! appended at the end; readers tolerate rows shorter or longer than the
//! current column list (spec.md §4.2, §9).

use crate::cell::{int_at, list_at, text_at, CellValue};
use serde::{Deserialize, Serialize};

/// Current schema version stamped into the `meta` sheet. Bumped only
/// when a column is appended to a contractual sheet.
pub const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryAnalysis {
    pub genre: String,
    pub mood: String,
    pub style: String,
    pub summary: String,
}

impl StoryAnalysis {
    pub const COLUMNS: &'static [&'static str] = &["genre", "mood", "style", "summary"];

    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::Text(self.genre.clone()),
            CellValue::Text(self.mood.clone()),
            CellValue::Text(self.style.clone()),
            CellValue::Text(self.summary.clone()),
        ]
    }

    pub fn from_row(row: &[CellValue]) -> Self {
        Self {
            genre: text_at(row, 0),
            mood: text_at(row, 1),
            style: text_at(row, 2),
            summary: text_at(row, 3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub segment_id: u32,
    pub name: String,
    pub srt_start_index: u32,
    pub srt_end_index: u32,
    pub image_count: u32,
}

impl Segment {
    pub const COLUMNS: &'static [&'static str] = &[
        "segment_id",
        "name",
        "srt_start_index",
        "srt_end_index",
        "image_count",
    ];

    pub fn range_len(&self) -> u32 {
        self.srt_end_index - self.srt_start_index + 1
    }

    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::Int(self.segment_id as i64),
            CellValue::Text(self.name.clone()),
            CellValue::Int(self.srt_start_index as i64),
            CellValue::Int(self.srt_end_index as i64),
            CellValue::Int(self.image_count as i64),
        ]
    }

    pub fn from_row(row: &[CellValue]) -> Self {
        Self {
            segment_id: int_at(row, 0) as u32,
            name: text_at(row, 1),
            srt_start_index: int_at(row, 2) as u32,
            srt_end_index: int_at(row, 3) as u32,
            image_count: int_at(row, 4) as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub character_id: String,
    pub name: String,
    pub description: String,
    pub appearance: String,
}

impl Character {
    pub const COLUMNS: &'static [&'static str] =
        &["character_id", "name", "description", "appearance"];

    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::Text(self.character_id.clone()),
            CellValue::Text(self.name.clone()),
            CellValue::Text(self.description.clone()),
            CellValue::Text(self.appearance.clone()),
        ]
    }

    pub fn from_row(row: &[CellValue]) -> Self {
        Self {
            character_id: text_at(row, 0),
            name: text_at(row, 1),
            description: text_at(row, 2),
            appearance: text_at(row, 3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub location_id: String,
    pub name: String,
    pub description: String,
    pub atmosphere: String,
}

impl Location {
    pub const COLUMNS: &'static [&'static str] =
        &["location_id", "name", "description", "atmosphere"];

    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::Text(self.location_id.clone()),
            CellValue::Text(self.name.clone()),
            CellValue::Text(self.description.clone()),
            CellValue::Text(self.atmosphere.clone()),
        ]
    }

    pub fn from_row(row: &[CellValue]) -> Self {
        Self {
            location_id: text_at(row, 0),
            name: text_at(row, 1),
            description: text_at(row, 2),
            atmosphere: text_at(row, 3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectorPlanStatus {
    Pending,
    Planned,
    Prompted,
    Done,
}

impl DirectorPlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectorPlanStatus::Pending => "pending",
            DirectorPlanStatus::Planned => "planned",
            DirectorPlanStatus::Prompted => "prompted",
            DirectorPlanStatus::Done => "done",
        }
    }

    pub fn from_str_or_pending(s: &str) -> Self {
        match s {
            "planned" => DirectorPlanStatus::Planned,
            "prompted" => DirectorPlanStatus::Prompted,
            "done" => DirectorPlanStatus::Done,
            _ => DirectorPlanStatus::Pending,
        }
    }

    /// Monotonic transition check: never allows moving backwards
    /// (spec.md §4.8).
    pub fn can_advance_to(&self, next: DirectorPlanStatus) -> bool {
        Self::rank(*self) <= Self::rank(next)
    }

    fn rank(s: DirectorPlanStatus) -> u8 {
        match s {
            DirectorPlanStatus::Pending => 0,
            DirectorPlanStatus::Planned => 1,
            DirectorPlanStatus::Prompted => 2,
            DirectorPlanStatus::Done => 3,
        }
    }
}

/// `segment_id` is the second column; `status` is last. This layout is
/// contractual (spec.md §6) and must not change without a migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorPlanEntry {
    pub scene_id: String,
    pub segment_id: u32,
    pub visual_moment: String,
    pub srt_start_index: u32,
    pub srt_end_index: u32,
    pub planned_duration_ms: u64,
    pub characters_used: Vec<String>,
    pub location_used: String,
    pub status: DirectorPlanStatus,
}

impl DirectorPlanEntry {
    pub const COLUMNS: &'static [&'static str] = &[
        "scene_id",
        "segment_id",
        "visual_moment",
        "srt_start_index",
        "srt_end_index",
        "planned_duration_ms",
        "characters_used",
        "location_used",
        "status",
    ];

    pub fn range_len(&self) -> u32 {
        self.srt_end_index - self.srt_start_index + 1
    }

    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::Text(self.scene_id.clone()),
            CellValue::Int(self.segment_id as i64),
            CellValue::Text(self.visual_moment.clone()),
            CellValue::Int(self.srt_start_index as i64),
            CellValue::Int(self.srt_end_index as i64),
            CellValue::Int(self.planned_duration_ms as i64),
            CellValue::List(self.characters_used.clone()),
            CellValue::Text(self.location_used.clone()),
            CellValue::Text(self.status.as_str().to_string()),
        ]
    }

    pub fn from_row(row: &[CellValue]) -> Self {
        Self {
            scene_id: text_at(row, 0),
            segment_id: int_at(row, 1) as u32,
            visual_moment: text_at(row, 2),
            srt_start_index: int_at(row, 3) as u32,
            srt_end_index: int_at(row, 4) as u32,
            planned_duration_ms: int_at(row, 5) as u64,
            characters_used: list_at(row, 6),
            location_used: text_at(row, 7),
            status: DirectorPlanStatus::from_str_or_pending(&text_at(row, 8)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenePlan {
    pub scene_id: String,
    pub camera: String,
    pub lighting: String,
    pub composition: String,
}

impl ScenePlan {
    pub const COLUMNS: &'static [&'static str] =
        &["scene_id", "camera", "lighting", "composition"];

    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::Text(self.scene_id.clone()),
            CellValue::Text(self.camera.clone()),
            CellValue::Text(self.lighting.clone()),
            CellValue::Text(self.composition.clone()),
        ]
    }

    pub fn from_row(row: &[CellValue]) -> Self {
        Self {
            scene_id: text_at(row, 0),
            camera: text_at(row, 1),
            lighting: text_at(row, 2),
            composition: text_at(row, 3),
        }
    }
}

/// Final output row. `segment_id` is the **last** column (appended) so
/// prior workbooks stay readable (spec.md §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub scene_id: String,
    pub srt_start_ms: u64,
    pub srt_end_ms: u64,
    pub planned_duration_ms: u64,
    pub srt_text: String,
    pub img_prompt: String,
    pub video_prompt: String,
    pub characters_used: Vec<String>,
    pub location_used: String,
    pub reference_files: Vec<String>,
    pub status_img: String,
    pub status_vid: String,
    pub video_note: String,
    pub segment_id: u32,
}

impl Scene {
    pub const COLUMNS: &'static [&'static str] = &[
        "scene_id",
        "srt_start_ms",
        "srt_end_ms",
        "planned_duration_ms",
        "srt_text",
        "img_prompt",
        "video_prompt",
        "characters_used",
        "location_used",
        "reference_files",
        "status_img",
        "status_vid",
        "video_note",
        "segment_id",
    ];

    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::Text(self.scene_id.clone()),
            CellValue::Int(self.srt_start_ms as i64),
            CellValue::Int(self.srt_end_ms as i64),
            CellValue::Int(self.planned_duration_ms as i64),
            CellValue::Text(self.srt_text.clone()),
            CellValue::Text(self.img_prompt.clone()),
            CellValue::Text(self.video_prompt.clone()),
            CellValue::List(self.characters_used.clone()),
            CellValue::Text(self.location_used.clone()),
            CellValue::List(self.reference_files.clone()),
            CellValue::Text(self.status_img.clone()),
            CellValue::Text(self.status_vid.clone()),
            CellValue::Text(self.video_note.clone()),
            CellValue::Int(self.segment_id as i64),
        ]
    }

    pub fn from_row(row: &[CellValue]) -> Self {
        Self {
            scene_id: text_at(row, 0),
            srt_start_ms: int_at(row, 1) as u64,
            srt_end_ms: int_at(row, 2) as u64,
            planned_duration_ms: int_at(row, 3) as u64,
            srt_text: text_at(row, 4),
            img_prompt: text_at(row, 5),
            video_prompt: text_at(row, 6),
            characters_used: list_at(row, 7),
            location_used: text_at(row, 8),
            reference_files: list_at(row, 9),
            status_img: text_at(row, 10),
            status_vid: text_at(row, 11),
            video_note: text_at(row, 12),
            segment_id: int_at(row, 13) as u32,
        }
    }
}
