//! Typed per-entity sheet accessors built on top of [`WorkbookStore`]'s
//! raw `read_sheet`/`write_sheet` primitives. Each function maps an
//! entity's `COLUMNS`/`to_row`/`from_row` (defined in
//! `scenepipe_core::model`) onto a named sheet, plus the `meta` sheet
//! that records `schema_version` for schema-evolution checks.

use crate::store::WorkbookStore;
use scenepipe_core::{
    model::SCHEMA_VERSION, Character, DirectorPlanEntry, Location, Scene, ScenePlan, Segment,
    StoryAnalysis,
};
use scenepipe_core::{text_at, CellValue, PipelineError};

const SHEET_META: &str = "meta";
const SHEET_STORY_ANALYSIS: &str = "story_analysis";
const SHEET_SEGMENTS: &str = "segments";
const SHEET_CHARACTERS: &str = "characters";
const SHEET_LOCATIONS: &str = "locations";
const SHEET_DIRECTOR_PLAN: &str = "director_plan";
const SHEET_SCENE_PLANNING: &str = "scene_planning";
const SHEET_SCENES: &str = "scenes";

/// Reads `meta.schema_version`, defaulting to the current schema for a
/// workbook that predates the `meta` sheet's introduction.
pub fn schema_version(store: &WorkbookStore) -> i64 {
    let rows = store.read_sheet(SHEET_META);
    rows.first()
        .map(|row| text_at(row, 1).parse().unwrap_or(SCHEMA_VERSION))
        .unwrap_or(SCHEMA_VERSION)
}

pub fn write_schema_version(store: &mut WorkbookStore) -> Result<(), PipelineError> {
    store.write_sheet(
        SHEET_META,
        vec!["key".to_string(), "value".to_string()],
        vec![vec![
            CellValue::Text("schema_version".to_string()),
            CellValue::Int(SCHEMA_VERSION),
        ]],
    )
}

macro_rules! sheet_accessors {
    ($read_fn:ident, $write_fn:ident, $sheet:ident, $entity:ty) => {
        pub fn $read_fn(store: &WorkbookStore) -> Vec<$entity> {
            store
                .read_sheet($sheet)
                .iter()
                .map(|row| <$entity>::from_row(row))
                .collect()
        }

        pub fn $write_fn(
            store: &mut WorkbookStore,
            items: &[$entity],
        ) -> Result<(), PipelineError> {
            let header = <$entity>::COLUMNS.iter().map(|c| c.to_string()).collect();
            let rows = items.iter().map(|item| item.to_row()).collect();
            store.write_sheet($sheet, header, rows)
        }
    };
}

sheet_accessors!(
    read_story_analysis,
    write_story_analysis,
    SHEET_STORY_ANALYSIS,
    StoryAnalysis
);
sheet_accessors!(read_segments, write_segments, SHEET_SEGMENTS, Segment);
sheet_accessors!(
    read_characters,
    write_characters,
    SHEET_CHARACTERS,
    Character
);
sheet_accessors!(read_locations, write_locations, SHEET_LOCATIONS, Location);
sheet_accessors!(
    read_director_plan,
    write_director_plan,
    SHEET_DIRECTOR_PLAN,
    DirectorPlanEntry
);
sheet_accessors!(
    read_scene_planning,
    write_scene_planning,
    SHEET_SCENE_PLANNING,
    ScenePlan
);
sheet_accessors!(read_scenes, write_scenes, SHEET_SCENES, Scene);

/// A stage is considered already-completed on resume when its sheet
/// exists and holds at least one row (spec.md §4.9 idempotent restart).
pub fn stage_is_complete(store: &WorkbookStore, sheet: &str) -> bool {
    store.sheet_exists(sheet) && !store.read_sheet(sheet).is_empty()
}

pub fn sheet_name_segments() -> &'static str {
    SHEET_SEGMENTS
}
pub fn sheet_name_story_analysis() -> &'static str {
    SHEET_STORY_ANALYSIS
}
pub fn sheet_name_characters() -> &'static str {
    SHEET_CHARACTERS
}
pub fn sheet_name_locations() -> &'static str {
    SHEET_LOCATIONS
}
pub fn sheet_name_director_plan() -> &'static str {
    SHEET_DIRECTOR_PLAN
}
pub fn sheet_name_scene_planning() -> &'static str {
    SHEET_SCENE_PLANNING
}
pub fn sheet_name_scenes() -> &'static str {
    SHEET_SCENES
}
