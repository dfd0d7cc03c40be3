//! Workbook Store (C2)
//!
//! Typed, checkpointed persistence of every pipeline artifact in one
//! `.xlsx` file. `read_sheet`/`write_sheet` are the only raw primitives;
//! `write_sheet` replaces a sheet's contents wholesale and is followed
//! by an atomic rename of the whole file, so a crash mid-write never
//! leaves a half-updated workbook on disk (spec.md §4.2, §5).

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook as XlsxWorkbook;
use scenepipe_core::{CellValue, PipelineError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

struct Sheet {
    header: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

/// The single source of truth for a project's pipeline artifacts.
/// All in-memory entities are rebuilt from this file on restart.
pub struct WorkbookStore {
    path: PathBuf,
    sheets: BTreeMap<String, Sheet>,
}

impl WorkbookStore {
    /// Open an existing workbook, or create a fresh in-memory one if
    /// the file does not yet exist on disk (first run for a project).
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::create(path))
        }
    }

    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheets: BTreeMap::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let mut workbook = open_workbook_auto(&path)
            .map_err(|e| PipelineError::Workbook(format!("failed to open {path:?}: {e}")))?;

        let mut sheets = BTreeMap::new();
        for sheet_name in workbook.sheet_names().to_owned() {
            let range = workbook
                .worksheet_range(&sheet_name)
                .map_err(|e| PipelineError::Workbook(format!("failed to read sheet '{sheet_name}': {e}")))?;

            let mut rows_iter = range.rows();
            let header: Vec<String> = rows_iter
                .next()
                .map(|row| row.iter().map(data_to_text).collect())
                .unwrap_or_default();

            let rows: Vec<Vec<CellValue>> = rows_iter
                .map(|row| row.iter().map(data_to_cell).collect())
                .collect();

            sheets.insert(sheet_name, Sheet { header, rows });
        }

        Ok(Self { path, sheets })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet_exists(&self, name: &str) -> bool {
        self.sheets.contains_key(name)
    }

    pub fn read_sheet(&self, name: &str) -> Vec<Vec<CellValue>> {
        self.sheets
            .get(name)
            .map(|s| s.rows.clone())
            .unwrap_or_default()
    }

    /// Whole-sheet replacement. New columns must only ever be appended
    /// to `header`'s end (spec.md §4.2); this function does not enforce
    /// that by itself — callers own their entity's column order.
    pub fn write_sheet(
        &mut self,
        name: &str,
        header: Vec<String>,
        rows: Vec<Vec<CellValue>>,
    ) -> Result<(), PipelineError> {
        self.sheets
            .insert(name.to_string(), Sheet { header, rows });
        self.flush()
    }

    /// Rebuild the entire `.xlsx` file from the in-memory sheets and
    /// atomically replace whatever is on disk.
    fn flush(&self) -> Result<(), PipelineError> {
        let mut workbook = XlsxWorkbook::new();

        for (name, sheet) in &self.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet
                .set_name(name)
                .map_err(|e| PipelineError::Workbook(format!("bad sheet name '{name}': {e}")))?;

            for (col, title) in sheet.header.iter().enumerate() {
                worksheet
                    .write_string(0, col as u16, title)
                    .map_err(|e| PipelineError::Workbook(e.to_string()))?;
            }

            for (row_idx, row) in sheet.rows.iter().enumerate() {
                for (col_idx, value) in row.iter().enumerate() {
                    let r = (row_idx + 1) as u32;
                    let c = col_idx as u16;
                    match value {
                        CellValue::Int(i) => worksheet.write_number(r, c, *i as f64),
                        CellValue::Text(t) => worksheet.write_string(r, c, t),
                        CellValue::List(items) => worksheet.write_string(r, c, &items.join(",")),
                    }
                    .map_err(|e| PipelineError::Workbook(e.to_string()))?;
                }
            }
        }

        let tmp_path = self.path.with_extension("xlsx.tmp");
        workbook
            .save(&tmp_path)
            .map_err(|e| PipelineError::Workbook(format!("failed to write {tmp_path:?}: {e}")))?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn data_to_text(d: &Data) -> String {
    match d {
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn data_to_cell(d: &Data) -> CellValue {
    match d {
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) if f.fract() == 0.0 => CellValue::Int(*f as i64),
        Data::Empty => CellValue::Text(String::new()),
        other => CellValue::Text(data_to_text(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_load_round_trips_a_sheet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("project.xlsx");

        let mut store = WorkbookStore::create(&path);
        store
            .write_sheet(
                "characters",
                vec!["character_id".to_string(), "name".to_string()],
                vec![vec![
                    CellValue::Text("nv1".to_string()),
                    CellValue::Text("Aria".to_string()),
                ]],
            )
            .unwrap();

        let reloaded = WorkbookStore::load(&path).unwrap();
        let rows = reloaded.read_sheet("characters");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].as_text(), "nv1");
        assert_eq!(rows[0][1].as_text(), "Aria");
    }

    #[test]
    fn missing_sheet_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = WorkbookStore::create(dir.path().join("p.xlsx"));
        assert!(store.read_sheet("segments").is_empty());
        assert!(!store.sheet_exists("segments"));
    }

    #[test]
    fn load_or_create_creates_when_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new.xlsx");
        let store = WorkbookStore::load_or_create(&path).unwrap();
        assert!(!store.sheet_exists("scenes"));
    }

    #[test]
    fn resumed_workbook_preserves_prior_sheets_after_new_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("project.xlsx");

        let mut store = WorkbookStore::create(&path);
        store
            .write_sheet(
                "story_analysis",
                vec!["genre".to_string()],
                vec![vec![CellValue::Text("drama".to_string())]],
            )
            .unwrap();

        let mut reopened = WorkbookStore::load(&path).unwrap();
        reopened
            .write_sheet(
                "segments",
                vec!["segment_id".to_string()],
                vec![vec![CellValue::Int(1)]],
            )
            .unwrap();

        let final_store = WorkbookStore::load(&path).unwrap();
        assert!(final_store.sheet_exists("story_analysis"));
        assert!(final_store.sheet_exists("segments"));
    }
}
