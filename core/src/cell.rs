//! Typed cell values for workbook rows.
//!
//! spec.md §9: every cell read is logically an `Option<T>` whose "empty"
//! value is not the same as the key being absent. `CellValue` exists so
//! every entity parses to a concrete, default-valued record up front
//! (parse-on-read) instead of propagating `None` through the pipeline.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Text(String),
    Int(i64),
    List(Vec<String>),
}

impl CellValue {
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::List(items) => items.join(","),
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            CellValue::Int(i) => *i,
            CellValue::Text(s) => s.parse().unwrap_or(0),
            CellValue::List(items) => items.len() as i64,
        }
    }

    pub fn as_list(&self) -> Vec<String> {
        match self {
            CellValue::List(items) => items.clone(),
            CellValue::Text(s) if s.is_empty() => Vec::new(),
            CellValue::Text(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
            CellValue::Int(i) => vec![i.to_string()],
        }
    }
}

/// Reads `row[index]`, treating both "row too short" and "cell present
/// but empty" as the type's default — never a panic, never a bare
/// `unwrap_or` that can't tell the two apart.
pub fn text_at(row: &[CellValue], index: usize) -> String {
    row.get(index).map(CellValue::as_text).unwrap_or_default()
}

pub fn int_at(row: &[CellValue], index: usize) -> i64 {
    row.get(index).map(CellValue::as_int).unwrap_or(0)
}

pub fn list_at(row: &[CellValue], index: usize) -> Vec<String> {
    row.get(index).map(CellValue::as_list).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_row_defaults_missing_trailing_cells() {
        let row = vec![CellValue::Text("only".to_string())];
        assert_eq!(text_at(&row, 0), "only");
        assert_eq!(text_at(&row, 5), "");
        assert_eq!(int_at(&row, 5), 0);
        assert_eq!(list_at(&row, 5), Vec::<String>::new());
    }

    #[test]
    fn empty_cell_is_not_absence() {
        let row = vec![CellValue::Text(String::new())];
        assert_eq!(text_at(&row, 0), "");
        assert_eq!(list_at(&row, 0), Vec::<String>::new());
    }

    #[test]
    fn longer_row_extra_cells_ignored_by_fixed_accessors() {
        let row = vec![
            CellValue::Text("a".to_string()),
            CellValue::Text("extra".to_string()),
        ];
        assert_eq!(text_at(&row, 0), "a");
    }
}
