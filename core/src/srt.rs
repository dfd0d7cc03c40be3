//! SRT Model (C3)
//!
//! Parses a subtitle file into a strict `[1..N]` index space. Entries are
//! immutable once loaded: the rest of the pipeline only ever reads them.

use crate::error::PipelineError;

/// One timed subtitle entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtEntry {
    /// 1-based, dense index as it appeared in the file.
    pub index: u32,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// An immutable, indexed sequence of `SrtEntry`, loaded once per project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtDocument {
    entries: Vec<SrtEntry>,
}

impl SrtDocument {
    /// Parse raw SRT text. Fails with `InputInvalid` if indices are
    /// non-sequential or a timestamp fails to parse.
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let normalized = raw.replace("\r\n", "\n");
        let mut entries = Vec::new();

        for block in normalized.split("\n\n") {
            let block = block.trim();
            if block.is_empty() {
                continue;
            }

            let mut lines = block.lines();

            let index_line = lines
                .next()
                .ok_or_else(|| PipelineError::InputInvalid("empty SRT block".to_string()))?
                .trim();
            let index: u32 = index_line.parse().map_err(|_| {
                PipelineError::InputInvalid(format!("non-numeric SRT index: '{index_line}'"))
            })?;

            let time_line = lines.next().ok_or_else(|| {
                PipelineError::InputInvalid(format!("block {index} missing timestamp line"))
            })?;
            let (start_ms, end_ms) = parse_time_range(time_line)?;

            let text = lines.collect::<Vec<_>>().join("\n").trim().to_string();

            entries.push(SrtEntry {
                index,
                start_ms,
                end_ms,
                text,
            });
        }

        Self::from_entries(entries)
    }

    /// Build a document from already-parsed entries, validating the
    /// invariants in spec.md §3: dense `[1..N]` indices, ordered by
    /// `start_ms`, and `start_ms <= end_ms` per entry.
    pub fn from_entries(mut entries: Vec<SrtEntry>) -> Result<Self, PipelineError> {
        entries.sort_by_key(|e| e.index);

        for (expected, entry) in (1u32..).zip(entries.iter()) {
            if entry.index != expected {
                return Err(PipelineError::InputInvalid(format!(
                    "SRT indices are not dense: expected {expected}, found {}",
                    entry.index
                )));
            }
            if entry.start_ms > entry.end_ms {
                return Err(PipelineError::InputInvalid(format!(
                    "entry {} has start_ms > end_ms",
                    entry.index
                )));
            }
        }

        for window in entries.windows(2) {
            if window[0].start_ms > window[1].start_ms {
                return Err(PipelineError::InputInvalid(
                    "SRT entries are not ordered by start_ms".to_string(),
                ));
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SrtEntry] {
        &self.entries
    }

    pub fn entry(&self, index: u32) -> Option<&SrtEntry> {
        self.entries.get(index.checked_sub(1)? as usize)
    }

    /// Concatenated text for the inclusive `[start, end]` index range.
    pub fn text_range(&self, start: u32, end: u32) -> String {
        (start..=end)
            .filter_map(|i| self.entry(i))
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Serialize back to SRT text (used by the round-trip test in
    /// spec.md §8).
    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.index.to_string());
            out.push('\n');
            out.push_str(&format!(
                "{} --> {}\n",
                format_timestamp(entry.start_ms),
                format_timestamp(entry.end_ms)
            ));
            out.push_str(&entry.text);
            out.push_str("\n\n");
        }
        out
    }
}

fn parse_time_range(line: &str) -> Result<(u64, u64), PipelineError> {
    let mut parts = line.split("-->");
    let start = parts
        .next()
        .ok_or_else(|| PipelineError::InputInvalid(format!("bad timestamp line: '{line}'")))?;
    let end = parts
        .next()
        .ok_or_else(|| PipelineError::InputInvalid(format!("bad timestamp line: '{line}'")))?;
    Ok((parse_timestamp(start.trim())?, parse_timestamp(end.trim())?))
}

fn parse_timestamp(s: &str) -> Result<u64, PipelineError> {
    let s = s.trim();
    let (hms, ms) = s
        .split_once(',')
        .or_else(|| s.split_once('.'))
        .ok_or_else(|| PipelineError::InputInvalid(format!("bad timestamp: '{s}'")))?;

    let parts: Vec<&str> = hms.split(':').collect();
    if parts.len() != 3 {
        return Err(PipelineError::InputInvalid(format!("bad timestamp: '{s}'")));
    }

    let h: u64 = parts[0]
        .parse()
        .map_err(|_| PipelineError::InputInvalid(format!("bad hours in timestamp: '{s}'")))?;
    let m: u64 = parts[1]
        .parse()
        .map_err(|_| PipelineError::InputInvalid(format!("bad minutes in timestamp: '{s}'")))?;
    let sec: u64 = parts[2]
        .parse()
        .map_err(|_| PipelineError::InputInvalid(format!("bad seconds in timestamp: '{s}'")))?;
    let millis: u64 = ms
        .parse()
        .map_err(|_| PipelineError::InputInvalid(format!("bad milliseconds in timestamp: '{s}'")))?;

    Ok(((h * 3600 + m * 60 + sec) * 1000) + millis)
}

fn format_timestamp(total_ms: u64) -> String {
    let millis = total_ms % 1000;
    let total_s = total_ms / 1000;
    let s = total_s % 60;
    let total_m = total_s / 60;
    let m = total_m % 60;
    let h = total_m / 60;
    format!("{h:02}:{m:02}:{s:02},{millis:03}")
}
