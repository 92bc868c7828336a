//! Write-Ahead Log (WAL) for diary entry persistence.
//!
//! Entries are appended to a JSONL (JSON Lines) file with file locking
//! to ensure safe concurrent access.

use crate::types::DiaryEntry;
use crate::Result;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Entry sink trait for persisting diary entries
pub trait EntrySink {
    fn append(&mut self, entry: &DiaryEntry) -> Result<()>;
}

/// JSONL-based entry sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl EntrySink for JsonlSink {
    fn append(&mut self, entry: &DiaryEntry) -> Result<()> {
        self.ensure_parent_dir()?;

        // Open file for appending
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Acquire exclusive lock
        file.lock_exclusive()?;

        // Write entry as JSON line
        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(entry)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended entry {} to WAL", entry.id);
        Ok(())
    }
}

/// Read all diary entries from a WAL file.
///
/// Malformed lines are logged and skipped; a single corrupt record never
/// hides the rest of the diary.
pub fn read_entries(path: &Path) -> Result<Vec<DiaryEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    // Acquire shared lock for reading
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut entries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<DiaryEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Failed to parse entry at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} entries from WAL", entries.len());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::RawTimestamp;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn create_test_entry() -> DiaryEntry {
        let mut doses = BTreeMap::new();
        doses.insert("rapid".to_string(), 4.0);

        DiaryEntry {
            id: Uuid::new_v4(),
            timestamp: Some(RawTimestamp::Millis(1_700_000_000_000)),
            glucose_mg_dl: Some(120.0),
            meal_context: None,
            insulin_doses: doses,
            carbs_grams: None,
            note: None,
        }
    }

    #[test]
    fn test_append_and_read_single_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("test.wal");

        let entry = create_test_entry();
        let entry_id = entry.id;

        let mut sink = JsonlSink::new(&wal_path);
        sink.append(&entry).unwrap();

        let entries = read_entries(&wal_path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, entry_id);
        assert_eq!(entries[0].insulin_doses["rapid"], 4.0);
    }

    #[test]
    fn test_append_multiple_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("test.wal");

        let mut sink = JsonlSink::new(&wal_path);
        for _ in 0..5 {
            sink.append(&create_test_entry()).unwrap();
        }

        let entries = read_entries(&wal_path).unwrap();
        assert_eq!(entries.len(), 5);
    }

    #[test]
    fn test_read_empty_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("nonexistent.wal");

        let entries = read_entries(&wal_path).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("test.wal");

        let mut sink = JsonlSink::new(&wal_path);
        sink.append(&create_test_entry()).unwrap();

        // Corrupt the file with a half-written line
        use std::io::Write as _;
        let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
        writeln!(file, "{{\"id\": \"not finished").unwrap();

        sink.append(&create_test_entry()).unwrap();

        let entries = read_entries(&wal_path).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_legacy_timestamp_shapes_deserialize() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("legacy.wal");

        // Lines as older app generations wrote them
        let lines = [
            format!(
                "{{\"id\":\"{}\",\"timestamp\":{{\"seconds\":1700000000,\"nanoseconds\":0}},\"glucose_mg_dl\":110.0,\"meal_context\":null,\"insulin_doses\":{{}},\"carbs_grams\":null,\"note\":null}}",
                Uuid::new_v4()
            ),
            format!(
                "{{\"id\":\"{}\",\"timestamp\":\"2024-01-15T10:30:00Z\",\"glucose_mg_dl\":95.0,\"meal_context\":\"fasting\",\"insulin_doses\":{{}},\"carbs_grams\":null,\"note\":null}}",
                Uuid::new_v4()
            ),
        ];
        std::fs::write(&wal_path, lines.join("\n")).unwrap();

        let entries = read_entries(&wal_path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp_millis(), 1_700_000_000_000);
        assert!(entries[1].timestamp_millis() > 0);
    }
}
