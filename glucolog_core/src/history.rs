//! Diary history loading with a recency window.
//!
//! This module merges recent entries from the WAL and the archived CSV to
//! provide log history for the safety engine, and projects diary entries
//! into the record types the engine consumes.

use crate::timestamp::{sort_entries_desc, RawTimestamp};
use crate::types::{CarbEntryRecord, DiaryEntry, GlucoseReading, InsulinDoseRecord, MealContext};
use crate::Result;
use chrono::{Duration, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use uuid::Uuid;

/// CSV row format for reading archived entries
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    timestamp_millis: i64,
    glucose_mg_dl: Option<f64>,
    meal_context: Option<String>,
    insulin_doses: Option<String>,
    carbs_grams: Option<f64>,
    note: Option<String>,
}

impl TryFrom<CsvRow> for DiaryEntry {
    type Error = crate::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| crate::Error::History(format!("Invalid UUID: {}", e)))?;

        let insulin_doses: BTreeMap<String, f64> = match row.insulin_doses.as_deref() {
            None | Some("") => BTreeMap::new(),
            Some(json) => serde_json::from_str(json)
                .map_err(|e| crate::Error::History(format!("Invalid dose map: {}", e)))?,
        };

        let meal_context = row.meal_context.as_deref().and_then(MealContext::parse);

        Ok(DiaryEntry {
            id,
            timestamp: Some(RawTimestamp::Millis(row.timestamp_millis)),
            glucose_mg_dl: row.glucose_mg_dl,
            meal_context,
            insulin_doses,
            carbs_grams: row.carbs_grams,
            note: row.note,
        })
    }
}

/// Load entries from the last N days from both WAL and CSV
///
/// Returns entries sorted by timestamp (newest first).
/// Automatically deduplicates entries that appear in both WAL and CSV.
pub fn load_recent_entries(
    wal_path: &Path,
    csv_path: &Path,
    days: i64,
) -> Result<Vec<DiaryEntry>> {
    let cutoff = (Utc::now() - Duration::days(days)).timestamp_millis();
    let mut entries = Vec::new();
    let mut seen_ids = HashSet::new();

    // Load from WAL first (most recent)
    if wal_path.exists() {
        let wal_entries = crate::wal::read_entries(wal_path)?;
        for entry in wal_entries {
            if entry.timestamp_millis() >= cutoff {
                seen_ids.insert(entry.id);
                entries.push(entry);
            }
        }
        tracing::debug!("Loaded {} entries from WAL", entries.len());
    }

    // Load from CSV (archived)
    if csv_path.exists() {
        let csv_entries = load_entries_from_csv(csv_path)?;
        let mut csv_count = 0;
        for entry in csv_entries {
            if entry.timestamp_millis() >= cutoff && !seen_ids.contains(&entry.id) {
                seen_ids.insert(entry.id);
                entries.push(entry);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} entries from CSV", csv_count);
    }

    sort_entries_desc(&mut entries);

    tracing::info!(
        "Loaded {} total entries from last {} days",
        entries.len(),
        days
    );

    Ok(entries)
}

/// Load all entries from a CSV file
fn load_entries_from_csv(path: &Path) -> Result<Vec<DiaryEntry>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut entries = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match DiaryEntry::try_from(row) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("Failed to parse CSV row: {}", e);
                    // Continue processing other rows
                }
            },
            Err(e) => {
                tracing::warn!("Failed to deserialize CSV row: {}", e);
            }
        }
    }

    Ok(entries)
}

/// Project diary entries to insulin administration records.
///
/// Entries without a usable dose map are dropped here, upholding the
/// calculator's precondition that every record carries at least one dose.
pub fn insulin_records(entries: &[DiaryEntry]) -> Vec<InsulinDoseRecord> {
    entries.iter().filter_map(|e| e.insulin_record()).collect()
}

/// Project diary entries to carbohydrate intake records
pub fn carb_records(entries: &[DiaryEntry]) -> Vec<CarbEntryRecord> {
    entries.iter().filter_map(|e| e.carb_record()).collect()
}

/// Project diary entries to glucose readings
pub fn glucose_readings(entries: &[DiaryEntry]) -> Vec<GlucoseReading> {
    entries.iter().filter_map(|e| e.glucose_reading()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::EntrySink;

    fn create_test_entry(glucose: Option<f64>, insulin_units: Option<f64>, days_ago: i64) -> DiaryEntry {
        let mut doses = BTreeMap::new();
        if let Some(units) = insulin_units {
            doses.insert("rapid".to_string(), units);
        }

        let millis = (Utc::now() - Duration::days(days_ago)).timestamp_millis();

        DiaryEntry {
            id: Uuid::new_v4(),
            timestamp: Some(RawTimestamp::Millis(millis)),
            glucose_mg_dl: glucose,
            meal_context: None,
            insulin_doses: doses,
            carbs_grams: None,
            note: None,
        }
    }

    #[test]
    fn test_load_recent_entries_from_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("diary.wal");
        let csv_path = temp_dir.path().join("diary.csv");

        let mut sink = crate::wal::JsonlSink::new(&wal_path);
        sink.append(&create_test_entry(Some(110.0), None, 1)).unwrap();
        sink.append(&create_test_entry(Some(140.0), None, 3)).unwrap();
        sink.append(&create_test_entry(Some(90.0), None, 10)).unwrap(); // Too old

        let entries = load_recent_entries(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_deduplication_across_wal_and_csv() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("diary.wal");
        let csv_path = temp_dir.path().join("diary.csv");

        let entry = create_test_entry(Some(110.0), Some(4.0), 1);
        let entry_id = entry.id;
        let mut sink = crate::wal::JsonlSink::new(&wal_path);
        sink.append(&entry).unwrap();

        // Roll up to CSV (which includes the same entry)
        crate::csv_rollup::wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();

        // Re-append to a fresh WAL so the entry exists in both places
        let mut sink = crate::wal::JsonlSink::new(&wal_path);
        sink.append(&entry).unwrap();

        let entries = load_recent_entries(&wal_path, &csv_path, 7).unwrap();

        let count = entries.iter().filter(|e| e.id == entry_id).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_entries_sorted_newest_first() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("diary.wal");
        let csv_path = temp_dir.path().join("diary.csv");

        let mut sink = crate::wal::JsonlSink::new(&wal_path);
        let old = create_test_entry(Some(100.0), None, 5);
        let new = create_test_entry(Some(130.0), None, 1);

        sink.append(&old).unwrap();
        sink.append(&new).unwrap();

        let entries = load_recent_entries(&wal_path, &csv_path, 7).unwrap();

        assert_eq!(entries[0].id, new.id);
        assert_eq!(entries[1].id, old.id);
    }

    #[test]
    fn test_csv_round_trip_preserves_doses() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("diary.wal");
        let csv_path = temp_dir.path().join("diary.csv");

        let entry = create_test_entry(Some(150.0), Some(6.0), 1);
        let mut sink = crate::wal::JsonlSink::new(&wal_path);
        sink.append(&entry).unwrap();

        crate::csv_rollup::wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();

        let entries = load_recent_entries(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].insulin_doses["rapid"], 6.0);
        assert_eq!(entries[0].glucose_mg_dl, Some(150.0));
    }

    #[test]
    fn test_projections_filter_unusable_records() {
        let with_dose = create_test_entry(None, Some(4.0), 1);
        let glucose_only = create_test_entry(Some(120.0), None, 1);
        let mut nan_glucose = create_test_entry(Some(f64::NAN), None, 1);
        nan_glucose.carbs_grams = Some(45.0);

        let entries = vec![with_dose, glucose_only, nan_glucose];

        assert_eq!(insulin_records(&entries).len(), 1);
        assert_eq!(glucose_readings(&entries).len(), 1);
        assert_eq!(carb_records(&entries).len(), 1);
    }
}
