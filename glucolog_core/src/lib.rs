#![forbid(unsafe_code)]

//! Core domain model and dosing-safety logic for the Glucolog diary.
//!
//! This crate provides:
//! - Domain types (diary entries, dose/carb/glucose records, verdicts)
//! - Timestamp normalization for heterogeneous log history
//! - Insulin/carb on-board decay modelling
//! - Glucose risk classification
//! - The dose safety gate and interval enforcement
//! - Persistence (WAL, CSV rollup, history loading)

pub mod types;
pub mod error;
pub mod timestamp;
pub mod config;
pub mod logging;
pub mod wal;
pub mod csv_rollup;
pub mod history;
pub mod decay;
pub mod risk;
pub mod interval;
pub mod gate;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use timestamp::{normalize, sort_entries_desc, RawTimestamp};
pub use config::{default_profiles, Config, DecayProfiles, SafetyConfig};
pub use wal::{EntrySink, JsonlSink};
pub use history::{carb_records, glucose_readings, insulin_records, load_recent_entries};
pub use decay::{calculate_cob, calculate_iob, remaining_fraction};
pub use risk::{classify, RiskCategory};
pub use interval::can_dose_again;
pub use gate::{evaluate_dose, is_safe_to_dose, DoseEvaluation};
