//! Core domain types for the Glucolog diary.
//!
//! This module defines the fundamental types used throughout the system:
//! - Diary entries as they are persisted (WAL/CSV)
//! - The value records the safety engine consumes
//! - Insulin classes and their decay profiles
//! - Verdict and interval-check results

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::timestamp::{normalize, RawTimestamp};

// ============================================================================
// Meal Context
// ============================================================================

/// When a glucose reading was taken relative to meals
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MealContext {
    Fasting,
    PreMeal,
    PostMeal,
    Bedtime,
    Random,
}

impl MealContext {
    /// Parse a context string as entered on the command line or stored in CSV
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "fasting" => Some(MealContext::Fasting),
            "pre_meal" | "premeal" => Some(MealContext::PreMeal),
            "post_meal" | "postmeal" => Some(MealContext::PostMeal),
            "bedtime" => Some(MealContext::Bedtime),
            "random" => Some(MealContext::Random),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MealContext::Fasting => "fasting",
            MealContext::PreMeal => "pre_meal",
            MealContext::PostMeal => "post_meal",
            MealContext::Bedtime => "bedtime",
            MealContext::Random => "random",
        }
    }
}

// ============================================================================
// Insulin Classes and Decay Profiles
// ============================================================================

/// Pharmacological class of an insulin preparation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InsulinClass {
    Rapid,
    Short,
    Intermediate,
    Long,
    UltraLong,
    Premixed,
}

impl InsulinClass {
    /// Infer the class from a free-text insulin identifier as logged by the
    /// user ("NovoRapid", "rapid acting", "Lantus", ...).
    ///
    /// Unknown identifiers fall back to rapid-acting, the most conservative
    /// choice for interval and stacking checks since it decays fastest but
    /// peaks soonest.
    pub fn from_identifier(identifier: &str) -> Self {
        let id = identifier.to_lowercase();

        if id.contains("mix") || id.contains("mixtard") || id.contains("30/70") {
            return InsulinClass::Premixed;
        }
        if id.contains("ultra") || id.contains("degludec") || id.contains("tresiba") {
            return InsulinClass::UltraLong;
        }
        if id.contains("long")
            || id.contains("basal")
            || id.contains("glargine")
            || id.contains("lantus")
            || id.contains("levemir")
            || id.contains("detemir")
        {
            return InsulinClass::Long;
        }
        if id.contains("nph")
            || id.contains("intermediate")
            || id.contains("insulatard")
            || id.contains("isophane")
        {
            return InsulinClass::Intermediate;
        }
        if id.contains("regular")
            || id.contains("short")
            || id.contains("actrapid")
            || id.contains("humulin r")
        {
            return InsulinClass::Short;
        }
        if id.contains("rapid")
            || id.contains("fast")
            || id.contains("aspart")
            || id.contains("lispro")
            || id.contains("glulisine")
            || id.contains("humalog")
            || id.contains("fiasp")
            || id.contains("apidra")
        {
            return InsulinClass::Rapid;
        }

        tracing::debug!("Unknown insulin identifier {:?}, assuming rapid-acting", identifier);
        InsulinClass::Rapid
    }

    /// All classes, in decay-table order
    pub fn all() -> [InsulinClass; 6] {
        [
            InsulinClass::Rapid,
            InsulinClass::Short,
            InsulinClass::Intermediate,
            InsulinClass::Long,
            InsulinClass::UltraLong,
            InsulinClass::Premixed,
        ]
    }
}

/// Activity-curve parameters for one insulin class
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecayProfile {
    /// Total window during which a dose remains active, in minutes
    pub duration_of_action_minutes: u32,
    /// Time of peak activity, in minutes; must lie strictly inside the window
    pub peak_minutes: u32,
}

// ============================================================================
// Engine Input Records
// ============================================================================

/// One administration event: a normalized timestamp plus units per insulin
/// identifier. A record with an empty dose map is meaningless and is filtered
/// out before it reaches the decay calculator.
#[derive(Clone, Debug, PartialEq)]
pub struct InsulinDoseRecord {
    pub timestamp_millis: i64,
    pub doses: BTreeMap<String, f64>,
}

impl InsulinDoseRecord {
    /// Total units across all insulin identifiers in this record
    pub fn total_units(&self) -> f64 {
        self.doses.values().filter(|u| u.is_finite()).sum()
    }
}

/// One carbohydrate intake event
#[derive(Clone, Debug, PartialEq)]
pub struct CarbEntryRecord {
    pub timestamp_millis: i64,
    pub grams: f64,
}

/// One blood glucose measurement
#[derive(Clone, Debug, PartialEq)]
pub struct GlucoseReading {
    pub timestamp_millis: i64,
    pub value_mg_dl: f64,
    pub meal_context: MealContext,
}

// ============================================================================
// Diary Entry (persisted form)
// ============================================================================

/// A diary entry as written to the WAL and archived to CSV.
///
/// Any combination of glucose reading, insulin doses and carb intake may be
/// present; the projection methods below extract whichever engine records an
/// entry actually carries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: Uuid,
    /// May be absent or in any legacy representation; normalized on read
    pub timestamp: Option<RawTimestamp>,
    pub glucose_mg_dl: Option<f64>,
    pub meal_context: Option<MealContext>,
    /// Units administered per insulin identifier
    #[serde(default)]
    pub insulin_doses: BTreeMap<String, f64>,
    pub carbs_grams: Option<f64>,
    pub note: Option<String>,
}

impl DiaryEntry {
    /// Normalized epoch-millisecond timestamp; 0 when unknown
    pub fn timestamp_millis(&self) -> i64 {
        normalize(self.timestamp.as_ref())
    }

    /// Extract the insulin administration, dropping non-finite and
    /// non-positive unit amounts. Returns None when nothing usable remains.
    pub fn insulin_record(&self) -> Option<InsulinDoseRecord> {
        let doses: BTreeMap<String, f64> = self
            .insulin_doses
            .iter()
            .filter(|(_, units)| units.is_finite() && **units > 0.0)
            .map(|(name, units)| (name.clone(), *units))
            .collect();

        if doses.is_empty() {
            return None;
        }

        Some(InsulinDoseRecord {
            timestamp_millis: self.timestamp_millis(),
            doses,
        })
    }

    /// Extract the carbohydrate intake, if present and usable
    pub fn carb_record(&self) -> Option<CarbEntryRecord> {
        let grams = self.carbs_grams?;
        if !grams.is_finite() || grams <= 0.0 {
            return None;
        }

        Some(CarbEntryRecord {
            timestamp_millis: self.timestamp_millis(),
            grams,
        })
    }

    /// Extract the glucose measurement, if present and usable
    pub fn glucose_reading(&self) -> Option<GlucoseReading> {
        let value = self.glucose_mg_dl?;
        if !value.is_finite() {
            return None;
        }

        Some(GlucoseReading {
            timestamp_millis: self.timestamp_millis(),
            value_mg_dl: value,
            meal_context: self.meal_context.unwrap_or(MealContext::Random),
        })
    }
}

// ============================================================================
// Engine Output Types
// ============================================================================

/// Outcome of a dose safety evaluation.
///
/// Constructed fresh on every evaluation and never persisted; a verdict is a
/// transient decision artifact, not a log entry.
#[derive(Clone, Debug, PartialEq)]
pub struct SafetyVerdict {
    /// True only when no critical warnings and no warnings matched
    pub safe: bool,
    /// Hard blocks; never overridable at any layer
    pub critical_warnings: Vec<String>,
    /// The caller may acknowledge these and proceed
    pub warnings: Vec<String>,
    /// Non-blocking context
    pub info: Vec<String>,
    /// Present only when exactly one actionable guidance applies
    pub recommendation: Option<String>,
}

impl SafetyVerdict {
    /// Whether the evaluation ended in the Blocked terminal state
    pub fn blocked(&self) -> bool {
        !self.critical_warnings.is_empty()
    }
}

/// Result of the minimum-interval check between insulin doses
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalCheckResult {
    pub can_dose_now: bool,
    /// Whole minutes remaining, rounded up; 0 when dosing is permitted
    pub wait_minutes: u32,
    pub last_dose_timestamp_millis: Option<i64>,
}
