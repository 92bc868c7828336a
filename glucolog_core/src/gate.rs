//! Dose safety gate.
//!
//! This module implements the layered rule evaluation over a proposed
//! insulin dose:
//! - Critical rules always block and cannot be configured off
//! - Warnings can be acknowledged by the caller
//! - Info lines are non-blocking context
//!
//! Every matching rule is recorded rather than short-circuiting on the first
//! failure, so the caller always sees the complete picture. The gate is not a
//! substitute for medical advice; it exists to catch entry errors and insulin
//! stacking, not to prescribe.

use crate::config::{DecayProfiles, SafetyConfig};
use crate::decay::{calculate_cob, calculate_iob};
use crate::history;
use crate::interval::can_dose_again;
use crate::risk::{classify, RiskCategory, SEVERE_HYPO_MG_DL};
use crate::types::{DiaryEntry, IntervalCheckResult, SafetyVerdict};

/// Hard ceiling on a single bolus, in units.
///
/// A dose beyond this is treated as a data-entry error and blocked no matter
/// what the configuration says; `max_bolus_units` can only tighten the
/// ceiling, never raise it past this floor.
pub const IMPLAUSIBLE_DOSE_CEILING_UNITS: f64 = 50.0;

/// Evaluate a proposed dose against current glucose and active insulin.
///
/// `recent_dose_units` is the caller's typical-dose history (total units per
/// prior administration); pass an empty slice when no history is available
/// and the unusual-dose check is skipped.
///
/// A non-finite glucose value is treated as "no reading", which itself
/// produces a warning rather than an error.
pub fn is_safe_to_dose(
    current_glucose_mg_dl: f64,
    current_iob: f64,
    proposed_dose_units: f64,
    limits: &SafetyConfig,
    recent_dose_units: &[f64],
) -> SafetyVerdict {
    let glucose = current_glucose_mg_dl
        .is_finite()
        .then_some(current_glucose_mg_dl);
    evaluate_rules(glucose, current_iob, proposed_dose_units, limits, recent_dose_units, None)
}

/// Full evaluation of a proposed dose against diary history.
#[derive(Clone, Debug)]
pub struct DoseEvaluation {
    pub iob: f64,
    pub cob: f64,
    /// The glucose value the gate ran against, if any was available
    pub glucose_mg_dl: Option<f64>,
    pub risk: Option<RiskCategory>,
    pub interval: IntervalCheckResult,
    pub verdict: SafetyVerdict,
}

/// Run the complete dosing decision over diary history: derive dose and carb
/// records, compute IOB/COB, check the dose interval, and gate the proposed
/// dose. An unmet interval lands in the verdict's warning tier.
///
/// `glucose_override` takes precedence over the most recent logged reading;
/// the caller passes the reading being logged alongside the dose.
pub fn evaluate_dose(
    entries: &[DiaryEntry],
    proposed_dose_units: f64,
    glucose_override: Option<f64>,
    as_of_millis: i64,
    limits: &SafetyConfig,
    profiles: &DecayProfiles,
) -> DoseEvaluation {
    let insulin = history::insulin_records(entries);
    let carbs = history::carb_records(entries);

    let iob = calculate_iob(&insulin, as_of_millis, profiles);
    let cob = calculate_cob(&carbs, as_of_millis, limits.carb_absorption_minutes);
    let interval = can_dose_again(&insulin, as_of_millis, limits.minimum_interval_minutes);

    let glucose = glucose_override.filter(|g| g.is_finite()).or_else(|| {
        history::glucose_readings(entries)
            .into_iter()
            .max_by_key(|r| r.timestamp_millis)
            .map(|r| r.value_mg_dl)
    });

    let recent_doses: Vec<f64> = insulin.iter().map(|r| r.total_units()).collect();

    let verdict = evaluate_rules(
        glucose,
        iob,
        proposed_dose_units,
        limits,
        &recent_doses,
        Some(&interval),
    );

    tracing::info!(
        "Dose check: {:.1} u proposed, IOB {:.2} u, COB {:.1} g, glucose {:?} -> {}",
        proposed_dose_units,
        iob,
        cob,
        glucose,
        if verdict.blocked() {
            "blocked"
        } else if verdict.safe {
            "clear"
        } else {
            "warnings"
        }
    );

    DoseEvaluation {
        iob,
        cob,
        glucose_mg_dl: glucose,
        risk: glucose.map(classify),
        interval,
        verdict,
    }
}

/// The rule table itself. Rules run in fixed priority order and all matches
/// are recorded; `recommendation` is filled only when exactly one actionable
/// guidance emerged, so competing advice never collapses into one line.
fn evaluate_rules(
    glucose_mg_dl: Option<f64>,
    current_iob: f64,
    proposed_dose_units: f64,
    limits: &SafetyConfig,
    recent_dose_units: &[f64],
    interval: Option<&IntervalCheckResult>,
) -> SafetyVerdict {
    let mut critical_warnings = Vec::new();
    let mut warnings = Vec::new();
    let mut info = Vec::new();
    let mut guidance: Vec<String> = Vec::new();

    let risk = glucose_mg_dl.map(classify);
    let projected_iob = current_iob + proposed_dose_units;
    let dose_ceiling = limits.max_bolus_units.min(IMPLAUSIBLE_DOSE_CEILING_UNITS);
    let hard_iob_limit = limits.max_safe_iob * limits.iob_hard_limit_factor;

    // Critical tier: always active, regardless of any configuration
    if proposed_dose_units > dose_ceiling {
        critical_warnings.push(format!(
            "Proposed dose of {:.1} u exceeds the absolute single-dose ceiling of {:.1} u",
            proposed_dose_units, dose_ceiling
        ));
        guidance.push("Re-check the entered dose amount".to_string());
    }

    if let (Some(glucose), Some(RiskCategory::SevereHypo)) = (glucose_mg_dl, risk) {
        critical_warnings.push(format!(
            "Glucose {:.0} mg/dL is below {:.0} mg/dL; insulin must not be dosed during severe hypoglycemia",
            glucose, SEVERE_HYPO_MG_DL
        ));
        guidance.push(
            "Treat the low with fast-acting carbs and recheck before any insulin".to_string(),
        );
    }

    if projected_iob > hard_iob_limit {
        critical_warnings.push(format!(
            "Active insulin would reach {:.1} u, far beyond the safe maximum of {:.1} u",
            projected_iob, limits.max_safe_iob
        ));
        guidance.push("Wait for active insulin to decay before dosing again".to_string());
    }

    // Warning tier: the caller may acknowledge and proceed
    if glucose_mg_dl.is_none() {
        warnings.push("No usable glucose reading is available for this dose check".to_string());
        guidance.push("Take a glucose reading before dosing".to_string());
    }

    if let (Some(glucose), Some(RiskCategory::Hypo | RiskCategory::Low)) = (glucose_mg_dl, risk) {
        warnings.push(format!(
            "Glucose {:.0} mg/dL is below target; dosing now increases hypoglycemia risk",
            glucose
        ));
        guidance.push("Wait until glucose is back above target before dosing".to_string());
    }

    if projected_iob > limits.max_safe_iob && projected_iob <= hard_iob_limit {
        warnings.push(format!(
            "Active insulin would reach {:.1} u, above the safe maximum of {:.1} u (insulin stacking)",
            projected_iob, limits.max_safe_iob
        ));
        guidance.push("Wait for active insulin to decay before dosing again".to_string());
    }

    if !recent_dose_units.is_empty() {
        let mean = recent_dose_units.iter().sum::<f64>() / recent_dose_units.len() as f64;
        if mean > 0.0 && proposed_dose_units > limits.unusual_dose_factor * mean {
            warnings.push(format!(
                "Proposed dose of {:.1} u is well above your recent average of {:.1} u",
                proposed_dose_units, mean
            ));
            guidance.push("Verify the dose against your usual amounts".to_string());
        }
    }

    if let Some(check) = interval {
        if !check.can_dose_now {
            warnings.push(format!(
                "Minimum dose interval of {} minutes has not passed since the last dose",
                limits.minimum_interval_minutes
            ));
            guidance.push(format!(
                "Wait {} more minutes before the next dose",
                check.wait_minutes
            ));
        }
    }

    // Info tier: non-blocking context
    if let (Some(glucose), Some(RiskCategory::High | RiskCategory::SevereHigh)) =
        (glucose_mg_dl, risk)
    {
        if current_iob <= 0.0 {
            info.push(format!(
                "Glucose {:.0} mg/dL is elevated with no active insulin; a correction may be appropriate",
                glucose
            ));
        }
    }

    let safe = critical_warnings.is_empty() && warnings.is_empty();
    let recommendation = if guidance.len() == 1 {
        guidance.pop()
    } else {
        None
    };

    SafetyVerdict {
        safe,
        critical_warnings,
        warnings,
        info,
        recommendation,
    }
}
