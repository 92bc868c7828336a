//! Insulin and carbohydrate on-board decay modelling.
//!
//! Insulin activity follows a bilinear curve: it ramps linearly from zero to
//! a peak at `peak_minutes`, then falls linearly back to zero at
//! `duration_of_action_minutes`. The on-board fraction of a dose is one minus
//! the area absorbed so far, which gives a curve that starts at 1, reaches
//! exactly 0 at the end of the action window, and never increases.
//!
//! Carbohydrate absorption uses a single linear window rather than a
//! per-class table.

use crate::config::DecayProfiles;
use crate::timestamp::MILLIS_PER_MINUTE;
use crate::types::{CarbEntryRecord, DecayProfile, InsulinClass, InsulinDoseRecord};

/// Fraction of a dose still active `elapsed_minutes` after administration.
///
/// Satisfies `remaining_fraction(0) == 1`, `remaining_fraction(duration) == 0`,
/// continuity at the peak, and monotone non-increase over the action window.
pub fn remaining_fraction(elapsed_minutes: f64, profile: &DecayProfile) -> f64 {
    let duration = f64::from(profile.duration_of_action_minutes);
    let peak = f64::from(profile.peak_minutes);

    if elapsed_minutes <= 0.0 {
        return 1.0;
    }
    if elapsed_minutes >= duration {
        return 0.0;
    }

    if elapsed_minutes <= peak {
        // Rising phase: absorbed area grows quadratically under the ramp
        1.0 - elapsed_minutes * elapsed_minutes / (duration * peak)
    } else {
        // Falling phase: what remains is the tail triangle
        let tail = duration - elapsed_minutes;
        tail * tail / (duration * (duration - peak))
    }
}

/// Total insulin on board at `as_of_millis`, in units.
///
/// Each dose contributes `units * remaining_fraction(elapsed, profile)` with
/// the profile chosen by the insulin class inferred from the dose identifier.
/// Future-dated doses are not yet active and contribute nothing; doses past
/// their action window are skipped outright. Non-finite or non-positive unit
/// amounts are excluded rather than poisoning the sum.
pub fn calculate_iob(
    dose_records: &[InsulinDoseRecord],
    as_of_millis: i64,
    profiles: &DecayProfiles,
) -> f64 {
    let mut total = 0.0;

    for record in dose_records {
        let elapsed_minutes = (as_of_millis - record.timestamp_millis) as f64 / MILLIS_PER_MINUTE;

        if elapsed_minutes < 0.0 {
            // Entered ahead of time; not yet active
            continue;
        }

        for (identifier, units) in &record.doses {
            if !units.is_finite() || *units <= 0.0 {
                continue;
            }

            let class = InsulinClass::from_identifier(identifier);
            let profile = profiles.for_class(class);

            if elapsed_minutes >= f64::from(profile.duration_of_action_minutes) {
                continue;
            }

            total += units * remaining_fraction(elapsed_minutes, profile);
        }
    }

    total
}

/// Total carbohydrates on board at `as_of_millis`, in grams.
///
/// Linear absorption over a single fixed window.
pub fn calculate_cob(
    carb_records: &[CarbEntryRecord],
    as_of_millis: i64,
    absorption_minutes: u32,
) -> f64 {
    let absorption = f64::from(absorption_minutes);
    let mut total = 0.0;

    for record in carb_records {
        let elapsed_minutes = (as_of_millis - record.timestamp_millis) as f64 / MILLIS_PER_MINUTE;

        if elapsed_minutes < 0.0 || elapsed_minutes >= absorption {
            continue;
        }
        if !record.grams.is_finite() || record.grams <= 0.0 {
            continue;
        }

        total += record.grams * (1.0 - elapsed_minutes / absorption);
    }

    total
}
