//! Glucose risk classification.
//!
//! Fixed clinical bands, inclusive on the lower bound of each band. These
//! cutoffs are deliberately constants rather than configuration: the severe
//! hypoglycemia boundary also anchors the safety gate's non-negotiable block.

use serde::{Deserialize, Serialize};

/// Severe (level 3) hypoglycemia cutoff in mg/dL
pub const SEVERE_HYPO_MG_DL: f64 = 54.0;
/// Hypoglycemia cutoff in mg/dL
pub const HYPO_MG_DL: f64 = 70.0;
/// Lower bound of the target range in mg/dL
pub const TARGET_MIN_MG_DL: f64 = 80.0;
/// Hyperglycemia cutoff in mg/dL
pub const HIGH_MG_DL: f64 = 180.0;
/// Severe hyperglycemia cutoff in mg/dL
pub const SEVERE_HIGH_MG_DL: f64 = 250.0;

/// Risk band for a glucose reading
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    SevereHypo,
    Hypo,
    Low,
    Normal,
    High,
    SevereHigh,
}

impl RiskCategory {
    pub fn label(&self) -> &'static str {
        match self {
            RiskCategory::SevereHypo => "Severe Hypoglycemia",
            RiskCategory::Hypo => "Hypoglycemia",
            RiskCategory::Low => "Low Normal",
            RiskCategory::Normal => "In Target Range",
            RiskCategory::High => "Hyperglycemia",
            RiskCategory::SevereHigh => "Severe Hyperglycemia",
        }
    }

    /// Suggested action shown alongside the band in status displays
    pub fn suggested_action(&self) -> &'static str {
        match self {
            RiskCategory::SevereHypo => "Treat immediately with fast-acting carbs",
            RiskCategory::Hypo => "Treat with 15g fast-acting carbs, recheck in 15 min",
            RiskCategory::Low => "Monitor closely, consider a snack if trending down",
            RiskCategory::Normal => "No action needed",
            RiskCategory::High => "Correction dose may be appropriate",
            RiskCategory::SevereHigh => "Correction needed, check ketones",
        }
    }
}

/// Map a glucose value in mg/dL to its risk band.
///
/// Bands, lowest to highest: severe hypo (<54), hypo (54-69), low (70-79),
/// normal (80-179), high (180-249), severe high (>=250).
pub fn classify(value_mg_dl: f64) -> RiskCategory {
    if value_mg_dl < SEVERE_HYPO_MG_DL {
        RiskCategory::SevereHypo
    } else if value_mg_dl < HYPO_MG_DL {
        RiskCategory::Hypo
    } else if value_mg_dl < TARGET_MIN_MG_DL {
        RiskCategory::Low
    } else if value_mg_dl < HIGH_MG_DL {
        RiskCategory::Normal
    } else if value_mg_dl < SEVERE_HIGH_MG_DL {
        RiskCategory::High
    } else {
        RiskCategory::SevereHigh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(classify(53.9), RiskCategory::SevereHypo);
        assert_eq!(classify(54.0), RiskCategory::Hypo);
        assert_eq!(classify(69.0), RiskCategory::Hypo);
        assert_eq!(classify(70.0), RiskCategory::Low);
        assert_eq!(classify(79.0), RiskCategory::Low);
        assert_eq!(classify(80.0), RiskCategory::Normal);
        assert_eq!(classify(179.0), RiskCategory::Normal);
        assert_eq!(classify(180.0), RiskCategory::High);
        assert_eq!(classify(249.0), RiskCategory::High);
        assert_eq!(classify(250.0), RiskCategory::SevereHigh);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(classify(20.0), RiskCategory::SevereHypo);
        assert_eq!(classify(600.0), RiskCategory::SevereHigh);
    }

    #[test]
    fn test_labels_are_distinct() {
        let categories = [
            RiskCategory::SevereHypo,
            RiskCategory::Hypo,
            RiskCategory::Low,
            RiskCategory::Normal,
            RiskCategory::High,
            RiskCategory::SevereHigh,
        ];
        for (i, a) in categories.iter().enumerate() {
            for b in categories.iter().skip(i + 1) {
                assert_ne!(a.label(), b.label());
            }
        }
    }
}
