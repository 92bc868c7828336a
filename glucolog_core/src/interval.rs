//! Minimum-interval enforcement between insulin doses.

use crate::timestamp::MILLIS_PER_MINUTE;
use crate::types::{InsulinDoseRecord, IntervalCheckResult};

/// Check whether enough time has passed since the most recent dose.
///
/// With no prior dose, dosing is permitted immediately. Otherwise the
/// remaining wait is rounded up to the next whole minute, so a blocking
/// result never tells the user to wait "0 more minutes".
pub fn can_dose_again(
    dose_records: &[InsulinDoseRecord],
    as_of_millis: i64,
    minimum_interval_minutes: u32,
) -> IntervalCheckResult {
    let last_dose = dose_records
        .iter()
        .filter(|r| !r.doses.is_empty())
        .map(|r| r.timestamp_millis)
        .max();

    let Some(last_millis) = last_dose else {
        return IntervalCheckResult {
            can_dose_now: true,
            wait_minutes: 0,
            last_dose_timestamp_millis: None,
        };
    };

    let elapsed_minutes = (as_of_millis - last_millis) as f64 / MILLIS_PER_MINUTE;
    let minimum = f64::from(minimum_interval_minutes);
    let can_dose_now = elapsed_minutes >= minimum;

    let wait_minutes = if can_dose_now {
        0
    } else {
        (minimum - elapsed_minutes).ceil().max(0.0) as u32
    };

    tracing::debug!(
        "Interval check: {:.1} min since last dose, minimum {} min",
        elapsed_minutes,
        minimum_interval_minutes
    );

    IntervalCheckResult {
        can_dose_now,
        wait_minutes,
        last_dose_timestamp_millis: Some(last_millis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const MINUTE_MILLIS: i64 = 60_000;

    fn dose_record(timestamp_millis: i64) -> InsulinDoseRecord {
        let mut doses = BTreeMap::new();
        doses.insert("rapid".to_string(), 2.0);
        InsulinDoseRecord {
            timestamp_millis,
            doses,
        }
    }

    #[test]
    fn test_no_history_permits_dosing() {
        let result = can_dose_again(&[], 1_700_000_000_000, 60);
        assert!(result.can_dose_now);
        assert_eq!(result.wait_minutes, 0);
        assert_eq!(result.last_dose_timestamp_millis, None);
    }

    #[test]
    fn test_half_elapsed_interval() {
        let now = 1_700_000_000_000;
        let records = vec![dose_record(now - 30 * MINUTE_MILLIS)];

        let result = can_dose_again(&records, now, 60);
        assert!(!result.can_dose_now);
        assert_eq!(result.wait_minutes, 30);
        assert_eq!(result.last_dose_timestamp_millis, Some(now - 30 * MINUTE_MILLIS));
    }

    #[test]
    fn test_exactly_at_interval_permits() {
        let now = 1_700_000_000_000;
        let records = vec![dose_record(now - 60 * MINUTE_MILLIS)];

        let result = can_dose_again(&records, now, 60);
        assert!(result.can_dose_now);
        assert_eq!(result.wait_minutes, 0);
    }

    #[test]
    fn test_fractional_wait_rounds_up() {
        let now = 1_700_000_000_000;
        let records = vec![dose_record(now - 59 * MINUTE_MILLIS - 30_000)];

        let result = can_dose_again(&records, now, 60);
        assert!(!result.can_dose_now);
        // 30 seconds short still reports a full minute of waiting
        assert_eq!(result.wait_minutes, 1);
    }

    #[test]
    fn test_most_recent_dose_wins() {
        let now = 1_700_000_000_000;
        let records = vec![
            dose_record(now - 300 * MINUTE_MILLIS),
            dose_record(now - 20 * MINUTE_MILLIS),
            dose_record(now - 90 * MINUTE_MILLIS),
        ];

        let result = can_dose_again(&records, now, 60);
        assert!(!result.can_dose_now);
        assert_eq!(result.wait_minutes, 40);
    }

    #[test]
    fn test_unknown_timestamp_counts_as_ancient() {
        let now = 1_700_000_000_000;
        // A record whose timestamp failed to normalize sits at the epoch
        let records = vec![dose_record(0)];

        let result = can_dose_again(&records, now, 60);
        assert!(result.can_dose_now);
    }
}
