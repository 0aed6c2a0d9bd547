use chrono::{DateTime, Utc};

/// Whole minutes between two instants, rounded to the nearest minute.
/// Negative spans (clock skew) clamp to zero.
pub fn elapsed_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let seconds = (end - start).num_seconds().max(0);
    (seconds + 30) / 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_exact_minutes() {
        assert_eq!(elapsed_minutes(base(), base() + Duration::minutes(42)), 42);
    }

    #[test]
    fn test_rounds_to_nearest_minute() {
        assert_eq!(elapsed_minutes(base(), base() + Duration::seconds(89)), 1);
        assert_eq!(elapsed_minutes(base(), base() + Duration::seconds(90)), 2);
        assert_eq!(elapsed_minutes(base(), base() + Duration::seconds(29)), 0);
    }

    #[test]
    fn test_negative_span_clamps() {
        assert_eq!(elapsed_minutes(base(), base() - Duration::minutes(3)), 0);
    }
}
