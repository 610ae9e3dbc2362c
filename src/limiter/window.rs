use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Deserialize;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Time zone whose end of day closes a rate limit window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetBoundary {
    Local,
    Utc,
}

impl ResetBoundary {
    /// Seconds left until 23:59:59 of the day `now` falls on, never less than one.
    pub fn seconds_until_reset(&self, now: DateTime<Utc>) -> u64 {
        match self {
            ResetBoundary::Local => Self::remaining(now.with_timezone(&Local)),
            ResetBoundary::Utc => Self::remaining(now),
        }
    }

    fn remaining<Tz: TimeZone>(now: DateTime<Tz>) -> u64 {
        let now = now.naive_local();
        let end_of_day = NaiveDateTime::new(
            now.date(),
            NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
        );

        u64::try_from((end_of_day - now).num_seconds()).map_or(1, |seconds| seconds.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use rstest::rstest;

    fn at(time: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(time)
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    #[rstest]
    #[case("2024-03-01T00:00:00Z", 86_399)]
    #[case("2024-03-01T12:00:00Z", 43_199)]
    #[case("2024-03-01T23:59:00Z", 59)]
    #[case("2024-03-01T23:59:59Z", 1)]
    #[case("2024-03-01T23:59:59.900Z", 1)]
    fn utc_window_ends_before_midnight(#[case] now: &str, #[case] expected: u64) {
        assert_eq!(ResetBoundary::Utc.seconds_until_reset(at(now)), expected);
    }

    #[rstest]
    #[case("2024-03-01T20:00:00Z", 2, 7_199)]
    #[case("2024-03-01T20:00:00Z", -5, 32_399)]
    #[case("2024-03-01T23:30:00Z", 2, 80_999)]
    #[case("2024-03-02T04:59:59Z", -5, 1)]
    fn offset_window_ends_at_local_end_of_day(
        #[case] now: &str,
        #[case] offset_hours: i32,
        #[case] expected: u64,
    ) {
        let offset = FixedOffset::east_opt(offset_hours * 3600).expect("valid offset");

        assert_eq!(
            ResetBoundary::remaining(at(now).with_timezone(&offset)),
            expected
        );
    }

    #[test]
    fn local_window_matches_local_clock() {
        let now = Utc::now();

        assert_eq!(
            ResetBoundary::Local.seconds_until_reset(now),
            ResetBoundary::remaining(now.with_timezone(&Local))
        );
    }

    #[test]
    fn local_window_is_within_a_day() {
        let seconds = ResetBoundary::Local.seconds_until_reset(Utc::now());

        assert!((1..=86_399).contains(&seconds));
    }
}
