/// Search Interval Module
///
/// Decides whether a recurring search is due to run. Each search is anchored
/// to a local start-of-day hour in its own timezone and divided into fixed
/// interval buckets; a search is due once a new bucket has opened since the
/// last completed run.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::fmt::pretty_seconds;

/// The set of supported interval widths, in hours. Each divides a day evenly.
pub const ALLOWED_INTERVALS: [u32; 8] = [1, 2, 3, 4, 6, 8, 12, 24];

/// Extra days of boundaries generated backward from today's anchor, so there
/// is always a full bucket to compare against near local midnight.
pub const LOOKBACK_DAYS: i64 = 1;

/// One search's recurring window configuration, read fresh from the registry
/// on every evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSchedule {
    /// Local hour of day [0, 23] anchoring the first interval boundary.
    pub start_hour: u32,
    /// Bucket width in hours, one of [`ALLOWED_INTERVALS`].
    pub interval_hour: u32,
    /// Unix timestamp (seconds) of the most recent completed run, 0 if never.
    pub last_run: i64,
    /// IANA zone the start hour is expressed in.
    pub time_zone: Tz,
}

/// Resolve a naive local time to an absolute instant in `time_zone`.
///
/// Ambiguous wall-clock times (clocks rolled back) take the earliest offset.
/// Wall-clock times erased by a DST gap roll forward to the next hour that
/// exists.
fn resolve_local(time_zone: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match time_zone.from_local_datetime(&naive) {
        LocalResult::Single(instant) => Some(instant),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            let mut probe = naive;
            for _ in 0..3 {
                probe = probe + Duration::hours(1);
                match time_zone.from_local_datetime(&probe) {
                    LocalResult::Single(instant) => return Some(instant),
                    LocalResult::Ambiguous(earliest, _) => return Some(earliest),
                    LocalResult::None => continue,
                }
            }
            None
        }
    }
}

/// Compute today's anchor: `now` localized to `time_zone` with the time of
/// day replaced by `(start_hour, 0, 0)`. The anchor may be before or after
/// `now` depending on whether the local hour has passed `start_hour`.
///
/// Returns `None` only for an out-of-range start hour.
pub fn start_of_day_anchor(
    now: DateTime<Utc>,
    start_hour: u32,
    time_zone: Tz,
) -> Option<DateTime<Tz>> {
    let local_date = now.with_timezone(&time_zone).date_naive();
    let start = local_date.and_hms_opt(start_hour, 0, 0)?;
    resolve_local(&time_zone, start)
}

/// Generate the boundary sequence for one evaluation: starting one local
/// calendar day before the anchor, step forward `interval_hour` wall-clock
/// hours at a time.
///
/// Spacing is wall-clock, not elapsed seconds, so boundaries land on the same
/// local hours on both sides of a DST transition.
pub fn generate_boundaries(anchor: DateTime<Tz>, interval_hour: u32) -> Vec<DateTime<Utc>> {
    let time_zone = anchor.timezone();
    let window_start = anchor.naive_local() - Duration::days(LOOKBACK_DAYS);

    let num_intervals = 24 / interval_hour as i64;
    // we want at least 2 boundaries to check against
    let count = ((LOOKBACK_DAYS + 1) * num_intervals).max(2);

    let mut boundaries: Vec<DateTime<Utc>> = Vec::with_capacity(count as usize);
    for i in 0..count {
        let naive = window_start + Duration::hours(i * interval_hour as i64);
        let instant = match resolve_local(&time_zone, naive) {
            Some(instant) => instant.with_timezone(&Utc),
            None => continue,
        };

        // a DST gap can map two adjacent wall-clock times onto one instant
        if boundaries.last().map_or(true, |last| *last < instant) {
            boundaries.push(instant);
        }
    }

    boundaries
}

/// Find the rightmost boundary at or before `now`.
///
/// A singleton sequence returns its only element regardless of ordering
/// against `now`. Returns `None` when `now` precedes every boundary, which
/// the caller treats as "no reference boundary yet".
pub fn last_boundary_at_or_before(
    boundaries: &[DateTime<Utc>],
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if boundaries.len() == 1 {
        return Some(boundaries[0]);
    }

    boundaries.iter().rev().find(|boundary| **boundary <= now).copied()
}

/// Decide whether a new interval bucket has opened since the schedule's last
/// run.
///
/// Never panics and never errors: an unsupported interval, an out-of-range
/// start hour, or a last-run timestamp in the future (clock skew, corrupted
/// record) all log a warning and report not due.
pub fn is_due(now: DateTime<Utc>, schedule: &SearchSchedule) -> bool {
    if !ALLOWED_INTERVALS.contains(&schedule.interval_hour) {
        log::warn!(
            "Invalid interval: {}. Valid intervals: {:?}",
            schedule.interval_hour,
            ALLOWED_INTERVALS
        );
        return false;
    }

    if schedule.last_run > now.timestamp() {
        log::warn!("Last run time is in the future, skipping");
        return false;
    }

    let anchor = match start_of_day_anchor(now, schedule.start_hour, schedule.time_zone) {
        Some(anchor) => anchor,
        None => {
            log::warn!("Invalid start hour: {}, skipping", schedule.start_hour);
            return false;
        }
    };

    let boundaries = generate_boundaries(anchor, schedule.interval_hour);

    let last_boundary = match last_boundary_at_or_before(&boundaries, now) {
        Some(boundary) => boundary,
        // no reference boundary yet, treat as due
        None => return true,
    };

    log::debug!(
        "Current bucket opened {} ago, last run {} ago",
        pretty_seconds((now.timestamp() - last_boundary.timestamp()).max(0) as u64, false),
        pretty_seconds((now.timestamp() - schedule.last_run).max(0) as u64, false),
    );

    // due only once the last run predates the start of the current bucket
    schedule.last_run < last_boundary.timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Los_Angeles;
    use chrono_tz::America::New_York;
    use chrono_tz::UTC;

    fn at(
        time_zone: Tz,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> DateTime<Utc> {
        time_zone
            .with_ymd_and_hms(year, month, day, hour, minute, second)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn schedule(start_hour: u32, interval_hour: u32, last_run: i64, time_zone: Tz) -> SearchSchedule {
        SearchSchedule {
            start_hour,
            interval_hour,
            last_run,
            time_zone,
        }
    }

    #[test]
    fn due_when_last_run_one_interval_back() {
        for &interval in ALLOWED_INTERVALS.iter() {
            for start_hour in [0, 6, 23] {
                let anchor = at(UTC, 2023, 5, 10, start_hour, 0, 0);
                let now = anchor + Duration::hours(interval as i64);
                let last_run = (now - Duration::hours(interval as i64)).timestamp();

                assert!(
                    is_due(now, &schedule(start_hour, interval, last_run, UTC)),
                    "interval={} start_hour={}",
                    interval,
                    start_hour
                );
            }
        }
    }

    #[test]
    fn not_due_when_last_run_in_current_bucket() {
        for &interval in ALLOWED_INTERVALS.iter() {
            let anchor = at(UTC, 2023, 5, 10, 8, 0, 0);
            let now = anchor + Duration::hours(interval as i64) - Duration::seconds(1);
            let last_run = (anchor + Duration::minutes(1)).timestamp();

            assert!(
                !is_due(now, &schedule(8, interval, last_run, UTC)),
                "interval={}",
                interval
            );
        }
    }

    #[test]
    fn decision_is_idempotent() {
        let now = at(UTC, 2023, 5, 10, 14, 30, 0);
        let sched = schedule(6, 4, at(UTC, 2023, 5, 10, 9, 0, 0).timestamp(), UTC);

        let first = is_due(now, &sched);
        let second = is_due(now, &sched);
        assert_eq!(first, second);
        assert!(first);
    }

    #[test]
    fn bucket_containing_now_starts_at_now_on_exact_boundary() {
        // now lands exactly on a boundary: that boundary is the bucket start
        let now = at(UTC, 2023, 5, 10, 12, 0, 0);

        // last run in the previous bucket
        let last_run = at(UTC, 2023, 5, 10, 11, 59, 59).timestamp();
        assert!(is_due(now, &schedule(6, 6, last_run, UTC)));

        // last run exactly at the new boundary counts as inside it
        assert!(!is_due(now, &schedule(6, 6, now.timestamp(), UTC)));
    }

    #[test]
    fn invalid_interval_is_never_due() {
        let now = at(UTC, 2023, 5, 10, 12, 0, 0);
        for interval in [0, 5, 7, 9, 48] {
            assert!(!is_due(now, &schedule(6, interval, 0, UTC)));
        }
    }

    #[test]
    fn future_last_run_is_never_due() {
        let now = at(UTC, 2023, 5, 10, 12, 0, 0);
        let last_run = now.timestamp() + 3600;
        assert!(!is_due(now, &schedule(6, 1, last_run, UTC)));
    }

    #[test]
    fn out_of_range_start_hour_is_never_due() {
        let now = at(UTC, 2023, 5, 10, 12, 0, 0);
        assert!(!is_due(now, &schedule(24, 6, 0, UTC)));
    }

    #[test]
    fn never_run_schedule_is_due() {
        let now = at(UTC, 2023, 5, 10, 3, 0, 0);
        assert!(is_due(now, &schedule(6, 6, 0, UTC)));
    }

    #[test]
    fn six_hour_buckets_in_los_angeles() {
        let last_run = at(Los_Angeles, 2023, 1, 1, 6, 0, 0).timestamp();
        let sched = schedule(6, 6, last_run, Los_Angeles);

        // still inside the 06:00-12:00 bucket
        let now = at(Los_Angeles, 2023, 1, 1, 11, 59, 59);
        assert!(!is_due(now, &sched));

        // the 12:00 bucket just opened
        let now = at(Los_Angeles, 2023, 1, 1, 12, 0, 0);
        assert!(is_due(now, &sched));
    }

    #[test]
    fn singleton_sequence_returns_its_only_boundary() {
        let boundary = at(UTC, 2023, 5, 10, 6, 0, 0);
        let before = boundary - Duration::hours(2);

        assert_eq!(
            last_boundary_at_or_before(&[boundary], before),
            Some(boundary)
        );
    }

    #[test]
    fn no_boundary_found_when_now_precedes_all() {
        let first = at(UTC, 2023, 5, 10, 6, 0, 0);
        let second = at(UTC, 2023, 5, 10, 12, 0, 0);
        let now = first - Duration::seconds(1);

        assert_eq!(last_boundary_at_or_before(&[first, second], now), None);
        assert_eq!(last_boundary_at_or_before(&[], now), None);
    }

    #[test]
    fn daily_interval_produces_a_decision() {
        let now = at(UTC, 2023, 5, 10, 5, 0, 0);

        // last run inside the bucket that opened yesterday at 06:00
        let last_run = at(UTC, 2023, 5, 9, 6, 30, 0).timestamp();
        assert!(!is_due(now, &schedule(6, 24, last_run, UTC)));

        // last run before yesterday's boundary
        let last_run = at(UTC, 2023, 5, 9, 5, 0, 0).timestamp();
        assert!(is_due(now, &schedule(6, 24, last_run, UTC)));
    }

    #[test]
    fn boundaries_wrap_across_local_midnight() {
        let anchor = start_of_day_anchor(at(New_York, 2023, 5, 10, 3, 0, 0), 22, New_York).unwrap();
        let boundaries = generate_boundaries(anchor, 4);

        assert_eq!(boundaries.len(), 12);
        assert_eq!(boundaries[0], at(New_York, 2023, 5, 9, 22, 0, 0));
        assert_eq!(boundaries[1], at(New_York, 2023, 5, 10, 2, 0, 0));
        assert_eq!(boundaries[2], at(New_York, 2023, 5, 10, 6, 0, 0));

        // last run in the 22:00-02:00 bucket, now past 02:00
        let now = at(New_York, 2023, 5, 10, 3, 0, 0);
        let last_run = at(New_York, 2023, 5, 9, 23, 0, 0).timestamp();
        assert!(is_due(now, &schedule(22, 4, last_run, New_York)));

        // last run after the 02:00 boundary
        let last_run = at(New_York, 2023, 5, 10, 2, 30, 0).timestamp();
        assert!(!is_due(now, &schedule(22, 4, last_run, New_York)));
    }

    #[test]
    fn boundaries_keep_wall_clock_hours_across_spring_forward() {
        // US spring forward: 2023-03-12 02:00 -> 03:00 in Los Angeles
        let now = at(Los_Angeles, 2023, 3, 12, 7, 0, 0);
        let anchor = start_of_day_anchor(now, 6, Los_Angeles).unwrap();
        let boundaries = generate_boundaries(anchor, 6);

        // the boundary after the transition still lands on 06:00 local
        assert_eq!(boundaries[0], at(Los_Angeles, 2023, 3, 11, 6, 0, 0));
        assert_eq!(boundaries[4], at(Los_Angeles, 2023, 3, 12, 6, 0, 0));

        // only 5 elapsed hours between the 00:00 and 06:00 boundaries
        assert_eq!(boundaries[4] - boundaries[3], Duration::hours(5));

        let last_run = at(Los_Angeles, 2023, 3, 12, 0, 30, 0).timestamp();
        assert!(is_due(now, &schedule(6, 6, last_run, Los_Angeles)));
    }

    #[test]
    fn gap_erased_boundary_rolls_forward_without_duplicates() {
        // hourly boundaries straddling the 02:00 gap: 02:00 rolls to 03:00,
        // which would collide with the real 03:00 boundary
        let now = at(Los_Angeles, 2023, 3, 12, 12, 0, 0);
        let anchor = start_of_day_anchor(now, 0, Los_Angeles).unwrap();
        let boundaries = generate_boundaries(anchor, 1);

        for pair in boundaries.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn fall_back_boundaries_stay_strictly_increasing() {
        // US fall back: 2023-11-05 02:00 -> 01:00 in Los Angeles
        let now = at(Los_Angeles, 2023, 11, 5, 12, 30, 0);
        let anchor = start_of_day_anchor(now, 0, Los_Angeles).unwrap();
        let boundaries = generate_boundaries(anchor, 1);

        for pair in boundaries.windows(2) {
            assert!(pair[0] < pair[1]);
        }

        // last run inside the bucket that opened at 12:00
        let sched = schedule(0, 1, at(Los_Angeles, 2023, 11, 5, 12, 5, 0).timestamp(), Los_Angeles);
        assert!(!is_due(now, &sched));
    }
}
