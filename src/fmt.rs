/// Formatting helpers for log output.

/// Render a second count as `1h:02m:03s`, or `1d:1h:02m:03s` with
/// `use_days` set.
pub fn pretty_seconds(seconds: u64, use_days: bool) -> String {
    let (minutes, seconds) = (seconds / 60, seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);

    if use_days {
        let (days, hours) = (hours / 24, hours % 24);
        format!("{}d:{}h:{:02}m:{:02}s", days, hours, minutes, seconds)
    } else {
        format!("{}h:{:02}m:{:02}s", hours, minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(pretty_seconds(0, false), "0h:00m:00s");
        assert_eq!(pretty_seconds(59, false), "0h:00m:59s");
        assert_eq!(pretty_seconds(3723, false), "1h:02m:03s");
        assert_eq!(pretty_seconds(90000, false), "25h:00m:00s");
    }

    #[test]
    fn formats_days_when_requested() {
        assert_eq!(pretty_seconds(90000, true), "1d:1h:00m:00s");
        assert_eq!(pretty_seconds(3723, true), "0d:1h:02m:03s");
    }
}
