use chrono::{DateTime, Duration, Utc};

pub const WINDOW_DAYS: i64 = 30;
pub const HALF_WINDOW_DAYS: i64 = 15;
pub const INACTIVITY_DAYS: i64 = 14;
pub const RECENT_WEEK_DAYS: i64 = 7;

/// Absolute cutoffs derived from one evaluation instant.
///
/// Every comparison in the engine goes through these so that a single run
/// never mixes boundaries computed at different times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindows {
    pub now: DateTime<Utc>,
    pub t30: DateTime<Utc>,
    pub t15: DateTime<Utc>,
    pub t14: DateTime<Utc>,
    pub t7: DateTime<Utc>,
}

impl TimeWindows {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            t30: now - Duration::days(WINDOW_DAYS),
            t15: now - Duration::days(HALF_WINDOW_DAYS),
            t14: now - Duration::days(INACTIVITY_DAYS),
            t7: now - Duration::days(RECENT_WEEK_DAYS),
        }
    }

    /// `now` as an RFC 3339 string, the form handed to collaborators.
    pub fn now_iso(&self) -> String {
        self.now.to_rfc3339()
    }

    /// `[t30, now]`
    pub fn in_window(&self, at: DateTime<Utc>) -> bool {
        at >= self.t30 && at <= self.now
    }

    /// Recent attendance half-window: `startsAt >= t15`.
    pub fn in_recent_half(&self, starts_at: DateTime<Utc>) -> bool {
        starts_at >= self.t15
    }

    /// Previous attendance half-window: `t30 <= startsAt < t15`.
    pub fn in_previous_half(&self, starts_at: DateTime<Utc>) -> bool {
        starts_at >= self.t30 && starts_at < self.t15
    }

    /// Recent board week: `createdAt >= t7`.
    pub fn in_recent_week(&self, created_at: DateTime<Utc>) -> bool {
        created_at >= self.t7
    }

    /// Previous board week: `t14 <= createdAt < t7`.
    pub fn in_previous_week(&self, created_at: DateTime<Utc>) -> bool {
        created_at >= self.t14 && created_at < self.t7
    }

    pub fn is_stale(&self, last_active_at: Option<DateTime<Utc>>) -> bool {
        match last_active_at {
            Some(at) => at < self.t14,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn windows() -> TimeWindows {
        TimeWindows::at(Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap())
    }

    #[test]
    fn cutoffs_are_whole_days_before_now() {
        let w = windows();
        assert_eq!(w.t30, Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(w.t15, Utc.with_ymd_and_hms(2026, 3, 16, 12, 0, 0).unwrap());
        assert_eq!(w.t14, Utc.with_ymd_and_hms(2026, 3, 17, 12, 0, 0).unwrap());
        assert_eq!(w.t7, Utc.with_ymd_and_hms(2026, 3, 24, 12, 0, 0).unwrap());
        assert_eq!(w.now_iso(), "2026-03-31T12:00:00+00:00");
    }

    #[test]
    fn half_window_boundary_belongs_to_recent() {
        let w = windows();
        assert!(w.in_recent_half(w.t15));
        assert!(!w.in_previous_half(w.t15));
        assert!(w.in_previous_half(w.t30));
        assert!(!w.in_previous_half(w.t30 - Duration::seconds(1)));
    }

    #[test]
    fn previous_week_starts_at_fourteen_day_cutoff() {
        let w = windows();
        assert!(w.in_recent_week(w.t7));
        assert!(!w.in_previous_week(w.t7));
        assert!(w.in_previous_week(w.t14));
        assert!(!w.in_previous_week(w.t14 - Duration::seconds(1)));
    }

    #[test]
    fn window_is_closed_on_both_ends() {
        let w = windows();
        assert!(w.in_window(w.t30));
        assert!(w.in_window(w.now));
        assert!(!w.in_window(w.now + Duration::seconds(1)));
    }

    #[test]
    fn staleness_uses_fourteen_day_cutoff() {
        let w = windows();
        assert!(w.is_stale(None));
        assert!(w.is_stale(Some(w.t14 - Duration::seconds(1))));
        assert!(!w.is_stale(Some(w.t14)));
    }
}
