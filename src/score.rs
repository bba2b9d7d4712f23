//! Sub-score formulas. Each metric lands in `0..=20`.

use chrono::{DateTime, Utc};

use crate::aggregate::{EventCounts, MemberActivity};
use crate::models::MemberHealthMetrics;

pub const METRIC_MAX: u32 = 20;
/// Attendance and RSVP score when the window holds no qualifying events.
pub const NO_EVENTS_SCORE: u32 = 10;
/// Posts plus comments in 30 days that earn the full board score.
pub const BOARD_CAP_ACTIONS: f64 = 10.0;
/// Combined actions per membership month that earn the full longevity score.
pub const LONGEVITY_CAP_ACTIONS_PER_MONTH: f64 = 5.0;
pub const DAYS_PER_MONTH: f64 = 30.0;
/// Floor for membership months: a single day.
pub const MIN_JOIN_MONTHS: f64 = 1.0 / DAYS_PER_MONTH;
/// Recent-activity score when neither comparison period saw any activity.
pub const IDLE_RECENT_SCORE: u32 = 5;
pub const RECENT_BASELINE: f64 = 10.0;
/// Bonus points per unit of recent activity relative to the previous week.
pub const RECENT_GROWTH_WEIGHT: f64 = 5.0;

fn round_score(value: f64) -> u32 {
    value.round().clamp(0.0, METRIC_MAX as f64) as u32
}

fn ratio_score(hits: usize, total: usize) -> u32 {
    if total == 0 {
        return NO_EVENTS_SCORE;
    }
    round_score(METRIC_MAX as f64 * hits as f64 / total as f64)
}

pub fn attendance_score(activity: &MemberActivity, counts: &EventCounts) -> u32 {
    ratio_score(activity.present.len(), counts.total)
}

pub fn rsvp_score(activity: &MemberActivity, counts: &EventCounts) -> u32 {
    ratio_score(activity.responded.len(), counts.total)
}

pub fn board_score(board_total: usize) -> u32 {
    round_score(METRIC_MAX as f64 * board_total as f64 / BOARD_CAP_ACTIONS)
}

/// Whole days of membership, never below one. A missing or future join date
/// counts as joining at `now`.
pub fn days_since_join(joined_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    joined_at
        .map(|joined| (now - joined).num_days())
        .unwrap_or(0)
        .max(1)
}

pub fn longevity_score(activity: &MemberActivity, now: DateTime<Utc>) -> u32 {
    let join_months = (days_since_join(activity.joined_at, now) as f64 / DAYS_PER_MONTH)
        .max(MIN_JOIN_MONTHS);
    let actions = (activity.present.len() + activity.board_total) as f64;
    let actions_per_month = actions / join_months;
    round_score(METRIC_MAX as f64 * actions_per_month / LONGEVITY_CAP_ACTIONS_PER_MONTH)
}

pub fn recent_activity_score(activity: &MemberActivity) -> u32 {
    let recent_total = activity.recent_present.len() + activity.board_recent7;
    let prev_total = activity.prev_present.len() + activity.board_prev7;

    if recent_total == 0 && prev_total == 0 {
        return IDLE_RECENT_SCORE;
    }

    let baseline = prev_total.max(1) as f64;
    if recent_total >= prev_total {
        let growth = (RECENT_GROWTH_WEIGHT * recent_total as f64 / baseline).round();
        round_score(RECENT_BASELINE + growth)
    } else {
        let drop_ratio = (prev_total - recent_total) as f64 / baseline;
        round_score(RECENT_BASELINE - RECENT_BASELINE * drop_ratio)
    }
}

pub fn score_member(
    activity: &MemberActivity,
    counts: &EventCounts,
    now: DateTime<Utc>,
) -> MemberHealthMetrics {
    MemberHealthMetrics {
        attendance: attendance_score(activity, counts),
        rsvp: rsvp_score(activity, counts),
        board: board_score(activity.board_total),
        longevity: longevity_score(activity, now),
        recent_activity: recent_activity_score(activity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap()
    }

    fn ids(n: usize) -> std::collections::HashSet<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn counts(total: usize) -> EventCounts {
        EventCounts {
            total,
            ..EventCounts::default()
        }
    }

    #[test]
    fn attendance_and_rsvp_fall_back_without_events() {
        let activity = MemberActivity::default();
        assert_eq!(attendance_score(&activity, &counts(0)), 10);
        assert_eq!(rsvp_score(&activity, &counts(0)), 10);
        assert_eq!(attendance_score(&activity, &counts(4)), 0);
    }

    #[test]
    fn attendance_rounds_the_ratio() {
        let activity = MemberActivity {
            present: ids(2),
            responded: ids(1),
            ..MemberActivity::default()
        };
        // 20 * 2/3 = 13.33, 20 * 1/3 = 6.67
        assert_eq!(attendance_score(&activity, &counts(3)), 13);
        assert_eq!(rsvp_score(&activity, &counts(3)), 7);
    }

    #[test]
    fn board_caps_at_ten_actions() {
        assert_eq!(board_score(0), 0);
        assert_eq!(board_score(3), 6);
        assert_eq!(board_score(10), 20);
        assert_eq!(board_score(15), 20);
    }

    #[test]
    fn longevity_scales_by_membership_months() {
        let activity = MemberActivity {
            present: ids(4),
            board_total: 2,
            joined_at: Some(now() - Duration::days(60)),
            ..MemberActivity::default()
        };
        // 6 actions over 2 months = 3/month -> 20 * 3/5 = 12
        assert_eq!(longevity_score(&activity, now()), 12);
    }

    #[test]
    fn missing_or_future_join_date_counts_as_one_day() {
        assert_eq!(days_since_join(None, now()), 1);
        assert_eq!(days_since_join(Some(now() + Duration::days(3)), now()), 1);
        let activity = MemberActivity {
            board_total: 1,
            ..MemberActivity::default()
        };
        assert_eq!(longevity_score(&activity, now()), 20);
        assert_eq!(longevity_score(&MemberActivity::default(), now()), 0);
    }

    #[test]
    fn idle_member_gets_flat_recent_score() {
        assert_eq!(recent_activity_score(&MemberActivity::default()), 5);
    }

    #[test]
    fn growing_activity_scores_above_baseline() {
        let steady = MemberActivity {
            recent_present: ids(2),
            prev_present: ids(2),
            ..MemberActivity::default()
        };
        assert_eq!(recent_activity_score(&steady), 15);

        let fresh = MemberActivity {
            board_recent7: 1,
            ..MemberActivity::default()
        };
        assert_eq!(recent_activity_score(&fresh), 15);

        let surge = MemberActivity {
            recent_present: ids(3),
            board_recent7: 3,
            prev_present: ids(1),
            ..MemberActivity::default()
        };
        assert_eq!(recent_activity_score(&surge), 20);
    }

    #[test]
    fn declining_activity_scores_below_baseline() {
        let halved = MemberActivity {
            recent_present: ids(1),
            prev_present: ids(1),
            board_prev7: 1,
            ..MemberActivity::default()
        };
        assert_eq!(recent_activity_score(&halved), 5);

        let stopped = MemberActivity {
            prev_present: ids(4),
            ..MemberActivity::default()
        };
        assert_eq!(recent_activity_score(&stopped), 0);
    }
}
