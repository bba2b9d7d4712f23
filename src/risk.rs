use crate::aggregate::{EventCounts, MemberActivity};
use crate::models::{HealthRisk, RiskKind};
use crate::window::{TimeWindows, INACTIVITY_DAYS};

/// Minimum fall in attendance rate between half-windows that raises a flag,
/// in percentage points (0.30).
pub const ATTENDANCE_DROP_THRESHOLD_POINTS: usize = 30;
/// How many of the newest qualifying events the non-response check inspects.
pub const RSVP_LOOKBACK_EVENTS: usize = 3;

pub fn attendance_drop(activity: &MemberActivity, counts: &EventCounts) -> Option<HealthRisk> {
    if counts.recent == 0 || counts.previous == 0 {
        return None;
    }

    let recent_hits = activity.recent_present.len();
    let prev_hits = activity.prev_present.len();
    if prev_hits == 0 {
        return None;
    }

    // prev/p - recent/r >= T/100, cross-multiplied so the boundary is exact.
    let prev_scaled = prev_hits * counts.recent;
    let recent_scaled = recent_hits * counts.previous;
    let diff = prev_scaled.checked_sub(recent_scaled)?;
    if 100 * diff < ATTENDANCE_DROP_THRESHOLD_POINTS * counts.previous * counts.recent {
        return None;
    }

    let drop =
        prev_hits as f64 / counts.previous as f64 - recent_hits as f64 / counts.recent as f64;
    let points = (drop * 100.0).round() as u32;
    Some(HealthRisk {
        kind: RiskKind::AttendanceDrop,
        label: format!("Attendance rate down {points}%p"),
    })
}

pub fn inactivity(activity: &MemberActivity, windows: &TimeWindows) -> Option<HealthRisk> {
    if !windows.is_stale(activity.last_active_at) {
        return None;
    }

    Some(HealthRisk {
        kind: RiskKind::Inactive14Days,
        label: format!("No activity for {INACTIVITY_DAYS}+ days"),
    })
}

pub fn rsvp_no_response(activity: &MemberActivity) -> Option<HealthRisk> {
    match activity.last3_responded {
        Some(false) => Some(HealthRisk {
            kind: RiskKind::RsvpNoResponse,
            label: format!("No RSVP for the last {RSVP_LOOKBACK_EVENTS} events"),
        }),
        _ => None,
    }
}

/// Runs every check independently; a member may carry any subset.
pub fn detect_risks(
    activity: &MemberActivity,
    counts: &EventCounts,
    windows: &TimeWindows,
) -> Vec<HealthRisk> {
    [
        attendance_drop(activity, counts),
        inactivity(activity, windows),
        rsvp_no_response(activity),
    ]
    .into_iter()
    .flatten()
    .collect()
}
