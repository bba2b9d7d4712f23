//! Folds raw activity rows into per-member counts.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ActivitySnapshot, BoardActivity, Member, QualifyingEvent};
use crate::window::TimeWindows;

/// Group-wide event counts shared by every member of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventCounts {
    pub total: usize,
    pub recent: usize,
    pub previous: usize,
    /// Number of latest events found without a window floor.
    pub latest: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemberActivity {
    pub present: HashSet<Uuid>,
    pub recent_present: HashSet<Uuid>,
    pub prev_present: HashSet<Uuid>,
    pub responded: HashSet<Uuid>,
    /// `None` when fewer than the required number of latest events exist.
    pub last3_responded: Option<bool>,
    pub board_total: usize,
    pub board_recent7: usize,
    pub board_prev7: usize,
    pub last_active_at: Option<DateTime<Utc>>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl MemberActivity {
    fn touch(&mut self, at: DateTime<Utc>) {
        self.last_active_at = Some(match self.last_active_at {
            Some(current) => current.max(at),
            None => at,
        });
    }
}

/// Per-member activity for a whole roster, in roster order.
#[derive(Debug, Clone)]
pub struct Aggregation<'a> {
    pub counts: EventCounts,
    pub members: Vec<(&'a Member, MemberActivity)>,
}

pub fn aggregate<'a>(
    snapshot: &'a ActivitySnapshot,
    windows: &TimeWindows,
    required_latest: usize,
) -> Aggregation<'a> {
    let events: HashMap<Uuid, &QualifyingEvent> = snapshot
        .events
        .iter()
        .filter(|event| windows.in_window(event.starts_at))
        .map(|event| (event.id, event))
        .collect();

    let counts = EventCounts {
        total: events.len(),
        recent: events
            .values()
            .filter(|event| windows.in_recent_half(event.starts_at))
            .count(),
        previous: events
            .values()
            .filter(|event| windows.in_previous_half(event.starts_at))
            .count(),
        latest: snapshot.latest_event_ids.len(),
    };

    let mut by_member: HashMap<Uuid, MemberActivity> = snapshot
        .roster
        .iter()
        .map(|member| {
            let activity = MemberActivity {
                joined_at: member.joined_at,
                ..MemberActivity::default()
            };
            (member.user_id, activity)
        })
        .collect();

    for mark in &snapshot.marks {
        if !mark.status.attended() {
            continue;
        }
        let (Some(activity), Some(event)) =
            (by_member.get_mut(&mark.user_id), events.get(&mark.event_id))
        else {
            continue;
        };
        activity.present.insert(event.id);
        if windows.in_recent_half(event.starts_at) {
            activity.recent_present.insert(event.id);
        } else if windows.in_previous_half(event.starts_at) {
            activity.prev_present.insert(event.id);
        }
        activity.touch(event.starts_at);
    }

    let mut responded_latest: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
    let latest: HashSet<Uuid> = snapshot.latest_event_ids.iter().copied().collect();
    for response in &snapshot.responses {
        let Some(activity) = by_member.get_mut(&response.user_id) else {
            continue;
        };
        if events.contains_key(&response.event_id) {
            activity.responded.insert(response.event_id);
        }
        if latest.contains(&response.event_id) {
            responded_latest
                .entry(response.user_id)
                .or_default()
                .insert(response.event_id);
        }
    }

    let board = snapshot
        .posts
        .iter()
        .map(BoardActivity::from)
        .chain(snapshot.comments.iter().cloned());
    for item in board {
        if !windows.in_window(item.created_at) {
            continue;
        }
        let Some(activity) = by_member.get_mut(&item.author_id) else {
            continue;
        };
        activity.board_total += 1;
        if windows.in_recent_week(item.created_at) {
            activity.board_recent7 += 1;
        } else if windows.in_previous_week(item.created_at) {
            activity.board_prev7 += 1;
        }
        activity.touch(item.created_at);
    }

    let latest_checkable = latest.len() >= required_latest;
    let members = snapshot
        .roster
        .iter()
        .map(|member| {
            let mut activity = by_member.get(&member.user_id).cloned().unwrap_or_default();
            if latest_checkable {
                let answered = responded_latest
                    .get(&member.user_id)
                    .map_or(0, |ids| ids.len());
                activity.last3_responded = Some(answered == latest.len());
            }
            (member, activity)
        })
        .collect();

    Aggregation { counts, members }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceMark, AttendanceStatus, BoardPost, ResponseRecord};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap()
    }

    fn member(user_id: Uuid) -> Member {
        Member {
            user_id,
            name: Some("Jules Moreno".to_string()),
            avatar_url: None,
            joined_at: Some(now() - Duration::days(90)),
        }
    }

    fn event(days_ago: i64) -> QualifyingEvent {
        QualifyingEvent {
            id: Uuid::new_v4(),
            starts_at: now() - Duration::days(days_ago),
        }
    }

    fn mark(user_id: Uuid, event: &QualifyingEvent, status: AttendanceStatus) -> AttendanceMark {
        AttendanceMark {
            user_id,
            event_id: event.id,
            status,
        }
    }

    #[test]
    fn splits_attendance_between_half_windows() {
        let user = Uuid::new_v4();
        let recent = event(3);
        let previous = event(20);
        let absent = event(10);
        let snapshot = ActivitySnapshot {
            roster: vec![member(user)],
            events: vec![recent.clone(), previous.clone(), absent.clone()],
            marks: vec![
                mark(user, &recent, AttendanceStatus::Late),
                mark(user, &previous, AttendanceStatus::Present),
                mark(user, &absent, AttendanceStatus::Absent),
            ],
            ..ActivitySnapshot::default()
        };

        let aggregation = aggregate(&snapshot, &TimeWindows::at(now()), 3);
        assert_eq!(aggregation.counts.total, 3);
        assert_eq!(aggregation.counts.recent, 2);
        assert_eq!(aggregation.counts.previous, 1);

        let (_, activity) = &aggregation.members[0];
        assert_eq!(activity.present.len(), 2);
        assert!(activity.recent_present.contains(&recent.id));
        assert!(activity.prev_present.contains(&previous.id));
        assert_eq!(activity.last_active_at, Some(recent.starts_at));
    }

    #[test]
    fn counts_posts_and_comments_by_week() {
        let user = Uuid::new_v4();
        let snapshot = ActivitySnapshot {
            roster: vec![member(user)],
            posts: vec![BoardPost {
                id: Uuid::new_v4(),
                author_id: user,
                created_at: now() - Duration::days(2),
            }],
            comments: vec![
                BoardActivity {
                    author_id: user,
                    created_at: now() - Duration::days(9),
                },
                BoardActivity {
                    author_id: user,
                    created_at: now() - Duration::days(20),
                },
            ],
            ..ActivitySnapshot::default()
        };

        let aggregation = aggregate(&snapshot, &TimeWindows::at(now()), 3);
        let (_, activity) = &aggregation.members[0];
        assert_eq!(activity.board_total, 3);
        assert_eq!(activity.board_recent7, 1);
        assert_eq!(activity.board_prev7, 1);
        assert_eq!(activity.last_active_at, Some(now() - Duration::days(2)));
    }

    #[test]
    fn latest_response_check_is_skipped_with_too_few_events() {
        let user = Uuid::new_v4();
        let only = event(5);
        let snapshot = ActivitySnapshot {
            roster: vec![member(user)],
            events: vec![only.clone()],
            latest_event_ids: vec![only.id],
            responses: vec![ResponseRecord {
                user_id: user,
                event_id: only.id,
            }],
            ..ActivitySnapshot::default()
        };

        let aggregation = aggregate(&snapshot, &TimeWindows::at(now()), 3);
        let (_, activity) = &aggregation.members[0];
        assert_eq!(activity.last3_responded, None);
        assert_eq!(activity.responded.len(), 1);
    }

    #[test]
    fn latest_response_check_sees_events_outside_window() {
        let user = Uuid::new_v4();
        let latest_ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let snapshot = ActivitySnapshot {
            roster: vec![member(user)],
            latest_event_ids: latest_ids.clone(),
            responses: latest_ids
                .iter()
                .map(|id| ResponseRecord {
                    user_id: user,
                    event_id: *id,
                })
                .collect(),
            ..ActivitySnapshot::default()
        };

        let aggregation = aggregate(&snapshot, &TimeWindows::at(now()), 3);
        let (_, activity) = &aggregation.members[0];
        assert_eq!(activity.last3_responded, Some(true));
        assert!(activity.responded.is_empty());
    }

    #[test]
    fn members_without_activity_keep_roster_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let snapshot = ActivitySnapshot {
            roster: vec![member(first), member(second)],
            ..ActivitySnapshot::default()
        };

        let aggregation = aggregate(&snapshot, &TimeWindows::at(now()), 3);
        let ids: Vec<Uuid> = aggregation.members.iter().map(|(m, _)| m.user_id).collect();
        assert_eq!(ids, vec![first, second]);
        assert!(aggregation.members[1].1.last_active_at.is_none());
    }
}
