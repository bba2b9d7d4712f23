//! Activity collaborator contract and snapshot collection.
//!
//! The engine never talks to storage directly. It asks an [`ActivityFetcher`]
//! for the rows of one group, waits for every query to finish, and only then
//! starts scoring.

use std::collections::HashSet;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{EngineError, FetchError, FetchStage};
use crate::models::{
    ActivitySnapshot, AttendanceMark, BoardActivity, BoardPost, Member, QualifyingEvent,
    ResponseRecord,
};
use crate::risk::RSVP_LOOKBACK_EVENTS;
use crate::window::TimeWindows;

pub trait ActivityFetcher: Sync {
    fn roster(
        &self,
        group_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Member>, FetchError>> + Send;

    /// Events with attendance tracking enabled and `from <= startsAt <= to`.
    fn qualifying_events(
        &self,
        group_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<QualifyingEvent>, FetchError>> + Send;

    /// Ids of the `limit` newest qualifying events starting no later than `up_to`.
    fn latest_events(
        &self,
        group_id: Uuid,
        limit: usize,
        up_to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Uuid>, FetchError>> + Send;

    fn attendance(
        &self,
        event_ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<AttendanceMark>, FetchError>> + Send;

    fn responses(
        &self,
        event_ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<ResponseRecord>, FetchError>> + Send;

    fn posts(
        &self,
        group_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<BoardPost>, FetchError>> + Send;

    fn comments(
        &self,
        post_ids: &[Uuid],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<BoardActivity>, FetchError>> + Send;
}

/// Runs every collaborator query for one group and joins the results.
///
/// Queries without a data dependency run concurrently. Attendance, responses
/// and comments need ids from the first round, so they form a second round.
/// Any failure aborts the whole collection.
pub async fn collect_snapshot<F: ActivityFetcher>(
    fetcher: &F,
    group_id: Uuid,
    windows: &TimeWindows,
) -> Result<ActivitySnapshot, EngineError> {
    let (roster, events, latest_event_ids, posts) = tokio::try_join!(
        async {
            fetcher
                .roster(group_id)
                .await
                .map_err(EngineError::fetch(FetchStage::Roster))
        },
        async {
            fetcher
                .qualifying_events(group_id, windows.t30, windows.now)
                .await
                .map_err(EngineError::fetch(FetchStage::Events))
        },
        async {
            fetcher
                .latest_events(group_id, RSVP_LOOKBACK_EVENTS, windows.now)
                .await
                .map_err(EngineError::fetch(FetchStage::LatestEvents))
        },
        async {
            fetcher
                .posts(group_id, windows.t30, windows.now)
                .await
                .map_err(EngineError::fetch(FetchStage::Posts))
        },
    )?;

    if roster.is_empty() {
        debug!(%group_id, "roster is empty, skipping activity queries");
        return Ok(ActivitySnapshot::default());
    }

    let event_ids: Vec<Uuid> = events.iter().map(|event| event.id).collect();
    let response_ids = union_ids(&event_ids, &latest_event_ids);
    let post_ids: Vec<Uuid> = posts.iter().map(|post| post.id).collect();

    let (marks, responses, comments) = tokio::try_join!(
        async {
            fetcher
                .attendance(&event_ids)
                .await
                .map_err(EngineError::fetch(FetchStage::Attendance))
        },
        async {
            fetcher
                .responses(&response_ids)
                .await
                .map_err(EngineError::fetch(FetchStage::Responses))
        },
        async {
            fetcher
                .comments(&post_ids, windows.t30, windows.now)
                .await
                .map_err(EngineError::fetch(FetchStage::Comments))
        },
    )?;

    debug!(
        %group_id,
        members = roster.len(),
        events = events.len(),
        latest_events = latest_event_ids.len(),
        marks = marks.len(),
        responses = responses.len(),
        posts = posts.len(),
        comments = comments.len(),
        "activity snapshot collected"
    );

    Ok(ActivitySnapshot {
        roster,
        events,
        latest_event_ids,
        marks,
        responses,
        posts,
        comments,
    })
}

fn union_ids(first: &[Uuid], second: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    first
        .iter()
        .chain(second)
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEvent {
    pub id: Uuid,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub attendance_method: Option<String>,
}

impl SnapshotEvent {
    fn qualifies(&self) -> bool {
        tracks_attendance(self.attendance_method.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotComment {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Events whose attendance method is `none` never count toward scoring.
pub fn tracks_attendance(method: Option<&str>) -> bool {
    !matches!(method.map(str::trim), Some(m) if m.eq_ignore_ascii_case("none"))
}

/// Canonical stored form of an attendance method; blank means `manual`.
pub fn normalize_attendance_method(method: Option<&str>) -> String {
    match method.map(str::trim) {
        Some(m) if !m.is_empty() => m.to_ascii_lowercase(),
        _ => "manual".to_string(),
    }
}

/// In-memory collaborator holding the raw rows of a single group.
///
/// The group id passed to each query is ignored; a snapshot file describes
/// exactly one group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotFetcher {
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub events: Vec<SnapshotEvent>,
    #[serde(default)]
    pub attendance: Vec<AttendanceMark>,
    #[serde(default)]
    pub responses: Vec<ResponseRecord>,
    #[serde(default)]
    pub posts: Vec<BoardPost>,
    #[serde(default)]
    pub comments: Vec<SnapshotComment>,
}

impl SnapshotFetcher {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl ActivityFetcher for SnapshotFetcher {
    async fn roster(&self, _group_id: Uuid) -> Result<Vec<Member>, FetchError> {
        Ok(self.members.clone())
    }

    async fn qualifying_events(
        &self,
        _group_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<QualifyingEvent>, FetchError> {
        Ok(self
            .events
            .iter()
            .filter(|event| event.qualifies() && event.starts_at >= from && event.starts_at <= to)
            .map(|event| QualifyingEvent {
                id: event.id,
                starts_at: event.starts_at,
            })
            .collect())
    }

    async fn latest_events(
        &self,
        _group_id: Uuid,
        limit: usize,
        up_to: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, FetchError> {
        let mut events: Vec<&SnapshotEvent> = self
            .events
            .iter()
            .filter(|event| event.qualifies() && event.starts_at <= up_to)
            .collect();
        events.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
        Ok(events.into_iter().take(limit).map(|event| event.id).collect())
    }

    async fn attendance(&self, event_ids: &[Uuid]) -> Result<Vec<AttendanceMark>, FetchError> {
        Ok(self
            .attendance
            .iter()
            .filter(|mark| event_ids.contains(&mark.event_id))
            .cloned()
            .collect())
    }

    async fn responses(&self, event_ids: &[Uuid]) -> Result<Vec<ResponseRecord>, FetchError> {
        Ok(self
            .responses
            .iter()
            .filter(|response| event_ids.contains(&response.event_id))
            .cloned()
            .collect())
    }

    async fn posts(
        &self,
        _group_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BoardPost>, FetchError> {
        Ok(self
            .posts
            .iter()
            .filter(|post| post.created_at >= from && post.created_at <= to)
            .cloned()
            .collect())
    }

    async fn comments(
        &self,
        post_ids: &[Uuid],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BoardActivity>, FetchError> {
        Ok(self
            .comments
            .iter()
            .filter(|comment| {
                post_ids.contains(&comment.post_id)
                    && comment.created_at >= from
                    && comment.created_at <= to
            })
            .map(|comment| BoardActivity {
                author_id: comment.author_id,
                created_at: comment.created_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap()
    }

    fn event(days_ago: i64, method: Option<&str>) -> SnapshotEvent {
        SnapshotEvent {
            id: Uuid::new_v4(),
            starts_at: now() - Duration::days(days_ago),
            attendance_method: method.map(str::to_string),
        }
    }

    #[test]
    fn attendance_method_none_is_not_qualifying() {
        assert!(tracks_attendance(None));
        assert!(tracks_attendance(Some("qr")));
        assert!(!tracks_attendance(Some("none")));
        assert!(!tracks_attendance(Some(" NONE ")));
    }

    #[tokio::test]
    async fn mixed_case_none_events_never_qualify() {
        let fetcher = SnapshotFetcher {
            events: vec![event(2, Some("None")), event(3, Some(" none ")), event(4, Some("QR"))],
            ..SnapshotFetcher::default()
        };
        let windows = TimeWindows::at(now());
        let events = fetcher
            .qualifying_events(Uuid::nil(), windows.t30, windows.now)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);

        for method in ["None", " none ", "NONE"] {
            let stored = normalize_attendance_method(Some(method));
            assert_eq!(stored, "none");
            assert!(!tracks_attendance(Some(&stored)));
        }
        assert_eq!(normalize_attendance_method(Some(" QR ")), "qr");
        assert_eq!(normalize_attendance_method(None), "manual");
    }

    #[tokio::test]
    async fn latest_events_ignore_window_floor_and_future_events() {
        let old = event(60, Some("manual"));
        let older = event(90, Some("manual"));
        let skipped = event(1, Some("none"));
        let future = event(-2, Some("manual"));
        let recent = event(3, None);
        let fetcher = SnapshotFetcher {
            events: vec![older.clone(), old.clone(), skipped, future, recent.clone()],
            ..SnapshotFetcher::default()
        };

        let ids = fetcher.latest_events(Uuid::nil(), 3, now()).await.unwrap();
        assert_eq!(ids, vec![recent.id, old.id, older.id]);
    }

    #[tokio::test]
    async fn comments_are_scoped_to_posts_and_window() {
        let post_id = Uuid::new_v4();
        let author_id = Uuid::new_v4();
        let windows = TimeWindows::at(now());
        let fetcher = SnapshotFetcher {
            comments: vec![
                SnapshotComment {
                    post_id,
                    author_id,
                    created_at: now() - Duration::days(2),
                },
                SnapshotComment {
                    post_id,
                    author_id,
                    created_at: now() - Duration::days(31),
                },
                SnapshotComment {
                    post_id: Uuid::new_v4(),
                    author_id,
                    created_at: now() - Duration::days(2),
                },
            ],
            ..SnapshotFetcher::default()
        };

        let comments = fetcher
            .comments(&[post_id], windows.t30, windows.now)
            .await
            .unwrap();
        assert_eq!(comments.len(), 1);
    }

    #[tokio::test]
    async fn empty_roster_short_circuits_collection() {
        let fetcher = SnapshotFetcher {
            events: vec![event(2, None)],
            ..SnapshotFetcher::default()
        };
        let snapshot = collect_snapshot(&fetcher, Uuid::nil(), &TimeWindows::at(now()))
            .await
            .unwrap();
        assert!(snapshot.roster.is_empty());
        assert!(snapshot.events.is_empty());
    }

    #[test]
    fn union_keeps_first_occurrence_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert_eq!(union_ids(&[a, b], &[b, c]), vec![a, b, c]);
    }

    #[test]
    fn snapshot_json_defaults_missing_tables() {
        let fetcher = SnapshotFetcher::from_json(
            r#"{"members":[{"user_id":"3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2","name":"Avery Lee","avatar_url":null,"joined_at":"2026-01-01T00:00:00Z"}]}"#,
        )
        .unwrap();
        assert_eq!(fetcher.members.len(), 1);
        assert!(fetcher.events.is_empty());
        assert!(fetcher.comments.is_empty());
    }
}
