//! Result assembly and the public evaluation entry point.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::error::EngineError;
use crate::fetcher::{collect_snapshot, ActivityFetcher};
use crate::models::{
    ActivitySnapshot, HealthGrade, MemberHealthScoreItem, MemberHealthScoreResult,
};
use crate::risk::{detect_risks, RSVP_LOOKBACK_EVENTS};
use crate::score::score_member;
use crate::window::TimeWindows;

/// Scores an already-collected snapshot. Pure: the same snapshot and `now`
/// always give the same result.
pub fn score_snapshot(snapshot: &ActivitySnapshot, now: DateTime<Utc>) -> MemberHealthScoreResult {
    if snapshot.roster.is_empty() {
        return MemberHealthScoreResult::empty();
    }

    let windows = TimeWindows::at(now);
    let aggregation = aggregate(snapshot, &windows, RSVP_LOOKBACK_EVENTS);

    let mut members: Vec<MemberHealthScoreItem> = aggregation
        .members
        .iter()
        .map(|(member, activity)| {
            let metrics = score_member(activity, &aggregation.counts, windows.now);
            let total_score = metrics.total();
            MemberHealthScoreItem {
                user_id: member.user_id,
                name: member.display_name(),
                avatar_url: member.avatar_url.clone(),
                total_score,
                grade: HealthGrade::from_score(total_score),
                metrics,
                risks: detect_risks(activity, &aggregation.counts, &windows),
            }
        })
        .collect();

    // stable: ties keep roster order
    members.sort_by_key(|item| item.total_score);

    let sum: u64 = members.iter().map(|item| u64::from(item.total_score)).sum();
    let average_score = (sum as f64 / members.len() as f64).round() as u32;
    let at_risk_count = members.iter().filter(|item| !item.risks.is_empty()).count();

    MemberHealthScoreResult {
        members,
        average_score,
        at_risk_count,
        has_data: true,
    }
}

/// Collects one group's activity through `fetcher` and scores it.
pub async fn evaluate_group_health<F: ActivityFetcher>(
    fetcher: &F,
    group_id: Uuid,
    now: DateTime<Utc>,
) -> Result<MemberHealthScoreResult, EngineError> {
    let windows = TimeWindows::at(now);
    let snapshot = collect_snapshot(fetcher, group_id, &windows).await?;
    let result = score_snapshot(&snapshot, now);

    info!(
        %group_id,
        now = %windows.now_iso(),
        members = result.members.len(),
        average_score = result.average_score,
        at_risk = result.at_risk_count,
        "group health evaluated"
    );

    Ok(result)
}

/// Same as [`evaluate_group_health`], cancelled as a unit once `deadline`
/// elapses. A zero deadline disables the limit.
pub async fn evaluate_with_deadline<F: ActivityFetcher>(
    fetcher: &F,
    group_id: Uuid,
    now: DateTime<Utc>,
    deadline: Duration,
) -> Result<MemberHealthScoreResult, EngineError> {
    if deadline.is_zero() {
        return evaluate_group_health(fetcher, group_id, now).await;
    }

    tokio::time::timeout(deadline, evaluate_group_health(fetcher, group_id, now))
        .await
        .map_err(|_| EngineError::Timeout { deadline })?
}
