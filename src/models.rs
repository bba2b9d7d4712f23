use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const UNKNOWN_MEMBER_NAME: &str = "Unknown member";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl Member {
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => UNKNOWN_MEMBER_NAME.to_string(),
        }
    }
}

/// Calendar event with attendance tracking enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualifyingEvent {
    pub id: Uuid,
    pub starts_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    Excused,
    #[serde(other)]
    Unknown,
}

impl AttendanceStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" => Self::Present,
            "late" => Self::Late,
            "absent" => Self::Absent,
            "excused" => Self::Excused,
            _ => Self::Unknown,
        }
    }

    pub fn attended(self) -> bool {
        matches!(self, Self::Present | Self::Late)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceMark {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub status: AttendanceStatus,
}

/// A member acknowledged an event, whatever the answer was.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub user_id: Uuid,
    pub event_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardPost {
    pub id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A post or a comment, reduced to who wrote it and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardActivity {
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&BoardPost> for BoardActivity {
    fn from(post: &BoardPost) -> Self {
        Self {
            author_id: post.author_id,
            created_at: post.created_at,
        }
    }
}

/// Everything one evaluation reads, collected before any scoring starts.
#[derive(Debug, Clone, Default)]
pub struct ActivitySnapshot {
    pub roster: Vec<Member>,
    pub events: Vec<QualifyingEvent>,
    /// Latest qualifying events overall, newest first, no 30-day floor.
    pub latest_event_ids: Vec<Uuid>,
    pub marks: Vec<AttendanceMark>,
    pub responses: Vec<ResponseRecord>,
    pub posts: Vec<BoardPost>,
    pub comments: Vec<BoardActivity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberHealthMetrics {
    pub attendance: u32,
    pub rsvp: u32,
    pub board: u32,
    pub longevity: u32,
    pub recent_activity: u32,
}

impl MemberHealthMetrics {
    pub fn total(&self) -> u32 {
        let sum = self.attendance + self.rsvp + self.board + self.longevity + self.recent_activity;
        sum.min(100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthGrade {
    Danger,
    Warning,
    Good,
    Excellent,
}

impl HealthGrade {
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            Self::Excellent
        } else if score >= 60 {
            Self::Good
        } else if score >= 40 {
            Self::Warning
        } else {
            Self::Danger
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskKind {
    #[serde(rename = "attendance_drop")]
    AttendanceDrop,
    #[serde(rename = "inactive_14days")]
    Inactive14Days,
    #[serde(rename = "rsvp_no_response")]
    RsvpNoResponse,
}

impl RiskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AttendanceDrop => "attendance_drop",
            Self::Inactive14Days => "inactive_14days",
            Self::RsvpNoResponse => "rsvp_no_response",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRisk {
    #[serde(rename = "type")]
    pub kind: RiskKind,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberHealthScoreItem {
    pub user_id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
    pub total_score: u32,
    pub grade: HealthGrade,
    pub metrics: MemberHealthMetrics,
    pub risks: Vec<HealthRisk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberHealthScoreResult {
    pub members: Vec<MemberHealthScoreItem>,
    pub average_score: u32,
    pub at_risk_count: usize,
    pub has_data: bool,
}

impl MemberHealthScoreResult {
    pub fn empty() -> Self {
        Self {
            members: Vec::new(),
            average_score: 0,
            at_risk_count: 0,
            has_data: false,
        }
    }

    pub fn average_grade(&self) -> HealthGrade {
        HealthGrade::from_score(self.average_score)
    }
}
