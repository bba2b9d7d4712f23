//! Error taxonomy for health evaluations.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Failure reported by an activity collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Which collaborator query was running when an evaluation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Roster,
    Events,
    LatestEvents,
    Attendance,
    Responses,
    Posts,
    Comments,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchStage::Roster => "roster",
            FetchStage::Events => "events",
            FetchStage::LatestEvents => "latest_events",
            FetchStage::Attendance => "attendance",
            FetchStage::Responses => "responses",
            FetchStage::Posts => "posts",
            FetchStage::Comments => "comments",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("fetch {stage} failed: {source}")]
    Fetch {
        stage: FetchStage,
        #[source]
        source: FetchError,
    },

    #[error("evaluation exceeded {}ms deadline", deadline.as_millis())]
    Timeout { deadline: Duration },
}

impl EngineError {
    pub fn fetch(stage: FetchStage) -> impl FnOnce(FetchError) -> Self {
        move |source| Self::Fetch { stage, source }
    }

    pub fn stage(&self) -> Option<FetchStage> {
        match self {
            Self::Fetch { stage, .. } => Some(*stage),
            Self::Timeout { .. } => None,
        }
    }
}
