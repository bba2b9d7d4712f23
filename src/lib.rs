//! Member health scoring for group activity.
//!
//! Turns attendance, RSVP, board participation and tenure into a 0-100 score
//! per member, a group average, and independent risk signals. Evaluation is a
//! pure function of an activity snapshot and an evaluation instant.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod report;
pub mod risk;
pub mod score;
pub mod telemetry;
pub mod window;

pub use engine::{evaluate_group_health, evaluate_with_deadline, score_snapshot};
pub use error::{EngineError, FetchError, FetchStage};
pub use fetcher::{ActivityFetcher, SnapshotFetcher};
pub use models::MemberHealthScoreResult;
