use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::FetchError;
use crate::fetcher::{normalize_attendance_method, ActivityFetcher};
use crate::models::{
    AttendanceMark, AttendanceStatus, BoardActivity, BoardPost, Member, QualifyingEvent,
    ResponseRecord,
};

/// SQL form of [`crate::fetcher::tracks_attendance`]: trimmed, case-insensitive `none` is excluded.
pub const QUALIFYING_EVENT_FILTER: &str = "lower(btrim(attendance_method)) <> 'none'";

pub const SEED_GROUP_ID: Uuid = Uuid::from_u128(0x6a1f_2c3e_9b4d_4e8a_8c5f_1d2e3f4a5b6c);

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Activity collaborator backed by the `member_health` Postgres schema.
#[derive(Debug, Clone)]
pub struct PgActivityFetcher {
    pool: PgPool,
}

impl PgActivityFetcher {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn member_from_row(row: &PgRow) -> Result<Member, sqlx::Error> {
    Ok(Member {
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        avatar_url: row.try_get("avatar_url")?,
        joined_at: row.try_get("joined_at")?,
    })
}

impl ActivityFetcher for PgActivityFetcher {
    async fn roster(&self, group_id: Uuid) -> Result<Vec<Member>, FetchError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, name, avatar_url, joined_at
            FROM member_health.members
            WHERE group_id = $1
            ORDER BY joined_at NULLS LAST, user_id
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(member_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn qualifying_events(
        &self,
        group_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<QualifyingEvent>, FetchError> {
        let sql = format!(
            r#"
            SELECT id, starts_at
            FROM member_health.events
            WHERE group_id = $1
              AND {QUALIFYING_EVENT_FILTER}
              AND starts_at >= $2
              AND starts_at <= $3
            ORDER BY starts_at
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(group_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(QualifyingEvent {
                id: row.try_get("id")?,
                starts_at: row.try_get("starts_at")?,
            });
        }
        Ok(events)
    }

    async fn latest_events(
        &self,
        group_id: Uuid,
        limit: usize,
        up_to: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, FetchError> {
        let limit = i64::try_from(limit)
            .map_err(|_| FetchError::Unavailable(format!("limit {limit} out of range")))?;
        let sql = format!(
            r#"
            SELECT id
            FROM member_health.events
            WHERE group_id = $1
              AND {QUALIFYING_EVENT_FILTER}
              AND starts_at <= $2
            ORDER BY starts_at DESC
            LIMIT $3
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(group_id)
            .bind(up_to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get("id")?);
        }
        Ok(ids)
    }

    async fn attendance(&self, event_ids: &[Uuid]) -> Result<Vec<AttendanceMark>, FetchError> {
        let rows = sqlx::query(
            "SELECT user_id, event_id, status FROM member_health.attendance WHERE event_id = ANY($1)",
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut marks = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status")?;
            marks.push(AttendanceMark {
                user_id: row.try_get("user_id")?,
                event_id: row.try_get("event_id")?,
                status: AttendanceStatus::parse(&status),
            });
        }
        Ok(marks)
    }

    async fn responses(&self, event_ids: &[Uuid]) -> Result<Vec<ResponseRecord>, FetchError> {
        let rows = sqlx::query(
            "SELECT user_id, event_id FROM member_health.event_responses WHERE event_id = ANY($1)",
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut responses = Vec::with_capacity(rows.len());
        for row in rows {
            responses.push(ResponseRecord {
                user_id: row.try_get("user_id")?,
                event_id: row.try_get("event_id")?,
            });
        }
        Ok(responses)
    }

    async fn posts(
        &self,
        group_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BoardPost>, FetchError> {
        let rows = sqlx::query(
            r#"
            SELECT id, author_id, created_at
            FROM member_health.board_posts
            WHERE group_id = $1
              AND deleted_at IS NULL
              AND created_at >= $2
              AND created_at <= $3
            "#,
        )
        .bind(group_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            posts.push(BoardPost {
                id: row.try_get("id")?,
                author_id: row.try_get("author_id")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(posts)
    }

    async fn comments(
        &self,
        post_ids: &[Uuid],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BoardActivity>, FetchError> {
        let rows = sqlx::query(
            r#"
            SELECT author_id, created_at
            FROM member_health.board_comments
            WHERE post_id = ANY($1)
              AND created_at >= $2
              AND created_at <= $3
            "#,
        )
        .bind(post_ids)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in rows {
            comments.push(BoardActivity {
                author_id: row.try_get("author_id")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(comments)
    }
}

/// Loads a demo group with activity relative to `now`. Re-running replaces
/// the group's events and board activity.
pub async fn seed(pool: &PgPool, now: DateTime<Utc>) -> anyhow::Result<Uuid> {
    let members = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
            240,
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
            120,
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Kiara Patel",
            20,
        ),
    ];

    let mut tx = pool.begin().await?;

    for (user_id, name, joined_days_ago) in &members {
        sqlx::query(
            r#"
            INSERT INTO member_health.members (group_id, user_id, name, joined_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (group_id, user_id) DO UPDATE
            SET name = EXCLUDED.name, joined_at = EXCLUDED.joined_at
            "#,
        )
        .bind(SEED_GROUP_ID)
        .bind(user_id)
        .bind(name)
        .bind(now - Duration::days(*joined_days_ago))
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("DELETE FROM member_health.events WHERE group_id = $1")
        .bind(SEED_GROUP_ID)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM member_health.board_posts WHERE group_id = $1")
        .bind(SEED_GROUP_ID)
        .execute(&mut *tx)
        .await?;

    let (avery, jules, kiara) = (members[0].0, members[1].0, members[2].0);

    // Weekly practice: Avery shows up throughout, Jules fades out, Kiara
    // joined recently and only attends the latest sessions.
    for days_ago in [2_i64, 6, 10, 13, 17, 21, 24, 28] {
        let event_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO member_health.events (id, group_id, title, starts_at, attendance_method)
            VALUES ($1, $2, $3, $4, 'manual')
            "#,
        )
        .bind(event_id)
        .bind(SEED_GROUP_ID)
        .bind(format!("Practice D-{days_ago}"))
        .bind(now - Duration::days(days_ago))
        .execute(&mut *tx)
        .await?;

        let mut marks = vec![(avery, "present")];
        marks.push((jules, if days_ago >= 15 { "present" } else { "absent" }));
        if days_ago < 15 {
            marks.push((kiara, if days_ago < 7 { "present" } else { "late" }));
        }

        for (user_id, status) in marks {
            sqlx::query(
                "INSERT INTO member_health.attendance (event_id, user_id, status) VALUES ($1, $2, $3)",
            )
            .bind(event_id)
            .bind(user_id)
            .bind(status)
            .execute(&mut *tx)
            .await?;
        }

        let mut responders = vec![avery, kiara];
        if days_ago >= 15 {
            responders.push(jules);
        }
        for user_id in responders {
            sqlx::query(
                "INSERT INTO member_health.event_responses (event_id, user_id, response) VALUES ($1, $2, 'going')",
            )
            .bind(event_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    let posts = [(avery, 3_i64), (kiara, 5), (jules, 25)];
    for (author_id, days_ago) in posts {
        let post_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO member_health.board_posts (id, group_id, author_id, title, created_at)
            VALUES ($1, $2, $3, 'Practice notes', $4)
            "#,
        )
        .bind(post_id)
        .bind(SEED_GROUP_ID)
        .bind(author_id)
        .bind(now - Duration::days(days_ago))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO member_health.board_comments (id, post_id, author_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(avery)
        .bind(now - Duration::days((days_ago - 1).max(0)))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(group_id = %SEED_GROUP_ID, members = members.len(), "seed data inserted");
    Ok(SEED_GROUP_ID)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportTable {
    Members,
    Events,
    Attendance,
    Responses,
    Posts,
    Comments,
}

mod rows {
    use chrono::{DateTime, Utc};
    use serde::Deserialize;
    use uuid::Uuid;

    #[derive(Deserialize)]
    pub struct MemberRow {
        pub group_id: Uuid,
        pub user_id: Uuid,
        pub name: Option<String>,
        pub avatar_url: Option<String>,
        pub joined_at: Option<DateTime<Utc>>,
    }

    #[derive(Deserialize)]
    pub struct EventRow {
        pub id: Option<Uuid>,
        pub group_id: Uuid,
        pub title: Option<String>,
        pub starts_at: DateTime<Utc>,
        pub attendance_method: Option<String>,
    }

    #[derive(Deserialize)]
    pub struct AttendanceRow {
        pub event_id: Uuid,
        pub user_id: Uuid,
        pub status: String,
    }

    #[derive(Deserialize)]
    pub struct ResponseRow {
        pub event_id: Uuid,
        pub user_id: Uuid,
        pub response: String,
    }

    #[derive(Deserialize)]
    pub struct PostRow {
        pub id: Option<Uuid>,
        pub group_id: Uuid,
        pub author_id: Uuid,
        pub title: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Deserialize)]
    pub struct CommentRow {
        pub id: Option<Uuid>,
        pub post_id: Uuid,
        pub author_id: Uuid,
        pub created_at: DateTime<Utc>,
    }
}

/// Imports one CSV file into the given table. Returns the number of rows
/// that were actually written.
pub async fn import_csv(pool: &PgPool, table: ImportTable, csv_path: &Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    match table {
        ImportTable::Members => {
            for result in reader.deserialize::<rows::MemberRow>() {
                let row = result?;
                let written = sqlx::query(
                    r#"
                    INSERT INTO member_health.members (group_id, user_id, name, avatar_url, joined_at)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (group_id, user_id) DO UPDATE
                    SET name = EXCLUDED.name,
                        avatar_url = EXCLUDED.avatar_url,
                        joined_at = EXCLUDED.joined_at
                    "#,
                )
                .bind(row.group_id)
                .bind(row.user_id)
                .bind(row.name)
                .bind(row.avatar_url)
                .bind(row.joined_at)
                .execute(pool)
                .await?;
                inserted += written.rows_affected() as usize;
            }
        }
        ImportTable::Events => {
            for result in reader.deserialize::<rows::EventRow>() {
                let row = result?;
                let written = sqlx::query(
                    r#"
                    INSERT INTO member_health.events (id, group_id, title, starts_at, attendance_method)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(row.id.unwrap_or_else(Uuid::new_v4))
                .bind(row.group_id)
                .bind(row.title.unwrap_or_default())
                .bind(row.starts_at)
                .bind(normalize_attendance_method(row.attendance_method.as_deref()))
                .execute(pool)
                .await?;
                inserted += written.rows_affected() as usize;
            }
        }
        ImportTable::Attendance => {
            for result in reader.deserialize::<rows::AttendanceRow>() {
                let row = result?;
                let written = sqlx::query(
                    r#"
                    INSERT INTO member_health.attendance (event_id, user_id, status)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (event_id, user_id) DO UPDATE SET status = EXCLUDED.status
                    "#,
                )
                .bind(row.event_id)
                .bind(row.user_id)
                .bind(row.status.trim().to_ascii_lowercase())
                .execute(pool)
                .await?;
                inserted += written.rows_affected() as usize;
            }
        }
        ImportTable::Responses => {
            for result in reader.deserialize::<rows::ResponseRow>() {
                let row = result?;
                let written = sqlx::query(
                    r#"
                    INSERT INTO member_health.event_responses (event_id, user_id, response)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (event_id, user_id) DO UPDATE SET response = EXCLUDED.response
                    "#,
                )
                .bind(row.event_id)
                .bind(row.user_id)
                .bind(row.response)
                .execute(pool)
                .await?;
                inserted += written.rows_affected() as usize;
            }
        }
        ImportTable::Posts => {
            for result in reader.deserialize::<rows::PostRow>() {
                let row = result?;
                let written = sqlx::query(
                    r#"
                    INSERT INTO member_health.board_posts (id, group_id, author_id, title, created_at)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(row.id.unwrap_or_else(Uuid::new_v4))
                .bind(row.group_id)
                .bind(row.author_id)
                .bind(row.title.unwrap_or_default())
                .bind(row.created_at)
                .execute(pool)
                .await?;
                inserted += written.rows_affected() as usize;
            }
        }
        ImportTable::Comments => {
            for result in reader.deserialize::<rows::CommentRow>() {
                let row = result?;
                let written = sqlx::query(
                    r#"
                    INSERT INTO member_health.board_comments (id, post_id, author_id, created_at)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(row.id.unwrap_or_else(Uuid::new_v4))
                .bind(row.post_id)
                .bind(row.author_id)
                .bind(row.created_at)
                .execute(pool)
                .await?;
                inserted += written.rows_affected() as usize;
            }
        }
    }

    info!(?table, inserted, path = %csv_path.display(), "csv import finished");
    Ok(inserted)
}
