use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use member_health_score::config::AppConfig;
use member_health_score::db::{self, ImportTable, PgActivityFetcher};
use member_health_score::engine::evaluate_with_deadline;
use member_health_score::fetcher::SnapshotFetcher;
use member_health_score::models::MemberHealthScoreResult;
use member_health_score::report;
use member_health_score::telemetry;

#[derive(Parser)]
#[command(name = "member-health")]
#[command(about = "Member health scoring and risk detection for groups", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo group with realistic activity
    Seed,
    /// Import rows for one table from a CSV file
    Import {
        #[arg(long, value_enum)]
        table: ImportTable,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score every member of a group, lowest first
    Score {
        #[arg(long)]
        group: Uuid,
        /// Evaluation instant (RFC 3339); defaults to the current time
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report for a group
    Report {
        #[arg(long)]
        group: Uuid,
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Score an offline JSON snapshot without a database
    ScoreFile {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let database_url = config.database.require_url()?;
    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

fn print_result(result: &MemberHealthScoreResult, limit: usize, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    if !result.has_data {
        println!("No members found for this group.");
        return Ok(());
    }

    println!(
        "Average score {} ({}), {} of {} members at risk.",
        result.average_score,
        result.average_grade().as_str(),
        result.at_risk_count,
        result.members.len()
    );
    println!("Members needing attention first:");
    for item in result.members.iter().take(limit) {
        let risks: Vec<&str> = item.risks.iter().map(|risk| risk.label.as_str()).collect();
        println!(
            "- {} score {} ({}){}",
            item.name,
            item.total_score,
            item.grade.as_str(),
            if risks.is_empty() {
                String::new()
            } else {
                format!(" [{}]", risks.join("; "))
            }
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            let group_id = db::seed(&pool, Utc::now()).await?;
            println!("Seed data inserted for group {group_id}.");
        }
        Commands::Import { table, csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_csv(&pool, table, &csv).await?;
            println!("Inserted {inserted} rows from {}.", csv.display());
        }
        Commands::Score {
            group,
            now,
            limit,
            json,
        } => {
            let pool = connect(&config).await?;
            let fetcher = PgActivityFetcher::new(pool);
            let now = now.unwrap_or_else(Utc::now);
            let result = evaluate_with_deadline(&fetcher, group, now, config.eval_timeout)
                .await
                .with_context(|| format!("failed to evaluate group {group}"))?;
            print_result(&result, limit, json)?;
        }
        Commands::Report { group, now, out } => {
            let pool = connect(&config).await?;
            let fetcher = PgActivityFetcher::new(pool);
            let now = now.unwrap_or_else(Utc::now);
            let result = evaluate_with_deadline(&fetcher, group, now, config.eval_timeout)
                .await
                .with_context(|| format!("failed to evaluate group {group}"))?;
            let report = report::build_report(&group.to_string(), now, &result);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::ScoreFile {
            snapshot,
            now,
            limit,
            json,
        } => {
            let raw = std::fs::read_to_string(&snapshot)
                .with_context(|| format!("failed to read {}", snapshot.display()))?;
            let fetcher = SnapshotFetcher::from_json(&raw)
                .with_context(|| format!("invalid snapshot {}", snapshot.display()))?;
            let now = now.unwrap_or_else(Utc::now);
            let result = evaluate_with_deadline(&fetcher, Uuid::nil(), now, config.eval_timeout)
                .await
                .with_context(|| format!("failed to evaluate {}", snapshot.display()))?;
            info!(
                path = %snapshot.display(),
                members = result.members.len(),
                "snapshot scored"
            );
            print_result(&result, limit, json)?;
        }
    }

    Ok(())
}
