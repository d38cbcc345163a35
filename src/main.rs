use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod aggregate;
mod config;
mod db;
mod insights;
mod models;
mod report;
mod risk;
mod schedule;
mod score;
mod velocity;

use config::EngineConfig;

#[derive(Parser)]
#[command(name = "center-insights")]
#[command(about = "Attendance analytics for learning centers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Classifier thresholds, overridable per invocation. Defaults match
/// `EngineConfig::default`.
#[derive(Args)]
struct ThresholdArgs {
    #[arg(long, default_value_t = 7)]
    at_risk_days: i64,
    #[arg(long, default_value_t = 6)]
    extended_months: i64,
    #[arg(long, default_value_t = 80.0)]
    completion_threshold: f64,
    #[arg(long, default_value_t = 30)]
    irregular_window_days: i64,
    #[arg(long, default_value_t = 5)]
    irregular_min_sessions: usize,
    #[arg(long, default_value_t = 3)]
    gap_threshold_days: i64,
    #[arg(long, default_value_t = 6)]
    delayed_months: i64,
    #[arg(long, default_value_t = 50.0)]
    progress_threshold: f64,
}

impl ThresholdArgs {
    fn into_config(self) -> anyhow::Result<EngineConfig> {
        let config = EngineConfig {
            at_risk_days: self.at_risk_days,
            extended_months: self.extended_months,
            completion_threshold_pct: self.completion_threshold,
            irregular_window_days: self.irregular_window_days,
            irregular_min_sessions: self.irregular_min_sessions,
            gap_threshold_days: self.gap_threshold_days,
            delayed_months: self.delayed_months,
            progress_threshold_pct: self.progress_threshold,
            ..EngineConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Category {
    AtRisk,
    Extended,
    NearingCompletion,
    Irregular,
    Delayed,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import attendance events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Attendance and learning velocity for one student
    Velocity {
        #[arg(long)]
        student: Uuid,
        #[arg(long, default_value_t = 30)]
        window_days: i64,
    },
    /// Run one risk classifier (or all of them) over a center
    Classify {
        #[arg(long)]
        center: Option<String>,
        #[arg(long, value_enum)]
        category: Option<Category>,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// Free/busy breakdown and Gantt intervals for a faculty member
    Schedule {
        #[arg(long)]
        faculty: Uuid,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value_t = 1)]
        days: i64,
    },
    /// Composite performance score for a center, faculty member, or student
    #[command(group(
        ArgGroup::new("scope")
            .args(["center", "faculty", "student"])
            .required(true)
            .multiple(false)
    ))]
    Score {
        #[arg(long)]
        center: Option<String>,
        #[arg(long)]
        faculty: Option<Uuid>,
        #[arg(long)]
        student: Option<Uuid>,
    },
    /// Cross-category insights report for a center scope
    Insights {
        #[arg(long)]
        center: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let today = Utc::now().date_naive();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} attendance events from {}.", csv.display());
        }
        Commands::Velocity {
            student,
            window_days,
        } => {
            let config = EngineConfig {
                velocity_window_days: window_days,
                ..EngineConfig::default()
            };
            config.validate()?;
            let records = db::fetch_records(&pool, None, Some(student), None, None).await?;
            let attendance =
                velocity::attendance_velocity(&records, today, config.velocity_window_days);
            let learning = velocity::learning_velocity(&records);
            print_json(&serde_json::json!({
                "attendance": attendance,
                "learning": learning,
            }))?;
        }
        Commands::Classify {
            center,
            category,
            thresholds,
        } => {
            let config = thresholds.into_config()?;
            let center = center.as_deref();
            let students = db::fetch_students(&pool, center, None).await?;
            let records = db::fetch_records(&pool, center, None, None, None).await?;
            let assignments = db::fetch_assignments(&pool, None, None).await?;

            match category {
                Some(Category::AtRisk) => {
                    print_json(&risk::at_risk(&students, &records, today, &config))?
                }
                Some(Category::Extended) => {
                    print_json(&risk::extended(&students, &records, today, &config))?
                }
                Some(Category::NearingCompletion) => print_json(&risk::nearing_completion(
                    &students,
                    &records,
                    &assignments,
                    &config,
                ))?,
                Some(Category::Irregular) => {
                    print_json(&risk::irregular(&students, &records, today, &config))?
                }
                Some(Category::Delayed) => print_json(&risk::delayed(
                    &students,
                    &records,
                    &assignments,
                    today,
                    &config,
                ))?,
                None => {
                    let scope = center.unwrap_or("all centers");
                    let summary = insights::build_summary(
                        scope,
                        &students,
                        &records,
                        &assignments,
                        today,
                        &config,
                    );
                    print_json(&summary)?;
                }
            }
        }
        Commands::Schedule {
            faculty,
            date,
            days,
        } => {
            if days <= 0 {
                anyhow::bail!("--days must be positive, got {days}");
            }
            let until = date + Duration::days(days - 1);
            let records =
                db::fetch_records(&pool, None, None, Some(faculty), Some(date)).await?;
            let day = schedule::day_schedule(faculty, date, &records);
            let intervals = schedule::schedule_intervals(faculty, date, until, &records);
            print_json(&serde_json::json!({
                "day": day,
                "intervals": intervals,
            }))?;
        }
        Commands::Score {
            center,
            faculty,
            student,
        } => {
            let scorecard = if let Some(center) = center.as_deref() {
                let students = db::fetch_students(&pool, Some(center), None).await?;
                let month_start = today - Duration::days(30);
                let records =
                    db::fetch_records(&pool, Some(center), None, None, Some(month_start))
                        .await?;
                let feedback = db::fetch_feedback(&pool, Some(center)).await?;
                score::center_score(&students, &records, &feedback)
            } else if let Some(faculty) = faculty {
                let assignments = db::fetch_assignments(&pool, None, Some(faculty)).await?;
                let records =
                    db::fetch_records(&pool, None, None, Some(faculty), None).await?;
                score::faculty_score(&assignments, &records, today)
            } else {
                let student_id = student.context("a scope is required")?;
                let students = db::fetch_students(&pool, None, None).await?;
                let subject = students
                    .iter()
                    .find(|s| s.id == student_id)
                    .with_context(|| format!("no student with id {student_id}"))?;
                let records =
                    db::fetch_records(&pool, None, Some(student_id), None, None).await?;
                let assignments =
                    db::fetch_assignments(&pool, Some(student_id), None).await?;
                score::student_score(subject, &records, &assignments, today)
            };
            print_json(&scorecard)?;
        }
        Commands::Insights {
            center,
            out,
            thresholds,
        } => {
            let config = thresholds.into_config()?;
            let center = center.as_deref();
            let scope = center.unwrap_or("all centers");

            let students = db::fetch_students(&pool, center, None).await?;
            let records = db::fetch_records(&pool, center, None, None, None).await?;
            let assignments = db::fetch_assignments(&pool, None, None).await?;
            let summary = insights::build_summary(
                scope,
                &students,
                &records,
                &assignments,
                today,
                &config,
            );

            let center_card = if center.is_some() {
                let month_start = today - Duration::days(30);
                let month_records = db::fetch_records(&pool, center, None, None, Some(month_start)).await?;
                let feedback = db::fetch_feedback(&pool, center).await?;
                Some(score::center_score(&students, &month_records, &feedback))
            } else {
                None
            };

            let report = report::build_report(&summary, center_card.as_ref());
            std::fs::write(&out, report)
                .with_context(|| format!("cannot write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
