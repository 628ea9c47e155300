use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod camera;
mod config;
mod db;
mod devices;
mod error;
mod export;
mod leaderboard;
mod lecture;
mod models;
mod report;
mod roster;
mod stats;

use crate::camera::{CameraSession, MediaDevices};
use crate::config::{Config, LogFormat};
use crate::devices::V4lDevices;
use crate::export::CsvDownload;
use crate::lecture::{LecturePhase, LectureSession};
use crate::models::{Course, StudentObservation};
use crate::roster::{CsvRoster, DemoRoster, RosterSource, DEMO_COURSE_ID};
use crate::stats::format_percent;

#[derive(Parser)]
#[command(name = "classcorer")]
#[command(about = "Classroom analytics for ClasScorer instructors", long_about = None)]
struct Cli {
    /// Load the roster from a CSV file instead of the database
    #[arg(long, global = true)]
    roster: Option<PathBuf>,
    #[arg(long, global = true, default_value = DEMO_COURSE_ID)]
    course: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the demo course roster
    Seed,
    /// Print class averages
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Print the points leaderboard
    Top {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Export the roster as students.csv
    Export {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Quote fields containing commas, quotes or newlines
        #[arg(long)]
        quoted: bool,
    },
    /// Generate a markdown lecture report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List video input devices
    Devices,
    /// Run a live lecture session until Ctrl-C
    Lecture {
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Switch to the next camera once started
        #[arg(long)]
        switch_camera: bool,
    },
}

fn init_tracing(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("classcorer=info"));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init(),
    }
}

async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_roster(
    roster_csv: Option<&Path>,
    pool: Option<&PgPool>,
    course: &str,
) -> anyhow::Result<Vec<StudentObservation>> {
    let students = match (roster_csv, pool) {
        (Some(path), _) => CsvRoster::new(path).fetch_roster(course).await?,
        (None, Some(pool)) => db::PgRoster::new(pool.clone()).fetch_roster(course).await?,
        (None, None) => DemoRoster.fetch_roster(course).await?,
    };

    roster::validate_roster(&students).context("roster failed validation")?;
    info!(course, students = students.len(), "roster loaded");
    Ok(students)
}

fn course_for(id: &str) -> Course {
    let demo = roster::demo_course();
    if demo.id == id {
        demo
    } else {
        Course {
            id: id.to_string(),
            name: String::new(),
        }
    }
}

async fn run_lecture<D: MediaDevices>(
    mut session: LectureSession<D>,
    config: &Config,
    pool: Option<&PgPool>,
    duration: Option<Duration>,
    switch_camera: bool,
) -> anyhow::Result<()> {
    let stats = *session.stats();
    println!(
        "Active lecture session {} for {}",
        session.id(),
        session.course_id()
    );
    println!("Average Focus: {}", format_percent(stats.average_focus));
    println!("Average Attendance: {}", format_percent(stats.average_attendance));
    println!("Average Points: {}", stats.average_points);
    println!("Top Performers:");
    for (index, student) in session.top_performers().iter().enumerate() {
        println!("{}. {} {} pts", index + 1, student.name, student.points);
    }

    match session.camera_mut().start().await {
        Ok(()) => {
            if switch_camera {
                if let Err(err) = session.camera_mut().switch_device().await {
                    warn!(error = %err, "camera switch failed");
                }
            }
        }
        Err(err) => warn!(error = %err, "continuing without camera"),
    }
    report_camera(session.camera());
    info!(state = ?session.camera().state(), "camera ready");

    match duration {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                result = tokio::signal::ctrl_c() => result.context("failed to listen for Ctrl-C")?,
            }
        }
        None => tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?,
    }

    if session.phase() == LecturePhase::Live {
        println!("Ending lecture...");
    }
    if let Some(summary) = session.end(config.end_delay).await {
        println!(
            "Lecture {} ended after {}s.",
            summary.session_id,
            (summary.ended_at - summary.started_at).num_seconds()
        );
        if let Some(pool) = pool {
            db::record_lecture(pool, &summary)
                .await
                .with_context(|| format!("failed to record lecture {}", summary.session_id))?;
        }
    }

    Ok(())
}

fn report_camera<D: MediaDevices>(camera: &CameraSession<D>) {
    match camera.error_message() {
        Some(message) => println!("Camera: {message}"),
        None => println!(
            "Camera: {}",
            camera.active_device_id().unwrap_or("off")
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let course = roster::normalize_course_id(&cli.course);
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let needs_pool = match cli.command {
        Commands::Devices => false,
        Commands::InitDb | Commands::Seed | Commands::Lecture { .. } => true,
        _ => cli.roster.is_none(),
    };
    let pool = match config.database_url.as_deref() {
        Some(url) if needs_pool => Some(connect(url).await?),
        _ => None,
    };

    match cli.command {
        Commands::InitDb => {
            let pool = pool.context("DATABASE_URL must be set to a Postgres instance")?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = pool.context("DATABASE_URL must be set to a Postgres instance")?;
            let inserted = db::seed(&pool).await?;
            println!("Seeded {inserted} students.");
        }
        Commands::Stats { json } => {
            let students = load_roster(cli.roster.as_deref(), pool.as_ref(), &course).await?;
            let stats = stats::compute_stats(&students);
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Average Focus: {}", format_percent(stats.average_focus));
                println!("Average Attendance: {}", format_percent(stats.average_attendance));
                println!("Average Points: {}", stats.average_points);
            }
        }
        Commands::Top { limit, json } => {
            let students = load_roster(cli.roster.as_deref(), pool.as_ref(), &course).await?;
            let ranked = leaderboard::rank(&students, limit.unwrap_or(config.dashboard_top_n));
            if json {
                println!("{}", serde_json::to_string_pretty(&ranked)?);
            } else if ranked.is_empty() {
                println!("No students on the roster.");
            } else {
                for entry in ranked.iter() {
                    println!(
                        "{}. {} ({}) {} pts",
                        entry.rank,
                        entry.observation.name,
                        entry.observation.id,
                        entry.observation.points
                    );
                }
            }
        }
        Commands::Export { out_dir, quoted } => {
            let students = load_roster(cli.roster.as_deref(), pool.as_ref(), &course).await?;
            let download = CsvDownload::students(&students, quoted)?;
            let path = download.write_to(&out_dir)?;
            println!("Exported {} students to {} ({}).", students.len(), path.display(), download.mime);
        }
        Commands::Report { out, limit } => {
            let students = load_roster(cli.roster.as_deref(), pool.as_ref(), &course).await?;
            let report = report::build_report(
                &course_for(&course),
                chrono::Utc::now().date_naive(),
                &students,
                limit.unwrap_or(config.dashboard_top_n),
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Devices => {
            let devices = V4lDevices::new(&config.video_dir, &config.sysfs_dir);
            let inputs = devices.enumerate_devices().await?;
            if inputs.is_empty() {
                println!("No video input devices found.");
            }
            for device in inputs {
                println!("{} ({})", device.device_id, device.label);
            }
        }
        Commands::Lecture {
            duration_secs,
            switch_camera,
        } => {
            let students = load_roster(cli.roster.as_deref(), pool.as_ref(), &course).await?;
            let devices = V4lDevices::new(&config.video_dir, &config.sysfs_dir);
            let session = LectureSession::new(course.clone(), &students, devices, config.top_n);
            run_lecture(
                session,
                &config,
                pool.as_ref(),
                duration_secs.map(Duration::from_secs),
                switch_camera,
            )
            .await?;
        }
    }

    Ok(())
}
