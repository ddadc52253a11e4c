mod player;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use lesson_core::model::{Course, CourseId, Lesson, LessonId, UserId};
use lesson_core::unlock::UnlockStatus;
use player::SimulatedPlayers;
use serde::Serialize;
use services::{
    Clock, CompletionOutcome, CourseCompleted, CourseCompletionListener, CourseProgress,
    CourseTracker, PlayerBootstrap, PlayerFactory, TrackerConfig,
};
use storage::repository::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw: value })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- simulate [--db <sqlite_url>] [--user <id>] [--course <id>]");
    eprintln!("                               [--lessons <n>] [--watch-secs <n>]");
    eprintln!("  cargo run -p app -- status   [--db <sqlite_url>] [--user <id>] [--course <id>]");
    eprintln!("                               [--lessons <n>] [--json]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:dev.sqlite3  --user 1  --course 1  --lessons 3  --watch-secs 5");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LESSON_DB_URL, LESSON_USER_ID, LESSON_FLUSH_SECS, LESSON_RESUME_TAIL_SECS,");
    eprintln!("  LESSON_UTC_OFFSET_MINUTES, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Simulate,
    Status,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "simulate" => Some(Self::Simulate),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    user: UserId,
    course: CourseId,
    lessons: u32,
    watch_secs: u64,
    json: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("LESSON_DB_URL")
                .ok()
                .map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url),
            user: std::env::var("LESSON_USER_ID")
                .ok()
                .and_then(|value| value.parse::<UserId>().ok())
                .unwrap_or(UserId::new(1)),
            course: CourseId::new(1),
            lessons: 3,
            watch_secs: 5,
            json: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--user" => parsed.user = parse_number(args, "--user")?,
                "--course" => parsed.course = parse_number(args, "--course")?,
                "--lessons" => {
                    let lessons: u32 = parse_number(args, "--lessons")?;
                    if lessons == 0 {
                        return Err(ArgsError::InvalidNumber {
                            flag: "--lessons",
                            raw: lessons.to_string(),
                        });
                    }
                    parsed.lessons = lessons;
                }
                "--watch-secs" => parsed.watch_secs = parse_number(args, "--watch-secs")?,
                "--json" => parsed.json = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// Builds the demo course: `lessons` two-minute videos, chained to the next id.
fn demo_course(id: CourseId, lessons: u32) -> Result<Course, Box<dyn std::error::Error>> {
    let lessons = (0..lessons)
        .map(|position| {
            Lesson::new(
                LessonId::new(id.value() * 1_000 + u64::from(position) + 1),
                id,
                position,
                2,
                format!("Lesson {}", position + 1),
                format!("course-{id}/lesson-{}", position + 1),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    let next = CourseId::new(id.value() + 1);
    Ok(Course::new(id, format!("Course {id}"), lessons)?.with_next_course(next))
}

struct LogCompletion;

impl CourseCompletionListener for LogCompletion {
    fn course_completed(&self, event: &CourseCompleted) {
        info!(
            user = %event.user,
            course = %event.course,
            next = ?event.unlocked_next,
            "course finished"
        );
    }
}

#[derive(Serialize)]
struct StatusReport<'a> {
    user: UserId,
    course: CourseId,
    progress: CourseProgress,
    lessons: Vec<LessonStatus<'a>>,
}

#[derive(Serialize)]
struct LessonStatus<'a> {
    id: LessonId,
    title: &'a str,
    status: UnlockStatus,
}

async fn print_json_status(tracker: &CourseTracker) -> Result<(), serde_json::Error> {
    let statuses = tracker.statuses().await;
    let report = StatusReport {
        user: tracker.user(),
        course: tracker.course().id(),
        progress: tracker.course_progress().await,
        lessons: tracker
            .course()
            .lessons()
            .iter()
            .zip(statuses)
            .map(|(lesson, status)| LessonStatus {
                id: lesson.id(),
                title: lesson.title(),
                status,
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn print_status(tracker: &CourseTracker) {
    let progress = tracker.course_progress().await;
    println!(
        "course {}: {}/{} lessons ({}%)",
        tracker.course().id(),
        progress.completed,
        progress.total,
        progress.percent
    );
    for (lesson, status) in tracker.course().lessons().iter().zip(tracker.statuses().await) {
        println!("  {:>3}  {:<12} {}", lesson.position() + 1, status.as_str(), lesson.title());
    }
}

async fn simulate(
    tracker: &CourseTracker,
    factory: &dyn PlayerFactory,
    watch_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = tracker.course_progress().await;
    if progress.completed >= progress.total {
        println!("course already completed");
        return Ok(());
    }

    let index = progress.completed;
    let status = tracker.unlock_status(index).await;
    let Some(lesson) = tracker.course().lessons().get(index) else {
        return Ok(());
    };
    if !status.is_available() {
        println!("next lesson \"{}\" is {}", lesson.title(), status.as_str());
        return Ok(());
    }

    let probe = factory.bind(lesson.video_ref());
    tracker.on_lesson_mount(lesson.id(), probe).await?;
    tokio::time::sleep(Duration::from_secs(watch_secs)).await;

    let outcome = tracker.complete_lesson().await;
    if let Some(snapshot) = tracker.snapshot().await {
        println!(
            "watched \"{}\": {}s, at {:.0}s ({}%)",
            lesson.title(),
            snapshot.accumulated,
            snapshot.position.unwrap_or(0.0),
            snapshot.percent
        );
    }
    tracker.on_lesson_unmount().await;

    match outcome? {
        CompletionOutcome::CourseCompleted(event) => println!(
            "course {} completed{}",
            event.course,
            event
                .unlocked_next
                .map(|next| format!(", unlocked course {next}"))
                .unwrap_or_default()
        ),
        CompletionOutcome::LessonCompleted => println!("lesson completed"),
        CompletionOutcome::AlreadyCompleted => println!("lesson was already completed"),
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;

    let config = TrackerConfig::from_env();
    let course = Arc::new(demo_course(parsed.course, parsed.lessons)?);
    let tracker = CourseTracker::open(parsed.user, Arc::clone(&course), &storage, Clock::default(), config)
        .await?
        .with_listener(Arc::new(LogCompletion));

    match cmd {
        Command::Status if parsed.json => print_json_status(&tracker).await?,
        Command::Status => print_status(&tracker).await,
        Command::Simulate => {
            let factory = PlayerBootstrap::global()
                .ready(|| async move {
                    let players: Arc<dyn PlayerFactory> = Arc::new(SimulatedPlayers::for_course(&course));
                    Ok(players)
                })
                .await?;
            simulate(&tracker, factory.as_ref(), parsed.watch_secs).await?;
            print_status(&tracker).await;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
