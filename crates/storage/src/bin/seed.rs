use std::fmt;

use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{QuizDraft, QuizId, UserId};
use storage::RealtimeStore;
use storage::paths;
use storage::records::{HistoryDoc, QuestionDoc, QuizDoc, StudentDoc, set_doc, to_value};
use storage::repository::{Storage, new_push_key};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    title: String,
    category: String,
    points: u32,
    minutes: u32,
    students: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

fn parse_u32(args: &mut impl Iterator<Item = String>, flag: &'static str) -> Result<u32, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .parse::<u32>()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw: value.clone() })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite:quiz.sqlite3".into());
        let mut title = "Linux Basics".to_string();
        let mut category = "Linux".to_string();
        let mut points = 10;
        let mut minutes = 5;
        let mut students = 3;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--title" => title = require_value(&mut args, "--title")?,
                "--category" => category = require_value(&mut args, "--category")?,
                "--points" => points = parse_u32(&mut args, "--points")?,
                "--minutes" => minutes = parse_u32(&mut args, "--minutes")?,
                "--students" => students = parse_u32(&mut args, "--students")?,
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            title,
            category,
            points,
            minutes,
            students,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:quiz.sqlite3)");
    eprintln!("  --title <text>            Quiz title (default: Linux Basics)");
    eprintln!("  --category <text>         Quiz category (default: Linux)");
    eprintln!("  --points <n>              Points per correct answer (default: 10)");
    eprintln!("  --minutes <n>             Total time limit, 0 for none (default: 5)");
    eprintln!("  --students <n>            Sample students for the leaderboard (default: 3)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL");
}

fn sample_questions() -> Vec<QuestionDoc> {
    let samples: [(&str, [&str; 4], usize); 4] = [
        ("Which command lists directory contents?", ["cd", "ls", "rm", "cat"], 1),
        ("Which file holds user accounts?", ["/etc/passwd", "/etc/hosts", "/var/log", "/tmp"], 0),
        ("Which signal does `kill -9` send?", ["SIGTERM", "SIGHUP", "SIGKILL", "SIGINT"], 2),
        ("Which command changes file permissions?", ["chown", "chmod", "chgrp", "umask"], 1),
    ];
    samples
        .into_iter()
        .map(|(question, options, correct_answer)| QuestionDoc {
            question: question.to_string(),
            options: options.iter().map(|o| (*o).to_string()).collect(),
            correct_answer,
            time_limit: 30,
        })
        .collect()
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let store = storage.store.as_ref();
    let now = args.now.unwrap_or_else(Utc::now);

    let questions = sample_questions();
    let quiz = QuizDraft {
        title: args.title.clone(),
        category: args.category.clone(),
        description: "Seeded sample quiz".into(),
        points_per_correct_answer: args.points,
        time_limit_minutes: args.minutes,
        number_of_questions: u32::try_from(questions.len()).ok(),
    }
    .validate(now)?
    .assign_id(QuizId::new(new_push_key()));

    set_doc(store, &paths::quiz(&quiz.id), &QuizDoc::from_definition(&quiz)).await?;
    store
        .set(&paths::quiz_questions(&quiz.id), to_value(&questions)?)
        .await?;

    for i in 0..args.students {
        let uid = UserId::new(format!("seed-student-{}", i + 1));
        let score = 4 - (i % 4);
        let doc = StudentDoc {
            name: format!("Student {}", i + 1),
            email: None,
            points: u64::from(score * 10),
            quizzes_completed: 1,
            quiz_history: vec![HistoryDoc {
                date: now - Duration::days(i64::from(i)),
                score,
                total_questions: 4,
                points: score * 10,
                category: Some(args.category.clone()),
            }],
            completed_quizzes: Default::default(),
        };
        set_doc(store, &paths::student(&uid), &doc).await?;
    }

    println!(
        "Seeded quiz {} ({} questions) and {} students into {}",
        quiz.id,
        questions.len(),
        args.students,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
