use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use quiz_core::model::{QuizId, UserId};
use reqwest::Client;
use services::{
    AdminQuizSource, AiReportGenerator, Anonymous, ChatClient, ChatCompletion,
    DEFAULT_LEADERBOARD_SIZE, FetchError, INTERESTS, Identity, LeaderboardService, LoadedQuiz,
    OpenTriviaSource, PersistenceStatus, ProfileService, ProfileUpdate, ProgressReport,
    QuestionSource, QuizAdminService, QuizApiSource, QuizConfig, QuizRunner, ResultReporter,
    RunnerConfig, RunnerEvent, StaticIdentity, VocabularyGame, WordDeck, WordGenerator,
};
use storage::records::ProfileDoc;
use storage::{RealtimeStore, Storage};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidId { flag: &'static str, raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    MissingApiKey,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required for this command"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::MissingApiKey => write!(f, "category quizzes need QUIZ_API_KEY"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- trivia      [--db <sqlite_url>] [--uid <id> --name <name>]");
    eprintln!("  cargo run -p app -- category    --category <name> [--difficulty <level>] [...]");
    eprintln!("  cargo run -p app -- quiz        --quiz-id <id> [...]");
    eprintln!("  cargo run -p app -- quizzes     [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- leaderboard [--limit <n>] [--quiz-id <id>] [--watch]");
    eprintln!("  cargo run -p app -- progress    --uid <id>");
    eprintln!("  cargo run -p app -- report      --uid <id>");
    eprintln!("  cargo run -p app -- vocab       [--generate]");
    eprintln!("  cargo run -p app -- profile     --uid <id> [--phone <p>] [--institution <i>]");
    eprintln!("                                  [--qualification <q>] [--year <yyyy>]");
    eprintln!("                                  [--education <e>] [--interest <name>]...");
    eprintln!();
    eprintln!("Answer a question by typing its option number and pressing Enter.");
    eprintln!("Each --interest toggles one of: {}.", INTERESTS.join(", "));
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_UID, QUIZ_USER_NAME, QUIZ_TRIVIA_BASE_URL,");
    eprintln!("  QUIZ_API_BASE_URL, QUIZ_API_KEY, QUIZ_AI_API_KEY, QUIZ_AI_BASE_URL,");
    eprintln!("  QUIZ_AI_MODEL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Trivia,
    Category,
    Quiz,
    Quizzes,
    Leaderboard,
    Progress,
    Report,
    Vocab,
    Profile,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "trivia" => Some(Self::Trivia),
            "category" => Some(Self::Category),
            "quiz" => Some(Self::Quiz),
            "quizzes" => Some(Self::Quizzes),
            "leaderboard" => Some(Self::Leaderboard),
            "progress" => Some(Self::Progress),
            "report" => Some(Self::Report),
            "vocab" => Some(Self::Vocab),
            "profile" => Some(Self::Profile),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    uid: Option<UserId>,
    name: Option<String>,
    category: Option<String>,
    difficulty: Option<String>,
    quiz_id: Option<QuizId>,
    limit: usize,
    watch: bool,
    generate: bool,
    profile: ProfileUpdate,
    interests: Vec<String>,
}

impl Args {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        config: &QuizConfig,
    ) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: normalize_sqlite_url(config.db_url.clone()),
            uid: config.uid.clone(),
            name: config.user_name.clone(),
            category: None,
            difficulty: None,
            quiz_id: None,
            limit: DEFAULT_LEADERBOARD_SIZE,
            watch: false,
            generate: false,
            profile: ProfileUpdate::default(),
            interests: Vec::new(),
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
                "--uid" => {
                    let value = require_value(args, "--uid")?;
                    let uid = value.parse().map_err(|_| ArgsError::InvalidId {
                        flag: "--uid",
                        raw: value.clone(),
                    })?;
                    parsed.uid = Some(uid);
                }
                "--name" => parsed.name = Some(require_value(args, "--name")?),
                "--category" => parsed.category = Some(require_value(args, "--category")?),
                "--difficulty" => parsed.difficulty = Some(require_value(args, "--difficulty")?),
                "--quiz-id" => {
                    let value = require_value(args, "--quiz-id")?;
                    let id = value.parse().map_err(|_| ArgsError::InvalidId {
                        flag: "--quiz-id",
                        raw: value.clone(),
                    })?;
                    parsed.quiz_id = Some(id);
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    parsed.limit = value.parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--limit",
                        raw: value.clone(),
                    })?;
                }
                "--watch" => parsed.watch = true,
                "--generate" => parsed.generate = true,
                "--phone" => parsed.profile.phone = Some(require_value(args, "--phone")?),
                "--institution" => {
                    parsed.profile.institution = Some(require_value(args, "--institution")?);
                }
                "--qualification" => {
                    parsed.profile.qualification = Some(require_value(args, "--qualification")?);
                }
                "--education" => {
                    parsed.profile.education = Some(require_value(args, "--education")?);
                }
                "--year" => {
                    let value = require_value(args, "--year")?;
                    let year = value.parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--year",
                        raw: value.clone(),
                    })?;
                    parsed.profile.year_of_passing = Some(year);
                }
                "--interest" => parsed.interests.push(require_value(args, "--interest")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn identity(&self) -> Arc<dyn Identity> {
        match &self.uid {
            Some(uid) => {
                let name = self.name.clone().unwrap_or_else(|| uid.to_string());
                Arc::new(StaticIdentity::new(uid.clone(), name))
            }
            None => Arc::new(Anonymous),
        }
    }

    fn require_uid(&self) -> Result<&UserId, ArgsError> {
        self.uid.as_ref().ok_or(ArgsError::MissingFlag { flag: "--uid" })
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

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let mut argv = std::env::args().skip(1);
    let first = argv.next();
    let cmd = match first.as_deref() {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let config = QuizConfig::from_env()?;
    let args = Args::parse(&mut argv, &config).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite here so the library crates never touch the filesystem.
    prepare_sqlite_file(&args.db_url)?;
    let storage = Storage::sqlite(&args.db_url).await?;
    log::info!("using {}", args.db_url);
    let store = Arc::clone(&storage.store);
    let client = Client::new();

    match cmd {
        Command::Trivia => {
            let source = OpenTriviaSource::new(client, config.trivia_base_url.clone());
            play(&source, store, &args).await
        }
        Command::Category => {
            let category = args
                .category
                .clone()
                .ok_or(ArgsError::MissingFlag { flag: "--category" })?;
            let api_key = config.quiz_api_key.clone().ok_or(ArgsError::MissingApiKey)?;
            let mut source =
                QuizApiSource::new(client, config.quiz_api_base_url.clone(), api_key, category);
            if let Some(difficulty) = &args.difficulty {
                source = source.with_difficulty(difficulty.clone());
            }
            play(&source, store, &args).await
        }
        Command::Quiz => {
            let quiz_id = args
                .quiz_id
                .clone()
                .ok_or(ArgsError::MissingFlag { flag: "--quiz-id" })?;
            let source = AdminQuizSource::new(Arc::clone(&store), quiz_id);
            play(&source, store, &args).await
        }
        Command::Quizzes => list_quizzes(store).await,
        Command::Leaderboard => leaderboard(store, &args).await,
        Command::Progress => {
            let student = LeaderboardService::new(store)
                .student(args.require_uid()?)
                .await?;
            print_progress(&ProgressReport::from_record(&student));
            Ok(())
        }
        Command::Report => {
            let student = LeaderboardService::new(store)
                .student(args.require_uid()?)
                .await?;
            let generator = AiReportGenerator::new(client, config.ai.clone());
            let report = generator.generate(&student).await?;
            for section in report.sections {
                println!("{}", section.title);
                for point in section.points {
                    println!("  - {point}");
                }
                println!();
            }
            Ok(())
        }
        Command::Vocab => {
            let chat = config.ai.clone().map(|ai| {
                Arc::new(ChatClient::new(client, ai)) as Arc<dyn ChatCompletion>
            });
            vocab(WordGenerator::new(store, chat), args.generate).await
        }
        Command::Profile => {
            let uid = args.require_uid()?;
            let service = ProfileService::new(store);
            let mut profile = if args.profile == ProfileUpdate::default() {
                service.get_profile(uid).await?
            } else {
                service.update_profile(uid, args.profile.clone()).await?
            };
            for interest in &args.interests {
                profile = service.toggle_interest(uid, interest).await?;
            }
            print_profile(&profile);
            Ok(())
        }
    }
}

//
// ─── PLAYING ───────────────────────────────────────────────────────────────────
//

type StdinLines = Lines<BufReader<Stdin>>;

async fn play(
    source: &dyn QuestionSource,
    store: Arc<dyn RealtimeStore>,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let loaded = load_with_retry(source, &mut input).await?;
    println!("{} ({} questions)", loaded.title, loaded.questions.len());

    let reporter = ResultReporter::new(store, args.identity());
    let mut runner = QuizRunner::start(loaded, reporter, RunnerConfig::default())?;
    let mut input_open = true;

    loop {
        tokio::select! {
            event = runner.next_event() => {
                let Some(event) = event else {
                    return Ok(());
                };
                if render(event) {
                    break;
                }
            }
            line = input.next_line(), if input_open => {
                match line? {
                    Some(line) => match line.trim().parse::<usize>() {
                        Ok(choice) if choice > 0 => {
                            runner.select(choice - 1).await;
                        }
                        _ => println!("type an option number"),
                    },
                    None => input_open = false,
                }
            }
        }
    }

    report_persistence(&mut runner).await;
    Ok(())
}

/// Longest the CLI waits for a result to be saved before exiting anyway.
const SAVE_WAIT: Duration = Duration::from_secs(10);

async fn report_persistence(runner: &mut QuizRunner) {
    match tokio::time::timeout(SAVE_WAIT, runner.next_event()).await {
        Ok(Some(RunnerEvent::Persisted(status))) => match status {
            PersistenceStatus::Persisted => println!("Result saved."),
            PersistenceStatus::SkippedAnonymous => {
                println!("Not signed in; pass --uid to keep your score.");
            }
            PersistenceStatus::Failed => println!("Result could not be saved."),
        },
        Ok(_) => {}
        Err(_) => println!("Still saving the result; giving up waiting."),
    }
}

/// Retryable failures offer another go; anything else ends the command.
async fn load_with_retry(
    source: &dyn QuestionSource,
    input: &mut StdinLines,
) -> Result<LoadedQuiz, Box<dyn std::error::Error>> {
    loop {
        match source.load().await {
            Ok(loaded) => return Ok(loaded),
            Err(err) if err.is_retryable() => {
                log::warn!("question load failed: {err}");
                eprintln!("could not load questions: {err}");
                eprintln!("retry? [y/N]");
                let answer = input.next_line().await?.unwrap_or_default();
                if !answer.trim().eq_ignore_ascii_case("y") {
                    return Err(err.into());
                }
            }
            Err(FetchError::NoQuestions) => {
                return Err("the feed had no questions for this selection".into());
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Prints one runner event. Returns `true` once the summary is shown.
fn render(event: RunnerEvent) -> bool {
    match event {
        RunnerEvent::Question {
            index,
            total,
            question,
        } => {
            println!();
            println!("Question {}/{}: {}", index + 1, total, question.text());
            for (i, option) in question.options().iter().enumerate() {
                println!("  {}. {option}", i + 1);
            }
            println!("({}s)", question.time_limit_secs());
        }
        RunnerEvent::Tick {
            question_secs,
            total_secs,
        } => {
            if question_secs <= 5 {
                println!("  {question_secs}s left");
            }
            if let Some(total) = total_secs.filter(|t| t % 30 == 0) {
                println!("  quiz time left {}", clock(total));
            }
        }
        RunnerEvent::Answered(record) => {
            if record.is_correct {
                println!("Correct!");
            } else {
                println!("Wrong. Answer: {}", record.correct_answers.join(" / "));
            }
        }
        RunnerEvent::TimedOut(record) => {
            println!("Time's up! Answer: {}", record.correct_answers.join(" / "));
        }
        RunnerEvent::Rejected(err) => println!("{err}"),
        RunnerEvent::Finished(summary) => {
            let result = &summary.result;
            println!();
            println!(
                "Score: {}/{} ({:.0}%)",
                result.score,
                result.total_questions,
                result.percentage()
            );
            println!("Points earned: {}", result.points_earned);
            if let Some(secs) = result.time_taken_secs {
                println!("Time taken: {}", clock(secs));
            }
            return true;
        }
        RunnerEvent::Persisted(_) => return true,
    }
    false
}

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

async fn list_quizzes(store: Arc<dyn RealtimeStore>) -> Result<(), Box<dyn std::error::Error>> {
    let quizzes = QuizAdminService::new(store).list_quizzes().await?;
    for quiz in quizzes.iter().filter(|q| q.active) {
        let limit = match quiz.time_limit_minutes() {
            0 => "untimed".to_string(),
            minutes => format!("{minutes} min"),
        };
        println!(
            "{}  {} [{}] {} questions, {} pts each, {limit}",
            quiz.id,
            quiz.title,
            quiz.category,
            quiz.number_of_questions.unwrap_or(0),
            quiz.points_per_correct_answer
        );
    }
    Ok(())
}

async fn leaderboard(
    store: Arc<dyn RealtimeStore>,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = LeaderboardService::new(store);

    if let Some(quiz_id) = &args.quiz_id {
        for (rank, entry) in service.quiz_results(quiz_id).await?.iter().enumerate() {
            println!(
                "{:>2}. {} {}/{}",
                rank + 1,
                entry.result.student_name,
                entry.result.score,
                entry.result.total_questions
            );
        }
        return Ok(());
    }

    let mut watch = service.watch_top_students(args.limit).await?;
    while let Some(board) = watch.next().await {
        for (rank, entry) in board.iter().enumerate() {
            println!(
                "{:>2}. {} {} pts (level {})",
                rank + 1,
                entry.name,
                entry.points,
                entry.level
            );
        }
        if !args.watch {
            break;
        }
        println!();
        // Coalesce bursts of writes into one redraw.
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    Ok(())
}

fn print_progress(report: &ProgressReport) {
    println!("Level {} ({} points)", report.level, report.points);
    println!(
        "{} quizzes, average {:.0}%",
        report.total_quizzes, report.average_percentage
    );
    for category in &report.categories {
        println!(
            "  {}: {} attempts, average {:.0}%, best {:.0}%",
            category.category,
            category.attempts,
            category.average_percentage,
            category.best_percentage
        );
    }
    if let Some(weakest) = report.weakest_category() {
        println!("Practise next: {}", weakest.category);
    }
}

fn print_profile(profile: &ProfileDoc) {
    let year = profile
        .year_of_passing
        .map(|y| y.to_string())
        .unwrap_or_default();
    for (label, value) in [
        ("Name", profile.name.as_str()),
        ("Email", profile.email.as_str()),
        ("Phone", profile.phone.as_str()),
        ("Institution", profile.institution.as_str()),
        ("Qualification", profile.qualification.as_str()),
        ("Year of passing", year.as_str()),
        ("Education", profile.education.as_str()),
    ] {
        println!("{label:>15}: {value}");
    }
    println!("{:>15}: {}", "Interests", profile.interests.join(", "));
}

//
// ─── VOCABULARY ────────────────────────────────────────────────────────────────
//

async fn vocab(generator: WordGenerator, generate: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut deck = WordDeck::builtin();
    for word in generator.stored_words().await {
        deck.add(word);
    }
    if generate {
        match generator.generate().await {
            Ok(word) => {
                println!("New word: {}", word.word);
                deck.add(word);
            }
            Err(err) => {
                log::warn!("word generation failed: {err}");
                eprintln!("could not generate a new word: {err}");
            }
        }
    }

    let mut game = VocabularyGame::new(deck);
    let mut rng = rand::rng();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    println!("Type what you think each word means.");

    while let Some(word) = game.next_word(&mut rng) {
        println!();
        println!("{}", word.word);
        let outcome = loop {
            let Some(line) = input.next_line().await? else {
                println!("Final score: {}", game.score());
                return Ok(());
            };
            if let Some(outcome) = game.submit_guess(&line) {
                break outcome;
            }
        };
        if outcome.correct {
            println!("Great job! +{} (score {})", outcome.points, game.score());
        } else {
            println!("Not quite right. (score {})", game.score());
        }
        println!("Meaning: {}", outcome.meaning);
        println!("Enter for the next word, q to quit.");

        let next = input.next_line().await?.unwrap_or_default();
        if next.trim().eq_ignore_ascii_case("q") {
            break;
        }
    }
    println!("Final score: {}", game.score());
    Ok(())
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

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
