#![forbid(unsafe_code)]

pub mod admin;
pub mod ai_report;
pub mod chat;
pub mod config;
pub mod error;
pub mod identity;
pub mod leaderboard;
pub mod profile;
pub mod progress;
pub mod reporter;
pub mod runner;
pub mod sources;
pub mod vocabulary;

pub use quiz_core::Clock;

pub use admin::QuizAdminService;
pub use ai_report::{AiReport, AiReportGenerator, ReportSection, parse_report};
pub use chat::{ChatClient, ChatCompletion, ChatError};
pub use config::{AiConfig, QuizConfig};
pub use error::{
    AdminError, AiReportError, ConfigError, FetchError, PersistenceError, ProfileError,
    WordFetchError,
};
pub use identity::{Anonymous, CurrentUser, Identity, StaticIdentity};
pub use leaderboard::{
    DEFAULT_LEADERBOARD_SIZE, LeaderboardEntry, LeaderboardService, LeaderboardWatch,
    QuizResultEntry,
};
pub use profile::{INTERESTS, ProfileService, ProfileUpdate};
pub use progress::{CategoryProgress, ProgressReport, TimelinePoint};
pub use reporter::{PendingReport, PersistenceStatus, QuizSummary, ReportedResult, ResultReporter};
pub use runner::{QuizRunner, RunnerConfig, RunnerEvent};
pub use sources::{
    AdminQuizSource, LoadedQuiz, OpenTriviaSource, QuestionSource, QuizApiSource,
};
pub use vocabulary::{
    GuessOutcome, VocabWord, VocabularyGame, WordDeck, WordGenerator, builtin_words,
};
