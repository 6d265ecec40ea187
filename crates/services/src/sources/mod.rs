//! Where an attempt's questions come from.

use async_trait::async_trait;
use quiz_core::SessionSettings;
use quiz_core::model::{Question, ResultOrigin};

use crate::error::FetchError;

mod admin;
pub mod html;
mod open_trivia;
mod quiz_api;

pub use admin::AdminQuizSource;
pub(crate) use admin::sort_by_index;
pub use open_trivia::{OpenTriviaSource, TriviaItem, TriviaResponse};
pub use quiz_api::{QuizApiItem, QuizApiSource};

/// Points awarded per correct answer on the public feeds.
pub const FEED_POINTS_PER_CORRECT: u32 = 10;
/// Questions requested from the public feeds.
pub const FEED_QUESTION_COUNT: u32 = 10;

/// Everything an attempt needs to start.
#[derive(Debug, Clone)]
pub struct LoadedQuiz {
    pub questions: Vec<Question>,
    pub settings: SessionSettings,
    pub origin: ResultOrigin,
    pub title: String,
}

#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Load a fresh, ordered question list.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` when the source is unreachable, empty or malformed.
    async fn load(&self) -> Result<LoadedQuiz, FetchError>;
}

/// Maps a non-success feed status; 404 means the feed had nothing to give.
pub(crate) fn status_error(status: reqwest::StatusCode) -> FetchError {
    if status == reqwest::StatusCode::NOT_FOUND {
        FetchError::NoQuestions
    } else {
        FetchError::Status(status)
    }
}

/// Decoding failures are the feed's fault, not the network's.
pub(crate) fn body_error(err: reqwest::Error) -> FetchError {
    if err.is_decode() {
        FetchError::Malformed(err.to_string())
    } else {
        FetchError::Network(err)
    }
}

/// Keeps valid questions; an all-invalid batch is malformed, an empty one is empty.
pub(crate) fn collect_questions(
    total: usize,
    built: impl Iterator<Item = Result<Question, String>>,
) -> Result<Vec<Question>, FetchError> {
    if total == 0 {
        return Err(FetchError::NoQuestions);
    }
    let mut last_error = None;
    let questions: Vec<Question> = built
        .filter_map(|result| match result {
            Ok(question) => Some(question),
            Err(err) => {
                log::warn!("skipping unusable question: {err}");
                last_error = Some(err);
                None
            }
        })
        .collect();
    if questions.is_empty() {
        return Err(FetchError::Malformed(
            last_error.unwrap_or_else(|| "no usable questions".into()),
        ));
    }
    Ok(questions)
}
