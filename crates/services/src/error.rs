//! Shared error types for the services crate.

use quiz_core::model::{ParseIdError, QuestionError, QuizError, QuizId};
use storage::repository::StorageError;
use thiserror::Error;

use crate::chat::ChatError;

/// Errors raised while loading questions for an attempt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    #[error("question feed request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("question feed responded with status {0}")]
    Status(reqwest::StatusCode),
    #[error("no questions available")]
    NoQuestions,
    #[error("quiz {0} not found")]
    NotFound(QuizId),
    #[error("malformed question data: {0}")]
    Malformed(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl FetchError {
    /// True for transport failures a user may sensibly retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::Status(_))
    }
}

/// Errors raised while persisting a finished attempt. Logged, never surfaced.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistenceError {
    #[error("failed to update student record: {0}")]
    Student(StorageError),
    #[error("failed to write quiz result: {0}")]
    QuizResult(StorageError),
}

/// Errors emitted by `AiReportGenerator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AiReportError {
    #[error("AI reports are not configured")]
    Disabled,
    #[error("AI report returned an empty response")]
    EmptyResponse,
    #[error("AI report request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("AI report could not be parsed: {0}")]
    Parse(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl From<ChatError> for AiReportError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::HttpStatus(status) => AiReportError::HttpStatus(status),
            ChatError::EmptyResponse => AiReportError::EmptyResponse,
            ChatError::Http(err) => AiReportError::Http(err),
        }
    }
}

/// Errors emitted by `WordGenerator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WordFetchError {
    #[error("word generation is not configured")]
    Disabled,
    #[error("still rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error(transparent)]
    Chat(ChatError),
    #[error("generated word could not be parsed: {0}")]
    Parse(String),
    #[error("generated word is missing its {0}")]
    Incomplete(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProfileService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("unknown interest {0:?}")]
    UnknownInterest(String),
    #[error("year of passing {0} is out of range")]
    InvalidYear(u32),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizAdminService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdminError {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error("quiz {0} not found")]
    NotFound(QuizId),
    #[error("question {index} does not exist (quiz has {len})")]
    QuestionIndex { index: usize, len: usize },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid QUIZ_UID: {0}")]
    InvalidUid(#[from] ParseIdError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_are_retryable() {
        assert!(FetchError::Status(reqwest::StatusCode::BAD_GATEWAY).is_retryable());
        assert!(!FetchError::NoQuestions.is_retryable());
        assert!(!FetchError::NotFound(QuizId::new("q1")).is_retryable());
        assert!(!FetchError::Malformed("x".into()).is_retryable());
    }
}
