use thiserror::Error;

use crate::model::{QuestionError, QuizError};
use crate::session::SessionError;

/// Any domain validation failure raised by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
