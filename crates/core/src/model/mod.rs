mod ids;
mod question;
mod quiz;
mod result;
mod student;

pub use ids::{ParseIdError, QuizId, UserId};

pub use question::{
    Correctness, DEFAULT_TIME_LIMIT_SECS, MAX_OPTIONS, MIN_OPTIONS, Question, QuestionError,
};
pub use quiz::{
    MAX_TIME_LIMIT_MINUTES, QuizDefinition, QuizDraft, QuizError, ValidatedQuiz, minutes_to_secs,
};
pub use result::{QuizHistoryEntry, QuizResult, ResultOrigin};
pub use student::{POINTS_PER_LEVEL, StudentRecord};
