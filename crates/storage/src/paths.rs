//! Store layout. Every key the platform reads or writes is built here.

use quiz_core::model::{QuizId, UserId};

use crate::repository::StorageError;

pub const STUDENTS: &str = "students";
pub const QUIZZES: &str = "quizzes";
pub const QUIZ_QUESTIONS: &str = "quizQuestions";
pub const QUIZ_RESULTS: &str = "quizResults";

/// Generated vocabulary words, keyed by push id.
pub const WORDS: &str = "words";

/// Child key under a student record holding per-quiz results.
pub const COMPLETED_QUIZZES: &str = "completedQuizzes";

/// Child key under a student record holding the editable profile.
pub const PROFILE: &str = "profile";

#[must_use]
pub fn student(uid: &UserId) -> String {
    join(STUDENTS, uid.as_str())
}

#[must_use]
pub fn profile(uid: &UserId) -> String {
    join(&student(uid), PROFILE)
}

#[must_use]
pub fn quiz(id: &QuizId) -> String {
    join(QUIZZES, id.as_str())
}

#[must_use]
pub fn quiz_questions(id: &QuizId) -> String {
    join(QUIZ_QUESTIONS, id.as_str())
}

#[must_use]
pub fn quiz_results(id: &QuizId) -> String {
    join(QUIZ_RESULTS, id.as_str())
}

#[must_use]
pub fn quiz_result(id: &QuizId, uid: &UserId) -> String {
    join(&quiz_results(id), uid.as_str())
}

/// Joins two path fragments with a single `/`.
#[must_use]
pub fn join(base: &str, child: &str) -> String {
    let base = base.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    if base.is_empty() {
        child.to_string()
    } else {
        format!("{base}/{child}")
    }
}

const RESERVED: &[char] = &['.', '#', '$', '[', ']'];

/// Splits a path into validated segments. The empty path is the root.
///
/// # Errors
///
/// Returns `StorageError::InvalidPath` for empty or reserved segments.
pub fn segments(path: &str) -> Result<Vec<String>, StorageError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split('/')
        .map(|seg| {
            if seg.is_empty() || seg.contains(RESERVED) {
                Err(StorageError::InvalidPath(path.to_string()))
            } else {
                Ok(seg.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_result_path() {
        let path = quiz_result(&QuizId::new("q1"), &UserId::new("u1"));
        assert_eq!(path, "quizResults/q1/u1");
    }

    #[test]
    fn profile_lives_under_the_student() {
        assert_eq!(profile(&UserId::new("u1")), "students/u1/profile");
    }

    #[test]
    fn join_handles_slashes_and_root() {
        assert_eq!(join("students/", "/u1"), "students/u1");
        assert_eq!(join("", "students"), "students");
    }

    #[test]
    fn segments_reject_reserved_and_empty() {
        assert_eq!(segments("/students/u1/").unwrap(), vec!["students", "u1"]);
        assert!(segments("").unwrap().is_empty());
        assert!(matches!(
            segments("students//u1"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(segments("students/a.b").is_err());
    }
}
