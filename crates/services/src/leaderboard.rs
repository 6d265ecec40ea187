use std::cmp::Reverse;
use std::sync::Arc;

use quiz_core::model::{POINTS_PER_LEVEL, QuizId, QuizResult, StudentRecord, UserId};
use serde_json::Value;
use storage::records::{QuizResultDoc, StudentDoc, get_children, get_doc};
use storage::{RealtimeStore, StorageError, paths};
use tokio::sync::watch;

/// Default size of the dashboard leaderboard.
pub const DEFAULT_LEADERBOARD_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub uid: String,
    pub name: String,
    pub points: u64,
    pub level: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizResultEntry {
    pub uid: String,
    pub result: QuizResult,
}

/// Read-only rankings over student records and quiz results.
#[derive(Clone)]
pub struct LeaderboardService {
    store: Arc<dyn RealtimeStore>,
}

/// Most points first; ties by name so the order is stable.
fn rank(students: Vec<(String, StudentDoc)>, limit: usize) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = students
        .into_iter()
        .map(|(uid, doc)| LeaderboardEntry {
            uid,
            name: doc.name,
            points: doc.points,
            level: doc.points / POINTS_PER_LEVEL + 1,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.uid.cmp(&b.uid))
    });
    entries.truncate(limit);
    entries
}

impl LeaderboardService {
    #[must_use]
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the students cannot be read.
    pub async fn top_students(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let students = get_children(self.store.as_ref(), paths::STUDENTS).await?;
        Ok(rank(students, limit))
    }

    /// Every stored attempt at `quiz_id`, best score first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the results cannot be read.
    pub async fn quiz_results(&self, quiz_id: &QuizId) -> Result<Vec<QuizResultEntry>, StorageError> {
        let docs: Vec<(String, QuizResultDoc)> =
            get_children(self.store.as_ref(), &paths::quiz_results(quiz_id)).await?;
        let mut entries: Vec<QuizResultEntry> = docs
            .into_iter()
            .map(|(uid, doc)| QuizResultEntry {
                uid,
                result: doc.into_result(quiz_id.clone()),
            })
            .collect();
        entries.sort_by_key(|e| (Reverse(e.result.score), e.result.time_taken_secs, e.uid.clone()));
        Ok(entries)
    }

    /// Load one student's record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the student has no record.
    pub async fn student(&self, uid: &UserId) -> Result<StudentRecord, StorageError> {
        let doc: StudentDoc = get_doc(self.store.as_ref(), &paths::student(uid))
            .await?
            .ok_or(StorageError::NotFound)?;
        doc.into_record()
    }

    /// Live leaderboard: yields the current board, then a new one on every
    /// change under `students`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the subscription cannot be opened.
    pub async fn watch_top_students(&self, limit: usize) -> Result<LeaderboardWatch, StorageError> {
        let receiver = self.store.subscribe(paths::STUDENTS).await?;
        Ok(LeaderboardWatch {
            receiver,
            limit,
            primed: false,
        })
    }
}

pub struct LeaderboardWatch {
    receiver: watch::Receiver<Option<Value>>,
    limit: usize,
    primed: bool,
}

impl LeaderboardWatch {
    /// Next board, or `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Vec<LeaderboardEntry>> {
        if self.primed {
            self.receiver.changed().await.ok()?;
        }
        self.primed = true;
        let students = self
            .receiver
            .borrow_and_update()
            .clone()
            .map(storage::records::children::<StudentDoc>)
            .unwrap_or_default();
        Some(rank(students, self.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storage::InMemoryStore;

    async fn seeded() -> Arc<dyn RealtimeStore> {
        let store = InMemoryStore::new();
        store
            .set(
                "students",
                json!({
                    "a": { "name": "Ada", "points": 120 },
                    "b": { "name": "Bob", "points": 40 },
                    "c": { "name": "Cy", "points": 300 },
                    "d": { "name": "Di", "points": 40 },
                    "e": { "name": "Ed", "points": 5 },
                    "f": { "name": "Flo", "points": 0 }
                }),
            )
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn top_students_sorted_and_limited() {
        let board = LeaderboardService::new(seeded().await)
            .top_students(DEFAULT_LEADERBOARD_SIZE)
            .await
            .unwrap();

        let names: Vec<&str> = board.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Cy", "Ada", "Bob", "Di", "Ed"]);
        assert_eq!(board[0].level, 4);
        assert_eq!(board[1].level, 2);
    }

    #[tokio::test]
    async fn quiz_results_best_score_first() {
        let store = InMemoryStore::new();
        store
            .set(
                "quizResults/q1",
                json!({
                    "u1": { "score": 3, "totalQuestions": 5, "completedAt": "2024-03-01T10:00:00Z", "studentName": "A" },
                    "u2": { "score": 5, "totalQuestions": 5, "completedAt": "2024-03-01T11:00:00Z", "studentName": "B" }
                }),
            )
            .await
            .unwrap();
        let results = LeaderboardService::new(Arc::new(store))
            .quiz_results(&QuizId::new("q1"))
            .await
            .unwrap();
        assert_eq!(results[0].uid, "u2");
        assert_eq!(results[1].result.score, 3);
    }

    #[tokio::test]
    async fn missing_student_is_not_found() {
        let err = LeaderboardService::new(seeded().await)
            .student(&UserId::new("zz"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn watch_yields_current_then_updates() {
        let store = seeded().await;
        let service = LeaderboardService::new(store.clone());
        let mut watch = service.watch_top_students(2).await.unwrap();

        let first = watch.next().await.unwrap();
        assert_eq!(first[0].name, "Cy");

        store.set("students/f/points", json!(1000)).await.unwrap();
        let second = watch.next().await.unwrap();
        assert_eq!(second[0].name, "Flo");
        assert_eq!(second.len(), 2);
    }
}
