use std::sync::Arc;

use quiz_core::model::{QuizResult, ResultOrigin, StudentRecord, UserId};
use quiz_core::{Clock, SessionOutcome};
use serde_json::{Map, Value, json};
use storage::RealtimeStore;
use storage::paths;
use storage::records::{QuizResultDoc, StudentDoc, get_doc, set_doc, to_value};

use crate::error::PersistenceError;
use crate::identity::{CurrentUser, Identity};

/// Name recorded on results when nobody is signed in.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// What happened to the remote copy of a result. Diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceStatus {
    Persisted,
    SkippedAnonymous,
    Failed,
}

/// A finished attempt as shown to the user, built from local state only.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSummary {
    pub result: QuizResult,
    pub outcome: SessionOutcome,
}

/// A summary plus whatever happened to its remote copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedResult {
    pub result: QuizResult,
    pub outcome: SessionOutcome,
    pub persistence: PersistenceStatus,
}

/// A summary waiting to be written for the user who was signed in when the
/// attempt ended.
#[derive(Debug, Clone)]
pub struct PendingReport {
    summary: QuizSummary,
    user: Option<CurrentUser>,
}

impl PendingReport {
    #[must_use]
    pub fn summary(&self) -> &QuizSummary {
        &self.summary
    }
}

/// Persists finished attempts for the signed-in student.
///
/// Writes are best effort: failures are logged and never alter the summary
/// handed back to the caller.
#[derive(Clone)]
pub struct ResultReporter {
    store: Arc<dyn RealtimeStore>,
    identity: Arc<dyn Identity>,
    clock: Clock,
}

impl ResultReporter {
    #[must_use]
    pub fn new(store: Arc<dyn RealtimeStore>, identity: Arc<dyn Identity>) -> Self {
        Self {
            store,
            identity,
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the summary without touching the store. Identity is read here.
    #[must_use]
    pub fn prepare(&self, outcome: SessionOutcome, origin: ResultOrigin) -> PendingReport {
        let user = self.identity.current_user();
        let result = QuizResult {
            score: outcome.score,
            total_questions: outcome.total_questions,
            points_earned: outcome.points_earned,
            time_taken_secs: outcome.time_taken_secs,
            completed_at: self.clock.now(),
            student_name: user
                .as_ref()
                .map_or_else(|| ANONYMOUS_NAME.to_string(), |u| u.display_name.clone()),
            origin,
        };
        PendingReport {
            summary: QuizSummary { result, outcome },
            user,
        }
    }

    /// Writes a prepared summary. Anonymous attempts are skipped.
    pub async fn persist(&self, pending: &PendingReport) -> PersistenceStatus {
        match &pending.user {
            None => {
                log::info!("anonymous attempt finished; result kept local");
                PersistenceStatus::SkippedAnonymous
            }
            Some(user) => self.persist_for(user, &pending.summary.result).await,
        }
    }

    /// `prepare` followed by `persist`.
    pub async fn report(&self, outcome: SessionOutcome, origin: ResultOrigin) -> ReportedResult {
        let pending = self.prepare(outcome, origin);
        let persistence = self.persist(&pending).await;
        let QuizSummary { result, outcome } = pending.summary;
        ReportedResult {
            result,
            outcome,
            persistence,
        }
    }

    async fn persist_for(&self, user: &CurrentUser, result: &QuizResult) -> PersistenceStatus {
        let mut failed = false;
        if let Err(err) = self.update_student(user, result).await {
            log::warn!("{err}");
            failed = true;
        }
        if let Some(quiz_id) = result.origin.quiz_id() {
            let path = paths::quiz_result(quiz_id, &user.uid);
            if let Err(err) = set_doc(self.store.as_ref(), &path, &QuizResultDoc::from_result(result))
                .await
                .map_err(PersistenceError::QuizResult)
            {
                log::warn!("{err}");
                failed = true;
            }
        }

        if failed {
            PersistenceStatus::Failed
        } else {
            log::info!(
                "saved result for {}: {}/{} (+{} points)",
                user.uid,
                result.score,
                result.total_questions,
                result.points_earned
            );
            PersistenceStatus::Persisted
        }
    }

    /// Read-modify-merge of the student record: points accumulate, history
    /// grows by one entry, admin quizzes land in `completedQuizzes`.
    async fn update_student(
        &self,
        user: &CurrentUser,
        result: &QuizResult,
    ) -> Result<(), PersistenceError> {
        let path = paths::student(&user.uid);
        let fields = self
            .student_fields(&path, &user.uid, &user.display_name, result)
            .await
            .map_err(PersistenceError::Student)?;
        self.store
            .update(&path, fields)
            .await
            .map_err(PersistenceError::Student)
    }

    async fn student_fields(
        &self,
        path: &str,
        uid: &UserId,
        name: &str,
        result: &QuizResult,
    ) -> Result<Map<String, Value>, storage::StorageError> {
        let existing: Option<StudentDoc> = get_doc(self.store.as_ref(), path).await?;
        let is_new = existing.is_none();
        let mut record = match existing {
            Some(doc) => doc.into_record()?,
            None => {
                log::debug!("creating student record for {uid}");
                StudentRecord::new(name)
            }
        };
        record.record_result(result);
        let doc = StudentDoc::from_record(&record);

        let mut fields = Map::new();
        if is_new || doc.name.is_empty() {
            fields.insert("name".into(), json!(name));
        }
        fields.insert("points".into(), json!(doc.points));
        fields.insert("quizzesCompleted".into(), json!(doc.quizzes_completed));
        fields.insert("quizHistory".into(), to_value(&doc.quiz_history)?);
        if let Some(quiz_id) = result.origin.quiz_id() {
            fields.insert(
                paths::join(paths::COMPLETED_QUIZZES, quiz_id.as_str()),
                to_value(&QuizResultDoc::from_result(result))?,
            );
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Anonymous, StaticIdentity};
    use quiz_core::EndReason;
    use quiz_core::model::QuizId;
    use quiz_core::time::fixed_clock;
    use storage::InMemoryStore;

    fn outcome(score: u32, points: u32) -> SessionOutcome {
        SessionOutcome {
            score,
            total_questions: 10,
            points_earned: points,
            time_taken_secs: Some(42),
            answered: Vec::new(),
            end: EndReason::Completed,
        }
    }

    fn quiz_origin() -> ResultOrigin {
        ResultOrigin::Quiz {
            quiz_id: QuizId::new("q1"),
            category: "Linux".into(),
        }
    }

    fn reporter(store: &Arc<InMemoryStore>) -> ResultReporter {
        let store: Arc<dyn RealtimeStore> = store.clone();
        ResultReporter::new(store, Arc::new(StaticIdentity::new(UserId::new("u1"), "Ada")))
            .with_clock(fixed_clock())
    }

    #[tokio::test]
    async fn anonymous_results_stay_local() {
        let store = Arc::new(InMemoryStore::new());
        let reporter = ResultReporter::new(store.clone(), Arc::new(Anonymous));
        let reported = reporter
            .report(outcome(3, 30), ResultOrigin::Feed { category: "Trivia".into() })
            .await;

        assert_eq!(reported.persistence, PersistenceStatus::SkippedAnonymous);
        assert_eq!(reported.result.student_name, ANONYMOUS_NAME);
        assert_eq!(store.get("students").await.unwrap(), None);
    }

    #[tokio::test]
    async fn feed_result_accumulates_points_and_history() {
        let store = Arc::new(InMemoryStore::new());
        store
            .set("students/u1", json!({ "name": "Ada", "email": "ada@example.com", "points": 15 }))
            .await
            .unwrap();

        let reported = reporter(&store)
            .report(outcome(7, 70), ResultOrigin::Feed { category: "Trivia".into() })
            .await;
        assert_eq!(reported.persistence, PersistenceStatus::Persisted);

        let student = store.get("students/u1").await.unwrap().unwrap();
        assert_eq!(student["points"], json!(85));
        assert_eq!(student["quizzesCompleted"], json!(1));
        assert_eq!(student["email"], json!("ada@example.com"));
        assert_eq!(student["quizHistory"][0]["score"], json!(7));
        assert_eq!(student["quizHistory"][0]["totalQuestions"], json!(10));
        assert!(student.get("completedQuizzes").is_none());
    }

    #[tokio::test]
    async fn quiz_result_is_written_twice_and_matches_outcome() {
        let store = Arc::new(InMemoryStore::new());
        let reporter = reporter(&store);

        reporter.report(outcome(4, 20), quiz_origin()).await;
        let reported = reporter.report(outcome(6, 30), quiz_origin()).await;
        assert_eq!(reported.result.score, 6);

        let stored = store.get("quizResults/q1/u1").await.unwrap().unwrap();
        assert_eq!(stored["score"], json!(reported.result.score));
        assert_eq!(stored["totalQuestions"], json!(reported.result.total_questions));
        assert_eq!(stored["timeTaken"], json!(42));
        assert_eq!(stored["studentName"], json!("Ada"));

        let student = store.get("students/u1").await.unwrap().unwrap();
        assert_eq!(student["points"], json!(50), "points accumulate across attempts");
        assert_eq!(student["quizzesCompleted"], json!(2));
        assert_eq!(student["completedQuizzes"]["q1"]["score"], json!(6));
        assert_eq!(student["quizHistory"].as_array().unwrap().len(), 2);
    }

    struct OfflineStore;

    #[async_trait::async_trait]
    impl RealtimeStore for OfflineStore {
        async fn get(&self, _path: &str) -> Result<Option<Value>, storage::StorageError> {
            Err(storage::StorageError::Connection("offline".into()))
        }

        async fn set(&self, _path: &str, _value: Value) -> Result<(), storage::StorageError> {
            Err(storage::StorageError::Connection("offline".into()))
        }

        async fn update(
            &self,
            _path: &str,
            _fields: Map<String, Value>,
        ) -> Result<(), storage::StorageError> {
            Err(storage::StorageError::Connection("offline".into()))
        }

        async fn subscribe(
            &self,
            _path: &str,
        ) -> Result<tokio::sync::watch::Receiver<Option<Value>>, storage::StorageError> {
            Err(storage::StorageError::Connection("offline".into()))
        }
    }

    #[tokio::test]
    async fn write_failure_keeps_local_summary() {
        let reporter = ResultReporter::new(
            Arc::new(OfflineStore),
            Arc::new(StaticIdentity::new(UserId::new("u1"), "Ada")),
        );
        let reported = reporter.report(outcome(9, 45), quiz_origin()).await;

        assert_eq!(reported.persistence, PersistenceStatus::Failed);
        assert_eq!(reported.result.score, 9);
        assert_eq!(reported.result.points_earned, 45);
        assert_eq!(reported.outcome, outcome(9, 45));
    }
}
