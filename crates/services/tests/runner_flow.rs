use std::sync::Arc;
use std::time::Duration;

use quiz_core::model::{Correctness, Question, QuizDraft, ResultOrigin, UserId};
use quiz_core::{EndReason, SessionError, SessionSettings};
use serde_json::{Map, Value};
use services::reporter::QuizSummary;
use services::{
    Anonymous, LoadedQuiz, PersistenceStatus, QuizAdminService, QuizRunner, ResultReporter,
    RunnerConfig, RunnerEvent, StaticIdentity,
};
use services::leaderboard::LeaderboardService;
use services::sources::{AdminQuizSource, QuestionSource};
use storage::records::QuestionDoc;
use storage::{InMemoryStore, RealtimeStore, StorageError};
use tokio::sync::watch;
use tokio::time::Instant;

fn question(n: usize, limit: u32) -> Question {
    Question::new(
        format!("Q{n}"),
        vec!["wrong".into(), "right".into()],
        Correctness::Value("right".into()),
        limit,
    )
    .unwrap()
}

fn feed(count: usize, limit: u32, settings: SessionSettings) -> LoadedQuiz {
    LoadedQuiz {
        questions: (0..count).map(|n| question(n, limit)).collect(),
        settings,
        origin: ResultOrigin::Feed {
            category: "General".into(),
        },
        title: "flow".into(),
    }
}

fn signed_in(store: &Arc<InMemoryStore>) -> ResultReporter {
    ResultReporter::new(
        store.clone(),
        Arc::new(StaticIdentity::new(UserId::new("u1"), "Ada")),
    )
}

/// Skips to the summary, ignoring everything before it.
async fn summary(runner: &mut QuizRunner) -> Box<QuizSummary> {
    loop {
        if let RunnerEvent::Finished(summary) = runner.next_event().await.unwrap() {
            return summary;
        }
    }
}

/// The status that closes the event stream.
async fn persistence(runner: &mut QuizRunner) -> PersistenceStatus {
    let Some(RunnerEvent::Persisted(status)) = runner.next_event().await else {
        panic!("expected the persistence status after the summary");
    };
    assert!(runner.next_event().await.is_none());
    status
}

fn correct_index(question: &Question) -> usize {
    (0..question.options().len())
        .find(|&i| question.is_correct(i))
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn answering_everything_correctly_scores_ten() {
    let store = Arc::new(InMemoryStore::new());
    let mut runner = QuizRunner::start(
        feed(10, 30, SessionSettings::untimed(10)),
        signed_in(&store),
        RunnerConfig::default(),
    )
    .unwrap();

    let reported = loop {
        match runner.next_event().await.unwrap() {
            RunnerEvent::Question { question, .. } => {
                tokio::time::sleep(Duration::from_secs(3)).await;
                assert!(runner.select(correct_index(&question)).await);
            }
            RunnerEvent::TimedOut(_) => panic!("no question should time out"),
            RunnerEvent::Finished(reported) => break reported,
            _ => {}
        }
    };

    assert_eq!(reported.outcome.end, EndReason::Completed);
    assert_eq!(reported.outcome.score, 10);
    assert_eq!(reported.outcome.points_earned, 100);
    assert_eq!(reported.outcome.answered.len(), 10);
    assert!(reported.outcome.answered.iter().all(|r| !r.timed_out));
    assert_eq!(persistence(&mut runner).await, PersistenceStatus::Persisted);

    let student = LeaderboardService::new(store)
        .student(&UserId::new("u1"))
        .await
        .unwrap();
    assert_eq!(student.points, 100);
    assert_eq!(student.quizzes_completed, 1);
    assert_eq!(student.quiz_history[0].score, 10);
}

#[tokio::test(start_paused = true)]
async fn unanswered_question_times_out_then_advances() {
    let store = Arc::new(InMemoryStore::new());
    let started = Instant::now();
    let mut runner = QuizRunner::start(
        feed(2, 10, SessionSettings::untimed(10)),
        signed_in(&store),
        RunnerConfig::default(),
    )
    .unwrap();

    let mut ticks = Vec::new();
    let mut timed_out = None;
    loop {
        match runner.next_event().await.unwrap() {
            RunnerEvent::Tick { question_secs, .. } => ticks.push(question_secs),
            RunnerEvent::TimedOut(record) => timed_out = Some(record),
            RunnerEvent::Question { index: 1, .. } => break,
            _ => {}
        }
    }

    let record = timed_out.unwrap();
    assert!(record.timed_out);
    assert_eq!(record.selected_answer, None);
    assert!(!record.is_correct);
    assert_eq!(ticks, [9, 8, 7, 6, 5, 4, 3, 2, 1]);

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(11_500));
    assert!(elapsed < Duration::from_secs(12));
}

#[tokio::test(start_paused = true)]
async fn session_limit_cuts_a_long_quiz_short() {
    let store = Arc::new(InMemoryStore::new());
    let mut runner = QuizRunner::start(
        feed(20, 30, SessionSettings::untimed(10).with_total_limit(60)),
        signed_in(&store),
        RunnerConfig::default(),
    )
    .unwrap();

    let reported = summary(&mut runner).await;

    assert_eq!(reported.outcome.end, EndReason::TimeExpired);
    assert!((1..=2).contains(&reported.outcome.answered.len()));
    assert_eq!(reported.outcome.total_questions, 20);
    assert_eq!(reported.outcome.score, 0);
    assert_eq!(reported.result.time_taken_secs, Some(60));
    assert_eq!(persistence(&mut runner).await, PersistenceStatus::Persisted);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_selection_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let mut runner = QuizRunner::start(
        feed(1, 30, SessionSettings::untimed(10)),
        signed_in(&store),
        RunnerConfig::default(),
    )
    .unwrap();

    assert!(matches!(
        runner.next_event().await,
        Some(RunnerEvent::Question { index: 0, .. })
    ));
    runner.select(7).await;
    assert_eq!(
        runner.next_event().await,
        Some(RunnerEvent::Rejected(SessionError::InvalidOption { index: 7, len: 2 }))
    );

    runner.select(1).await;
    assert!(matches!(
        runner.next_event().await,
        Some(RunnerEvent::Answered(ref r)) if r.is_correct
    ));
}

#[tokio::test(start_paused = true)]
async fn dropped_runner_persists_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let mut runner = QuizRunner::start(
        feed(1, 30, SessionSettings::untimed(10)),
        signed_in(&store),
        RunnerConfig::default(),
    )
    .unwrap();

    runner.next_event().await.unwrap();
    runner.select(1).await;
    runner.cancel();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(store.get("students").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn anonymous_attempt_is_not_persisted() {
    let store = Arc::new(InMemoryStore::new());
    let reporter = ResultReporter::new(store.clone(), Arc::new(Anonymous));
    let mut runner = QuizRunner::start(
        feed(1, 5, SessionSettings::untimed(10)),
        reporter,
        RunnerConfig::default(),
    )
    .unwrap();

    let reported = summary(&mut runner).await;
    assert_eq!(
        persistence(&mut runner).await,
        PersistenceStatus::SkippedAnonymous
    );
    assert_eq!(reported.result.student_name, "Anonymous");
    assert_eq!(store.get("students").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn authored_quiz_runs_and_records_its_result() {
    let store = Arc::new(InMemoryStore::new());
    let admin = QuizAdminService::new(store.clone());
    let quiz_id = admin
        .create_quiz(QuizDraft {
            title: "Shell".into(),
            category: "Linux".into(),
            points_per_correct_answer: 25,
            time_limit_minutes: 5,
            ..QuizDraft::default()
        })
        .await
        .unwrap();
    for text in ["Which command lists files?", "Which command prints a file?"] {
        admin
            .add_question(
                &quiz_id,
                QuestionDoc {
                    question: text.into(),
                    options: vec!["ls".into(), "cat".into(), "cd".into()],
                    correct_answer: 0,
                    time_limit: 20,
                },
            )
            .await
            .unwrap();
    }

    let loaded = AdminQuizSource::new(store.clone(), quiz_id.clone())
        .load()
        .await
        .unwrap();
    assert_eq!(loaded.settings.total_time_limit_secs, Some(300));

    let mut runner =
        QuizRunner::start(loaded, signed_in(&store), RunnerConfig::default()).unwrap();
    let reported = loop {
        match runner.next_event().await.unwrap() {
            RunnerEvent::Question { .. } => {
                tokio::time::sleep(Duration::from_secs(4)).await;
                runner.select(0).await;
            }
            RunnerEvent::Finished(reported) => break reported,
            _ => {}
        }
    };
    assert_eq!(reported.outcome.score, 2);
    assert_eq!(reported.outcome.points_earned, 50);
    assert_eq!(persistence(&mut runner).await, PersistenceStatus::Persisted);

    let board = LeaderboardService::new(store.clone());
    let results = board.quiz_results(&quiz_id).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].uid, "u1");
    assert_eq!(results[0].result.score, reported.outcome.score);
    assert_eq!(
        results[0].result.total_questions,
        reported.outcome.total_questions
    );

    let student = board.student(&UserId::new("u1")).await.unwrap();
    assert_eq!(student.points, 50);
    assert!(student.completed_quizzes.contains_key(&quiz_id));
}

/// A store that never answers.
struct StalledStore;

#[async_trait::async_trait]
impl RealtimeStore for StalledStore {
    async fn get(&self, _path: &str) -> Result<Option<Value>, StorageError> {
        std::future::pending().await
    }

    async fn set(&self, _path: &str, _value: Value) -> Result<(), StorageError> {
        std::future::pending().await
    }

    async fn update(&self, _path: &str, _fields: Map<String, Value>) -> Result<(), StorageError> {
        std::future::pending().await
    }

    async fn subscribe(
        &self,
        _path: &str,
    ) -> Result<watch::Receiver<Option<Value>>, StorageError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn result_is_shown_while_the_store_is_stalled() {
    let reporter = ResultReporter::new(
        Arc::new(StalledStore),
        Arc::new(StaticIdentity::new(UserId::new("u1"), "Ada")),
    );
    let mut runner = QuizRunner::start(
        feed(1, 30, SessionSettings::untimed(10)),
        reporter,
        RunnerConfig::default(),
    )
    .unwrap();

    runner.next_event().await.unwrap();
    assert!(runner.select(1).await);

    let reported = tokio::time::timeout(Duration::from_secs(10), summary(&mut runner))
        .await
        .expect("summary must not wait for the store");
    assert_eq!(reported.outcome.score, 1);
    assert_eq!(reported.result.points_earned, 10);

    // The write is still hanging, so no status arrives.
    let status = tokio::time::timeout(Duration::from_secs(60), runner.next_event()).await;
    assert!(status.is_err());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_after_the_summary_still_persists() {
    let store = Arc::new(InMemoryStore::new());
    let mut runner = QuizRunner::start(
        feed(1, 30, SessionSettings::untimed(10).with_total_limit(600)),
        signed_in(&store),
        RunnerConfig::default(),
    )
    .unwrap();

    runner.next_event().await.unwrap();
    runner.select(1).await;
    let reported = summary(&mut runner).await;
    drop(runner);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let student = LeaderboardService::new(store)
        .student(&UserId::new("u1"))
        .await
        .unwrap();
    assert_eq!(student.points, u64::from(reported.result.points_earned));
    assert_eq!(student.quizzes_completed, 1);
}
