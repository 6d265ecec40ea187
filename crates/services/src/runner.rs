//! Async driver that owns an attempt's timers.
//!
//! One tokio task holds the `QuizSession` and every timer. Selections arrive
//! over a command channel and everything the UI needs to render leaves over
//! an event channel. Dropping the handle before the attempt ends aborts the
//! task, and with it every pending timer, without persisting anything.
//!
//! The result is shown from local state first. Writes run afterwards on their
//! own task, which outlives the handle so a record is never half written.

use std::future;
use std::pin::Pin;
use std::time::Duration;

use quiz_core::model::{Question, ResultOrigin};
use quiz_core::{AnsweredRecord, QuizSession, SessionError, SessionEvent, SessionPhase};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};

use crate::reporter::{PersistenceStatus, QuizSummary, ResultReporter};
use crate::sources::LoadedQuiz;

/// Pause between an answer (or timeout) and the next question.
pub const DEFAULT_ADVANCE_DELAY: Duration = Duration::from_millis(1500);
const MIN_ADVANCE_DELAY: Duration = Duration::from_secs(1);
const MAX_ADVANCE_DELAY: Duration = Duration::from_secs(2);

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    advance_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            advance_delay: DEFAULT_ADVANCE_DELAY,
        }
    }
}

impl RunnerConfig {
    /// Delay is clamped to 1–2 s.
    #[must_use]
    pub fn with_advance_delay(mut self, delay: Duration) -> Self {
        self.advance_delay = delay.clamp(MIN_ADVANCE_DELAY, MAX_ADVANCE_DELAY);
        self
    }

    #[must_use]
    pub fn advance_delay(&self) -> Duration {
        self.advance_delay
    }
}

/// What the UI sees of an attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    /// A question is on screen and its countdown is running.
    Question {
        index: usize,
        total: usize,
        question: Question,
    },
    Tick {
        question_secs: u32,
        total_secs: Option<u32>,
    },
    Answered(AnsweredRecord),
    TimedOut(AnsweredRecord),
    /// A selection the session refused, e.g. an option that does not exist.
    Rejected(SessionError),
    /// Terminal. Built from local state; persistence has not happened yet.
    Finished(Box<QuizSummary>),
    /// Last event of an attempt: what became of the stored copy.
    Persisted(PersistenceStatus),
}

#[derive(Debug)]
enum Command {
    Select(usize),
}

/// Handle to a running attempt.
pub struct QuizRunner {
    commands: mpsc::Sender<Command>,
    events: mpsc::UnboundedReceiver<RunnerEvent>,
    task: JoinHandle<()>,
}

impl QuizRunner {
    /// Start an attempt on a freshly loaded question list.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if the list has no questions.
    pub fn start(
        loaded: LoadedQuiz,
        reporter: ResultReporter,
        config: RunnerConfig,
    ) -> Result<Self, SessionError> {
        let session = QuizSession::new(loaded.questions, loaded.settings)?;
        log::info!(
            "starting attempt \"{}\" with {} questions",
            loaded.title,
            session.total_questions()
        );

        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            session,
            origin: loaded.origin,
            reporter,
            config,
            events: event_tx,
        };
        let task = tokio::spawn(driver.run(command_rx));

        Ok(Self {
            commands: command_tx,
            events: event_rx,
            task,
        })
    }

    /// Select an option on the current question.
    ///
    /// Returns `false` once the attempt is over.
    pub async fn select(&self, option: usize) -> bool {
        self.commands.send(Command::Select(option)).await.is_ok()
    }

    /// Next event, or `None` after `Persisted` or cancellation.
    pub async fn next_event(&mut self) -> Option<RunnerEvent> {
        self.events.recv().await
    }

    /// Abandon the attempt. Nothing is persisted unless it already finished.
    pub fn cancel(self) {
        log::info!("attempt cancelled");
        drop(self);
    }
}

impl Drop for QuizRunner {
    fn drop(&mut self) {
        self.task.abort();
    }
}

//
// ─── DRIVER TASK ───────────────────────────────────────────────────────────────
//

enum Step {
    SessionTick,
    QuestionTick,
    Advance,
    Select(usize),
    Closed,
}

struct Driver {
    session: QuizSession,
    origin: ResultOrigin,
    reporter: ResultReporter,
    config: RunnerConfig,
    events: mpsc::UnboundedSender<RunnerEvent>,
}

fn second_interval() -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick_opt(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => future::pending().await,
    }
}

async fn sleep_opt(delay: &mut Option<Pin<Box<Sleep>>>) {
    match delay {
        Some(delay) => delay.as_mut().await,
        None => future::pending().await,
    }
}

impl Driver {
    fn emit(&self, event: RunnerEvent) {
        // A closed receiver means the handle is gone and the task is about
        // to be aborted.
        let _ = self.events.send(event);
    }

    fn emit_question(&self) {
        self.emit(RunnerEvent::Question {
            index: self.session.current_index(),
            total: self.session.total_questions(),
            question: self.session.current_question().clone(),
        });
    }

    fn emit_tick(&self) {
        self.emit(RunnerEvent::Tick {
            question_secs: self.session.remaining_question_secs(),
            total_secs: self.session.remaining_total_secs(),
        });
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut session_timer = self.session.remaining_total_secs().map(|_| second_interval());
        let mut question_timer = second_interval();
        let mut pending_advance: Option<Pin<Box<Sleep>>> = None;

        self.emit_question();

        loop {
            // Session timer first, so its expiry beats any same-instant answer
            // or advance.
            let step = tokio::select! {
                biased;
                () = tick_opt(&mut session_timer) => Step::SessionTick,
                _ = question_timer.tick() => Step::QuestionTick,
                () = sleep_opt(&mut pending_advance) => Step::Advance,
                command = commands.recv() => match command {
                    Some(Command::Select(option)) => Step::Select(option),
                    None => Step::Closed,
                },
            };

            let event = match step {
                Step::SessionTick => {
                    let event = self.session.tick_session();
                    if event.is_none() {
                        self.emit_tick();
                    }
                    event
                }
                Step::QuestionTick => {
                    let event = self.session.tick_question();
                    if event.is_none() && self.session.phase() == SessionPhase::Answering {
                        self.emit_tick();
                    }
                    event
                }
                Step::Advance => {
                    pending_advance = None;
                    self.session.advance()
                }
                Step::Select(option) => match self.session.select(option) {
                    Ok(event) => event,
                    Err(err) => {
                        log::debug!("rejected selection: {err}");
                        self.emit(RunnerEvent::Rejected(err));
                        None
                    }
                },
                Step::Closed => {
                    log::debug!("runner handle dropped; stopping attempt");
                    return;
                }
            };

            let Some(event) = event else {
                continue;
            };
            match event {
                SessionEvent::Answered(record) => {
                    pending_advance = Some(Box::pin(tokio::time::sleep(self.config.advance_delay)));
                    self.emit(RunnerEvent::Answered(record));
                }
                SessionEvent::TimedOut(record) => {
                    pending_advance = Some(Box::pin(tokio::time::sleep(self.config.advance_delay)));
                    self.emit(RunnerEvent::TimedOut(record));
                }
                SessionEvent::Advanced { .. } => {
                    question_timer = second_interval();
                    self.emit_question();
                }
                SessionEvent::Finished(outcome) => {
                    drop(pending_advance.take());
                    log::info!(
                        "attempt finished ({:?}): {}/{}",
                        outcome.end,
                        outcome.score,
                        outcome.total_questions
                    );
                    let pending = self.reporter.prepare(outcome, self.origin.clone());
                    self.emit(RunnerEvent::Finished(Box::new(pending.summary().clone())));

                    // Detached: aborting the driver must not cut the writes short.
                    let reporter = self.reporter.clone();
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        let status = reporter.persist(&pending).await;
                        let _ = events.send(RunnerEvent::Persisted(status));
                    });
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_delay_is_clamped_to_the_allowed_window() {
        assert_eq!(
            RunnerConfig::default().advance_delay(),
            Duration::from_millis(1500)
        );
        let fast = RunnerConfig::default().with_advance_delay(Duration::from_millis(10));
        assert_eq!(fast.advance_delay(), Duration::from_secs(1));
        let slow = RunnerConfig::default().with_advance_delay(Duration::from_secs(30));
        assert_eq!(slow.advance_delay(), Duration::from_secs(2));
    }
}
