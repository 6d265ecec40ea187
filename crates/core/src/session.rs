//! Timed quiz attempt state machine.
//!
//! `QuizSession` is pure: it never sleeps or spawns. A driver feeds it one
//! event at a time (a selection, one second of either countdown, or the end
//! of the post-answer display delay) and reacts to the returned
//! [`SessionEvent`]. Every guard lives here, so a late timer callback that
//! reaches a locked or terminal session is simply ignored.

use log::debug;
use thiserror::Error;

use crate::model::Question;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,

    #[error("option {index} does not exist (question has {len} options)")]
    InvalidOption { index: usize, len: usize },
}

//
// ─── SETTINGS & RECORDS ────────────────────────────────────────────────────────
//

/// Scoring and timing rules for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub points_per_correct_answer: u32,
    /// Whole-attempt countdown; `None` disables the session timer.
    pub total_time_limit_secs: Option<u32>,
}

impl SessionSettings {
    #[must_use]
    pub fn untimed(points_per_correct_answer: u32) -> Self {
        Self {
            points_per_correct_answer,
            total_time_limit_secs: None,
        }
    }

    #[must_use]
    pub fn with_total_limit(mut self, secs: u32) -> Self {
        self.total_time_limit_secs = (secs > 0).then_some(secs);
        self
    }
}

/// Log entry written once per question, in question order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnsweredRecord {
    pub question_index: usize,
    pub question_text: String,
    pub selected_answer: Option<String>,
    pub correct_answers: Vec<String>,
    pub is_correct: bool,
    pub timed_out: bool,
}

/// Why an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Every question was answered or timed out.
    Completed,
    /// The session timer ran out first.
    TimeExpired,
}

/// Terminal result of an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub score: u32,
    pub total_questions: u32,
    pub points_earned: u32,
    pub time_taken_secs: Option<u32>,
    pub answered: Vec<AnsweredRecord>,
    pub end: EndReason,
}

/// Where the attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for a selection on the current question.
    Answering,
    /// The current question is answered or timed out; an advance is due.
    Locked,
    Terminal,
}

/// Transition produced by a session operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Answered(AnsweredRecord),
    TimedOut(AnsweredRecord),
    Advanced { index: usize },
    Finished(SessionOutcome),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// State of one quiz attempt, from the first question to a terminal result.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<Question>,
    settings: SessionSettings,
    current: usize,
    selected: Option<usize>,
    locked: bool,
    score: u32,
    remaining_question_secs: u32,
    remaining_total_secs: Option<u32>,
    answered: Vec<AnsweredRecord>,
    end: Option<EndReason>,
}

impl QuizSession {
    /// Start an attempt on the first question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if `questions` is empty.
    pub fn new(questions: Vec<Question>, settings: SessionSettings) -> Result<Self, SessionError> {
        let first = questions.first().ok_or(SessionError::Empty)?;
        let remaining_question_secs = first.time_limit_secs();
        let total = settings.total_time_limit_secs.filter(|secs| *secs > 0);

        Ok(Self {
            settings: SessionSettings {
                total_time_limit_secs: total,
                ..settings
            },
            current: 0,
            selected: None,
            locked: false,
            score: 0,
            remaining_question_secs,
            remaining_total_secs: total,
            answered: Vec::with_capacity(questions.len()),
            end: None,
            questions,
        })
    }

    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn remaining_question_secs(&self) -> u32 {
        self.remaining_question_secs
    }

    #[must_use]
    pub fn remaining_total_secs(&self) -> Option<u32> {
        self.remaining_total_secs
    }

    #[must_use]
    pub fn answered(&self) -> &[AnsweredRecord] {
        &self.answered
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.end.is_some()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.is_terminal() {
            SessionPhase::Terminal
        } else if self.locked {
            SessionPhase::Locked
        } else {
            SessionPhase::Answering
        }
    }

    /// Select an option on the current question.
    ///
    /// Locks the question on the first selection. Later selections, and any
    /// selection after the attempt ended, return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidOption` for an index outside the options.
    pub fn select(&mut self, option: usize) -> Result<Option<SessionEvent>, SessionError> {
        if self.is_terminal() || self.locked {
            return Ok(None);
        }
        let question = &self.questions[self.current];
        let len = question.options().len();
        if option >= len {
            return Err(SessionError::InvalidOption { index: option, len });
        }

        let is_correct = question.is_correct(option);
        let record = AnsweredRecord {
            question_index: self.current,
            question_text: question.text().to_string(),
            selected_answer: Some(question.options()[option].clone()),
            correct_answers: question.correct_answers(),
            is_correct,
            timed_out: false,
        };

        self.selected = Some(option);
        self.locked = true;
        if is_correct {
            self.score += 1;
        }
        self.answered.push(record.clone());
        debug!(
            "question {} answered with option {option} (correct: {is_correct})",
            self.current
        );
        Ok(Some(SessionEvent::Answered(record)))
    }

    /// One second of the per-question countdown.
    ///
    /// Ignored while the question is locked. Reaching zero records a timeout.
    pub fn tick_question(&mut self) -> Option<SessionEvent> {
        if self.is_terminal() || self.locked {
            return None;
        }
        self.remaining_question_secs = self.remaining_question_secs.saturating_sub(1);
        if self.remaining_question_secs > 0 {
            return None;
        }

        let question = &self.questions[self.current];
        let record = AnsweredRecord {
            question_index: self.current,
            question_text: question.text().to_string(),
            selected_answer: None,
            correct_answers: question.correct_answers(),
            is_correct: false,
            timed_out: true,
        };
        self.locked = true;
        self.answered.push(record.clone());
        debug!("question {} timed out", self.current);
        Some(SessionEvent::TimedOut(record))
    }

    /// One second of the whole-attempt countdown.
    ///
    /// Reaching zero ends the attempt at once, even with an advance pending.
    pub fn tick_session(&mut self) -> Option<SessionEvent> {
        if self.is_terminal() {
            return None;
        }
        let remaining = self.remaining_total_secs.as_mut()?;
        *remaining = remaining.saturating_sub(1);
        if *remaining > 0 {
            return None;
        }
        debug!("session timer expired on question {}", self.current);
        Some(self.finish(EndReason::TimeExpired))
    }

    /// Move past a locked question, to the next one or to the end.
    ///
    /// Returns `None` unless the current question is locked and the attempt
    /// is still running, so a stale advance never double-processes.
    pub fn advance(&mut self) -> Option<SessionEvent> {
        if self.is_terminal() || !self.locked {
            return None;
        }
        if self.current + 1 < self.questions.len() {
            self.current += 1;
            self.selected = None;
            self.locked = false;
            self.remaining_question_secs = self.questions[self.current].time_limit_secs();
            debug!("advanced to question {}", self.current);
            return Some(SessionEvent::Advanced {
                index: self.current,
            });
        }
        Some(self.finish(EndReason::Completed))
    }

    /// Terminal result, once the attempt has ended.
    #[must_use]
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.end.map(|end| self.build_outcome(end))
    }

    fn finish(&mut self, end: EndReason) -> SessionEvent {
        self.end = Some(end);
        SessionEvent::Finished(self.build_outcome(end))
    }

    fn build_outcome(&self, end: EndReason) -> SessionOutcome {
        let time_taken_secs = self
            .settings
            .total_time_limit_secs
            .zip(self.remaining_total_secs)
            .map(|(total, remaining)| total.saturating_sub(remaining));

        SessionOutcome {
            score: self.score,
            total_questions: u32::try_from(self.questions.len()).unwrap_or(u32::MAX),
            points_earned: self
                .score
                .saturating_mul(self.settings.points_per_correct_answer),
            time_taken_secs,
            answered: self.answered.clone(),
            end,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
