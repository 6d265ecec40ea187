#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod session;
pub mod time;

pub use error::Error;
pub use session::{
    AnsweredRecord, EndReason, QuizSession, SessionError, SessionEvent, SessionOutcome,
    SessionPhase, SessionSettings,
};
pub use time::Clock;
