//! Environment configuration. CLI flags in the `app` binary override these.

use std::env;

use quiz_core::model::UserId;

use crate::error::ConfigError;

pub const DEFAULT_DB_URL: &str = "sqlite://quiz.sqlite3";
pub const DEFAULT_TRIVIA_BASE_URL: &str = "https://opentdb.com";
pub const DEFAULT_QUIZ_API_BASE_URL: &str = "https://quizapi.io";
pub const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Chat-completions endpoint used for generated progress reports.
#[derive(Clone, Debug)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl AiConfig {
    /// `None` when `QUIZ_AI_API_KEY` is unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = non_empty("QUIZ_AI_API_KEY")?;
        let base_url = non_empty("QUIZ_AI_BASE_URL").unwrap_or_else(|| DEFAULT_AI_BASE_URL.into());
        let model = non_empty("QUIZ_AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

#[derive(Clone, Debug)]
pub struct QuizConfig {
    pub db_url: String,
    pub trivia_base_url: String,
    pub quiz_api_base_url: String,
    pub quiz_api_key: Option<String>,
    pub ai: Option<AiConfig>,
    pub uid: Option<UserId>,
    pub user_name: Option<String>,
}

impl QuizConfig {
    /// Read every `QUIZ_*` variable, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUid` if `QUIZ_UID` is not a usable key.
    pub fn from_env() -> Result<Self, ConfigError> {
        let uid = non_empty("QUIZ_UID")
            .map(|raw| raw.parse::<UserId>())
            .transpose()?;
        Ok(Self {
            db_url: non_empty("QUIZ_DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.into()),
            trivia_base_url: non_empty("QUIZ_TRIVIA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_TRIVIA_BASE_URL.into()),
            quiz_api_base_url: non_empty("QUIZ_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_QUIZ_API_BASE_URL.into()),
            quiz_api_key: non_empty("QUIZ_API_KEY"),
            ai: AiConfig::from_env(),
            uid,
            user_name: non_empty("QUIZ_USER_NAME"),
        })
    }
}
