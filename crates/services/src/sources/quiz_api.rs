use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use quiz_core::SessionSettings;
use quiz_core::model::{Correctness, DEFAULT_TIME_LIMIT_SECS, Question, ResultOrigin};
use reqwest::Client;
use serde::Deserialize;

use super::html::decode_entities;
use super::{
    FEED_POINTS_PER_CORRECT, FEED_QUESTION_COUNT, LoadedQuiz, QuestionSource, body_error,
    collect_questions, status_error,
};
use crate::error::FetchError;

/// One item of the category feed.
///
/// `answers` maps `answer_a`..`answer_f` to text or null; `correct_answers`
/// maps `answer_a_correct`.. to `"true"` / `"false"`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizApiItem {
    pub question: String,
    #[serde(default)]
    pub answers: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub correct_answers: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub category: Option<String>,
}

impl QuizApiItem {
    fn into_question(self) -> Result<Question, String> {
        let mut options = Vec::new();
        let mut correct = BTreeSet::new();
        for (key, text) in &self.answers {
            let Some(text) = text.as_deref().filter(|t| !t.trim().is_empty()) else {
                continue;
            };
            let text = decode_entities(text);
            let flag = self
                .correct_answers
                .get(&format!("{key}_correct"))
                .and_then(Option::as_deref);
            if flag == Some("true") {
                correct.insert(text.clone());
            }
            options.push(text);
        }

        Question::new(
            decode_entities(&self.question),
            options,
            Correctness::Values(correct),
            DEFAULT_TIME_LIMIT_SECS,
        )
        .map_err(|err| err.to_string())
    }

    /// Turn a feed payload into playable questions.
    ///
    /// # Errors
    ///
    /// `NoQuestions` for an empty list, `Malformed` if no item is usable.
    pub fn into_questions(items: Vec<Self>) -> Result<Vec<Question>, FetchError> {
        let total = items.len();
        collect_questions(total, items.into_iter().map(QuizApiItem::into_question))
    }
}

/// Category feed: ten questions of one category, possibly several correct
/// answers per question.
#[derive(Clone)]
pub struct QuizApiSource {
    client: Client,
    base_url: String,
    api_key: String,
    category: String,
    difficulty: Option<String>,
}

impl QuizApiSource {
    #[must_use]
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            category: category.into(),
            difficulty: None,
        }
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = Some(difficulty.into());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/api/v1/questions", self.base_url.trim_end_matches('/'))
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("apiKey", self.api_key.clone()),
            ("category", self.category.clone()),
        ];
        if let Some(difficulty) = &self.difficulty {
            query.push(("difficulty", difficulty.clone()));
        }
        query.push(("limit", FEED_QUESTION_COUNT.to_string()));
        query
    }
}

#[async_trait]
impl QuestionSource for QuizApiSource {
    async fn load(&self) -> Result<LoadedQuiz, FetchError> {
        log::debug!("fetching {} questions from {}", self.category, self.endpoint());
        let response = self
            .client
            .get(self.endpoint())
            .query(&self.query())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }
        let items: Vec<QuizApiItem> = response.json().await.map_err(body_error)?;
        let questions = QuizApiItem::into_questions(items)?;
        log::info!("loaded {} {} questions", questions.len(), self.category);

        Ok(LoadedQuiz {
            questions,
            settings: SessionSettings::untimed(FEED_POINTS_PER_CORRECT),
            origin: ResultOrigin::Feed {
                category: self.category.clone(),
            },
            title: format!("{} quiz", self.category),
        })
    }
}
