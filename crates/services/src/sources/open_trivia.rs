use async_trait::async_trait;
use quiz_core::SessionSettings;
use quiz_core::model::{Correctness, DEFAULT_TIME_LIMIT_SECS, Question, ResultOrigin};
use rand::Rng;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::Deserialize;

use super::html::decode_entities;
use super::{
    FEED_POINTS_PER_CORRECT, FEED_QUESTION_COUNT, LoadedQuiz, QuestionSource, body_error,
    collect_questions, status_error,
};
use crate::error::FetchError;

/// Category recorded for public-feed attempts, which mix categories.
pub const TRIVIA_CATEGORY: &str = "General Trivia";

/// `response_code` values documented by the trivia API.
const CODE_SUCCESS: u8 = 0;
const CODE_NO_RESULTS: u8 = 1;
const CODE_RATE_LIMITED: u8 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct TriviaResponse {
    pub response_code: u8,
    #[serde(default)]
    pub results: Vec<TriviaItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriviaItem {
    #[serde(default)]
    pub category: String,
    pub question: String,
    pub correct_answer: String,
    #[serde(default)]
    pub incorrect_answers: Vec<String>,
}

impl TriviaItem {
    /// Decode entities, then shuffle the correct answer in with the rest.
    ///
    /// The correct value is decoded the same way as the options so the
    /// comparison in `Correctness::Value` is exact.
    fn into_question<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Question, String> {
        let correct = decode_entities(&self.correct_answer);
        let mut options: Vec<String> = self
            .incorrect_answers
            .iter()
            .map(|answer| decode_entities(answer))
            .collect();
        options.push(correct.clone());
        options.shuffle(rng);

        Question::new(
            decode_entities(&self.question),
            options,
            Correctness::Value(correct),
            DEFAULT_TIME_LIMIT_SECS,
        )
        .map_err(|err| err.to_string())
    }
}

impl TriviaResponse {
    /// Turn a feed payload into playable questions.
    ///
    /// # Errors
    ///
    /// `NoQuestions` for an empty result, `Status` when rate limited and
    /// `Malformed` for other response codes or unusable items.
    pub fn into_questions<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Vec<Question>, FetchError> {
        match self.response_code {
            CODE_SUCCESS => {}
            CODE_NO_RESULTS => return Err(FetchError::NoQuestions),
            CODE_RATE_LIMITED => {
                return Err(FetchError::Status(reqwest::StatusCode::TOO_MANY_REQUESTS));
            }
            code => return Err(FetchError::Malformed(format!("response code {code}"))),
        }
        let total = self.results.len();
        collect_questions(
            total,
            self.results.into_iter().map(|item| item.into_question(rng)),
        )
    }
}

/// Public trivia feed: ten mixed questions, 30 s each, 10 points per hit.
#[derive(Clone)]
pub struct OpenTriviaSource {
    client: Client,
    base_url: String,
    amount: u32,
}

impl OpenTriviaSource {
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            amount: FEED_QUESTION_COUNT,
        }
    }

    #[must_use]
    pub fn with_amount(mut self, amount: u32) -> Self {
        self.amount = amount.max(1);
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/api.php?amount={}",
            self.base_url.trim_end_matches('/'),
            self.amount
        )
    }
}

#[async_trait]
impl QuestionSource for OpenTriviaSource {
    async fn load(&self) -> Result<LoadedQuiz, FetchError> {
        let url = self.url();
        log::debug!("fetching trivia questions from {url}");
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }
        let body: TriviaResponse = response.json().await.map_err(body_error)?;
        let questions = body.into_questions(&mut rand::rng())?;
        log::info!("loaded {} trivia questions", questions.len());

        Ok(LoadedQuiz {
            questions,
            settings: SessionSettings::untimed(FEED_POINTS_PER_CORRECT),
            origin: ResultOrigin::Feed {
                category: TRIVIA_CATEGORY.to_string(),
            },
            title: "Trivia".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn fixture() -> TriviaResponse {
        serde_json::from_value(json!({
            "response_code": 0,
            "results": [
                {
                    "type": "multiple",
                    "difficulty": "easy",
                    "category": "Entertainment: Books",
                    "question": "Who wrote &quot;Hamlet&quot;?",
                    "correct_answer": "William Shakespeare",
                    "incorrect_answers": ["Charles Dickens", "Jane Austen", "Mark Twain"]
                },
                {
                    "type": "boolean",
                    "difficulty": "easy",
                    "category": "Science",
                    "question": "Rock &amp; roll is a genre?",
                    "correct_answer": "True",
                    "incorrect_answers": ["False"]
                },
                {
                    "type": "multiple",
                    "difficulty": "hard",
                    "category": "Food",
                    "question": "What is a croque-monsieur?",
                    "correct_answer": "Caf&eacute; sandwich",
                    "incorrect_answers": ["Soup", "Caf&eacute; cake", "Salad"]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn builds_decoded_questions_with_correct_value() {
        let mut rng = StdRng::seed_from_u64(7);
        let questions = fixture().into_questions(&mut rng).unwrap();
        assert_eq!(questions.len(), 3);

        let hamlet = &questions[0];
        assert_eq!(hamlet.text(), "Who wrote \"Hamlet\"?");
        assert_eq!(hamlet.options().len(), 4);
        assert_eq!(hamlet.time_limit_secs(), 30);
        assert_eq!(hamlet.correct_answers(), vec!["William Shakespeare".to_string()]);
    }

    #[test]
    fn decoded_correct_value_still_matches_its_option() {
        let mut rng = StdRng::seed_from_u64(11);
        let questions = fixture().into_questions(&mut rng).unwrap();
        let food = &questions[2];

        let index = food
            .options()
            .iter()
            .position(|o| o == "Café sandwich")
            .expect("decoded option present");
        assert!(food.is_correct(index));
        assert_eq!(food.options().iter().filter(|o| o.contains('&')).count(), 0);
    }

    #[test]
    fn shuffle_keeps_every_option() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let questions = fixture().into_questions(&mut rng).unwrap();
            let mut options = questions[0].options().to_vec();
            options.sort();
            assert_eq!(
                options,
                vec![
                    "Charles Dickens",
                    "Jane Austen",
                    "Mark Twain",
                    "William Shakespeare"
                ]
            );
        }
    }

    #[test]
    fn no_results_code_is_no_questions() {
        let body: TriviaResponse =
            serde_json::from_value(json!({ "response_code": 1, "results": [] })).unwrap();
        let err = body.into_questions(&mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, FetchError::NoQuestions));
    }

    #[test]
    fn rate_limit_code_is_retryable() {
        let body: TriviaResponse =
            serde_json::from_value(json!({ "response_code": 5 })).unwrap();
        let err = body.into_questions(&mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn builds_request_url() {
        let source = OpenTriviaSource::new(Client::new(), "https://opentdb.com/");
        assert_eq!(source.url(), "https://opentdb.com/api.php?amount=10");
    }
}
