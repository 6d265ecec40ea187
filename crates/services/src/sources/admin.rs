use std::sync::Arc;

use async_trait::async_trait;
use quiz_core::SessionSettings;
use quiz_core::model::{QuizDefinition, QuizId, ResultOrigin};
use storage::RealtimeStore;
use storage::paths;
use storage::records::{QuestionDoc, QuizDoc, get_children, get_doc};

use super::{LoadedQuiz, QuestionSource};
use crate::error::FetchError;

/// An admin-authored quiz read from the store.
#[derive(Clone)]
pub struct AdminQuizSource {
    store: Arc<dyn RealtimeStore>,
    quiz_id: QuizId,
}

impl AdminQuizSource {
    #[must_use]
    pub fn new(store: Arc<dyn RealtimeStore>, quiz_id: QuizId) -> Self {
        Self { store, quiz_id }
    }

    async fn definition(&self) -> Result<QuizDefinition, FetchError> {
        let doc: QuizDoc = get_doc(self.store.as_ref(), &paths::quiz(&self.quiz_id))
            .await?
            .ok_or_else(|| FetchError::NotFound(self.quiz_id.clone()))?;
        Ok(doc.into_definition(self.quiz_id.clone()))
    }
}

/// Orders list children by numeric key, so `"10"` follows `"9"`.
pub(crate) fn sort_by_index<T>(children: &mut [(String, T)]) {
    children.sort_by(|(a, _), (b, _)| match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    });
}

#[async_trait]
impl QuestionSource for AdminQuizSource {
    async fn load(&self) -> Result<LoadedQuiz, FetchError> {
        let quiz = self.definition().await?;

        let mut docs: Vec<(String, QuestionDoc)> =
            get_children(self.store.as_ref(), &paths::quiz_questions(&self.quiz_id)).await?;
        if docs.is_empty() {
            return Err(FetchError::NotFound(self.quiz_id.clone()));
        }
        sort_by_index(&mut docs);

        let questions = docs
            .into_iter()
            .map(|(key, doc)| {
                doc.into_question()
                    .map_err(|err| FetchError::Malformed(format!("question {key}: {err}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut settings = SessionSettings::untimed(quiz.points_per_correct_answer);
        if let Some(total) = quiz.total_time_limit_secs {
            settings = settings.with_total_limit(total);
        }
        log::info!(
            "loaded quiz {} ({} questions, session limit {:?}s)",
            quiz.id,
            questions.len(),
            settings.total_time_limit_secs
        );

        Ok(LoadedQuiz {
            questions,
            settings,
            origin: ResultOrigin::Quiz {
                quiz_id: quiz.id,
                category: quiz.category,
            },
            title: quiz.title,
        })
    }
}
