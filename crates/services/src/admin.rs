//! Admin authoring of store-backed quizzes.

use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::model::{QuizDefinition, QuizDraft, QuizId};
use serde_json::{Map, Value, json};
use storage::RealtimeStore;
use storage::paths;
use storage::records::{QuestionDoc, QuizDoc, get_children, get_doc, to_value};

use crate::error::AdminError;
use crate::sources::sort_by_index;

#[derive(Clone)]
pub struct QuizAdminService {
    store: Arc<dyn RealtimeStore>,
    clock: Clock,
}

impl QuizAdminService {
    #[must_use]
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self {
            store,
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Validate a draft and store it under a generated key.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Quiz` for an invalid draft, `AdminError::Storage`
    /// if the write fails.
    pub async fn create_quiz(&self, draft: QuizDraft) -> Result<QuizId, AdminError> {
        let validated = draft.validate(self.clock.now())?;
        // The key is only known after the push; the stored doc does not carry it.
        let placeholder = validated.assign_id(QuizId::new(""));
        let key = self
            .store
            .push(paths::QUIZZES, to_value(&QuizDoc::from_definition(&placeholder))?)
            .await?;
        log::info!("created quiz {key} \"{}\"", placeholder.title);
        Ok(QuizId::new(key))
    }

    /// All quizzes, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Storage` if the quizzes cannot be read.
    pub async fn list_quizzes(&self) -> Result<Vec<QuizDefinition>, AdminError> {
        let docs: Vec<(String, QuizDoc)> = get_children(self.store.as_ref(), paths::QUIZZES).await?;
        let mut quizzes: Vec<QuizDefinition> = docs
            .into_iter()
            .map(|(id, doc)| doc.into_definition(QuizId::new(id)))
            .collect();
        quizzes.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        Ok(quizzes)
    }

    /// Append a question and return its index.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Question` when the question is not playable,
    /// `AdminError::NotFound` when the quiz does not exist.
    pub async fn add_question(
        &self,
        quiz_id: &QuizId,
        question: QuestionDoc,
    ) -> Result<usize, AdminError> {
        question.clone().into_question()?;
        let mut questions = self.questions(quiz_id).await?;
        questions.push(question);
        let index = questions.len() - 1;
        self.write_questions(quiz_id, &questions).await?;
        Ok(index)
    }

    /// Remove the question at `index`; later questions shift down.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::QuestionIndex` when `index` is out of range,
    /// `AdminError::NotFound` when the quiz does not exist.
    pub async fn delete_question(&self, quiz_id: &QuizId, index: usize) -> Result<(), AdminError> {
        let mut questions = self.questions(quiz_id).await?;
        if index >= questions.len() {
            return Err(AdminError::QuestionIndex {
                index,
                len: questions.len(),
            });
        }
        questions.remove(index);
        self.write_questions(quiz_id, &questions).await
    }

    /// Show or hide a quiz on the student dashboard.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::NotFound` when the quiz does not exist.
    pub async fn set_active(&self, quiz_id: &QuizId, active: bool) -> Result<(), AdminError> {
        self.require_quiz(quiz_id).await?;
        let mut fields = Map::new();
        fields.insert("active".into(), Value::Bool(active));
        self.store.update(&paths::quiz(quiz_id), fields).await?;
        log::debug!("quiz {quiz_id} active={active}");
        Ok(())
    }

    /// Stored questions in order.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::NotFound` when the quiz does not exist.
    pub async fn questions(&self, quiz_id: &QuizId) -> Result<Vec<QuestionDoc>, AdminError> {
        self.require_quiz(quiz_id).await?;
        let mut docs: Vec<(String, QuestionDoc)> =
            get_children(self.store.as_ref(), &paths::quiz_questions(quiz_id)).await?;
        sort_by_index(&mut docs);
        Ok(docs.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn require_quiz(&self, quiz_id: &QuizId) -> Result<(), AdminError> {
        let doc: Option<QuizDoc> = get_doc(self.store.as_ref(), &paths::quiz(quiz_id)).await?;
        doc.map(|_| ())
            .ok_or_else(|| AdminError::NotFound(quiz_id.clone()))
    }

    /// Rewrites the list and the quiz's question count in one update.
    async fn write_questions(
        &self,
        quiz_id: &QuizId,
        questions: &[QuestionDoc],
    ) -> Result<(), AdminError> {
        let mut fields = Map::new();
        fields.insert(paths::quiz_questions(quiz_id), to_value(&questions)?);
        fields.insert(
            paths::join(&paths::quiz(quiz_id), "numberOfQuestions"),
            json!(questions.len()),
        );
        self.store.update("", fields).await?;
        log::debug!("quiz {quiz_id} now has {} questions", questions.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::QuestionError;
    use quiz_core::time::{fixed_clock, fixed_now};
    use storage::InMemoryStore;

    fn service() -> QuizAdminService {
        QuizAdminService::new(Arc::new(InMemoryStore::new())).with_clock(fixed_clock())
    }

    fn draft(title: &str) -> QuizDraft {
        QuizDraft {
            title: title.into(),
            category: "Linux".into(),
            points_per_correct_answer: 5,
            time_limit_minutes: 2,
            ..QuizDraft::default()
        }
    }

    fn question(text: &str) -> QuestionDoc {
        QuestionDoc {
            question: text.into(),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_answer: 1,
            time_limit: 20,
        }
    }

    #[tokio::test]
    async fn creates_and_lists_quizzes() {
        let admin = service();
        let id = admin.create_quiz(draft("Shell basics")).await.unwrap();

        let quizzes = admin.list_quizzes().await.unwrap();
        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0].id, id);
        assert_eq!(quizzes[0].title, "Shell basics");
        assert_eq!(quizzes[0].total_time_limit_secs, Some(120));
        assert_eq!(quizzes[0].created_at, fixed_now());
        assert!(quizzes[0].active);
    }

    #[tokio::test]
    async fn invalid_draft_is_rejected() {
        let err = service().create_quiz(draft("  ")).await.unwrap_err();
        assert!(matches!(err, AdminError::Quiz(_)));
    }

    #[tokio::test]
    async fn adds_and_deletes_questions() {
        let admin = service();
        let id = admin.create_quiz(draft("Shell basics")).await.unwrap();

        assert_eq!(admin.add_question(&id, question("q0")).await.unwrap(), 0);
        assert_eq!(admin.add_question(&id, question("q1")).await.unwrap(), 1);
        assert_eq!(admin.add_question(&id, question("q2")).await.unwrap(), 2);

        admin.delete_question(&id, 1).await.unwrap();
        let texts: Vec<String> = admin
            .questions(&id)
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.question)
            .collect();
        assert_eq!(texts, ["q0", "q2"]);

        let quiz = admin.list_quizzes().await.unwrap().remove(0);
        assert_eq!(quiz.number_of_questions, Some(2));
    }

    #[tokio::test]
    async fn rejects_unplayable_question() {
        let admin = service();
        let id = admin.create_quiz(draft("Shell basics")).await.unwrap();

        let mut bad = question("q");
        bad.options[2] = " ".into();
        let err = admin.add_question(&id, bad).await.unwrap_err();
        assert!(matches!(
            err,
            AdminError::Question(QuestionError::EmptyOption { index: 2 })
        ));

        let mut bad = question("q");
        bad.correct_answer = 3;
        let err = admin.add_question(&id, bad).await.unwrap_err();
        assert!(matches!(
            err,
            AdminError::Question(QuestionError::CorrectIndexOutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_quiz_and_index_errors() {
        let admin = service();
        let missing = QuizId::new("nope");
        assert!(matches!(
            admin.add_question(&missing, question("q")).await,
            Err(AdminError::NotFound(_))
        ));

        let id = admin.create_quiz(draft("Shell basics")).await.unwrap();
        assert!(matches!(
            admin.delete_question(&id, 0).await,
            Err(AdminError::QuestionIndex { index: 0, len: 0 })
        ));
    }

    #[tokio::test]
    async fn toggles_active_flag() {
        let admin = service();
        let id = admin.create_quiz(draft("Shell basics")).await.unwrap();
        admin.set_active(&id, false).await.unwrap();
        assert!(!admin.list_quizzes().await.unwrap()[0].active);
    }
}
