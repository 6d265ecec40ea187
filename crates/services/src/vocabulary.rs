//! Vocabulary practice: a no-repeat word deck, meaning guesses scored by
//! word overlap, and generation of fresh words through the chat endpoint.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::Client;
use storage::RealtimeStore;
use storage::paths;
use storage::records::{WordDoc, get_children, to_value};

use crate::chat::{ChatClient, ChatCompletion, clean_json_response};
use crate::config::AiConfig;
use crate::error::WordFetchError;

/// Overlap a guess needs to count as correct.
pub const MATCH_THRESHOLD: f64 = 0.7;
pub const POINTS_PER_MATCH: u32 = 10;

/// Attempts made while the chat endpoint answers 429.
pub const MAX_ATTEMPTS: u32 = 3;
/// Wait after the first 429; doubles after each further one.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

const BUILTIN_WORDS: &[(&str, &str)] = &[
    ("Ephemeral", "Lasting for a very short time"),
    ("Ubiquitous", "Present, appearing, or found everywhere"),
    ("Pragmatic", "Dealing with things sensibly and realistically"),
    ("Resilient", "Able to recover quickly from difficulties"),
    ("Ambiguous", "Open to more than one interpretation"),
    ("Meticulous", "Showing great attention to detail"),
    ("Innovative", "Featuring new methods or ideas"),
    ("Eloquent", "Fluent or persuasive in speaking or writing"),
    ("Tenacious", "Persistent; not giving up easily"),
    ("Empathy", "The ability to understand others' feelings"),
    ("Paradigm", "A typical example or pattern"),
    ("Authentic", "Genuine; of undisputed origin"),
    ("Catalyst", "A person or thing that causes change"),
    ("Diligent", "Having or showing care in one's work"),
    ("Enigmatic", "Difficult to interpret or understand"),
    ("Versatile", "Able to adapt or be adapted to many functions"),
    ("Profound", "Very great or intense; showing deep insight"),
    ("Resilience", "The capacity to recover quickly"),
    ("Intuitive", "Using or based on what one feels to be true"),
    ("Persevere", "Continue despite difficulties"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabWord {
    pub word: String,
    pub meaning: String,
}

impl VocabWord {
    #[must_use]
    pub fn new(word: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            meaning: meaning.into(),
        }
    }
}

impl From<WordDoc> for VocabWord {
    fn from(doc: WordDoc) -> Self {
        Self::new(doc.word, doc.meaning)
    }
}

/// The twenty words the game ships with.
#[must_use]
pub fn builtin_words() -> Vec<VocabWord> {
    BUILTIN_WORDS
        .iter()
        .map(|(word, meaning)| VocabWord::new(*word, *meaning))
        .collect()
}

/// Share of guess words found in the meaning, over the longer of the two.
///
/// Case-insensitive; words are whitespace separated and punctuation counts.
#[must_use]
pub fn similarity(guess: &str, meaning: &str) -> f64 {
    let guess = guess.to_lowercase();
    let meaning = meaning.to_lowercase();
    let guess_words: Vec<&str> = guess.split_whitespace().collect();
    let meaning_words: HashSet<&str> = meaning.split_whitespace().collect();
    let longest = guess_words.len().max(meaning.split_whitespace().count());
    if longest == 0 {
        return 0.0;
    }
    let common = guess_words
        .iter()
        .filter(|w| meaning_words.contains(*w))
        .count();
    common as f64 / longest as f64
}

// ─── Deck ──────────────────────────────────────────────────────────────────────

/// Deals every word once before any repeats.
#[derive(Debug, Clone)]
pub struct WordDeck {
    words: Vec<VocabWord>,
    used: HashSet<usize>,
}

impl WordDeck {
    #[must_use]
    pub fn new(words: Vec<VocabWord>) -> Self {
        Self {
            words,
            used: HashSet::new(),
        }
    }

    #[must_use]
    pub fn builtin() -> Self {
        Self::new(builtin_words())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words not yet dealt in the current pass.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.words.len() - self.used.len()
    }

    /// Adds a word unless one with the same spelling is already in the deck.
    pub fn add(&mut self, word: VocabWord) -> bool {
        let duplicate = self
            .words
            .iter()
            .any(|w| w.word.eq_ignore_ascii_case(&word.word));
        if !duplicate {
            self.words.push(word);
        }
        !duplicate
    }

    /// A random undealt word. Once all are dealt the pass starts over.
    pub fn deal<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<&VocabWord> {
        if self.words.is_empty() {
            return None;
        }
        if self.used.len() >= self.words.len() {
            log::debug!("word deck exhausted, starting a new pass");
            self.used.clear();
        }
        let available: Vec<usize> = (0..self.words.len())
            .filter(|i| !self.used.contains(i))
            .collect();
        let index = available[rng.random_range(0..available.len())];
        self.used.insert(index);
        self.words.get(index)
    }
}

// ─── Game ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct GuessOutcome {
    pub similarity: f64,
    pub correct: bool,
    pub points: u32,
    /// Revealed after every guess, right or wrong.
    pub meaning: String,
}

/// One player's run through a deck. A word takes a single guess.
#[derive(Debug, Clone)]
pub struct VocabularyGame {
    deck: WordDeck,
    current: Option<VocabWord>,
    revealed: bool,
    score: u32,
}

impl VocabularyGame {
    #[must_use]
    pub fn new(deck: WordDeck) -> Self {
        Self {
            deck,
            current: None,
            revealed: false,
            score: 0,
        }
    }

    /// Deals the next word and hides its meaning.
    pub fn next_word<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<&VocabWord> {
        self.current = self.deck.deal(rng).cloned();
        self.revealed = false;
        self.current.as_ref()
    }

    #[must_use]
    pub fn current(&self) -> Option<&VocabWord> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    /// Adds a generated word to the deck for later passes.
    pub fn add_word(&mut self, word: VocabWord) -> bool {
        self.deck.add(word)
    }

    /// Scores a guess at the current meaning.
    ///
    /// Returns `None` for a blank guess, before the first word, or once the
    /// meaning has been revealed.
    pub fn submit_guess(&mut self, guess: &str) -> Option<GuessOutcome> {
        let guess = guess.trim();
        if guess.is_empty() || self.revealed {
            return None;
        }
        let word = self.current.as_ref()?;
        let similarity = similarity(guess, &word.meaning);
        let correct = similarity >= MATCH_THRESHOLD;
        let points = if correct { POINTS_PER_MATCH } else { 0 };
        self.score += points;
        self.revealed = true;
        Some(GuessOutcome {
            similarity,
            correct,
            points,
            meaning: word.meaning.clone(),
        })
    }
}

// ─── Generation ────────────────────────────────────────────────────────────────

/// Asks the chat endpoint for a word not yet stored under `words`, then
/// stores it there.
#[derive(Clone)]
pub struct WordGenerator {
    chat: Option<Arc<dyn ChatCompletion>>,
    store: Arc<dyn RealtimeStore>,
    initial_backoff: Duration,
}

impl WordGenerator {
    #[must_use]
    pub fn from_env(store: Arc<dyn RealtimeStore>) -> Self {
        let chat = AiConfig::from_env()
            .map(|config| Arc::new(ChatClient::new(Client::new(), config)) as Arc<dyn ChatCompletion>);
        Self::new(store, chat)
    }

    #[must_use]
    pub fn new(store: Arc<dyn RealtimeStore>, chat: Option<Arc<dyn ChatCompletion>>) -> Self {
        Self {
            chat,
            store,
            initial_backoff: INITIAL_BACKOFF,
        }
    }

    #[must_use]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.chat.is_some()
    }

    /// Words already stored. A failed read counts as none.
    pub async fn stored_words(&self) -> Vec<VocabWord> {
        match get_children::<WordDoc>(self.store.as_ref(), paths::WORDS).await {
            Ok(docs) => docs.into_iter().map(|(_, doc)| doc.into()).collect(),
            Err(err) => {
                log::warn!("could not read stored words: {err}");
                Vec::new()
            }
        }
    }

    /// # Errors
    ///
    /// Returns `WordFetchError::RateLimited` after `MAX_ATTEMPTS` straight
    /// 429 replies. Any other chat failure stops at once.
    pub async fn generate(&self) -> Result<VocabWord, WordFetchError> {
        let chat = self.chat.as_ref().ok_or(WordFetchError::Disabled)?;
        let existing: Vec<String> = self
            .stored_words()
            .await
            .into_iter()
            .map(|w| w.word)
            .collect();
        let prompt = build_prompt(&existing);

        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        let content = loop {
            match chat.complete(&prompt).await {
                Ok(content) => break content,
                Err(err) if err.is_rate_limited() && attempt < MAX_ATTEMPTS => {
                    log::warn!(
                        "word generation rate limited, retrying in {}ms",
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) if err.is_rate_limited() => {
                    return Err(WordFetchError::RateLimited { attempts: attempt });
                }
                Err(err) => return Err(WordFetchError::Chat(err)),
            }
        };

        let word = parse_word(&content)?;
        let doc = WordDoc {
            word: word.word.clone(),
            meaning: word.meaning.clone(),
        };
        let key = self.store.push(paths::WORDS, to_value(&doc)?).await?;
        log::info!("stored generated word {key} \"{}\"", word.word);
        Ok(word)
    }
}

fn build_prompt(existing: &[String]) -> String {
    format!(
        "Generate a random word commonly used in daily life or useful for \
         vocabulary enhancement. The word must not be one of: {}. \
         Respond with a JSON object {{\"word\": \"...\", \"meaning\": \"...\"}}. \
         Return only the JSON, without code fences or any other text.",
        existing.join(", ")
    )
}

/// # Errors
///
/// Returns `WordFetchError::Parse` for a reply that is not a word object and
/// `WordFetchError::Incomplete` when either field is blank.
pub fn parse_word(response: &str) -> Result<VocabWord, WordFetchError> {
    let cleaned = clean_json_response(response);
    let doc: WordDoc =
        serde_json::from_str(&cleaned).map_err(|e| WordFetchError::Parse(e.to_string()))?;
    let word = doc.word.trim();
    let meaning = doc.meaning.trim();
    if word.is_empty() {
        return Err(WordFetchError::Incomplete("word"));
    }
    if meaning.is_empty() {
        return Err(WordFetchError::Incomplete("meaning"));
    }
    Ok(VocabWord::new(word, meaning))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn deals_every_word_once_per_pass() {
        let mut deck = WordDeck::builtin();
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = HashSet::new();
        for _ in 0..deck.len() {
            let word = deck.deal(&mut rng).unwrap().word.clone();
            assert!(seen.insert(word));
        }
        assert_eq!(seen.len(), 20);
        assert_eq!(deck.remaining(), 0);

        assert!(deck.deal(&mut rng).is_some());
        assert_eq!(deck.remaining(), 19);
    }

    #[test]
    fn empty_deck_deals_nothing() {
        let mut deck = WordDeck::new(Vec::new());
        assert!(deck.deal(&mut StdRng::seed_from_u64(1)).is_none());
    }

    #[test]
    fn deck_ignores_duplicate_spellings() {
        let mut deck = WordDeck::builtin();
        assert!(!deck.add(VocabWord::new("ephemeral", "Short-lived")));
        assert!(deck.add(VocabWord::new("Serendipity", "A happy accident")));
        assert_eq!(deck.len(), 21);
    }

    #[test]
    fn similarity_counts_shared_words_over_the_longer_side() {
        assert_eq!(similarity("Lasting for a very short time", "Lasting for a very short time"), 1.0);
        let partial = similarity("lasting a short time", "Lasting for a very short time");
        assert!((partial - 4.0 / 6.0).abs() < f64::EPSILON);
        assert_eq!(similarity("banana", "Lasting for a very short time"), 0.0);
    }

    #[test]
    fn close_guess_scores_and_reveals() {
        let deck = WordDeck::new(vec![VocabWord::new(
            "Ephemeral",
            "Lasting for a very short time",
        )]);
        let mut game = VocabularyGame::new(deck);
        assert!(game.submit_guess("anything").is_none());

        game.next_word(&mut StdRng::seed_from_u64(1)).unwrap();
        assert!(game.submit_guess("   ").is_none());
        assert!(!game.is_revealed());

        let outcome = game.submit_guess("LASTING for a very short TIME").unwrap();
        assert!(outcome.correct);
        assert_eq!(outcome.points, 10);
        assert_eq!(outcome.meaning, "Lasting for a very short time");
        assert_eq!(game.score(), 10);

        // One guess per word.
        assert!(game.submit_guess("Lasting for a very short time").is_none());
        assert_eq!(game.score(), 10);
    }

    #[test]
    fn wrong_guess_still_reveals_the_meaning() {
        let mut game = VocabularyGame::new(WordDeck::builtin());
        let mut rng = StdRng::seed_from_u64(9);
        game.next_word(&mut rng).unwrap();
        let outcome = game.submit_guess("something unrelated entirely").unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.points, 0);
        assert!(game.is_revealed());
        assert_eq!(game.score(), 0);

        game.next_word(&mut rng).unwrap();
        assert!(!game.is_revealed());
    }

    #[test]
    fn parses_fenced_word_and_rejects_blanks() {
        let word = parse_word("```json\n{\"word\": \" Serendipity \", \"meaning\": \"A happy accident\"}\n```").unwrap();
        assert_eq!(word, VocabWord::new("Serendipity", "A happy accident"));

        assert!(matches!(
            parse_word("{\"word\": \"X\", \"meaning\": \"\"}"),
            Err(WordFetchError::Incomplete("meaning"))
        ));
        assert!(matches!(parse_word("not json"), Err(WordFetchError::Parse(_))));
    }

    #[test]
    fn prompt_lists_stored_words() {
        let prompt = build_prompt(&["Ephemeral".into(), "Catalyst".into()]);
        assert!(prompt.contains("Ephemeral, Catalyst"));
    }
}
