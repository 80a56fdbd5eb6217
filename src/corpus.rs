// File: src/corpus.rs
use crate::core::types::{Language, TrainingRequest, Word};
use crate::error::CorpusError;
use crate::learning::Trainer;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Where page words come from.
///
/// `fetch` returns at most `limit` words starting at `offset`, in corpus
/// order. It returns fewer only when the page reaches the end of the corpus.
pub trait CorpusSource: Send + Sync + 'static {
    fn fetch(
        &self,
        language: &Language,
        offset: u64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Word>, CorpusError>> + Send;
}

#[derive(Default)]
struct LanguageCorpus {
    words: Vec<Word>,
    /// word text -> position in `words`
    positions: HashMap<String, usize>,
}

impl LanguageCorpus {
    fn learn(&mut self, text: &str, now: i64) -> bool {
        if let Some(&pos) = self.positions.get(text) {
            self.words[pos].confidence += 1;
            return false;
        }
        let id = self.words.len() as u64 + 1;
        self.positions.insert(text.to_string(), self.words.len());
        self.words.push(Word { id, word: text.to_string(), confidence: 1, learned_on: now });
        true
    }
}

/// Append-only in-memory corpus, one word list per language.
///
/// Learning an unseen word appends it; learning a known word only raises its
/// confidence, so page boundaries never move.
pub struct MemoryCorpus {
    languages: RwLock<HashMap<Language, LanguageCorpus>>,
    fetches: AtomicU64,
}

impl MemoryCorpus {
    pub fn new<I>(languages: I) -> Self
    where
        I: IntoIterator<Item = Language>,
    {
        let languages = languages.into_iter().map(|l| (l, LanguageCorpus::default())).collect();
        Self { languages: RwLock::new(languages), fetches: AtomicU64::new(0) }
    }

    /// Learns `text`, returning true if it was appended as a new word.
    pub fn learn(&self, language: &Language, text: &str) -> Result<bool, CorpusError> {
        let mut languages = self.languages.write();
        let corpus = languages
            .get_mut(language)
            .ok_or_else(|| CorpusError::Unavailable(format!("no corpus for {}", language)))?;
        Ok(corpus.learn(text, chrono::Utc::now().timestamp()))
    }

    pub fn extend<'a, I>(&self, language: &Language, words: I) -> Result<usize, CorpusError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut appended = 0;
        for w in words {
            if self.learn(language, w)? {
                appended += 1;
            }
        }
        Ok(appended)
    }

    pub fn len(&self, language: &Language) -> usize {
        self.languages.read().get(language).map_or(0, |c| c.words.len())
    }

    /// How many times `fetch` has been called.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    fn page(&self, language: &Language, offset: u64, limit: usize) -> Result<Vec<Word>, CorpusError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let languages = self.languages.read();
        let corpus = languages
            .get(language)
            .ok_or_else(|| CorpusError::Unavailable(format!("no corpus for {}", language)))?;

        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(corpus.words.len());
        let end = start.saturating_add(limit).min(corpus.words.len());
        Ok(corpus.words[start..end].to_vec())
    }
}

impl CorpusSource for MemoryCorpus {
    async fn fetch(&self, language: &Language, offset: u64, limit: usize) -> Result<Vec<Word>, CorpusError> {
        self.page(language, offset, limit)
    }
}

impl Trainer for MemoryCorpus {
    fn train(&self, request: &TrainingRequest) -> Result<(), CorpusError> {
        // Patterns feed the transliteration engine, which lives elsewhere;
        // the corpus only records the word.
        self.learn(&request.language, &request.word).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ml() -> Language {
        Language::new("ml")
    }

    #[tokio::test]
    async fn test_fetch_pages() {
        let corpus = MemoryCorpus::new([ml()]);
        corpus.extend(&ml(), ["a", "b", "c"]).unwrap();

        let first = corpus.fetch(&ml(), 0, 2).await.unwrap();
        assert_eq!(first.iter().map(|w| w.word.as_str()).collect::<Vec<_>>(), ["a", "b"]);

        let tail = corpus.fetch(&ml(), 2, 2).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].word, "c");

        assert!(corpus.fetch(&ml(), 10, 2).await.unwrap().is_empty());
        assert_eq!(corpus.fetch_count(), 3);
    }

    #[test]
    fn test_relearning_bumps_confidence() {
        let corpus = MemoryCorpus::new([ml()]);
        assert!(corpus.learn(&ml(), "a").unwrap());
        assert!(!corpus.learn(&ml(), "a").unwrap());
        assert_eq!(corpus.len(&ml()), 1);

        let words = corpus.page(&ml(), 0, 10).unwrap();
        assert_eq!(words[0].confidence, 2);
        assert_eq!(words[0].id, 1);
    }

    #[tokio::test]
    async fn test_unknown_language_is_unavailable() {
        let corpus = MemoryCorpus::new([ml()]);
        let err = corpus.fetch(&Language::new("xx"), 0, 10).await.unwrap_err();
        assert!(matches!(err, CorpusError::Unavailable(_)));
    }

    #[test]
    fn test_train_records_word() {
        let corpus = MemoryCorpus::new([ml()]);
        corpus.train(&TrainingRequest::train(ml(), "amma", "അമ്മ")).unwrap();
        assert_eq!(corpus.len(&ml()), 1);
    }
}
