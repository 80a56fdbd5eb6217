// src/core/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// A short, stable language code such as "ml" or "hi".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(String);

impl Language {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Language {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// A single corpus entry as it is shipped to download clients.
/// The cache never looks inside anything but the count of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub id: u64,
    pub word: String,
    /// Number of times this word has been learned.
    pub confidence: u32,
    /// Unix seconds of the first time this word was learned.
    pub learned_on: i64,
}

impl Word {
    pub fn new(id: u64, word: impl Into<String>) -> Self {
        Self { id, word: word.into(), confidence: 1, learned_on: 0 }
    }
}

/// Address of one page: the language partition and the word offset inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub language: Language,
    pub offset: u64,
}

impl PageKey {
    pub fn new(language: Language, offset: u64) -> Self {
        Self { language, offset }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.language, self.offset)
    }
}

/// A word handed to a language's training consumer.
/// `pattern` is set only for explicit pattern training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub language: Language,
    pub pattern: Option<String>,
    pub word: String,
}

impl TrainingRequest {
    pub fn learn(language: Language, word: impl Into<String>) -> Self {
        Self { language, pattern: None, word: word.into() }
    }

    pub fn train(language: Language, pattern: impl Into<String>, word: impl Into<String>) -> Self {
        Self { language, pattern: Some(pattern.into()), word: word.into() }
    }
}
