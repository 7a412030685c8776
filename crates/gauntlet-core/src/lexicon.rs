//! Shared lexicon: fixed symbol pools and the topic vocabulary.
//!
//! The pools (letters, emoji, bracket pairs, punctuation buckets) are
//! process-wide constants. The topic vocabulary is loaded once from a JSONL
//! table and passed around as an immutable value; nothing mutates it after
//! load.

use lazy_static::lazy_static;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors from loading the topic vocabulary table.
#[derive(Error, Debug)]
pub enum LexiconError {
    #[error("Failed to read vocabulary file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed vocabulary entry on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },

    #[error("Duplicate topic in vocabulary: {0}")]
    DuplicateTopic(String),
}

/// Candidate emoji for start-with / end-with anchors.
pub const EMOJIS: &[&str] = &[
    // faces - positive
    "😀", "😁", "😂", "🤣", "😃", "😄", "😅", "😆", "😉", "😊", "🙂", "🙃",
    "😍", "🥰", "😘", "😗", "😙", "😚", "🤗", "🤩",
    // faces - neutral / thinking
    "🤔", "🤨", "😐", "😑", "😶", "😏", "🙄",
    // faces - negative / tired / sick
    "😣", "😖", "😫", "😩", "😮", "😯", "😪", "😴", "😓", "😥", "😢", "😭",
    "😰", "😱", "😳", "😵", "🤒", "🤕", "🤢", "🤮", "🤧", "😷",
    // fun / party
    "😎", "🤓", "🤠", "🥳",
];

/// Supported quotation/bracket pairs as (left, right).
pub const QUOTATION_PAIRS: &[(&str, &str)] = &[
    ("(", ")"),
    ("[", "]"),
    ("{", "}"),
    ("<", ">"),
    ("《", "》"),
    ("〈", "〉"),
    ("「", "」"),
    ("『", "』"),
    ("（", "）"),
    ("«", "»"),
    ("【", "】"),
    ("\u{201c}", "\u{201d}"), // double curly quotes
    ("\u{2018}", "\u{2019}"), // single curly quotes
    ("'", "'"),
    ("\"", "\""),
];

/// Raw punctuation candidates (ASCII + CJK), including bracket/quote chars.
const RAW_PUNCTUATIONS: &[&str] = &[
    "!", "\"", "#", "$", "%", "&", "'", "(", ")", "*", "+", ",", "-", ".", "/",
    ":", ";", "<", "=", ">", "?", "@", "[", "\\", "]", "^", "_", "`", "{", "|",
    "}", "~", "。", "，", "、", "？", "！", "：", "；", "（", "）", "【", "】",
    "「", "」", "『", "』", "《", "》", "〈", "〉", "——", "……", "·", "～", "—",
    "￥",
];

/// Commonly used punctuation bucket for must-not-include constraints.
const COMMON_PUNCTUATION_SEEDS: &[&str] = &[".", ",", ":"];

lazy_static! {
    /// Candidate letters (ASCII).
    pub static ref LETTERS: Vec<char> = ('a'..='z').chain('A'..='Z').collect();

    static ref QUOTE_CHARS: HashSet<char> = QUOTATION_PAIRS
        .iter()
        .flat_map(|(l, r)| l.chars().chain(r.chars()))
        .collect();

    /// Punctuation candidates excluding any char used in a quotation pair,
    /// deduplicated preserving order.
    pub static ref PUNCTUATIONS: Vec<&'static str> = {
        let mut seen = HashSet::new();
        RAW_PUNCTUATIONS
            .iter()
            .filter(|p| p.chars().all(|c| !QUOTE_CHARS.contains(&c)))
            .filter(|p| seen.insert(**p))
            .copied()
            .collect()
    };

    /// The "common" punctuation bucket (`.` `,` `:`).
    pub static ref COMMON_PUNCTUATIONS: Vec<&'static str> = {
        let base: HashSet<&str> = PUNCTUATIONS.iter().copied().collect();
        COMMON_PUNCTUATION_SEEDS
            .iter()
            .filter(|p| base.contains(**p))
            .copied()
            .collect()
    };

    /// The "uncommon" bucket: everything in [`PUNCTUATIONS`] that is not common.
    pub static ref UNCOMMON_PUNCTUATIONS: Vec<&'static str> = {
        let common: HashSet<&str> = COMMON_PUNCTUATIONS.iter().copied().collect();
        PUNCTUATIONS
            .iter()
            .filter(|p| !common.contains(**p))
            .copied()
            .collect()
    };

    /// Every punctuation character from the raw pool, quote/bracket chars
    /// included. Used when trimming boundary punctuation before anchor checks.
    pub static ref ALL_PUNCTUATION_CHARS: HashSet<char> =
        RAW_PUNCTUATIONS.iter().flat_map(|p| p.chars()).collect();
}

/// True if `c` belongs to the raw punctuation pool.
pub fn is_pool_punctuation(c: char) -> bool {
    ALL_PUNCTUATION_CHARS.contains(&c)
}

/// One line of the topic table on disk.
#[derive(Debug, Deserialize)]
struct VocabularyEntry {
    key: String,
    #[serde(default)]
    keywords: Vec<serde_json::Value>,
    #[serde(default)]
    prompt: String,
}

/// The per-topic keyword vocabulary plus seed queries.
///
/// Loaded once, then read-only for the lifetime of the process. Keyword-based
/// constraints draw their candidates from here, filtered by a forbidden mask.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    topics: Vec<String>,
    keywords: HashMap<String, Vec<String>>,
    seed_queries: HashMap<String, String>,
}

impl Vocabulary {
    /// Load the vocabulary from a JSONL file of
    /// `{"key": topic, "keywords": [...], "prompt": "..."}` objects.
    ///
    /// Keywords are lower-cased; non-string and blank entries are dropped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LexiconError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let mut vocab = Self::default();
        for (idx, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entry: VocabularyEntry = serde_json::from_str(line)
                .map_err(|source| LexiconError::Parse {
                    line: idx + 1,
                    source,
                })?;
            vocab.insert(entry.key, normalize_keywords(&entry.keywords), entry.prompt)?;
        }
        tracing::debug!(topics = vocab.topics.len(), "loaded topic vocabulary");
        Ok(vocab)
    }

    /// Build a vocabulary directly from `(topic, keywords, seed query)` rows.
    /// Intended for tests and embedding callers.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, LexiconError>
    where
        I: IntoIterator<Item = (S, Vec<S>, S)>,
        S: Into<String>,
    {
        let mut vocab = Self::default();
        for (topic, keywords, seed) in entries {
            let keywords = keywords
                .into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.trim().is_empty())
                .map(|k| k.to_lowercase())
                .collect();
            vocab.insert(topic.into(), keywords, seed.into())?;
        }
        Ok(vocab)
    }

    fn insert(
        &mut self,
        topic: String,
        keywords: Vec<String>,
        seed_query: String,
    ) -> Result<(), LexiconError> {
        if self.keywords.contains_key(&topic) {
            return Err(LexiconError::DuplicateTopic(topic));
        }
        self.topics.push(topic.clone());
        self.keywords.insert(topic.clone(), keywords);
        self.seed_queries.insert(topic, seed_query);
        Ok(())
    }

    /// Topic names in load order.
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Keyword candidates for a topic, or `None` for an unknown topic.
    pub fn keywords(&self, topic: &str) -> Option<&[String]> {
        self.keywords.get(topic).map(Vec::as_slice)
    }

    /// The seed query text for a topic.
    pub fn seed_query(&self, topic: &str) -> Option<&str> {
        self.seed_queries.get(topic).map(String::as_str)
    }
}

fn normalize_keywords(values: &[serde_json::Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_pool_is_full_ascii_alphabet() {
        assert_eq!(LETTERS.len(), 52);
        assert!(LETTERS.contains(&'a'));
        assert!(LETTERS.contains(&'Z'));
    }

    #[test]
    fn test_punctuation_pool_excludes_quote_chars() {
        assert!(!PUNCTUATIONS.contains(&"("));
        assert!(!PUNCTUATIONS.contains(&"\""));
        assert!(!PUNCTUATIONS.contains(&"«"));
        assert!(PUNCTUATIONS.contains(&"."));
        assert!(PUNCTUATIONS.contains(&"——"));
    }

    #[test]
    fn test_common_and_uncommon_buckets_are_disjoint() {
        assert_eq!(*COMMON_PUNCTUATIONS, vec![".", ",", ":"]);
        for p in UNCOMMON_PUNCTUATIONS.iter() {
            assert!(!COMMON_PUNCTUATIONS.contains(p));
        }
    }

    #[test]
    fn test_boundary_pool_keeps_quote_chars() {
        assert!(is_pool_punctuation('('));
        assert!(is_pool_punctuation('。'));
        assert!(!is_pool_punctuation('a'));
    }

    #[test]
    fn test_vocabulary_from_entries() {
        let vocab = Vocabulary::from_entries(vec![(
            "crusades",
            vec!["tripoli", "  ", "Jerusalem"],
            "Tell me about the crusades.",
        )])
        .unwrap();
        assert_eq!(vocab.topics(), ["crusades"]);
        assert_eq!(
            vocab.keywords("crusades").unwrap(),
            ["tripoli", "jerusalem"]
        );
        assert_eq!(
            vocab.seed_query("crusades"),
            Some("Tell me about the crusades.")
        );
        assert!(vocab.keywords("unknown").is_none());
    }

    #[test]
    fn test_vocabulary_rejects_duplicate_topics() {
        let result = Vocabulary::from_entries(vec![
            ("a", vec!["x"], "q"),
            ("a", vec!["y"], "q"),
        ]);
        assert!(matches!(result, Err(LexiconError::DuplicateTopic(_))));
    }
}
