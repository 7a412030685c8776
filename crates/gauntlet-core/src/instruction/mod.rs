//! The instruction catalog: one shared contract, twelve conforming variants.
//!
//! An instruction is a single declared requirement a reply must satisfy,
//! identified by a string tag and a variant-specific parameter set. Nine
//! variants decide compliance locally from the text alone; three delegate
//! scoring to an external judge and are thresholded by the caller.
//!
//! ## Configuration lifecycle
//!
//! Args are a value, not hidden state: `assign` adopts a fully valid
//! parameter set verbatim and collapses anything else to the inactive state
//! (never an error), `init` draws a uniformly random valid configuration,
//! and `modify` resamples until the configuration changes (best-effort,
//! bounded retries). An inactive instruction describes to the empty string
//! and always passes.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

use crate::lexicon::Vocabulary;

mod anchor;
mod change_case;
mod countable_items;
mod emotion;
mod existence;
mod forbidden;
mod format;
mod length;
mod punctuation;
mod reader_age;
pub mod registry;
mod style;

pub use anchor::{EndWith, StartWith};
pub use change_case::ChangeCase;
pub use countable_items::CountableItems;
pub use emotion::Emotion;
pub use existence::Existence;
pub use forbidden::Forbidden;
pub use format::Format;
pub use length::Length;
pub use punctuation::Punctuation;
pub use reader_age::ReaderAge;
pub use style::Style;

/// Bounded retries for [`Instruction::modify`] and the resample combinator.
pub const MODIFY_ATTEMPTS: usize = 10;

/// A rated instruction passes when its judge score exceeds this threshold.
pub const JUDGE_PASS_THRESHOLD: f64 = 6.0;

/// Closed set of instruction tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InstructionId {
    #[serde(rename = "startwith")]
    StartWith,
    #[serde(rename = "endwith")]
    EndWith,
    #[serde(rename = "format")]
    Format,
    #[serde(rename = "countableItems")]
    CountableItems,
    #[serde(rename = "length")]
    Length,
    #[serde(rename = "existence")]
    Existence,
    #[serde(rename = "forbidden")]
    Forbidden,
    #[serde(rename = "case")]
    Case,
    #[serde(rename = "punctuation")]
    Punctuation,
    #[serde(rename = "emotion")]
    Emotion,
    #[serde(rename = "reader_age")]
    ReaderAge,
    #[serde(rename = "style")]
    Style,
}

impl InstructionId {
    /// All tags, in catalog order.
    pub const ALL: [InstructionId; 12] = [
        InstructionId::StartWith,
        InstructionId::EndWith,
        InstructionId::Format,
        InstructionId::CountableItems,
        InstructionId::Length,
        InstructionId::Existence,
        InstructionId::Forbidden,
        InstructionId::Case,
        InstructionId::Punctuation,
        InstructionId::Emotion,
        InstructionId::ReaderAge,
        InstructionId::Style,
    ];

    /// The wire tag for this id.
    pub fn as_tag(&self) -> &'static str {
        match self {
            InstructionId::StartWith => "startwith",
            InstructionId::EndWith => "endwith",
            InstructionId::Format => "format",
            InstructionId::CountableItems => "countableItems",
            InstructionId::Length => "length",
            InstructionId::Existence => "existence",
            InstructionId::Forbidden => "forbidden",
            InstructionId::Case => "case",
            InstructionId::Punctuation => "punctuation",
            InstructionId::Emotion => "emotion",
            InstructionId::ReaderAge => "reader_age",
            InstructionId::Style => "style",
        }
    }

    /// Parse a wire tag. Unknown tags are a checked condition for callers,
    /// not a panic or a silent skip.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.as_tag() == tag)
    }

    /// Whether compliance is decided by an external judge call rather than
    /// computed locally.
    pub fn is_rated(&self) -> bool {
        matches!(
            self,
            InstructionId::Emotion | InstructionId::ReaderAge | InstructionId::Style
        )
    }
}

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Wire/persisted form of one instruction: tag plus variant-shaped args.
///
/// The id stays a plain string here so an unknown tag in a dialog file can be
/// surfaced as a per-constraint failure instead of poisoning the whole line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstructionSpec {
    pub id: String,
    #[serde(default)]
    pub args: Value,
}

/// Task context an instruction initializes against: the topic in force and
/// the keywords another constraint has already claimed.
#[derive(Debug, Clone)]
pub struct TaskContext<'a> {
    vocabulary: &'a Vocabulary,
    topic: &'a str,
    forbidden_mask: HashSet<String>,
}

impl<'a> TaskContext<'a> {
    pub fn new(vocabulary: &'a Vocabulary, topic: &'a str) -> Self {
        Self {
            vocabulary,
            topic,
            forbidden_mask: HashSet::new(),
        }
    }

    /// Exclude keywords from selection (lower-cased; blanks dropped).
    pub fn with_forbidden_mask<I, S>(mut self, mask: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.forbidden_mask = mask
            .into_iter()
            .filter(|s| !s.as_ref().trim().is_empty())
            .map(|s| s.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn topic(&self) -> &str {
        self.topic
    }

    pub fn is_masked(&self, keyword: &str) -> bool {
        self.forbidden_mask.contains(&keyword.to_lowercase())
    }

    /// Topic keywords minus the forbidden mask. Empty for an unknown topic,
    /// which leaves keyword-based variants inactive.
    pub fn keyword_candidates(&self) -> Vec<&'a str> {
        match self.vocabulary.keywords(self.topic) {
            Some(keywords) => keywords
                .iter()
                .map(String::as_str)
                .filter(|k| !self.forbidden_mask.contains(*k))
                .collect(),
            None => {
                tracing::warn!(topic = self.topic, "topic not in vocabulary");
                Vec::new()
            }
        }
    }

    /// Whether `keyword` is a selectable candidate for this task.
    pub fn is_candidate(&self, keyword: &str) -> bool {
        self.keyword_candidates().iter().any(|k| *k == keyword)
    }

    /// Size of the unmasked candidate pool.
    pub fn candidate_count(&self) -> usize {
        self.keyword_candidates().len()
    }
}

/// Unified outcome of one constraint check: a normalized boolean verdict
/// plus, for rated instructions, the judge's score and rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Verdict {
    pub fn pass() -> Self {
        Self {
            ok: true,
            score: None,
            rationale: None,
        }
    }

    pub fn fail() -> Self {
        Self {
            ok: false,
            score: None,
            rationale: None,
        }
    }

    pub fn from_bool(ok: bool) -> Self {
        if ok {
            Self::pass()
        } else {
            Self::fail()
        }
    }

    /// Threshold a judge score: pass iff `score > JUDGE_PASS_THRESHOLD`.
    pub fn scored(score: f64, rationale: impl Into<String>) -> Self {
        Self {
            ok: score > JUDGE_PASS_THRESHOLD,
            score: Some(score),
            rationale: Some(rationale.into()),
        }
    }
}

/// Draw up to `attempts` samples, keeping the first that differs from
/// `current`; the final draw is kept as-is when every attempt collides.
///
/// This is a best-effort uniqueness contract: on a singleton domain the
/// result may equal `current`.
pub fn resample<T, F>(current: &T, attempts: usize, mut draw: F) -> T
where
    T: PartialEq,
    F: FnMut() -> T,
{
    let mut candidate = draw();
    for _ in 1..attempts {
        if candidate != *current {
            break;
        }
        candidate = draw();
    }
    candidate
}

/// The shared contract every constraint variant implements.
pub trait Instruction: Send + Sync {
    /// This variant's tag.
    fn id(&self) -> InstructionId;

    /// Whether a configuration is in force. Inactive instructions are no-ops:
    /// empty description, always-pass check.
    fn is_active(&self) -> bool;

    /// Current args in wire form; `Value::Null` when inactive.
    fn args(&self) -> Value;

    /// Deterministic one-sentence description of the current args; empty when
    /// inactive.
    fn describe(&self) -> String;

    /// Draw a uniformly random valid configuration from this variant's
    /// domain. Variants whose candidate pool is empty become inactive.
    fn init(&mut self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore);

    /// Adopt `args` verbatim when fully valid for this variant; collapse to
    /// the inactive state otherwise. Never errors.
    fn assign(&mut self, ctx: &TaskContext<'_>, args: &Value);

    /// Resample a different configuration from the same domain (bounded
    /// retries, best-effort). Returns the old and new descriptions.
    fn modify(&mut self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> (String, String);

    /// Local compliance check. Rated variants keep the always-pass default;
    /// their compliance comes from [`Instruction::judge_prompt`].
    fn check(&self, _generation: &str) -> bool {
        true
    }

    /// For rated variants: the judge prompt for `generation`. `None` for
    /// deterministic variants and for inactive rated ones.
    fn judge_prompt(&self, _generation: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for id in InstructionId::ALL {
            assert_eq!(InstructionId::from_tag(id.as_tag()), Some(id));
        }
        assert_eq!(InstructionId::from_tag("no-such-tag"), None);
    }

    #[test]
    fn test_rated_partition() {
        let rated: Vec<_> = InstructionId::ALL
            .iter()
            .filter(|id| id.is_rated())
            .collect();
        assert_eq!(rated.len(), 3);
    }

    #[test]
    fn test_verdict_threshold() {
        assert!(Verdict::scored(7.0, "strong").ok);
        assert!(!Verdict::scored(6.0, "partial").ok);
        assert!(!Verdict::scored(0.0, "").ok);
    }

    #[test]
    fn test_resample_prefers_a_change() {
        let mut draws = [1, 1, 1, 2, 3].into_iter();
        let result = resample(&1, MODIFY_ATTEMPTS, || draws.next().unwrap_or(9));
        assert_eq!(result, 2);
    }

    #[test]
    fn test_resample_accepts_collision_on_exhaustion() {
        let result = resample(&1, MODIFY_ATTEMPTS, || 1);
        assert_eq!(result, 1);
    }

    #[test]
    fn test_task_context_masking() {
        let vocab = Vocabulary::from_entries(vec![("t", vec!["alpha", "beta"], "q")]).unwrap();
        let ctx = TaskContext::new(&vocab, "t").with_forbidden_mask(["Alpha"]);
        assert_eq!(ctx.keyword_candidates(), ["beta"]);
        assert!(ctx.is_masked("alpha"));
        assert!(!ctx.is_candidate("alpha"));
        assert!(ctx.is_candidate("beta"));
    }
}
