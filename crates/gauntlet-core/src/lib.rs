//! # gauntlet-core
//!
//! Deterministic instruction-constraint evaluation engine.
//!
//! This crate answers one question: does a piece of generated text comply
//! with a declared set of instructions? It provides:
//!
//! - A catalog of twelve constraint variants sharing one contract
//!   (randomized or validated initialization, stable description, compliance
//!   check, query-completeness gate).
//! - A dispatch registry that reconstructs checkers from persisted
//!   `{id, args}` pairs.
//! - The shared lexicon (symbol pools plus the topic keyword vocabulary) and
//!   the text normalization helpers the checkers build on.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: the nine local variants never call out; same args
//!    and same text always produce the same verdict.
//! 2. **Never panics on input**: malformed args deactivate a constraint;
//!    wrapper stripping is best-effort and falls back to the raw text.
//! 3. **No hidden state**: the vocabulary is an explicit value, and a
//!    checker's configuration round-trips through its wire args.
//!
//! The three rated variants (emotion, reader age, style) own their label
//! domains and judge prompts here; invoking the judge and thresholding the
//! score is the runtime's job.
//!
//! ## Example
//!
//! ```rust,ignore
//! use gauntlet_core::{registry, InstructionSpec, TaskContext, Vocabulary};
//!
//! let vocab = Vocabulary::load("data/topic_keywords.jsonl")?;
//! let ctx = TaskContext::new(&vocab, "crusades");
//! let spec = InstructionSpec {
//!     id: "startwith".into(),
//!     args: serde_json::json!({"mode": "letter", "value": "t"}),
//! };
//! let checker = registry::build(&spec, &ctx).expect("known tag");
//! assert!(checker.check("The siege of Antioch began in 1097."));
//! ```

pub mod instruction;
pub mod lexicon;
pub mod text;

pub use instruction::registry;
pub use instruction::{
    ChangeCase, CountableItems, Emotion, EndWith, Existence, Forbidden, Format, Instruction,
    InstructionId, InstructionSpec, Length, Punctuation, ReaderAge, StartWith, Style, TaskContext,
    Verdict, JUDGE_PASS_THRESHOLD, MODIFY_ATTEMPTS,
};
pub use lexicon::{LexiconError, Vocabulary};
