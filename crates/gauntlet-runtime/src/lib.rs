//! # gauntlet-runtime
//!
//! Async collaborators around the deterministic core: the chat providers,
//! the judge client for rated constraints, the dialog replay engine with its
//! patience state machine and crash-safe persistence, and the corpus metrics
//! aggregator.
//!
//! ## Important
//!
//! Evaluation semantics live in `gauntlet-core`. This crate only decides
//! *when* to check (per replayed turn), *how* to obtain text (responder
//! calls) and scores (judge calls), and *where* verdicts go (append-only
//! JSONL records).
//!
//! Both external calls are single-shot: the responder once per turn, the
//! judge once per rated constraint, no retries. A judge failure degrades one
//! constraint; a responder failure ends one conversation.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gauntlet_core::Vocabulary;
//! use gauntlet_runtime::{
//!     CompletionConfig, DialogReplay, JudgeClient, OpenAiProvider, ReplayConfig,
//! };
//!
//! let provider = Arc::new(OpenAiProvider::from_env()?.with_base_url(base_url));
//! let judge = JudgeClient::new(provider.clone(), CompletionConfig::for_model("gpt-4.1"));
//! let vocabulary = Arc::new(Vocabulary::load("data/topic_keywords.jsonl")?);
//! let replay = DialogReplay::new(provider, judge, vocabulary, ReplayConfig::default());
//! let summary = replay.run_dialog(&turns, &out_path).await?;
//! ```

pub mod judge;
pub mod metrics;
pub mod prompts;
pub mod providers;
pub mod records;
pub mod replay;

pub use judge::{JudgeClient, JudgeError, JudgeScore};
pub use metrics::{aggregate, ConstraintRate, CorpusReport, MetricsError, MetricsOptions};
pub use providers::{
    ChatMessage, ChatProvider, CompletionConfig, CompletionResponse, ProviderError, TokenUsage,
};
#[cfg(feature = "openai")]
pub use providers::{OpenAiProvider, OPENAI_API_KEY_ENV};
pub use records::{read_jsonl, DialogTurn, EvalRecord, EvalWriter, RecordError, TurnEval};
pub use replay::{DialogReplay, ReplayConfig, ReplayError, ReplaySummary, StopReason};
