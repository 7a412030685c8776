//! Dialog replay engine and patience state machine.
//!
//! One conversation at a time: fetch the next turn, generate a reply,
//! evaluate it against the turn's active instructions, update the
//! consecutive-failure budget, persist the record, repeat. Each record is
//! durable before the next turn begins, which is what makes resuming an
//! interrupted run correct.
//!
//! Containment policy mirrors the error taxonomy: a failed judge call or an
//! unknown instruction id fails that one constraint; only a responder
//! failure terminates the conversation, and it never leaves a partial
//! record behind.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use gauntlet_core::{registry, InstructionSpec, TaskContext, Verdict, Vocabulary};

use crate::judge::JudgeClient;
use crate::providers::{ChatMessage, ChatProvider, CompletionConfig};
use crate::records::{read_jsonl, DialogTurn, EvalRecord, EvalWriter, RecordError, TurnEval};

/// Errors that abort a replay outright (I/O on the record file). External
/// call failures are handled by the containment policy instead.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Why a conversation stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// Every remaining turn was processed.
    Completed,

    /// The consecutive-failure budget reached zero.
    PatienceExhausted,

    /// The responder call failed; fatal for this conversation only.
    ResponderFailed(String),
}

/// Outcome of one [`DialogReplay::run_dialog`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySummary {
    /// Turns evaluated and recorded in this call (excludes resumed ones).
    pub turns_evaluated: u32,

    /// Turn number of the last previously persisted record, if resuming.
    pub resumed_after: Option<u32>,

    pub stop: StopReason,
}

/// Replay configuration.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Consecutive-failure budget; `None` disables early stopping.
    pub patience: Option<u32>,

    /// Optional fixed system preamble prepended to every request.
    pub system_preamble: Option<String>,

    /// Completion settings for the responder under evaluation.
    pub responder: CompletionConfig,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            patience: Some(3),
            system_preamble: None,
            responder: CompletionConfig::default(),
        }
    }
}

/// Sequentially replays one conversation against a responder and evaluates
/// every reply.
///
/// Conversations are independent: the only shared state is the read-only
/// vocabulary, so callers may drive many replays concurrently, one engine
/// call per conversation.
pub struct DialogReplay {
    responder: Arc<dyn ChatProvider>,
    judge: JudgeClient,
    vocabulary: Arc<Vocabulary>,
    config: ReplayConfig,
}

impl DialogReplay {
    pub fn new(
        responder: Arc<dyn ChatProvider>,
        judge: JudgeClient,
        vocabulary: Arc<Vocabulary>,
        config: ReplayConfig,
    ) -> Self {
        Self {
            responder,
            judge,
            vocabulary,
            config,
        }
    }

    /// Replay `turns`, appending one record per evaluated turn to `out_path`.
    ///
    /// If `out_path` already holds records, the run resumes after the last
    /// well-formed one: patience is restored from it and the conversation
    /// history is rebuilt from every persisted (utterance, reply) pair.
    pub async fn run_dialog(
        &self,
        turns: &[DialogTurn],
        out_path: &Path,
    ) -> Result<ReplaySummary, ReplayError> {
        let mut remaining = self.config.patience;
        let mut history: Vec<ChatMessage> = Vec::new();
        let mut resumed_after = None;

        if out_path.exists() {
            let finished: Vec<EvalRecord> = read_jsonl(out_path)?;
            if let Some(last) = finished.last() {
                resumed_after = Some(last.turn);
                remaining = last.remaining_patience;
                for record in &finished {
                    history.push(ChatMessage::user(record.user_query_verified.as_str()));
                    history.push(ChatMessage::assistant(record.response.as_str()));
                }
                tracing::info!(
                    path = %out_path.display(),
                    last_turn = last.turn,
                    remaining = ?remaining,
                    "resuming from persisted records"
                );
            }
        }

        let mut writer = EvalWriter::append_to(out_path)?;
        let mut turns_evaluated = 0u32;

        let pending = turns
            .iter()
            .filter(|t| resumed_after.map(|last| t.turn > last).unwrap_or(true));
        for turn in pending {
            if remaining == Some(0) {
                tracing::info!(turn = turn.turn, "patience exhausted; stopping conversation");
                return Ok(ReplaySummary {
                    turns_evaluated,
                    resumed_after,
                    stop: StopReason::PatienceExhausted,
                });
            }

            let mut messages = Vec::with_capacity(history.len() + 2);
            if let Some(preamble) = &self.config.system_preamble {
                messages.push(ChatMessage::system(preamble.as_str()));
            }
            messages.extend(history.iter().cloned());
            messages.push(ChatMessage::user(turn.user_query_verified.as_str()));

            // One shot, no retry. A responder failure is fatal for this
            // conversation and must not leave a partial record.
            let generation = match self
                .responder
                .complete(messages, &self.config.responder)
                .await
            {
                Ok(response) => response.content,
                Err(e) => {
                    tracing::error!(turn = turn.turn, error = %e, "responder call failed");
                    return Ok(ReplaySummary {
                        turns_evaluated,
                        resumed_after,
                        stop: StopReason::ResponderFailed(e.to_string()),
                    });
                }
            };

            let eval = self
                .evaluate_turn(&turn.active_topic, &turn.instructions, &generation)
                .await;

            if let Some(left) = remaining {
                remaining = if eval.overall_ok {
                    self.config.patience
                } else {
                    Some(left.saturating_sub(1))
                };
            }

            let record = EvalRecord {
                turn: turn.turn,
                active_topic: turn.active_topic.clone(),
                user_query_verified: turn.user_query_verified.clone(),
                instructions: turn.instructions.clone(),
                response: generation.clone(),
                eval,
                remaining_patience: remaining,
            };
            writer.append(&record)?;

            history.push(ChatMessage::user(turn.user_query_verified.as_str()));
            history.push(ChatMessage::assistant(generation));
            turns_evaluated += 1;
        }

        Ok(ReplaySummary {
            turns_evaluated,
            resumed_after,
            stop: StopReason::Completed,
        })
    }

    /// Evaluate one reply against the turn's active instruction set.
    ///
    /// An unknown instruction id is a hard failure for that constraint; a
    /// judge error degrades its constraint to `(score 0, empty rationale)`.
    pub async fn evaluate_turn(
        &self,
        topic: &str,
        instructions: &[InstructionSpec],
        generation: &str,
    ) -> TurnEval {
        let ctx = TaskContext::new(&self.vocabulary, topic);
        let mut details = BTreeMap::new();
        let mut sub_details = BTreeMap::new();
        let mut overall_ok = true;

        for spec in instructions {
            let verdict = match registry::build(spec, &ctx) {
                None => {
                    tracing::warn!(id = %spec.id, "unknown instruction id");
                    Verdict::fail()
                }
                Some(inst) => match inst.judge_prompt(generation) {
                    Some(prompt) => match self.judge.score(prompt).await {
                        Ok(judged) => Verdict::scored(judged.score as f64, judged.rationale),
                        Err(e) => {
                            tracing::warn!(id = %spec.id, error = %e, "judge call failed");
                            Verdict::scored(0.0, String::new())
                        }
                    },
                    None => Verdict::from_bool(inst.check(generation)),
                },
            };

            overall_ok &= verdict.ok;
            details.insert(spec.id.clone(), verdict.ok);
            if let (Some(score), Some(rationale)) = (verdict.score, verdict.rationale) {
                sub_details.insert(spec.id.clone(), (score, rationale));
            }
        }

        TurnEval {
            overall_ok,
            details,
            sub_details,
        }
    }
}
