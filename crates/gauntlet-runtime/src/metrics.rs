//! Corpus-level metrics over persisted eval records.
//!
//! Plain arithmetic over the record schema: endurance, streaks, robustness,
//! recovery, constraint/turn pass rates. A conversation's terminal point is
//! the first record whose `remaining_patience` hit zero; records after it
//! (from runs with a different budget) are not counted.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::records::{read_jsonl, EvalRecord, RecordError};

/// Errors from metrics aggregation.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("No eval files found in the requested ID range")]
    NoDialogs,
}

/// Aggregation options: which `eval_<id>.jsonl` files to read and whether to
/// sub-sample them.
#[derive(Debug, Clone)]
pub struct MetricsOptions {
    pub start_id: u32,
    pub end_id: u32,

    /// Aggregate over a random subset of this size, when smaller than the
    /// number of available dialogs.
    pub sample: Option<usize>,

    /// Seed for the sub-sample draw.
    pub seed: u64,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            start_id: 0,
            end_id: 205,
            sample: None,
            seed: 42,
        }
    }
}

/// Pass/total counts for one constraint tag.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ConstraintRate {
    pub passed: u64,
    pub total: u64,
}

impl ConstraintRate {
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

/// Corpus-level aggregates across dialogs.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusReport {
    /// Dialogs aggregated.
    pub dialog_count: usize,

    /// Mean turns survived per dialog, regardless of correctness.
    pub mean_survival_turns: f64,

    /// Mean per-dialog sum of per-turn constraint-satisfaction fractions.
    pub mean_constraint_turns: f64,

    /// Mean fully-satisfying turns per dialog.
    pub mean_success_turns: f64,

    /// Mean longest consecutive-success streak per dialog.
    pub mean_longest_success_streak: f64,

    /// Micro constraint pass rate: mean per-turn fraction of satisfied
    /// constraints (CSR).
    pub constraint_satisfaction_rate: f64,

    /// Micro turn pass rate: successful turns / survived turns (ISR).
    pub instruction_satisfaction_rate: f64,

    /// Mean per-dialog successes / survived.
    pub robustness: f64,

    /// Mean per-dialog recoveries / recoverable failures, over dialogs that
    /// had any.
    pub recovery: f64,

    /// Number of dialogs still alive at each turn index.
    pub survival_by_turn: Vec<u64>,

    /// Pass/total per constraint tag.
    pub per_constraint: BTreeMap<String, ConstraintRate>,
}

impl fmt::Display for CorpusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total dialog number: {}", self.dialog_count)?;
        writeln!(
            f,
            "Endurance: ({:.4}, {:.4}, {:.4})",
            self.mean_survival_turns, self.mean_constraint_turns, self.mean_success_turns
        )?;
        writeln!(f, "Endurance_LSS: {:.4}", self.mean_longest_success_streak)?;
        writeln!(
            f,
            "Constraint Satisfaction Rate (CSR): {:.4}",
            self.constraint_satisfaction_rate
        )?;
        writeln!(
            f,
            "Instruction Satisfaction Rate (ISR): {:.4}",
            self.instruction_satisfaction_rate
        )?;
        writeln!(f, "Robustness: {:.4}", self.robustness)?;
        writeln!(f, "Recovery: {:.4}", self.recovery)?;
        writeln!(f, "Turn number survival ratio: {:?}", self.survival_by_turn)?;
        for (tag, rate) in &self.per_constraint {
            writeln!(
                f,
                "Constraint pass rate [{tag}]: {}/{} = {:.4}",
                rate.passed,
                rate.total,
                rate.rate()
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct DialogStats {
    survival: u64,
    success: u64,
    constraint_turns: f64,
    longest_streak: u64,
    recoveries: u64,
    last_failed: bool,
}

impl DialogStats {
    /// Failures a responder had a chance to recover from: every failing turn
    /// except a failure on the final recorded turn.
    fn recoverable_failures(&self) -> u64 {
        let failed = self.survival - self.success;
        failed.saturating_sub(self.last_failed as u64)
    }
}

/// Aggregate `eval_<id>.jsonl` files under `input_dir` for the ID range in
/// `options`.
pub fn aggregate(input_dir: &Path, options: &MetricsOptions) -> Result<CorpusReport, MetricsError> {
    let mut ids: Vec<u32> = (options.start_id..=options.end_id)
        .filter(|id| input_dir.join(format!("eval_{id}.jsonl")).exists())
        .collect();
    if ids.is_empty() {
        return Err(MetricsError::NoDialogs);
    }
    if let Some(n) = options.sample {
        if n < ids.len() {
            let mut rng = StdRng::seed_from_u64(options.seed);
            ids = ids.choose_multiple(&mut rng, n).copied().collect();
        }
    }

    let mut dialogs: Vec<DialogStats> = Vec::with_capacity(ids.len());
    let mut survival_by_turn: Vec<u64> = Vec::new();
    let mut per_constraint: BTreeMap<String, ConstraintRate> = BTreeMap::new();
    let mut micro_fractions: Vec<f64> = Vec::new();

    for id in &ids {
        let records: Vec<EvalRecord> = read_jsonl(&input_dir.join(format!("eval_{id}.jsonl")))?;
        let mut stats = DialogStats::default();
        let mut streak = 0u64;
        let mut prev_ok = true;

        for (turn_idx, record) in records.iter().enumerate() {
            stats.survival += 1;
            if record.eval.overall_ok {
                stats.success += 1;
                streak += 1;
                stats.longest_streak = stats.longest_streak.max(streak);
            } else {
                streak = 0;
            }

            if !record.eval.details.is_empty() {
                let passed = record.eval.details.values().filter(|ok| **ok).count();
                let fraction = passed as f64 / record.eval.details.len() as f64;
                stats.constraint_turns += fraction;
                micro_fractions.push(fraction);
            }

            if survival_by_turn.len() <= turn_idx {
                survival_by_turn.resize(turn_idx + 1, 0);
            }
            survival_by_turn[turn_idx] += 1;

            for (tag, ok) in &record.eval.details {
                let entry = per_constraint.entry(tag.clone()).or_default();
                entry.total += 1;
                if *ok {
                    entry.passed += 1;
                }
            }

            if !prev_ok && record.eval.overall_ok {
                stats.recoveries += 1;
            }
            prev_ok = record.eval.overall_ok;
            stats.last_failed = !record.eval.overall_ok;

            // Exhaustion is the explicit terminal marker.
            if record.remaining_patience == Some(0) {
                break;
            }
        }
        dialogs.push(stats);
    }

    let dialog_count = dialogs.len();
    let total_survival: u64 = dialogs.iter().map(|d| d.survival).sum();
    let total_success: u64 = dialogs.iter().map(|d| d.success).sum();

    let mean = |f: &dyn Fn(&DialogStats) -> f64| -> f64 {
        dialogs.iter().map(|d| f(d)).sum::<f64>() / dialog_count as f64
    };

    let robustness = mean(&|d| {
        if d.survival == 0 {
            0.0
        } else {
            d.success as f64 / d.survival as f64
        }
    });

    let recovery_rates: Vec<f64> = dialogs
        .iter()
        .filter_map(|d| {
            let failed = d.recoverable_failures();
            (failed > 0).then(|| d.recoveries as f64 / failed as f64)
        })
        .collect();
    let recovery = if recovery_rates.is_empty() {
        0.0
    } else {
        recovery_rates.iter().sum::<f64>() / recovery_rates.len() as f64
    };

    Ok(CorpusReport {
        dialog_count,
        mean_survival_turns: mean(&|d| d.survival as f64),
        mean_constraint_turns: mean(&|d| d.constraint_turns),
        mean_success_turns: mean(&|d| d.success as f64),
        mean_longest_success_streak: mean(&|d| d.longest_streak as f64),
        constraint_satisfaction_rate: if micro_fractions.is_empty() {
            0.0
        } else {
            micro_fractions.iter().sum::<f64>() / micro_fractions.len() as f64
        },
        instruction_satisfaction_rate: if total_survival == 0 {
            0.0
        } else {
            total_success as f64 / total_survival as f64
        },
        robustness,
        recovery,
        survival_by_turn,
        per_constraint,
    })
}
