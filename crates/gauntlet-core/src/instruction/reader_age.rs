//! Reader-age constraint. Judged externally against a target age band.

use rand::seq::SliceRandom;
use rand::RngCore;
use serde_json::{json, Value};

use super::{resample, Instruction, InstructionId, TaskContext, MODIFY_ATTEMPTS};

const AGE_BANDS: [&str; 4] = ["child", "youth", "adult", "senior"];

/// Expanded band definitions embedded in the judge prompt.
fn age_definition(band: &str) -> &'static str {
    match band {
        "child" => "children aged under 14",
        "youth" => "youth aged from 15 to 24",
        "adult" => "adults aged from 25 to 64",
        _ => "seniors aged 65 or older",
    }
}

const READER_EVAL_PROMPT: &str = r#"You are an impartial judge. Evaluate how well the text aligns with the target reader age.

# Input
## Target Reader Age
{reader_age}

## Text
{generation}

# Scoring Requirements
Use an integer score from 1 to 10 with these definitions:
1-2: No alignment or opposite to the target reader age.
3-4: Weak alignment to the target reader age; sporadic cues, mostly inconsistent.
5-6: Partial alignment to the target reader age; noticeable but frequent departures.
7-8: Strong alignment to the target reader age; occasional minor slips.
9-10: Near-perfect alignment to the target reader age; consistent throughout.

# Output JSON Format
{
  "rationale": "1 sentence",
  "score": integer 1-10
}
"#;

/// Require the response to be tailored for one reader age band.
#[derive(Debug, Default)]
pub struct ReaderAge {
    band: Option<&'static str>,
}

impl ReaderAge {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Instruction for ReaderAge {
    fn id(&self) -> InstructionId {
        InstructionId::ReaderAge
    }

    fn is_active(&self) -> bool {
        self.band.is_some()
    }

    fn args(&self) -> Value {
        self.band
            .map(|b| json!({ "reader_age": b }))
            .unwrap_or(Value::Null)
    }

    fn describe(&self) -> String {
        match self.band {
            Some(b) => format!("The response should be tailored for '{b}' readers."),
            None => String::new(),
        }
    }

    fn init(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) {
        self.band = AGE_BANDS.choose(rng).copied();
    }

    fn assign(&mut self, _ctx: &TaskContext<'_>, args: &Value) {
        self.band = args
            .get("reader_age")
            .and_then(Value::as_str)
            .map(str::to_lowercase)
            .and_then(|b| AGE_BANDS.iter().find(|c| **c == b))
            .copied();
    }

    fn modify(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> (String, String) {
        let old = self.describe();
        self.band = resample(&self.band, MODIFY_ATTEMPTS, || {
            AGE_BANDS.choose(rng).copied()
        });
        (old, self.describe())
    }

    fn judge_prompt(&self, generation: &str) -> Option<String> {
        self.band.map(|b| {
            READER_EVAL_PROMPT
                .replace("{reader_age}", age_definition(b))
                .replace("{generation}", generation)
        })
    }
}

/// The band, or a recognizable synonym, must appear in the synthesized query.
pub(crate) fn query_mentions(query: &str, cur_args: &Value) -> bool {
    let Some(band) = cur_args.get("reader_age").and_then(Value::as_str) else {
        return true;
    };
    if band.trim().is_empty() {
        return true;
    }
    let q = query.to_lowercase();
    let synonyms: &[&str] = match band {
        "child" => &["child", "kid"],
        "youth" => &["youth", "teen", "adolescent", "young"],
        "adult" => &["adult", "grown-up", "mature"],
        "senior" => &["senior", "elder", "older", "retire"],
        _ => &[],
    };
    q.contains(band) || synonyms.iter().any(|s| q.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Vocabulary;

    fn reader_age(args: Value) -> ReaderAge {
        let vocab = Vocabulary::default();
        let ctx = TaskContext::new(&vocab, "any");
        let mut inst = ReaderAge::new();
        inst.assign(&ctx, &args);
        inst
    }

    #[test]
    fn test_judge_prompt_uses_band_definition() {
        let inst = reader_age(json!({"reader_age": "senior"}));
        let prompt = inst.judge_prompt("Back in my day...").unwrap();
        assert!(prompt.contains("seniors aged 65 or older"));
    }

    #[test]
    fn test_unknown_band_deactivates() {
        assert!(!reader_age(json!({"reader_age": "toddler"})).is_active());
    }

    #[test]
    fn test_query_mentions_synonyms() {
        let args = json!({"reader_age": "child"});
        assert!(query_mentions("make it fun for kids", &args));
        assert!(query_mentions("a child could follow", &args));
        assert!(!query_mentions("simplify it", &args));
    }
}
