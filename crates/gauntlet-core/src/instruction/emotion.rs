//! Emotional-tone constraint. Compliance is scored by an external judge; this
//! variant owns the label domain and the judge prompt.

use rand::seq::SliceRandom;
use rand::RngCore;
use serde_json::{json, Value};

use super::{resample, Instruction, InstructionId, TaskContext, MODIFY_ATTEMPTS};

const EMOTIONS: [&str; 6] = ["happy", "sad", "neutral", "angry", "excited", "frustrated"];

const EMOTION_EVAL_PROMPT: &str = r#"You are an impartial judge. Evaluate how well the text expresses the target emotion.

# Input
## Target Emotion
{emotion}

## Text
{generation}

# Scoring Requirements
Use an integer score from 1 to 10 with these definitions:
1-2: No alignment or opposite to the target emotion.
3-4: Weak alignment to the target emotion; sporadic cues, mostly inconsistent.
5-6: Partial alignment to the target emotion; noticeable but frequent departures.
7-8: Strong alignment to the target emotion; occasional minor slips.
9-10: Near-perfect alignment to the target emotion; consistent throughout.

# Output JSON Format
{
  "rationale": "1 sentence",
  "score": integer 1-10
}
"#;

/// Require a consistent emotional tone, judged externally.
#[derive(Debug, Default)]
pub struct Emotion {
    emotion: Option<&'static str>,
}

impl Emotion {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Instruction for Emotion {
    fn id(&self) -> InstructionId {
        InstructionId::Emotion
    }

    fn is_active(&self) -> bool {
        self.emotion.is_some()
    }

    fn args(&self) -> Value {
        self.emotion
            .map(|e| json!({ "emotion": e }))
            .unwrap_or(Value::Null)
    }

    fn describe(&self) -> String {
        match self.emotion {
            Some(e) => format!("The response should adopt a '{e}' emotional tone throughout."),
            None => String::new(),
        }
    }

    fn init(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) {
        self.emotion = EMOTIONS.choose(rng).copied();
    }

    fn assign(&mut self, _ctx: &TaskContext<'_>, args: &Value) {
        self.emotion = args
            .get("emotion")
            .and_then(Value::as_str)
            .map(str::to_lowercase)
            .and_then(|e| EMOTIONS.iter().find(|c| **c == e))
            .copied();
    }

    fn modify(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> (String, String) {
        let old = self.describe();
        self.emotion = resample(&self.emotion, MODIFY_ATTEMPTS, || {
            EMOTIONS.choose(rng).copied()
        });
        (old, self.describe())
    }

    fn judge_prompt(&self, generation: &str) -> Option<String> {
        self.emotion.map(|e| {
            EMOTION_EVAL_PROMPT
                .replace("{emotion}", e)
                .replace("{generation}", generation)
        })
    }
}

/// The target emotion word must appear in the synthesized query.
pub(crate) fn query_mentions(query: &str, cur_args: &Value) -> bool {
    match cur_args.get("emotion").and_then(Value::as_str) {
        Some(e) if !e.trim().is_empty() => query.to_lowercase().contains(&e.to_lowercase()),
        _ => true,
    }
}
