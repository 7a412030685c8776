//! Writing-style constraint. Judged externally against a target style label.

use rand::seq::SliceRandom;
use rand::RngCore;
use serde_json::{json, Value};

use super::{resample, Instruction, InstructionId, TaskContext, MODIFY_ATTEMPTS};

const STYLES: [&str; 4] = ["formal", "informal", "active voice", "passive voice"];

/// Expanded style definitions embedded in the judge prompt.
fn style_definition(style: &str) -> &'static str {
    match style {
        "formal" => {
            "A formal style, which is usually characterized by detachment, precision, objectivity, rigidity, and higher cognitive load."
        }
        "informal" => {
            "An informal style, which is more subjective, less accurate, less informative, and with much lighter cognitive load."
        }
        "active voice" => "Active voice when the subject performs the action",
        _ => "Passive voice is when the subject receives the action.",
    }
}

const STYLE_EVAL_PROMPT: &str = r#"You are an impartial judge. Evaluate how well the text matches the target writing style.

# Input
## Target Style
{style}

## Text
{generation}

# Scoring Requirements
Use an integer score from 1 to 10 with these definitions:
1-2: Completely mismatched or mostly opposite to the target style.
3-4: Weak alignment; occasional features, mostly inconsistent.
5-6: Partial alignment; noticeable but frequent departures.
7-8: Strong alignment; only occasional minor slips.
9-10: Near-perfect alignment; pervasive and consistent with no contradictions.

# Output JSON Format
{
  "rationale": "1 sentence",
  "score": integer 1-10
}
"#;

/// Require one writing style throughout the response.
#[derive(Debug, Default)]
pub struct Style {
    style: Option<&'static str>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Instruction for Style {
    fn id(&self) -> InstructionId {
        InstructionId::Style
    }

    fn is_active(&self) -> bool {
        self.style.is_some()
    }

    fn args(&self) -> Value {
        self.style
            .map(|s| json!({ "style": s }))
            .unwrap_or(Value::Null)
    }

    fn describe(&self) -> String {
        match self.style {
            Some("formal") => {
                "The response should adopt a 'formal' writing style throughout.".to_string()
            }
            Some("informal") => {
                "The response should adopt an 'informal' writing style throughout.".to_string()
            }
            Some("active voice") => {
                "The response should be written in the 'active voice' throughout.".to_string()
            }
            Some("passive voice") => {
                "The response should be written in the 'passive voice' throughout.".to_string()
            }
            _ => String::new(),
        }
    }

    fn init(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) {
        self.style = STYLES.choose(rng).copied();
    }

    fn assign(&mut self, _ctx: &TaskContext<'_>, args: &Value) {
        self.style = args
            .get("style")
            .and_then(Value::as_str)
            .map(str::to_lowercase)
            .and_then(|s| STYLES.iter().find(|c| **c == s))
            .copied();
    }

    fn modify(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> (String, String) {
        let old = self.describe();
        self.style = resample(&self.style, MODIFY_ATTEMPTS, || STYLES.choose(rng).copied());
        (old, self.describe())
    }

    fn judge_prompt(&self, generation: &str) -> Option<String> {
        self.style.map(|s| {
            STYLE_EVAL_PROMPT
                .replace("{style}", style_definition(s))
                .replace("{generation}", generation)
        })
    }
}

/// The first word of the style label must appear in the synthesized query.
pub(crate) fn query_mentions(query: &str, cur_args: &Value) -> bool {
    let Some(style) = cur_args.get("style").and_then(Value::as_str) else {
        return true;
    };
    if style.trim().is_empty() {
        return true;
    }
    match style.to_lowercase().split(' ').next() {
        Some(head) => query.to_lowercase().contains(head),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Vocabulary;

    fn style(args: Value) -> Style {
        let vocab = Vocabulary::default();
        let ctx = TaskContext::new(&vocab, "any");
        let mut inst = Style::new();
        inst.assign(&ctx, &args);
        inst
    }

    #[test]
    fn test_two_word_labels_validate() {
        let inst = style(json!({"style": "passive voice"}));
        assert!(inst.is_active());
        let prompt = inst.judge_prompt("Mistakes were made.").unwrap();
        assert!(prompt.contains("subject receives the action"));
    }

    #[test]
    fn test_unknown_style_deactivates() {
        assert!(!style(json!({"style": "baroque"})).is_active());
    }

    #[test]
    fn test_query_mentions_first_word() {
        let args = json!({"style": "active voice"});
        assert!(query_mentions("switch to active phrasing", &args));
        assert!(!query_mentions("switch the phrasing", &args));
    }
}
