//! Length constraint over words, paragraphs, characters, or sentences.

use rand::seq::SliceRandom;
use rand::RngCore;
use serde_json::{json, Value};

use super::{resample, Instruction, InstructionId, TaskContext, MODIFY_ATTEMPTS};
use crate::text;

const MODES: [&str; 4] = ["word", "paragraph", "characters", "sentence"];
const RELATIONS: [&str; 3] = ["less_than", "more_than", "exactly"];

#[derive(Debug, Clone, PartialEq)]
struct LengthArgs {
    mode: &'static str,
    relation: &'static str,
    number: u64,
}

impl LengthArgs {
    fn draw(rng: &mut dyn RngCore) -> Option<Self> {
        let mode = *MODES.choose(rng)?;
        let relation = *RELATIONS.choose(rng)?;
        let candidates: Vec<u64> = match mode {
            "word" => (100..2000).step_by(100).collect(),
            "paragraph" => (2..7).collect(),
            "characters" => (100..2500).step_by(100).collect(),
            _ => (5..50).step_by(5).collect(),
        };
        let number = *candidates.choose(rng)?;
        Some(Self {
            mode,
            relation,
            number,
        })
    }

    fn from_value(args: &Value) -> Option<Self> {
        let mode = MODES
            .iter()
            .find(|m| Some(**m) == args.get("mode").and_then(Value::as_str))
            .copied()?;
        let relation = RELATIONS
            .iter()
            .find(|r| Some(**r) == args.get("relation").and_then(Value::as_str))
            .copied()?;
        let number = args.get("number")?.as_u64()?;
        Some(Self {
            mode,
            relation,
            number,
        })
    }

    fn relation_text(&self) -> &'static str {
        match self.relation {
            "less_than" => "less than",
            "more_than" => "more than",
            _ => "exactly",
        }
    }

    fn target_text(&self) -> &'static str {
        match self.mode {
            "word" => "words",
            "paragraph" => "paragraphs",
            "characters" => "characters",
            _ => "sentences",
        }
    }
}

/// Require the response length to satisfy a relation against a threshold.
#[derive(Debug, Default)]
pub struct Length {
    args: Option<LengthArgs>,
}

impl Length {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Instruction for Length {
    fn id(&self) -> InstructionId {
        InstructionId::Length
    }

    fn is_active(&self) -> bool {
        self.args.is_some()
    }

    fn args(&self) -> Value {
        match &self.args {
            Some(a) => json!({"mode": a.mode, "relation": a.relation, "number": a.number}),
            None => Value::Null,
        }
    }

    fn describe(&self) -> String {
        match &self.args {
            Some(a) => format!(
                "The response must contain {} {} {}.",
                a.relation_text(),
                a.number,
                a.target_text()
            ),
            None => String::new(),
        }
    }

    fn init(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) {
        self.args = LengthArgs::draw(rng);
    }

    fn assign(&mut self, _ctx: &TaskContext<'_>, args: &Value) {
        self.args = LengthArgs::from_value(args);
    }

    fn modify(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> (String, String) {
        let old = self.describe();
        self.args = resample(&self.args, MODIFY_ATTEMPTS, || LengthArgs::draw(rng));
        (old, self.describe())
    }

    fn check(&self, generation: &str) -> bool {
        let Some(args) = &self.args else {
            return true;
        };
        let count = match args.mode {
            "word" => text::count_words(generation),
            "paragraph" => text::count_paragraphs(generation),
            "sentence" => text::count_sentences(generation),
            _ => generation.chars().count(),
        } as u64;
        match args.relation {
            "less_than" => count < args.number,
            "more_than" => count > args.number,
            _ => count == args.number,
        }
    }
}

/// Any one of mode, number, or the relation's first token is enough for a
/// synthesized query to communicate this constraint.
pub(crate) fn query_mentions(query: &str, cur_args: &Value) -> bool {
    if query.trim().is_empty() {
        return false;
    }
    let q = query.to_lowercase();
    if let Some(mode) = cur_args.get("mode").and_then(Value::as_str) {
        if !mode.is_empty() && q.contains(&mode.to_lowercase()) {
            return true;
        }
    }
    if let Some(number) = cur_args.get("number").and_then(Value::as_u64) {
        if q.contains(&number.to_string()) {
            return true;
        }
    }
    if let Some(relation) = cur_args.get("relation").and_then(Value::as_str) {
        if let Some(head) = relation.split('_').next() {
            if !head.is_empty() && q.contains(&head.to_lowercase()) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Vocabulary;

    fn length(mode: &str, relation: &str, number: u64) -> Length {
        let vocab = Vocabulary::default();
        let ctx = TaskContext::new(&vocab, "any");
        let mut inst = Length::new();
        inst.assign(
            &ctx,
            &json!({"mode": mode, "relation": relation, "number": number}),
        );
        inst
    }

    #[test]
    fn test_word_relations() {
        assert!(length("word", "exactly", 3).check("one two three"));
        assert!(length("word", "less_than", 4).check("one two three"));
        assert!(length("word", "more_than", 2).check("one two three"));
        assert!(!length("word", "more_than", 3).check("one two three"));
    }

    #[test]
    fn test_paragraph_count() {
        let inst = length("paragraph", "exactly", 2);
        assert!(inst.check("first block\n\nsecond block"));
        assert!(!inst.check("only one block"));
    }

    #[test]
    fn test_sentence_count_falls_back_to_one() {
        let inst = length("sentence", "exactly", 1);
        assert!(inst.check("no terminator here at all"));
        assert!(!inst.check(""));
    }

    #[test]
    fn test_character_count_is_chars_not_bytes() {
        let inst = length("characters", "exactly", 2);
        assert!(inst.check("«»"));
    }

    #[test]
    fn test_partial_args_deactivate() {
        let vocab = Vocabulary::default();
        let ctx = TaskContext::new(&vocab, "any");
        let mut inst = Length::new();
        inst.assign(&ctx, &json!({"mode": "word", "relation": "less_than"}));
        assert!(!inst.is_active());
        inst.assign(&ctx, &json!({"mode": "word", "relation": "between", "number": 5}));
        assert!(!inst.is_active());
    }

    #[test]
    fn test_query_mentions_any_token() {
        let args = json!({"mode": "word", "relation": "less_than", "number": 300});
        assert!(query_mentions("keep it under 300 please", &args));
        assert!(query_mentions("fewer words this time", &args));
        assert!(query_mentions("make it less wordy", &args));
        assert!(!query_mentions("shorter now", &args));
    }
}
