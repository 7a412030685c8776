//! Forbidden-keyword constraint: listed keywords must not appear at all.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde_json::{json, Value};

use super::{resample, Instruction, InstructionId, TaskContext, MODIFY_ATTEMPTS};
use crate::text;

/// Require that none of the configured keywords occur in the response.
#[derive(Debug, Default)]
pub struct Forbidden {
    keywords: Vec<String>,
}

impl Forbidden {
    pub fn new() -> Self {
        Self::default()
    }

    fn draw(ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> Vec<String> {
        let mut candidates: Vec<&str> = ctx.keyword_candidates();
        candidates.shuffle(rng);
        if candidates.is_empty() {
            return Vec::new();
        }
        let take = rng.gen_range(1..=3usize).min(candidates.len());
        candidates[..take].iter().map(|k| (*k).to_string()).collect()
    }

    fn mutate(&self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> Vec<String> {
        let total = ctx.candidate_count();
        let add = if self.keywords.len() <= 1 {
            true
        } else if self.keywords.len() >= total {
            false
        } else {
            rng.gen_bool(0.5)
        };
        if add {
            self.add_op(ctx, rng)
        } else {
            self.remove_op(rng)
        }
    }

    fn add_op(&self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> Vec<String> {
        let mut current = self.keywords.clone();
        let mut candidates: Vec<&str> = ctx
            .keyword_candidates()
            .into_iter()
            .filter(|k| !current.iter().any(|c| c == k))
            .collect();
        candidates.shuffle(rng);
        let take = rng.gen_range(1..=3usize).min(candidates.len());
        current.extend(candidates[..take].iter().map(|k| (*k).to_string()));
        current
    }

    fn remove_op(&self, rng: &mut dyn RngCore) -> Vec<String> {
        let mut current = self.keywords.clone();
        if current.is_empty() {
            return current;
        }
        current.shuffle(rng);
        let upper = (current.len() / 2).max(1);
        let drop = rng.gen_range(1..=upper).min(current.len());
        current.split_off(drop)
    }

    fn normalize(values: &[Value]) -> Vec<String> {
        values
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}

impl Instruction for Forbidden {
    fn id(&self) -> InstructionId {
        InstructionId::Forbidden
    }

    fn is_active(&self) -> bool {
        !self.keywords.is_empty()
    }

    fn args(&self) -> Value {
        if self.keywords.is_empty() {
            Value::Null
        } else {
            json!(self.keywords)
        }
    }

    fn describe(&self) -> String {
        if self.keywords.is_empty() {
            return String::new();
        }
        let items: Vec<String> = self.keywords.iter().map(|k| format!("'{k}'")).collect();
        format!(
            "The response must not contain the following keywords: {}.",
            items.join(", ")
        )
    }

    fn init(&mut self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) {
        self.keywords = Self::draw(ctx, rng);
    }

    fn assign(&mut self, ctx: &TaskContext<'_>, args: &Value) {
        // Array form is canonical; the legacy `{"keywords": [...]}` object is
        // still accepted.
        let list = match args {
            Value::Array(values) => Self::normalize(values),
            Value::Object(map) => map
                .get("keywords")
                .and_then(Value::as_array)
                .map(|v| Self::normalize(v))
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        self.keywords = list.into_iter().filter(|k| !ctx.is_masked(k)).collect();
    }

    fn modify(&mut self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> (String, String) {
        let old = self.describe();
        let next = resample(&self.keywords, MODIFY_ATTEMPTS, || {
            self.mutate(ctx, rng)
                .into_iter()
                .filter(|k| !ctx.is_masked(k))
                .collect()
        });
        self.keywords = next;
        (old, self.describe())
    }

    fn check(&self, generation: &str) -> bool {
        !self
            .keywords
            .iter()
            .any(|kw| text::contains_keyword(generation, kw))
    }
}

/// Newly added keywords must all be mentioned by the synthesized query; no
/// additions counts as complete.
pub(crate) fn query_mentions(query: &str, prev_args: Option<&Value>, cur_args: &Value) -> bool {
    let cur: Vec<&str> = cur_args
        .as_array()
        .map(|v| v.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let prev: Vec<String> = prev_args
        .and_then(Value::as_array)
        .map(|v| {
            v.iter()
                .filter_map(Value::as_str)
                .map(str::to_lowercase)
                .collect()
        })
        .unwrap_or_default();

    let added: Vec<&str> = cur
        .iter()
        .filter(|k| !prev.contains(&k.to_lowercase()))
        .copied()
        .collect();
    if added.is_empty() {
        return true;
    }
    let q = query.to_lowercase();
    added.iter().all(|k| q.contains(&k.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Vocabulary;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn vocab() -> Vocabulary {
        Vocabulary::from_entries(vec![(
            "t",
            vec!["alpha", "beta", "gamma", "delta"],
            "seed",
        )])
        .unwrap()
    }

    fn forbidden(args: Value) -> Forbidden {
        let vocab = vocab();
        let ctx = TaskContext::new(&vocab, "t");
        let mut inst = Forbidden::new();
        inst.assign(&ctx, &args);
        inst
    }

    #[test]
    fn test_whole_word_occurrence_fails() {
        let inst = forbidden(json!(["x"]));
        assert!(!inst.check("the x factor"));
        assert!(!inst.check("X as a word"));
    }

    #[test]
    fn test_substring_inside_word_is_allowed() {
        let inst = forbidden(json!(["x"]));
        assert!(inst.check("we took a taxi downtown"));
    }

    #[test]
    fn test_non_word_keyword_uses_substring() {
        let inst = forbidden(json!(["c++"]));
        assert!(!inst.check("I love C++ dearly"));
        assert!(inst.check("I love C dearly"));
    }

    #[test]
    fn test_legacy_object_args() {
        let inst = forbidden(json!({"keywords": ["Alpha", "  ", 3]}));
        assert_eq!(inst.args(), json!(["alpha"]));
    }

    #[test]
    fn test_empty_list_is_inactive() {
        let inst = forbidden(json!([]));
        assert!(!inst.is_active());
        assert!(inst.check("anything at all"));
    }

    #[test]
    fn test_modify_eventually_changes() {
        let vocab = vocab();
        let ctx = TaskContext::new(&vocab, "t");
        let mut rng = StdRng::seed_from_u64(5);
        let mut inst = Forbidden::new();
        inst.init(&ctx, &mut rng);
        let (old, new) = inst.modify(&ctx, &mut rng);
        assert_ne!(old, new);
    }

    #[test]
    fn test_query_mentions_added_keywords() {
        let cur = json!(["tripoli", "principality of galilee"]);
        assert!(query_mentions(
            "Don't mention 'tripoli' or the 'principality of galilee'.",
            None,
            &cur
        ));
        assert!(!query_mentions("Don't mention tripoli.", None, &cur));
        let prev = json!(["tripoli", "principality of galilee"]);
        assert!(query_mentions("no new ones", Some(&prev), &cur));
    }
}
