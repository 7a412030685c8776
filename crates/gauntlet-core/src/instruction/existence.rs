//! Keyword-existence constraint: named keywords must each occur an exact
//! number of times.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::{resample, Instruction, InstructionId, TaskContext, MODIFY_ATTEMPTS};
use crate::text;

type Counts = BTreeMap<String, u64>;

/// Require each configured keyword to occur exactly its declared count.
#[derive(Debug, Default)]
pub struct Existence {
    keywords: Counts,
}

impl Existence {
    pub fn new() -> Self {
        Self::default()
    }

    fn draw(ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> Counts {
        let mut candidates: Vec<&str> = ctx.keyword_candidates();
        candidates.shuffle(rng);
        if candidates.is_empty() {
            return Counts::new();
        }
        let take = rng.gen_range(1..=3usize).min(candidates.len());
        candidates[..take]
            .iter()
            .map(|k| ((*k).to_string(), rng.gen_range(1..=10u64)))
            .collect()
    }

    fn mutate(&self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> Counts {
        let total = ctx.candidate_count();
        let op = if self.keywords.is_empty() {
            "add"
        } else if self.keywords.len() == 1 {
            *["add", "update"].choose(rng).unwrap_or(&"add")
        } else if self.keywords.len() >= total {
            *["remove", "update"].choose(rng).unwrap_or(&"update")
        } else {
            *["add", "remove", "update"].choose(rng).unwrap_or(&"add")
        };
        match op {
            "add" => self.add_op(ctx, rng),
            "remove" => self.remove_op(rng),
            _ => self.update_op(rng),
        }
    }

    fn add_op(&self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> Counts {
        let mut current = self.keywords.clone();
        let mut candidates: Vec<&str> = ctx
            .keyword_candidates()
            .into_iter()
            .filter(|k| !current.contains_key(*k))
            .collect();
        candidates.shuffle(rng);
        let take = rng.gen_range(1..=3usize).min(candidates.len());
        for k in &candidates[..take] {
            current.insert((*k).to_string(), rng.gen_range(1..=3u64));
        }
        current
    }

    fn remove_op(&self, rng: &mut dyn RngCore) -> Counts {
        let mut current = self.keywords.clone();
        let mut keys: Vec<String> = current.keys().cloned().collect();
        keys.shuffle(rng);
        let upper = (keys.len() / 2).max(1);
        let drop = rng.gen_range(1..=upper);
        for k in &keys[..drop.min(keys.len())] {
            current.remove(k);
        }
        current
    }

    fn update_op(&self, rng: &mut dyn RngCore) -> Counts {
        let mut current = self.keywords.clone();
        if current.is_empty() {
            return current;
        }
        let mut keys: Vec<String> = current.keys().cloned().collect();
        keys.shuffle(rng);
        let touch = rng.gen_range(1..=keys.len());
        let mut changed = false;
        for k in &keys[..touch] {
            let old = current[k];
            let choices: Vec<u64> = [1u64, 2, 3].into_iter().filter(|c| *c != old).collect();
            if let Some(new_val) = choices.choose(rng) {
                if *new_val != old {
                    changed = true;
                }
                current.insert(k.clone(), *new_val);
            }
        }
        if !changed {
            if let Some(k) = keys.choose(rng) {
                let forced = if current[k] != 1 { 1 } else { 2 };
                current.insert(k.clone(), forced);
            }
        }
        current
    }
}

impl Instruction for Existence {
    fn id(&self) -> InstructionId {
        InstructionId::Existence
    }

    fn is_active(&self) -> bool {
        !self.keywords.is_empty()
    }

    fn args(&self) -> Value {
        if self.keywords.is_empty() {
            return Value::Null;
        }
        let map: Map<String, Value> = self
            .keywords
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        Value::Object(map)
    }

    fn describe(&self) -> String {
        if self.keywords.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self
            .keywords
            .iter()
            .map(|(k, n)| {
                if *n == 1 {
                    format!("'{k}' (exactly once)")
                } else {
                    format!("'{k}' (exactly {n} times)")
                }
            })
            .collect();
        format!(
            "The response must include the following keywords: {}.",
            parts.join(", ")
        )
    }

    fn init(&mut self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) {
        self.keywords = Self::draw(ctx, rng);
    }

    fn assign(&mut self, ctx: &TaskContext<'_>, args: &Value) {
        self.keywords = Counts::new();
        let Some(object) = args.as_object() else {
            return;
        };
        if object.is_empty() {
            return;
        }
        let mut adopted = Counts::new();
        for (k, v) in object {
            // A masked keyword is dropped, not a validation failure.
            if ctx.is_masked(k) {
                continue;
            }
            match v.as_u64() {
                Some(count) if count >= 1 => {
                    adopted.insert(k.clone(), count);
                }
                _ => return,
            }
        }
        self.keywords = adopted;
    }

    fn modify(&mut self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> (String, String) {
        let old = self.describe();
        let next = resample(&self.keywords, MODIFY_ATTEMPTS, || {
            let candidate = self.mutate(ctx, rng);
            candidate
                .into_iter()
                .filter(|(k, _)| !ctx.is_masked(k))
                .collect()
        });
        self.keywords = next;
        (old, self.describe())
    }

    fn check(&self, generation: &str) -> bool {
        self.keywords
            .iter()
            .all(|(kw, required)| text::count_keyword(generation, kw) as u64 == *required)
    }
}

/// All keywords whose requirement changed (added or count updated) must be
/// mentioned by the synthesized query; no effective change counts as
/// complete.
pub(crate) fn query_mentions(query: &str, prev_args: Option<&Value>, cur_args: &Value) -> bool {
    let empty = Map::new();
    let cur = cur_args.as_object().unwrap_or(&empty);
    let prev = prev_args.and_then(Value::as_object).unwrap_or(&empty);

    let changed: Vec<&String> = cur
        .iter()
        .filter(|(k, v)| prev.get(*k) != Some(v))
        .map(|(k, _)| k)
        .collect();
    if changed.is_empty() {
        return true;
    }
    let q = query.to_lowercase();
    changed.iter().all(|k| q.contains(&k.to_lowercase()))
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

    fn existence(args: Value) -> Existence {
        let vocab = vocab();
        let ctx = TaskContext::new(&vocab, "t");
        let mut inst = Existence::new();
        inst.assign(&ctx, &args);
        inst
    }

    #[test]
    fn test_exact_count_any_case() {
        let inst = existence(json!({"x": 2}));
        assert!(inst.check("X marks the spot, and x again"));
        assert!(!inst.check("x only once"));
        assert!(!inst.check("x and x and x"));
    }

    #[test]
    fn test_word_boundary_counting() {
        let inst = existence(json!({"x": 1}));
        // "taxi" does not contain "x" as a word.
        assert!(inst.check("the taxi had an x painted on it"));
    }

    #[test]
    fn test_masked_keywords_are_dropped_not_fatal() {
        let vocab = vocab();
        let ctx = TaskContext::new(&vocab, "t").with_forbidden_mask(["alpha"]);
        let mut inst = Existence::new();
        inst.assign(&ctx, &json!({"alpha": 1, "beta": 2}));
        assert_eq!(inst.args(), json!({"beta": 2}));
    }

    #[test]
    fn test_invalid_count_deactivates() {
        assert!(!existence(json!({"x": 0})).is_active());
        assert!(!existence(json!({"x": "two"})).is_active());
        assert!(!existence(json!({})).is_active());
        assert!(!existence(json!(["x"])).is_active());
    }

    #[test]
    fn test_random_init_respects_mask() {
        let vocab = vocab();
        let ctx =
            TaskContext::new(&vocab, "t").with_forbidden_mask(["alpha", "beta", "gamma"]);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let mut inst = Existence::new();
            inst.init(&ctx, &mut rng);
            assert!(inst.is_active());
            assert_eq!(inst.args(), json!({"delta": inst.keywords["delta"]}));
        }
    }

    #[test]
    fn test_modify_eventually_changes() {
        let vocab = vocab();
        let ctx = TaskContext::new(&vocab, "t");
        let mut rng = StdRng::seed_from_u64(3);
        let mut inst = Existence::new();
        inst.init(&ctx, &mut rng);
        let (old, new) = inst.modify(&ctx, &mut rng);
        assert_ne!(old, new);
    }

    #[test]
    fn test_query_mentions_changed_keywords() {
        let prev = json!({"alpha": 1});
        let cur = json!({"alpha": 1, "beta": 2});
        assert!(query_mentions("please mention beta twice", Some(&prev), &cur));
        assert!(!query_mentions("no keywords named", Some(&prev), &cur));
        // Count change alone also demands a mention.
        let bumped = json!({"alpha": 3});
        assert!(!query_mentions("same as before", Some(&prev), &bumped));
        assert!(query_mentions("alpha three times now", Some(&prev), &bumped));
        // No effective change: complete by definition.
        assert!(query_mentions("anything", Some(&prev), &prev));
    }
}
