//! Bullet-count constraint: the answer must contain exactly N bullet points.

use lazy_static::lazy_static;
use rand::{Rng, RngCore};
use regex::Regex;
use serde_json::{json, Value};

use super::{resample, Instruction, InstructionId, TaskContext, MODIFY_ATTEMPTS};

const RANDOM_RANGE: std::ops::RangeInclusive<u64> = 3..=15;

lazy_static! {
    // `* item` but not `**bold`, and `- item`; leading indentation allowed.
    static ref BULLET_STAR: Regex = Regex::new(r"(?m)^\s*\*[^\*].*$").expect("star bullet regex");
    static ref BULLET_DASH: Regex = Regex::new(r"(?m)^\s*-.*$").expect("dash bullet regex");
    static ref BULLET_HINT: Regex = Regex::new(r"[*-]").expect("bullet hint regex");
}

/// Require exactly `num` bullet-point lines.
#[derive(Debug, Default)]
pub struct CountableItems {
    num: Option<u64>,
}

impl CountableItems {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Instruction for CountableItems {
    fn id(&self) -> InstructionId {
        InstructionId::CountableItems
    }

    fn is_active(&self) -> bool {
        self.num.is_some()
    }

    fn args(&self) -> Value {
        self.num.map(|n| json!({ "num": n })).unwrap_or(Value::Null)
    }

    fn describe(&self) -> String {
        match self.num {
            Some(n) => format!(
                "The answer must contain exactly {n} bullet points, which should be separated by bullet points such as: * point or - point."
            ),
            None => String::new(),
        }
    }

    fn init(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) {
        self.num = Some(rng.gen_range(RANDOM_RANGE));
    }

    fn assign(&mut self, _ctx: &TaskContext<'_>, args: &Value) {
        self.num = args.get("num").and_then(Value::as_u64);
    }

    fn modify(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> (String, String) {
        let old = self.describe();
        self.num = resample(&self.num, MODIFY_ATTEMPTS, || {
            Some(rng.gen_range(RANDOM_RANGE))
        });
        (old, self.describe())
    }

    fn check(&self, generation: &str) -> bool {
        let Some(required) = self.num else {
            return true;
        };
        let actual = BULLET_STAR.find_iter(generation).count()
            + BULLET_DASH.find_iter(generation).count();
        actual as u64 == required
    }
}

/// A query introduces this constraint plausibly if it shows a bullet marker.
pub(crate) fn query_mentions(query: &str, _cur_args: &Value) -> bool {
    if query.trim().is_empty() {
        return false;
    }
    BULLET_HINT.is_match(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Vocabulary;

    fn countable(num: u64) -> CountableItems {
        let vocab = Vocabulary::default();
        let ctx = TaskContext::new(&vocab, "any");
        let mut inst = CountableItems::new();
        inst.assign(&ctx, &json!({ "num": num }));
        inst
    }

    #[test]
    fn test_exact_bullet_count_passes() {
        let inst = countable(3);
        assert!(inst.check("* one\n* two\n* three"));
        assert!(inst.check("- one\n- two\n- three"));
        assert!(inst.check("intro\n* one\n- two\n  * three\ncoda"));
    }

    #[test]
    fn test_off_by_one_fails() {
        let inst = countable(3);
        assert!(!inst.check("* one\n* two"));
        assert!(!inst.check("* one\n* two\n* three\n* four"));
    }

    #[test]
    fn test_bold_marker_is_not_a_bullet() {
        let inst = countable(1);
        assert!(inst.check("**bold** text\n* real bullet"));
    }

    #[test]
    fn test_invalid_args_deactivate() {
        let vocab = Vocabulary::default();
        let ctx = TaskContext::new(&vocab, "any");
        let mut inst = CountableItems::new();
        inst.assign(&ctx, &json!({ "num": -2 }));
        assert!(!inst.is_active());
        inst.assign(&ctx, &json!({ "num": "three" }));
        assert!(!inst.is_active());
    }

    #[test]
    fn test_query_mentions_requires_marker() {
        assert!(query_mentions("use * bullets", &Value::Null));
        assert!(query_mentions("use - dashes", &Value::Null));
        assert!(!query_mentions("no markers here", &Value::Null));
    }
}
