//! Letter-case constraint: all-uppercase, all-lowercase, or a target share of
//! uppercase letters.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde_json::{json, Value};

use super::{resample, Instruction, InstructionId, TaskContext, MODIFY_ATTEMPTS};

/// Tolerance around the min_upper target, in percentage points.
const UPPER_TOLERANCE: f64 = 3.0;

const MODES: [&str; 3] = ["all_upper", "all_lower", "min_upper"];

#[derive(Debug, Clone, PartialEq)]
enum CaseArgs {
    AllUpper,
    AllLower,
    /// Target percentage of uppercase letters among all ASCII letters.
    MinUpper(u64),
}

impl CaseArgs {
    fn draw(rng: &mut dyn RngCore) -> Option<Self> {
        match *MODES.choose(rng)? {
            "all_upper" => Some(CaseArgs::AllUpper),
            "all_lower" => Some(CaseArgs::AllLower),
            _ => Some(CaseArgs::MinUpper(rng.gen_range(1..=100))),
        }
    }

    fn from_value(args: &Value) -> Option<Self> {
        match args.get("mode")?.as_str()? {
            "all_upper" => Some(CaseArgs::AllUpper),
            "all_lower" => Some(CaseArgs::AllLower),
            "min_upper" => match args.get("min")?.as_u64() {
                Some(n) if n >= 1 => Some(CaseArgs::MinUpper(n)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Constrain the mix of upper/lowercase ASCII letters in the response.
#[derive(Debug, Default)]
pub struct ChangeCase {
    args: Option<CaseArgs>,
}

impl ChangeCase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Instruction for ChangeCase {
    fn id(&self) -> InstructionId {
        InstructionId::Case
    }

    fn is_active(&self) -> bool {
        self.args.is_some()
    }

    fn args(&self) -> Value {
        match &self.args {
            Some(CaseArgs::AllUpper) => json!({"mode": "all_upper"}),
            Some(CaseArgs::AllLower) => json!({"mode": "all_lower"}),
            Some(CaseArgs::MinUpper(n)) => json!({"mode": "min_upper", "min": n}),
            None => Value::Null,
        }
    }

    fn describe(&self) -> String {
        match &self.args {
            Some(CaseArgs::AllUpper) => {
                "The response must use ALL UPPERCASE letters.".to_string()
            }
            Some(CaseArgs::AllLower) => {
                "The response must use all lowercase letters.".to_string()
            }
            Some(CaseArgs::MinUpper(n)) => format!(
                "Approximately {n}% of the letters in the response should be uppercase."
            ),
            None => String::new(),
        }
    }

    fn init(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) {
        self.args = CaseArgs::draw(rng);
    }

    fn assign(&mut self, _ctx: &TaskContext<'_>, args: &Value) {
        self.args = CaseArgs::from_value(args);
    }

    fn modify(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> (String, String) {
        let old = self.describe();
        self.args = resample(&self.args, MODIFY_ATTEMPTS, || CaseArgs::draw(rng));
        (old, self.describe())
    }

    fn check(&self, generation: &str) -> bool {
        match &self.args {
            None => true,
            Some(CaseArgs::AllUpper) => !generation.bytes().any(|b| b.is_ascii_lowercase()),
            Some(CaseArgs::AllLower) => !generation.bytes().any(|b| b.is_ascii_uppercase()),
            Some(CaseArgs::MinUpper(target)) => {
                let letters = generation.bytes().filter(|b| b.is_ascii_alphabetic());
                let total = letters.clone().count();
                if total == 0 {
                    return true;
                }
                let upper = letters.filter(|b| b.is_ascii_uppercase()).count();
                let percent = upper as f64 * 100.0 / total as f64;
                (percent - *target as f64).abs() <= UPPER_TOLERANCE
            }
        }
    }
}

/// Loose synonym matching: the query only has to gesture at the case rule.
pub(crate) fn query_mentions(query: &str, cur_args: &Value) -> bool {
    let Some(mode) = cur_args.get("mode").and_then(Value::as_str) else {
        return true;
    };
    if query.trim().is_empty() {
        return false;
    }
    let q = query.to_lowercase();
    match mode {
        "all_upper" => ["case", "up", "cap", "all"].iter().any(|s| q.contains(s)),
        "all_lower" => ["case", "low", "all"].iter().any(|s| q.contains(s)),
        "min_upper" => cur_args
            .get("min")
            .and_then(Value::as_u64)
            .map(|n| q.contains(&n.to_string()))
            .unwrap_or(false),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Vocabulary;

    fn case(args: Value) -> ChangeCase {
        let vocab = Vocabulary::default();
        let ctx = TaskContext::new(&vocab, "any");
        let mut inst = ChangeCase::new();
        inst.assign(&ctx, &args);
        inst
    }

    #[test]
    fn test_all_upper() {
        let inst = case(json!({"mode": "all_upper"}));
        assert!(inst.check("LOUD AND CLEAR, 42!"));
        assert!(!inst.check("LOUD and CLEAR"));
    }

    #[test]
    fn test_all_lower() {
        let inst = case(json!({"mode": "all_lower"}));
        assert!(inst.check("quiet and clear, 42."));
        assert!(!inst.check("Quiet and clear"));
    }

    #[test]
    fn test_min_upper_within_tolerance() {
        let inst = case(json!({"mode": "min_upper", "min": 50}));
        assert!(inst.check("AAAaaa")); // exactly 50%
        assert!(inst.check("AAAAaaab")); // 50% within +-3
        assert!(!inst.check("Aaaaaaaa")); // 12.5%
        // No letters at all: trivially satisfied.
        assert!(inst.check("1234 !!"));
    }

    #[test]
    fn test_invalid_min_deactivates() {
        assert!(!case(json!({"mode": "min_upper", "min": 0})).is_active());
        assert!(!case(json!({"mode": "min_upper"})).is_active());
        assert!(!case(json!({"mode": "title_case"})).is_active());
    }

    #[test]
    fn test_query_mentions_synonyms() {
        assert!(query_mentions(
            "make it ALL CAPS",
            &json!({"mode": "all_upper"})
        ));
        assert!(query_mentions(
            "lowercase from here on",
            &json!({"mode": "all_lower"})
        ));
        assert!(query_mentions(
            "about 40% uppercase",
            &json!({"mode": "min_upper", "min": 40})
        ));
        assert!(!query_mentions(
            "be quieter",
            &json!({"mode": "min_upper", "min": 40})
        ));
    }
}
