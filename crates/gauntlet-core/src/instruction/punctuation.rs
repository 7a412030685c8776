//! Punctuation constraint: require or forbid one specific punctuation mark.
//!
//! must_include draws from the uncommon pool so the requirement is actually
//! observable; must_not_include draws from the common pool (`.` `,` `:`) so
//! the prohibition actually bites.

use rand::seq::SliceRandom;
use rand::RngCore;
use serde_json::{json, Value};

use super::{resample, Instruction, InstructionId, TaskContext, MODIFY_ATTEMPTS};
use crate::lexicon::{COMMON_PUNCTUATIONS, UNCOMMON_PUNCTUATIONS};

#[derive(Debug, Clone, PartialEq)]
struct PunctuationArgs {
    include: bool,
    value: &'static str,
}

impl PunctuationArgs {
    fn draw(rng: &mut dyn RngCore) -> Option<Self> {
        let include = *[true, false].choose(rng)?;
        let pool: &[&'static str] = if include {
            &UNCOMMON_PUNCTUATIONS
        } else {
            &COMMON_PUNCTUATIONS
        };
        pool.choose(rng).map(|value| Self {
            include,
            value: *value,
        })
    }

    fn from_value(args: &Value) -> Option<Self> {
        let include = match args.get("mode")?.as_str()? {
            "must_include" => true,
            "must_not_include" => false,
            _ => return None,
        };
        let v = args.get("value")?.as_str()?;
        let pool: &[&'static str] = if include {
            &UNCOMMON_PUNCTUATIONS
        } else {
            &COMMON_PUNCTUATIONS
        };
        pool.iter().find(|p| **p == v).map(|value| Self {
            include,
            value: *value,
        })
    }
}

/// Require the presence (or absence) of one punctuation mark.
#[derive(Debug, Default)]
pub struct Punctuation {
    args: Option<PunctuationArgs>,
}

impl Punctuation {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Instruction for Punctuation {
    fn id(&self) -> InstructionId {
        InstructionId::Punctuation
    }

    fn is_active(&self) -> bool {
        self.args.is_some()
    }

    fn args(&self) -> Value {
        match &self.args {
            Some(a) => {
                let mode = if a.include {
                    "must_include"
                } else {
                    "must_not_include"
                };
                json!({"mode": mode, "value": a.value})
            }
            None => Value::Null,
        }
    }

    fn describe(&self) -> String {
        match &self.args {
            Some(a) if a.include => {
                format!("The response must contain the punctuation '{}'.", a.value)
            }
            Some(a) => format!(
                "The response must not contain the punctuation: '{}'.",
                a.value
            ),
            None => String::new(),
        }
    }

    fn init(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) {
        self.args = PunctuationArgs::draw(rng);
    }

    fn assign(&mut self, _ctx: &TaskContext<'_>, args: &Value) {
        self.args = PunctuationArgs::from_value(args);
    }

    fn modify(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> (String, String) {
        let old = self.describe();
        self.args = resample(&self.args, MODIFY_ATTEMPTS, || PunctuationArgs::draw(rng));
        (old, self.describe())
    }

    fn check(&self, generation: &str) -> bool {
        match &self.args {
            None => true,
            Some(a) if a.include => generation.contains(a.value),
            Some(a) => !generation.contains(a.value),
        }
    }
}

/// ASCII punctuation is assumed communicable in prose; anything wider must
/// literally appear in the query.
pub(crate) fn query_mentions(query: &str, cur_args: &Value) -> bool {
    let Some(value) = cur_args.get("value").and_then(Value::as_str) else {
        return false;
    };
    let is_ascii = value.chars().next().map(|c| (c as u32) < 128).unwrap_or(false);
    if is_ascii {
        true
    } else {
        query.contains(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Vocabulary;

    fn punctuation(args: Value) -> Punctuation {
        let vocab = Vocabulary::default();
        let ctx = TaskContext::new(&vocab, "any");
        let mut inst = Punctuation::new();
        inst.assign(&ctx, &args);
        inst
    }

    #[test]
    fn test_must_include() {
        let inst = punctuation(json!({"mode": "must_include", "value": ";"}));
        assert!(inst.check("first; second"));
        assert!(!inst.check("first, second"));
    }

    #[test]
    fn test_must_not_include() {
        let inst = punctuation(json!({"mode": "must_not_include", "value": "."}));
        assert!(inst.check("no full stops here"));
        assert!(!inst.check("one stop."));
    }

    #[test]
    fn test_pool_membership_is_validated() {
        // '.' is common, so it is not a valid must_include target.
        assert!(!punctuation(json!({"mode": "must_include", "value": "."})).is_active());
        // ';' is uncommon, so it is not a valid must_not_include target.
        assert!(!punctuation(json!({"mode": "must_not_include", "value": ";"})).is_active());
        assert!(punctuation(json!({"mode": "must_include", "value": "……"})).is_active());
    }

    #[test]
    fn test_query_mentions() {
        let ascii = json!({"mode": "must_not_include", "value": "."});
        assert!(query_mentions("drop the periods", &ascii));
        let wide = json!({"mode": "must_include", "value": "……"});
        assert!(query_mentions("use …… everywhere", &wide));
        assert!(!query_mentions("use ellipses everywhere", &wide));
    }
}
