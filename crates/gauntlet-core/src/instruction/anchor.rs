//! Start-with / end-with anchor constraints.
//!
//! Both variants share one domain: a letter, an emoji, a topic keyword, or a
//! quotation/bracket pair; only the boundary they anchor differs.

use rand::seq::SliceRandom;
use rand::RngCore;
use serde_json::{json, Value};

use super::{resample, Instruction, InstructionId, TaskContext, MODIFY_ATTEMPTS};
use crate::lexicon::{self, EMOJIS, LETTERS, QUOTATION_PAIRS};
use crate::text;

const MODES: [&str; 4] = ["letter", "emoji", "keyword", "quotation"];

/// One anchor configuration.
#[derive(Debug, Clone, PartialEq)]
enum AnchorArgs {
    Letter(char),
    Emoji(&'static str),
    Keyword(String),
    Quotation { left: String, right: String },
}

impl AnchorArgs {
    fn draw(ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> Option<Self> {
        match *MODES.choose(rng).unwrap_or(&"letter") {
            "letter" => LETTERS.choose(rng).copied().map(AnchorArgs::Letter),
            "emoji" => EMOJIS.choose(rng).copied().map(AnchorArgs::Emoji),
            "keyword" => {
                let candidates = ctx.keyword_candidates();
                candidates
                    .choose(rng)
                    .map(|k| AnchorArgs::Keyword((*k).to_string()))
            }
            _ => QUOTATION_PAIRS
                .choose(rng)
                .map(|(l, r)| AnchorArgs::Quotation {
                    left: (*l).to_string(),
                    right: (*r).to_string(),
                }),
        }
    }

    /// Validate wire args; anything short of a fully valid configuration is
    /// rejected (the caller collapses to inactive).
    fn from_value(ctx: &TaskContext<'_>, args: &Value) -> Option<Self> {
        let mode = args.get("mode")?.as_str()?;
        match mode {
            "quotation" => {
                let left = args.get("left")?.as_str()?;
                let right = args.get("right")?.as_str()?;
                QUOTATION_PAIRS
                    .iter()
                    .find(|(l, r)| *l == left && *r == right)
                    .map(|_| AnchorArgs::Quotation {
                        left: left.to_string(),
                        right: right.to_string(),
                    })
            }
            "letter" => {
                let v = args.get("value")?.as_str()?;
                let mut chars = v.chars();
                let c = chars.next()?;
                if chars.next().is_none() && LETTERS.contains(&c) {
                    Some(AnchorArgs::Letter(c))
                } else {
                    None
                }
            }
            "emoji" => {
                let v = args.get("value")?.as_str()?;
                EMOJIS.iter().find(|e| **e == v).map(|e| AnchorArgs::Emoji(*e))
            }
            "keyword" => {
                let v = args.get("value")?.as_str()?;
                if ctx.is_candidate(v) {
                    Some(AnchorArgs::Keyword(v.to_string()))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            AnchorArgs::Letter(c) => json!({"mode": "letter", "value": c.to_string()}),
            AnchorArgs::Emoji(e) => json!({"mode": "emoji", "value": e}),
            AnchorArgs::Keyword(k) => json!({"mode": "keyword", "value": k}),
            AnchorArgs::Quotation { left, right } => {
                json!({"mode": "quotation", "left": left, "right": right})
            }
        }
    }

    fn describe(&self, verb: &str) -> String {
        match self {
            AnchorArgs::Letter(c) => format!("{verb} the response with the letter '{c}'."),
            AnchorArgs::Emoji(e) => format!("{verb} the response with the emoji '{e}'."),
            AnchorArgs::Keyword(k) => format!("{verb} the response with the keyword '{k}'."),
            AnchorArgs::Quotation { left, right } => format!(
                "{verb} the response with a quotation starting with '{left}' and ending with '{right}'."
            ),
        }
    }
}

/// Does a synthesized query mention the anchor value (or the left bracket for
/// quotation mode)?
pub(crate) fn query_mentions(query: &str, cur_args: &Value) -> bool {
    if query.trim().is_empty() {
        return false;
    }
    let q = query.to_lowercase();
    let field = match cur_args.get("mode").and_then(Value::as_str) {
        Some("quotation") => "left",
        _ => "value",
    };
    cur_args
        .get(field)
        .and_then(Value::as_str)
        .map(|v| q.contains(&v.to_lowercase()))
        .unwrap_or(false)
}

/// Expose the visible leading/trailing content for a non-quotation anchor:
/// structural wrappers, invisible prefix characters, and boundary
/// punctuation are all ignored.
fn visible_for_prefix(text: &str) -> String {
    let stripped = text::strip_structured_wrappers(text);
    let stripped = text::strip_invisible_prefix(&stripped);
    stripped
        .trim_start_matches(lexicon::is_pool_punctuation)
        .to_string()
}

fn visible_for_suffix(text: &str) -> String {
    let stripped = text::strip_structured_wrappers(text);
    stripped
        .trim_end_matches(lexicon::is_pool_punctuation)
        .to_string()
}

/// Require the response to start with a letter, emoji, keyword, or quotation.
#[derive(Debug, Default)]
pub struct StartWith {
    args: Option<AnchorArgs>,
}

impl StartWith {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Instruction for StartWith {
    fn id(&self) -> InstructionId {
        InstructionId::StartWith
    }

    fn is_active(&self) -> bool {
        self.args.is_some()
    }

    fn args(&self) -> Value {
        self.args
            .as_ref()
            .map(AnchorArgs::to_value)
            .unwrap_or(Value::Null)
    }

    fn describe(&self) -> String {
        self.args
            .as_ref()
            .map(|a| a.describe("Start"))
            .unwrap_or_default()
    }

    fn init(&mut self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) {
        self.args = AnchorArgs::draw(ctx, rng);
    }

    fn assign(&mut self, ctx: &TaskContext<'_>, args: &Value) {
        self.args = AnchorArgs::from_value(ctx, args);
    }

    fn modify(&mut self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> (String, String) {
        let old = self.describe();
        self.args = resample(&self.args, MODIFY_ATTEMPTS, || AnchorArgs::draw(ctx, rng));
        (old, self.describe())
    }

    fn check(&self, generation: &str) -> bool {
        let Some(args) = &self.args else {
            return true;
        };
        let head = generation.trim_start_matches(|c: char| text::BOUNDARY_TRIM.contains(&c));

        if let AnchorArgs::Quotation { left, right } = args {
            return head.starts_with(left.as_str()) && head[left.len()..].contains(right.as_str());
        }

        let visible = visible_for_prefix(head);
        match args {
            AnchorArgs::Letter(expected) => text::first_alphabetic(&visible)
                .map(|c| c.eq_ignore_ascii_case(expected))
                .unwrap_or(false),
            AnchorArgs::Emoji(e) => visible.starts_with(*e),
            AnchorArgs::Keyword(k) => visible.to_lowercase().starts_with(&k.to_lowercase()),
            AnchorArgs::Quotation { .. } => false,
        }
    }
}

/// Require the response to end with a letter, emoji, keyword, or quotation.
#[derive(Debug, Default)]
pub struct EndWith {
    args: Option<AnchorArgs>,
}

impl EndWith {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Instruction for EndWith {
    fn id(&self) -> InstructionId {
        InstructionId::EndWith
    }

    fn is_active(&self) -> bool {
        self.args.is_some()
    }

    fn args(&self) -> Value {
        self.args
            .as_ref()
            .map(AnchorArgs::to_value)
            .unwrap_or(Value::Null)
    }

    fn describe(&self) -> String {
        self.args
            .as_ref()
            .map(|a| a.describe("End"))
            .unwrap_or_default()
    }

    fn init(&mut self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) {
        self.args = AnchorArgs::draw(ctx, rng);
    }

    fn assign(&mut self, ctx: &TaskContext<'_>, args: &Value) {
        self.args = AnchorArgs::from_value(ctx, args);
    }

    fn modify(&mut self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> (String, String) {
        let old = self.describe();
        self.args = resample(&self.args, MODIFY_ATTEMPTS, || AnchorArgs::draw(ctx, rng));
        (old, self.describe())
    }

    fn check(&self, generation: &str) -> bool {
        let Some(args) = &self.args else {
            return true;
        };
        let tail = generation.trim_end_matches(|c: char| text::BOUNDARY_TRIM.contains(&c));

        if let AnchorArgs::Quotation { left, right } = args {
            if !tail.ends_with(right.as_str()) {
                return false;
            }
            let before_final = &tail[..tail.len() - right.len()];
            return before_final.contains(left.as_str());
        }

        let visible = visible_for_suffix(tail);
        match args {
            AnchorArgs::Letter(expected) => text::last_alphabetic(&visible)
                .map(|c| c.eq_ignore_ascii_case(expected))
                .unwrap_or(false),
            AnchorArgs::Emoji(e) => visible.ends_with(*e),
            AnchorArgs::Keyword(k) => visible.to_lowercase().ends_with(&k.to_lowercase()),
            AnchorArgs::Quotation { .. } => false,
        }
    }
}
