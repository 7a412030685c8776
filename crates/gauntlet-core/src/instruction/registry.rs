//! Dispatch registry: string tag -> checker.
//!
//! The evaluation path reconstructs checkers from persisted `{id, args}`
//! pairs. Reconstruction validates, it never randomizes; unknown tags come
//! back as `None` so the caller can count them as a hard failure instead of
//! skipping them silently.

use rand::RngCore;
use serde_json::Value;

use super::{
    ChangeCase, CountableItems, Emotion, EndWith, Existence, Forbidden, Format, Instruction,
    InstructionId, InstructionSpec, Length, Punctuation, ReaderAge, StartWith, Style, TaskContext,
};

/// A fresh, inactive checker for `id`.
pub fn create(id: InstructionId) -> Box<dyn Instruction> {
    match id {
        InstructionId::StartWith => Box::new(StartWith::new()),
        InstructionId::EndWith => Box::new(EndWith::new()),
        InstructionId::Format => Box::new(Format::new()),
        InstructionId::CountableItems => Box::new(CountableItems::new()),
        InstructionId::Length => Box::new(Length::new()),
        InstructionId::Existence => Box::new(Existence::new()),
        InstructionId::Forbidden => Box::new(Forbidden::new()),
        InstructionId::Case => Box::new(ChangeCase::new()),
        InstructionId::Punctuation => Box::new(Punctuation::new()),
        InstructionId::Emotion => Box::new(Emotion::new()),
        InstructionId::ReaderAge => Box::new(ReaderAge::new()),
        InstructionId::Style => Box::new(Style::new()),
    }
}

/// Reconstruct a checker from a persisted spec. Invalid args deactivate the
/// checker (it then passes everything); an unknown tag returns `None`.
pub fn build(spec: &InstructionSpec, ctx: &TaskContext<'_>) -> Option<Box<dyn Instruction>> {
    let id = InstructionId::from_tag(&spec.id)?;
    let mut inst = create(id);
    inst.assign(ctx, &spec.args);
    if !inst.is_active() && !spec.args.is_null() {
        tracing::debug!(id = %id, "instruction args rejected; constraint inactive");
    }
    Some(inst)
}

/// A randomly configured checker for `id`, drawn from its full domain.
pub fn build_random(
    id: InstructionId,
    ctx: &TaskContext<'_>,
    rng: &mut dyn RngCore,
) -> Box<dyn Instruction> {
    let mut inst = create(id);
    inst.init(ctx, rng);
    inst
}

/// Does a synthesized query communicate the constraint in `cur_args`?
///
/// This is the generation-quality gate for the query-synthesis pipeline; the
/// replay engine never calls it. Unknown tags gate to `false`.
pub fn query_mentions(
    tag: &str,
    query: &str,
    prev_args: Option<&Value>,
    cur_args: &Value,
) -> bool {
    let Some(id) = InstructionId::from_tag(tag) else {
        return false;
    };
    match id {
        InstructionId::StartWith | InstructionId::EndWith => {
            super::anchor::query_mentions(query, cur_args)
        }
        InstructionId::Format => super::format::query_mentions(query, cur_args),
        InstructionId::CountableItems => super::countable_items::query_mentions(query, cur_args),
        InstructionId::Length => super::length::query_mentions(query, cur_args),
        InstructionId::Existence => super::existence::query_mentions(query, prev_args, cur_args),
        InstructionId::Forbidden => super::forbidden::query_mentions(query, prev_args, cur_args),
        InstructionId::Case => super::change_case::query_mentions(query, cur_args),
        InstructionId::Punctuation => super::punctuation::query_mentions(query, cur_args),
        InstructionId::Emotion => super::emotion::query_mentions(query, cur_args),
        InstructionId::ReaderAge => super::reader_age::query_mentions(query, cur_args),
        InstructionId::Style => super::style::query_mentions(query, cur_args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Vocabulary;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn vocab() -> Vocabulary {
        Vocabulary::from_entries(vec![("t", vec!["alpha", "beta"], "seed")]).unwrap()
    }

    #[test]
    fn test_build_round_trips_args() {
        let vocab = vocab();
        let ctx = TaskContext::new(&vocab, "t");
        let spec = InstructionSpec {
            id: "length".to_string(),
            args: json!({"mode": "word", "relation": "less_than", "number": 300}),
        };
        let inst = build(&spec, &ctx).unwrap();
        assert_eq!(inst.args(), spec.args);
    }

    #[test]
    fn test_unknown_tag_is_none() {
        let vocab = vocab();
        let ctx = TaskContext::new(&vocab, "t");
        let spec = InstructionSpec {
            id: "language".to_string(),
            args: Value::Null,
        };
        assert!(build(&spec, &ctx).is_none());
    }

    #[test]
    fn test_invalid_args_build_inactive_checker() {
        let vocab = vocab();
        let ctx = TaskContext::new(&vocab, "t");
        let spec = InstructionSpec {
            id: "format".to_string(),
            args: json!({"mode": "yaml"}),
        };
        let inst = build(&spec, &ctx).unwrap();
        assert!(!inst.is_active());
        assert!(inst.check("anything"));
    }

    #[test]
    fn test_build_random_activates_every_variant() {
        let vocab = vocab();
        let ctx = TaskContext::new(&vocab, "t");
        let mut rng = StdRng::seed_from_u64(42);
        for id in InstructionId::ALL {
            let inst = build_random(id, &ctx, &mut rng);
            assert!(inst.is_active(), "{id} failed to initialize");
            assert!(!inst.describe().is_empty());
        }
    }

    #[test]
    fn test_query_mentions_dispatch() {
        assert!(query_mentions(
            "format",
            "reply in json",
            None,
            &json!({"mode": "json"})
        ));
        assert!(!query_mentions("no-such-tag", "anything", None, &Value::Null));
    }
}
