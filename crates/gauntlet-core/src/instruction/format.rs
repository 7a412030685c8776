//! Output-format constraint: the response must be valid JSON, HTML, XML,
//! CSV, or Markdown.
//!
//! The validators are deliberately lightweight. JSON goes through a real
//! parser; the rest check the structural property a reader would notice
//! first: balanced tags, consistent columns, closed fences.

use lazy_static::lazy_static;
use rand::seq::SliceRandom;
use rand::RngCore;
use regex::Regex;
use serde_json::{json, Value};

use super::{resample, Instruction, InstructionId, TaskContext, MODIFY_ATTEMPTS};
use crate::text;

const MODES: [&str; 5] = ["json", "html", "xml", "csv", "markdown"];

/// Void HTML elements that never take a closing tag.
const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr",
];

lazy_static! {
    static ref HTML_TAG: Regex =
        Regex::new(r"</?([A-Za-z][A-Za-z0-9:-]*)\b[^>]*?>").expect("html tag regex");
    static ref XML_TAG: Regex =
        Regex::new(r"</?([A-Za-z_][\w.:-]*)[^>]*?>").expect("xml tag regex");
    static ref XML_SKIP: Regex =
        Regex::new(r"(?s)<\?.*?\?>|<!--.*?-->|<!\[CDATA\[.*?\]\]>|<!DOCTYPE[^>]*>")
            .expect("xml skip regex");
}

/// Require the response to be well-formed in one declared format.
#[derive(Debug, Default)]
pub struct Format {
    mode: Option<&'static str>,
}

impl Format {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Instruction for Format {
    fn id(&self) -> InstructionId {
        InstructionId::Format
    }

    fn is_active(&self) -> bool {
        self.mode.is_some()
    }

    fn args(&self) -> Value {
        self.mode
            .map(|mode| json!({ "mode": mode }))
            .unwrap_or(Value::Null)
    }

    fn describe(&self) -> String {
        match self.mode {
            Some("json") => {
                "The response must be valid JSON, parseable by a standard JSON parser.".to_string()
            }
            Some("html") => {
                "The response must be syntactically valid HTML with properly nested tags."
                    .to_string()
            }
            Some("xml") => {
                "The response must be well-formed XML which is parseable and properly nested."
                    .to_string()
            }
            Some("csv") => {
                "The response must be valid CSV that is consistent columns and properly quoted."
                    .to_string()
            }
            Some("markdown") => {
                "The response must be valid Markdown without broken fences or obvious syntax errors."
                    .to_string()
            }
            _ => String::new(),
        }
    }

    fn init(&mut self, _ctx: &TaskContext<'_>, rng: &mut dyn RngCore) {
        self.mode = MODES.choose(rng).copied();
    }

    fn assign(&mut self, _ctx: &TaskContext<'_>, args: &Value) {
        self.mode = args
            .get("mode")
            .and_then(Value::as_str)
            .and_then(|m| MODES.iter().find(|c| **c == m))
            .copied();
    }

    fn modify(&mut self, ctx: &TaskContext<'_>, rng: &mut dyn RngCore) -> (String, String) {
        let old = self.describe();
        self.mode = resample(&self.mode, MODIFY_ATTEMPTS, || {
            let mut fresh = Format::new();
            fresh.init(ctx, rng);
            fresh.mode
        });
        (old, self.describe())
    }

    fn check(&self, generation: &str) -> bool {
        let Some(mode) = self.mode else {
            return true;
        };
        // A single wrapping code fence does not count against the format.
        let text = text::unwrap_code_fence(generation);
        match mode {
            "json" => serde_json::from_str::<Value>(&text).is_ok(),
            "html" => is_valid_html(&text),
            "xml" => is_valid_xml(&text),
            "csv" => is_valid_csv(&text),
            "markdown" => is_valid_markdown(&text),
            _ => false,
        }
    }
}

/// Does a synthesized query name the format mode?
pub(crate) fn query_mentions(query: &str, cur_args: &Value) -> bool {
    if query.trim().is_empty() {
        return false;
    }
    cur_args
        .get("mode")
        .and_then(Value::as_str)
        .map(|mode| query.to_lowercase().contains(&mode.to_lowercase()))
        .unwrap_or(false)
}

/// Tag-name stack balance with void elements exempted and self-closing tags
/// skipped. At least one tag is required for the text to count as HTML.
fn is_valid_html(text: &str) -> bool {
    let mut stack: Vec<String> = Vec::new();
    let mut saw_tag = false;
    for caps in HTML_TAG.captures_iter(text) {
        saw_tag = true;
        let tag = &caps[0];
        let name = caps[1].to_lowercase();
        let is_closing = tag.starts_with("</");
        let self_closing = tag.ends_with("/>") || VOID_TAGS.contains(&name.as_str());
        if is_closing {
            match stack.pop() {
                Some(top) if top == name => {}
                _ => return false,
            }
        } else if !self_closing {
            stack.push(name);
        }
    }
    saw_tag && stack.is_empty()
}

/// Minimal well-formedness: declarations, comments, and CDATA are ignored;
/// element tags must balance and at least one element must exist.
fn is_valid_xml(text: &str) -> bool {
    let cleaned = XML_SKIP.replace_all(text, "");
    let mut stack: Vec<String> = Vec::new();
    let mut saw_element = false;
    for caps in XML_TAG.captures_iter(&cleaned) {
        saw_element = true;
        let tag = &caps[0];
        let name = caps[1].to_string();
        if tag.starts_with("</") {
            match stack.pop() {
                Some(top) if top == name => {}
                _ => return false,
            }
        } else if !tag.ends_with("/>") {
            stack.push(name);
        }
    }
    saw_element && stack.is_empty()
}

/// Every row must have the same column count; quoted fields (with `""`
/// escapes and embedded newlines) are honored.
fn is_valid_csv(text: &str) -> bool {
    let rows = parse_csv_rows(text);
    let Some(first) = rows.first() else {
        return false;
    };
    if first.is_empty() {
        return false;
    }
    rows.iter().all(|row| row.len() == first.len())
}

fn parse_csv_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();
    let mut saw_any = false;

    while let Some(c) = chars.next() {
        saw_any = true;
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\n' => {
                let line_had_content = !field.is_empty() || !row.is_empty();
                if line_had_content {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                } else {
                    // A blank line is a zero-field row, which breaks column
                    // consistency unless the whole file is blank.
                    rows.push(Vec::new());
                }
            }
            '\r' => {}
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    } else if saw_any && rows.is_empty() {
        rows.push(Vec::new());
    }
    // A trailing newline leaves one spurious empty row; drop it.
    if rows.last().map(|r| r.is_empty()) == Some(true) && rows.len() > 1 {
        rows.pop();
    }
    rows
}

/// Fence markers must occur in matched pairs with none left open.
fn is_valid_markdown(text: &str) -> bool {
    if text.matches("```").count() % 2 != 0 {
        return false;
    }
    let mut opened = false;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            opened = !opened;
        }
    }
    !opened
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Vocabulary;

    fn format(mode: &str) -> Format {
        let vocab = Vocabulary::default();
        let ctx = TaskContext::new(&vocab, "any");
        let mut inst = Format::new();
        inst.assign(&ctx, &json!({ "mode": mode }));
        inst
    }

    #[test]
    fn test_json_mode() {
        let inst = format("json");
        assert!(inst.check("{}"));
        assert!(inst.check("[1, 2, 3]"));
        assert!(inst.check("```json\n{\"a\": 1}\n```"));
        assert!(!inst.check("{"));
        assert!(!inst.check("not json"));
    }

    #[test]
    fn test_html_mode() {
        let inst = format("html");
        assert!(inst.check("<div><p>hi</p></div>"));
        assert!(inst.check("<ul><li>a</li><li>b</li></ul><br>"));
        assert!(inst.check("<img src=\"x.png\"/>"));
        assert!(!inst.check("<div><p>hi</div></p>"));
        assert!(!inst.check("<div>unclosed"));
        assert!(!inst.check("no tags at all"));
    }

    #[test]
    fn test_xml_mode() {
        let inst = format("xml");
        assert!(inst.check("<?xml version=\"1.0\"?>\n<root><a/><b>x</b></root>"));
        assert!(inst.check("<root><!-- note --><leaf/></root>"));
        assert!(!inst.check("<root><a></root></a>"));
        assert!(!inst.check("plain text"));
    }

    #[test]
    fn test_csv_mode() {
        let inst = format("csv");
        assert!(inst.check("a,b,c\n1,2,3\n"));
        assert!(inst.check("\"x,y\",2\nvalue,3"));
        assert!(!inst.check("a,b\n1,2,3"));
        assert!(!inst.check(""));
    }

    #[test]
    fn test_markdown_mode() {
        let inst = format("markdown");
        assert!(inst.check("# Title\n\nSome prose."));
        assert!(inst.check("```rust\nfn main() {}\n```\ndone"));
        assert!(!inst.check("```rust\nfn main() {}"));
    }

    #[test]
    fn test_invalid_mode_deactivates() {
        let inst = format("yaml");
        assert!(!inst.is_active());
        assert!(inst.check("anything"));
    }

    #[test]
    fn test_query_mentions_mode() {
        assert!(query_mentions(
            "Answer strictly in JSON please",
            &json!({"mode": "json"})
        ));
        assert!(!query_mentions("Answer in prose", &json!({"mode": "json"})));
    }
}
