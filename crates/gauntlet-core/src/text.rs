//! Text normalization helpers shared by the constraint checkers.
//!
//! Wrapper stripping is deliberately conservative: the goal is to expose the
//! human-visible leading/trailing content for anchor checks, not to fully
//! parse markdown or HTML. None of these helpers panic on odd input.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FRONT_MATTER: Regex =
        Regex::new(r"(?s)^---[ \t]*\n.*?\n---[ \t]*\n").expect("front matter regex");
    static ref LEADING_FENCE: Regex =
        Regex::new(r"(?s)^```[\w.+-]*[ \t]*\n(.*?)\n```\s*").expect("leading fence regex");
    static ref FULL_FENCE: Regex =
        Regex::new(r"(?s)^```[\w.+-]*[ \t]*\n(.*?)\n```\s*$").expect("full fence regex");
    static ref LEADING_TAG: Regex = Regex::new(r"^\s*<[^>]+>\s*").expect("leading tag regex");
    static ref TRAILING_CLOSE_TAGS: Regex =
        Regex::new(r"\s*(</[^>]+>\s*)+$").expect("trailing tag regex");
    static ref JSON_FIRST_STRING_VALUE: Regex =
        Regex::new(r#":\s*"([^"]+)""#).expect("json value regex");
    static ref RULE_ROW: Regex = Regex::new(r"^[:\-\s\|]+$").expect("rule row regex");
    static ref WORD_TOKEN: Regex = Regex::new(r"\w+").expect("word token regex");
    static ref PARAGRAPH_BREAK: Regex =
        Regex::new(r"(?:\r?\n\s*){2,}").expect("paragraph break regex");
    static ref ALPHA: Regex = Regex::new(r"[A-Za-z]").expect("alpha regex");
    static ref SENTENCE_END: Regex =
        Regex::new(r"[.!?…]+[\)\]\u{201d}\u{2019}'\x22]*(\s+|$)").expect("sentence end regex");
    static ref INVISIBLE_PREFIX: Regex = Regex::new(
        "^[\\s\u{feff}\u{00a0}\u{1680}\u{180e}\u{2000}-\u{200f}\u{2028}\u{2029}\u{202f}\u{205f}\u{2060}\u{3000}]+"
    )
    .expect("invisible prefix regex");
}

/// Abbreviations that end with a period but do not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e",
    "fig", "no", "vol", "approx", "dept", "est", "inc", "ltd", "u.s", "u.k",
];

/// Characters ignored at the very start of a generation before prefix checks.
pub const BOUNDARY_TRIM: &[char] = &['\u{feff}', '\n', '\r', '\t', ' '];

/// Remove common structural wrappers (front matter, a fenced code block,
/// markdown table/header rows without content, leading HTML/XML tags, a
/// simple JSON shell) from the start of `text`, exposing the visible leading
/// content for prefix/suffix checks.
///
/// Best-effort by contract: whatever this cannot recognize it leaves alone.
pub fn strip_structured_wrappers(text: &str) -> String {
    let mut s: String = text
        .trim_start_matches(|c: char| BOUNDARY_TRIM.contains(&c))
        .to_string();

    // YAML front matter, then a leading fenced code block.
    s = FRONT_MATTER.replace(&s, "").into_owned();
    if let Some(caps) = LEADING_FENCE.captures(&s) {
        s = caps[1].trim_start().to_string();
    }

    // Skip leading table/header/blockquote/bullet rows that carry no
    // alphanumeric content.
    let lines: Vec<&str> = s.split('\n').collect();
    let mut skip = 0;
    while skip < lines.len() && is_wrapper_line(lines[skip]) {
        skip += 1;
    }
    if skip > 0 && skip < lines.len() {
        s = lines[skip..].join("\n").trim_start().to_string();
    }

    // Leading HTML/XML tags, iteratively but bounded.
    for _ in 0..10 {
        let next = LEADING_TAG.replace(&s, "").into_owned();
        if next == s {
            break;
        }
        s = next;
    }

    // Simplistic JSON unwrap: first quoted value after a colon.
    if s.starts_with('{') || s.starts_with('[') {
        if let Some(caps) = JSON_FIRST_STRING_VALUE.captures(&s) {
            s = caps[1].trim_start().to_string();
        }
    }

    // Residual tags at either end.
    s = LEADING_TAG.replace(&s, "").into_owned();
    s = TRAILING_CLOSE_TAGS.replace(&s, "").into_owned();
    s
}

fn is_wrapper_line(raw: &str) -> bool {
    let line = raw.trim_start();
    if line.starts_with('|') {
        return true;
    }
    if !line.is_empty() && RULE_ROW.is_match(line) {
        return true;
    }
    let no_alnum = |rest: &str| !rest.chars().any(|c| c.is_ascii_alphanumeric());
    for prefix in ["> ", ">", "####", "###", "##", "#"] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return no_alnum(rest.trim());
        }
    }
    for prefix in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return no_alnum(rest.trim());
        }
    }
    false
}

/// Remove leading Unicode whitespace and invisible characters beyond the
/// basic boundary trim.
pub fn strip_invisible_prefix(text: &str) -> &str {
    match INVISIBLE_PREFIX.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// Unwrap a single fenced code block spanning the whole (trimmed) text.
/// Returns the trimmed inner content, or the trimmed input when no full
/// fence is present.
pub fn unwrap_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    match FULL_FENCE.captures(trimmed) {
        Some(caps) => caps[1].trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// Number of `\w+` word tokens.
pub fn count_words(text: &str) -> usize {
    WORD_TOKEN.find_iter(text).count()
}

/// Number of non-empty blocks separated by at least one blank line.
pub fn count_paragraphs(text: &str) -> usize {
    let stripped = text.trim();
    if stripped.is_empty() {
        return 0;
    }
    PARAGRAPH_BREAK
        .split(stripped)
        .filter(|p| !p.trim().is_empty())
        .count()
}

/// Heuristic sentence count: terminator runs (`.` `!` `?` `…`) followed by
/// whitespace or end-of-text close a sentence, except after a known
/// abbreviation or a decimal number. Non-empty text always counts at least 1.
pub fn count_sentences(text: &str) -> usize {
    let stripped = text.trim();
    if stripped.is_empty() {
        return 0;
    }
    let mut count = 0;
    for m in SENTENCE_END.find_iter(stripped) {
        let terminator = stripped[m.start()..].chars().next();
        if terminator == Some('.') && ends_with_abbreviation(&stripped[..m.start()]) {
            continue;
        }
        count += 1;
    }
    // Trailing content without a terminator still forms a sentence.
    if let Some(last) = SENTENCE_END.find_iter(stripped).last() {
        if last.end() < stripped.len() {
            count += 1;
        }
    }
    count.max(1)
}

fn ends_with_abbreviation(body: &str) -> bool {
    // `body` ends right before the terminator; look at the token before it.
    let token: String = body
        .chars()
        .rev()
        .take_while(|c| c.is_alphanumeric() || *c == '.')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if token.is_empty() {
        return false;
    }
    let token = token.trim_end_matches('.').to_lowercase();
    ABBREVIATIONS.contains(&token.as_str())
}

/// Count occurrences of `keyword` in `text`, case-insensitively.
///
/// Purely word-character keywords are matched on word boundaries; anything
/// else falls back to a literal substring match.
pub fn count_keyword(text: &str, keyword: &str) -> usize {
    if keyword.is_empty() {
        return 0;
    }
    let word_mode = keyword.chars().all(|c| c.is_alphanumeric() || c == '_');
    let pattern = if word_mode {
        format!(r"(?i)\b{}\b", regex::escape(keyword))
    } else {
        format!("(?i){}", regex::escape(keyword))
    };
    match Regex::new(&pattern) {
        Ok(re) => re.find_iter(text).count(),
        // Escaped patterns should always compile; substring count is the
        // conservative fallback.
        Err(_) => text.to_lowercase().matches(&keyword.to_lowercase()).count(),
    }
}

/// True if `keyword` occurs at least once (same matching rules as
/// [`count_keyword`]).
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    count_keyword(text, keyword) > 0
}

/// First ASCII alphabetic character of `text`.
pub fn first_alphabetic(text: &str) -> Option<char> {
    ALPHA.find(text).and_then(|m| m.as_str().chars().next())
}

/// Last ASCII alphabetic character of `text`.
pub fn last_alphabetic(text: &str) -> Option<char> {
    ALPHA
        .find_iter(text)
        .last()
        .and_then(|m| m.as_str().chars().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence_wrapper() {
        let text = "```json\nHello world\n```";
        assert_eq!(strip_structured_wrappers(text), "Hello world");
    }

    #[test]
    fn test_strip_front_matter() {
        let text = "---\ntitle: x\n---\nBody starts here.";
        assert_eq!(strip_structured_wrappers(text), "Body starts here.");
    }

    #[test]
    fn test_strip_leading_tags_and_table_rows() {
        assert_eq!(
            strip_structured_wrappers("<div><p>Actual content</p></div>"),
            "Actual content"
        );
        assert_eq!(
            strip_structured_wrappers("| --- | --- |\n|:---|---:|\nActual content"),
            "Actual content"
        );
    }

    #[test]
    fn test_strip_keeps_contentful_headers() {
        // A header with real words is content, not a wrapper.
        assert_eq!(
            strip_structured_wrappers("# Report\nBody"),
            "# Report\nBody"
        );
    }

    #[test]
    fn test_strip_json_shell() {
        assert_eq!(
            strip_structured_wrappers(r#"{"answer": "Paris is the capital"}"#),
            "Paris is the capital"
        );
    }

    #[test]
    fn test_strip_never_empties_all_wrapper_text() {
        // Every line looks like a wrapper: leave the text as-is.
        let text = "| a |\n| b |";
        assert_eq!(strip_structured_wrappers(text), text);
    }

    #[test]
    fn test_unwrap_code_fence() {
        assert_eq!(unwrap_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(unwrap_code_fence("plain"), "plain");
        // An unterminated fence is not unwrapped.
        assert_eq!(unwrap_code_fence("```json\n{}"), "```json\n{}");
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("one two three"), 3);
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("hyphen-ated counts twice"), 4);
    }

    #[test]
    fn test_count_paragraphs() {
        assert_eq!(count_paragraphs("a\n\nb\n\n\nc"), 3);
        assert_eq!(count_paragraphs("single block\nwith two lines"), 1);
        assert_eq!(count_paragraphs("   "), 0);
    }

    #[test]
    fn test_count_sentences() {
        assert_eq!(count_sentences("One. Two! Three?"), 3);
        assert_eq!(count_sentences("Dr. Smith arrived. He sat down."), 2);
        assert_eq!(count_sentences("Pi is 3.14 exactly."), 1);
        assert_eq!(count_sentences("no terminator at all"), 1);
        assert_eq!(count_sentences(""), 0);
    }

    #[test]
    fn test_count_keyword_word_boundary() {
        assert_eq!(count_keyword("a taxi is not an x", "x"), 1);
        assert_eq!(count_keyword("X marks the x", "x"), 2);
        assert_eq!(count_keyword("c++ and c++ again", "c++"), 2);
        assert_eq!(count_keyword("anything", ""), 0);
    }

    #[test]
    fn test_alphabetic_anchors() {
        assert_eq!(first_alphabetic("42 bottles"), Some('b'));
        assert_eq!(last_alphabetic("end 99."), Some('d'));
        assert_eq!(first_alphabetic("123"), None);
    }

    #[test]
    fn test_strip_invisible_prefix() {
        assert_eq!(strip_invisible_prefix("\u{feff}\u{00a0} hi"), "hi");
        assert_eq!(strip_invisible_prefix("hi"), "hi");
    }
}
