//! JSON salvage — recovers a structured value from free-form model output.
//!
//! Models asked for JSON still wrap it in prose, emit several fenced blocks,
//! use single quotes, leave trailing commas, or forget to quote keys. Candidate
//! selection is ordered, first hit wins:
//!
//! 1. the first fenced code block whose body starts with `{` or `[`
//! 2. the whole trimmed response, if it starts with `{` or `[`
//! 3. a balanced bracket scan from the earliest `{` or `[` (to end of input if
//!    the brackets never close)
//!
//! The candidate is parsed directly; on failure exactly one textual repair pass
//! is applied and the parse retried. There is no further iteration.

use std::iter::Peekable;
use std::str::Chars;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// How much of the raw response is echoed back in an extraction failure.
const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum SalvageError {
    #[error("No JSON object or array found in response: {snippet:?}")]
    Extraction { snippet: String },

    #[error("JSON candidate unparsable: {original}; after repair: {repaired}")]
    Parse { original: String, repaired: String },
}

/// Extracts and parses the JSON payload embedded in `raw`.
pub fn salvage(raw: &str) -> Result<Value, SalvageError> {
    let candidate = extract_candidate(raw).ok_or_else(|| SalvageError::Extraction {
        snippet: raw.chars().take(SNIPPET_CHARS).collect(),
    })?;

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Ok(value),
        Err(original) => {
            let repaired = repair(candidate);
            serde_json::from_str::<Value>(&repaired).map_err(|second| SalvageError::Parse {
                original: original.to_string(),
                repaired: second.to_string(),
            })
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Candidate extraction
// ────────────────────────────────────────────────────────────────────────────

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"```[ \t]*(?i:json)?[ \t]*\r?\n?([\s\S]*?)```").expect("fence regex is valid")
    })
}

fn starts_like_json(text: &str) -> bool {
    text.starts_with('{') || text.starts_with('[')
}

fn extract_candidate(raw: &str) -> Option<&str> {
    for captures in fence_regex().captures_iter(raw) {
        if let Some(body) = captures.get(1) {
            let body = body.as_str().trim();
            if starts_like_json(body) {
                return Some(body);
            }
        }
    }

    let trimmed = raw.trim();
    if starts_like_json(trimmed) {
        return Some(trimmed);
    }

    scan_balanced(raw)
}

/// Returns the substring from the earliest `{`/`[` to the point where both
/// brace and bracket depth return to zero, ignoring anything inside strings.
fn scan_balanced(text: &str) -> Option<&str> {
    let start = text.find(|c| c == '{' || c == '[')?;
    let tail = &text[start..];

    let mut braces = 0i32;
    let mut brackets = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, ch) in tail.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' => quote = Some(ch),
            '{' => braces += 1,
            '[' => brackets += 1,
            '}' | ']' => {
                if ch == '}' {
                    braces -= 1;
                } else {
                    brackets -= 1;
                }
                if braces == 0 && brackets == 0 {
                    return Some(&tail[..offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    // Brackets never closed: best-effort truncated candidate.
    Some(tail)
}

// ────────────────────────────────────────────────────────────────────────────
// Repair
// ────────────────────────────────────────────────────────────────────────────

fn trailing_comma_regex() -> &'static Regex {
    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();
    TRAILING_COMMA
        .get_or_init(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex is valid"))
}

fn bare_key_regex() -> &'static Regex {
    static BARE_KEY: OnceLock<Regex> = OnceLock::new();
    BARE_KEY.get_or_init(|| {
        Regex::new(r"([{,]\s*)([A-Za-z_$][A-Za-z0-9_$]*)(\s*):").expect("bare key regex is valid")
    })
}

enum Piece {
    Code(String),
    Str(String),
}

/// Single textual repair pass. Strings are lifted out first so that nothing
/// inside a string literal is touched by the structural fixes.
fn repair(candidate: &str) -> String {
    let without_bom = candidate.trim_start_matches('\u{feff}');

    split_pieces(without_bom)
        .into_iter()
        .map(|piece| match piece {
            Piece::Str(literal) => literal,
            Piece::Code(code) => {
                let code = trailing_comma_regex().replace_all(&code, "$1");
                bare_key_regex()
                    .replace_all(&code, "$1\"$2\"$3:")
                    .into_owned()
            }
        })
        .collect()
}

/// Splits text into code and string literals, dropping `//` and `/* */`
/// comments and normalising every string literal to double quotes.
fn split_pieces(text: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut code = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' | '\'' => {
                if !code.is_empty() {
                    pieces.push(Piece::Code(std::mem::take(&mut code)));
                }
                pieces.push(Piece::Str(read_string_literal(ch, &mut chars)));
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => code.push(ch),
        }
    }

    if !code.is_empty() {
        pieces.push(Piece::Code(code));
    }
    pieces
}

/// Reads a literal whose opening `quote` was already consumed and re-emits it
/// double-quoted.
fn read_string_literal(quote: char, chars: &mut Peekable<Chars<'_>>) -> String {
    let mut out = String::from('"');

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                // `\'` is not a JSON escape.
                Some('\'') => out.push('\''),
                Some(escaped) => {
                    out.push('\\');
                    out.push(escaped);
                }
                None => out.push('\\'),
            },
            c if c == quote => {
                out.push('"');
                return out;
            }
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }

    // Unterminated literal; the retry parse reports it.
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_block_inside_prose() {
        let value = json!({"themeName": "Noir", "sizes": [1, 2, 3], "nested": {"ok": true}});
        let raw = format!(
            "prefix text\n```json\n{}\n```\nsuffix",
            serde_json::to_string(&value).unwrap()
        );
        assert_eq!(salvage(&raw).unwrap(), value);
    }

    #[test]
    fn test_untagged_fence_is_accepted() {
        let raw = "Here you go:\n```\n[1, 2]\n```";
        assert_eq!(salvage(raw).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_first_json_like_fence_wins() {
        let raw = "```bash\necho hi\n```\nthen\n```json\n{\"a\": 1}\n```\n```json\n{\"a\": 2}\n```";
        assert_eq!(salvage(raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_whole_text_candidate() {
        assert_eq!(salvage("  {\"a\": \"b\"}  \n").unwrap(), json!({"a": "b"}));
    }

    #[test]
    fn test_bracket_scan_ignores_braces_in_strings() {
        let raw = r#"Sure! The design is {"heading": "use } and { freely", "list": [1, {"x": "]"}]} hope that helps"#;
        let value = salvage(raw).unwrap();
        assert_eq!(value["heading"], "use } and { freely");
        assert_eq!(value["list"][1]["x"], "]");
    }

    #[test]
    fn test_bracket_scan_respects_escaped_quotes() {
        let raw = r#"Result: {"quote": "she said \"}\" loudly"} done"#;
        assert_eq!(salvage(raw).unwrap()["quote"], "she said \"}\" loudly");
    }

    #[test]
    fn test_repair_path_fixes_loose_object() {
        assert_eq!(
            salvage("{a: 'x', b: 1,}").unwrap(),
            json!({"a": "x", "b": 1})
        );
    }

    #[test]
    fn test_repair_strips_comments_but_keeps_urls() {
        let raw = "{\n  // the link\n  \"url\": \"https://example.com/a\", /* note */\n  \"n\": 2,\n}";
        let value = salvage(raw).unwrap();
        assert_eq!(value["url"], "https://example.com/a");
        assert_eq!(value["n"], 2);
    }

    #[test]
    fn test_repair_keeps_apostrophes_in_double_quoted_strings() {
        let raw = "{\"text\": \"don't stop\", extra: 'it\\'s \"fine\"',}";
        let value = salvage(raw).unwrap();
        assert_eq!(value["text"], "don't stop");
        assert_eq!(value["extra"], "it's \"fine\"");
    }

    #[test]
    fn test_repair_strips_bom() {
        assert_eq!(repair("\u{feff}{'a': 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_no_json_is_extraction_error() {
        let err = salvage("no json here at all").unwrap_err();
        assert!(matches!(err, SalvageError::Extraction { .. }));
    }

    #[test]
    fn test_extraction_error_snippet_is_bounded() {
        let raw = "x".repeat(500);
        match salvage(&raw).unwrap_err() {
            SalvageError::Extraction { snippet } => assert_eq!(snippet.chars().count(), 200),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncated_candidate_is_parse_error_with_both_messages() {
        let err = salvage("The answer: {\"a\": [1, 2").unwrap_err();
        match err {
            SalvageError::Parse { original, repaired } => {
                assert!(!original.is_empty());
                assert!(!repaired.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncated_candidate_scans_to_end() {
        assert_eq!(scan_balanced("junk {\"a\": [1"), Some("{\"a\": [1"));
    }
}
