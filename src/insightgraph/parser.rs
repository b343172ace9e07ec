//! Tolerant decoding of structured segments out of free-text replies.
//!
//! Replies from the reasoning service are natural language that *usually*
//! follows the requested format. Every parser here degrades instead of
//! failing: delimiter extraction returns however many segments it found,
//! and title parsing falls back from strict JSON to raw text plus a regex
//! scan for the score. Only callers that need a hard minimum (level-2's
//! summary/title pair) turn a short result into an error.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

lazy_static! {
    static ref SURPRISE_PATTERN: Regex =
        Regex::new(r#"["']surprising["']\s*:\s*(\d+)"#).expect("valid surprise pattern");
    static ref JSON_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").expect("valid object pattern");
}

/// Extract every segment enclosed by a pair of consecutive `delimiter` occurrences.
///
/// Segments are returned left to right, trimmed of surrounding whitespace. Text
/// after an unmatched trailing delimiter is dropped. An empty delimiter yields
/// nothing.
///
/// ```
/// use insightgraph::parser::extract_delimited;
///
/// assert_eq!(extract_delimited("~Prompt A~~Prompt B~", "~"), vec!["Prompt A", "Prompt B"]);
/// assert_eq!(extract_delimited("intro ~one~ and ~two~ and ~dangling", "~"), vec!["one", "two"]);
/// assert!(extract_delimited("no markers here", "~").is_empty());
/// ```
pub fn extract_delimited(text: &str, delimiter: &str) -> Vec<String> {
    if delimiter.is_empty() {
        return Vec::new();
    }
    let parts: Vec<&str> = text.split(delimiter).collect();
    // parts[1], parts[3], ... sit between an opening and a closing delimiter;
    // the final part never has a closing delimiter after it.
    parts
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 2 == 1 && *i + 1 < parts.len())
        .map(|(_, segment)| segment.trim().to_string())
        .collect()
}

/// Follow-up questions from the reply to the question prompt.
///
/// Empty segments (e.g. a stray `~~`) are not valid questions and are skipped.
pub fn extract_questions(text: &str, delimiter: &str) -> Vec<String> {
    extract_delimited(text, delimiter)
        .into_iter()
        .filter(|q| !q.is_empty())
        .collect()
}

/// A title recovered from the one-liner reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub title: String,
    /// Surprise score, when the reply carried one.
    pub surprise: Option<u8>,
    /// `true` when the reply decoded as a `{"title", "surprising"}` object.
    pub structured: bool,
}

/// Outcome of [`parse_title`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleParse {
    /// A usable title, from strict decoding or from the fallback.
    Parsed(ParsedTitle),
    /// Nothing usable: the reply was empty.
    Unrecoverable,
}

#[derive(Deserialize)]
struct TitleObject {
    title: String,
    surprising: Option<i64>,
}

fn clamp_score(raw: i64) -> u8 {
    raw.clamp(0, u8::MAX as i64) as u8
}

fn decode_title_object(candidate: &str) -> Option<ParsedTitle> {
    let object: TitleObject = serde_json::from_str(candidate).ok()?;
    let title = object.title.trim().to_string();
    if title.is_empty() {
        return None;
    }
    Some(ParsedTitle {
        title,
        surprise: object.surprising.map(clamp_score),
        structured: true,
    })
}

/// Parse the one-liner reply into a title and optional surprise score.
///
/// Strict decoding is tried first, on the whole reply and then on the first
/// `{...}` span inside it. Otherwise the trimmed raw text is the title and the
/// score, if any, comes from a `"surprising": <int>` pattern anywhere in it.
///
/// ```
/// use insightgraph::parser::{parse_title, TitleParse};
///
/// match parse_title(r#"{"title": "Rain peaks in May", "surprising": 7}"#) {
///     TitleParse::Parsed(t) => {
///         assert_eq!(t.title, "Rain peaks in May");
///         assert_eq!(t.surprise, Some(7));
///     }
///     TitleParse::Unrecoverable => unreachable!(),
/// }
///
/// match parse_title("Humidity drives rain. 'surprising': 2") {
///     TitleParse::Parsed(t) => assert_eq!(t.surprise, Some(2)),
///     TitleParse::Unrecoverable => unreachable!(),
/// }
///
/// assert_eq!(parse_title("   "), TitleParse::Unrecoverable);
/// ```
pub fn parse_title(text: &str) -> TitleParse {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return TitleParse::Unrecoverable;
    }

    if let Some(parsed) = decode_title_object(trimmed) {
        return TitleParse::Parsed(parsed);
    }
    if let Some(parsed) = JSON_OBJECT
        .find(trimmed)
        .and_then(|m| decode_title_object(m.as_str()))
    {
        return TitleParse::Parsed(parsed);
    }

    let surprise = SURPRISE_PATTERN
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .map(clamp_score);

    TitleParse::Parsed(ParsedTitle {
        title: trimmed.to_string(),
        surprise,
        structured: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_delimiter_count_yields_half_as_many_segments() {
        let text = "~a~~b~~c~";
        assert_eq!(extract_delimited(text, "~"), vec!["a", "b", "c"]);
    }

    #[test]
    fn odd_delimiter_count_drops_trailing_text() {
        let text = "~a~ filler ~b~ ~unterminated";
        assert_eq!(extract_delimited(text, "~"), vec!["a", "b"]);
    }

    #[test]
    fn segments_may_span_lines() {
        let text = "Here you go:\n~first\ninstruction~\n~second~";
        assert_eq!(
            extract_delimited(text, "~"),
            vec!["first\ninstruction", "second"]
        );
    }

    #[test]
    fn multi_character_delimiter() {
        assert_eq!(
            extract_delimited("<<x>> and <<y>>", "<<"),
            vec!["x>> and"]
        );
        assert_eq!(extract_delimited("##x## ##y##", "##"), vec!["x", "y"]);
    }

    #[test]
    fn empty_delimiter_extracts_nothing() {
        assert!(extract_delimited("~a~", "").is_empty());
    }

    #[test]
    fn questions_skip_empty_segments() {
        let questions = extract_questions("~What is X?~ ~~ ~Why Y?~", "~");
        assert_eq!(questions, vec!["What is X?", "Why Y?"]);
    }

    #[test]
    fn strict_title_without_score() {
        match parse_title(r#"{"title": "Sales dip on Mondays"}"#) {
            TitleParse::Parsed(t) => {
                assert!(t.structured);
                assert_eq!(t.title, "Sales dip on Mondays");
                assert_eq!(t.surprise, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn embedded_object_is_decoded() {
        let reply = "Here it is: {\"title\": \"Wind lowers temp\", \"surprising\": 1} hope it helps";
        match parse_title(reply) {
            TitleParse::Parsed(t) => {
                assert!(t.structured);
                assert_eq!(t.title, "Wind lowers temp");
                assert_eq!(t.surprise, Some(1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn python_style_dict_falls_back_to_regex() {
        let reply = "{'title': 'Rain rises in spring', \"surprising\": 9}";
        match parse_title(reply) {
            TitleParse::Parsed(t) => {
                assert!(!t.structured);
                assert_eq!(t.title, reply);
                assert_eq!(t.surprise, Some(9));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn plain_title_has_no_score() {
        match parse_title("  Temperature and rain are linked \n") {
            TitleParse::Parsed(t) => {
                assert_eq!(t.title, "Temperature and rain are linked");
                assert_eq!(t.surprise, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn oversized_score_is_clamped() {
        match parse_title(r#"{"title": "t", "surprising": 9000}"#) {
            TitleParse::Parsed(t) => assert_eq!(t.surprise, Some(255)),
            other => panic!("unexpected {:?}", other),
        }
    }
}
