//! Reasoning Processor (C11, §4.11): detects and splits "thinking" regions
//! out of raw model output. Pure — no shared mutable state, safe to call
//! freely from parallel callers (§5).

use inference_engine::estimate_token_count;
use regex::Regex;
use std::sync::OnceLock;

const THEREFORE_MARKER: &str = "Therefore, the answer is";
const THINK_PREFIX: &str = "Let me think about this";

/// Result of splitting a raw completion into its reasoning and answer parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningSplit {
    pub thinking: Option<String>,
    pub final_answer: String,
    pub has_reasoning: bool,
    pub reasoning_tokens: u32,
}

enum Pattern {
    Tag(&'static Regex),
    Markdown(&'static Regex),
    Prefix,
}

fn tag_regex(open: &str, close: &str) -> Regex {
    Regex::new(&format!(r"(?s){}(.*?){}", regex::escape(open), regex::escape(close))).unwrap()
}

fn thinking_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| tag_regex("<thinking>", "</thinking>"))
}

fn reasoning_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| tag_regex("<reasoning>", "</reasoning>"))
}

fn internal_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| tag_regex("<internal>", "</internal>"))
}

fn thought_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| tag_regex("<thought>", "</thought>"))
}

fn markdown_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\*\*Thinking:\*\*(.*?)\*\*Answer:\*\*(.*)").unwrap())
}

/// Ordered detection patterns (§4.11): first regex to match wins.
fn patterns() -> Vec<Pattern> {
    vec![
        Pattern::Tag(thinking_tag()),
        Pattern::Tag(reasoning_tag()),
        Pattern::Tag(internal_tag()),
        Pattern::Tag(thought_tag()),
        Pattern::Markdown(markdown_tag()),
        Pattern::Prefix,
    ]
}

/// Detects and splits a thinking region out of `text`, computing the
/// reasoning-token estimate per §4.11.
pub fn split(text: &str) -> ReasoningSplit {
    for pattern in patterns() {
        match pattern {
            Pattern::Tag(re) => {
                if let Some(caps) = re.captures(text) {
                    let whole = caps.get(0).unwrap();
                    let thinking = caps.get(1).unwrap().as_str().trim().to_string();
                    let mut remainder = String::with_capacity(text.len());
                    remainder.push_str(&text[..whole.start()]);
                    remainder.push_str(&text[whole.end()..]);
                    return finish(Some(thinking), &remainder);
                }
            }
            Pattern::Markdown(re) => {
                if let Some(caps) = re.captures(text) {
                    let thinking = caps.get(1).unwrap().as_str().trim().to_string();
                    let answer = caps.get(2).unwrap().as_str();
                    return finish(Some(thinking), answer);
                }
            }
            Pattern::Prefix => {
                if let Some(start) = text.find(THINK_PREFIX) {
                    let rest = &text[start..];
                    if let Some(marker) = rest.find(THEREFORE_MARKER) {
                        let thinking = rest[..marker].trim().to_string();
                        let answer = &rest[marker..];
                        return finish(Some(thinking), answer);
                    }
                    let thinking = rest.trim().to_string();
                    return finish(Some(thinking), "");
                }
            }
        }
    }
    finish(None, text)
}

fn finish(thinking: Option<String>, remainder: &str) -> ReasoningSplit {
    let final_answer = extract_final_answer(remainder);
    let has_reasoning = thinking.is_some();
    let reasoning_tokens = match &thinking {
        Some(t) => estimate_token_count(t).max(1) + 2,
        None => 0,
    };
    ReasoningSplit {
        thinking,
        final_answer,
        has_reasoning,
        reasoning_tokens,
    }
}

/// Strips a leading thinking region is assumed already gone; this also
/// recognizes the `Therefore, the answer is …` marker and, when present,
/// returns only the text following it (§4.11).
pub fn extract_final_answer(text: &str) -> String {
    if let Some(idx) = text.find(THEREFORE_MARKER) {
        let after = idx + THEREFORE_MARKER.len();
        return text[after..].trim().trim_start_matches(',').trim().to_string();
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_thinking_tag_and_trailing_answer() {
        let out = split("<thinking>step one, step two</thinking>\nThe answer is 42.");
        assert_eq!(out.thinking.as_deref(), Some("step one, step two"));
        assert_eq!(out.final_answer, "The answer is 42.");
        assert!(out.has_reasoning);
        assert!(out.reasoning_tokens >= 3);
    }

    #[test]
    fn first_matching_pattern_wins_over_later_ones() {
        let out = split("<reasoning>inner</reasoning><thought>other</thought>");
        assert_eq!(out.thinking.as_deref(), Some("inner"));
    }

    #[test]
    fn markdown_pattern_yields_both_regions_directly() {
        let out = split("**Thinking:** considering options **Answer:** go with B");
        assert_eq!(out.thinking.as_deref(), Some("considering options"));
        assert_eq!(out.final_answer, "go with B");
    }

    #[test]
    fn prefix_phrase_is_detected_without_closing_delimiter() {
        let out = split("Let me think about this carefully. Therefore, the answer is 7.");
        assert!(out.has_reasoning);
        assert_eq!(out.final_answer, "7.");
    }

    #[test]
    fn no_pattern_match_yields_no_reasoning() {
        let out = split("just a plain answer");
        assert!(!out.has_reasoning);
        assert_eq!(out.thinking, None);
        assert_eq!(out.final_answer, "just a plain answer");
        assert_eq!(out.reasoning_tokens, 0);
    }

    #[test]
    fn extract_final_answer_recognizes_therefore_marker_standalone() {
        assert_eq!(
            extract_final_answer("some reasoning text. Therefore, the answer is 9."),
            "9."
        );
    }
}
