//! Source attribution for model answers.
//!
//! Answers follow the convention `<answer text>\nSOURCES: <id>, <id>`. The
//! convention is requested in the prompt but not guaranteed, so parsing is
//! lenient: no marker simply means no cited sources. Only the uppercase
//! marker counts, so prose like "two sources: ..." stays part of the answer.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::retrieval::index::ScoredChunk;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedAnswer {
    pub answer: String,
    pub sources: Vec<String>,
}

fn sources_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bSOURCES[ \t]*:").expect("valid regex"))
}

/// Byte range of the marker to split at: the last one that opens a line,
/// else the last one anywhere.
fn find_marker(text: &str) -> Option<(usize, usize)> {
    let mut last_inline = None;
    let mut last_line_start = None;
    for m in sources_marker().find_iter(text) {
        let line_prefix = text[..m.start()].rsplit('\n').next().unwrap_or("");
        if line_prefix.chars().all(|c| c == ' ' || c == '\t') {
            last_line_start = Some((m.start(), m.end()));
        } else {
            last_inline = Some((m.start(), m.end()));
        }
    }
    last_line_start.or(last_inline)
}

pub fn parse_answer(text: &str) -> ParsedAnswer {
    let Some((start, end)) = find_marker(text) else {
        return ParsedAnswer {
            answer: text.trim().to_string(),
            sources: Vec::new(),
        };
    };

    let mut sources: Vec<String> = Vec::new();
    for raw in text[end..].split(|c: char| c == ',' || c.is_whitespace()) {
        let id = raw.trim_matches(|c: char| {
            matches!(c, '.' | ';' | '[' | ']' | '(' | ')' | '"' | '\'' | '-' | '*' | '`')
        });
        if id.is_empty() || id.eq_ignore_ascii_case("none") {
            continue;
        }
        if !sources.iter().any(|s| s == id) {
            sources.push(id.to_string());
        }
    }

    ParsedAnswer {
        answer: text[..start].trim().to_string(),
        sources,
    }
}

/// Retrieved chunks the answer actually cites, in retrieval order.
pub fn select_sources(parsed: &ParsedAnswer, retrieved: &[ScoredChunk]) -> Vec<ScoredChunk> {
    retrieved
        .iter()
        .filter(|hit| parsed.sources.iter().any(|s| *s == hit.chunk.source))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::chunker::Chunk;

    fn hit(source: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                content: format!("text {source}"),
                page: 1,
                chunk: 0,
                source: source.to_string(),
            },
            score: 0.5,
        }
    }

    #[test]
    fn test_answerable_example() {
        let parsed = parse_answer("The capital of France is Paris.\n\nSOURCES: doc1");
        assert_eq!(parsed.answer, "The capital of France is Paris.");
        assert_eq!(parsed.sources, vec!["doc1"]);
    }

    #[test]
    fn test_unanswerable_example_has_empty_sources() {
        let parsed = parse_answer("I don't know the capital of Mars.\nSOURCES:");
        assert_eq!(parsed.answer, "I don't know the capital of Mars.");
        assert!(parsed.sources.is_empty());

        let parsed = parse_answer("I don't know.\nSOURCES: None");
        assert!(parsed.sources.is_empty());
    }

    #[test]
    fn test_multiple_ids_deduplicated_in_order() {
        let parsed = parse_answer("Answer.\nSOURCES: 3-12, 1-0, 3-12.");
        assert_eq!(parsed.sources, vec!["3-12", "1-0"]);
    }

    #[test]
    fn test_marker_allows_indent_and_space_before_colon() {
        let parsed = parse_answer("Answer text\n  SOURCES : 2-1\n- 2-3");
        assert_eq!(parsed.answer, "Answer text");
        assert_eq!(parsed.sources, vec!["2-1", "2-3"]);
    }

    #[test]
    fn test_lowercase_sources_in_prose_is_not_a_marker() {
        let parsed =
            parse_answer("The report lists two sources: page 3 and page 5.\nSOURCES: 3-0, 5-1");
        assert_eq!(parsed.answer, "The report lists two sources: page 3 and page 5.");
        assert_eq!(parsed.sources, vec!["3-0", "5-1"]);

        let parsed = parse_answer("Sources: are listed below.");
        assert_eq!(parsed.answer, "Sources: are listed below.");
        assert!(parsed.sources.is_empty());
    }

    #[test]
    fn test_last_line_marker_wins() {
        let parsed = parse_answer(
            "The form has a SOURCES: field at the top.\nSOURCES: 1-0\nSOURCES: 2-4",
        );
        assert_eq!(
            parsed.answer,
            "The form has a SOURCES: field at the top.\nSOURCES: 1-0"
        );
        assert_eq!(parsed.sources, vec!["2-4"]);
    }

    #[test]
    fn test_inline_marker_used_when_no_line_marker() {
        let parsed = parse_answer("Paris is the capital. SOURCES: 1-0");
        assert_eq!(parsed.answer, "Paris is the capital.");
        assert_eq!(parsed.sources, vec!["1-0"]);
    }

    #[test]
    fn test_no_marker_keeps_whole_text() {
        let parsed = parse_answer("  Just an answer.  ");
        assert_eq!(parsed.answer, "Just an answer.");
        assert!(parsed.sources.is_empty());
    }

    #[test]
    fn test_resources_word_is_not_a_marker() {
        let parsed = parse_answer("See RESOURCES: none here");
        assert_eq!(parsed.answer, "See RESOURCES: none here");
    }

    #[test]
    fn test_select_sources_keeps_cited_only() {
        let parsed = parse_answer("Answer.\nSOURCES: 1-2, 9-9");
        let retrieved = vec![hit("1-0"), hit("1-2"), hit("1-1")];
        let selected = select_sources(&parsed, &retrieved);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].chunk.source, "1-2");
    }
}
