//! Text extraction for PDF, DOCX and plain-text uploads.

use std::io::{Cursor, Read};
use std::sync::OnceLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::debug;
use zip::ZipArchive;

use super::{DocumentError, DocumentKind, Page, ParsedDocument};

const DOCX_BODY: &str = "word/document.xml";

/// Parses `bytes` according to the type implied by `file_name`.
/// Fails with `DocumentError::Empty` when no page carries any text.
pub fn parse_document(file_name: &str, bytes: &[u8]) -> Result<ParsedDocument, DocumentError> {
    let kind = DocumentKind::from_file_name(file_name)?;
    let pages = match kind {
        DocumentKind::Pdf => parse_pdf(bytes)?,
        DocumentKind::Docx => vec![Page {
            number: 1,
            text: parse_docx(bytes)?,
        }],
        DocumentKind::Txt => vec![Page {
            number: 1,
            text: parse_txt(bytes),
        }],
    };

    if pages.iter().all(|p| p.text.trim().is_empty()) {
        return Err(DocumentError::Empty);
    }

    debug!("Parsed {file_name} as {kind:?}: {} page(s)", pages.len());

    Ok(ParsedDocument {
        file_name: file_name.to_string(),
        kind,
        pages,
    })
}

pub fn parse_pdf(bytes: &[u8]) -> Result<Vec<Page>, DocumentError> {
    let raw_pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| DocumentError::Pdf(e.to_string()))?;

    Ok(raw_pages
        .iter()
        .enumerate()
        .map(|(i, text)| Page {
            number: i as u32 + 1,
            text: clean_pdf_text(text),
        })
        .collect())
}

pub fn parse_docx(bytes: &[u8]) -> Result<String, DocumentError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| DocumentError::Docx(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| DocumentError::Docx(format!("{DOCX_BODY}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| DocumentError::Docx(e.to_string()))?;

    let text = docx_xml_to_text(&xml)?;
    Ok(collapse_blank_lines(&text))
}

pub fn parse_txt(bytes: &[u8]) -> String {
    collapse_blank_lines(&String::from_utf8_lossy(bytes))
}

/// Walks WordprocessingML and keeps run text, tabs, breaks and paragraph ends.
fn docx_xml_to_text(xml: &str) -> Result<String, DocumentError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| DocumentError::Docx(format!("bad text node: {e}")))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DocumentError::Docx(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(out)
}

fn hyphen_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+)-\n(\w+)").expect("valid regex"))
}

fn paragraph_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("valid regex"))
}

fn line_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]*\n[ \t]*").expect("valid regex"))
}

/// Undoes PDF line wrapping: rejoins hyphenated words, turns single line
/// breaks inside a paragraph into spaces, keeps one blank line between paragraphs.
pub fn clean_pdf_text(text: &str) -> String {
    let text = hyphen_break().replace_all(text, "${1}${2}");

    paragraph_break()
        .split(&text)
        .map(|para| line_break().replace_all(para.trim(), " ").into_owned())
        .filter(|para| !para.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Replaces every run of blank (or whitespace-only) lines with a single blank line.
pub fn collapse_blank_lines(text: &str) -> String {
    paragraph_break().replace_all(text, "\n\n").into_owned()
}
