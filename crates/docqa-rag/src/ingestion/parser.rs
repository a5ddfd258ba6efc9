//! Document loading: source bytes to page-level text

use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::types::{FileType, Page};

/// Glyphs commonly emitted by PDF fonts, mapped to plain ASCII
const GLYPH_REPLACEMENTS: &[(char, &str)] = &[
    ('\u{2010}', "-"),   // Hyphen
    ('\u{2011}', "-"),   // Non-breaking hyphen
    ('\u{2013}', "-"),   // En dash
    ('\u{2014}', "--"),  // Em dash
    ('\u{2018}', "'"),   // Left single quote
    ('\u{2019}', "'"),   // Right single quote
    ('\u{201C}', "\""),  // Left double quote
    ('\u{201D}', "\""),  // Right double quote
    ('\u{2022}', "* "),  // Bullet
    ('\u{2026}', "..."), // Ellipsis
    ('\u{00A0}', " "),   // Non-breaking space
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// Unresolved glyph names such as `uni2019` left behind by some fonts
fn glyph_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[(<]?\buni([0-9A-F]{4})\b[)>]?").expect("glyph name pattern is valid")
    })
}

fn blank_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n{3,}").expect("blank run pattern is valid"))
}

/// Normalise extracted text: resolve glyph names, map ligatures and typographic
/// punctuation to ASCII, drop NULs, trim trailing whitespace per line
pub fn cleanup_text(text: &str) -> String {
    let resolved = glyph_name_pattern().replace_all(text, |caps: &regex::Captures| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    let mut result = String::with_capacity(resolved.len());
    for c in resolved.chars() {
        if c == '\0' {
            continue;
        }
        match GLYPH_REPLACEMENTS.iter().find(|(glyph, _)| *glyph == c) {
            Some((_, replacement)) => result.push_str(replacement),
            None => result.push(c),
        }
    }

    let trimmed = result
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    blank_run_pattern()
        .replace_all(trimmed.trim_matches('\n'), "\n\n")
        .into_owned()
}

/// Run a parser over untrusted bytes, turning a panic into a load error
fn guard_panics<F>(source_name: &str, parse: F) -> Result<Vec<Page>>
where
    F: FnOnce() -> Result<Vec<Page>>,
{
    panic::catch_unwind(AssertUnwindSafe(parse)).unwrap_or_else(|_| {
        tracing::warn!(source = source_name, "PDF parser panicked");
        Err(Error::load(source_name, "PDF parser panicked on malformed input"))
    })
}

/// Turns raw document bytes into ordered pages
pub struct DocumentLoader;

impl DocumentLoader {
    /// Load a document, dispatching on the extension of `source_name`.
    ///
    /// Pages with no extractable text are skipped; the remaining pages keep
    /// their 0-based position in the document.
    pub fn load(bytes: &[u8], source_name: &str) -> Result<Vec<Page>> {
        match FileType::from_name(source_name) {
            FileType::Pdf => guard_panics(source_name, || Self::load_pdf(bytes, source_name)),
            FileType::Txt | FileType::Markdown => Ok(Self::load_text(bytes, source_name)),
            FileType::Unknown => Err(Error::load(source_name, "unsupported file type")),
        }
    }

    fn load_pdf(bytes: &[u8], source_name: &str) -> Result<Vec<Page>> {
        let doc = lopdf::Document::load_mem(bytes)
            .map_err(|e| Error::load(source_name, format!("malformed PDF: {}", e)))?;
        let page_count = doc.get_pages().len();

        let texts = match Self::extract_with_pdf_extract(bytes) {
            Some(texts) if texts.len() == page_count => texts,
            Some(texts) => {
                tracing::warn!(
                    source = source_name,
                    expected = page_count,
                    got = texts.len(),
                    "pdf-extract page count mismatch, using lopdf fallback"
                );
                Self::extract_with_lopdf(&doc, source_name)
            }
            None => {
                tracing::warn!(source = source_name, "pdf-extract failed, using lopdf fallback");
                Self::extract_with_lopdf(&doc, source_name)
            }
        };

        let pages: Vec<Page> = texts
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let text = cleanup_text(&raw);
                (!text.trim().is_empty()).then(|| Page::new(text, source_name, index as u32))
            })
            .collect();

        tracing::debug!(
            source = source_name,
            total_pages = page_count,
            text_pages = pages.len(),
            "Loaded PDF"
        );

        Ok(pages)
    }

    /// Per-page text via pdf-extract; None when it errors or panics on odd fonts
    fn extract_with_pdf_extract(bytes: &[u8]) -> Option<Vec<String>> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(bytes)
        }));

        match outcome {
            Ok(Ok(pages)) => Some(pages),
            Ok(Err(e)) => {
                tracing::debug!("pdf-extract error: {}", e);
                None
            }
            Err(_) => {
                tracing::debug!("pdf-extract panicked");
                None
            }
        }
    }

    fn extract_with_lopdf(doc: &lopdf::Document, source_name: &str) -> Vec<String> {
        doc.get_pages()
            .keys()
            .map(|&page_number| {
                doc.extract_text(&[page_number]).unwrap_or_else(|e| {
                    tracing::debug!(
                        source = source_name,
                        page = page_number,
                        "Could not extract page text: {}",
                        e
                    );
                    String::new()
                })
            })
            .collect()
    }

    fn load_text(bytes: &[u8], source_name: &str) -> Vec<Page> {
        let text = cleanup_text(&String::from_utf8_lossy(bytes));
        if text.trim().is_empty() {
            return Vec::new();
        }
        vec![Page::new(text, source_name, 0)]
    }
}
