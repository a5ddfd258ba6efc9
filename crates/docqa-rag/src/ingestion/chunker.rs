//! Text chunking with page tracking

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, Page};

/// Preferred cut points, strongest first
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Text chunker with configurable size and overlap.
///
/// Lengths are counted in extended grapheme clusters, so a chunk never splits
/// a user-perceived character.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Characters shared by consecutive chunks
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker; requires `chunk_size > 0` and `overlap < chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than 0".into()));
        }
        if overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk every page, preserving page order; chunks inherit their page's source
    pub fn chunk_pages(&self, pages: &[Page]) -> Vec<Chunk> {
        pages
            .iter()
            .flat_map(|page| {
                let source = page.source();
                self.chunk_text(&page.text)
                    .into_iter()
                    .map(move |text| Chunk::new(text, source.clone()))
            })
            .collect()
    }

    /// Split one page of text into overlapping windows
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let bounds = grapheme_bounds(text);
        self.spans(text, &bounds)
            .into_iter()
            .map(|(start, end)| text[bounds[start]..bounds[end]].to_string())
            .collect()
    }

    /// Chunk boundaries as grapheme indices `[start, end)`
    pub fn chunk_spans(&self, text: &str) -> Vec<(usize, usize)> {
        self.spans(text, &grapheme_bounds(text))
    }

    fn spans(&self, text: &str, bounds: &[usize]) -> Vec<(usize, usize)> {
        let total = bounds.len() - 1;
        let mut spans = Vec::new();
        if total == 0 {
            return spans;
        }

        let mut start = 0;
        loop {
            if total - start <= self.chunk_size {
                spans.push((start, total));
                break;
            }

            let cut = self
                .separator_cut(text, bounds, start)
                .unwrap_or(start + self.chunk_size);
            spans.push((start, cut));

            // cut - start > overlap always holds, so the window advances
            start = cut - self.overlap;
        }

        spans
    }

    /// Grapheme index just past the last qualifying separator in the window
    fn separator_cut(&self, text: &str, bounds: &[usize], start: usize) -> Option<usize> {
        let window_end = start + self.chunk_size;
        let window = &text[bounds[start]..bounds[window_end]];

        SEPARATORS.iter().find_map(|sep| {
            window
                .match_indices(sep)
                .filter_map(|(byte_pos, _)| {
                    let absolute = bounds[start] + byte_pos + sep.len();
                    // Separators split across a grapheme (e.g. "\r\n") are not cut points
                    let end = bounds.binary_search(&absolute).ok()?;
                    let rel_end = end - start;
                    (rel_end > self.overlap && rel_end <= self.chunk_size)
                        .then_some(end)
                })
                .last()
        })
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// Byte offset of every grapheme boundary, including both ends of the string
fn grapheme_bounds(text: &str) -> Vec<usize> {
    let mut bounds: Vec<usize> = text.grapheme_indices(true).map(|(i, _)| i).collect();
    bounds.push(text.len());
    bounds
}
