//! Text chunking for ingestion.
//!
//! Splits page text into bounded, overlapping chunks ahead of embedding.
//! Sizes are measured in characters (Unicode scalar values).

use crate::config::ChunkingSettings;
use crate::error::{Result, SpanaError};

/// Splits text into chunks of at most `max_chars` characters with
/// `overlap_chars` of trailing context carried into the next chunk.
///
/// Text is split on sentence endings and paragraph breaks, then greedily
/// merged up to the size limit. Runs with no usable break points fall back
/// to hard character cuts.
#[derive(Debug, Clone)]
pub struct TextChunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl TextChunker {
    /// Create a chunker, validating that the overlap leaves room for new
    /// content in every chunk.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(SpanaError::Config(
                "max_chunk_chars must be greater than zero".to_string(),
            ));
        }
        if overlap_chars >= max_chars {
            return Err(SpanaError::Config(format!(
                "overlap_chars ({}) must be smaller than max_chunk_chars ({})",
                overlap_chars, max_chars
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    /// Create a chunker from the `[chunking]` settings section.
    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.max_chunk_chars, settings.overlap_chars)
    }

    /// Maximum chunk size in characters.
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Split `text` into chunks. Empty or whitespace-only text yields no
    /// chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // Oversized units get hard cuts up front so the merge below only
        // ever sees pieces that fit.
        let mut units = Vec::new();
        for unit in split_units(text) {
            if unit.chars().count() > self.max_chars {
                units.extend(split_chars(&unit, self.max_chars, self.overlap_chars));
            } else {
                units.push(unit);
            }
        }

        merge_units(&units, self.max_chars, self.overlap_chars)
    }
}

/// Split text into sentence- and paragraph-sized units.
///
/// Every character of the input ends up in exactly one unit, in order, so
/// concatenating the units reproduces the input.
fn split_units(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        current.push(chars[i]);

        // Split on paragraph breaks
        if chars[i] == '\n' && i + 1 < chars.len() && chars[i + 1] == '\n' {
            current.push(chars[i + 1]);
            i += 1;
            if !current.trim().is_empty() {
                units.push(std::mem::take(&mut current));
            }
        }
        // Split on sentence endings followed by space
        else if (chars[i] == '.' || chars[i] == '?' || chars[i] == '!')
            && i + 1 < chars.len()
            && chars[i + 1] == ' '
            && !current.trim().is_empty()
        {
            units.push(std::mem::take(&mut current));
        }

        i += 1;
    }

    if !current.is_empty() {
        units.push(current);
    }

    units
}

/// Merge units into chunks, carrying up to `overlap_chars` of trailing
/// units into the next chunk. No chunk exceeds `max_chars`.
fn merge_units(units: &[String], max_chars: usize, overlap_chars: usize) -> Vec<String> {
    let counts: Vec<usize> = units.iter().map(|u| u.chars().count()).collect();

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_count = 0;
    // Sliding window: only units in [window_start, idx) are overlap candidates.
    let mut window_start = 0;

    for (idx, unit) in units.iter().enumerate() {
        if !current.is_empty() && current_count + counts[idx] > max_chars {
            chunks.push(std::mem::take(&mut current));

            // Build the overlap tail by walking back over recent units,
            // leaving room for the unit about to be added.
            let mut overlap_len = 0;
            let mut overlap_start = idx;
            for i in (window_start..idx).rev() {
                if overlap_len + counts[i] > overlap_chars
                    || overlap_len + counts[i] + counts[idx] > max_chars
                {
                    break;
                }
                overlap_len += counts[i];
                overlap_start = i;
            }
            for u in &units[overlap_start..idx] {
                current.push_str(u);
            }
            current_count = overlap_len;
            window_start = overlap_start;
        }

        current.push_str(unit);
        current_count += counts[idx];
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Hard character cuts for text with no usable break points.
fn split_chars(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let step = max_chars.saturating_sub(overlap_chars).max(1);
    let mut start = 0;

    while start < chars.len() {
        let end = (start + max_chars).min(chars.len());
        pieces.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = TextChunker::new(1000, 100).unwrap();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\n  ").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = TextChunker::new(1000, 100).unwrap();
        let chunks = chunker.chunk("Just one short sentence.");
        assert_eq!(chunks, vec!["Just one short sentence.".to_string()]);
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_max() {
        assert!(TextChunker::new(100, 100).is_err());
        assert!(TextChunker::new(100, 150).is_err());
        assert!(TextChunker::new(0, 0).is_err());
        assert!(TextChunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_chunks_respect_max_size() {
        let chunker = TextChunker::new(80, 20).unwrap();
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(30);
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 80, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_concat_reconstructs_text_without_overlap() {
        let chunker = TextChunker::new(50, 0).unwrap();
        let text = "First sentence here. Second sentence here. Third one. \
                    A fourth sentence. And a fifth to round things out.";
        let chunks = chunker.chunk(text);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_hard_cut_for_unbroken_text() {
        let chunker = TextChunker::new(1000, 100).unwrap();
        let text = "x".repeat(2500);
        let chunks = chunker.chunk(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[1].len(), 1000);
        assert_eq!(chunks[2].len(), 700);

        // Stripping each carried overlap rebuilds the original run.
        let rebuilt = format!("{}{}{}", chunks[0], &chunks[1][100..], &chunks[2][100..]);
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_overlap_carries_previous_tail() {
        let chunker = TextChunker::new(60, 25).unwrap();
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. \
                    Iota kappa lambda mu. Nu xi omicron pi.";
        let chunks = chunker.chunk(text);

        assert_eq!(
            chunks,
            vec![
                "Alpha beta gamma delta. Epsilon zeta eta theta. ".to_string(),
                "Epsilon zeta eta theta. Iota kappa lambda mu. ".to_string(),
                "Iota kappa lambda mu. Nu xi omicron pi.".to_string(),
            ]
        );
        // Each chunk opens with the tail of its predecessor.
        for pair in chunks.windows(2) {
            let shared = (1..=pair[1].len())
                .rev()
                .find(|&k| pair[1].is_char_boundary(k) && pair[0].ends_with(&pair[1][..k]));
            assert!(shared.is_some());
        }
    }

    #[test]
    fn test_multibyte_text_respects_char_bound() {
        let chunker = TextChunker::new(10, 2).unwrap();
        let text = "åäö ÅÄÖ æøå ÆØÅ åäö ÅÄÖ æøå ÆØÅ";
        let chunks = chunker.chunk(text);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 10);
        }
    }

    #[test]
    fn test_paragraph_breaks_split_units() {
        let units = split_units("First paragraph.\n\nSecond paragraph.");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0], "First paragraph.\n\n");
        assert_eq!(units[1], "Second paragraph.");
    }

    #[test]
    fn test_units_are_lossless() {
        let text = "One. Two? Three! \n\n  Four without ending";
        let units = split_units(text);
        assert_eq!(units.concat(), text);
    }
}
