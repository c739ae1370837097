//! Fixed-size sliding-window text chunker.
//!
//! Splits each [`DocumentUnit`] into overlapping [`Chunk`]s of at most
//! `chunk_size` characters, advancing by `chunk_size - overlap` characters.
//! Windows never cross document boundaries, so every chunk keeps the source
//! path and character offset it came from.
//!
//! Splitting is purely positional and therefore deterministic: the same
//! units and parameters always produce the same chunk boundaries.

use crate::models::{Chunk, DocumentUnit};

/// Split all units into chunks, preserving unit order.
pub fn split(units: &[DocumentUnit], chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    units
        .iter()
        .flat_map(|unit| split_unit(unit, chunk_size, overlap))
        .collect()
}

/// Split a single unit. A unit no longer than `chunk_size` yields exactly one
/// chunk holding the whole text; an empty unit yields none.
pub fn split_unit(unit: &DocumentUnit, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let chunk_size = chunk_size.max(1);
    let step = chunk_size.saturating_sub(overlap).max(1);

    // Byte index of every char start, plus the end, so windows slice on
    // char boundaries.
    let boundaries: Vec<usize> = unit
        .raw_text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(unit.raw_text.len()))
        .collect();
    let total_chars = boundaries.len() - 1;

    if total_chars == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(total_chars);
        chunks.push(Chunk {
            text: unit.raw_text[boundaries[start]..boundaries[end]].to_string(),
            source_path: unit.source_path.clone(),
            offset: start,
        });

        if end == total_chars {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(text: &str) -> DocumentUnit {
        DocumentUnit {
            source_path: "doc.txt".to_string(),
            raw_text: text.to_string(),
        }
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split(&[unit("Hello, world!")], 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[0].source_path, "doc.txt");
    }

    #[test]
    fn test_exact_size_single_chunk() {
        let text = "a".repeat(1000);
        let chunks = split(&[unit(&text)], 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(split(&[unit("")], 1000, 200).is_empty());
    }

    #[test]
    fn test_windows_overlap() {
        // 25 chars, size 10, overlap 4 → step 6 → offsets 0, 6, 12, 18
        let text = "abcdefghijklmnopqrstuvwxy";
        let chunks = split(&[unit(text)], 10, 4);
        let offsets: Vec<usize> = chunks.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 6, 12, 18]);
        assert_eq!(chunks[0].text, "abcdefghij");
        assert_eq!(chunks[1].text, "ghijklmnop");
        assert_eq!(chunks[3].text, "stuvwxy");
        // Tail of one window is the head of the next.
        assert!(chunks[1].text.starts_with(&chunks[0].text[6..]));
    }

    #[test]
    fn test_last_window_reaches_end_without_duplicate_tail() {
        // 20 chars, size 10, overlap 0 → exactly two chunks
        let text = "0123456789abcdefghij";
        let chunks = split(&[unit(text)], 10, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "abcdefghij");
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let text = "héllo wörld ünïcode";
        let chunks = split(&[unit(text)], 5, 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 5);
        }
        assert_eq!(chunks[0].text, "héllo");
    }

    #[test]
    fn test_chunks_do_not_span_documents() {
        let units = vec![
            DocumentUnit {
                source_path: "a.txt".to_string(),
                raw_text: "first".to_string(),
            },
            DocumentUnit {
                source_path: "b.txt".to_string(),
                raw_text: "second".to_string(),
            },
        ];
        let chunks = split(&units, 1000, 200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source_path, "a.txt");
        assert_eq!(chunks[1].text, "second");
        assert_eq!(chunks[1].offset, 0);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta iota kappa".repeat(10);
        let c1 = split(&[unit(&text)], 37, 11);
        let c2 = split(&[unit(&text)], 37, 11);
        assert_eq!(c1, c2);
    }
}
