// file: src/corpus/chunker.rs
// description: recursive character splitting of documents into bounded chunks
// reference: internal chunking strategy

use crate::config::ChunkingConfig;
use crate::models::{Chunk, Document};

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text on the coarsest separator that occurs, recursing into pieces
/// that are still too long. Separators stay attached to the preceding piece
/// and nothing is trimmed, so with zero overlap the chunks concatenate back
/// to the input. Lengths are counted in characters.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

struct Piece<'a> {
    offset: usize,
    text: &'a str,
    len: usize,
}

impl TextChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            chunk_overlap: config.chunk_overlap.min(config.chunk_size.saturating_sub(1)),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        let source = document.source_name();
        self.split_with_offsets(&document.content)
            .into_iter()
            .enumerate()
            .map(|(index, (offset, text))| Chunk::new(&source, index, offset, text))
            .collect()
    }

    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.chunk_document(doc))
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with_offsets(text)
            .into_iter()
            .map(|(_, t)| t)
            .collect()
    }

    /// Chunks paired with their character offset in `text`.
    pub fn split_with_offsets(&self, text: &str) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        self.split_recursive(text, 0, &self.separators, &mut out);
        out
    }

    fn split_recursive(
        &self,
        text: &str,
        base: usize,
        separators: &[String],
        out: &mut Vec<(usize, String)>,
    ) {
        if text.is_empty() {
            return;
        }
        if text.chars().count() <= self.chunk_size {
            out.push((base, text.to_string()));
            return;
        }

        let chosen = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()));
        let (separator, rest) = match chosen {
            Some(i) => (separators[i].as_str(), &separators[i + 1..]),
            None => ("", &separators[separators.len()..]),
        };

        let raw: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split_inclusive(separator).collect()
        };

        let mut group: Vec<Piece> = Vec::new();
        let mut group_len = 0;
        let mut offset = base;

        for piece in raw {
            let len = piece.chars().count();
            if len > self.chunk_size {
                if !group.is_empty() {
                    out.push(join(&group));
                    group.clear();
                    group_len = 0;
                }
                self.split_recursive(piece, offset, rest, out);
            } else {
                if !group.is_empty() && group_len + len > self.chunk_size {
                    out.push(join(&group));
                    // keep a tail of at most chunk_overlap chars that still leaves room for `piece`
                    while !group.is_empty()
                        && (group_len > self.chunk_overlap || group_len + len > self.chunk_size)
                    {
                        group_len -= group.remove(0).len;
                    }
                }
                group.push(Piece {
                    offset,
                    text: piece,
                    len,
                });
                group_len += len;
            }
            offset += len;
        }

        if !group.is_empty() {
            out.push(join(&group));
        }
    }
}

fn join(group: &[Piece]) -> (usize, String) {
    let text: String = group.iter().map(|p| p.text).collect();
    (group[0].offset, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunker(size: usize, overlap: usize) -> TextChunker {
        TextChunker::new(ChunkingConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        })
    }

    const SAMPLE: &str = "A colheita de soja começou cedo neste ano.\n\nOs campos do norte \
        receberam chuva suficiente durante todo o mês de outubro, e a produtividade \
        esperada supera a média histórica da região.\nO milho segue atrasado.\n\n\
        Fertilizantes nitrogenados foram aplicados em duas etapas. Umaúnicapalavramuitolongaquenãocabeemnenhumpedaçodecentoevintecaracteresdeveserquebradaporcaracteresparamanterolimiteestabelecido.";

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(chunker(120, 0).split_text("short text"), vec!["short text"]);
        assert!(chunker(120, 0).split_text("").is_empty());
    }

    #[test]
    fn test_zero_overlap_is_lossless_and_bounded() {
        let chunks = chunker(120, 0).split_text(SAMPLE);
        assert!(chunks.len() > 2);
        assert_eq!(chunks.concat(), SAMPLE);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 120, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(80), "b".repeat(80));
        let chunks = chunker(120, 0).split_text(&text);
        assert_eq!(chunks, vec![format!("{}\n\n", "a".repeat(80)), "b".repeat(80)]);
    }

    #[test]
    fn test_offsets_point_into_source() {
        let chunker = chunker(40, 0);
        let chars: Vec<char> = SAMPLE.chars().collect();
        for (offset, text) in chunker.split_with_offsets(SAMPLE) {
            let n = text.chars().count();
            let expected: String = chars[offset..offset + n].iter().collect();
            assert_eq!(expected, text);
        }
    }

    #[test]
    fn test_overlap_repeats_tail() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = chunker(15, 6).split_text(text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev_words: Vec<&str> = pair[0].split_whitespace().collect();
            let first_next = pair[1].split_whitespace().next().unwrap();
            assert!(prev_words.contains(&first_next), "{pair:?}");
        }
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 15);
        }
    }

    #[test]
    fn test_chunk_document_assigns_indices() {
        let doc = Document::new("/corpus/safra.txt", SAMPLE.to_string());
        let chunks = chunker(120, 0).chunk_document(&doc);
        assert!(chunks.iter().all(|c| c.source == "safra.txt"));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
        assert_eq!(chunks[0].offset, 0);
    }

    #[test]
    fn test_splitting_is_deterministic() {
        let a = chunker(50, 10).split_text(SAMPLE);
        let b = chunker(50, 10).split_text(SAMPLE);
        assert_eq!(a, b);
    }
}
