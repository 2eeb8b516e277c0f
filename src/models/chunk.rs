// file: src/models/chunk.rs
// description: bounded text span of a document, the unit that gets embedded
// reference: internal data structures

use super::document::compute_hash;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// SHA-256 over source, index and text
    pub id: String,
    pub source: String,
    /// Position of the chunk within its document
    pub index: usize,
    /// Character offset of the first character in the document
    pub offset: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(source: &str, index: usize, offset: usize, text: String) -> Self {
        let id = compute_hash(format!("{source}\u{0}{index}\u{0}{text}").as_bytes());
        Self {
            id,
            source: source.to_string(),
            index,
            offset,
            text,
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
