// file: src/models/search_result.rs
// description: retrieved chunk with similarity score
// reference: Used for vector similarity search results

use super::chunk::Chunk;
use crate::utils::Validator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,

    /// Cosine similarity, higher is closer
    pub score: f32,

    /// Cosine distance as reported by the store
    pub distance: f32,
}

impl RetrievedChunk {
    pub fn from_distance(chunk: Chunk, distance: f32) -> Self {
        Self {
            chunk,
            score: 1.0 - distance,
            distance,
        }
    }

    pub fn format_summary(&self, max_content_chars: usize) -> String {
        format!(
            "Score: {:.4} | {} #{}\n{}\n",
            self.score,
            self.chunk.source,
            self.chunk.index,
            Validator::truncate_text(&self.chunk.text, max_content_chars)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_from_distance() {
        let chunk = Chunk::new("a.txt", 0, 0, "alpha".to_string());
        let hit = RetrievedChunk::from_distance(chunk, 0.25);
        assert_eq!(hit.score, 0.75);
    }

    #[test]
    fn test_format_summary() {
        let chunk = Chunk::new(
            "notes.txt",
            3,
            360,
            "This is a very long content that will be truncated".to_string(),
        );
        let summary = RetrievedChunk::from_distance(chunk, 0.13).format_summary(20);
        assert!(summary.contains("0.8700"));
        assert!(summary.contains("notes.txt #3"));
        assert!(summary.contains("..."));
    }
}
