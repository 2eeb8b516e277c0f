// file: src/llm/sse.rs
// description: line-buffered decoder for chat completion server-sent events
// reference: https://html.spec.whatwg.org/multipage/server-sent-events.html

use crate::error::{Result, WorkbenchError};
use serde::Deserialize;

#[derive(Debug, PartialEq)]
pub enum SseEvent {
    Delta(String),
    Done,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// Network chunks may split lines (and UTF-8 sequences); only complete lines are decoded.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<SseEvent>> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_line(line.trim_end_matches(['\r', '\n'])) {
                events.push(event);
            }
        }

        events
    }

    /// Decodes a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Option<Result<SseEvent>> {
        let rest = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&rest);
        parse_line(line.trim())
    }
}

fn parse_line(line: &str) -> Option<Result<SseEvent>> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(Ok(SseEvent::Done));
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            let content: String = chunk
                .choices
                .into_iter()
                .filter_map(|c| c.delta.content)
                .collect();
            if content.is_empty() {
                None
            } else {
                Some(Ok(SseEvent::Delta(content)))
            }
        }
        Err(e) => Some(Err(WorkbenchError::generation_with(
            "malformed stream chunk",
            e,
        ))),
    }
}
