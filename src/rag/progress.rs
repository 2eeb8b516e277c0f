// file: src/rag/progress.rs
// description: progress bar and statistics for index builds
// reference: uses indicatif for progress bars and tracks build metrics

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStats {
    pub documents: usize,
    pub chunks: usize,
    pub embedded: usize,
    pub duration_secs: f64,
}

impl BuildStats {
    pub fn chunks_per_second(&self) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        self.embedded as f64 / self.duration_secs
    }

    pub fn average_chunks_per_document(&self) -> f64 {
        if self.documents == 0 {
            return 0.0;
        }
        self.chunks as f64 / self.documents as f64
    }
}

pub struct EmbeddingProgress {
    bar: ProgressBar,
    documents: usize,
    total: usize,
    embedded: AtomicUsize,
    start_time: Instant,
}

impl EmbeddingProgress {
    pub fn new(documents: usize, total_chunks: usize, visible: bool, colored: bool) -> Self {
        let bar = ProgressBar::with_draw_target(
            Some(total_chunks as u64),
            if visible {
                ProgressDrawTarget::stderr()
            } else {
                ProgressDrawTarget::hidden()
            },
        );
        bar.set_style(bar_style(colored));
        bar.set_message("embedding chunks");

        Self {
            bar,
            documents,
            total: total_chunks,
            embedded: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn hidden(documents: usize, total_chunks: usize) -> Self {
        Self::new(documents, total_chunks, false, false)
    }

    pub fn inc(&self, chunks: usize) {
        self.embedded.fetch_add(chunks, Ordering::SeqCst);
        self.bar.inc(chunks as u64);
    }

    pub fn set_message(&self, message: String) {
        self.bar.set_message(message);
    }

    pub fn finish(&self) -> BuildStats {
        self.bar.finish_and_clear();
        BuildStats {
            documents: self.documents,
            chunks: self.total,
            embedded: self.embedded.load(Ordering::SeqCst),
            duration_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

fn bar_style(colored: bool) -> ProgressStyle {
    let (template, chars) = if colored {
        (
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            "█▓▒░",
        )
    } else {
        (
            "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta}) {msg}",
            "=>-",
        )
    };
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(chars)
}
