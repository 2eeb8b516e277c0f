// file: src/utils/telemetry.rs
// description: Operation timing for index builds, model loads and answers

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Logs start and completion of a named operation.
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        debug!(operation, "operation started");
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn checkpoint(&self, message: &str) {
        debug!(
            operation = %self.operation,
            elapsed_secs = self.elapsed().as_secs_f64(),
            "{}",
            message
        );
    }

    pub fn warn_if_slow(&self, threshold: Duration, message: &str) {
        let elapsed = self.elapsed();
        if elapsed > threshold {
            warn!(
                "Slow operation [{}]: {} took {:.2}s (threshold: {:.2}s)",
                self.operation,
                message,
                elapsed.as_secs_f64(),
                threshold.as_secs_f64()
            );
        }
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        info!(
            "Completed {} in {:.2}s",
            self.operation,
            elapsed.as_secs_f64()
        );
        elapsed
    }

    pub fn finish_with_count(self, count: usize) -> Throughput {
        let throughput = Throughput::new(&self.operation, count, self.elapsed());
        info!("Completed {}", throughput.format());
        throughput
    }
}

/// Items per second for a finished operation (chunks embedded, tokens generated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Throughput {
    pub operation: String,
    pub count: usize,
    pub duration_ms: u64,
    pub per_second: f64,
}

impl Throughput {
    pub fn new(operation: &str, count: usize, duration: Duration) -> Self {
        let secs = duration.as_secs_f64();
        Self {
            operation: operation.to_string(),
            count,
            duration_ms: duration.as_millis() as u64,
            per_second: if secs > 0.0 { count as f64 / secs } else { 0.0 },
        }
    }

    pub fn format(&self) -> String {
        format!(
            "{}: {} items in {}ms ({:.2}/sec)",
            self.operation, self.count, self.duration_ms, self.per_second
        )
    }
}
