// file: src/hardware/mod.rs
// description: hardware reporting module exports
// reference: internal module structure

pub mod format;
pub mod gpu;
pub mod report;

pub use format::format_bytes;
pub use gpu::GpuInfo;
pub use report::{HardwareReport, collect_report};
