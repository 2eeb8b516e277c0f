// file: src/utils/mod.rs
// description: utility functions module exports
// reference: internal module structure

pub mod logging;
pub mod suppress;
pub mod telemetry;
pub mod validation;

pub use suppress::{StreamSuppressor, quietly};
pub use telemetry::{OperationTimer, Throughput};
pub use validation::Validator;
