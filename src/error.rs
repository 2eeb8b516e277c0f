// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkbenchError>;

type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum WorkbenchError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Corpus error in {}: {message}", path.display())]
    Corpus { path: PathBuf, message: String },

    #[error("Index error: {message}")]
    Index {
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("Model load failed for {}: {message}", path.display())]
    ModelLoad { path: PathBuf, message: String },

    #[error("Generation error: {message}")]
    Generation {
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("Invalid operation '{name}', expected one of: {}", valid.join(", "))]
    InvalidOperation { name: String, valid: Vec<&'static str> },

    #[error("Invalid state: {operation} requires {required}")]
    InvalidState {
        operation: &'static str,
        required: &'static str,
    },

    #[error("Hardware query failed ({component}): {message}")]
    HardwareQuery { component: &'static str, message: String },

    #[error("Image error for {}: {source}", path.display())]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("File operation failed for {}: {source}", path.display())]
    FileOperation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkbenchError {
    pub fn index(message: impl Into<String>) -> Self {
        Self::Index {
            message: message.into(),
            source: None,
        }
    }

    pub fn index_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Index {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
            source: None,
        }
    }

    pub fn generation_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Generation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn corpus(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corpus {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn model_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: message.into(),
        }
    }
}
