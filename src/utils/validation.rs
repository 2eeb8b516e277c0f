// file: src/utils/validation.rs
// description: input validation for paths, questions and output targets
// reference: input validation patterns

use crate::error::{Result, WorkbenchError};
use std::fs;
use std::path::{Path, PathBuf};

pub struct Validator;

impl Validator {
    /// Resolves `path` and checks it names a readable regular file.
    pub fn validate_file_path(path: &Path) -> Result<PathBuf> {
        let canonical = fs::canonicalize(path).map_err(|e| {
            WorkbenchError::Validation(format!("Cannot resolve path {}: {}", path.display(), e))
        })?;

        if !canonical.is_file() {
            return Err(WorkbenchError::Validation(format!(
                "Path is not a file: {}",
                canonical.display()
            )));
        }

        Ok(canonical)
    }

    pub fn validate_directory(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(WorkbenchError::Validation(format!(
                "Directory does not exist: {}",
                path.display()
            )));
        }

        if !path.is_dir() {
            return Err(WorkbenchError::Validation(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }

        Ok(())
    }

    /// Creates the parent directory of an output file when missing.
    pub fn ensure_parent_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|source| WorkbenchError::FileOperation {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn validate_question(question: &str) -> Result<()> {
        if question.trim().is_empty() {
            return Err(WorkbenchError::Validation("Question is empty".to_string()));
        }
        Ok(())
    }

    pub fn validate_url(url: &str) -> Result<()> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(WorkbenchError::Validation(format!(
                "Invalid URL format: {}",
                url
            )));
        }
        Ok(())
    }

    /// Shortens text to `max_chars` characters for log lines.
    pub fn truncate_text(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            None => text.to_string(),
            Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        }
    }
}
