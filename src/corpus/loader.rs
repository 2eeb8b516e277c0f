// file: src/corpus/loader.rs
// description: discovers and reads corpus files from a directory
// reference: https://docs.rs/walkdir

use super::markdown;
use crate::config::CorpusConfig;
use crate::error::{Result, WorkbenchError};
use crate::models::Document;
use crate::utils::Validator;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub struct CorpusLoader {
    extensions: Vec<String>,
    max_file_size: u64,
}

impl CorpusLoader {
    pub fn new(config: &CorpusConfig) -> Self {
        Self {
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_file_size: (config.max_file_size_mb * 1024 * 1024) as u64,
        }
    }

    /// Matching files directly inside `root`, sorted by name. Subdirectories are not visited.
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>> {
        Validator::validate_directory(root)
            .map_err(|e| WorkbenchError::corpus(root, e.to_string()))?;

        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| WorkbenchError::corpus(root, e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !self.matches_extension(path) {
                debug!("Skipping file: {}", path.display());
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size > self.max_file_size {
                warn!(
                    "Skipping large file ({} MB): {}",
                    size / 1024 / 1024,
                    path.display()
                );
                continue;
            }

            files.push(path.to_path_buf());
        }

        Ok(files)
    }

    pub fn load(&self, root: &Path) -> Result<Vec<Document>> {
        let files = self.scan(root)?;
        if files.is_empty() {
            return Err(WorkbenchError::corpus(
                root,
                format!("no files with extension {} found", self.extensions.join("|")),
            ));
        }

        let documents = files
            .iter()
            .map(|path| self.read_document(path))
            .collect::<Result<Vec<_>>>()?;

        info!("Loaded {} documents from {}", documents.len(), root.display());
        Ok(documents)
    }

    fn read_document(&self, path: &Path) -> Result<Document> {
        let raw = fs::read(path).map_err(|source| WorkbenchError::FileOperation {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8(raw)
            .map_err(|_| WorkbenchError::corpus(path, "file is not valid UTF-8"))?;

        let content = if is_markdown(path) {
            markdown::to_plain_text(&text)
        } else {
            text
        };

        debug!("Read {} ({} bytes)", path.display(), content.len());
        Ok(Document::new(path, content))
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|want| want.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

fn is_markdown(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md") | Some("markdown")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loader(extensions: &[&str]) -> CorpusLoader {
        CorpusLoader::new(&CorpusConfig {
            directory: PathBuf::from("unused"),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            max_file_size_mb: 1,
        })
    }

    #[test]
    fn test_scan_is_flat_and_filtered() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.txt"), "second").unwrap();
        fs::write(temp.path().join("a.txt"), "first").unwrap();
        fs::write(temp.path().join("ignored.pdf"), "binary").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("nested/deep.txt"), "deep").unwrap();

        let files = loader(&["txt"]).scan(temp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_markdown_is_reduced_to_text() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("doc.md"), "# Heading\n\nBody").unwrap();
        let docs = loader(&[".md"]).load(temp.path()).unwrap();
        assert_eq!(docs[0].content, "Heading\n\nBody");
    }

    #[test]
    fn test_missing_directory_is_corpus_error() {
        let err = loader(&["txt"]).load(Path::new("/nonexistent/corpus")).unwrap_err();
        assert!(matches!(err, WorkbenchError::Corpus { .. }));
    }

    #[test]
    fn test_empty_corpus_is_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.csv"), "a,b").unwrap();
        assert!(loader(&["txt"]).load(temp.path()).is_err());
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("bad.txt"), [0xff, 0xfe, 0x00]).unwrap();
        let err = loader(&["txt"]).load(temp.path()).unwrap_err();
        assert!(matches!(err, WorkbenchError::Corpus { .. }));
    }
}
