//! Course-material loader.

use pycoach_core::error::RetrievalError;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A source document read from the course directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    /// Path relative to the course directory
    pub source: String,
}

/// Recursively read every UTF-8 text file under `dir`.
///
/// Unreadable and non-UTF-8 files are skipped with a warning. Hidden files
/// and directories are ignored. Fails when the directory is missing or
/// yields no documents.
pub fn load_documents(dir: &Path) -> Result<Vec<Document>, RetrievalError> {
    if !dir.is_dir() {
        return Err(RetrievalError::Documents(format!(
            "directory '{}' is empty or does not exist",
            dir.display()
        )));
    }

    let mut documents = Vec::new();

    let walker = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let source = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                warn!(file = %source, error = %e, "Skipping unreadable file");
                continue;
            }
        };

        let content = match String::from_utf8(bytes) {
            Ok(c) => c,
            Err(_) => {
                warn!(file = %source, "Skipping non-UTF-8 file");
                continue;
            }
        };

        if content.trim().is_empty() {
            debug!(file = %source, "Skipping empty file");
            continue;
        }

        documents.push(Document { content, source });
    }

    if documents.is_empty() {
        return Err(RetrievalError::Documents(format!(
            "directory '{}' is empty; add course materials first",
            dir.display()
        )));
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_nested_text_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("week1")).unwrap();
        std::fs::write(dir.path().join("intro.md"), "Python is a language.").unwrap();
        std::fs::write(dir.path().join("week1").join("lists.txt"), "Lists are mutable.").unwrap();

        let docs = load_documents(dir.path()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "intro.md");
        assert_eq!(docs[1].source, "week1/lists.txt");
        assert_eq!(docs[1].content, "Lists are mutable.");
    }

    #[test]
    fn binary_and_hidden_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "Tuples are immutable.").unwrap();
        std::fs::write(dir.path().join("image.png"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();
        std::fs::write(dir.path().join(".hidden"), "secret").unwrap();

        let docs = load_documents(dir.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "notes.md");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = load_documents(Path::new("/nonexistent/course")).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_documents(dir.path()).unwrap_err();
        assert!(matches!(err, RetrievalError::Documents(_)));
        assert!(err.to_string().contains("is empty"));
    }
}
