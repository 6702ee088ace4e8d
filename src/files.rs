//! Loading documents from local paths.
//!
//! Each CLI path is either a file, which is loaded as-is and named by its
//! file name, or a directory, which is walked with `walkdir` and filtered by
//! the `[files]` include/exclude globs. Directory entries are named by their
//! path relative to the directory, so the same tree always produces the same
//! collection fingerprint.

use anyhow::{bail, Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use pdfchat_core::models::Document;

use crate::config::FilesConfig;

/// Read every document named by `paths`, sorted by name.
pub fn load_documents(paths: &[PathBuf], config: &FilesConfig) -> Result<Vec<Document>> {
    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/node_modules/**".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut documents = Vec::new();
    for path in paths {
        if path.is_file() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            documents.push(read_document(path, name)?);
        } else if path.is_dir() {
            walk_dir(path, config, &include_set, &exclude_set, &mut documents)?;
        } else {
            bail!("No such file or directory: {}", path.display());
        }
    }

    // Sort for deterministic ordering
    documents.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(documents)
}

fn walk_dir(
    root: &Path,
    config: &FilesConfig,
    include_set: &GlobSet,
    exclude_set: &GlobSet,
    documents: &mut Vec<Document>,
) -> Result<()> {
    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        // Apply exclude patterns
        if exclude_set.is_match(&rel_str) {
            continue;
        }

        // Apply include patterns
        if !include_set.is_match(&rel_str) {
            continue;
        }

        documents.push(read_document(path, rel_str)?);
    }
    Ok(())
}

fn read_document(path: &Path, name: String) -> Result<Document> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Document::new(name, bytes))
}

/// Globs match case-insensitively, so `Paper.PDF` is picked up by `**/*.pdf`.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_directory_walk_applies_globs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        fs::write(dir.path().join("sub/b.md"), "beta").unwrap();
        fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let docs = load_documents(&[dir.path().to_path_buf()], &FilesConfig::default()).unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "sub/b.md"]);
        assert_eq!(docs[0].size(), 5);
    }

    #[test]
    fn test_globs_ignore_extension_case() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Paper.PDF"), b"%PDF-1.4").unwrap();
        fs::write(dir.path().join("NOTES.Txt"), "notes").unwrap();
        fs::write(dir.path().join("photo.PNG"), [0u8]).unwrap();

        let docs = load_documents(&[dir.path().to_path_buf()], &FilesConfig::default()).unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["NOTES.Txt", "Paper.PDF"]);
    }

    #[test]
    fn test_explicit_file_named_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        fs::write(&path, b"%PDF-1.4").unwrap();
        let docs = load_documents(&[path], &FilesConfig::default()).unwrap();
        assert_eq!(docs[0].name, "report.pdf");
    }

    #[test]
    fn test_missing_path_errors() {
        let err = load_documents(&[PathBuf::from("/no/such/file.pdf")], &FilesConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("No such file"));
    }
}
