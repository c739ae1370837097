//! Document loader.
//!
//! Walks the configured documents directory and turns every supported file
//! into a [`DocumentUnit`]. Loading is best-effort: unsupported, unreadable
//! or empty files are logged and skipped, and a missing directory is created
//! empty.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::DocsConfig;
use crate::error::PipelineError;
use crate::extract::{extract_text, is_extractable};
use crate::models::DocumentUnit;

/// Load every supported document under `docs.dir`, sorted by relative path.
///
/// Only errors that make the directory itself unusable (it cannot be created,
/// or an exclude glob is invalid) are returned. Per-file failures are logged.
pub fn load_documents(docs: &DocsConfig) -> Result<Vec<DocumentUnit>> {
    let root = &docs.dir;
    if !root.exists() {
        tracing::warn!(
            "Documents directory '{}' does not exist, creating it empty",
            root.display()
        );
        std::fs::create_dir_all(root)?;
        return Ok(Vec::new());
    }

    let extensions: Vec<String> = docs
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/.*".to_string()];
    default_excludes.extend(docs.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut units = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !extensions.contains(&extension) || !is_extractable(&extension) {
            tracing::warn!("Unsupported file type for {}, skipping", rel_str);
            continue;
        }

        match load_file(path, &extension) {
            Ok(text) if text.trim().is_empty() => {
                tracing::warn!("No text extracted from {}, skipping", rel_str);
            }
            Ok(text) => {
                tracing::debug!("Loaded {} ({} chars)", rel_str, text.chars().count());
                units.push(DocumentUnit {
                    source_path: rel_str,
                    raw_text: text,
                });
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    units.sort_by(|a, b| a.source_path.cmp(&b.source_path));
    tracing::info!("Loaded {} documents from {}", units.len(), root.display());

    Ok(units)
}

fn load_file(path: &Path, extension: &str) -> Result<String, PipelineError> {
    let bytes = std::fs::read(path).map_err(|e| PipelineError::DocumentLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    extract_text(&bytes, extension).map_err(|e| PipelineError::DocumentLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn docs_config(dir: &Path) -> DocsConfig {
        DocsConfig {
            dir: dir.to_path_buf(),
            ..DocsConfig::default()
        }
    }

    #[test]
    fn test_missing_directory_is_created_empty() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("docs");

        let units = load_documents(&docs_config(&dir)).unwrap();

        assert!(units.is_empty());
        assert!(dir.is_dir());
    }

    #[test]
    fn test_loads_supported_files_in_sorted_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.md"), "Beta notes").unwrap();
        fs::write(tmp.path().join("a.txt"), "Alpha notes").unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/c.md"), "Gamma notes").unwrap();

        let units = load_documents(&docs_config(tmp.path())).unwrap();

        let paths: Vec<&str> = units.iter().map(|u| u.source_path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.md", "sub/c.md"]);
        assert_eq!(units[0].raw_text, "Alpha notes");
    }

    #[test]
    fn test_unsupported_extension_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.md"), "Kept").unwrap();
        fs::write(tmp.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let units = load_documents(&docs_config(tmp.path())).unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].source_path, "notes.md");
    }

    #[test]
    fn test_broken_file_does_not_abort_loading() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("broken.pdf"), b"not a pdf").unwrap();
        fs::write(tmp.path().join("ok.txt"), "Still loaded").unwrap();

        let units = load_documents(&docs_config(tmp.path())).unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].raw_text, "Still loaded");
    }

    /// A structurally valid PDF whose only font has an unknown subtype.
    fn pdf_with_bogus_font() -> Vec<u8> {
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
                .to_string(),
            "<< /Type /Font /Subtype /Bogus /BaseFont /Helvetica >>".to_string(),
            {
                let content = "BT /F1 12 Tf 72 712 Td (Hello) Tj ET";
                format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content)
            },
        ];
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_at = pdf.len();
        pdf.extend_from_slice(
            format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes(),
        );
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_at
            )
            .as_bytes(),
        );
        pdf
    }

    #[test]
    fn test_malformed_pdf_font_does_not_abort_loading() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("bad_font.pdf"), pdf_with_bogus_font()).unwrap();
        fs::write(tmp.path().join("z_ok.txt"), "Loaded after the bad PDF").unwrap();

        let units = load_documents(&docs_config(tmp.path())).unwrap();

        let ok = units.iter().find(|u| u.source_path == "z_ok.txt").unwrap();
        assert_eq!(ok.raw_text, "Loaded after the bad PDF");
    }

    #[test]
    fn test_extension_filter_respects_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "markdown").unwrap();
        fs::write(tmp.path().join("b.txt"), "text").unwrap();
        let config = DocsConfig {
            dir: tmp.path().to_path_buf(),
            extensions: vec![".MD".to_string()],
            exclude_globs: Vec::new(),
        };

        let units = load_documents(&config).unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].source_path, "a.md");
    }
}
