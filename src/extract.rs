//! Text extraction for source files.
//!
//! The loader hands over raw bytes and a lowercased file extension; this
//! module returns plain UTF-8 text or an [`ExtractError`]. Extraction never
//! panics: a parser panic on a malformed PDF is caught and reported as
//! [`ExtractError::Pdf`], so the loader skips that one file.

use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: .{0}")]
    UnsupportedExtension(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("file is not valid UTF-8 text")]
    NotUtf8,
}

/// Returns true if [`extract_text`] knows how to read files with this extension.
pub fn is_extractable(extension: &str) -> bool {
    matches!(extension, "pdf" | "md" | "markdown" | "txt" | "text")
}

/// Extracts plain text from file contents based on the file extension.
pub fn extract_text(bytes: &[u8], extension: &str) -> Result<String, ExtractError> {
    match extension {
        "pdf" => extract_pdf(bytes),
        "md" | "markdown" | "txt" | "text" => {
            String::from_utf8(bytes.to_vec()).map_err(|_| ExtractError::NotUtf8)
        }
        other => Err(ExtractError::UnsupportedExtension(other.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed font and encoding dictionaries.
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
        Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            Err(ExtractError::Pdf(format!("parser panicked: {}", detail)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passthrough() {
        let text = extract_text("Hello\nworld".as_bytes(), "txt").unwrap();
        assert_eq!(text, "Hello\nworld");
    }

    #[test]
    fn test_unsupported_extension() {
        let err = extract_text(b"foo", "docx").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedExtension(ref e) if e == "docx"));
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let err = extract_text(&[0xff, 0xfe, 0xfd], "md").unwrap_err();
        assert!(matches!(err, ExtractError::NotUtf8));
    }

    #[test]
    fn test_corrupt_pdf_is_error_not_panic() {
        let err = extract_text(b"not a pdf", "pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }
}
