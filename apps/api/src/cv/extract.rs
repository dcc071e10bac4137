use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("resume not found or unreadable: {0}")]
    NotFoundOrUnreadable(String),
}

/// Converts a stored document into plain text.
///
/// Carried in `AppState` as `Arc<dyn TextExtractor>`.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// PDF extractor backed by `pdf-extract`. Parsing is CPU-bound and runs on
/// the blocking pool.
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        debug!("Extracting resume text from {}", path.display());

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ExtractError::NotFoundOrUnreadable(format!("{}: {e}", path.display()))
        })?;

        // pdf-extract panics on some malformed inputs; the join error covers that.
        let parsed = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| {
                warn!("PDF parser aborted on {}: {e}", path.display());
                ExtractError::NotFoundOrUnreadable(format!("{}: parser aborted", path.display()))
            })?
            .map_err(|e| ExtractError::NotFoundOrUnreadable(format!("{}: {e}", path.display())))?;

        Ok(normalize_whitespace(&parsed))
    }
}

/// Collapses the layout noise PDF text extraction leaves behind:
/// tab/CR/space runs become one space, three or more consecutive newlines
/// become two, and the result is trimmed.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space_run = false;
    let mut newline_run = 0usize;

    for c in text.chars() {
        match c {
            ' ' | '\t' | '\r' => {
                newline_run = 0;
                if !in_space_run {
                    out.push(' ');
                }
                in_space_run = true;
            }
            '\n' => {
                in_space_run = false;
                if newline_run < 2 {
                    out.push('\n');
                }
                newline_run += 1;
            }
            _ => {
                in_space_run = false;
                newline_run = 0;
                out.push(c);
            }
        }
    }

    out.trim().to_string()
}
