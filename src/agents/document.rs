// Report text extraction for the agent prompt

use std::path::Path;

use tracing::debug;

use crate::types::{AppError, AppResult};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Reads the report at `path` as plain text.
///
/// PDFs (detected by file name or header) go through `lopdf`; anything else is
/// decoded as UTF-8, replacing invalid sequences.
pub async fn load_report_text(path: &Path) -> AppResult<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        AppError::Document(format!("Failed to read report {}: {}", path.display(), e))
    })?;

    let text = if is_pdf(path, &bytes) {
        // lopdf is synchronous and can be slow on large files.
        tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
            .await
            .map_err(|e| AppError::Document(format!("PDF extraction aborted: {}", e)))??
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    };

    debug!(path = %path.display(), chars = text.len(), "Loaded report text");
    Ok(text)
}

fn is_pdf(path: &Path, bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
        || mime_guess::from_path(path).first_raw() == Some(mime::APPLICATION_PDF.essence_str())
}

pub fn extract_pdf_text(bytes: &[u8]) -> AppResult<String> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| AppError::Document(format!("Invalid PDF: {}", e)))?;

    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Ok(String::new());
    }

    let text = document
        .extract_text(&pages)
        .map_err(|e| AppError::Document(format!("Failed to extract PDF text: {}", e)))?;

    Ok(normalize_whitespace(&text))
}

/// Collapses runs of blank lines and trims trailing spaces.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

/// Cuts `text` to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}
