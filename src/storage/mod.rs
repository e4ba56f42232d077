// Transient staging of uploaded reports

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_EXTENSION: &str = "pdf";

/// An uploaded document written to a unique path under the staging directory.
///
/// The file is removed when the value is dropped, whichever way the owning
/// scope exits. A failed removal is logged and otherwise ignored.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    /// Writes `data` to `<dir>/blood_test_report_<uuid>.<ext>`, creating `dir` if needed.
    ///
    /// The extension follows `original_name` when it has one.
    pub async fn write(dir: &Path, original_name: &str, data: &[u8]) -> std::io::Result<Self> {
        fs::create_dir_all(dir).await?;

        let path = dir.join(format!(
            "blood_test_report_{}.{}",
            Uuid::new_v4(),
            extension_for(original_name)
        ));
        // Take ownership before writing so a partial file is cleaned up too.
        let staged = Self { path };
        fs::write(&staged.path, data).await?;

        debug!(path = %staged.path.display(), bytes = data.len(), "Staged upload");
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed staged upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Cleanup error"),
        }
    }
}

fn extension_for(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_staged_file_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let staged = StagedFile::write(dir.path(), "report.pdf", b"%PDF-1.4").await.unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("uploads").join("today");
        let staged = StagedFile::write(&nested, "r.txt", b"hello").await.unwrap();
        assert!(staged.path().starts_with(&nested));
    }

    #[tokio::test]
    async fn test_paths_are_unique() {
        let dir = TempDir::new().unwrap();
        let a = StagedFile::write(dir.path(), "report.pdf", b"a").await.unwrap();
        let b = StagedFile::write(dir.path(), "report.pdf", b"b").await.unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn test_drop_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        let staged = StagedFile::write(dir.path(), "report.pdf", b"x").await.unwrap();
        std::fs::remove_file(staged.path()).unwrap();
        drop(staged);
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("report.PDF"), "pdf");
        assert_eq!(extension_for("labs.txt"), "txt");
        assert_eq!(extension_for("no_extension"), "pdf");
        assert_eq!(extension_for("weird.p d f"), "pdf");
        assert_eq!(extension_for(""), "pdf");
    }
}
