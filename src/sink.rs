//! Destinations for a finished report.

use crate::error::ReportError;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Accepts the bytes of a compiled report under a file name.
pub trait ExportSink: Send + Sync {
    /// Store `bytes` as `file_name` and return where they ended up.
    fn save(&self, bytes: &[u8], file_name: &str) -> Result<PathBuf, ReportError>;
}

/// Writes reports into a directory.
///
/// Uses atomic write (temp file + rename) so a crash never leaves a
/// half-written `.docx` behind.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ExportSink for FileSink {
    fn save(&self, bytes: &[u8], file_name: &str) -> Result<PathBuf, ReportError> {
        let path = self.dir.join(file_name);
        let failed = |source| ReportError::SaveFailed {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(failed)?;

        let tmp_path = self.dir.join(format!(".{file_name}.tmp"));
        std::fs::write(&tmp_path, bytes).map_err(failed)?;
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(failed(e));
        }

        info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

/// Keeps saved reports in memory. For tests and hosts that upload the bytes
/// themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    saved: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything saved so far, oldest first.
    pub fn saved(&self) -> Vec<(String, Vec<u8>)> {
        match self.saved.lock() {
            Ok(saved) => saved.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ExportSink for MemorySink {
    fn save(&self, bytes: &[u8], file_name: &str) -> Result<PathBuf, ReportError> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|_| ReportError::Internal("memory sink lock poisoned".into()))?;
        saved.push((file_name.to_string(), bytes.to_vec()));
        Ok(PathBuf::from(file_name))
    }
}
