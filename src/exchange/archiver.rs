// ==========================================
// SAP Meter Exchange - Archiver
// ==========================================
// Moves a processed feed file into the archive directory so the next
// cycle cannot pick it up again. Keeps the original name; a name
// collision gets a timestamp suffix instead of overwriting.
// ==========================================

use crate::exchange::error::{ExchangeError, ExchangeResult};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct Archiver;

impl Archiver {
    /// Move `file` into `archive_dir`. Returns the destination path.
    pub fn archive(file: &Path, archive_dir: &Path) -> ExchangeResult<PathBuf> {
        let file_name = file
            .file_name()
            .ok_or_else(|| ExchangeError::ArchiveFailed {
                file: file.display().to_string(),
                message: "no file name".to_string(),
            })?;

        fs::create_dir_all(archive_dir).map_err(|e| ExchangeError::ArchiveFailed {
            file: file.display().to_string(),
            message: format!("cannot create archive dir: {e}"),
        })?;

        let mut dest = archive_dir.join(file_name);
        if dest.exists() {
            dest = Self::disambiguate(archive_dir, file);
        }

        // rename does not cross filesystems; fall back to copy+remove
        if fs::rename(file, &dest).is_err() {
            fs::copy(file, &dest).map_err(|e| ExchangeError::ArchiveFailed {
                file: file.display().to_string(),
                message: format!("copy failed: {e}"),
            })?;
            fs::remove_file(file).map_err(|e| ExchangeError::ArchiveFailed {
                file: file.display().to_string(),
                message: format!("source cleanup failed: {e}"),
            })?;
        }

        info!(file = %file.display(), dest = %dest.display(), "archived feed file");
        Ok(dest)
    }

    /// Collision policy: append an acquisition timestamp to the stem
    fn disambiguate(archive_dir: &Path, file: &Path) -> PathBuf {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        let ext = file
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let stamp = Utc::now().format("%Y%m%d%H%M%S%f");
        archive_dir.join(format!("{stem}_{stamp}{ext}"))
    }
}
