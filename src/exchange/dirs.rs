// ==========================================
// SAP Meter Exchange - Directory resolver
// ==========================================
// Two parallel exchange trees per entity:
//   production: {base}/DOWNLOAD/{ENTITY}_LIST
//   staging:    {base}/SEP_DOWNLOAD/{ENTITY}_LIST
// The staging_first flag decides the scan order; the first tier
// containing at least one matching file wins. Archive lives at
// {base}/DOWNLOAD/{ENTITY}_LIST_OLD regardless of tier.
// ==========================================

use crate::config::ImportConfig;
use crate::domain::types::{EntityKind, SourceTier};
use crate::exchange::error::ExchangeResult;
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Accepted feed file extensions (matched case-insensitively)
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["csv", "txt"];

// ==========================================
// DirectoryResolver
// ==========================================
pub struct DirectoryResolver {
    base: PathBuf,
    staging_first: bool,
    pattern: Pattern,
}

impl DirectoryResolver {
    pub fn new(config: &ImportConfig) -> ExchangeResult<Self> {
        let pattern = Pattern::new(&config.file_pattern)
            .map_err(|e| anyhow::anyhow!("invalid file pattern {:?}: {e}", config.file_pattern))?;
        Ok(Self {
            base: config.base_path.clone(),
            staging_first: config.staging_first,
            pattern,
        })
    }

    /// Candidate directories in scan order
    pub fn candidates(&self, entity: EntityKind) -> Vec<(SourceTier, PathBuf)> {
        let staging = (
            SourceTier::Staging,
            self.base.join("SEP_DOWNLOAD").join(entity.list_dir_name()),
        );
        let production = (
            SourceTier::Production,
            self.base.join("DOWNLOAD").join(entity.list_dir_name()),
        );

        if self.staging_first {
            vec![staging, production]
        } else {
            vec![production, staging]
        }
    }

    /// Archive directory for processed files of an entity
    pub fn archive_dir(&self, entity: EntityKind) -> PathBuf {
        self.base
            .join("DOWNLOAD")
            .join(format!("{}_OLD", entity.list_dir_name()))
    }

    /// First tier with at least one matching file, with its files
    /// sorted by name. None when no tier has matches (a no-op run,
    /// not an error).
    pub fn find_source(
        &self,
        entity: EntityKind,
    ) -> ExchangeResult<Option<(SourceTier, Vec<PathBuf>)>> {
        for (tier, dir) in self.candidates(entity) {
            let files = self.matching_files(&dir)?;
            if !files.is_empty() {
                debug!(entity = %entity, tier = %tier, dir = %dir.display(),
                       count = files.len(), "feed files found");
                return Ok(Some((tier, files)));
            }
        }
        Ok(None)
    }

    /// Files in one directory matching the configured glob and the
    /// allowed extension set. A missing directory yields no matches.
    fn matching_files(&self, dir: &Path) -> ExchangeResult<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::default()
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };

            let ext_ok = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| {
                    let lower = e.to_lowercase();
                    ALLOWED_EXTENSIONS.contains(&lower.as_str())
                })
                .unwrap_or(false);

            if ext_ok && self.pattern.matches_with(name, options) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}
