// Timestamped copies of the state documents.
//
// Each backup is a directory `backup_<reason>_<YYYYmmdd_HHMMSS>` holding
// whichever documents existed at the time. Only the newest `max_backups`
// directories are kept.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::store::StateStore;

pub struct BackupManager {
    store: StateStore,
    directory: PathBuf,
    max_backups: usize,
}

impl BackupManager {
    pub fn new(store: StateStore, directory: PathBuf, max_backups: usize) -> Self {
        Self {
            store,
            directory,
            max_backups: max_backups.max(1),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Copy the current documents into a fresh backup directory.
    ///
    /// Returns `Ok(None)` when there was nothing to back up.
    pub fn create_backup(&self, reason: &str) -> Result<Option<PathBuf>, CoreError> {
        let files = self.store.existing_files();
        if files.is_empty() {
            warn!(reason, "no state documents to back up");
            return Ok(None);
        }

        let target = self.unique_target(reason);
        fs::create_dir_all(&target).map_err(|e| storage(&target, &e))?;

        for file in &files {
            let Some(name) = file.file_name() else { continue };
            fs::copy(file, target.join(name)).map_err(|e| storage(file, &e))?;
        }

        info!(reason, path = %target.display(), files = files.len(), "backup created");
        self.prune();
        Ok(Some(target))
    }

    /// Existing backup directories, newest first.
    pub fn list(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.directory) else {
            return Vec::new();
        };

        let mut dirs: Vec<(SystemTime, PathBuf)> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("backup_"))
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .map(|e| {
                let modified = e
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, e.path())
            })
            .collect();

        dirs.sort_by(|a, b| b.cmp(a));
        dirs.into_iter().map(|(_, p)| p).collect()
    }

    fn unique_target(&self, reason: &str) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let base = format!("backup_{reason}_{stamp}");
        let mut candidate = self.directory.join(&base);
        let mut n = 1;
        while candidate.exists() {
            candidate = self.directory.join(format!("{base}_{n}"));
            n += 1;
        }
        candidate
    }

    fn prune(&self) {
        for stale in self.list().into_iter().skip(self.max_backups) {
            match fs::remove_dir_all(&stale) {
                Ok(()) => info!(path = %stale.display(), "removed old backup"),
                Err(e) => warn!(path = %stale.display(), error = %e, "could not remove old backup"),
            }
        }
    }
}

fn storage(path: &Path, err: &std::io::Error) -> CoreError {
    CoreError::Storage {
        message: format!("{}: {err}", path.display()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::store::LastPresence;

    fn setup(max: usize) -> (tempfile::TempDir, StateStore, BackupManager) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(StorageConfig {
            data_dir: dir.path().to_path_buf(),
            ..StorageConfig::default()
        })
        .unwrap();
        let manager = BackupManager::new(store.clone(), dir.path().join("backups"), max);
        (dir, store, manager)
    }

    #[test]
    fn nothing_to_back_up() {
        let (_dir, _store, manager) = setup(3);
        assert!(manager.create_backup("manual").unwrap().is_none());
    }

    #[test]
    fn backup_copies_existing_documents() {
        let (_dir, store, manager) = setup(3);
        let mut presence = LastPresence::default();
        presence.by_entity.insert(1, 2);
        assert!(store.save(&presence));

        let path = manager.create_backup("manual").unwrap().unwrap();
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("backup_manual_")
        );
        assert!(path.join("last_presence.json").exists());
        assert!(!path.join("guild_data.json").exists());
    }

    #[test]
    fn old_backups_are_pruned() {
        let (_dir, store, manager) = setup(2);
        assert!(store.save(&LastPresence::default()));

        for _ in 0..4 {
            manager.create_backup("scheduled").unwrap();
        }
        assert_eq!(manager.list().len(), 2);
    }
}
