// ── Persistent state ──
//
// JSON documents on local disk, written atomically: temp file, fsync,
// rename over the target. The previous good file is kept as `.backup`.
// A document that cannot be read is archived as `.corrupted_<unix ts>`
// and replaced by an empty one so the loops keep running.
//
// Other processes (the CLI) may write the same files. A [`FileStamp`]
// taken after each load and save lets the owner notice such writes.

mod documents;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::Value;
use strum::IntoEnumIterator;
use tracing::{debug, error, info, warn};

pub use documents::{Document, DocumentKind, KnownBadges, LastPresence, TenantsDocument};

use crate::config::StorageConfig;
use crate::error::CoreError;

/// Size and modification time of a document file as last seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

/// Loads and saves the state documents under one data directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    config: StorageConfig,
}

impl StateStore {
    /// Open the store, creating the data directory if needed.
    ///
    /// Fails if the directory cannot be created or written to; the engine
    /// refuses to start without somewhere to persist state.
    pub fn open(config: StorageConfig) -> Result<Self, CoreError> {
        fs::create_dir_all(&config.data_dir).map_err(|e| CoreError::Config {
            message: format!(
                "cannot create data directory {}: {e}",
                config.data_dir.display()
            ),
        })?;

        let marker = config.data_dir.join(".rbxwatch-write-test");
        fs::write(&marker, b"ok")
            .and_then(|()| fs::remove_file(&marker))
            .map_err(|e| CoreError::Config {
                message: format!(
                    "data directory {} is not writable: {e}",
                    config.data_dir.display()
                ),
            })?;

        Ok(Self { config })
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn path(&self, kind: DocumentKind) -> PathBuf {
        let name = match kind {
            DocumentKind::Tenants => &self.config.tenants_file,
            DocumentKind::KnownBadges => &self.config.known_badges_file,
            DocumentKind::LastPresence => &self.config.last_presence_file,
        };
        self.config.data_dir.join(name)
    }

    /// Load a document. Missing files give an empty document; unreadable
    /// ones are archived first.
    pub fn load<D: Document>(&self) -> D {
        let path = self.path(D::KIND);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(document = %D::KIND, "no file yet, starting empty");
                return D::default();
            }
            Err(e) => {
                error!(document = %D::KIND, error = %e, "cannot read document");
                archive_corrupted(&path);
                return D::default();
            }
        };

        let value = match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => value,
            Err(e) => {
                error!(document = %D::KIND, error = %e, "document is not valid JSON");
                archive_corrupted(&path);
                return D::default();
            }
        };

        D::from_json(value).unwrap_or_else(|| {
            error!(document = %D::KIND, "document is not a JSON object");
            archive_corrupted(&path);
            D::default()
        })
    }

    /// Current stamp of a document file; `None` if it does not exist.
    pub fn stamp(&self, kind: DocumentKind) -> Option<FileStamp> {
        let meta = fs::metadata(self.path(kind)).ok()?;
        Some(FileStamp {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }

    /// Persist a document atomically. Returns `false` (and logs) on
    /// failure; the caller's in-memory copy stays authoritative.
    pub fn save<D: Document>(&self, doc: &D) -> bool {
        let path = self.path(D::KIND);
        match write_atomic(&path, doc) {
            Ok(()) => {
                debug!(document = %D::KIND, "saved");
                true
            }
            Err(e) => {
                error!(document = %D::KIND, path = %path.display(), error = %e, "save failed");
                false
            }
        }
    }

    /// Paths of the document files that currently exist.
    pub fn existing_files(&self) -> Vec<PathBuf> {
        DocumentKind::iter()
            .map(|kind| self.path(kind))
            .filter(|p| p.exists())
            .collect()
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

fn write_atomic<T: serde::Serialize>(path: &Path, doc: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(doc).map_err(io::Error::other)?;

    if path.exists() {
        if let Err(e) = fs::copy(path, sibling(path, ".backup")) {
            warn!(path = %path.display(), error = %e, "could not refresh .backup copy");
        }
    }

    let tmp = sibling(path, ".tmp");
    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        clear_target(path)?;
        fs::rename(&tmp, path)?;
        sync_parent(path);
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Platforms without replace-on-rename need the target gone first; the
/// short window without a live file is accepted.
#[cfg(windows)]
fn clear_target(path: &Path) -> io::Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(not(windows))]
#[allow(clippy::unnecessary_wraps)]
fn clear_target(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Flush the directory entry so the rename survives a power loss.
#[cfg(unix)]
fn sync_parent(path: &Path) {
    let Some(dir) = path.parent() else {
        return;
    };
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!(dir = %dir.display(), error = %e, "could not sync data directory");
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}

fn archive_corrupted(path: &Path) {
    let stamp = chrono::Utc::now().timestamp();
    let target = sibling(path, &format!(".corrupted_{stamp}"));
    match fs::rename(path, &target) {
        Ok(()) => info!(archived = %target.display(), "archived unreadable document"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not archive unreadable document"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Tenant, TrackedEntity};

    fn store(dir: &Path) -> StateStore {
        StateStore::open(StorageConfig {
            data_dir: dir.to_path_buf(),
            ..StorageConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert_eq!(store.load::<KnownBadges>(), KnownBadges::default());
        assert_eq!(store.load::<TenantsDocument>(), TenantsDocument::default());
    }

    #[test]
    fn save_then_load_preserves_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let mut tenants = TenantsDocument::default();
        let mut tenant = Tenant::default();
        tenant.tracked_entities.insert(156, TrackedEntity::new("builderman", 1));
        tenant.config.notification_destination = Some(99);
        tenants.tenants.insert(7, tenant);

        let mut badges = KnownBadges::default();
        badges.by_entity.insert(156, BTreeSet::from([1, 2]));

        assert!(store.save(&tenants));
        assert!(store.save(&badges));

        assert_eq!(store.load::<TenantsDocument>(), tenants);
        assert_eq!(store.load::<KnownBadges>(), badges);
        assert_eq!(store.existing_files().len(), 2);
    }

    #[test]
    fn save_keeps_previous_file_as_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let mut presence = LastPresence::default();
        presence.by_entity.insert(1, 1);
        assert!(store.save(&presence));
        presence.by_entity.insert(1, 0);
        assert!(store.save(&presence));

        let backup = sibling(&store.path(DocumentKind::LastPresence), ".backup");
        let old: serde_json::Value =
            serde_json::from_slice(&fs::read(backup).unwrap()).unwrap();
        assert_eq!(old["1"], 1);
        assert!(!sibling(&store.path(DocumentKind::LastPresence), ".tmp").exists());
    }

    #[test]
    fn corrupted_file_is_archived_and_replaced_by_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let path = store.path(DocumentKind::KnownBadges);
        fs::write(&path, b"{\"156\": [1, 2").unwrap();

        let loaded = store.load::<KnownBadges>();
        assert!(loaded.by_entity.is_empty());
        assert!(!path.exists());

        let archived: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupted_"))
            .collect();
        assert_eq!(archived.len(), 1);
        assert_eq!(fs::read(archived[0].path()).unwrap(), b"{\"156\": [1, 2");
    }

    #[test]
    fn non_object_document_is_archived_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let path = store.path(DocumentKind::KnownBadges);
        fs::write(&path, b"[[156,[1,2,3]]]").unwrap();

        assert!(store.load::<KnownBadges>().by_entity.is_empty());
        assert!(!path.exists());

        // Two saves would have rotated the original out of `.backup`.
        assert!(store.save(&KnownBadges::default()));
        assert!(store.save(&KnownBadges::default()));

        let archived: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupted_"))
            .collect();
        assert_eq!(archived.len(), 1);
        assert_eq!(fs::read(archived[0].path()).unwrap(), b"[[156,[1,2,3]]]");
    }

    #[test]
    fn stamp_tracks_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert_eq!(store.stamp(DocumentKind::Tenants), None);

        let mut tenants = TenantsDocument::default();
        assert!(store.save(&tenants));
        let first = store.stamp(DocumentKind::Tenants).unwrap();
        assert_eq!(store.stamp(DocumentKind::Tenants), Some(first));

        tenants.tenants.insert(7, Tenant::default());
        assert!(store.save(&tenants));
        assert_ne!(store.stamp(DocumentKind::Tenants), Some(first));
    }

    #[test]
    fn unwritable_directory_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        // Replace the target with a directory so the rename must fail.
        fs::create_dir(store.path(DocumentKind::LastPresence)).unwrap();
        fs::write(
            store.path(DocumentKind::LastPresence).join("child"),
            b"x",
        )
        .unwrap();

        assert!(!store.save(&LastPresence::default()));
    }
}
