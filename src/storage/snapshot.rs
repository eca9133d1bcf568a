use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use rkyv::rancor::Error as RkyvError;
use rkyv::to_bytes;
use tracing::{debug, info};

use super::error::{StorageError, StorageResult};
use super::mmap::MmapFileHandle;
use super::model::{ArchivedKnowledgeSnapshot, KnowledgeSnapshot, SNAPSHOT_VERSION};

pub const DEFAULT_SNAPSHOT_FILENAME: &str = "knowledge.rkyv";

const TEMP_SUFFIX: &str = "tmp";

#[derive(Debug, Clone)]
/// A snapshot file that is always replaced atomically.
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot named [`DEFAULT_SNAPSHOT_FILENAME`] inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DEFAULT_SNAPSHOT_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }

    /// Serializes `snapshot` to a temp file, syncs it, then renames over the target.
    ///
    /// Returns the number of bytes written.
    pub fn write(&self, snapshot: &KnowledgeSnapshot) -> StorageResult<usize> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|_| StorageError::StorageUnavailable {
                path: parent.to_path_buf(),
            })?;
        }

        let bytes = to_bytes::<RkyvError>(snapshot)
            .map_err(|e| StorageError::Serialization(format!("{:?}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;

        info!(
            path = %self.path.display(),
            records = snapshot.records.len(),
            bytes = bytes.len(),
            "Snapshot written"
        );
        Ok(bytes.len())
    }

    /// Loads the snapshot, or `None` when no snapshot has been written yet.
    pub fn load(&self) -> StorageResult<Option<KnowledgeSnapshot>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No snapshot to load");
            return Ok(None);
        }

        let handle = MmapFileHandle::open(&self.path)?;
        let archived = handle.access_archived::<ArchivedKnowledgeSnapshot>()?;

        let version = archived.version.to_native();
        if version != SNAPSHOT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                expected: SNAPSHOT_VERSION,
                found: version,
            });
        }

        let snapshot = rkyv::deserialize::<KnowledgeSnapshot, RkyvError>(archived)
            .map_err(|e| StorageError::Serialization(format!("{:?}", e)))?;

        debug!(
            path = %self.path.display(),
            records = snapshot.records.len(),
            "Snapshot loaded"
        );
        Ok(Some(snapshot))
    }
}
