use dashmap::DashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

use crate::core::errors::{StorageError, StorageResult};
use crate::core::types::ResultId;
use crate::storage::clock::Clock;

/// Listing entry for a stored result image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub id: ResultId,
    pub modified: SystemTime,
}

/// Blocking key-value storage for display JPEGs.
///
/// Calls do synchronous I/O; async callers go through `spawn_blocking`.
pub trait ImageStorage: Send + Sync {
    fn save(&self, id: &ResultId, jpeg: &[u8]) -> StorageResult<()>;

    /// `Ok(None)` when nothing is stored under `id`
    fn load(&self, id: &ResultId) -> StorageResult<Option<Vec<u8>>>;

    fn modified(&self, id: &ResultId) -> StorageResult<Option<SystemTime>>;

    fn list(&self) -> StorageResult<Vec<StoredImage>>;

    /// `Ok(false)` when the image was already gone
    fn remove(&self, id: &ResultId) -> StorageResult<bool>;
}

/// `<dir>/<id>.jpg` files on the local filesystem
#[derive(Debug, Clone)]
pub struct DiskImageStorage {
    dir: PathBuf,
}

impl DiskImageStorage {
    /// Open (and create if needed) the results directory
    pub fn new(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(StorageError::DirectoryCreationFailed)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &ResultId) -> PathBuf {
        self.dir.join(id.file_name())
    }
}

impl ImageStorage for DiskImageStorage {
    fn save(&self, id: &ResultId, jpeg: &[u8]) -> StorageResult<()> {
        let path = self.path_for(id);
        fs::write(&path, jpeg).map_err(|source| StorageError::WriteFailed {
            path: path.display().to_string(),
            source,
        })
    }

    fn load(&self, id: &ResultId) -> StorageResult<Option<Vec<u8>>> {
        let path = self.path_for(id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::ReadFailed {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    fn modified(&self, id: &ResultId) -> StorageResult<Option<SystemTime>> {
        let path = self.path_for(id);
        match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => Ok(Some(modified)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::ReadFailed {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    fn list(&self) -> StorageResult<Vec<StoredImage>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StorageError::ListFailed {
            path: self.dir.display().to_string(),
            source,
        })?;

        let mut images = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jpg") {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| ResultId::parse(s).ok())
            else {
                continue;
            };
            // Files can vanish between read_dir and stat
            match entry.metadata() {
                Ok(meta) if meta.is_file() => match meta.modified() {
                    Ok(modified) => images.push(StoredImage { id, modified }),
                    Err(e) => warn!("No modification time for {}: {}", path.display(), e),
                },
                Ok(_) => {}
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(images)
    }

    fn remove(&self, id: &ResultId) -> StorageResult<bool> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::RemoveFailed {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

/// In-process image storage, timestamped with an injectable clock
pub struct MemoryImageStorage {
    images: DashMap<ResultId, (Vec<u8>, SystemTime)>,
    clock: Arc<dyn Clock>,
}

impl MemoryImageStorage {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            images: DashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ImageStorage for MemoryImageStorage {
    fn save(&self, id: &ResultId, jpeg: &[u8]) -> StorageResult<()> {
        self.images
            .insert(id.clone(), (jpeg.to_vec(), self.clock.now()));
        Ok(())
    }

    fn load(&self, id: &ResultId) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.images.get(id).map(|entry| entry.0.clone()))
    }

    fn modified(&self, id: &ResultId) -> StorageResult<Option<SystemTime>> {
        Ok(self.images.get(id).map(|entry| entry.1))
    }

    fn list(&self) -> StorageResult<Vec<StoredImage>> {
        Ok(self
            .images
            .iter()
            .map(|entry| StoredImage {
                id: entry.key().clone(),
                modified: entry.value().1,
            })
            .collect())
    }

    fn remove(&self, id: &ResultId) -> StorageResult<bool> {
        Ok(self.images.remove(id).is_some())
    }
}
