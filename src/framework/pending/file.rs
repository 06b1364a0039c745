use super::{PendingRequest, PendingStore};
use crate::framework::core::{RequestId, StoreError, TabId};
use async_trait::async_trait;
use log::{debug, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use uuid::Uuid;

const ENTRY_EXTENSION: &str = ".json";

/// Longest hex stem used verbatim; longer identifiers get a hashed stem
const MAX_HEX_STEM: usize = 128;

/// Identifier bytes kept readable in front of a hashed stem
const HASHED_PREFIX_BYTES: usize = 32;

/// Durable pending store: one JSON file per outstanding identifier.
///
/// File stems are the hex-encoded identifier, so arbitrary identifier text
/// maps to a safe file name. Identifiers too long for that are stored under
/// a hex prefix plus a name-based UUID of the whole identifier, and are read
/// back from the entry itself. Writes land in a unique temp file and are
/// renamed into place, which makes each put an atomic replacement.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub async fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::WriteError(format!("create {}: {}", dir.display(), e)))?;
        debug!("FileStore: opened {}", dir.display());
        Ok(Self { dir })
    }

    /// Store scoped to a single tab under `root`
    pub async fn for_tab<P: AsRef<Path>>(root: P, tab_id: TabId) -> Result<Self, StoreError> {
        Self::open(root.as_ref().join(format!("tab-{}", tab_id))).await
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_stem(identifier: &RequestId) -> String {
        let bytes = identifier.as_str().as_bytes();
        let stem = hex::encode(bytes);
        if stem.len() <= MAX_HEX_STEM {
            return stem;
        }
        let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, bytes);
        format!(
            "{}-{}",
            hex::encode(&bytes[..HASHED_PREFIX_BYTES]),
            digest.simple()
        )
    }

    fn entry_path(&self, identifier: &RequestId) -> PathBuf {
        self.dir
            .join(format!("{}{}", Self::entry_stem(identifier), ENTRY_EXTENSION))
    }

    /// Identifier encoded in a plain hex stem; `None` for hashed stems
    fn identifier_from_stem(stem: &str) -> Option<RequestId> {
        let bytes = hex::decode(stem).ok()?;
        String::from_utf8(bytes).ok().map(RequestId::new)
    }

    async fn read_entry(path: &Path) -> Result<PendingRequest, StoreError> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| StoreError::ReadError(format!("{}: {}", path.display(), e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Paths of all committed entry files, skipping in-flight temp files
    async fn entry_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::ReadError(format!("{}: {}", self.dir.display(), e)))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::ReadError(e.to_string()))?
        {
            let path = entry.path();
            let is_entry = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(ENTRY_EXTENSION));
            if is_entry {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Last modification time of a file, in epoch milliseconds
    async fn modified_ms(path: &Path) -> Option<u64> {
        let modified = fs::metadata(path).await.ok()?.modified().ok()?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
        Some(since_epoch.as_millis() as u64)
    }
}

fn file_stem(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()?.strip_suffix(ENTRY_EXTENSION)
}

#[async_trait]
impl PendingStore for FileStore {
    async fn put(&self, request: &PendingRequest) -> Result<(), StoreError> {
        let path = self.entry_path(&request.identifier);
        let temp = self.dir.join(format!(
            "{}.{}.tmp",
            Self::entry_stem(&request.identifier),
            Uuid::new_v4()
        ));
        let bytes = serde_json::to_vec(request)?;

        fs::write(&temp, bytes)
            .await
            .map_err(|e| StoreError::WriteError(format!("{}: {}", temp.display(), e)))?;

        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StoreError::WriteError(format!("{}: {}", path.display(), e)));
        }
        Ok(())
    }

    async fn get(&self, identifier: &RequestId) -> Result<Option<PendingRequest>, StoreError> {
        let path = self.entry_path(identifier);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::ReadError(format!("{}: {}", path.display(), e))),
        }
    }

    async fn remove(&self, identifier: &RequestId) -> Result<(), StoreError> {
        let path = self.entry_path(identifier);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::WriteError(format!("{}: {}", path.display(), e))),
        }
    }

    async fn identifiers(&self) -> Result<Vec<RequestId>, StoreError> {
        let mut identifiers = Vec::new();
        for path in self.entry_paths().await? {
            if let Some(identifier) = file_stem(&path).and_then(Self::identifier_from_stem) {
                identifiers.push(identifier);
                continue;
            }
            match Self::read_entry(&path).await {
                Ok(request) => identifiers.push(request.identifier),
                Err(e) => warn!("FileStore: skipping unreadable entry: {}", e),
            }
        }
        Ok(identifiers)
    }

    /// Unreadable entries are aged by their file's modification time and
    /// removed once they fall behind the cutoff.
    async fn evict_older_than(&self, cutoff_ms: u64) -> Result<Vec<RequestId>, StoreError> {
        let mut evicted = Vec::new();
        for path in self.entry_paths().await? {
            let (identifier, stored_at_ms) = match Self::read_entry(&path).await {
                Ok(request) => (Some(request.identifier), Some(request.stored_at_ms)),
                Err(e) => {
                    warn!("FileStore: unreadable entry {}: {}", path.display(), e);
                    let identifier = file_stem(&path).and_then(Self::identifier_from_stem);
                    (identifier, Self::modified_ms(&path).await)
                }
            };

            if !stored_at_ms.is_some_and(|at| at < cutoff_ms) {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("FileStore: cannot evict {}: {}", path.display(), e);
                    continue;
                }
            }
            match identifier {
                Some(identifier) => evicted.push(identifier),
                None => warn!("FileStore: evicted unreadable entry {}", path.display()),
            }
        }
        Ok(evicted)
    }

    fn name(&self) -> &str {
        "file"
    }
}
