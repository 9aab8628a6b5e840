use crate::snapshot::SnapshotError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage backend for encoded snapshot artifacts
///
/// Artifacts are addressed by file name. Calls are blocking; async callers
/// run them on the blocking pool.
pub trait SnapshotStore: Send + Sync {
    /// Stores an artifact under `name`, returning its address
    fn put(&self, name: &str, bytes: &[u8]) -> Result<String, SnapshotError>;

    /// Reads an artifact back
    fn get(&self, id: &str) -> Result<Vec<u8>, SnapshotError>;
}

/// Stores artifacts as files in one directory
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    dir: PathBuf,
}

impl FsSnapshotStore {
    /// Creates the store, creating `dir` if needed
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| SnapshotError::Write(format!("{}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, id: &str) -> Result<PathBuf, SnapshotError> {
        // Names are generated, but never let one escape the directory
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(SnapshotError::Write(format!("invalid artifact name: {}", id)));
        }
        Ok(self.dir.join(id))
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<String, SnapshotError> {
        let path = self.path_of(name)?;
        fs::write(&path, bytes)
            .map_err(|e| SnapshotError::Write(format!("{}: {}", path.display(), e)))?;
        Ok(name.to_string())
    }

    fn get(&self, id: &str) -> Result<Vec<u8>, SnapshotError> {
        let path = self.path_of(id)?;
        fs::read(&path).map_err(|e| SnapshotError::Write(format!("{}: {}", path.display(), e)))
    }
}

/// Keeps artifacts in memory; used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<String, SnapshotError> {
        let mut artifacts = self
            .artifacts
            .lock()
            .map_err(|_| SnapshotError::Write("snapshot store lock poisoned".to_string()))?;
        artifacts.insert(name.to_string(), bytes.to_vec());
        Ok(name.to_string())
    }

    fn get(&self, id: &str) -> Result<Vec<u8>, SnapshotError> {
        let artifacts = self
            .artifacts
            .lock()
            .map_err(|_| SnapshotError::Write("snapshot store lock poisoned".to_string()))?;
        artifacts
            .get(id)
            .cloned()
            .ok_or_else(|| SnapshotError::Write(format!("no artifact named {}", id)))
    }
}
