//! Content-addressed blob store.
//!
//! Holds everything too large for the primary store: offloaded session
//! fields, rendered PDFs, extracted photos. Keys are container-style paths
//! (`cv-pdfs/{session_id}/{kind}_{signature}.pdf`); because names carry a
//! content hash, concurrent writers colliding on a key write identical bytes.

use std::path::{Path, PathBuf};

use cvt_domain::error::{Error, Result};

/// Narrow blob interface; the orchestrator never needs anything richer.
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
    fn get(&self, key: &str) -> Result<Vec<u8>>;
    fn exists(&self, key: &str) -> bool;
    /// Remove every blob under a `{container}/{session_id}` prefix. Returns
    /// the number of files removed.
    fn delete_prefix(&self, prefix: &str) -> Result<usize>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Filesystem implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Blob store rooted at `{state_path}/blobs/`.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(state_path: &Path) -> Result<Self> {
        let root = state_path.join("blobs");
        std::fs::create_dir_all(&root).map_err(Error::Io)?;
        Ok(Self { root })
    }

    /// Map a blob key to a filesystem path, refusing traversal segments.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
        {
            return Err(Error::Other(format!("invalid blob key: {key}")));
        }
        Ok(self.root.join(key))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        std::fs::write(&path, bytes).map_err(Error::Io)?;
        tracing::debug!(key, bytes = bytes.len(), "blob written");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("blob {key}")))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let dir = self.path_for(prefix)?;
        if !dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in std::fs::read_dir(&dir).map_err(Error::Io)? {
            let entry = entry.map_err(Error::Io)?;
            if entry.file_type().map_err(Error::Io)?.is_file() {
                std::fs::remove_file(entry.path()).map_err(Error::Io)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).unwrap();
        store.put("cv-pdfs/s1/cv_abc.pdf", b"%PDF-").unwrap();
        assert!(store.exists("cv-pdfs/s1/cv_abc.pdf"));
        assert_eq!(store.get("cv-pdfs/s1/cv_abc.pdf").unwrap(), b"%PDF-");
    }

    #[test]
    fn missing_blob_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.get("cv-artifacts/s1/nope.json"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn traversal_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).unwrap();
        assert!(store.put("../evil", b"x").is_err());
        assert!(store.put("a//b", b"x").is_err());
    }

    #[test]
    fn delete_prefix_clears_session_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).unwrap();
        store.put("cv-artifacts/s1/a.json", b"1").unwrap();
        store.put("cv-artifacts/s1/b.json", b"2").unwrap();
        assert_eq!(store.delete_prefix("cv-artifacts/s1").unwrap(), 2);
        assert!(!store.exists("cv-artifacts/s1/a.json"));
    }
}
