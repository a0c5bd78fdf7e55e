use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read \"{path}\": {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Source of raw asset bytes. The engine only sees blobs; where they
/// come from (filesystem, archive, network cache) is the caller's
/// concern.
pub trait BlobLoader {
    fn load_blob(&self, path: &str) -> Result<Vec<u8>, LoadError>;
}

pub struct FsLoader {
    pub root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BlobLoader for FsLoader {
    fn load_blob(&self, path: &str) -> Result<Vec<u8>, LoadError> {
        let full = self.root.join(path);
        log::debug!("loading blob {}", full.display());
        std::fs::read(&full).map_err(|source| LoadError::Io {
            path: full.display().to_string(),
            source,
        })
    }
}
