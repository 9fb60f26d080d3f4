//! File-based blob storage.
//!
//! Stores one file per unique content hash with a 2-level fan-out directory
//! structure: `{base}/data/{hex[0..2]}/{hex[2..4]}/{hex}`.

use std::path::{Path, PathBuf};

use depot_types::FileHash;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::StoreError;

/// Directory under the base path holding committed blobs.
const DATA_DIR: &str = "data";

/// Directory under the base path holding in-flight uploads.
const TMP_DIR: &str = "tmp";

/// File-based blob store with 2-level fan-out directory layout.
///
/// Each blob lives at `{base}/data/{hex[0..2]}/{hex[2..4]}/{hex}` where `hex`
/// is the canonical lowercase form of its hash. Two uploads of identical
/// bytes resolve to the same path; there is no other de-duplication and no
/// locking.
///
/// Writes go through [`PendingBlob`]: bytes land in a uniquely named file
/// under `{base}/tmp` and are renamed into place once the hash is known.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `base_dir`.
    ///
    /// The `data` and `tmp` directories are created if they do not exist.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(base_dir.join(DATA_DIR))?;
        std::fs::create_dir_all(base_dir.join(TMP_DIR))?;
        Ok(Self { base_dir })
    }

    /// Root directory of this store.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Compute the full file path for a hash.
    pub fn path_for(&self, hash: &FileHash) -> PathBuf {
        let hex = hash.to_hex();
        self.base_dir
            .join(DATA_DIR)
            .join(&hex[0..2])
            .join(&hex[2..4])
            .join(&hex)
    }

    /// Check whether a blob is stored under `hash`.
    pub async fn exists(&self, hash: &FileHash) -> Result<bool, StoreError> {
        match tokio::fs::metadata(self.path_for(hash)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Open a stored blob for streamed reading, returning the handle and its size.
    ///
    /// A directory or other non-file at the blob path is
    /// [`StoreError::NotAFile`], never a readable blob.
    pub async fn open(&self, hash: &FileHash) -> Result<(File, u64), StoreError> {
        let path = self.path_for(hash);
        let file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(*hash));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(StoreError::NotAFile(*hash));
        }
        Ok((file, meta.len()))
    }

    /// Start writing a blob whose hash is not yet known.
    pub async fn begin_write(&self) -> Result<PendingBlob, StoreError> {
        let name = format!("{:016x}.tmp", rand::random::<u64>());
        let tmp_path = self.base_dir.join(TMP_DIR).join(name);
        let file = File::create(&tmp_path).await?;
        Ok(PendingBlob {
            file,
            tmp_path,
            store: self.clone(),
        })
    }
}

/// An in-flight upload.
///
/// Write the body through [`file_mut`](Self::file_mut), then either
/// [`commit`](Self::commit) it under its computed hash or
/// [`discard`](Self::discard) it.
#[derive(Debug)]
pub struct PendingBlob {
    file: File,
    tmp_path: PathBuf,
    store: FileStore,
}

impl PendingBlob {
    /// Writable handle on the temporary file.
    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Move the written bytes to the path of `hash`.
    ///
    /// Overwrites an existing blob with the same hash; since the content is
    /// identical by construction the end state is unchanged.
    ///
    /// On failure the temporary file is removed.
    pub async fn commit(self, hash: &FileHash) -> Result<PathBuf, StoreError> {
        let Self {
            file,
            tmp_path,
            store,
        } = self;
        let path = store.path_for(hash);

        if let Err(e) = persist(file, &tmp_path, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                warn!(path = %tmp_path.display(), %cleanup, "failed to remove partial upload");
            }
            return Err(StoreError::Io(e));
        }

        debug!(%hash, path = %path.display(), "committed blob");
        Ok(path)
    }

    /// Drop the partial upload.
    pub async fn discard(self) {
        drop(self.file);
        if let Err(e) = tokio::fs::remove_file(&self.tmp_path).await {
            warn!(path = %self.tmp_path.display(), %e, "failed to remove partial upload");
        }
    }
}

/// Flush `file` to disk and rename `tmp_path` over `path`.
async fn persist(mut file: File, tmp_path: &Path, path: &Path) -> std::io::Result<()> {
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::rename(tmp_path, path).await
}
