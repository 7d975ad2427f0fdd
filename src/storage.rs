//! Upload of backup artifacts to object storage.
//!
//! [ObjectStorage] drives any [ObjectStore] (S3 in production) from blocking
//! code by owning a small current-thread runtime.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use derive_more::{Display, Error, From};
use object_store::aws::AmazonS3Builder;
use object_store::buffered::BufWriter;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tokio::io::AsyncWriteExt;
use tokio::runtime::{Builder, Runtime};
use walkdir::WalkDir;

use crate::config::StorageCredentials;

/// Errors on uploading to the object storage.
#[derive(Debug, Display, Error, From)]
pub enum StorageError {
    /// Setting up the storage client failed.
    #[display("Configuring the object store failed: {_0}")]
    #[from]
    Client(object_store::Error),
    /// The async runtime driving the client couldn't be started.
    #[display("Starting the storage runtime failed: {_0}")]
    Runtime(io::Error),
    /// A local file couldn't be opened.
    #[display("Reading {} failed: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    /// Traversing a local directory failed.
    #[display("Walking the source directory failed: {_0}")]
    #[from]
    Walk(walkdir::Error),
    /// The key isn't a valid object path, e.g. it contains control characters.
    #[display("Invalid object key: {_0}")]
    #[from]
    InvalidKey(object_store::path::Error),
    /// Writing the object failed.
    #[display("Uploading {key} failed: {source}")]
    Upload { key: String, source: io::Error },
}

/// Object storage as seen by the backups.
pub trait Storage {
    /// Stores the contents of `file` at `key`, replacing any existing object.
    fn put_file(&self, key: &str, file: &Path) -> Result<(), StorageError>;

    /// Uploads every regular file below `source` to `<prefix>/<relative path>`.
    ///
    /// Existing objects with the same key are overwritten, objects without
    /// a local counterpart are left alone. Returns the number of uploaded files.
    fn upload_directory(&self, source: &Path, prefix: &str) -> Result<usize, StorageError>;
}

/// [Storage] backed by an [ObjectStore].
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    runtime: Runtime,
}

impl ObjectStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Result<Self, StorageError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StorageError::Runtime)?;

        Ok(Self { store, runtime })
    }

    /// Storage writing to the S3 bucket `bucket`.
    pub fn s3(credentials: &StorageCredentials, bucket: &str) -> Result<Self, StorageError> {
        let store = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&credentials.region)
            .with_access_key_id(&credentials.key)
            .with_secret_access_key(&credentials.secret)
            .build()?;
        log::debug!(target: "storage", "Using bucket {bucket} in {}", credentials.region);

        Self::new(Arc::new(store))
    }

    async fn upload(&self, key: &str, file: &Path) -> Result<(), StorageError> {
        // keeps the raw name, `ObjectPath::from` would percent-encode it
        let location = ObjectPath::parse(key)?;
        let mut reader = tokio::fs::File::open(file)
            .await
            .map_err(|source| StorageError::Read {
                path: file.to_path_buf(),
                source,
            })?;

        // switches to a multipart upload for large files
        let mut writer = BufWriter::new(Arc::clone(&self.store), location);
        let uploaded = match tokio::io::copy(&mut reader, &mut writer).await {
            Ok(_) => writer.shutdown().await,
            Err(e) => Err(e),
        };

        if let Err(source) = uploaded {
            if let Err(e) = writer.abort().await {
                log::warn!(target: "storage", "Aborting upload of {key} failed: {e}");
            }
            return Err(StorageError::Upload {
                key: key.to_string(),
                source,
            });
        }

        Ok(())
    }
}

impl Storage for ObjectStorage {
    fn put_file(&self, key: &str, file: &Path) -> Result<(), StorageError> {
        log::debug!(target: "storage", "Upload {} to {key}", file.display());
        self.runtime.block_on(self.upload(key, file))
    }

    fn upload_directory(&self, source: &Path, prefix: &str) -> Result<usize, StorageError> {
        let mut uploaded = 0;
        for entry in WalkDir::new(source).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(relative) = relative_key(source, entry.path()) else {
                continue;
            };
            self.put_file(&format!("{prefix}/{relative}"), entry.path())?;
            uploaded += 1;
        }

        log::debug!(target: "storage", "Uploaded {uploaded} files below {prefix}");
        Ok(uploaded)
    }
}

/// `path` relative to `root`, joined with `/` regardless of the platform.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
