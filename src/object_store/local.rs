use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{ObjectStore, ObjectStoreError, StagedObject};

/// Staged files start with a dot. Sanitized filenames never do, so a staged
/// file cannot be mistaken for, or collide with, a stored object.
const STAGING_PREFIX: &str = ".staging-";

/// Flat local directory holding one file per key.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// The on-disk location of an object, derived only from its key.
    pub fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        if key.is_empty()
            || key.starts_with('.')
            || key.contains(['/', '\\'])
            || key.contains('\0')
        {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }

    fn staging_path(&self, token: &str) -> PathBuf {
        self.base_path.join(format!("{STAGING_PREFIX}{token}.part"))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn stage(&self, data: Bytes) -> Result<StagedObject, ObjectStoreError> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let path = self.staging_path(&token);

        let write = async {
            let mut file = tokio::fs::File::create(&path).await?;
            file.write_all(&data).await?;
            file.sync_all().await
        };
        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }

        Ok(StagedObject {
            token,
            byte_size: data.len() as u64,
        })
    }

    async fn promote(&self, staged: StagedObject, key: &str) -> Result<(), ObjectStoreError> {
        let staged_path = self.staging_path(&staged.token);
        let target = match self.object_path(key) {
            Ok(target) => target,
            Err(e) => {
                self.discard(staged).await?;
                return Err(e);
            }
        };

        // Linking refuses to replace an existing file, unlike rename
        let linked = tokio::fs::hard_link(&staged_path, &target).await;
        if let Err(e) = tokio::fs::remove_file(&staged_path).await {
            tracing::warn!(path = %staged_path.display(), error = %e, "Failed to remove staged file");
        }

        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(ObjectStoreError::AlreadyExists(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn discard(&self, staged: StagedObject) -> Result<(), ObjectStoreError> {
        let path = self.staging_path(&staged.token);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let path = self.object_path(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}
