use super::{StorageBackend, Visibility};
use crate::utils::validation::validate_key;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

/// Stores objects as files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalStorageBackend {
    root: PathBuf,
    visibility: Visibility,
}

impl LocalStorageBackend {
    pub fn new(root: impl Into<PathBuf>, visibility: Visibility) -> Self {
        Self {
            root: root.into(),
            visibility,
        }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        Ok(())
    }

    #[cfg(unix)]
    async fn apply_visibility(&self, path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let mode = match self.visibility {
            Visibility::Public => 0o644,
            Visibility::Private => 0o600,
        };
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn apply_visibility(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    async fn write<'a>(
        &self,
        key: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<u64> {
        let path = self.resolve(key)?;
        Self::ensure_parent(&path).await?;

        // Write next to the target and move into place so readers never see
        // a partial object.
        let partial = path.with_file_name(format!(
            ".{}.{}.part",
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            Uuid::new_v4().simple()
        ));

        let copied = async {
            let mut file = tokio::fs::File::create(&partial).await?;
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;

        let written = match copied {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e).with_context(|| format!("Failed to write {}", path.display()));
            }
        };

        tokio::fs::rename(&partial, &path)
            .await
            .with_context(|| format!("Failed to move object into {}", path.display()))?;
        self.apply_visibility(&path).await?;

        tracing::debug!("Wrote {} bytes to {}", written, path.display());
        Ok(written)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to delete {}", path.display()))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        Self::ensure_parent(&target).await?;
        tokio::fs::rename(&source, &target).await.with_context(|| {
            format!(
                "Failed to rename {} to {}",
                source.display(),
                target.display()
            )
        })
    }

    fn name(&self) -> &str {
        "local"
    }
}
