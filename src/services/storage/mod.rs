use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::io::AsyncRead;

pub mod local;
pub mod memory;
pub mod s3;

pub use local::LocalStorageBackend;
pub use memory::MemoryStorageBackend;
pub use s3::S3StorageBackend;

/// Default access level applied to newly written objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl FromStr for Visibility {
    type Err = crate::error::StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(crate::error::StorageError::configuration(format!(
                "Unknown visibility '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => f.write_str("public"),
            Visibility::Private => f.write_str("private"),
        }
    }
}

/// Byte storage addressed by opaque string keys.
///
/// This is the complete surface the coordinator relies on; backend-specific
/// features stay on the concrete types.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Stores the full stream under `key`, replacing any existing object.
    /// Returns the number of bytes written.
    async fn write<'a>(
        &self,
        key: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<u64>;

    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Fails when the object cannot be removed.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    fn name(&self) -> &str;
}
