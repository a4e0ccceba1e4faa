use crate::config::{DiskConfig, S3Config};
use crate::error::{Result, StorageError};
use crate::services::storage::{
    LocalStorageBackend, MemoryStorageBackend, S3StorageBackend, StorageBackend, Visibility,
};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

/// Names accepted in `DiskConfig::adapter`.
pub const ADAPTERS: &[&str] = &["local", "memory", "s3"];

/// Builds the backend a disk is configured for.
pub async fn setup_storage(disk: &DiskConfig) -> Result<Arc<dyn StorageBackend>> {
    let visibility: Visibility = disk.visibility.parse()?;

    match disk.adapter.trim().to_lowercase().as_str() {
        "local" => {
            info!("📁 Local storage: {} ({})", disk.root.display(), visibility);
            Ok(Arc::new(LocalStorageBackend::new(disk.root.clone(), visibility)))
        }
        "memory" => {
            info!("🧠 In-memory storage");
            Ok(Arc::new(MemoryStorageBackend::new()))
        }
        "s3" => {
            let s3 = disk.s3.as_ref().ok_or_else(|| {
                StorageError::configuration("The s3 adapter requires S3_ENDPOINT and S3_BUCKET")
            })?;
            Ok(Arc::new(setup_s3(s3, visibility).await))
        }
        other => Err(StorageError::configuration(format!(
            "Unknown storage adapter '{}' (expected one of: {})",
            other,
            ADAPTERS.join(", ")
        ))),
    }
}

async fn setup_s3(s3: &S3Config, visibility: Visibility) -> S3StorageBackend {
    info!("☁️  S3 Storage: {} (Bucket: {})", s3.endpoint, s3.bucket);

    let aws_config = aws_config::from_env()
        .endpoint_url(&s3.endpoint)
        .region(Region::new(s3.region.clone()))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            s3.access_key.clone(),
            s3.secret_key.clone(),
            None,
            None,
            "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    // Ensure bucket exists
    match s3_client.head_bucket().bucket(&s3.bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", s3.bucket),
        Err(_) => {
            info!("🪣 Bucket '{}' not found, creating...", s3.bucket);
            if let Err(e) = s3_client.create_bucket().bucket(&s3.bucket).send().await {
                tracing::error!("❌ Failed to create bucket '{}': {}", s3.bucket, e);
            } else {
                info!("✅ Bucket '{}' created successfully", s3.bucket);
            }
        }
    }

    S3StorageBackend::new(s3_client, s3.bucket.clone(), visibility)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_memory_and_local() {
        let backend = setup_storage(&DiskConfig::memory()).await.unwrap();
        assert_eq!(backend.name(), "memory");

        let dir = tempfile::tempdir().unwrap();
        let backend = setup_storage(&DiskConfig::local(dir.path())).await.unwrap();
        assert_eq!(backend.name(), "local");
    }

    #[tokio::test]
    async fn test_setup_rejects_bad_config() {
        let unknown = DiskConfig {
            adapter: "ftp".to_string(),
            ..DiskConfig::default()
        };
        assert!(matches!(
            setup_storage(&unknown).await,
            Err(StorageError::Configuration(_))
        ));

        let s3_without_settings = DiskConfig {
            adapter: "s3".to_string(),
            ..DiskConfig::default()
        };
        assert!(matches!(
            setup_storage(&s3_without_settings).await,
            Err(StorageError::Configuration(_))
        ));

        let bad_visibility = DiskConfig {
            visibility: "everyone".to_string(),
            ..DiskConfig::memory()
        };
        assert!(matches!(
            setup_storage(&bad_visibility).await,
            Err(StorageError::Configuration(_))
        ));
    }
}
