pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::config::{DiskConfig, StorageConfig};
pub use crate::error::{Result, StorageError};
pub use crate::models::FileEntity;
pub use crate::services::coordinator::{
    MergeOptions, StorageCoordinator, UploadInput, UploadOptions,
};
pub use crate::services::formatter::{FormatInfo, FormatterChoice, PathFormatter};
pub use crate::services::hooks::{HookBus, HookEvent, HookOutcome, HookPayload};
pub use crate::services::registry::StorageRegistry;
pub use crate::services::source::{NormalizedSource, SourceNormalizer, UploadSource};
pub use crate::services::storage::StorageBackend;
pub use crate::utils::hash::HashAlgorithm;
