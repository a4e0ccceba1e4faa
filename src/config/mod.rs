use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

/// Connection settings for an S3-compatible object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Region (default: "us-east-1")
    pub region: String,
}

impl S3Config {
    /// Reads `S3_*` variables. Returns `None` unless endpoint and bucket are set.
    pub fn from_env() -> Option<Self> {
        let endpoint = env::var("S3_ENDPOINT").ok()?;
        let bucket = env::var("S3_BUCKET").ok()?;
        Some(Self {
            endpoint,
            access_key: env::var("S3_ACCESS_KEY").unwrap_or_default(),
            secret_key: env::var("S3_SECRET_KEY").unwrap_or_default(),
            bucket,
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        })
    }
}

/// Settings for one named disk.
///
/// Names are kept as strings and resolved when the disk is first used, so a
/// typo surfaces as a configuration error at that point rather than at load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskConfig {
    /// Backend adapter: "local", "memory" or "s3" (default: "local")
    pub adapter: String,

    /// Root directory for the local adapter (default: "./storage")
    pub root: PathBuf,

    /// Default object visibility: "public" or "private" (default: "private")
    pub visibility: String,

    /// Path formatter: "default" or "entity" (default: "default")
    pub formatter: String,

    /// Content hash algorithm: "xxh3", "sha256" or "blake3" (default: "xxh3")
    pub hash_algorithm: String,

    /// Object store settings, required by the s3 adapter
    pub s3: Option<S3Config>,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            adapter: "local".to_string(),
            root: PathBuf::from("./storage"),
            visibility: "private".to_string(),
            formatter: "default".to_string(),
            hash_algorithm: "xxh3".to_string(),
            s3: None,
        }
    }
}

impl DiskConfig {
    /// Load disk settings from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            adapter: env::var("STORAGE_ADAPTER").unwrap_or(default.adapter),
            root: env::var("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.root),
            visibility: env::var("STORAGE_VISIBILITY").unwrap_or(default.visibility),
            formatter: env::var("STORAGE_FORMATTER").unwrap_or(default.formatter),
            hash_algorithm: env::var("STORAGE_HASH_ALGORITHM").unwrap_or(default.hash_algorithm),
            s3: S3Config::from_env(),
        }
    }

    /// In-memory disk, for development and tests
    pub fn memory() -> Self {
        Self {
            adapter: "memory".to_string(),
            ..Self::default()
        }
    }

    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            adapter: "local".to_string(),
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_formatter(mut self, formatter: impl Into<String>) -> Self {
        self.formatter = formatter.into();
        self
    }

    pub fn with_hash_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.hash_algorithm = algorithm.into();
        self
    }
}

/// Named disks plus the one used when no name is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub default_disk: String,
    pub disks: BTreeMap<String, DiskConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::single("local", DiskConfig::default())
    }
}

impl StorageConfig {
    pub fn single(name: impl Into<String>, disk: DiskConfig) -> Self {
        let name = name.into();
        let mut disks = BTreeMap::new();
        disks.insert(name.clone(), disk);
        Self {
            default_disk: name,
            disks,
        }
    }

    /// Load configuration from environment variables. The disk described by
    /// `STORAGE_*` is registered under `STORAGE_DISK` (default: "local").
    pub fn from_env() -> Self {
        let name = env::var("STORAGE_DISK").unwrap_or_else(|_| "local".to_string());
        Self::single(name, DiskConfig::from_env())
    }

    /// Create config for development (single in-memory disk)
    pub fn development() -> Self {
        Self::single("memory", DiskConfig::memory())
    }

    pub fn with_disk(mut self, name: impl Into<String>, disk: DiskConfig) -> Self {
        self.disks.insert(name.into(), disk);
        self
    }

    pub fn disk(&self, name: &str) -> Option<&DiskConfig> {
        self.disks.get(name)
    }
}
