use crate::error::{Result, StorageError};
use crate::models::FileEntity;
use crate::services::formatter::{FormatInfo, FormatterChoice, PathFormatter};
use crate::services::hooks::{HookBus, HookEvent, HookOutcome, HookPayload, SourceSummary};
use crate::services::source::{NormalizedSource, SourceNormalizer, UploadSource};
use crate::services::storage::StorageBackend;
use crate::utils::hash::{HashAlgorithm, HashingReader};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Anything `upload` accepts: an already stored entity passes straight through.
#[derive(Debug, Clone)]
pub enum UploadInput {
    Entity(FileEntity),
    Source(UploadSource),
}

impl From<FileEntity> for UploadInput {
    fn from(entity: FileEntity) -> Self {
        UploadInput::Entity(entity)
    }
}

impl From<UploadSource> for UploadInput {
    fn from(source: UploadSource) -> Self {
        UploadInput::Source(source)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Overrides the coordinator's formatter for this call only.
    pub formatter: Option<FormatterChoice>,
    pub info: FormatInfo,
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_formatter(mut self, formatter: FormatterChoice) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn with_info(mut self, info: FormatInfo) -> Self {
        self.info = info;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Applied to every raw input uploaded during the merge.
    pub upload: UploadOptions,
    /// Entries with these hashes are dropped from the result.
    pub remove_hashes: HashSet<String>,
    /// Also delete the stored objects of dropped entries.
    pub remove_file: bool,
}

impl MergeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upload(mut self, upload: UploadOptions) -> Self {
        self.upload = upload;
        self
    }

    pub fn remove<I, S>(mut self, hashes: I, remove_file: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove_hashes.extend(hashes.into_iter().map(Into::into));
        self.remove_file = remove_file;
        self
    }
}

/// Entities keyed by hash, keeping the position where each hash first
/// appeared. Re-inserting a hash replaces the entity in place.
#[derive(Debug, Default)]
struct EntitySet {
    entries: Vec<FileEntity>,
    positions: HashMap<String, usize>,
}

impl EntitySet {
    fn insert(&mut self, entity: FileEntity) {
        match self.positions.get(&entity.hash) {
            Some(&index) => self.entries[index] = entity,
            None => {
                self.positions.insert(entity.hash.clone(), self.entries.len());
                self.entries.push(entity);
            }
        }
    }

    fn into_vec(self) -> Vec<FileEntity> {
        self.entries
    }
}

/// Coordinates normalization, naming, backend writes and hooks.
///
/// Holds no per-call state: every upload resolves its own formatter instance
/// and owns its normalized source. The configuration setters take `&mut self`
/// and are meant for setup time.
pub struct StorageCoordinator {
    backend: Arc<dyn StorageBackend>,
    formatter: FormatterChoice,
    normalizer: SourceNormalizer,
    hooks: HookBus,
}

impl std::fmt::Debug for StorageCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCoordinator")
            .field("backend", &self.backend.name())
            .field("formatter", &self.formatter)
            .field("hash_algorithm", &self.normalizer.algorithm())
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl StorageCoordinator {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            formatter: FormatterChoice::default(),
            normalizer: SourceNormalizer::default(),
            hooks: HookBus::new(),
        }
    }

    pub fn with_formatter(mut self, formatter: FormatterChoice) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.normalizer = SourceNormalizer::new(algorithm);
        self
    }

    pub fn with_hooks(mut self, hooks: HookBus) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn set_formatter(&mut self, formatter: FormatterChoice) {
        self.formatter = formatter;
    }

    pub fn set_adapter(&mut self, backend: Arc<dyn StorageBackend>) {
        self.backend = backend;
    }

    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.normalizer.algorithm()
    }

    pub fn normalizer(&self) -> &SourceNormalizer {
        &self.normalizer
    }

    fn resolve_formatter(&self, options: &UploadOptions) -> Result<Box<dyn PathFormatter>> {
        options.formatter.as_ref().unwrap_or(&self.formatter).resolve()
    }

    /// Stores one input and returns its entity. Entities are returned as-is.
    ///
    /// Upload hooks are notifications only; listeners cannot veto an upload.
    pub async fn upload(
        &self,
        input: impl Into<UploadInput>,
        options: &UploadOptions,
    ) -> Result<FileEntity> {
        let source = match input.into() {
            UploadInput::Entity(entity) => return Ok(entity),
            UploadInput::Source(source) => source,
        };

        let mut formatter = self.resolve_formatter(options)?;
        let mut normalized = self.normalizer.normalize(source).await?;

        let result = self
            .store(formatter.as_mut(), &mut normalized, &options.info)
            .await;
        normalized.shutdown();
        result
    }

    /// Stores a source the caller normalized. The source is shut down before
    /// this returns, whatever the outcome.
    pub async fn upload_normalized(
        &self,
        source: &mut NormalizedSource,
        options: &UploadOptions,
    ) -> Result<FileEntity> {
        let result = match self.resolve_formatter(options) {
            Ok(mut formatter) => self.store(formatter.as_mut(), source, &options.info).await,
            Err(e) => Err(e),
        };
        source.shutdown();
        result
    }

    async fn store(
        &self,
        formatter: &mut dyn PathFormatter,
        source: &mut NormalizedSource,
        info: &FormatInfo,
    ) -> Result<FileEntity> {
        let key = formatter.set_info(&source.filename, info).path()?;

        let summary = SourceSummary {
            filename: source.filename.clone(),
            size: source.size,
            mime: source.mime.clone(),
            hash: source.hash.clone(),
        };
        self.hooks.dispatch(
            HookEvent::BeforeUpload,
            &HookPayload {
                source: Some(summary),
                path: Some(key.clone()),
                ..Default::default()
            },
        );

        let algorithm = source.algorithm();
        let mut reader = HashingReader::new(source.reader()?, algorithm);
        let write_result = self.backend.write(&key, Box::new(&mut reader)).await;
        let (stored_hash, stored_size) = reader.finish();
        let written = match write_result {
            Ok(written) => written,
            Err(e) => {
                tracing::error!("❌ Failed to store {} at {}: {:?}", source.filename, key, e);
                return Err(StorageError::UploadFailed { key, source: e });
            }
        };

        // The entity must describe the bytes that were actually stored.
        if written != source.size || stored_size != source.size || stored_hash != source.hash {
            tracing::error!(
                "❌ Content of {} changed while storing at {}: expected {} bytes ({}), stored {} bytes ({})",
                source.filename,
                key,
                source.size,
                source.hash,
                stored_size,
                stored_hash
            );
            if let Err(e) = self.backend.delete(&key).await {
                tracing::warn!("Failed to remove mismatched object {}: {:?}", key, e);
            }
            return Err(StorageError::UploadFailed {
                source: anyhow::anyhow!(
                    "content of '{}' changed after normalization",
                    source.filename
                ),
                key,
            });
        }

        let entity = FileEntity::new(
            key,
            source.filename.clone(),
            source.size,
            source.mime.clone(),
            source.hash.clone(),
        );
        tracing::info!(
            "Stored {} at {} ({} bytes, {})",
            entity.original_filename,
            entity.path,
            entity.filesize,
            entity.hash
        );

        self.hooks.dispatch(
            HookEvent::AfterUpload,
            &HookPayload {
                entity: Some(entity.clone()),
                path: Some(entity.path.clone()),
                ..Default::default()
            },
        );

        Ok(entity)
    }

    /// Uploads every input in order with the same options. The first failure
    /// aborts the batch; items already stored are not rolled back.
    pub async fn upload_many<I>(
        &self,
        inputs: impl IntoIterator<Item = I>,
        options: &UploadOptions,
    ) -> Result<Vec<FileEntity>>
    where
        I: Into<UploadInput>,
    {
        let mut entities = Vec::new();
        for (index, input) in inputs.into_iter().enumerate() {
            let input = input.into();
            let label = match &input {
                UploadInput::Entity(entity) => entity.path.clone(),
                UploadInput::Source(source) => source.display_name(),
            };
            match self.upload(input, options).await {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    tracing::warn!(
                        "Batch upload aborted at item {} ({}) after {} stored: {}",
                        index,
                        label,
                        entities.len(),
                        e
                    );
                    return Err(e);
                }
            }
        }
        Ok(entities)
    }

    /// Backend errors are logged and reported as `false`.
    pub async fn exists(&self, entity: &FileEntity) -> bool {
        match self.backend.exists(&entity.path).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!("Existence check failed for {}: {}", entity.path, e);
                false
            }
        }
    }

    pub async fn read(&self, entity: &FileEntity) -> Result<Vec<u8>> {
        Ok(self.backend.read(&entity.path).await?)
    }

    /// Deletes the stored object.
    ///
    /// A `beforeDelete` listener may stop the call and supply the result.
    /// Returns `false` both when the object is missing and when the backend
    /// fails to delete it.
    pub async fn delete(&self, entity: &FileEntity) -> bool {
        let payload = HookPayload {
            entity: Some(entity.clone()),
            path: Some(entity.path.clone()),
            ..Default::default()
        };
        if let HookOutcome::StopWith(result) = self.hooks.dispatch(HookEvent::BeforeDelete, &payload)
        {
            return result;
        }

        match self.backend.exists(&entity.path).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Nothing to delete at {}", entity.path);
                return false;
            }
            Err(e) => {
                tracing::warn!("Existence check failed for {}: {}", entity.path, e);
                return false;
            }
        }

        if let Err(e) = self.backend.delete(&entity.path).await {
            tracing::warn!("Failed to delete {}: {}", entity.path, e);
            return false;
        }

        tracing::info!("Deleted {}", entity.path);
        self.hooks.dispatch(HookEvent::AfterDelete, &payload);
        true
    }

    /// Moves the stored object and updates `entity.path` on success. The
    /// caller persists the updated entity.
    pub async fn rename(&self, entity: &mut FileEntity, new_path: &str) -> bool {
        let payload = HookPayload {
            entity: Some(entity.clone()),
            path: Some(entity.path.clone()),
            new_path: Some(new_path.to_string()),
            ..Default::default()
        };
        if let HookOutcome::StopWith(result) = self.hooks.dispatch(HookEvent::BeforeRename, &payload)
        {
            return result;
        }

        if let Err(e) = self.backend.rename(&entity.path, new_path).await {
            tracing::warn!("Failed to rename {} to {}: {}", entity.path, new_path, e);
            return false;
        }

        let old_path = std::mem::replace(&mut entity.path, new_path.to_string());
        tracing::info!("Renamed {} to {}", old_path, entity.path);

        self.hooks.dispatch(
            HookEvent::AfterRename,
            &HookPayload {
                entity: Some(entity.clone()),
                path: Some(old_path),
                new_path: Some(entity.path.clone()),
                ..Default::default()
            },
        );
        true
    }

    /// Reconciles a record's current files with newly submitted ones, using
    /// the content hash as identity.
    ///
    /// Existing entities are indexed first, then each new item is uploaded
    /// (entities pass through) and indexed. A later entity with an already
    /// seen hash replaces the earlier one in its original position. Entries
    /// whose hash is in `remove_hashes` are dropped, after a best-effort
    /// delete of the stored object when `remove_file` is set.
    pub async fn merge_entities<I>(
        &self,
        existing: impl IntoIterator<Item = FileEntity>,
        new_data: impl IntoIterator<Item = I>,
        options: &MergeOptions,
    ) -> Result<Vec<FileEntity>>
    where
        I: Into<UploadInput>,
    {
        let mut merged = EntitySet::default();
        for entity in existing {
            merged.insert(entity);
        }
        for item in new_data {
            let entity = self.upload(item, &options.upload).await?;
            merged.insert(entity);
        }

        let merged = merged.into_vec();
        if options.remove_hashes.is_empty() {
            return Ok(merged);
        }

        let mut kept = Vec::with_capacity(merged.len());
        for entity in merged {
            if !options.remove_hashes.contains(&entity.hash) {
                kept.push(entity);
                continue;
            }
            if options.remove_file {
                let deleted = self.delete(&entity).await;
                tracing::debug!("Merge removed {} (file deleted: {})", entity.path, deleted);
            } else {
                tracing::debug!("Merge dropped {}", entity.path);
            }
        }
        Ok(kept)
    }
}
