use super::StorageBackend;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Process-local backend. Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorageBackend {
    objects: Arc<DashMap<String, Bytes>>,
}

impl MemoryStorageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.get(key).map(|v| v.value().clone())
    }

    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects.insert(key.into(), data.into());
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    async fn write<'a>(
        &self,
        key: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<u64> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        let size = data.len() as u64;
        self.objects.insert(key.to_string(), Bytes::from(data));
        Ok(size)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.get(key)
            .map(|b| b.to_vec())
            .ok_or_else(|| anyhow!("Object not found: {}", key))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| anyhow!("Object not found: {}", key))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let (_, data) = self
            .objects
            .remove(from)
            .ok_or_else(|| anyhow!("Object not found: {}", from))?;
        self.objects.insert(to.to_string(), data);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
