#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use file_keeper::services::storage::{MemoryStorageBackend, StorageBackend};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::AsyncRead;

/// Memory backend that counts calls and can be told to fail.
#[derive(Default)]
pub struct RecordingBackend {
    pub inner: MemoryStorageBackend,
    pub writes: AtomicUsize,
    pub exists_calls: AtomicUsize,
    pub deletes: Mutex<Vec<String>>,
    pub renames: Mutex<Vec<(String, String)>>,
    fail_all_writes: Mutex<bool>,
    fail_renames: Mutex<bool>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all_writes(&self) {
        *self.fail_all_writes.lock().unwrap() = true;
    }

    pub fn fail_renames(&self) {
        *self.fail_renames.lock().unwrap() = true;
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn renamed(&self) -> Vec<(String, String)> {
        self.renames.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageBackend for RecordingBackend {
    async fn write<'a>(
        &self,
        key: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<u64> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if *self.fail_all_writes.lock().unwrap() {
            return Err(anyhow!("simulated write failure for {}", key));
        }
        self.inner.write(key, reader).await
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.inner.read(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.deletes.lock().unwrap().push(key.to_string());
        self.inner.delete(key).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.renames
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_string()));
        if *self.fail_renames.lock().unwrap() {
            return Err(anyhow!("simulated rename failure"));
        }
        self.inner.rename(from, to).await
    }

    fn name(&self) -> &str {
        "recording"
    }
}
