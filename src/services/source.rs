use crate::error::{Result, StorageError};
use crate::models::MIME_UNKNOWN;
use crate::utils::hash::{HashAlgorithm, calculate_hash, calculate_hash_from_reader};
use bytes::Bytes;
use std::io::{Cursor, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

/// Number of leading bytes inspected for content sniffing.
const SNIFF_LEN: usize = 8192;

/// A file that has already been written to a temporary location, e.g. by a
/// multipart parser. The temp file's own name is meaningless; the client's
/// filename travels alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempUpload {
    pub path: PathBuf,
    pub original_filename: String,
}

/// File-like inputs accepted by the normalizer.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Path(PathBuf),
    Buffer { filename: String, bytes: Bytes },
    Temp(TempUpload),
}

impl UploadSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        UploadSource::Path(path.into())
    }

    pub fn buffer(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        UploadSource::Buffer {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    pub fn temp(path: impl Into<PathBuf>, original_filename: impl Into<String>) -> Self {
        UploadSource::Temp(TempUpload {
            path: path.into(),
            original_filename: original_filename.into(),
        })
    }

    /// Best-effort display name for logging before normalization.
    pub fn display_name(&self) -> String {
        match self {
            UploadSource::Path(path) => path.display().to_string(),
            UploadSource::Buffer { filename, .. } => filename.clone(),
            UploadSource::Temp(temp) => temp.original_filename.clone(),
        }
    }
}

/// Uniform descriptor produced from an [`UploadSource`].
///
/// Owns an open byte stream positioned at the start of the content. The
/// stream must be released with [`NormalizedSource::shutdown`] once the
/// consumer is done with it.
pub struct NormalizedSource {
    pub filename: String,
    pub size: u64,
    pub mime: String,
    pub hash: String,
    algorithm: HashAlgorithm,
    stream: Option<Box<dyn AsyncRead + Unpin + Send>>,
}

impl std::fmt::Debug for NormalizedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedSource")
            .field("filename", &self.filename)
            .field("size", &self.size)
            .field("mime", &self.mime)
            .field("hash", &self.hash)
            .field("open", &self.is_open())
            .finish()
    }
}

impl NormalizedSource {
    /// Algorithm that produced `hash`.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Borrow the content stream. Fails once the source has been shut down.
    pub fn reader(&mut self) -> Result<&mut (dyn AsyncRead + Unpin + Send)> {
        match self.stream.as_mut() {
            Some(stream) => Ok(stream.as_mut()),
            None => Err(StorageError::invalid_input(format!(
                "Source '{}' has already been shut down",
                self.filename
            ))),
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Releases the underlying handle. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("Released source stream for {}", self.filename);
        }
    }
}

/// Guesses a MIME type from leading content bytes.
pub fn sniff_mime(header: &[u8]) -> String {
    if header.is_empty() {
        return MIME_UNKNOWN.to_string();
    }

    if let Some(kind) = infer::get(header) {
        return kind.mime_type().to_string();
    }

    if looks_like_text(header) {
        return mime::TEXT_PLAIN.essence_str().to_string();
    }

    mime::APPLICATION_OCTET_STREAM.essence_str().to_string()
}

fn looks_like_text(header: &[u8]) -> bool {
    if header.contains(&0) {
        return false;
    }
    match std::str::from_utf8(header) {
        Ok(_) => true,
        // A multi-byte character cut off by the sniff window is still text.
        Err(e) => e.error_len().is_none(),
    }
}

/// Turns heterogeneous inputs into [`NormalizedSource`]s hashed with the
/// configured algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceNormalizer {
    algorithm: HashAlgorithm,
}

impl SourceNormalizer {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub async fn normalize(&self, source: UploadSource) -> Result<NormalizedSource> {
        match source {
            UploadSource::Path(path) => {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| {
                        StorageError::invalid_input(format!(
                            "Path '{}' has no file name",
                            path.display()
                        ))
                    })?;
                self.normalize_file(&path, filename).await
            }
            UploadSource::Temp(temp) => {
                if temp.original_filename.trim().is_empty() {
                    return Err(StorageError::invalid_input(
                        "Temporary upload is missing its original filename",
                    ));
                }
                self.normalize_file(&temp.path, temp.original_filename).await
            }
            UploadSource::Buffer { filename, bytes } => self.normalize_buffer(filename, bytes),
        }
    }

    fn normalize_buffer(&self, filename: String, bytes: Bytes) -> Result<NormalizedSource> {
        if filename.trim().is_empty() {
            return Err(StorageError::invalid_input(
                "Buffer upload is missing its filename",
            ));
        }

        let header = &bytes[..bytes.len().min(SNIFF_LEN)];
        let mime = sniff_mime(header);
        let hash = calculate_hash(self.algorithm, &bytes);
        let size = bytes.len() as u64;

        tracing::debug!(
            "Normalized buffer {} ({} bytes, {}, {}={})",
            filename,
            size,
            mime,
            self.algorithm,
            hash
        );

        Ok(NormalizedSource {
            filename,
            size,
            mime,
            hash,
            algorithm: self.algorithm,
            stream: Some(Box::new(Cursor::new(bytes))),
        })
    }

    async fn normalize_file(&self, path: &Path, filename: String) -> Result<NormalizedSource> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            StorageError::invalid_input(format!("Cannot access '{}': {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(StorageError::invalid_input(format!(
                "'{}' is not a regular file",
                path.display()
            )));
        }

        let mut file = File::open(path).await.map_err(|e| {
            StorageError::invalid_input(format!("Cannot open '{}': {}", path.display(), e))
        })?;

        let unreadable = |e: std::io::Error| {
            StorageError::invalid_input(format!("Cannot read '{}': {}", path.display(), e))
        };

        let mut header = Vec::with_capacity(SNIFF_LEN);
        (&mut file)
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut header)
            .await
            .map_err(unreadable)?;
        let mime = sniff_mime(&header);

        file.seek(SeekFrom::Start(0)).await.map_err(unreadable)?;
        let (hash, size) = calculate_hash_from_reader(self.algorithm, &mut file)
            .await
            .map_err(unreadable)?;
        file.seek(SeekFrom::Start(0)).await.map_err(unreadable)?;

        tracing::debug!(
            "Normalized file {} from {} ({} bytes, {}, {}={})",
            filename,
            path.display(),
            size,
            mime,
            self.algorithm,
            hash
        );

        Ok(NormalizedSource {
            filename,
            size,
            mime,
            hash,
            algorithm: self.algorithm,
            stream: Some(Box::new(file)),
        })
    }
}
