use super::{StorageBackend, Visibility};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Parts below this size are sent with a single PutObject.
const CHUNK_SIZE: usize = 10 * 1024 * 1024;

pub struct S3StorageBackend {
    client: Client,
    bucket: String,
    visibility: Visibility,
}

impl S3StorageBackend {
    pub fn new(client: Client, bucket: String, visibility: Visibility) -> Self {
        Self {
            client,
            bucket,
            visibility,
        }
    }

    fn acl(&self) -> ObjectCannedAcl {
        match self.visibility {
            Visibility::Public => ObjectCannedAcl::PublicRead,
            Visibility::Private => ObjectCannedAcl::Private,
        }
    }

    async fn fill_chunk<'a>(
        reader: &mut (dyn AsyncRead + Unpin + Send + 'a),
        buffer: &mut [u8],
    ) -> Result<usize> {
        let mut n = 0;
        while n < buffer.len() {
            let read = reader.read(&mut buffer[n..]).await?;
            if read == 0 {
                break;
            }
            n += read;
        }
        Ok(n)
    }

    async fn copy_object(&self, source_key: &str, dest_key: &str) -> Result<()> {
        let res = self
            .client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, source_key))
            .key(dest_key)
            .acl(self.acl())
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 copy_object failed: source={}/{}, dest={}, error={:?}",
                self.bucket,
                source_key,
                dest_key,
                e
            );
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for S3StorageBackend {
    async fn write<'a>(
        &self,
        key: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<u64> {
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let first = Self::fill_chunk(reader.as_mut(), &mut buffer).await?;

        if first < CHUNK_SIZE {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .acl(self.acl())
                .body(ByteStream::from(buffer[..first].to_vec()))
                .send()
                .await?;
            return Ok(first as u64);
        }

        let multipart_upload_res = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .acl(self.acl())
            .send()
            .await?;

        let upload_id = multipart_upload_res
            .upload_id()
            .ok_or_else(|| anyhow!("No upload ID"))?
            .to_string();

        let mut chunk_index = 1;
        let mut completed_parts = Vec::new();
        let mut total_size = 0u64;
        let mut n = first;

        while n > 0 {
            total_size += n as u64;
            let part = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(&upload_id)
                .body(ByteStream::from(buffer[..n].to_vec()))
                .part_number(chunk_index)
                .send()
                .await;

            let part = match part {
                Ok(part) => part,
                Err(e) => {
                    let _ = self
                        .client
                        .abort_multipart_upload()
                        .bucket(&self.bucket)
                        .key(key)
                        .upload_id(&upload_id)
                        .send()
                        .await;
                    return Err(e.into());
                }
            };

            completed_parts.push(
                CompletedPart::builder()
                    .e_tag(part.e_tag().unwrap_or_default())
                    .part_number(chunk_index)
                    .build(),
            );

            chunk_index += 1;
            n = Self::fill_chunk(reader.as_mut(), &mut buffer).await?;
        }

        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await?;

        Ok(total_size)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        let data = res.body.collect().await?.to_vec();
        Ok(data)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow!(service_error))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.copy_object(from, to).await?;
        self.delete(from).await
    }

    fn name(&self) -> &str {
        "s3"
    }
}
