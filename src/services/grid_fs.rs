use futures::AsyncWriteExt;
use mongodb::{
    bson::{oid::ObjectId, Bson, Document},
    gridfs::{GridFsBucket, GridFsDownloadStream, GridFsUploadStream},
    options::{GridFsBucketOptions, GridFsUploadOptions},
    Database,
};
use crate::errors::{AppError, AppResult};

/// Wrapper around the GridFS bucket that holds uploaded document bytes.
#[derive(Clone)]
pub struct GridFsService {
    bucket: GridFsBucket,
    name: String,
}

/// An upload in progress. Bytes are pushed chunk by chunk and the GridFS
/// file only becomes visible after `finish`.
pub struct BlobWriter {
    stream: GridFsUploadStream,
    written: i64,
}

impl GridFsService {
    pub fn new(db: &Database, name: &str, chunk_size_bytes: Option<u32>) -> Self {
        let options = GridFsBucketOptions::builder()
            .bucket_name(name.to_string())
            .chunk_size_bytes(chunk_size_bytes)
            .build();

        Self {
            bucket: db.gridfs_bucket(options),
            name: name.to_string(),
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.name
    }

    pub fn start_upload(&self, filename: &str, metadata: Document) -> BlobWriter {
        let options = GridFsUploadOptions::builder().metadata(metadata).build();
        BlobWriter {
            stream: self.bucket.open_upload_stream(filename, options),
            written: 0,
        }
    }

    pub async fn open_download(&self, id: ObjectId) -> AppResult<GridFsDownloadStream> {
        self.bucket
            .open_download_stream(Bson::ObjectId(id))
            .await
            .map_err(|e| {
                tracing::error!("Failed to open GridFS file {}: {}", id, e);
                AppError::from(e)
            })
    }

    pub async fn delete(&self, id: ObjectId) -> AppResult<()> {
        self.bucket.delete(Bson::ObjectId(id)).await?;
        tracing::debug!("Deleted GridFS file {} from bucket {}", id, self.name);
        Ok(())
    }
}

impl BlobWriter {
    pub fn id(&self) -> AppResult<ObjectId> {
        self.stream
            .id()
            .as_object_id()
            .ok_or_else(|| AppError::Upload("GridFS returned a non-ObjectId file id".into()))
    }

    pub fn written(&self) -> i64 {
        self.written
    }

    pub async fn write(&mut self, chunk: &[u8]) -> AppResult<()> {
        self.stream.write_all(chunk).await?;
        self.written += chunk.len() as i64;
        Ok(())
    }

    pub async fn finish(mut self) -> AppResult<(ObjectId, i64)> {
        let id = self.id()?;
        self.stream.close().await?;
        Ok((id, self.written))
    }

    /// Drops any chunks written so far.
    pub async fn abort(mut self) {
        if let Err(e) = self.stream.abort().await {
            tracing::warn!("Failed to abort GridFS upload: {}", e);
        }
    }
}
