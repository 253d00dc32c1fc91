use axum::{
    body::Body,
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use tokio_util::{compat::FuturesAsyncReadCompatExt, io::ReaderStream};
use crate::errors::{AppError, AppResult};
use crate::middleware::Claims;
use crate::models::{derive_file_id, normalize_doc_type, FileQuery, FileRecord, Role};
use crate::state::AppState;
use super::{clean, json::ApiJson, parse_object_id, stored_id};

/// Bytes already written to GridFS, waiting for their metadata record.
pub(crate) struct StoredBlob {
    pub gridfs_id: ObjectId,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
}

/// Academic categorization attached to an uploaded file.
#[derive(Debug, Default, Clone)]
pub(crate) struct Categorization {
    pub year: Option<String>,
    pub course_code: Option<String>,
    pub doc_type: Option<String>,
    pub department: Option<String>,
    pub semester: Option<String>,
}

impl Categorization {
    fn normalized(self) -> Self {
        Self {
            year: clean(self.year),
            course_code: clean(self.course_code).map(|c| c.to_uppercase()),
            doc_type: clean(self.doc_type).map(|d| normalize_doc_type(&d)),
            department: clean(self.department),
            semester: clean(self.semester),
        }
    }
}

// Streams one multipart file field into GridFS chunk by chunk.
async fn store_field(state: &AppState, mut field: Field<'_>) -> AppResult<StoredBlob> {
    let filename = field
        .file_name()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::Upload("Missing filename in upload".into()))?;

    let content_type = field
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| mime_guess::from_path(&filename).first_or_octet_stream().to_string());

    let mut writer = state
        .grid_fs
        .start_upload(&filename, doc! { "content_type": &content_type });

    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = writer.write(&chunk).await {
                    tracing::error!("Error writing chunk of {} to GridFS: {}", filename, e);
                    writer.abort().await;
                    return Err(e);
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Error reading upload {}: {}", filename, e);
                writer.abort().await;
                return Err(AppError::Upload(format!("Failed to read uploaded file: {}", e)));
            }
        }
    }

    if writer.written() == 0 {
        writer.abort().await;
        return Err(AppError::Upload(format!("Uploaded file {} is empty", filename)));
    }

    let (gridfs_id, size) = writer.finish().await?;
    tracing::debug!("Stored {} in GridFS as {} ({} bytes)", filename, gridfs_id, size);

    Ok(StoredBlob {
        gridfs_id,
        filename,
        content_type,
        size,
    })
}

async fn field_text(field: Field<'_>) -> AppResult<Option<String>> {
    let value = field
        .text()
        .await
        .map_err(|e| AppError::Upload(format!("Failed to read form field: {}", e)))?;
    Ok(Some(value))
}

/// Reads a multipart form with one `file` field and optional
/// categorization fields. Whatever was stored in GridFS is left in `blob`
/// even on error so the caller can discard it.
pub(crate) async fn read_upload_form(
    state: &AppState,
    multipart: &mut Multipart,
    blob: &mut Option<StoredBlob>,
) -> AppResult<Categorization> {
    let mut meta = Categorization::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to get next field from multipart form: {}", e);
        AppError::Upload(format!("Failed to process form field: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                if blob.is_some() {
                    return Err(AppError::Upload("Only one file can be uploaded at a time".into()));
                }
                *blob = Some(store_field(state, field).await?);
            }
            "year" => meta.year = field_text(field).await?,
            "course_code" => meta.course_code = field_text(field).await?,
            "doc_type" => meta.doc_type = field_text(field).await?,
            "department" => meta.department = field_text(field).await?,
            "semester" => meta.semester = field_text(field).await?,
            other => tracing::warn!("Unexpected form field: {}", other),
        }
    }

    Ok(meta.normalized())
}

pub(crate) async fn discard_blob(state: &AppState, blob: Option<StoredBlob>) {
    if let Some(blob) = blob {
        if let Err(e) = state.grid_fs.delete(blob.gridfs_id).await {
            tracing::warn!("Failed to discard GridFS file {}: {}", blob.gridfs_id, e);
        }
    }
}

/// Writes the metadata record for a stored blob as the newest version of
/// its file id. The blob is removed again if the record cannot be written.
pub(crate) async fn save_version(
    state: &AppState,
    blob: StoredBlob,
    meta: Categorization,
    uploaded_by: ObjectId,
    task: Option<ObjectId>,
) -> AppResult<FileRecord> {
    let id = ObjectId::new();
    let file_id = derive_file_id(
        meta.year.as_deref(),
        meta.course_code.as_deref(),
        meta.doc_type.as_deref(),
    )
    .unwrap_or_else(|| id.to_hex());
    let gridfs_id = blob.gridfs_id;

    let record = FileRecord {
        id: Some(id),
        file_id,
        filename: blob.filename,
        content_type: blob.content_type,
        size: blob.size,
        gridfs_id,
        bucket: state.grid_fs.bucket_name().to_string(),
        year: meta.year,
        course_code: meta.course_code,
        doc_type: meta.doc_type,
        department: meta.department,
        semester: meta.semester,
        version: 0,
        is_latest: false,
        uploaded_by,
        task,
        uploaded_at: DateTime::now(),
    };

    match state.mongo.insert_file_version(record).await {
        Ok(record) => Ok(record),
        Err(e) => {
            if let Err(cleanup) = state.grid_fs.delete(gridfs_id).await {
                tracing::warn!("Failed to remove orphaned GridFS file {}: {}", gridfs_id, cleanup);
            }
            Err(e)
        }
    }
}

async fn load_file(state: &AppState, file_id: &str) -> AppResult<FileRecord> {
    let id = parse_object_id(file_id, "file")?;
    state
        .mongo
        .get_file(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("File {} not found", file_id)))
}

pub async fn upload_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    if claims.role == Role::Viewer {
        return Err(AppError::Forbidden("Viewers cannot upload files".into()));
    }
    let uploaded_by = stored_id(state.current_user(&claims).await?.id, "user")?;

    let mut blob = None;
    let meta = match read_upload_form(&state, &mut multipart, &mut blob).await {
        Ok(meta) => meta,
        Err(e) => {
            discard_blob(&state, blob).await;
            return Err(e);
        }
    };
    let blob = blob.ok_or_else(|| AppError::Upload("No file uploaded".into()))?;

    let record = save_version(&state, blob, meta, uploaded_by, None).await?;

    tracing::info!(
        "{} uploaded {} as {} v{}",
        claims.name,
        record.filename,
        record.file_id,
        record.version
    );
    Ok((StatusCode::CREATED, ApiJson(record)).into_response())
}

pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> AppResult<Response> {
    let mut filter = Document::new();
    if let Some(code) = clean(query.course_code) {
        filter.insert("course_code", code.to_uppercase());
    }
    if let Some(doc_type) = clean(query.doc_type) {
        filter.insert("doc_type", normalize_doc_type(&doc_type));
    }
    if let Some(year) = clean(query.year) {
        filter.insert("year", year);
    }
    if !query.all_versions {
        filter.insert("is_latest", true);
    }

    let files = state.mongo.list_files(filter).await?;
    tracing::debug!("Listing {} files", files.len());
    Ok(ApiJson(files).into_response())
}

pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> AppResult<Response> {
    let record = load_file(&state, &file_id).await?;
    Ok(ApiJson(record).into_response())
}

pub async fn file_versions(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> AppResult<Response> {
    let record = load_file(&state, &file_id).await?;
    let versions = state.mongo.file_versions(&record.file_id).await?;
    Ok(ApiJson(versions).into_response())
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> AppResult<Response> {
    tracing::info!("Starting download for file: {}", file_id);
    let record = load_file(&state, &file_id).await?;

    let stream = state.grid_fs.open_download(record.gridfs_id).await?;
    let body = Body::from_stream(ReaderStream::new(stream.compat()));
    let filename = record.filename.replace('"', "_");

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, record.content_type.as_str())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::CONTENT_LENGTH, record.size.to_string())
        .body(body)
        .map_err(|e| {
            tracing::error!("Failed to build download response: {}", e);
            AppError::Upload(format!("Failed to build download response: {}", e))
        })?;

    tracing::debug!("Streaming {} ({} bytes)", record.filename, record.size);
    Ok(response)
}

fn attached_tasks_filter(file: &ObjectId) -> Document {
    doc! { "file": file }
}

/// A file still backing a task cannot be removed.
fn ensure_detached(file_id: &str, tasks: u64) -> AppResult<()> {
    if tasks > 0 {
        return Err(AppError::Conflict(format!(
            "File {} is attached to {} task(s)",
            file_id, tasks
        )));
    }
    Ok(())
}

pub async fn delete_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> AppResult<Response> {
    state.confirm_admin(&claims).await?;
    let record = load_file(&state, &file_id).await?;
    let id = stored_id(record.id, "file")?;

    let tasks = state.mongo.count_tasks(attached_tasks_filter(&id)).await?;
    ensure_detached(&file_id, tasks)?;

    if let Err(e) = state.grid_fs.delete(record.gridfs_id).await {
        tracing::warn!("GridFS content for {} could not be deleted: {}", file_id, e);
    }
    state.mongo.delete_file_record(&record).await?;

    tracing::info!("{} deleted {} v{}", claims.name, record.file_id, record.version);
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorization_is_normalized() {
        let meta = Categorization {
            year: Some(" 2024 ".into()),
            course_code: Some("ma201".into()),
            doc_type: Some("Question  Paper".into()),
            department: Some("   ".into()),
            semester: None,
        }
        .normalized();

        assert_eq!(meta.year.as_deref(), Some("2024"));
        assert_eq!(meta.course_code.as_deref(), Some("MA201"));
        assert_eq!(meta.doc_type.as_deref(), Some("question-paper"));
        assert_eq!(meta.department, None);
    }

    #[test]
    fn attached_files_cannot_be_deleted() {
        let file = ObjectId::new();
        assert_eq!(attached_tasks_filter(&file), doc! { "file": file });

        let err = ensure_detached("2024_CS101_syllabus", 2).unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("2 task(s)")));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
        assert!(ensure_detached("2024_CS101_syllabus", 0).is_ok());
    }
}
