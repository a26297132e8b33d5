use std::{convert::Infallible, sync::Arc, time::SystemTime};

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::CONTENT_TYPE,
    response::Json,
};
use bytes::{Bytes, BytesMut};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use multer::Multipart;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::{
    error::PipelineError,
    metadata::MetadataSet,
    models::{AppState, UploadResponse, UploadedVideo},
};

/// Multipart file field holding the video.
pub const VIDEO_FIELD: &str = "video";
/// Text fields named `metadata.<key>` add or override metadata fields.
pub const METADATA_FIELD_PREFIX: &str = "metadata.";

// Room for boundaries, part headers and metadata fields on top of the file.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

#[derive(Debug, Default)]
struct UploadForm {
    video: Option<UploadedVideo>,
    metadata: Vec<(String, String)>,
}

/// Upload, compress and tag a video
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Result<Json<UploadResponse>, PipelineError> {
    let request_id = Uuid::new_v4();
    async move {
        let start_time = SystemTime::now();
        info!("[POST /upload] ⏱️  START");

        let form = read_upload_form(request, state.config.max_file_size).await?;

        if let Some(video) = &form.video {
            info!("[POST /upload] 📁 File: {}", video.file_name);
            info!(
                "[POST /upload] 📦 Size: {:.2} MB ({} bytes)",
                video.bytes.len() as f64 / 1024.0 / 1024.0,
                video.bytes.len()
            );
        }

        let mut fields = MetadataSet::from_fields(state.config.metadata.fields.iter().cloned())?;
        for (key, value) in form.metadata {
            fields.insert(key, value)?;
        }

        let outcome = state.pipeline.handle(form.video, &fields).await.map_err(|e| {
            error!("[POST /upload] ❌ {}", e);
            e
        })?;

        info!(
            "[POST /upload] ✅ SUCCESS - {:?} in {:.2}s",
            outcome.compressed_path,
            start_time.elapsed().unwrap_or_default().as_secs_f64()
        );

        Ok::<_, PipelineError>(Json(UploadResponse::from(outcome)))
    }
    .instrument(info_span!("upload", %request_id))
    .await
}

async fn read_upload_form(
    request: Request<Body>,
    max_file_size: u64,
) -> Result<UploadForm, PipelineError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PipelineError::BadRequest("Missing Content-Type header".to_string()))?;

    let boundary = multer::parse_boundary(content_type).map_err(|e| {
        error!("Failed to parse boundary: {}", e);
        PipelineError::BadRequest(format!("Invalid multipart request: {}", e))
    })?;

    let limit = usize::try_from(max_file_size.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);
    let body_bytes = Limited::new(request.into_body(), limit)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                PipelineError::PayloadTooLarge {
                    limit: max_file_size,
                }
            } else {
                error!("Failed to read request body: {}", e);
                PipelineError::BadRequest(format!("Failed to read request: {}", e))
            }
        })?
        .to_bytes();

    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body_bytes) });
    let mut multipart = Multipart::new(stream, boundary);
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        if name == VIDEO_FIELD {
            let file_name = field.file_name().unwrap_or("video.mp4").to_string();

            let mut data = BytesMut::new();
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                data.extend_from_slice(&chunk);

                if data.len() as u64 > max_file_size {
                    error!(
                        "File too large: {:.2}MB (max: {}MB)",
                        data.len() as f64 / 1024.0 / 1024.0,
                        max_file_size / 1024 / 1024
                    );
                    return Err(PipelineError::PayloadTooLarge {
                        limit: max_file_size,
                    });
                }
            }

            form.video = Some(UploadedVideo {
                file_name,
                bytes: data.freeze(),
            });
        } else if let Some(key) = name.strip_prefix(METADATA_FIELD_PREFIX) {
            let key = key.to_string();
            let value = field.text().await.map_err(multipart_error)?;
            form.metadata.push((key, value));
        } else {
            // Drain the field
            while field.chunk().await.map_err(multipart_error)?.is_some() {}
        }
    }

    Ok(form)
}

fn multipart_error(e: multer::Error) -> PipelineError {
    error!("Multipart parsing error: {}", e);
    PipelineError::BadRequest(format!("Error parsing multipart request: {}", e))
}
