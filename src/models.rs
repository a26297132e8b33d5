use bytes::Bytes;
use serde::Serialize;

use crate::config::Config;
use crate::pipeline::UploadPipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: UploadPipeline,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let pipeline = UploadPipeline::from_config(&config);
        Self { config, pipeline }
    }
}

/// Uploaded file contents. The file name only contributes its extension.
#[derive(Clone, Debug)]
pub struct UploadedVideo {
    pub file_name: String,
    pub bytes: Bytes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MetadataStatus {
    Complete,
    Partial,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct UploadResponse {
    pub original_file_path: String,
    pub compressed_file_path: String,
    pub metadata_status: MetadataStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_error: Option<String>,
}
