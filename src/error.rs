use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Failure launching or running the external transcoder.
#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {}", describe_exit(.code), trimmed(.stderr))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} did not finish within {secs}s and was killed")]
    TimedOut { program: String, secs: u64 },
}

fn trimmed(text: &str) -> &str {
    text.trim()
}

fn megabytes(bytes: &u64) -> u64 {
    bytes / 1024 / 1024
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct CompressionError(#[from] pub ProcessError);

/// Tagging stopped at field `index`; fields before it are committed.
#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    #[error("setting metadata field #{index} ({key}) failed: {source}")]
    Process {
        index: usize,
        key: String,
        #[source]
        source: ProcessError,
    },

    #[error("replacing {path} after setting metadata field #{index} ({key}) failed: {source}")]
    Replace {
        index: usize,
        key: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl MetadataError {
    pub fn index(&self) -> usize {
        match self {
            Self::Process { index, .. } | Self::Replace { index, .. } => *index,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("No video file received.")]
    EmptyUpload,

    #[error("Invalid upload request: {0}")]
    BadRequest(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("File too large. Maximum file size is {}MB.", megabytes(.limit))]
    PayloadTooLarge { limit: u64 },

    #[error("Error storing video: {0}")]
    StorageFailure(#[source] std::io::Error),

    #[error("Error compressing video: {0}")]
    CompressionFailure(#[from] CompressionError),

    #[error("Error tagging video metadata: {0}")]
    MetadataFailure(#[from] MetadataError),
}

impl PipelineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyUpload | Self::BadRequest(_) | Self::InvalidMetadata(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::StorageFailure(_) | Self::CompressionFailure(_) | Self::MetadataFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
