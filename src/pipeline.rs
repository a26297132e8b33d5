use std::path::PathBuf;
use std::time::SystemTime;

use tracing::{error, info, warn};

use crate::config::{Config, MetadataFailurePolicy, TranscoderConfig};
use crate::error::PipelineError;
use crate::ffmpeg;
use crate::metadata::MetadataSet;
use crate::models::{MetadataStatus, UploadResponse, UploadedVideo};
use crate::process::SubprocessRunner;
use crate::storage::{PartialFile, Storage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOutcome {
    Complete,
    /// Only the first `applied` fields made it onto the file.
    Partial { applied: usize, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub stored_path: PathBuf,
    pub compressed_path: PathBuf,
    pub metadata: MetadataOutcome,
}

impl From<PipelineOutcome> for UploadResponse {
    fn from(outcome: PipelineOutcome) -> Self {
        let (metadata_status, metadata_error) = match outcome.metadata {
            MetadataOutcome::Complete => (MetadataStatus::Complete, None),
            MetadataOutcome::Partial { error, .. } => (MetadataStatus::Partial, Some(error)),
        };
        Self {
            original_file_path: outcome.stored_path.display().to_string(),
            compressed_file_path: outcome.compressed_path.display().to_string(),
            metadata_status,
            metadata_error,
        }
    }
}

/// Store → compress → tag, strictly in that order, for one upload.
#[derive(Debug, Clone)]
pub struct UploadPipeline {
    storage: Storage,
    runner: SubprocessRunner,
    transcoder: TranscoderConfig,
    policy: MetadataFailurePolicy,
}

impl UploadPipeline {
    pub fn new(
        storage: Storage,
        runner: SubprocessRunner,
        transcoder: TranscoderConfig,
        policy: MetadataFailurePolicy,
    ) -> Self {
        Self {
            storage,
            runner,
            transcoder,
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Storage::from_config(config),
            SubprocessRunner::from_config(&config.transcoder),
            config.transcoder.clone(),
            config.metadata.failure_policy,
        )
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn runner(&self) -> &SubprocessRunner {
        &self.runner
    }

    pub async fn handle(
        &self,
        upload: Option<UploadedVideo>,
        fields: &MetadataSet,
    ) -> Result<PipelineOutcome, PipelineError> {
        let upload = match upload {
            Some(upload) if !upload.bytes.is_empty() => upload,
            _ => return Err(PipelineError::EmptyUpload),
        };
        let start_time = SystemTime::now();

        let paths = self
            .storage
            .store(&upload.file_name, &upload.bytes)
            .await
            .map_err(|e| {
                error!("[pipeline] ❌ Failed to save file: {}", e);
                PipelineError::StorageFailure(e)
            })?;
        info!(
            "[pipeline] 💾 Stored {} ({} bytes) as {:?}",
            upload.file_name,
            upload.bytes.len(),
            paths.original
        );

        // The original stays on disk whatever happens from here on.
        ffmpeg::compress(&self.runner, &self.transcoder, &paths.original, &paths.compressed)
            .await?;

        let compressed = PartialFile::new(&paths.compressed);
        let metadata = match ffmpeg::tag_metadata(&self.runner, compressed.path(), fields).await {
            Ok(()) => MetadataOutcome::Complete,
            Err(e) => match self.policy {
                MetadataFailurePolicy::Fail => {
                    error!("[pipeline] ❌ Discarding {:?}: {}", paths.compressed, e);
                    return Err(e.into());
                }
                MetadataFailurePolicy::Warn => {
                    warn!(
                        "[pipeline] ⚠️  {:?} is only partially tagged ({}/{} fields): {}",
                        paths.compressed,
                        e.index(),
                        fields.len(),
                        e
                    );
                    MetadataOutcome::Partial {
                        applied: e.index(),
                        error: e.to_string(),
                    }
                }
            },
        };
        let compressed_path = compressed.commit();

        info!(
            "[pipeline] ✅ {} finished in {:.2}s",
            paths.name,
            start_time.elapsed().unwrap_or_default().as_secs_f64()
        );

        Ok(PipelineOutcome {
            stored_path: paths.original,
            compressed_path,
            metadata,
        })
    }
}
