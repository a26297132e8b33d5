use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, error, info};

use crate::config::TranscoderConfig;
use crate::error::{CompressionError, MetadataError, ProcessError};
use crate::metadata::MetadataSet;
use crate::process::SubprocessRunner;
use crate::storage::PartialFile;

/// Re-encode `input_path` into `output_path` with the configured codec and CRF.
///
/// The parent directory of `output_path` must exist. An existing output is
/// overwritten; a partial output from a failed run is removed.
pub async fn compress(
    runner: &SubprocessRunner,
    config: &TranscoderConfig,
    input_path: &Path,
    output_path: &Path,
) -> Result<(), CompressionError> {
    let start_time = SystemTime::now();
    info!(
        "[compress] 🎬 {:?} -> {:?} ({} crf {})",
        input_path, output_path, config.video_codec, config.crf
    );

    let output = PartialFile::new(output_path);
    let crf = config.crf.to_string();
    let args = [
        OsStr::new("-y"),
        OsStr::new("-i"),
        input_path.as_os_str(),
        OsStr::new("-vcodec"),
        OsStr::new(&config.video_codec),
        OsStr::new("-crf"),
        OsStr::new(&crf),
        output_path.as_os_str(),
    ];

    if let Err(e) = runner.run(args).await {
        error!("[compress] ❌ {}", e);
        return Err(CompressionError(e));
    }
    output.commit();

    info!(
        "[compress] ✅ Done in {:.2}s",
        start_time.elapsed().unwrap_or_default().as_secs_f64()
    );
    Ok(())
}

/// Stamp each field onto `file_path`, one transcoder run per field.
///
/// Each run copies all streams into a temporary sibling file which is then
/// renamed over `file_path`. On failure at field `k` the remaining fields are
/// skipped and `file_path` still holds the result of fields `0..k`.
pub async fn tag_metadata(
    runner: &SubprocessRunner,
    file_path: &Path,
    fields: &MetadataSet,
) -> Result<(), MetadataError> {
    let temp_path = temp_path_for(file_path);

    for (index, field) in fields.iter().enumerate() {
        debug!("[metadata] 🏷️  #{} {}={:?} on {:?}", index, field.key, field.value, file_path);

        let temp = PartialFile::new(&temp_path);
        let meta = field.as_arg();
        let args = [
            OsStr::new("-y"),
            OsStr::new("-i"),
            file_path.as_os_str(),
            OsStr::new("-metadata"),
            OsStr::new(&meta),
            OsStr::new("-codec"),
            OsStr::new("copy"),
            temp.path().as_os_str(),
        ];

        runner
            .run(args)
            .await
            .map_err(|source| MetadataError::Process {
                index,
                key: field.key.clone(),
                source,
            })?;

        // rename replaces the target in one step on every supported platform
        tokio::fs::rename(temp.path(), file_path)
            .await
            .map_err(|source| MetadataError::Replace {
                index,
                key: field.key.clone(),
                path: file_path.display().to_string(),
                source,
            })?;
        temp.commit();
    }

    if !fields.is_empty() {
        info!("[metadata] ✅ Applied {} fields to {:?}", fields.len(), file_path);
    }
    Ok(())
}

/// `<stem>.tagging.<ext>` next to `file_path`. The extension is kept so the
/// transcoder picks the same container.
pub fn temp_path_for(file_path: &Path) -> PathBuf {
    let ext = file_path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());
    file_path.with_extension(format!("tagging.{}", ext))
}

/// First line of `<transcoder> -version`.
pub async fn check_ffmpeg_available(runner: &SubprocessRunner) -> Result<String, ProcessError> {
    let output = runner.run(["-version"]).await?;
    Ok(output
        .stdout
        .lines()
        .next()
        .unwrap_or("unknown")
        .to_string())
}
