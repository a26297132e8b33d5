#![cfg(unix)]

mod common;

use common::{dir_entries, Behavior, FakeTranscoder};
use video_upload_backend::config::TranscoderConfig;
use video_upload_backend::error::{MetadataError, ProcessError};
use video_upload_backend::ffmpeg::{compress, tag_metadata, temp_path_for};
use video_upload_backend::metadata::{MetadataField, MetadataSet};
use video_upload_backend::process::SubprocessRunner;

fn default_fields() -> MetadataSet {
    MetadataSet::from_fields([
        MetadataField::new("title", "Example Video"),
        MetadataField::new("author", "Your Name"),
        MetadataField::new("description", "This is an example video with metadata."),
        MetadataField::new("comment", "Encoded using FFmpeg"),
    ])
    .unwrap()
}

#[tokio::test]
async fn compress_passes_codec_and_crf() {
    let dir = tempfile::tempdir().unwrap();
    let tool = FakeTranscoder::install(dir.path(), Behavior::Succeed);
    let runner = SubprocessRunner::new(tool.program());

    let input = dir.path().join("in.mov");
    let output = dir.path().join("out_compressed.mp4");
    std::fs::write(&input, b"raw").unwrap();

    compress(&runner, &TranscoderConfig::default(), &input, &output)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"ENCODED\nraw");
    assert_eq!(
        tool.calls(),
        vec![format!(
            "-y -i {} -vcodec libx264 -crf 28 {}",
            input.display(),
            output.display()
        )]
    );
}

#[tokio::test]
async fn compress_overwrites_previous_output() {
    let dir = tempfile::tempdir().unwrap();
    let tool = FakeTranscoder::install(dir.path(), Behavior::Succeed);
    let runner = SubprocessRunner::new(tool.program());

    let input = dir.path().join("in.mov");
    let output = dir.path().join("out_compressed.mp4");
    std::fs::write(&input, b"first").unwrap();
    compress(&runner, &TranscoderConfig::default(), &input, &output)
        .await
        .unwrap();

    std::fs::write(&input, b"second").unwrap();
    compress(&runner, &TranscoderConfig::default(), &input, &output)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"ENCODED\nsecond");
}

#[tokio::test]
async fn failed_compression_removes_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let tool = FakeTranscoder::install(dir.path(), Behavior::FailCompression);
    let runner = SubprocessRunner::new(tool.program());

    let input = dir.path().join("in.mov");
    let output = dir.path().join("out_compressed.mp4");
    std::fs::write(&input, b"raw").unwrap();

    let err = compress(&runner, &TranscoderConfig::default(), &input, &output)
        .await
        .unwrap_err();

    match &err.0 {
        ProcessError::Failed { code, stderr, .. } => {
            assert_eq!(*code, Some(1));
            assert!(stderr.contains("Invalid data found when processing input"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
    assert_eq!(std::fs::read(&input).unwrap(), b"raw");
}

#[tokio::test]
async fn tags_every_field_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let tool = FakeTranscoder::install(dir.path(), Behavior::Succeed);
    let runner = SubprocessRunner::new(tool.program());

    let file = dir.path().join("0123456789_compressed.mp4");
    std::fs::write(&file, b"ENCODED\n").unwrap();

    tag_metadata(&runner, &file, &default_fields()).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(&file).unwrap(),
        "ENCODED\n\
         title=Example Video\n\
         author=Your Name\n\
         description=This is an example video with metadata.\n\
         comment=Encoded using FFmpeg\n"
    );
    assert_eq!(tool.calls().len(), 4);
    assert!(tool.calls()[1].contains("-metadata author=Your Name -codec copy"));
    assert!(!temp_path_for(&file).exists());
}

#[tokio::test]
async fn failure_at_field_k_keeps_previous_fields_only() {
    let dir = tempfile::tempdir().unwrap();
    let tool = FakeTranscoder::install(dir.path(), Behavior::FailMetadataKey("description"));
    let runner = SubprocessRunner::new(tool.program());

    let file = dir.path().join("0123456789_compressed.mp4");
    std::fs::write(&file, b"ENCODED\n").unwrap();

    let err = tag_metadata(&runner, &file, &default_fields())
        .await
        .unwrap_err();

    match &err {
        MetadataError::Process { index, key, .. } => {
            assert_eq!(*index, 2);
            assert_eq!(key, "description");
        }
        other => panic!("unexpected error: {other}"),
    }
    // State right before field #2 was attempted
    assert_eq!(
        std::fs::read_to_string(&file).unwrap(),
        "ENCODED\ntitle=Example Video\nauthor=Your Name\n"
    );
    // "comment" was never attempted
    assert_eq!(tool.calls().len(), 3);
    assert!(!temp_path_for(&file).exists());

    let leftovers: Vec<_> = dir_entries(dir.path())
        .into_iter()
        .filter(|p| p.to_string_lossy().contains(".tagging."))
        .collect();
    assert!(leftovers.is_empty());
}
