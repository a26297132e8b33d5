use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::metadata::MetadataField;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub originals_dir: String,
    pub compressed_dir: String,
    pub max_file_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            originals_dir: "UploadedVideos".to_string(),
            compressed_dir: "CompressedVideos".to_string(),
            max_file_size: 500 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub executable_path: String,
    pub video_codec: String,
    pub crf: u8,
    /// 0 = wait for the transcoder indefinitely
    pub timeout_secs: u64,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            executable_path: "ffmpeg".to_string(),
            video_codec: "libx264".to_string(),
            crf: 28,
            timeout_secs: 0,
        }
    }
}

/// Shortest accepted upload name. Fewer digits make collisions, and so
/// exhausted retries, likely under ordinary load.
pub const MIN_NAME_LENGTH: usize = 6;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub length: usize,
    pub max_attempts: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            length: 10,
            max_attempts: 5,
        }
    }
}

/// What the pipeline does when a metadata field cannot be applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataFailurePolicy {
    /// Fail the upload and discard the partially tagged output.
    #[default]
    Fail,
    /// Log the failure and report the output as partially tagged.
    Warn,
}

impl FromStr for MetadataFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "warn" => Ok(Self::Warn),
            other => anyhow::bail!("unknown metadata failure policy: {}", other),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub failure_policy: MetadataFailurePolicy,
    pub fields: Vec<MetadataField>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            failure_policy: MetadataFailurePolicy::default(),
            fields: vec![
                MetadataField::new("title", "Example Video"),
                MetadataField::new("author", "Your Name"),
                MetadataField::new("description", "This is an example video with metadata."),
                MetadataField::new("comment", "Encoded using FFmpeg"),
            ],
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Files older than this are removed by the retention task. 0 disables it.
    pub retention_secs: u64,
    pub cleanup_interval_secs: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub server: ServerConfig,
    pub transcoder: TranscoderConfig,
    pub naming: NamingConfig,
    pub metadata: MetadataConfig,
    pub limits: LimitsConfig,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub originals_dir: PathBuf,
    pub compressed_dir: PathBuf,
    pub max_file_size: u64,
    pub transcoder: TranscoderConfig,
    pub naming: NamingConfig,
    pub metadata: MetadataConfig,
    pub limits: LimitsConfig,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_with(&base_dir, |key| std::env::var(key).ok())
    }

    /// Loads `config.toml` from `base_dir` (if present) and applies overrides
    /// from `lookup`, which stands in for the process environment.
    pub fn load_with<F>(base_dir: &Path, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = base_dir.join("config.toml");
        let file = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {:?}", config_path))?;
            toml::from_str::<ConfigFile>(&content)
                .with_context(|| format!("failed to parse {:?}", config_path))?
        } else {
            ConfigFile::default()
        };

        let ConfigFile {
            server,
            mut transcoder,
            naming,
            mut metadata,
            limits,
        } = file;

        // Env vars override the config file
        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(server.port);

        let originals_dir = lookup("ORIGINALS_DIR").unwrap_or(server.originals_dir);
        let compressed_dir = lookup("COMPRESSED_DIR").unwrap_or(server.compressed_dir);

        let max_file_size = lookup("MAX_FILE_SIZE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(server.max_file_size);

        if let Some(path) = lookup("FFMPEG_PATH") {
            transcoder.executable_path = path;
        }
        if let Some(secs) = lookup("TRANSCODE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            transcoder.timeout_secs = secs;
        }
        if let Some(policy) = lookup("METADATA_FAILURE_POLICY") {
            metadata.failure_policy = policy
                .parse()
                .context("invalid METADATA_FAILURE_POLICY")?;
        }

        if naming.max_attempts == 0 {
            anyhow::bail!("naming.max_attempts must be at least 1");
        }
        if naming.length < MIN_NAME_LENGTH {
            anyhow::bail!(
                "naming.length must be at least {} (got {})",
                MIN_NAME_LENGTH,
                naming.length
            );
        }

        Ok(Self {
            port,
            originals_dir: resolve_dir(base_dir, &originals_dir),
            compressed_dir: resolve_dir(base_dir, &compressed_dir),
            max_file_size,
            transcoder,
            naming,
            metadata,
            limits,
        })
    }

    /// Defaults rooted at `base_dir` instead of the working directory.
    pub fn with_base_dir(base_dir: &Path) -> Self {
        let server = ServerConfig::default();
        Self {
            port: server.port,
            originals_dir: base_dir.join(server.originals_dir),
            compressed_dir: base_dir.join(server.compressed_dir),
            max_file_size: server.max_file_size,
            transcoder: TranscoderConfig::default(),
            naming: NamingConfig::default(),
            metadata: MetadataConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

fn resolve_dir(base_dir: &Path, dir: &str) -> PathBuf {
    let path = Path::new(dir);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
