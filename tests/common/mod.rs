#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// How the stand-in transcoder behaves.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    /// Writes a partial output, then exits 1 on the compression call.
    FailCompression,
    /// Exits 1 when asked to set this metadata key.
    FailMetadataKey(&'static str),
}

/// Shell script that honours the transcoder's command-line contract without
/// touching real media:
///
/// * compression writes `ENCODED\n` followed by the input bytes;
/// * tagging copies the input and appends `key=value\n`.
///
/// Every invocation's argument list is appended to `log`.
pub struct FakeTranscoder {
    pub path: PathBuf,
    pub log: PathBuf,
}

impl FakeTranscoder {
    pub fn install(dir: &Path, behavior: Behavior) -> Self {
        let path = dir.join("fake-ffmpeg");
        let log = dir.join("fake-ffmpeg.log");

        let on_compress = match behavior {
            Behavior::FailCompression => {
                "printf 'partial' > \"$out\"\n  echo \"$input: Invalid data found when processing input\" >&2\n  exit 1\n"
            }
            _ => "",
        };
        let on_tag = match behavior {
            Behavior::FailMetadataKey(key) => format!(
                "case \"$meta\" in\n  {}=*) printf 'partial' > \"$out\"; echo \"cannot set $meta\" >&2; exit 1 ;;\nesac\n",
                key
            ),
            _ => String::new(),
        };

        let script = format!(
            r#"#!/bin/sh
echo "$@" >> '{log}'
input=''
meta=''
out=''
while [ $# -gt 0 ]; do
  case "$1" in
    -y) shift ;;
    -i) input="$2"; shift 2 ;;
    -metadata) meta="$2"; shift 2 ;;
    -vcodec|-crf|-codec) shift 2 ;;
    *) out="$1"; shift ;;
  esac
done
if [ -z "$meta" ]; then
  {on_compress}
  {{ printf 'ENCODED\n'; cat "$input"; }} > "$out"
  exit 0
fi
{on_tag}
cat "$input" > "$out"
printf '%s\n' "$meta" >> "$out"
"#,
            log = log.display(),
            on_compress = on_compress,
            on_tag = on_tag,
        );

        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        Self { path, log }
    }

    pub fn program(&self) -> String {
        self.path.display().to_string()
    }

    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

pub fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map(|rd| rd.map(|e| e.unwrap().path()).collect())
        .unwrap_or_default();
    entries.sort();
    entries
}

/// Hand-built `multipart/form-data` body.
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "----video-upload-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn file(mut self, name: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: video/mp4\r\n\r\n",
                self.boundary, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    /// Returns the content type header value and the encoded body.
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}
