use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::Config;
use crate::naming;

/// Deletes `path` on drop unless [`commit`](PartialFile::commit) was called.
///
/// Wraps any file a stage writes before it is known to be good, so early
/// returns, errors and cancelled requests do not leave partial outputs behind.
#[derive(Debug)]
pub struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commit(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("[storage] 🧹 Removed partial file {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("[storage] Failed to remove partial file {:?}: {}", self.path, e),
        }
    }
}

/// Names of uploads currently moving through the pipeline.
///
/// A name is claimed before any of its files exist and released when the
/// last [`NameClaim`] for it drops. Retention leaves claimed names alone.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<Mutex<HashSet<String>>>);

impl InFlight {
    fn names(&self) -> MutexGuard<'_, HashSet<String>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `None` if `name` is already claimed.
    pub fn claim(&self, name: &str) -> Option<NameClaim> {
        if !self.names().insert(name.to_string()) {
            return None;
        }
        Some(NameClaim {
            name: name.to_string(),
            registry: self.clone(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().contains(name)
    }
}

#[derive(Debug)]
pub struct NameClaim {
    name: String,
    registry: InFlight,
}

impl Drop for NameClaim {
    fn drop(&mut self) {
        self.registry.names().remove(&self.name);
    }
}

/// Where one upload lives on disk. Both paths derive from the same name,
/// which stays claimed for as long as this value is alive.
#[derive(Debug)]
pub struct StoredPaths {
    pub name: String,
    pub original: PathBuf,
    pub compressed: PathBuf,
    _claim: NameClaim,
}

#[derive(Debug, Clone)]
pub struct Storage {
    originals_dir: PathBuf,
    compressed_dir: PathBuf,
    name_length: usize,
    max_attempts: usize,
    in_flight: InFlight,
}

impl Storage {
    pub fn new(originals_dir: impl Into<PathBuf>, compressed_dir: impl Into<PathBuf>) -> Self {
        Self {
            originals_dir: originals_dir.into(),
            compressed_dir: compressed_dir.into(),
            name_length: 10,
            max_attempts: 5,
            in_flight: InFlight::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            originals_dir: config.originals_dir.clone(),
            compressed_dir: config.compressed_dir.clone(),
            name_length: config.naming.length,
            max_attempts: config.naming.max_attempts.max(1),
            in_flight: InFlight::default(),
        }
    }

    pub fn originals_dir(&self) -> &Path {
        &self.originals_dir
    }

    pub fn compressed_dir(&self) -> &Path {
        &self.compressed_dir
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub async fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.originals_dir).await?;
        fs::create_dir_all(&self.compressed_dir).await?;
        Ok(())
    }

    /// Persists `bytes` verbatim as `<name><extension>` in the originals
    /// directory, picking a fresh random name on collision.
    ///
    /// A name is taken if another upload holds it, if any original is stored
    /// under it whatever its extension, or if its compressed output exists.
    pub async fn store(&self, file_name: &str, bytes: &[u8]) -> io::Result<StoredPaths> {
        let length = self.name_length;
        self.store_with(file_name, bytes, || naming::generate(length))
            .await
    }

    pub(crate) async fn store_with<F>(
        &self,
        file_name: &str,
        bytes: &[u8],
        mut next_name: F,
    ) -> io::Result<StoredPaths>
    where
        F: FnMut() -> String,
    {
        let extension = extension_of(file_name);

        for attempt in 1..=self.max_attempts {
            let name = next_name();
            let Some(claim) = self.in_flight.claim(&name) else {
                debug!("[storage] Name {} is in flight (attempt {})", name, attempt);
                continue;
            };
            let original = self.originals_dir.join(format!("{}{}", name, extension));
            let compressed = self.compressed_dir.join(compressed_file_name(&name));

            if let Some(existing) = stored_under(&self.originals_dir, &name).await? {
                debug!("[storage] Name {} already used by {:?} (attempt {})", name, existing, attempt);
                continue;
            }
            if fs::try_exists(&compressed).await? {
                debug!("[storage] Name {} already used by {:?} (attempt {})", name, compressed, attempt);
                continue;
            }

            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&original)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("[storage] Name {} already used by {:?} (attempt {})", name, original, attempt);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let guard = PartialFile::new(&original);
            file.write_all(bytes).await?;
            file.sync_all().await?;
            guard.commit();

            return Ok(StoredPaths {
                name,
                original,
                compressed,
                _claim: claim,
            });
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name after {} attempts", self.max_attempts),
        ))
    }
}

/// First entry in `dir` stored as `name` or `name.<ext>`.
async fn stored_under(dir: &Path, name: &str) -> io::Result<Option<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        let taken = match file_name.strip_prefix(name) {
            Some(rest) => rest.is_empty() || rest.starts_with('.'),
            None => false,
        };
        if taken {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

/// Upload name a stored file belongs to: everything before the first `.` or
/// `_`. Covers originals, compressed outputs and tagging temporaries.
pub fn upload_name_of(file_name: &str) -> &str {
    file_name
        .split(&['.', '_'][..])
        .next()
        .unwrap_or(file_name)
}

pub fn compressed_file_name(name: &str) -> String {
    format!("{}_compressed.mp4", name)
}

/// Extension of the last path component, leading dot included and case
/// preserved. Empty when there is none or the name ends in a dot.
pub fn extension_of(file_name: &str) -> &str {
    let base = file_name
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or(file_name);
    match base.rfind('.') {
        Some(idx) if idx + 1 < base.len() => &base[idx..],
        _ => "",
    }
}
