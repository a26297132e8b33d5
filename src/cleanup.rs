use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::storage::{upload_name_of, InFlight};

/// Marker in the names of in-flight metadata temporaries.
const TAGGING_MARKER: &str = ".tagging.";

/// Remove `*.tagging.*` files left behind by a crash mid-tagging.
pub async fn sweep_stale_temp_files(dir: &Path) -> anyhow::Result<usize> {
    if !fs::try_exists(dir).await? {
        return Ok(0);
    }

    let mut removed = 0;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_temp = path
            .file_name()
            .map(|n| n.to_string_lossy().contains(TAGGING_MARKER))
            .unwrap_or(false);
        if !is_temp || !entry.file_type().await?.is_file() {
            continue;
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                removed += 1;
                info!("[cleanup] 🧹 Removed stale temporary {:?}", path);
            }
            Err(e) => warn!("[cleanup] Failed to remove {:?}: {}", path, e),
        }
    }

    Ok(removed)
}

/// Age-based removal of stored uploads.
///
/// Files belonging to an upload that is still in flight are skipped, so a
/// short `max_age` cannot pull an original out from under the transcoder.
#[derive(Debug, Clone)]
pub struct Retention {
    dirs: Vec<PathBuf>,
    max_age: Duration,
    in_flight: InFlight,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetentionReport {
    pub deleted: usize,
    pub freed: u64,
    pub skipped_in_flight: usize,
}

impl Retention {
    pub fn new(config: &Config, in_flight: InFlight) -> Self {
        Self {
            dirs: vec![config.originals_dir.clone(), config.compressed_dir.clone()],
            max_age: Duration::from_secs(config.limits.retention_secs),
            in_flight,
        }
    }

    /// One pass over every storage directory as of `now`.
    pub async fn sweep(&self, now: SystemTime) -> RetentionReport {
        let mut report = RetentionReport::default();
        for dir in &self.dirs {
            if let Err(e) = self.sweep_dir(dir, now, &mut report).await {
                error!("[retention] Error cleaning {:?}: {}", dir, e);
            }
        }
        report
    }

    async fn sweep_dir(
        &self,
        dir: &Path,
        now: SystemTime,
        report: &mut RetentionReport,
    ) -> anyhow::Result<()> {
        if !fs::try_exists(dir).await? {
            return Ok(());
        }

        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(age) = expired_age(&entry, now, self.max_age).await else {
                continue;
            };

            let file_name = entry.file_name();
            if self.in_flight.contains(upload_name_of(&file_name.to_string_lossy())) {
                debug!("[retention] Skipping in-flight {:?}", path);
                report.skipped_in_flight += 1;
                continue;
            }

            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(&path).await {
                Ok(()) => {
                    report.deleted += 1;
                    report.freed += size;
                    info!(
                        "[retention] 🗑️  Deleted {:?} ({:.1} min old)",
                        path,
                        age.as_secs_f64() / 60.0
                    );
                }
                Err(e) => error!("[retention] ❌ Failed to delete {:?}: {}", path, e),
            }
        }
        Ok(())
    }

    /// Sweep every `every` (at least a minute) until the task is aborted.
    pub fn spawn(self, every: Duration) -> tokio::task::JoinHandle<()> {
        let every = every.max(Duration::from_secs(60));
        info!(
            "[retention] 🧹 Removing uploads older than {}s every {}s",
            self.max_age.as_secs(),
            every.as_secs()
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let report = self.sweep(SystemTime::now()).await;
                if report.deleted > 0 {
                    info!(
                        "[retention] ✅ {} files deleted, {:.2} MB freed",
                        report.deleted,
                        report.freed as f64 / 1024.0 / 1024.0
                    );
                }
            }
        })
    }
}

/// Age of a regular file older than `max_age`; `None` for anything else,
/// including files modified in the future.
async fn expired_age(entry: &fs::DirEntry, now: SystemTime, max_age: Duration) -> Option<Duration> {
    let metadata = match entry.metadata().await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return None,
        Err(e) => {
            warn!("[retention] Failed to stat {:?}: {}", entry.path(), e);
            return None;
        }
    };
    let modified = metadata.modified().ok()?;
    now.duration_since(modified).ok().filter(|age| *age > max_age)
}
