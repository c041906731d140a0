//! Watch-folder ingestion.
//!
//! Every `.txt` file dropped into the folder is read as a list of
//! identifiers, processed as one batch and then moved to `processed/`.
//! Files that cannot be read as identifier lists go to `failed/` so they
//! are not picked up again.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use figura_common::config::IngestionConfig;
use figura_ingestion::{BatchReport, PaperProcessor};
use tokio::fs;
use tracing::{debug, info, warn};

const PROCESSED_DIR: &str = "processed";
const FAILED_DIR: &str = "failed";

pub struct FolderWatcher {
    folder: PathBuf,
    interval: Duration,
}

impl FolderWatcher {
    pub fn new(folder: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            folder: folder.into(),
            interval,
        }
    }

    pub fn from_config(cfg: &IngestionConfig) -> Self {
        Self::new(&cfg.watch_folder, Duration::from_secs(cfg.watch_interval_secs.max(1)))
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.folder.join(PROCESSED_DIR)
    }

    pub fn failed_dir(&self) -> PathBuf {
        self.folder.join(FAILED_DIR)
    }

    /// Identifier files waiting in the folder, oldest name first.
    pub async fn pending_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&self.folder)
            .await
            .with_context(|| format!("Failed to read watch folder {}", self.folder.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Move a handled file into `processed/`, replacing any file of the
    /// same name there.
    pub async fn archive(&self, path: &Path) -> anyhow::Result<PathBuf> {
        move_into(path, &self.processed_dir()).await
    }

    /// Move a file that could not be read into `failed/`.
    pub async fn reject(&self, path: &Path) -> anyhow::Result<PathBuf> {
        move_into(path, &self.failed_dir()).await
    }

    /// Process every pending file once.
    pub async fn poll_once(&self, processor: &PaperProcessor) -> anyhow::Result<Vec<BatchReport>> {
        let files = self.pending_files().await?;
        if files.is_empty() {
            debug!("No new files in {}", self.folder.display());
            return Ok(vec![]);
        }

        let mut reports = Vec::with_capacity(files.len());
        for file in files {
            info!("Processing {}", file.display());
            match processor.process_file(&file).await {
                Ok(report) => {
                    info!(
                        "{}: {} succeeded, {} failed",
                        file.display(),
                        report.succeeded,
                        report.failed
                    );
                    self.archive(&file).await?;
                    reports.push(report);
                }
                Err(e) => {
                    let target = self.reject(&file).await?;
                    warn!("Moved unreadable {} to {}: {:#}", file.display(), target.display(), e);
                }
            }
        }
        Ok(reports)
    }

    /// Poll until Ctrl-C.
    pub async fn run(&self, processor: &PaperProcessor) -> anyhow::Result<()> {
        fs::create_dir_all(&self.folder)
            .await
            .with_context(|| format!("Failed to create watch folder {}", self.folder.display()))?;
        info!(
            "Watching {} every {}s (Ctrl-C to stop)",
            self.folder.display(),
            self.interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.interval);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Watcher stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once(processor).await {
                        warn!("Watch poll failed: {:#}", e);
                    }
                }
            }
        }
    }
}

async fn move_into(path: &Path, dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    let name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?;
    let target = dir.join(name);
    fs::rename(path, &target)
        .await
        .with_context(|| format!("Failed to move {} to {}", path.display(), target.display()))?;
    Ok(target)
}
