use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::DriveConfig;
use crate::fetchers::drive::DriveClient;

/// Keeps the yt-dlp cookie file in sync with a copy kept on Google Drive.
pub struct CookieSync {
    drive: DriveConfig,
    target: PathBuf,
}

impl CookieSync {
    pub fn new(drive: DriveConfig, target: impl Into<PathBuf>) -> Self {
        Self {
            drive,
            target: target.into(),
        }
    }

    /// Pulls the remote cookie file over the local one.
    pub async fn refresh(&self) -> Result<()> {
        let (Some(file_id), Some(service_account)) =
            (&self.drive.file_id, &self.drive.service_account)
        else {
            anyhow::bail!("Google Drive config missing, cannot update cookies");
        };

        let client = DriveClient::from_service_account(service_account).await?;
        let content = client.download(file_id).await?;
        write_atomically(&self.target, &content).await?;

        tracing::info!(
            "Fetched {} bytes of cookies from Google Drive into {}",
            content.len(),
            self.target.display()
        );
        Ok(())
    }

    /// Refreshes on a fixed interval until the process exits. The first tick
    /// only fires when the cookie file is missing at startup.
    pub fn spawn_periodic(self: Arc<Self>) {
        let Some(period) = self.drive.refresh_interval() else {
            tracing::debug!("Periodic cookie refresh disabled");
            return;
        };

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await;

            if !self.target.is_file()
                && let Err(e) = self.refresh().await
            {
                tracing::error!("Error fetching cookies from Google Drive: {:#}", e);
            }

            loop {
                interval.tick().await;
                if let Err(e) = self.refresh().await {
                    tracing::error!("Error fetching cookies from Google Drive: {:#}", e);
                }
            }
        });
    }
}

/// Replaces `target` in one rename so concurrent readers never see a partial
/// file.
pub async fn write_atomically(target: &Path, content: &[u8]) -> Result<()> {
    let file_name = target
        .file_name()
        .with_context(|| format!("Not a file path: {}", target.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".part");
    let tmp = target.with_file_name(tmp_name);

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    tokio::fs::write(&tmp, content)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, target)
        .await
        .with_context(|| format!("Failed to replace {}", target.display()))?;

    Ok(())
}
