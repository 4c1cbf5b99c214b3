use std::ffi::OsString;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use common::executor::{AudioFetcher, FetchRequest};
use serde::Deserialize;
use tokio::process::Command;

/// Drives the `yt-dlp` executable.
pub struct YtDlp {
    bin: String,
}

impl YtDlp {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn run(&self, args: &[OsString]) -> Result<std::process::Output> {
        tracing::debug!("Running {} {:?}", self.bin, args);
        Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to spawn {}", self.bin))
    }
}

#[derive(Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
}

#[async_trait]
impl AudioFetcher for YtDlp {
    async fn guess_title(&self, url: &str) -> Result<Option<String>> {
        let args: Vec<OsString> = ["--dump-json", "--skip-download", "--no-playlist", "--quiet", "--", url]
            .into_iter()
            .map(OsString::from)
            .collect();
        let output = self.run(&args).await?;

        if !output.status.success() {
            anyhow::bail!(
                "yt-dlp metadata probe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let info: YtDlpInfo =
            serde_json::from_slice(&output.stdout).context("Failed to parse yt-dlp metadata")?;
        Ok(info.title)
    }

    async fn fetch_audio(&self, request: &FetchRequest) -> Result<()> {
        tracing::info!("Starting yt-dlp download for URL: {}", request.url);
        let output = self.run(&download_args(request)).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines() {
            tracing::debug!(target: "yt_dlp", "{}", line);
        }
        for line in stderr.lines() {
            tracing::warn!(target: "yt_dlp", "{}", line);
        }

        if !output.status.success() {
            anyhow::bail!("yt-dlp exited with {}:\n{}", output.status, stderr.trim());
        }

        tracing::info!("yt-dlp download finished for URL: {}", request.url);
        Ok(())
    }
}

/// Arguments for extracting best-quality audio as `request.format`.
fn download_args(request: &FetchRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--format".into(),
        "bestaudio/best".into(),
        "--extract-audio".into(),
        "--audio-format".into(),
        request.format.codec.clone().into(),
        "--audio-quality".into(),
        format!("{}K", request.format.quality).into(),
        "--no-playlist".into(),
        "--force-overwrites".into(),
        "--output".into(),
        request.output_template.clone().into(),
    ];

    if let Some(cookies) = &request.cookies {
        args.push("--cookies".into());
        args.push(cookies.clone().into());
    }

    args.push("--".into());
    args.push(request.url.clone().into());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::executor::AudioFormat;
    use std::path::PathBuf;

    fn request(cookies: Option<&str>) -> FetchRequest {
        FetchRequest {
            url: "https://www.youtube.com/watch?v=abc".into(),
            output_template: PathBuf::from("/tmp/ytmp3_x/track.%(ext)s"),
            format: AudioFormat::default(),
            cookies: cookies.map(PathBuf::from),
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn extracts_mp3_at_192k() {
        let args = strings(&download_args(&request(None)));
        let pos = args.iter().position(|a| a == "--audio-format").unwrap();
        assert_eq!(args[pos + 1], "mp3");
        let pos = args.iter().position(|a| a == "--audio-quality").unwrap();
        assert_eq!(args[pos + 1], "192K");
        assert!(!args.contains(&"--cookies".to_owned()));
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn passes_cookie_file_through() {
        let args = strings(&download_args(&request(Some("/cookies/cookies.txt"))));
        let pos = args.iter().position(|a| a == "--cookies").unwrap();
        assert_eq!(args[pos + 1], "/cookies/cookies.txt");
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let ytdlp = YtDlp::new("definitely-not-yt-dlp-binary");
        assert!(ytdlp.guess_title("https://youtu.be/x").await.is_err());
        assert!(ytdlp.fetch_audio(&request(None)).await.is_err());
    }
}
