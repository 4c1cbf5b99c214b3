use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::candidate::ResolvedMetadata;
use crate::naming;

/// Container and quality the fetcher transcodes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    pub codec: String,
    /// Target bitrate in kbps.
    pub quality: String,
}

impl AudioFormat {
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.codec
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            codec: "mp3".into(),
            quality: "192".into(),
        }
    }
}

/// Everything the external fetcher needs to produce one audio file.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    pub url: String,
    /// Output path template, may contain `%(ext)s`.
    pub output_template: PathBuf,
    pub format: AudioFormat,
    /// Opaque credential material handed through untouched.
    pub cookies: Option<PathBuf>,
}

#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Best guess at the title of the media behind `url`, without downloading it.
    async fn guess_title(&self, url: &str) -> Result<Option<String>>;

    async fn fetch_audio(&self, request: &FetchRequest) -> Result<()>;
}

/// Writes title, artist and album onto an audio file in place.
pub trait TagWriter: Send + Sync {
    fn write_tags(&self, path: &Path, metadata: &ResolvedMetadata) -> Result<()>;
}

const WORKSPACE_PREFIX: &str = "ytmp3_";
const ARTIFACT_STEM: &str = "track";

/// Downloads, tags and files one track into the shared output directory.
pub struct FetchAndTag {
    fetcher: Arc<dyn AudioFetcher>,
    tagger: Arc<dyn TagWriter>,
    output_dir: PathBuf,
    cookies: Option<PathBuf>,
    format: AudioFormat,
}

impl FetchAndTag {
    pub fn new(
        fetcher: Arc<dyn AudioFetcher>,
        tagger: Arc<dyn TagWriter>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            tagger,
            output_dir: output_dir.into(),
            cookies: None,
            format: AudioFormat::default(),
        }
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: Option<PathBuf>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn fetcher(&self) -> &Arc<dyn AudioFetcher> {
        &self.fetcher
    }

    /// Cookie file to pass along, if one is configured and currently present.
    fn cookie_file(&self) -> Option<PathBuf> {
        self.cookies.as_ref().filter(|p| p.is_file()).cloned()
    }

    /// Runs the whole pipeline and returns the final path of the track.
    /// The temporary workspace is removed on every exit path.
    pub async fn run(&self, url: &str, metadata: &ResolvedMetadata) -> Result<PathBuf> {
        let workspace = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()
            .context("Failed to create temporary workspace")?;

        let ext = self.format.extension().to_owned();
        let artifact = workspace.path().join(format!("{ARTIFACT_STEM}.{ext}"));
        let request = FetchRequest {
            url: url.to_owned(),
            output_template: workspace.path().join(format!("{ARTIFACT_STEM}.%(ext)s")),
            format: self.format.clone(),
            cookies: self.cookie_file(),
        };

        tracing::info!("Fetching {} into {}", url, workspace.path().display());
        self.fetcher
            .fetch_audio(&request)
            .await
            .with_context(|| format!("Failed to fetch audio from {url}"))?;

        if !artifact.is_file() {
            anyhow::bail!("Fetcher reported success but {} is missing", artifact.display());
        }

        let tagger = Arc::clone(&self.tagger);
        let output_dir = self.output_dir.clone();
        let metadata = metadata.clone();
        let dest = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            tagger
                .write_tags(&artifact, &metadata)
                .with_context(|| format!("Failed to tag {}", artifact.display()))?;
            file_into(&artifact, &output_dir, &metadata, &ext)
        })
        .await
        .context("Tagging task panicked")??;

        tracing::info!("Filed {} as {}", url, dest.display());
        drop(workspace);
        Ok(dest)
    }
}

/// Claims a collision-free name in `output_dir` and moves `artifact` onto it.
fn file_into(
    artifact: &Path,
    output_dir: &Path,
    metadata: &ResolvedMetadata,
    ext: &str,
) -> Result<PathBuf> {
    let dest = naming::claim_destination(output_dir, &metadata.artist, &metadata.title, ext)
        .with_context(|| format!("Failed to reserve a file name in {}", output_dir.display()))?;

    if let Err(e) = naming::relocate(artifact, &dest) {
        let _ = std::fs::remove_file(&dest);
        return Err(e).with_context(|| format!("Failed to move track to {}", dest.display()));
    }

    Ok(dest)
}
