use anyhow::{Context, Result};
use common::session::LinkPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DriveConfig {
    pub file_id: Option<String>,
    /// Path to the service account JSON key.
    pub service_account: Option<PathBuf>,
    pub refresh_interval_secs: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            file_id: None,
            service_account: None,
            refresh_interval_secs: 3600,
        }
    }
}

impl DriveConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.file_id.is_some() && self.service_account.is_some()
    }

    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub bot_token: Option<String>,
    pub admin_ids: Vec<u64>,
    pub cookies_file: PathBuf,
    pub log_level: String,
    pub output_dir: PathBuf,
    pub ytdlp_bin: String,
    pub session_ttl_secs: u64,
    pub link_policy: LinkPolicy,
    pub drive: DriveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            admin_ids: Vec::new(),
            cookies_file: PathBuf::from("/cookies/cookies.txt"),
            log_level: "INFO".into(),
            output_dir: PathBuf::from("/input"),
            ytdlp_bin: "yt-dlp".into(),
            session_ttl_secs: 30 * 60,
            link_policy: LinkPolicy::Replace,
            drive: DriveConfig::default(),
        }
    }
}

impl Config {
    /// Idle time after which a session is dropped. 0 disables expiry.
    #[must_use]
    pub fn session_ttl(&self) -> Option<Duration> {
        (self.session_ttl_secs > 0).then(|| Duration::from_secs(self.session_ttl_secs))
    }

    /// Overrides file settings with the deployment's environment variables.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = var("TELEGRAM_BOT_TOKEN") {
            self.bot_token = Some(token);
        }
        if let Some(ids) = var("TELEGRAM_ADMIN_IDS") {
            self.admin_ids = parse_admin_ids(&ids)?;
        }
        if let Some(path) = var("YT_DLP_COOKIES_FILE") {
            self.cookies_file = PathBuf::from(path);
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(dir) = var("DOWNLOADS_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(bin) = var("YT_DLP_BIN") {
            self.ytdlp_bin = bin;
        }
        if let Some(ttl) = var("KMVP_SESSION_TTL") {
            self.session_ttl_secs = ttl
                .trim()
                .parse()
                .with_context(|| format!("Invalid KMVP_SESSION_TTL: {ttl}"))?;
        }
        if let Some(policy) = var("KMVP_LINK_POLICY") {
            self.link_policy = policy.parse()?;
        }
        if let Some(id) = var("GOOGLE_DRIVE_COOKIES_FILE_ID") {
            self.drive.file_id = Some(id);
        }
        if let Some(path) = var("GOOGLE_DRIVE_SERVICE_ACCOUNT") {
            self.drive.service_account = Some(PathBuf::from(path));
        }
        if let Some(secs) = var("GOOGLE_DRIVE_REFRESH_INTERVAL") {
            self.drive.refresh_interval_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid GOOGLE_DRIVE_REFRESH_INTERVAL: {secs}"))?;
        }

        Ok(())
    }
}

/// Parses a comma separated list of numeric user ids, skipping blanks.
pub fn parse_admin_ids(list: &str) -> Result<Vec<u64>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().with_context(|| format!("Invalid admin id: {s}")))
        .collect()
}

fn default_path() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(format!("{home}/.config/kmvp/config.toml")))
}

/// Loads the TOML config. An explicit path must exist; the default location
/// is optional.
pub async fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match default_path() {
            Some(p) if tokio::fs::try_exists(&p).await.unwrap_or(false) => p,
            _ => return Ok(Config::default()),
        },
    };

    let content = tokio::fs::read_to_string(&path)
        .await
        .context(format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_deployment() {
        let config = Config::default();
        assert_eq!(config.output_dir, PathBuf::from("/input"));
        assert_eq!(config.cookies_file, PathBuf::from("/cookies/cookies.txt"));
        assert_eq!(config.drive.refresh_interval(), Some(Duration::from_secs(3600)));
        assert_eq!(config.link_policy, LinkPolicy::Replace);
        assert!(!config.drive.is_configured());
    }

    #[test]
    fn environment_overrides_file() {
        let mut config: Config = toml::from_str(
            r#"
            admin_ids = [1]
            output_dir = "/srv/in"
            link_policy = "reject"

            [drive]
            refresh_interval_secs = 60
            "#,
        )
        .unwrap();

        config
            .apply_env(env(&[
                ("TELEGRAM_BOT_TOKEN", "123:abc"),
                ("TELEGRAM_ADMIN_IDS", "10, 20,,"),
                ("GOOGLE_DRIVE_COOKIES_FILE_ID", "file-id"),
                ("GOOGLE_DRIVE_SERVICE_ACCOUNT", "/secrets/sa.json"),
                ("LOG_LEVEL", ""),
            ]))
            .unwrap();

        assert_eq!(config.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.admin_ids, vec![10, 20]);
        assert_eq!(config.output_dir, PathBuf::from("/srv/in"));
        assert_eq!(config.link_policy, LinkPolicy::Reject);
        assert_eq!(config.log_level, "INFO");
        assert!(config.drive.is_configured());
        assert_eq!(config.drive.refresh_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("TELEGRAM_ADMIN_IDS", "1,abc")])).is_err());
        assert!(config.apply_env(env(&[("KMVP_LINK_POLICY", "queue")])).is_err());
        assert!(
            config
                .apply_env(env(&[("GOOGLE_DRIVE_REFRESH_INTERVAL", "hourly")]))
                .is_err()
        );
    }

    #[test]
    fn zero_session_ttl_disables_expiry() {
        let mut config = Config::default();
        assert_eq!(config.session_ttl(), Some(Duration::from_secs(1800)));

        config.apply_env(env(&[("KMVP_SESSION_TTL", "0")])).unwrap();
        assert_eq!(config.session_ttl_secs, 0);
        assert_eq!(config.session_ttl(), None);
    }

    #[tokio::test]
    async fn explicit_config_file_must_exist() {
        assert!(load_config(Some(Path::new("/nonexistent/kmvp.toml"))).await.is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "session_ttl_secs = 5\n").unwrap();
        let config = load_config(Some(&path)).await.unwrap();
        assert_eq!(config.session_ttl(), Some(Duration::from_secs(5)));
        assert_eq!(config.ytdlp_bin, "yt-dlp");
    }
}
