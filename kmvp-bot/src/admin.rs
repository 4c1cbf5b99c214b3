use std::collections::HashSet;

use common::status::{self, CookieStatus, Diagnostics, Status};

use crate::context::AppContext;

pub const MSG_COOKIES_UPDATED: &str = "✅ Updated cookies.txt from Google Drive.";
pub const MSG_COOKIES_FAILED: &str = "❌ Failed to update cookies.txt from Google Drive.";
pub const MSG_LOG_LEVEL_USAGE: &str = "Usage: /set_log_level DEBUG|INFO|WARNING|ERROR";

#[derive(Debug, thiserror::Error)]
#[error("❌ Not authorized.")]
pub struct NotAuthorized;

/// Telegram user ids allowed to run operator commands.
#[derive(Debug, Default, Clone)]
pub struct Operators(HashSet<u64>);

impl Operators {
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn authorize(&self, user: u64) -> Result<(), NotAuthorized> {
        if self.0.contains(&user) {
            Ok(())
        } else {
            tracing::warn!("Rejected operator command from {}", user);
            Err(NotAuthorized)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Status,
    UpdateCookies,
    SetLogLevel(String),
    Diagnostics,
}

/// Runs an operator command and returns the reply text. Callers outside the
/// allow-list get the rejection message instead.
pub async fn execute(ctx: &AppContext, user: u64, command: AdminCommand) -> String {
    if let Err(rejection) = ctx.operators.authorize(user) {
        return rejection.to_string();
    }

    match command {
        AdminCommand::Status => Status {
            log_level: ctx.log.level(),
            cookies: CookieStatus::probe(&ctx.cookies_file),
        }
        .render(),
        AdminCommand::UpdateCookies => match ctx.cookie_sync.refresh().await {
            Ok(()) => MSG_COOKIES_UPDATED.to_owned(),
            Err(e) => {
                tracing::error!("Error fetching cookies from Google Drive: {:#}", e);
                MSG_COOKIES_FAILED.to_owned()
            }
        },
        AdminCommand::SetLogLevel(level) if level.trim().is_empty() => MSG_LOG_LEVEL_USAGE.to_owned(),
        AdminCommand::SetLogLevel(level) => match ctx.log.set_level(&level) {
            Ok(applied) => format!("Log level set to {applied}"),
            Err(e) => {
                tracing::error!("Failed to change log level: {:#}", e);
                format!("Failed to change log level: {e}")
            }
        },
        AdminCommand::Diagnostics => Diagnostics {
            uptime: ctx.started.elapsed(),
            host: status::hostname(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            platform: status::platform(),
            log_level: ctx.log.level(),
            cookies: CookieStatus::probe(&ctx.cookies_file),
            active_sessions: ctx.conversation.sessions().active_count(),
        }
        .render(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriveConfig;
    use crate::cookies::CookieSync;
    use crate::fetchers::ytdlp::YtDlp;
    use crate::logging::LogControl;
    use crate::tagging::LoftyTagger;
    use anyhow::Result;
    use async_trait::async_trait;
    use common::candidate::CandidateRecord;
    use common::conversation::Conversation;
    use common::executor::FetchAndTag;
    use common::search::RecordingSearch;
    use common::session::SessionStore;
    use std::sync::Arc;
    use std::time::Instant;

    const OPERATOR: u64 = 1000;
    const STRANGER: u64 = 2000;

    struct NoSearch;

    #[async_trait]
    impl RecordingSearch for NoSearch {
        async fn search(&self, _: &str, _: u32, _: u32) -> Result<Vec<CandidateRecord>> {
            Ok(Vec::new())
        }
    }

    fn context(dir: &tempfile::TempDir) -> AppContext {
        let cookies_file = dir.path().join("cookies.txt");
        let executor = FetchAndTag::new(Arc::new(YtDlp::new("yt-dlp")), Arc::new(LoftyTagger), dir.path());
        AppContext {
            conversation: Conversation::new(Arc::new(NoSearch), executor, SessionStore::default()),
            operators: Operators::new([OPERATOR]),
            log: LogControl::detached("INFO"),
            cookie_sync: Arc::new(CookieSync::new(DriveConfig::default(), cookies_file.clone())),
            cookies_file,
            started: Instant::now(),
        }
    }

    #[tokio::test]
    async fn strangers_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        for command in [
            AdminCommand::Status,
            AdminCommand::UpdateCookies,
            AdminCommand::SetLogLevel("DEBUG".into()),
            AdminCommand::Diagnostics,
        ] {
            assert_eq!(execute(&ctx, STRANGER, command).await, "❌ Not authorized.");
        }
        assert_eq!(ctx.log.level(), "INFO");
    }

    #[tokio::test]
    async fn status_reports_level_and_cookie_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        let before = execute(&ctx, OPERATOR, AdminCommand::Status).await;
        assert!(before.contains("Log Level: INFO"));
        assert!(before.contains("Cookies.txt: ❌"));

        std::fs::write(&ctx.cookies_file, "# Netscape HTTP Cookie File").unwrap();
        let after = execute(&ctx, OPERATOR, AdminCommand::Status).await;
        assert!(after.contains("Cookies.txt: ✅"));
        assert!(after.contains("Last updated:"));
    }

    #[tokio::test]
    async fn set_log_level_changes_reported_level() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        assert_eq!(
            execute(&ctx, OPERATOR, AdminCommand::SetLogLevel(String::new())).await,
            MSG_LOG_LEVEL_USAGE
        );
        assert_eq!(
            execute(&ctx, OPERATOR, AdminCommand::SetLogLevel("debug".into())).await,
            "Log level set to DEBUG"
        );
        assert_eq!(ctx.log.level(), "DEBUG");
    }

    #[tokio::test]
    async fn update_cookies_without_drive_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        assert_eq!(
            execute(&ctx, OPERATOR, AdminCommand::UpdateCookies).await,
            MSG_COOKIES_FAILED
        );
    }

    #[tokio::test]
    async fn diagnostics_include_runtime_details() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        let text = execute(&ctx, OPERATOR, AdminCommand::Diagnostics).await;
        assert!(text.starts_with("🛠 Admin Info"));
        assert!(text.contains(env!("CARGO_PKG_VERSION")));
        assert!(text.contains("Active sessions: 0"));
    }
}
