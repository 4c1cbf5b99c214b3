use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Local};

const CTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CookieStatus {
    pub present: bool,
    pub last_modified: Option<DateTime<Local>>,
}

impl CookieStatus {
    #[must_use]
    pub fn probe(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => CookieStatus {
                present: true,
                last_modified: meta.modified().ok().map(DateTime::<Local>::from),
            },
            _ => CookieStatus::default(),
        }
    }

    #[must_use]
    pub fn icon(&self) -> &'static str {
        if self.present { "✅" } else { "❌" }
    }
}

/// Answer to `/status`.
#[derive(Clone, Debug)]
pub struct Status {
    pub log_level: String,
    pub cookies: CookieStatus,
}

impl Status {
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("KMVP Downloader Bot\n");
        let _ = writeln!(out, "Log Level: {}", self.log_level);
        let _ = write!(out, "Cookies.txt: {}", self.cookies.icon());
        if let Some(modified) = self.cookies.last_modified {
            let _ = write!(out, "\nLast updated: {}", modified.format(CTIME_FORMAT));
        }
        out
    }
}

/// Answer to `/admin`.
#[derive(Clone, Debug)]
pub struct Diagnostics {
    pub uptime: Duration,
    pub host: String,
    pub version: String,
    pub platform: String,
    pub log_level: String,
    pub cookies: CookieStatus,
    pub active_sessions: usize,
}

impl Diagnostics {
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("🛠 Admin Info\n");
        let _ = writeln!(out, "Uptime: {}", format_uptime(self.uptime));
        let _ = writeln!(out, "Host: {}", self.host);
        let _ = writeln!(out, "Version: {}", self.version);
        let _ = writeln!(out, "Platform: {}", self.platform);
        let _ = writeln!(out, "Log Level: {}", self.log_level);
        let _ = writeln!(out, "Active sessions: {}", self.active_sessions);
        let _ = write!(out, "Cookies.txt: {}", self.cookies.icon());
        out
    }
}

#[must_use]
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (days, rem) = (secs / 86_400, secs % 86_400);
    let (hours, rem) = (rem / 3_600, rem % 3_600);
    let (mins, secs) = (rem / 60, rem % 60);

    if days > 0 {
        format!("{days}d {hours}h {mins}m")
    } else if hours > 0 {
        format!("{hours}h {mins}m {secs}s")
    } else {
        format!("{mins}m {secs}s")
    }
}

/// Best-effort host name.
#[must_use]
pub fn hostname() -> String {
    ["/proc/sys/kernel/hostname", "/etc/hostname"]
        .iter()
        .filter_map(|p| std::fs::read_to_string(p).ok())
        .map(|s| s.trim().to_owned())
        .chain(std::env::var("HOSTNAME").ok())
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_owned())
}

#[must_use]
pub fn platform() -> String {
    format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH)
}
