use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

pub const DEFAULT_API_URL: &str = "http://localhost:8081";
pub const DEFAULT_AUTH_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Interval between `/api/auth/me` probes while waiting for an OAuth login.
pub const OAUTH_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const OAUTH_POLL_ATTEMPTS: u32 = 120;

pub const USER_AGENT: &str = concat!("fintrust/", env!("CARGO_PKG_VERSION"));

/// Resolved runtime settings: CLI flags, then environment, then defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub auth_url: String,
    pub timeout: Duration,
    pub db_path: PathBuf,
}

impl Settings {
    pub fn new(
        api_url: &str,
        auth_url: &str,
        timeout_secs: u64,
        db_path: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => default_db_path()?,
        };
        Ok(Self {
            api_url: normalize_base_url(api_url),
            auth_url: normalize_base_url(auth_url),
            timeout: Duration::from_secs(timeout_secs.max(1)),
            db_path,
        })
    }
}

pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

pub fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from("", "fintrust", "fintrust")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))
}

pub fn default_db_path() -> anyhow::Result<PathBuf> {
    let dirs = project_dirs()?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.join("fintrust.db"))
}
