use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Directory holding the database, log file and pid file.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_workdir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DbConfig {
    /// Defaults to `<workdir>/db.sqlite3`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// File containing `<user>:<token>` on a single line.
    #[serde(default = "default_auth_file")]
    pub auth_file: PathBuf,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Upper bound on repository list pages fetched per cycle.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Keep only the N most recently updated public repositories.
    #[serde(default)]
    pub max_repos: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_file: default_auth_file(),
            per_page: default_per_page(),
            max_pages: default_max_pages(),
            max_repos: None,
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_auth_file() -> PathBuf {
    PathBuf::from("~/.gitbored/API_AUTH")
}
fn default_per_page() -> u32 {
    100
}
fn default_max_pages() -> u32 {
    1
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("gitbored/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    /// Seconds between the end of one cycle and the start of the next.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Also write `<workdir>/gitbored-daemon.log`.
    #[serde(default = "default_log_file")]
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file() -> bool {
    true
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.db
            .path
            .clone()
            .unwrap_or_else(|| self.workdir.join("db.sqlite3"))
    }

    pub fn pid_path(&self) -> PathBuf {
        self.workdir.join("pid")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    validate(&config)?;
    Ok(config)
}

fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

fn validate(config: &Config) -> Result<()> {
    if !(1..=100).contains(&config.github.per_page) {
        anyhow::bail!("github.per_page must be in [1, 100]");
    }
    if config.github.max_pages == 0 {
        anyhow::bail!("github.max_pages must be >= 1");
    }
    if config.github.max_repos == Some(0) {
        anyhow::bail!("github.max_repos must be >= 1 when set");
    }
    if config.github.timeout_secs == 0 {
        anyhow::bail!("github.timeout_secs must be >= 1");
    }
    if config.schedule.interval_secs == 0 {
        anyhow::bail!("schedule.interval_secs must be >= 1");
    }
    reqwest::Url::parse(&config.github.api_url)
        .with_context(|| format!("github.api_url is not a valid URL: {}", config.github.api_url))?;
    Ok(())
}
