//! Ingestion engine.
//!
//! One cycle runs two sub-operations, in order:
//!
//! 1. **Repository sync**: list the account's repositories, drop private
//!    ones, stage every name not yet stored, bulk insert.
//! 2. **Commit sync**: read the activity feed, walk the commits of every
//!    `PushEvent`, fetch detail for each SHA not yet stored, flatten and
//!    merge summary + detail, stage, bulk insert.
//!
//! All HTTP goes through the engine's [`HttpCache`], so a cycle that runs
//! inside GitHub's poll interval costs no requests at all.
//!
//! # Failure scope
//!
//! - Repository list or feed fetch fails → that sub-operation aborts.
//! - One repository record is malformed → that record is skipped.
//! - One commit detail fails to fetch or is malformed → the whole commit
//!   sync aborts and nothing staged by it is written.
//! - A commit detail URL outside `api_url` is treated as malformed and never
//!   requested, so credentials only go to the configured API host.
//!
//! A commit whose detail has `"author": null` (an email not linked to any
//! GitHub account) has no `author_login` and is malformed. Commit sync then
//! fails on every cycle until that push event ages out of the feed.
//!
//! Nothing is retried within a cycle; the next cycle is the retry.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{Config, GithubConfig};
use crate::connector_github::{events_location, repos_location, GithubClient};
use crate::credentials::Credentials;
use crate::db;
use crate::error::{Result, SyncError};
use crate::http_cache::{HttpCache, Transport};
use crate::migrate::run_migrations;
use crate::models::{Commit, Repository};
use crate::normalize::{flatten_value, merge, FlatMap};
use crate::sqlite_store::SqliteStore;
use crate::store::Store;

const PUSH_EVENT: &str = "PushEvent";

/// What the engine needs to know about the remote account.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub api_url: String,
    pub username: String,
    pub per_page: u32,
    pub max_pages: u32,
    pub max_repos: Option<usize>,
}

impl IngestSettings {
    pub fn from_config(config: &GithubConfig, username: &str) -> Self {
        Self {
            api_url: config.api_url.clone(),
            username: username.to_string(),
            per_page: config.per_page,
            max_pages: config.max_pages,
            max_repos: config.max_repos,
        }
    }
}

/// Counters for one sub-operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Records seen in the remote listing.
    pub fetched: usize,
    /// Records already stored or already staged this cycle.
    pub skipped: usize,
    /// Private repositories, non-push events, or records dropped for their shape.
    pub filtered: usize,
    pub staged: usize,
    /// Rows the store reported as inserted.
    pub written: u64,
}

/// Outcome of both sub-operations of one cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub repositories: Result<SyncStats>,
    pub commits: Result<SyncStats>,
}

impl CycleReport {
    pub fn is_ok(&self) -> bool {
        self.repositories.is_ok() && self.commits.is_ok()
    }

    pub fn rows_written(&self) -> u64 {
        let written = |r: &Result<SyncStats>| r.as_ref().map(|s| s.written).unwrap_or(0);
        written(&self.repositories) + written(&self.commits)
    }
}

/// Polls GitHub and writes new records to a [`Store`].
pub struct Ingestor {
    cache: HttpCache,
    store: Arc<dyn Store>,
    settings: IngestSettings,
}

impl Ingestor {
    pub fn new(transport: Box<dyn Transport>, store: Arc<dyn Store>, settings: IngestSettings) -> Self {
        Self {
            cache: HttpCache::new(transport),
            store,
            settings,
        }
    }

    pub fn cache(&self) -> &HttpCache {
        &self.cache
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Run repository sync, then commit sync. Failures are logged and
    /// returned in the report, never propagated.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let repositories = self.sync_repositories().await;
        if let Err(e) = &repositories {
            log_failure("repositories", e);
        }

        let commits = self.sync_commits().await;
        if let Err(e) = &commits {
            log_failure("commits", e);
        }

        CycleReport {
            repositories,
            commits,
        }
    }

    #[tracing::instrument(skip(self), fields(user = %self.settings.username))]
    pub async fn sync_repositories(&mut self) -> Result<SyncStats> {
        let listing = self.list_repositories().await?;
        let mut stats = SyncStats {
            fetched: listing.len(),
            ..SyncStats::default()
        };

        let mut public: Vec<(DateTime<FixedOffset>, Repository)> = Vec::new();
        for (location, item) in &listing {
            match repository_from_json(location, item) {
                Ok(Some(parsed)) => public.push(parsed),
                Ok(None) => stats.filtered += 1,
                Err(e) => {
                    warn!(location = %location, error = %e, "skipping malformed repository record");
                    stats.filtered += 1;
                }
            }
        }

        if let Some(limit) = self.settings.max_repos {
            public.sort_by(|a, b| b.0.cmp(&a.0));
            if public.len() > limit {
                stats.filtered += public.len() - limit;
                public.truncate(limit);
            }
        }

        let mut seen = HashSet::new();
        let mut staged = Vec::new();
        for (_, repo) in public {
            if !seen.insert(repo.name.clone()) {
                stats.skipped += 1;
                continue;
            }
            if self.store.find_repository(&repo.name).await?.is_some() {
                debug!(name = %repo.name, "repository already stored");
                stats.skipped += 1;
                continue;
            }
            staged.push(repo);
        }

        stats.staged = staged.len();
        stats.written = self.store.insert_repositories(&staged).await?;
        info!(
            fetched = stats.fetched,
            filtered = stats.filtered,
            skipped = stats.skipped,
            written = stats.written,
            "repository sync finished"
        );
        Ok(stats)
    }

    /// Fetch repository list pages until a short page or `max_pages`.
    async fn list_repositories(&mut self) -> Result<Vec<(String, Value)>> {
        let mut items = Vec::new();
        for page in 1..=self.settings.max_pages {
            let location = repos_location(
                &self.settings.api_url,
                &self.settings.username,
                self.settings.per_page,
                page,
            );
            let body = self.cache.fetch(&location).await?;
            let Value::Array(page_items) = body else {
                return Err(SyncError::data_shape(&location, "<repository array>"));
            };
            let full_page = page_items.len() >= self.settings.per_page as usize;
            items.extend(page_items.into_iter().map(|item| (location.clone(), item)));
            if !full_page {
                break;
            }
        }
        Ok(items)
    }

    #[tracing::instrument(skip(self), fields(user = %self.settings.username))]
    pub async fn sync_commits(&mut self) -> Result<SyncStats> {
        let feed_location = events_location(&self.settings.api_url, &self.settings.username);
        let feed = self.cache.fetch(&feed_location).await?;
        let events = feed
            .as_array()
            .ok_or_else(|| SyncError::data_shape(&feed_location, "<event array>"))?;

        let mut stats = SyncStats::default();
        let mut seen = HashSet::new();
        let mut staged = Vec::new();

        for event in events {
            if event.get("type").and_then(Value::as_str) != Some(PUSH_EVENT) {
                stats.filtered += 1;
                continue;
            }
            let summaries = event
                .pointer("/payload/commits")
                .and_then(Value::as_array)
                .ok_or_else(|| SyncError::data_shape(&feed_location, "payload.commits"))?;

            for summary in summaries {
                stats.fetched += 1;
                let sha = summary
                    .get(field::SHA)
                    .and_then(Value::as_str)
                    .ok_or_else(|| SyncError::data_shape(&feed_location, field::SHA))?;

                if !seen.insert(sha.to_string()) {
                    stats.skipped += 1;
                    continue;
                }
                if self.store.find_commit(sha).await?.is_some() {
                    stats.skipped += 1;
                    continue;
                }

                let detail_location = summary
                    .get(field::URL)
                    .and_then(Value::as_str)
                    .ok_or_else(|| SyncError::data_shape(&feed_location, field::URL))?;
                if !is_api_location(&self.settings.api_url, detail_location) {
                    return Err(SyncError::data_shape(&feed_location, field::URL));
                }
                let detail = self.cache.fetch(detail_location).await?;

                let merged = merge(flatten_value(summary), flatten_value(&detail));
                let commit = commit_from_flat(detail_location, &merged)?;
                debug!(sha = %commit.sha, repo = %commit.repo, "staged commit");
                staged.push(commit);
            }
        }

        stats.staged = staged.len();
        stats.written = self.store.insert_commits(&staged).await?;
        info!(
            fetched = stats.fetched,
            filtered = stats.filtered,
            skipped = stats.skipped,
            written = stats.written,
            "commit sync finished"
        );
        Ok(stats)
    }
}

/// Build an [`Ingestor`] wired to GitHub and the configured SQLite database.
///
/// Loads credentials, opens the database and brings the schema up to date.
pub async fn open(config: &Config) -> anyhow::Result<Ingestor> {
    let credentials = Credentials::load(&config.github.auth_file)?;
    let pool = db::connect(&config.db_path()).await?;
    run_migrations(&pool).await?;

    let settings = IngestSettings::from_config(&config.github, &credentials.username);
    let client = GithubClient::new(credentials, &config.github)?;
    Ok(Ingestor::new(
        Box::new(client),
        Arc::new(SqliteStore::new(pool)),
        settings,
    ))
}

/// Run the sync command: one cycle, then a summary on stdout.
///
/// Fails if either sub-operation failed, after printing the summary.
pub async fn run_sync(config: &Config) -> anyhow::Result<()> {
    let mut ingestor = open(config).await?;
    let report = ingestor.run_cycle().await;

    println!("sync {}", ingestor.settings().username);
    print_outcome("repositories", &report.repositories);
    print_outcome("commits", &report.commits);
    println!("  requests sent: {}", ingestor.cache().requests_sent());

    if report.is_ok() {
        println!("ok");
        Ok(())
    } else {
        anyhow::bail!("sync finished with errors")
    }
}

fn print_outcome(operation: &str, outcome: &Result<SyncStats>) {
    match outcome {
        Ok(s) => println!(
            "  {operation:<13} fetched: {}  filtered: {}  skipped: {}  written: {}",
            s.fetched, s.filtered, s.skipped, s.written
        ),
        Err(e) => println!("  {operation:<13} failed: {e}"),
    }
}

fn log_failure(operation: &str, e: &SyncError) {
    error!(
        operation,
        kind = e.kind(),
        location = e.location().unwrap_or("-"),
        error = %e,
        "sync aborted for this cycle"
    );
}

/// Parse one repository listing entry. Private repositories yield `None`.
fn repository_from_json(
    location: &str,
    item: &Value,
) -> Result<Option<(DateTime<FixedOffset>, Repository)>> {
    let shape = |field: &str| SyncError::data_shape(location, field);

    let private = item
        .get("private")
        .and_then(Value::as_bool)
        .ok_or_else(|| shape("private"))?;
    if private {
        return Ok(None);
    }

    let text = |key: &str| -> Result<String> {
        item.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| shape(key))
    };

    let updated_at = text("updated_at")?;
    let updated =
        DateTime::parse_from_rfc3339(&updated_at).map_err(|_| shape("updated_at"))?;

    let repo = Repository {
        name: text("name")?,
        description: item
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        owner_login: item
            .pointer("/owner/login")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| shape("owner.login"))?,
        updated_at,
        html_url: text("html_url")?,
    };
    Ok(Some((updated, repo)))
}

/// Flattened keys read into a [`Commit`].
///
/// | Key | Commit field | Source payload |
/// |-----|--------------|----------------|
/// | `sha` | `sha` | summary, detail |
/// | `message` | `message` | summary |
/// | `author_login` | `author_login` | detail (`author.login`) |
/// | `author_email` | `author_email` | summary (`author.email`) |
/// | `author_name` | `author_name` | summary (`author.name`) |
/// | `commit_author_date` | `author_date` | detail (`commit.author.date`) |
/// | `html_url` | `html_url`, `repo` | detail |
/// | `url` | `url` | summary, detail |
/// | `author_html_url` | `author_html_url` | detail (`author.html_url`) |
/// | `distinct` | `distinct` | summary |
mod field {
    pub const SHA: &str = "sha";
    pub const MESSAGE: &str = "message";
    pub const DETAIL_MESSAGE: &str = "commit_message";
    pub const AUTHOR_LOGIN: &str = "author_login";
    pub const AUTHOR_EMAIL: &str = "author_email";
    pub const AUTHOR_NAME: &str = "author_name";
    pub const AUTHOR_DATE: &str = "commit_author_date";
    pub const HTML_URL: &str = "html_url";
    pub const URL: &str = "url";
    pub const AUTHOR_HTML_URL: &str = "author_html_url";
    pub const DISTINCT: &str = "distinct";
}

struct FlatFields<'a> {
    location: &'a str,
    flat: &'a FlatMap,
}

impl FlatFields<'_> {
    fn optional(&self, key: &str) -> Option<String> {
        self.flat.get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| SyncError::data_shape(self.location, key))
    }

    fn flag(&self, key: &str) -> Result<bool> {
        self.flat
            .get(key)
            .and_then(Value::as_bool)
            .ok_or_else(|| SyncError::data_shape(self.location, key))
    }
}

/// Build a commit record from a merged summary + detail map.
fn commit_from_flat(location: &str, flat: &FlatMap) -> Result<Commit> {
    let fields = FlatFields { location, flat };

    let html_url = fields.required(field::HTML_URL)?;
    let repo = repo_name_from_commit_url(&html_url)
        .ok_or_else(|| SyncError::data_shape(location, field::HTML_URL))?;
    let message = match fields.optional(field::MESSAGE) {
        Some(m) => m,
        None => fields.required(field::DETAIL_MESSAGE)?,
    };

    Ok(Commit {
        sha: fields.required(field::SHA)?,
        repo,
        message,
        author_login: fields.required(field::AUTHOR_LOGIN)?,
        author_email: fields.optional(field::AUTHOR_EMAIL),
        author_name: fields.optional(field::AUTHOR_NAME),
        author_date: fields.required(field::AUTHOR_DATE)?,
        html_url,
        url: fields.required(field::URL)?,
        author_html_url: fields.optional(field::AUTHOR_HTML_URL),
        distinct: fields.flag(field::DISTINCT)?,
    })
}

/// Whether `location` lives under the configured API base URL.
fn is_api_location(api_url: &str, location: &str) -> bool {
    let base = api_url.trim_end_matches('/');
    location
        .strip_prefix(base)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Repository name from a commit's web URL,
/// `https://github.com/{owner}/{repo}/commit/{sha}`.
///
/// Positional: this is the one place to change if GitHub's URL layout does.
pub fn repo_name_from_commit_url(html_url: &str) -> Option<String> {
    let url = reqwest::Url::parse(html_url).ok()?;
    let name = url.path_segments()?.nth(1)?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
