//! Records persisted by gitbored.
//!
//! Both record types mirror the `repos` and `commits` tables created by
//! [`migrate`](crate::migrate).

/// A public repository owned by the polled account.
///
/// Identified by `name`. Stored once; later sightings are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub description: Option<String>,
    pub owner_login: String,
    /// ISO-8601 timestamp as reported by GitHub.
    pub updated_at: String,
    pub html_url: String,
}

/// A commit observed in a push event.
///
/// Content-addressed by `sha` and immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: String,
    /// Name of the owning repository. Not enforced as a foreign key.
    pub repo: String,
    pub message: String,
    pub author_login: String,
    pub author_email: Option<String>,
    pub author_name: Option<String>,
    /// ISO-8601 author timestamp.
    pub author_date: String,
    pub html_url: String,
    /// API URL the detail was fetched from.
    pub url: String,
    pub author_html_url: Option<String>,
    /// Whether the commit was new to the branch in its push.
    pub distinct: bool,
}

/// Row counts reported by `gitbored stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub repositories: i64,
    pub commits: i64,
}
