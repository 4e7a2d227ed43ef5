//! Storage abstraction for ingested records.
//!
//! The [`Store`] trait is the only thing the ingestion engine knows about
//! persistence. The binary uses [`SqliteStore`](crate::sqlite_store::SqliteStore);
//! tests use [`InMemoryStore`](memory::InMemoryStore).
//!
//! Existence checks return `Option` rather than an error so "not stored yet"
//! is an ordinary outcome.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`find_repository`](Store::find_repository) | Look up a repository by name |
//! | [`find_commit`](Store::find_commit) | Look up a commit by SHA |
//! | [`insert_repositories`](Store::insert_repositories) | Bulk insert new repositories |
//! | [`insert_commits`](Store::insert_commits) | Bulk insert new commits |
//! | [`counts`](Store::counts) | Row counts per table |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Commit, Repository, StoreCounts};

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_repository(&self, name: &str) -> Result<Option<Repository>>;

    async fn find_commit(&self, sha: &str) -> Result<Option<Commit>>;

    /// Insert all repositories in one transaction.
    ///
    /// Rows whose name already exists are left as they are. Returns the
    /// number of rows actually inserted.
    async fn insert_repositories(&self, repos: &[Repository]) -> Result<u64>;

    /// Insert all commits in one transaction.
    ///
    /// A commit whose SHA already exists is never overwritten. Returns the
    /// number of rows actually inserted.
    async fn insert_commits(&self, commits: &[Commit]) -> Result<u64>;

    async fn counts(&self) -> Result<StoreCounts>;
}
