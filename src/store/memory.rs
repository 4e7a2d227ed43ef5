//! In-memory [`Store`] implementation for tests.
//!
//! Uses `HashMap`s behind `std::sync::RwLock`. Mirrors the SQLite
//! conflict rules: the first row for a name or SHA wins.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Commit, Repository, StoreCounts};

use super::Store;

#[derive(Default)]
pub struct InMemoryStore {
    repos: RwLock<HashMap<String, Repository>>,
    commits: RwLock<HashMap<String, Commit>>,
    write_batches: RwLock<u64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored commits, sorted by SHA.
    pub fn commits(&self) -> Vec<Commit> {
        let mut all: Vec<Commit> = self.commits.read().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.sha.cmp(&b.sha));
        all
    }

    /// All stored repositories, sorted by name.
    pub fn repositories(&self) -> Vec<Repository> {
        let mut all: Vec<Repository> = self.repos.read().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Number of non-empty bulk inserts received.
    pub fn write_batches(&self) -> u64 {
        *self.write_batches.read().unwrap()
    }

    fn note_batch(&self, len: usize) {
        if len > 0 {
            *self.write_batches.write().unwrap() += 1;
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find_repository(&self, name: &str) -> Result<Option<Repository>> {
        Ok(self.repos.read().unwrap().get(name).cloned())
    }

    async fn find_commit(&self, sha: &str) -> Result<Option<Commit>> {
        Ok(self.commits.read().unwrap().get(sha).cloned())
    }

    async fn insert_repositories(&self, repos: &[Repository]) -> Result<u64> {
        self.note_batch(repos.len());
        let mut stored = self.repos.write().unwrap();
        let mut inserted = 0;
        for repo in repos {
            if !stored.contains_key(&repo.name) {
                stored.insert(repo.name.clone(), repo.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn insert_commits(&self, commits: &[Commit]) -> Result<u64> {
        self.note_batch(commits.len());
        let mut stored = self.commits.write().unwrap();
        let mut inserted = 0;
        for commit in commits {
            if !stored.contains_key(&commit.sha) {
                stored.insert(commit.sha.clone(), commit.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            repositories: self.repos.read().unwrap().len() as i64,
            commits: self.commits.read().unwrap().len() as i64,
        })
    }
}
