//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the `repos` and `commits` tables
//! created by [`run_migrations`](crate::migrate::run_migrations).

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{Commit, Repository, StoreCounts};
use crate::store::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn repository_from_row(row: &SqliteRow) -> Repository {
    Repository {
        name: row.get("name"),
        description: row.get("description"),
        owner_login: row.get("owner_login"),
        updated_at: row.get("updated_at"),
        html_url: row.get("html_url"),
    }
}

fn commit_from_row(row: &SqliteRow) -> Commit {
    Commit {
        sha: row.get("sha"),
        repo: row.get("repo"),
        message: row.get("message"),
        author_login: row.get("author_login"),
        author_email: row.get("author_email"),
        author_name: row.get("author_name"),
        author_date: row.get("author_date"),
        html_url: row.get("html_url"),
        url: row.get("url"),
        author_html_url: row.get("author_html_url"),
        distinct: row.get::<i64, _>("is_distinct") != 0,
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn find_repository(&self, name: &str) -> Result<Option<Repository>> {
        let row = sqlx::query(
            "SELECT name, description, owner_login, updated_at, html_url FROM repos WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(repository_from_row))
    }

    async fn find_commit(&self, sha: &str) -> Result<Option<Commit>> {
        let row = sqlx::query(
            r#"
            SELECT sha, repo, message, author_login, author_email, author_name,
                   author_date, html_url, url, author_html_url, is_distinct
            FROM commits WHERE sha = ?
            "#,
        )
        .bind(sha)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(commit_from_row))
    }

    async fn insert_repositories(&self, repos: &[Repository]) -> Result<u64> {
        if repos.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for repo in repos {
            let result = sqlx::query(
                r#"
                INSERT INTO repos (name, description, owner_login, updated_at, html_url)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(name) DO NOTHING
                "#,
            )
            .bind(&repo.name)
            .bind(&repo.description)
            .bind(&repo.owner_login)
            .bind(&repo.updated_at)
            .bind(&repo.html_url)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn insert_commits(&self, commits: &[Commit]) -> Result<u64> {
        if commits.is_empty() {
            return Ok(0);
        }
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for commit in commits {
            let result = sqlx::query(
                r#"
                INSERT INTO commits (sha, repo, message, author_login, author_email, author_name,
                                     author_date, html_url, url, author_html_url, is_distinct,
                                     ingested_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(sha) DO NOTHING
                "#,
            )
            .bind(&commit.sha)
            .bind(&commit.repo)
            .bind(&commit.message)
            .bind(&commit.author_login)
            .bind(&commit.author_email)
            .bind(&commit.author_name)
            .bind(&commit.author_date)
            .bind(&commit.html_url)
            .bind(&commit.url)
            .bind(&commit.author_html_url)
            .bind(commit.distinct as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let repositories: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM repos")
            .fetch_one(&self.pool)
            .await?;
        let commits: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM commits")
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreCounts {
            repositories,
            commits,
        })
    }
}
