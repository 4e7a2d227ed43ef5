//! Database statistics.
//!
//! Used by `gitbored stats` to show what has been ingested so far: totals,
//! when the last commit landed, and a per-repository breakdown.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate::run_migrations;
use crate::sqlite_store::SqliteStore;
use crate::store::Store;

/// Commit count and newest author date for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStats {
    pub repo: String,
    pub commit_count: i64,
    pub latest_author_date: Option<String>,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let db_path = config.db_path();
    let pool = db::connect(&db_path).await?;
    run_migrations(&pool).await?;

    let store = SqliteStore::new(pool.clone());
    let counts = store.counts().await?;
    let last_ingested = last_ingested_at(&pool).await?;
    let by_repo = repo_breakdown(&pool).await?;

    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    println!("gitbored — Database Stats");
    println!("=========================");
    println!();
    println!("  Database:      {}", db_path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!("  Repositories:  {}", counts.repositories);
    println!("  Commits:       {}", counts.commits);
    println!(
        "  Last ingest:   {}",
        match last_ingested {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        }
    );

    if !by_repo.is_empty() {
        println!();
        println!("  By repository:");
        println!("  {:<32} {:>8}   {}", "REPOSITORY", "COMMITS", "LATEST");
        println!("  {}", "-".repeat(68));
        for r in &by_repo {
            println!(
                "  {:<32} {:>8}   {}",
                r.repo,
                r.commit_count,
                r.latest_author_date.as_deref().unwrap_or("-")
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

async fn last_ingested_at(pool: &SqlitePool) -> Result<Option<i64>> {
    let ts: Option<i64> = sqlx::query_scalar("SELECT MAX(ingested_at) FROM commits")
        .fetch_one(pool)
        .await?;
    Ok(ts)
}

/// Commits grouped by repository name, busiest first.
pub async fn repo_breakdown(pool: &SqlitePool) -> Result<Vec<RepoStats>> {
    let rows = sqlx::query(
        r#"
        SELECT repo, COUNT(*) AS commit_count, MAX(author_date) AS latest
        FROM commits
        GROUP BY repo
        ORDER BY commit_count DESC, repo ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| RepoStats {
            repo: row.get("repo"),
            commit_count: row.get("commit_count"),
            latest_author_date: row.get("latest"),
        })
        .collect())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Commit;
    use tempfile::TempDir;

    fn commit(sha: &str, repo: &str, date: &str) -> Commit {
        Commit {
            sha: sha.to_string(),
            repo: repo.to_string(),
            message: "m".to_string(),
            author_login: "octo".to_string(),
            author_email: None,
            author_name: None,
            author_date: date.to_string(),
            html_url: format!("https://github.com/octo/{repo}/commit/{sha}"),
            url: format!("https://api.github.com/repos/octo/{repo}/commits/{sha}"),
            author_html_url: None,
            distinct: true,
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_ts_relative_recent() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 7200), "2 hours ago");
    }

    #[tokio::test]
    async fn test_repo_breakdown_orders_by_count() {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect(&tmp.path().join("db.sqlite3")).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let store = SqliteStore::new(pool.clone());
        store
            .insert_commits(&[
                commit("a", "gitbored", "2024-05-01T00:00:00Z"),
                commit("b", "gitbored", "2024-05-03T00:00:00Z"),
                commit("c", "dotfiles", "2024-04-01T00:00:00Z"),
            ])
            .await
            .unwrap();

        let breakdown = repo_breakdown(&pool).await.unwrap();
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].repo, "gitbored");
        assert_eq!(breakdown[0].commit_count, 2);
        assert_eq!(breakdown[0].latest_author_date.as_deref(), Some("2024-05-03T00:00:00Z"));
        assert!(last_ingested_at(&pool).await.unwrap().is_some());
    }
}
