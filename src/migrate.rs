use anyhow::Result;
use sqlx::SqlitePool;

/// Create the `repos` and `commits` tables. Safe to run on every start.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            owner_login TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            html_url TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // `repo` is not a foreign key; commits may name repositories that were
    // never listed (private ones, or ones past the last fetched page).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commits (
            sha TEXT PRIMARY KEY,
            repo TEXT NOT NULL,
            message TEXT NOT NULL,
            author_login TEXT NOT NULL,
            author_email TEXT,
            author_name TEXT,
            author_date TEXT NOT NULL,
            html_url TEXT NOT NULL,
            url TEXT NOT NULL,
            author_html_url TEXT,
            is_distinct INTEGER NOT NULL,
            ingested_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_commits_repo ON commits(repo)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_commits_author_date ON commits(author_date DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_repos_updated_at ON repos(updated_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
