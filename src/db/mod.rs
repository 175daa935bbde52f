//! Database layer for the SQLite-backed stores.
//!
//! - Connection pool management with WAL mode
//! - Embedded schema migrations
//! - Scoped transactions and driver error classification (`tx`)

pub mod pool;
pub mod tx;

use std::path::Path;
use thiserror::Error;

/// Database-related errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),
}

/// Embedded migrations, applied in order.
const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_initial_schema",
    include_str!("migrations/0001_initial_schema.sql"),
)];

/// Initialize the database: create the file if needed and run migrations.
///
/// # Arguments
/// * `db_path` - Path to the SQLite database file
/// * `max_connections` - Pool size
///
/// # Returns
/// A connection pool configured with WAL mode
pub async fn initialize(db_path: &Path, max_connections: u32) -> Result<pool::DbPool, DbError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DbError::Migration(format!("Failed to create database directory: {}", e))
            })?;
        }
    }

    let pool = pool::create_pool(db_path, max_connections).await?;

    run_migrations(&pool).await?;

    log::info!("[db] Database ready at {}", db_path.display());
    Ok(pool)
}

/// Run all pending database migrations.
async fn run_migrations(pool: &pool::DbPool) -> Result<(), DbError> {
    let mut conn = pool.acquire().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    for (name, sql) in MIGRATIONS {
        let applied: Option<(i64,)> = sqlx::query_as("SELECT id FROM _migrations WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

        if applied.is_some() {
            continue;
        }

        log::debug!("[db] Applying migration {}", name);
        for statement in parse_sql_statements(sql) {
            sqlx::query(&statement).execute(&mut *conn).await?;
        }

        sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
            .bind(name)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Split a migration file into statements.
///
/// Skips `--` comments and ignores semicolons inside parentheses or
/// single-quoted literals (e.g. `strftime('%s', 'now')`).
fn parse_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut paren_depth: i32 = 0;
    let mut in_quote = false;

    for line in sql.lines() {
        let mut chars = line.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '\'' => {
                    in_quote = !in_quote;
                    current.push(ch);
                }
                '-' if !in_quote && chars.peek() == Some(&'-') => break,
                '(' if !in_quote => {
                    paren_depth += 1;
                    current.push(ch);
                }
                ')' if !in_quote => {
                    paren_depth = (paren_depth - 1).max(0);
                    current.push(ch);
                }
                ';' if !in_quote && paren_depth == 0 => {
                    let stmt = current.trim().to_string();
                    if !stmt.is_empty() {
                        statements.push(stmt);
                    }
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            current.push(' ');
        }
    }

    let last = current.trim().to_string();
    if !last.is_empty() {
        statements.push(last);
    }

    statements
}
