use async_trait::async_trait;
use jiff::Timestamp;
use snip_core::error::StorageError;
use snip_core::repository::{Repository, Result, UrlRecord};
use snip_core::shortcode::ShortCode;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const MAX_CONNECTIONS: u32 = 10;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite implementation of the repository contract.
///
/// Code uniqueness is enforced by the `UNIQUE` constraint on `code`, so
/// concurrent creates of the same code race inside SQLite and exactly one
/// wins. Expired rows are filtered in the query and never deleted; their
/// codes stay reserved.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a repository from an existing SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database file at `path` in WAL mode.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        debug!(path = %path.as_ref().display(), "opened sqlite database");
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every pooled connection, checkpointing the WAL.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn now_unix_millis() -> i64 {
    Timestamp::now().as_millisecond()
}

fn parse_millis(column: &str, millis: i64) -> Result<Timestamp> {
    Timestamp::from_millisecond(millis).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{millis}': {e}"))
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Configuration(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn row_to_record(row: &SqliteRow) -> Result<UrlRecord> {
    let code: String = row.try_get("code").map_err(map_sqlx_error)?;
    let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;
    let expires_at: Option<i64> = row.try_get("expires_at").map_err(map_sqlx_error)?;
    let click_count: i64 = row.try_get("click_count").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        code: ShortCode::new(code).map_err(|e| StorageError::InvalidData(e.to_string()))?,
        original_url,
        created_at: parse_millis("created_at", created_at)?,
        expires_at: expires_at
            .map(|millis| parse_millis("expires_at", millis))
            .transpose()?,
        click_count: u64::try_from(click_count).map_err(|_| {
            StorageError::InvalidData(format!("negative click_count '{click_count}'"))
        })?,
    })
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("../ddl/sqlite/short_urls.sql"))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!("sqlite schema is up to date");
        Ok(())
    }

    async fn create(
        &self,
        code: &ShortCode,
        original_url: &str,
        expires_at: Option<Timestamp>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO short_urls (code, original_url, created_at, expires_at, click_count)
            VALUES (?, ?, ?, ?, 0)
            "#,
        )
        .bind(code.as_str())
        .bind(original_url)
        .bind(now_unix_millis())
        .bind(expires_at.map(|ts| ts.as_millisecond()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StorageError::Conflict(code.to_string())),
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn get_by_code(&self, code: &ShortCode) -> Result<UrlRecord> {
        let row = sqlx::query(
            r#"
            SELECT code, original_url, created_at, expires_at, click_count
            FROM short_urls
            WHERE code = ?
              AND (expires_at IS NULL OR expires_at >= ?)
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .bind(now_unix_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => row_to_record(&row),
            None => Err(StorageError::NotFound(code.to_string())),
        }
    }

    async fn record_click(&self, code: &ShortCode) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE short_urls
            SET click_count = click_count + 1
            WHERE code = ?
            "#,
        )
        .bind(code.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_maps_to_timeout() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            StorageError::Timeout(_)
        ));
    }

    #[test]
    fn closed_pool_maps_to_unavailable() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed),
            StorageError::Unavailable(_)
        ));
    }

    #[test]
    fn row_not_found_maps_to_invalid_data() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            StorageError::InvalidData(_)
        ));
    }

    #[test]
    fn out_of_range_millis_are_invalid_data() {
        assert!(matches!(
            parse_millis("expires_at", i64::MAX),
            Err(StorageError::InvalidData(_))
        ));
    }
}
