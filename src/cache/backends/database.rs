//! Relational store backed by SQLite or PostgreSQL.
//!
//! One table `(key PRIMARY KEY, value, expiration)`. Writes are upserts;
//! reads check `expiration` by hand and delete the row when it has passed.
//! A local SQLite file serves a single host; a `postgres://` URL lets
//! several hosts share the table.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::{PgPool, PgPoolOptions};
use tokio_rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, Driver, Entry};
use crate::error::{CacheError, Result};

const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
"#;

/// Pool size for the PostgreSQL variant.
const PG_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Positional parameter `n` (1-based).
    fn param(self, n: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{}", n),
            Dialect::Postgres => format!("${}", n),
        }
    }

    fn integer_type(self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER",
            Dialect::Postgres => "BIGINT",
        }
    }
}

/// SQL statements for one cache table.
#[derive(Debug, Clone)]
struct Statements {
    schema: String,
    upsert: String,
    select: String,
    delete: String,
    delete_unchanged: String,
    count: String,
}

impl Statements {
    fn for_table(table: &str, dialect: Dialect) -> Self {
        let (p1, p2, p3) = (dialect.param(1), dialect.param(2), dialect.param(3));
        Self {
            schema: format!(
                r#"CREATE TABLE IF NOT EXISTS "{table}" (
    "key" TEXT PRIMARY KEY NOT NULL,
    "value" TEXT NOT NULL,
    "expiration" {int} NOT NULL
)"#,
                int = dialect.integer_type()
            ),
            upsert: format!(
                r#"INSERT INTO "{table}" ("key", "value", "expiration") VALUES ({p1}, {p2}, {p3})
ON CONFLICT ("key") DO UPDATE SET "value" = excluded."value", "expiration" = excluded."expiration""#
            ),
            select: format!(r#"SELECT "value", "expiration" FROM "{table}" WHERE "key" = {p1}"#),
            delete: format!(r#"DELETE FROM "{table}" WHERE "key" = {p1}"#),
            delete_unchanged: format!(
                r#"DELETE FROM "{table}" WHERE "key" = {p1} AND "expiration" = {p2}"#
            ),
            count: format!(r#"SELECT COUNT(*) FROM "{table}""#),
        }
    }
}

/// Connection to whichever database holds the table.
enum Backend {
    Sqlite(Connection),
    Postgres(PgPool),
}

/// Database-backed cache store.
pub struct DatabaseStore {
    backend: Backend,
    sql: Statements,
}

impl DatabaseStore {
    /// Opens (or creates) the SQLite file and the cache table.
    pub async fn open(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let path = path.as_ref();
        validate_table_name(table)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::unavailable(Driver::Database, e))?;
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| CacheError::unavailable(Driver::Database, e))?;
        conn.call(|conn| conn.execute_batch(PRAGMAS).map_err(|e| e.into()))
            .await
            .map_err(|e| CacheError::unavailable(Driver::Database, e))?;

        let store = Self::init(Backend::Sqlite(conn), table).await?;
        info!(
            "Database cache store using table '{}' in {}",
            table,
            path.display()
        );
        Ok(store)
    }

    /// Opens a private in-memory SQLite database, mostly useful for tests.
    pub async fn in_memory(table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| CacheError::unavailable(Driver::Database, e))?;
        Self::init(Backend::Sqlite(conn), table).await
    }

    /// Opens the store named by a connection URL.
    ///
    /// `postgres://` and `postgresql://` URLs connect a small pool; the pool
    /// must come up within `timeout`. `sqlite://<path>` opens a local file.
    pub async fn connect(url: &str, table: &str, timeout: Duration) -> Result<Self> {
        if let Some(path) = url.strip_prefix("sqlite://") {
            return Self::open(path, table).await;
        }
        if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
            return Err(CacheError::unavailable(
                Driver::Database,
                format!("unsupported database URL '{}'", mask_password(url)),
            ));
        }
        validate_table_name(table)?;

        let pool = PgPoolOptions::new()
            .max_connections(PG_MAX_CONNECTIONS)
            .acquire_timeout(timeout)
            .connect(url);
        let pool = tokio::time::timeout(timeout, pool)
            .await
            .map_err(|_| {
                CacheError::unavailable(
                    Driver::Database,
                    format!("no answer within {:?}", timeout),
                )
            })?
            .map_err(|e| CacheError::unavailable(Driver::Database, e))?;

        let store = Self::init(Backend::Postgres(pool), table).await?;
        info!(
            "Database cache store using table '{}' at {}",
            table,
            mask_password(url)
        );
        Ok(store)
    }

    async fn init(backend: Backend, table: &str) -> Result<Self> {
        let dialect = match backend {
            Backend::Sqlite(_) => Dialect::Sqlite,
            Backend::Postgres(_) => Dialect::Postgres,
        };
        let sql = Statements::for_table(table, dialect);

        match &backend {
            Backend::Sqlite(conn) => {
                let schema = sql.schema.clone();
                conn.call(move |conn| conn.execute_batch(&schema).map_err(|e| e.into()))
                    .await
                    .map_err(|e| CacheError::unavailable(Driver::Database, e))?;
            }
            Backend::Postgres(pool) => {
                query(&sql.schema)
                    .execute(pool)
                    .await
                    .map_err(|e| CacheError::unavailable(Driver::Database, e))?;
            }
        }

        Ok(Self { backend, sql })
    }

    /// Number of rows in the cache table, expired ones included.
    pub async fn row_count(&self) -> Result<u64> {
        let count: i64 = match &self.backend {
            Backend::Sqlite(conn) => {
                let sql = self.sql.count.clone();
                conn.call(move |conn| Ok(conn.query_row(&sql, [], |row| row.get::<_, i64>(0))?))
                    .await
                    .map_err(|e| CacheError::storage("failed to count cache rows", e))?
            }
            Backend::Postgres(pool) => {
                let (count,): (i64,) = query_as(&self.sql.count)
                    .fetch_one(pool)
                    .await
                    .map_err(|e| CacheError::storage("failed to count cache rows", e))?;
                count
            }
        };
        Ok(count.max(0) as u64)
    }

    // == Row Access ==
    async fn select(&self, key: &str) -> Result<Option<(String, i64)>> {
        match &self.backend {
            Backend::Sqlite(conn) => {
                let sql = self.sql.select.clone();
                let key = key.to_string();
                conn.call(move |conn| {
                    Ok(conn
                        .query_row(&sql, params![key], |row| Ok((row.get(0)?, row.get(1)?)))
                        .optional()?)
                })
                .await
                .map_err(|e| CacheError::storage("failed to read cache row", e))
            }
            Backend::Postgres(pool) => query_as(&self.sql.select)
                .bind(key)
                .fetch_optional(pool)
                .await
                .map_err(|e| CacheError::storage("failed to read cache row", e)),
        }
    }

    /// Deletes the row for `key` only while it still carries `expiration`,
    /// so an upsert that landed after the read survives.
    async fn delete_unchanged(&self, key: &str, expiration: i64) -> Result<()> {
        match &self.backend {
            Backend::Sqlite(conn) => {
                let sql = self.sql.delete_unchanged.clone();
                let key = key.to_string();
                conn.call(move |conn| {
                    conn.execute(&sql, params![key, expiration])?;
                    Ok(())
                })
                .await
                .map_err(|e| CacheError::storage("failed to delete stale cache row", e))
            }
            Backend::Postgres(pool) => query(&self.sql.delete_unchanged)
                .bind(key)
                .bind(expiration)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(|e| CacheError::storage("failed to delete stale cache row", e)),
        }
    }
}

#[async_trait]
impl CacheStore for DatabaseStore {
    fn driver(&self) -> Driver {
        Driver::Database
    }

    async fn put(&self, key: &str, payload: String, ttl: Duration) -> Result<()> {
        let entry = Entry::persisted(payload, ttl);
        let expiration = entry.expires_at_unix();

        match &self.backend {
            Backend::Sqlite(conn) => {
                let sql = self.sql.upsert.clone();
                let key = key.to_string();
                conn.call(move |conn| {
                    conn.execute(&sql, params![key, entry.payload, expiration])?;
                    Ok(())
                })
                .await
                .map_err(|e| CacheError::storage("failed to upsert cache row", e))
            }
            Backend::Postgres(pool) => query(&self.sql.upsert)
                .bind(key)
                .bind(entry.payload)
                .bind(expiration)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(|e| CacheError::storage("failed to upsert cache row", e)),
        }
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>> {
        let Some((value, expiration)) = self.select(key).await? else {
            debug!(key = %key, "database cache miss");
            return Ok(None);
        };

        match Entry::from_unix(value, expiration) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.payload)),
            Some(_) => {
                debug!(key = %key, "database cache entry expired");
                self.delete_unchanged(key, expiration).await?;
                Ok(None)
            }
            None => {
                warn!(key = %key, expiration, "cache row has an out-of-range expiration, removing");
                self.delete_unchanged(key, expiration).await?;
                Ok(None)
            }
        }
    }

    async fn forget(&self, key: &str) -> Result<()> {
        match &self.backend {
            Backend::Sqlite(conn) => {
                let sql = self.sql.delete.clone();
                let key = key.to_string();
                conn.call(move |conn| {
                    conn.execute(&sql, params![key])?;
                    Ok(())
                })
                .await
                .map_err(|e| CacheError::storage("failed to delete cache row", e))
            }
            Backend::Postgres(pool) => query(&self.sql.delete)
                .bind(key)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(|e| CacheError::storage("failed to delete cache row", e)),
        }
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(CacheError::unavailable(
            Driver::Database,
            format!("invalid cache table name '{}'", table),
        ))
    }
}

/// Masks the password in a database URL for logging.
fn mask_password(url: &str) -> String {
    let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
    if let Some(at) = url.rfind('@').filter(|&at| at > scheme_end) {
        if let Some(colon) = url[scheme_end..at].find(':') {
            let colon = scheme_end + colon;
            return format!("{}:****{}", &url[..colon], &url[at..]);
        }
    }
    url.to_string()
}
