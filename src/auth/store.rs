//! Persisted cookie jar backed by the `cookies` table.

use sqlx::Row;
use tracing::{debug, instrument};

use crate::db::{Database, DbError};

use super::{Cookie, SameSite};

/// Reads and upserts browser cookies.
#[derive(Debug, Clone)]
pub struct CookieStore {
    db: Database,
}

impl CookieStore {
    /// Wraps an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns every stored cookie, ordered by domain then name.
    ///
    /// Rows whose `same_site` no longer parses are skipped.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the query fails.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_all(&self) -> Result<Vec<Cookie>, DbError> {
        let rows = sqlx::query(
            "SELECT name, value, domain, path, expires, http_only, secure, same_site, partition_key \
             FROM cookies ORDER BY domain, name, path",
        )
        .fetch_all(self.db.pool())
        .await?;

        let mut cookies = Vec::with_capacity(rows.len());
        for row in rows {
            let same_site: String = row.try_get("same_site")?;
            let Ok(same_site) = same_site.parse::<SameSite>() else {
                debug!(same_site = %same_site, "skipping stored cookie with unknown same_site");
                continue;
            };
            cookies.push(Cookie {
                name: row.try_get("name")?,
                value: row.try_get("value")?,
                domain: row.try_get("domain")?,
                path: row.try_get("path")?,
                expires: row.try_get("expires")?,
                http_only: row.try_get("http_only")?,
                secure: row.try_get("secure")?,
                same_site,
                partition_key: row.try_get("partition_key")?,
            });
        }
        debug!(count = cookies.len(), "loaded stored cookies");
        Ok(cookies)
    }

    /// Inserts or replaces cookies keyed on `(name, domain, path)`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the transaction fails; nothing is
    /// written in that case.
    #[instrument(level = "debug", skip(self, cookies), fields(count = cookies.len()))]
    pub async fn save_all(&self, cookies: &[Cookie]) -> Result<(), DbError> {
        let mut tx = self.db.pool().begin().await?;
        for cookie in cookies {
            sqlx::query(
                "INSERT INTO cookies \
                 (name, value, domain, path, expires, http_only, secure, same_site, partition_key) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT (name, domain, path) DO UPDATE SET \
                 value = excluded.value, expires = excluded.expires, \
                 http_only = excluded.http_only, secure = excluded.secure, \
                 same_site = excluded.same_site, partition_key = excluded.partition_key, \
                 updated_at = datetime('now')",
            )
            .bind(&cookie.name)
            .bind(&cookie.value)
            .bind(&cookie.domain)
            .bind(&cookie.path)
            .bind(cookie.expires)
            .bind(cookie.http_only)
            .bind(cookie.secure)
            .bind(cookie.same_site.as_str())
            .bind(cookie.partition_key.as_deref())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Deletes every stored cookie and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the delete fails.
    #[instrument(level = "debug", skip(self))]
    pub async fn clear(&self) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM cookies")
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
