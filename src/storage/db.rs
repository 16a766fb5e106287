//! SQLite counter database
//!
//! All access goes through one connection guarded by a mutex. Recording a
//! visit (debounce check, visit insert, count upsert) runs in a single
//! transaction, so concurrent requests for the same page never lose counts.

use super::error::{StorageError, StorageResult};
use super::types::{CounterPolicy, SiteStats, TopPage, VisitOutcome};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS page_counters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site TEXT NOT NULL,
    page_path TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(site, page_path)
);

CREATE TABLE IF NOT EXISTS recent_visits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site TEXT NOT NULL,
    page_path TEXT NOT NULL,
    ip_hash TEXT NOT NULL,
    visited_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_recent_visits_lookup
    ON recent_visits(site, page_path, ip_hash, visited_at);
"#;

/// Page counters persisted in SQLite
pub struct CounterDb {
    conn: Mutex<Connection>,
    policy: CounterPolicy,
}

impl CounterDb {
    /// Open (or create) the database file at `path`
    pub fn open(path: impl AsRef<Path>, policy: CounterPolicy) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "Opened counter database");
        Self::init(conn, policy)
    }

    /// Database that lives only as long as this value
    pub fn open_in_memory(policy: CounterPolicy) -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?, policy)
    }

    fn init(conn: Connection, policy: CounterPolicy) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            policy,
        })
    }

    pub fn policy(&self) -> &CounterPolicy {
        &self.policy
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }

    /// Record a visit from the client identified by `ip_hash` at `now_ms`.
    ///
    /// The visit is counted unless the same client visited the same page
    /// within the debounce window.
    pub fn record_visit(
        &self,
        site: &str,
        page_path: &str,
        ip_hash: &str,
        now_ms: i64,
    ) -> StorageResult<VisitOutcome> {
        let outcome = {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;

            let cutoff = now_ms - self.policy.debounce_ms;
            let recent: i64 = tx.query_row(
                "SELECT COUNT(*) FROM recent_visits
                 WHERE site = ?1 AND page_path = ?2 AND ip_hash = ?3 AND visited_at > ?4",
                params![site, page_path, ip_hash, cutoff],
                |row| row.get(0),
            )?;

            if recent > 0 {
                let count = read_count(&tx, site, page_path)?;
                tx.commit()?;
                return Ok(VisitOutcome {
                    count,
                    incremented: false,
                });
            }

            tx.execute(
                "INSERT INTO recent_visits (site, page_path, ip_hash, visited_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![site, page_path, ip_hash, now_ms],
            )?;

            tx.execute(
                "INSERT INTO page_counters (site, page_path, count, created_at, updated_at)
                 VALUES (?1, ?2, 1, ?3, ?3)
                 ON CONFLICT(site, page_path)
                 DO UPDATE SET count = count + 1, updated_at = excluded.updated_at",
                params![site, page_path, now_ms],
            )?;

            let count = read_count(&tx, site, page_path)?;
            tx.commit()?;

            VisitOutcome {
                count,
                incremented: true,
            }
        };

        if self.policy.cleanup_every > 0 && outcome.count % self.policy.cleanup_every == 0 {
            let removed = self.cleanup_old_visits(now_ms)?;
            tracing::debug!(removed, "Purged old visit records");
        }

        Ok(outcome)
    }

    /// Current count for a page, 0 when unknown
    pub fn get_count(&self, site: &str, page_path: &str) -> StorageResult<u64> {
        let conn = self.lock()?;
        read_count(&conn, site, page_path)
    }

    /// Totals and the `limit` most viewed pages of a site
    pub fn stats(&self, site: &str, limit: usize) -> StorageResult<SiteStats> {
        let conn = self.lock()?;

        let (total_pages, total_views): (i64, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), SUM(count) FROM page_counters WHERE site = ?1",
            params![site],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = conn.prepare(
            "SELECT page_path, count FROM page_counters
             WHERE site = ?1 ORDER BY count DESC, page_path ASC LIMIT ?2",
        )?;
        let top_pages = stmt
            .query_map(params![site, limit as i64], |row| {
                Ok(TopPage {
                    page: row.get(0)?,
                    views: to_count(row.get(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SiteStats {
            site: site.to_string(),
            total_pages: to_count(total_pages),
            total_views: to_count(total_views.unwrap_or(0)),
            top_pages,
        })
    }

    /// Delete visit records older than the retention window
    pub fn cleanup_old_visits(&self, now_ms: i64) -> StorageResult<usize> {
        let conn = self.lock()?;
        let cutoff = now_ms - self.policy.retention_ms;
        let removed = conn.execute(
            "DELETE FROM recent_visits WHERE visited_at < ?1",
            params![cutoff],
        )?;
        Ok(removed)
    }

    /// Number of stored visit records
    pub fn visit_record_count(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM recent_visits", [], |row| row.get(0))?;
        Ok(to_count(count))
    }

    /// Cheap query proving the database answers
    pub fn ping(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

fn read_count(conn: &Connection, site: &str, page_path: &str) -> StorageResult<u64> {
    let count: Option<i64> = conn
        .query_row(
            "SELECT count FROM page_counters WHERE site = ?1 AND page_path = ?2",
            params![site, page_path],
            |row| row.get(0),
        )
        .optional()?;
    Ok(to_count(count.unwrap_or(0)))
}

fn to_count(value: i64) -> u64 {
    value.max(0) as u64
}
