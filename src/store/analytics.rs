//! Slow-query analytics.
//!
//! The query façade's `timed` wrapper records queries that exceed its
//! threshold here. Analytics must never break queries: write errors
//! are logged and swallowed.

use super::{now_ms, Store};
use crate::error::StoreResult;
use rusqlite::params;

/// Retained analytics rows; older rows are pruned on insert overflow.
const MAX_ANALYTICS_ROWS: i64 = 10_000;

/// A recorded slow query.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SlowQuery {
    pub method: String,
    pub args: String,
    pub duration_ms: i64,
    pub result_count: i64,
    pub created_at: i64,
}

impl Store {
    /// Records a slow query. Errors are swallowed.
    pub fn record_query(&self, method: &str, args: &str, duration_ms: u64, result_count: usize) {
        if let Err(e) = self.try_record_query(method, args, duration_ms, result_count) {
            tracing::debug!("query analytics write failed: {e}");
        }
    }

    fn try_record_query(
        &self,
        method: &str,
        args: &str,
        duration_ms: u64,
        result_count: usize,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO query_analytics (method, args, duration_ms, result_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                method,
                args,
                duration_ms as i64,
                result_count as i64,
                now_ms()
            ],
        )?;
        conn.execute(
            "DELETE FROM query_analytics WHERE id <= last_insert_rowid() - ?1",
            params![MAX_ANALYTICS_ROWS],
        )?;
        Ok(())
    }

    /// Returns the slowest recently recorded queries.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn slowest_queries(&self, limit: usize) -> StoreResult<Vec<SlowQuery>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            r"
            SELECT method, args, duration_ms, result_count, created_at
            FROM query_analytics
            ORDER BY duration_ms DESC
            LIMIT ?1
            ",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(SlowQuery {
                    method: row.get(0)?,
                    args: row.get(1)?,
                    duration_ms: row.get(2)?,
                    result_count: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
