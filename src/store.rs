//! # Session Store
//!
//! Persistence gateway for finished run sessions.
//!
//! [`SessionStore`] is the contract the tracker and the presentation layer
//! use; [`SqliteSessionStore`] backs it with a local SQLite database.
//!
//! ## Tables
//!
//! 1. **`run_sessions`**: one row per finished run. The route is stored as
//!    a MessagePack blob of `Vec<GpsPoint>`.
//! 2. **`run_statistics`**: a single row of aggregate statistics,
//!    re-aggregated in SQL after every write.
//!
//! The store is an explicitly constructed handle. Open it once at startup
//! and share it (`Arc<dyn SessionStore>`) with whoever needs it.

#[cfg(feature = "persistence")]
use std::path::Path;

#[cfg(feature = "persistence")]
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[cfg(feature = "persistence")]
use log::info;

#[cfg(feature = "persistence")]
use rusqlite::{params, types::Type, Connection, OptionalExtension, Params, Row};

use crate::error::{OptionExt, Result};
use crate::session::RunSession;
use crate::statistics::{self, AggregateStatistics};

#[cfg(feature = "persistence")]
use crate::clock::{Clock, SystemClock};
#[cfg(feature = "persistence")]
use crate::config::StoreConfig;
#[cfg(feature = "persistence")]
use crate::error::TrackerError;
#[cfg(feature = "persistence")]
use crate::GpsPoint;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

// ============================================================================
// Queries
// ============================================================================

/// Which sessions to return. Results are always newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionQuery {
    All,
    /// The `limit` most recently started sessions
    Recent { limit: u32 },
    /// Sessions started within `[start, end]`, Unix milliseconds
    DateRange { start: i64, end: i64 },
    /// Sessions started at or after the given Unix milliseconds
    Since(i64),
}

impl Default for SessionQuery {
    fn default() -> Self {
        SessionQuery::Recent { limit: 10 }
    }
}

impl SessionQuery {
    /// Sessions of the current local calendar week (from Monday).
    pub fn this_week(now_millis: i64) -> Self {
        SessionQuery::Since(statistics::week_start_millis(now_millis))
    }

    /// Sessions of the current local calendar month.
    pub fn this_month(now_millis: i64) -> Self {
        SessionQuery::Since(statistics::month_start_millis(now_millis))
    }
}

// ============================================================================
// Store Contract
// ============================================================================

/// Read/write access to finished sessions.
///
/// Implementations are synchronous; async callers run them on a blocking
/// task.
pub trait SessionStore: Send + Sync {
    /// Insert a session, replacing any existing row with the same id.
    fn append(&self, session: &RunSession) -> Result<()>;

    /// Replace an existing session. Fails with `NotFound` if absent.
    fn update(&self, session: &RunSession) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<RunSession>>;

    /// Like [`SessionStore::get`], but a missing id is a `NotFound` error.
    fn require(&self, id: &str) -> Result<RunSession> {
        self.get(id)?.ok_or_not_found(id)
    }

    fn query(&self, query: &SessionQuery) -> Result<Vec<RunSession>>;

    /// Delete one session. Returns whether a row was removed.
    fn delete(&self, id: &str) -> Result<bool>;

    fn delete_all(&self) -> Result<()>;

    /// Delete sessions started before `cutoff_millis`. Returns the count.
    fn delete_older_than(&self, cutoff_millis: i64) -> Result<u32>;

    fn statistics(&self) -> Result<AggregateStatistics>;

    /// The session with the greatest distance.
    fn longest_run(&self) -> Result<Option<RunSession>>;

    /// The session with the lowest non-zero pace.
    fn fastest_run(&self) -> Result<Option<RunSession>>;

    fn session_count(&self) -> Result<u32>;

    /// Remove sessions older than the retention period.
    ///
    /// # Arguments
    /// * `days_to_keep` - Days of history to retain (0 = keep all)
    /// * `now_millis` - Current time, Unix milliseconds
    ///
    /// # Returns
    /// Number of sessions deleted
    fn cleanup_old_sessions(&self, days_to_keep: u32, now_millis: i64) -> Result<u32> {
        if days_to_keep == 0 {
            log::info!("[SessionStore] Cleanup skipped: retention period is 0 (keep all)");
            return Ok(0);
        }
        let cutoff = now_millis - days_to_keep as i64 * MILLIS_PER_DAY;
        let deleted = self.delete_older_than(cutoff)?;
        if deleted > 0 {
            log::info!(
                "[SessionStore] Cleaned up {} sessions older than {} days",
                deleted,
                days_to_keep
            );
        }
        Ok(deleted)
    }
}

// ============================================================================
// SQLite Store
// ============================================================================

#[cfg(feature = "persistence")]
const SESSION_COLUMNS: &str =
    "id, start_time, end_time, distance, duration, avg_pace, max_speed, calories, route";

/// SQLite-backed session store.
#[cfg(feature = "persistence")]
pub struct SqliteSessionStore {
    /// Database connection
    db: Mutex<Connection>,

    /// Database path (":memory:" for in-memory stores)
    db_path: String,

    /// Source of `last_updated` timestamps
    clock: Arc<dyn Clock>,

    config: StoreConfig,
}

#[cfg(feature = "persistence")]
impl SqliteSessionStore {
    // ========================================================================
    // Initialization
    // ========================================================================

    /// Open (or create) a store at the given database path.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let db = Connection::open(path)?;
        Self::init_schema(&db)?;
        info!("[SessionStore] Opened database at {}", path.display());

        Ok(Self {
            db: Mutex::new(db),
            db_path: path.to_string_lossy().into_owned(),
            clock: Arc::new(SystemClock),
            config: StoreConfig::default(),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Use `clock` for statistics timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The configured number of most recent sessions.
    pub fn recent_sessions(&self) -> Result<Vec<RunSession>> {
        self.query(&SessionQuery::Recent {
            limit: self.config.recent_limit,
        })
    }

    /// Apply the configured retention period. Returns the number deleted.
    pub fn apply_retention(&self) -> Result<u32> {
        self.cleanup_old_sessions(self.config.retention_days, self.clock.now_millis())
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Initialize the database schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            -- Finished runs
            CREATE TABLE IF NOT EXISTS run_sessions (
                id TEXT PRIMARY KEY,
                start_time INTEGER NOT NULL,
                end_time INTEGER NOT NULL,
                distance REAL NOT NULL,
                duration INTEGER NOT NULL,
                avg_pace REAL NOT NULL,
                max_speed REAL NOT NULL,
                calories INTEGER NOT NULL,
                route BLOB NOT NULL,
                point_count INTEGER NOT NULL,
                created_at INTEGER DEFAULT (strftime('%s', 'now'))
            );

            -- Aggregate statistics (single row)
            CREATE TABLE IF NOT EXISTS run_statistics (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                total_runs INTEGER NOT NULL,
                total_distance REAL NOT NULL,
                total_duration INTEGER NOT NULL,
                total_calories INTEGER NOT NULL,
                average_pace REAL NOT NULL,
                best_pace REAL NOT NULL,
                longest_run REAL NOT NULL,
                longest_duration INTEGER NOT NULL,
                last_updated INTEGER NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_run_sessions_start ON run_sessions(start_time);
            CREATE INDEX IF NOT EXISTS idx_run_sessions_pace ON run_sessions(avg_pace);
        "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Row Mapping
    // ========================================================================

    fn encode_route(route: &[GpsPoint]) -> Result<Vec<u8>> {
        rmp_serde::to_vec(route).map_err(|e| TrackerError::Encoding {
            message: e.to_string(),
        })
    }

    fn session_from_row(row: &Row<'_>) -> rusqlite::Result<RunSession> {
        let route_blob: Vec<u8> = row.get(8)?;
        let route: Vec<GpsPoint> = rmp_serde::from_slice(&route_blob).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, Type::Blob, Box::new(e))
        })?;
        let calories: i64 = row.get(7)?;

        Ok(RunSession {
            id: row.get(0)?,
            start_time: row.get(1)?,
            end_time: row.get(2)?,
            distance_meters: row.get(3)?,
            duration_millis: row.get(4)?,
            avg_pace_min_per_km: row.get(5)?,
            max_speed_mps: row.get(6)?,
            calories: calories.max(0) as u32,
            route,
        })
    }

    fn query_sessions<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<RunSession>> {
        let mut stmt = conn.prepare(sql)?;
        let sessions = stmt
            .query_map(params, Self::session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    fn query_one<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Option<RunSession>> {
        let session = conn
            .query_row(sql, params, Self::session_from_row)
            .optional()?;
        Ok(session)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Aggregate the session table.
    fn aggregate(conn: &Connection, now: i64) -> Result<AggregateStatistics> {
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(distance), 0.0),
                    COALESCE(SUM(duration), 0),
                    COALESCE(SUM(calories), 0),
                    COALESCE((SELECT AVG(avg_pace) FROM run_sessions WHERE avg_pace > 0), 0.0),
                    COALESCE((SELECT MIN(avg_pace) FROM run_sessions WHERE avg_pace > 0), 0.0),
                    COALESCE(MAX(distance), 0.0),
                    COALESCE(MAX(duration), 0)
             FROM run_sessions",
            [],
            |row| {
                let total_runs: i64 = row.get(0)?;
                let total_calories: i64 = row.get(3)?;
                Ok(AggregateStatistics {
                    total_runs: total_runs as u32,
                    total_distance: row.get(1)?,
                    total_duration: row.get(2)?,
                    total_calories: total_calories.max(0) as u64,
                    average_pace: row.get(4)?,
                    best_pace: row.get(5)?,
                    longest_run: row.get(6)?,
                    longest_duration: row.get(7)?,
                    last_updated: now,
                })
            },
        )?;
        Ok(stats)
    }

    /// Re-aggregate and store the statistics row.
    fn refresh_statistics(conn: &Connection, now: i64) -> Result<AggregateStatistics> {
        let stats = Self::aggregate(conn, now)?;
        conn.execute(
            "INSERT OR REPLACE INTO run_statistics (id, total_runs, total_distance, total_duration,
                total_calories, average_pace, best_pace, longest_run, longest_duration, last_updated)
             VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                stats.total_runs as i64,
                stats.total_distance,
                stats.total_duration,
                stats.total_calories as i64,
                stats.average_pace,
                stats.best_pace,
                stats.longest_run,
                stats.longest_duration,
                stats.last_updated,
            ],
        )?;
        Ok(stats)
    }

    // ========================================================================
    // JSON Accessors
    // ========================================================================

    /// Sessions matching `query` as a JSON array.
    pub fn sessions_json(&self, query: &SessionQuery) -> String {
        match self.query(query) {
            Ok(sessions) => serde_json::to_string(&sessions).unwrap_or_else(|_| "[]".to_string()),
            Err(e) => {
                log::error!("[SessionStore] Query failed: {}", e);
                "[]".to_string()
            }
        }
    }

    /// Aggregate statistics as a JSON object.
    pub fn statistics_json(&self) -> String {
        match self.statistics() {
            Ok(stats) => serde_json::to_string(&stats).unwrap_or_else(|_| "{}".to_string()),
            Err(e) => {
                log::error!("[SessionStore] Statistics failed: {}", e);
                "{}".to_string()
            }
        }
    }
}

#[cfg(feature = "persistence")]
impl SessionStore for SqliteSessionStore {
    fn append(&self, session: &RunSession) -> Result<()> {
        let route = Self::encode_route(&session.route)?;
        let now = self.clock.now_millis();
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO run_sessions (id, start_time, end_time, distance, duration,
                avg_pace, max_speed, calories, route, point_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                session.id,
                session.start_time,
                session.end_time,
                session.distance_meters,
                session.duration_millis,
                session.avg_pace_min_per_km,
                session.max_speed_mps,
                session.calories as i64,
                route,
                session.route.len() as i64,
            ],
        )?;
        Self::refresh_statistics(&tx, now)?;
        tx.commit()?;

        info!(
            "[SessionStore] Session saved: {} ({:.0} m, {} points)",
            session.id,
            session.distance_meters,
            session.route.len()
        );
        Ok(())
    }

    fn update(&self, session: &RunSession) -> Result<()> {
        let route = Self::encode_route(&session.route)?;
        let now = self.clock.now_millis();
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE run_sessions SET start_time = ?, end_time = ?, distance = ?, duration = ?,
                avg_pace = ?, max_speed = ?, calories = ?, route = ?, point_count = ?
             WHERE id = ?",
            params![
                session.start_time,
                session.end_time,
                session.distance_meters,
                session.duration_millis,
                session.avg_pace_min_per_km,
                session.max_speed_mps,
                session.calories as i64,
                route,
                session.route.len() as i64,
                session.id,
            ],
        )?;
        if changed == 0 {
            return Err(TrackerError::NotFound {
                id: session.id.clone(),
            });
        }
        Self::refresh_statistics(&tx, now)?;
        tx.commit()?;

        info!("[SessionStore] Session updated: {}", session.id);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<RunSession>> {
        let conn = self.lock();
        Self::query_one(
            &conn,
            &format!("SELECT {} FROM run_sessions WHERE id = ?", SESSION_COLUMNS),
            params![id],
        )
    }

    fn query(&self, query: &SessionQuery) -> Result<Vec<RunSession>> {
        let conn = self.lock();
        match *query {
            SessionQuery::All => Self::query_sessions(
                &conn,
                &format!(
                    "SELECT {} FROM run_sessions ORDER BY start_time DESC",
                    SESSION_COLUMNS
                ),
                [],
            ),
            SessionQuery::Recent { limit } => Self::query_sessions(
                &conn,
                &format!(
                    "SELECT {} FROM run_sessions ORDER BY start_time DESC LIMIT ?",
                    SESSION_COLUMNS
                ),
                params![limit as i64],
            ),
            SessionQuery::DateRange { start, end } => Self::query_sessions(
                &conn,
                &format!(
                    "SELECT {} FROM run_sessions WHERE start_time BETWEEN ? AND ?
                     ORDER BY start_time DESC",
                    SESSION_COLUMNS
                ),
                params![start, end],
            ),
            SessionQuery::Since(since) => Self::query_sessions(
                &conn,
                &format!(
                    "SELECT {} FROM run_sessions WHERE start_time >= ? ORDER BY start_time DESC",
                    SESSION_COLUMNS
                ),
                params![since],
            ),
        }
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let now = self.clock.now_millis();
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM run_sessions WHERE id = ?", params![id])?;
        Self::refresh_statistics(&tx, now)?;
        tx.commit()?;

        if deleted > 0 {
            info!("[SessionStore] Session deleted: {}", id);
        }
        Ok(deleted > 0)
    }

    fn delete_all(&self) -> Result<()> {
        let now = self.clock.now_millis();
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM run_sessions;
             DELETE FROM run_statistics;",
        )?;
        Self::refresh_statistics(&tx, now)?;
        tx.commit()?;

        info!("[SessionStore] All data cleared");
        Ok(())
    }

    fn delete_older_than(&self, cutoff_millis: i64) -> Result<u32> {
        let now = self.clock.now_millis();
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM run_sessions WHERE start_time < ?",
            params![cutoff_millis],
        )?;
        Self::refresh_statistics(&tx, now)?;
        tx.commit()?;
        Ok(deleted as u32)
    }

    fn statistics(&self) -> Result<AggregateStatistics> {
        let conn = self.lock();
        let stored = conn
            .query_row(
                "SELECT total_runs, total_distance, total_duration, total_calories, average_pace,
                        best_pace, longest_run, longest_duration, last_updated
                 FROM run_statistics WHERE id = 1",
                [],
                |row| {
                    let total_runs: i64 = row.get(0)?;
                    let total_calories: i64 = row.get(3)?;
                    Ok(AggregateStatistics {
                        total_runs: total_runs as u32,
                        total_distance: row.get(1)?,
                        total_duration: row.get(2)?,
                        total_calories: total_calories.max(0) as u64,
                        average_pace: row.get(4)?,
                        best_pace: row.get(5)?,
                        longest_run: row.get(6)?,
                        longest_duration: row.get(7)?,
                        last_updated: row.get(8)?,
                    })
                },
            )
            .optional()?;

        match stored {
            Some(stats) => Ok(stats),
            // Fresh database: nothing written yet
            None => Self::aggregate(&conn, self.clock.now_millis()),
        }
    }

    fn longest_run(&self) -> Result<Option<RunSession>> {
        let conn = self.lock();
        Self::query_one(
            &conn,
            &format!(
                "SELECT {} FROM run_sessions ORDER BY distance DESC, start_time DESC LIMIT 1",
                SESSION_COLUMNS
            ),
            [],
        )
    }

    fn fastest_run(&self) -> Result<Option<RunSession>> {
        let conn = self.lock();
        Self::query_one(
            &conn,
            &format!(
                "SELECT {} FROM run_sessions WHERE avg_pace > 0
                 ORDER BY avg_pace ASC, start_time DESC LIMIT 1",
                SESSION_COLUMNS
            ),
            [],
        )
    }

    fn session_count(&self) -> Result<u32> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM run_sessions", [], |row| row.get(0))?;
        Ok(count as u32)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, feature = "persistence"))]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const T0: i64 = 1_700_000_000_000;

    fn session(id: &str, start: i64, distance: f64, duration: i64, pace: f64) -> RunSession {
        RunSession {
            id: id.to_string(),
            start_time: start,
            end_time: start + duration,
            distance_meters: distance,
            duration_millis: duration,
            avg_pace_min_per_km: pace,
            max_speed_mps: 4.0,
            calories: 100,
            route: vec![GpsPoint::new(51.5, -0.12), GpsPoint::new(51.501, -0.121)],
        }
    }

    #[test]
    fn test_create_store() {
        let store = SqliteSessionStore::in_memory().unwrap();
        assert_eq!(store.session_count().unwrap(), 0);
        assert!(store.statistics().unwrap().is_empty());
        assert_eq!(store.db_path(), ":memory:");
    }

    #[test]
    fn test_append_and_get() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let original = session("run-1", T0, 5_000.0, 1_500_000, 5.0);
        store.append(&original).unwrap();

        let loaded = store.get("run-1").unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_append_replaces_same_id() {
        let store = SqliteSessionStore::in_memory().unwrap();
        store.append(&session("run-1", T0, 5_000.0, 1_500_000, 5.0)).unwrap();
        store.append(&session("run-1", T0, 6_000.0, 1_500_000, 4.2)).unwrap();

        assert_eq!(store.session_count().unwrap(), 1);
        assert_eq!(store.get("run-1").unwrap().unwrap().distance_meters, 6_000.0);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let result = store.update(&session("ghost", T0, 1.0, 1, 0.0));
        assert!(matches!(result, Err(TrackerError::NotFound { .. })));
    }

    #[test]
    fn test_statistics_recomputed_on_write() {
        let clock = Arc::new(ManualClock::new(T0));
        let store = SqliteSessionStore::in_memory()
            .unwrap()
            .with_clock(clock.clone());

        store.append(&session("a", T0, 5_000.0, 1_500_000, 5.0)).unwrap();
        store.append(&session("b", T0 + 1, 10_000.0, 3_300_000, 5.5)).unwrap();
        clock.advance(1_000);
        store.append(&session("c", T0 + 2, 0.0, 60_000, 0.0)).unwrap();

        let stats = store.statistics().unwrap();
        assert_eq!(stats.total_runs, 3);
        assert_eq!(stats.total_distance, 15_000.0);
        assert_eq!(stats.total_duration, 4_860_000);
        assert_eq!(stats.total_calories, 300);
        // Zero pace excluded from average and best
        assert!((stats.average_pace - 5.25).abs() < 1e-9);
        assert_eq!(stats.best_pace, 5.0);
        assert_eq!(stats.longest_run, 10_000.0);
        assert_eq!(stats.longest_duration, 3_300_000);
        assert_eq!(stats.last_updated, T0 + 1_000);

        store.delete("b").unwrap();
        let stats = store.statistics().unwrap();
        assert_eq!(stats.total_runs, 2);
        assert_eq!(stats.longest_run, 5_000.0);
    }

    #[test]
    fn test_queries_newest_first() {
        let store = SqliteSessionStore::in_memory().unwrap();
        for i in 0..5 {
            store
                .append(&session(&format!("run-{}", i), T0 + i * 1_000, 1_000.0, 300_000, 5.0))
                .unwrap();
        }

        let all = store.query(&SessionQuery::All).unwrap();
        let ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["run-4", "run-3", "run-2", "run-1", "run-0"]);

        let recent = store.query(&SessionQuery::Recent { limit: 2 }).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "run-4");

        let range = store
            .query(&SessionQuery::DateRange {
                start: T0 + 1_000,
                end: T0 + 3_000,
            })
            .unwrap();
        assert_eq!(range.len(), 3);

        let since = store.query(&SessionQuery::Since(T0 + 4_000)).unwrap();
        assert_eq!(since.len(), 1);
    }

    #[test]
    fn test_delete_older_than_and_cleanup() {
        let store = SqliteSessionStore::in_memory().unwrap();
        store.append(&session("old", T0 - 400 * MILLIS_PER_DAY, 1.0, 1, 0.0)).unwrap();
        store.append(&session("new", T0 - MILLIS_PER_DAY, 1.0, 1, 0.0)).unwrap();

        assert_eq!(store.cleanup_old_sessions(0, T0).unwrap(), 0);
        assert_eq!(store.cleanup_old_sessions(365, T0).unwrap(), 1);
        assert!(store.get("old").unwrap().is_none());
        assert!(store.get("new").unwrap().is_some());

        assert_eq!(store.delete_older_than(T0).unwrap(), 1);
        assert_eq!(store.statistics().unwrap().total_runs, 0);
    }

    #[test]
    fn test_delete_all() {
        let store = SqliteSessionStore::in_memory().unwrap();
        store.append(&session("a", T0, 1_000.0, 1_000, 1.0)).unwrap();
        store.delete_all().unwrap();
        assert_eq!(store.session_count().unwrap(), 0);
        assert!(store.statistics().unwrap().is_empty());
        assert!(!store.delete("a").unwrap());
    }

    #[test]
    fn test_longest_and_fastest() {
        let store = SqliteSessionStore::in_memory().unwrap();
        assert!(store.longest_run().unwrap().is_none());
        assert!(store.fastest_run().unwrap().is_none());

        store.append(&session("slow-long", T0, 21_000.0, 7_200_000, 6.2)).unwrap();
        store.append(&session("fast-short", T0 + 1, 3_000.0, 800_000, 4.4)).unwrap();
        store.append(&session("no-gps", T0 + 2, 0.0, 900_000, 0.0)).unwrap();

        assert_eq!(store.longest_run().unwrap().unwrap().id, "slow-long");
        assert_eq!(store.fastest_run().unwrap().unwrap().id, "fast-short");
    }

    #[test]
    fn test_configured_retention_and_recent_limit() {
        let clock = Arc::new(ManualClock::new(T0));
        let store = SqliteSessionStore::in_memory()
            .unwrap()
            .with_clock(clock)
            .with_config(StoreConfig {
                retention_days: 30,
                recent_limit: 2,
            });
        for i in 0..3 {
            store
                .append(&session(&format!("run-{}", i), T0 - i * 20 * MILLIS_PER_DAY, 1.0, 1, 0.0))
                .unwrap();
        }

        assert_eq!(store.recent_sessions().unwrap().len(), 2);
        // run-2 started 40 days ago
        assert_eq!(store.apply_retention().unwrap(), 1);
        assert_eq!(store.session_count().unwrap(), 2);
    }

    #[test]
    fn test_json_accessors() {
        let store = SqliteSessionStore::in_memory().unwrap();
        store.append(&session("a", T0, 1_000.0, 1_000, 1.0)).unwrap();

        let json = store.sessions_json(&SessionQuery::All);
        let parsed: Vec<RunSession> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);

        let stats: AggregateStatistics = serde_json::from_str(&store.statistics_json()).unwrap();
        assert_eq!(stats.total_runs, 1);
    }
}
