use crate::error::{Result, ScanError};
use crate::models::{CacheRecord, ChannelSnapshot, VideoSnapshot};
use crate::utils::parse_iso8601_timestamp;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use rusqlite::{params, params_from_iter, Connection};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Stays well below SQLite's bound parameter limit.
const MAX_IDS_PER_QUERY: usize = 500;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS videos_cache (
    video_id      TEXT PRIMARY KEY,
    title         TEXT,
    channel_id    TEXT,
    channel_title TEXT,
    published_at  TEXT,
    views         INTEGER,
    duration_iso  TEXT,
    thumbnail     TEXT,
    fetched_at    TEXT
);

CREATE TABLE IF NOT EXISTS channels_cache (
    channel_id TEXT PRIMARY KEY,
    subs       INTEGER,
    fetched_at TEXT
);

CREATE TABLE IF NOT EXISTS missing_videos (
    video_id   TEXT PRIMARY KEY,
    fetched_at TEXT
);
";

/// Durable cache of video and channel snapshots, keyed by id.
///
/// Records are never evicted here; freshness is evaluated per read against
/// the caller's `max_age`, so stale rows stay until the next upsert replaces
/// them.
pub struct CacheStore {
    conn: Mutex<Connection>,
}

impl CacheStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ScanError::CacheIo(e.to_string()))?;
            }
        }

        let conn = Connection::open(db_path)?;

        // WAL: readers in other processes are not blocked by a writing scan.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        info!("Opened cache database at {}", db_path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ScanError::CacheIo("cache connection lock poisoned".to_string()))
    }

    pub fn get_videos(
        &self,
        ids: &[String],
        max_age: Duration,
    ) -> Result<HashMap<String, VideoSnapshot>> {
        self.get_videos_at(ids, max_age, Utc::now())
    }

    /// Fresh cached videos among `ids`. Absent and stale ids are simply missing.
    pub fn get_videos_at(
        &self,
        ids: &[String],
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<HashMap<String, VideoSnapshot>> {
        let mut out = HashMap::new();
        if ids.is_empty() {
            return Ok(out);
        }

        let conn = self.lock()?;
        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let sql = format!(
                "SELECT video_id, title, channel_id, channel_title, published_at, views, \
                 duration_iso, thumbnail, fetched_at \
                 FROM videos_cache WHERE video_id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                let fetched_at: Option<String> = row.get(8)?;
                let published_at: Option<String> = row.get(4)?;
                let views: Option<i64> = row.get(5)?;
                let video = VideoSnapshot {
                    video_id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    channel_id: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    channel_title: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    published_at: published_at.as_deref().and_then(parse_iso8601_timestamp),
                    view_count: views.map(|v| v.max(0) as u64).unwrap_or(0),
                    duration_iso: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    thumbnail_url: row.get(7)?,
                };
                Ok((video, fetched_at))
            })?;

            for row in rows {
                let (video, fetched_at) = row?;
                if let Some(record) = into_record(video, fetched_at.as_deref()) {
                    if record.is_fresh(max_age, now) {
                        out.insert(record.record.video_id.clone(), record.record);
                    }
                }
            }
        }

        debug!("Video cache: {} of {} requested ids fresh", out.len(), ids.len());
        Ok(out)
    }

    pub fn upsert_videos(&self, items: &[VideoSnapshot]) -> Result<()> {
        self.upsert_videos_at(items, Utc::now())
    }

    /// Insert-or-replace by `video_id`; `fetched_at` is refreshed on every call.
    pub fn upsert_videos_at(&self, items: &[VideoSnapshot], now: DateTime<Utc>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let fetched_at = now.to_rfc3339();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO videos_cache (video_id, title, channel_id, channel_title, published_at, \
                 views, duration_iso, thumbnail, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(video_id) DO UPDATE SET
                    title = excluded.title,
                    channel_id = excluded.channel_id,
                    channel_title = excluded.channel_title,
                    published_at = excluded.published_at,
                    views = excluded.views,
                    duration_iso = excluded.duration_iso,
                    thumbnail = excluded.thumbnail,
                    fetched_at = excluded.fetched_at",
            )?;
            let mut clear_missing =
                tx.prepare_cached("DELETE FROM missing_videos WHERE video_id = ?1")?;
            for video in items {
                clear_missing.execute(params![video.video_id])?;
                stmt.execute(params![
                    video.video_id,
                    video.title,
                    video.channel_id,
                    video.channel_title,
                    video.published_at.map(|ts| ts.to_rfc3339()),
                    i64::try_from(video.view_count).unwrap_or(i64::MAX),
                    video.duration_iso,
                    video.thumbnail_url,
                    fetched_at,
                ])?;
            }
        }
        tx.commit()?;

        debug!("Upserted {} videos into cache", items.len());
        Ok(())
    }

    pub fn get_channel_subs(
        &self,
        ids: &[String],
        max_age: Duration,
    ) -> Result<HashMap<String, Option<u64>>> {
        self.get_channel_subs_at(ids, max_age, Utc::now())
    }

    /// Fresh cached subscriber counts. A present `None` value means the channel
    /// hides its count, which is different from the id being absent.
    pub fn get_channel_subs_at(
        &self,
        ids: &[String],
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<HashMap<String, Option<u64>>> {
        let mut out = HashMap::new();
        if ids.is_empty() {
            return Ok(out);
        }

        let conn = self.lock()?;
        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let sql = format!(
                "SELECT channel_id, subs, fetched_at FROM channels_cache WHERE channel_id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                let subs: Option<i64> = row.get(1)?;
                let channel = ChannelSnapshot {
                    channel_id: row.get(0)?,
                    subscriber_count: subs.map(|s| s.max(0) as u64),
                };
                let fetched_at: Option<String> = row.get(2)?;
                Ok((channel, fetched_at))
            })?;

            for row in rows {
                let (channel, fetched_at) = row?;
                if let Some(record) = into_record(channel, fetched_at.as_deref()) {
                    if record.is_fresh(max_age, now) {
                        out.insert(record.record.channel_id, record.record.subscriber_count);
                    }
                }
            }
        }

        debug!("Channel cache: {} of {} requested ids fresh", out.len(), ids.len());
        Ok(out)
    }

    pub fn upsert_channel_subs(&self, items: &HashMap<String, Option<u64>>) -> Result<()> {
        self.upsert_channel_subs_at(items, Utc::now())
    }

    pub fn upsert_channel_subs_at(
        &self,
        items: &HashMap<String, Option<u64>>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let fetched_at = now.to_rfc3339();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO channels_cache (channel_id, subs, fetched_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(channel_id) DO UPDATE SET
                    subs = excluded.subs,
                    fetched_at = excluded.fetched_at",
            )?;
            for (channel_id, subs) in items {
                let subs = subs.map(|s| i64::try_from(s).unwrap_or(i64::MAX));
                stmt.execute(params![channel_id, subs, fetched_at])?;
            }
        }
        tx.commit()?;

        debug!("Upserted {} channels into cache", items.len());
        Ok(())
    }

    pub fn get_missing_videos(&self, ids: &[String], max_age: Duration) -> Result<HashSet<String>> {
        self.get_missing_videos_at(ids, max_age, Utc::now())
    }

    /// Ids the API recently answered without returning a video (deleted,
    /// private or never existed).
    pub fn get_missing_videos_at(
        &self,
        ids: &[String],
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<HashSet<String>> {
        let mut out = HashSet::new();
        if ids.is_empty() {
            return Ok(out);
        }

        let conn = self.lock()?;
        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let sql = format!(
                "SELECT video_id, fetched_at FROM missing_videos WHERE video_id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                let video_id: String = row.get(0)?;
                let fetched_at: Option<String> = row.get(1)?;
                Ok((video_id, fetched_at))
            })?;

            for row in rows {
                let (video_id, fetched_at) = row?;
                if let Some(record) = into_record(video_id, fetched_at.as_deref()) {
                    if record.is_fresh(max_age, now) {
                        out.insert(record.record);
                    }
                }
            }
        }

        Ok(out)
    }

    pub fn mark_videos_missing(&self, ids: &[String]) -> Result<()> {
        self.mark_videos_missing_at(ids, Utc::now())
    }

    pub fn mark_videos_missing_at(&self, ids: &[String], now: DateTime<Utc>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let fetched_at = now.to_rfc3339();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO missing_videos (video_id, fetched_at)
                 VALUES (?1, ?2)
                 ON CONFLICT(video_id) DO UPDATE SET fetched_at = excluded.fetched_at",
            )?;
            for video_id in ids {
                stmt.execute(params![video_id, fetched_at])?;
            }
        }
        tx.commit()?;

        debug!("Marked {} videos as missing upstream", ids.len());
        Ok(())
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// A row whose `fetched_at` cannot be parsed is never fresh.
fn into_record<T>(record: T, fetched_at: Option<&str>) -> Option<CacheRecord<T>> {
    let fetched_at = fetched_at.and_then(parse_iso8601_timestamp)?;
    Some(CacheRecord::new(record, fetched_at))
}
