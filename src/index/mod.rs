//! Derived search index over a Zotero library / Zotero 文献库的派生搜索索引
//!
//! Call direction: host → Index → Zotero (unidirectional)
//! - setup: version-gate the schema, (re)build when needed
//! - update: incremental synchronization with deletion sweep
//! - search: ranked full-text query with payload rehydration
//!
//! Single writer, many readers: `update` is serialized internally, `search`
//! runs concurrently against committed state on its own read-only pool.

pub mod query;
pub mod schema;
pub mod sync;

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use tokio::sync::Mutex;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::models::SearchHit;
use crate::zotero::Zotero;

use schema::SchemaState;

pub use sync::IndexedDocument;

/// Row counts and freshness of the index / 索引统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Rows in the full-text relation / 全文关系行数
    pub document_count: u64,
    /// Rows in the payload relation / 载荷关系行数
    pub payload_count: u64,
    /// Index file modification time (Unix timestamp) / 索引更新时间
    pub last_updated: Option<i64>,
}

/// The synchronized search index / 同步搜索索引
pub struct Index {
    pub(crate) config: SearchConfig,
    pub(crate) write_pool: Pool<Sqlite>,
    pub(crate) read_pool: Pool<Sqlite>,
    /// Serializes sync passes; searches never take it / 同步互斥
    pub(crate) sync_gate: Mutex<()>,
    /// Set by a (re)build, promotes the next update to a full pass / 需全量同步
    pub(crate) needs_full_sync: AtomicBool,
}

impl Index {
    /// Open the index storage and its owned connection pools / 打开索引
    pub async fn open(config: SearchConfig) -> Result<Self, SearchError> {
        if let Some(parent) = config.index_db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let write_url = format!("sqlite:{}?mode=rwc", config.index_db_path.to_string_lossy());
        let write_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&write_url)
            .await
            .map_err(|e| SearchError::connection(&config.index_db_path, e))?;

        // WAL keeps readers unblocked while the sync loop commits
        sqlx::query("PRAGMA journal_mode=WAL").execute(&write_pool).await?;
        sqlx::query("PRAGMA busy_timeout=5000").execute(&write_pool).await?;
        sqlx::query("PRAGMA synchronous=NORMAL").execute(&write_pool).await?;

        let read_url = format!("sqlite:{}?mode=ro", config.index_db_path.to_string_lossy());
        let read_pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&read_url)
            .await
            .map_err(|e| SearchError::connection(&config.index_db_path, e))?;

        tracing::info!("index database opened: {:?} (WAL mode)", config.index_db_path);

        Ok(Self {
            config,
            write_pool,
            read_pool,
            sync_gate: Mutex::new(()),
            needs_full_sync: AtomicBool::new(false),
        })
    }

    /// Version-gate the schema / 建立或重建索引结构
    ///
    /// Returns true iff the index was newly built or rebuilt; the next
    /// `update` call is then promoted to a forced full pass.
    pub async fn setup(&self) -> bool {
        match schema::ensure_schema(&self.write_pool).await {
            Ok(SchemaState::Current) => false,
            Ok(_) => {
                self.needs_full_sync.store(true, Ordering::SeqCst);
                true
            }
            Err(e) => {
                tracing::warn!("index setup failed: {}", e);
                false
            }
        }
    }

    /// Bring the index up to date with the source / 同步
    ///
    /// Unless forced, a cheap staleness probe (file modification times)
    /// decides whether a pass runs at all. Failures are logged; the index
    /// degrades to partial content rather than propagating an error.
    pub async fn update(&self, force: bool) {
        if let Err(e) = self.try_update(force).await {
            tracing::warn!("index update failed: {}", e);
        }
    }

    /// Ranked full-text search, capped at 10 hits / 全文搜索
    ///
    /// Most relevant first. Any failure yields an empty result.
    pub async fn search(&self, text: &str) -> Vec<SearchHit> {
        match self.try_search(text).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Current statistics / 获取统计信息
    pub async fn stats(&self) -> IndexStats {
        let document_count = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM search_index")
            .fetch_one(&self.read_pool)
            .await
            .map(|(count,)| count)
            .unwrap_or(0);
        let payload_count = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM data")
            .fetch_one(&self.read_pool)
            .await
            .map(|(count,)| count)
            .unwrap_or(0);
        let last_updated = Zotero::file_modified(&self.config.index_db_path)
            .map(|ts| ts.timestamp());

        IndexStats {
            document_count: document_count as u64,
            payload_count: payload_count as u64,
            last_updated,
        }
    }

    /// Close both pools / 关闭连接池
    pub async fn close(&self) {
        self.write_pool.close().await;
        self.read_pool.close().await;
    }
}
