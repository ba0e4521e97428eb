//! Search core configuration / 搜索核心配置
//!
//! Hosts typically deserialize this from their own config.json and hand it
//! to `Index::open`. Only paths live here; everything else is fixed policy.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Paths the search core works with / 搜索核心使用的路径
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Live Zotero database, owned and written by Zotero itself / Zotero 数据库
    pub zotero_db_path: PathBuf,
    /// Derived index database / 派生索引数据库
    pub index_db_path: PathBuf,
    /// Directory for the read snapshot; system temp dir when unset / 快照目录
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
}

impl SearchConfig {
    pub fn new(zotero_db_path: impl Into<PathBuf>, index_db_path: impl Into<PathBuf>) -> Self {
        Self {
            zotero_db_path: zotero_db_path.into(),
            index_db_path: index_db_path.into(),
            snapshot_dir: None,
        }
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Where the snapshot copy of the source lives / 快照文件位置
    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshot_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join("zotero-search-snapshot.sqlite")
    }
}
