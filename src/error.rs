//! Error types for the search core / 搜索核心的错误类型

use std::path::Path;

use thiserror::Error;

/// Errors raised while synchronizing or searching the index / 同步与搜索错误
///
/// None of these escape the exposed operations: `setup`, `update` and
/// `search` log the failure and degrade to a status flag or an empty result.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Source or index storage could not be opened or copied / 无法打开数据库
    #[error("cannot open database: {0}")]
    Connection(String),

    /// A single statement failed / 单条语句执行失败
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// A record could not be encoded or decoded / 记录序列化失败
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A ranked match without payload, or an ambiguous sweep input / 一致性故障
    #[error("index consistency fault: {0}")]
    Consistency(String),
}

impl SearchError {
    pub(crate) fn connection(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Connection(format!("{}: {}", path.display(), err))
    }
}
