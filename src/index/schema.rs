//! Index schema and version management / 索引结构与版本管理
//!
//! One scalar version is stored alongside the relations. A mismatch never
//! migrates field by field: all relations are dropped and recreated empty
//! inside a single transaction, then repopulated by the next full sync.

use sqlx::{Pool, Sqlite};

use crate::error::SearchError;

/// Bump when the on-disk layout changes; a mismatch rebuilds from scratch
pub const SCHEMA_VERSION: i64 = 1;

pub(crate) mod sql {
    /// Full-text relation, payload relation, version relation / 三个关系
    pub const CREATE_TABLES: [&str; 3] = [
        r#"CREATE VIRTUAL TABLE search_index USING fts5(
            key,
            title,
            year,
            creators,
            authors,
            editors,
            tags,
            collections,
            attachments,
            notes,
            abstract,
            publisher
        )"#,
        r#"CREATE TABLE data (
            id INTEGER PRIMARY KEY NOT NULL,
            obj TEXT NOT NULL DEFAULT '{}'
        )"#,
        r#"CREATE TABLE dbinfo (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL
        )"#,
    ];

    pub const RESET: [&str; 3] = [
        "DROP TABLE IF EXISTS search_index",
        "DROP TABLE IF EXISTS data",
        "DROP TABLE IF EXISTS dbinfo",
    ];

    pub const HAS_DBINFO: &str =
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'dbinfo'";
    pub const GET_VERSION: &str = "SELECT value FROM dbinfo WHERE key = 'version'";
    pub const SET_VERSION: &str = "INSERT INTO dbinfo (key, value) VALUES ('version', ?)";
}

/// Outcome of the version gate / 版本检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// Stored version matches; nothing was touched / 版本一致
    Current,
    /// No schema existed; relations were created fresh / 全新建立
    Built,
    /// Stored version was outdated; relations were dropped and recreated / 重建
    Rebuilt,
}

/// Compare the stored schema version and (re)build when needed / 版本门
///
/// The drop + create + version write runs in one transaction; on failure
/// nothing half-created is ever left visible.
pub async fn ensure_schema(pool: &Pool<Sqlite>) -> Result<SchemaState, SearchError> {
    match stored_version(pool).await? {
        Some(version) if version == SCHEMA_VERSION => Ok(SchemaState::Current),
        Some(version) => {
            tracing::warn!(
                "index schema version {} is outdated, rebuilding as version {}",
                version,
                SCHEMA_VERSION
            );
            rebuild(pool).await?;
            // VACUUM cannot run inside the transaction
            sqlx::query("VACUUM").execute(pool).await.ok();
            tracing::info!("index schema rebuilt");
            Ok(SchemaState::Rebuilt)
        }
        None => {
            rebuild(pool).await?;
            tracing::info!("index schema created (version {})", SCHEMA_VERSION);
            Ok(SchemaState::Built)
        }
    }
}

async fn stored_version(pool: &Pool<Sqlite>) -> Result<Option<i64>, SearchError> {
    if sqlx::query(sql::HAS_DBINFO).fetch_optional(pool).await?.is_none() {
        return Ok(None);
    }
    let row: Option<(String,)> = sqlx::query_as(sql::GET_VERSION).fetch_optional(pool).await?;
    Ok(row.and_then(|(value,)| value.parse::<i64>().ok()))
}

async fn rebuild(pool: &Pool<Sqlite>) -> Result<(), SearchError> {
    let mut tx = pool.begin().await?;
    for statement in sql::RESET {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    for statement in sql::CREATE_TABLES {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    sqlx::query(sql::SET_VERSION)
        .bind(SCHEMA_VERSION.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
