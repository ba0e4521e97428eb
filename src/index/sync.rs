//! Incremental synchronization from the source into the index / 增量同步
//!
//! One bounded transaction per record: a concurrent reader sees every
//! record atomically in either its pre- or post-update state, and one bad
//! record never aborts the rest of the pass.

use std::sync::atomic::Ordering;

use chrono::NaiveDateTime;

use crate::error::SearchError;
use crate::models::{LibraryRecord, CREATOR_ROLE_AUTHOR, CREATOR_ROLE_EDITOR};
use crate::utils::join_mapped;
use crate::zotero::Zotero;

use super::Index;

pub(crate) mod sql {
    pub const UPSERT_SEARCH: &str = "INSERT OR REPLACE INTO search_index \
        (rowid, key, title, year, creators, authors, editors, tags, collections, \
         attachments, notes, abstract, publisher) \
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";
    pub const UPSERT_DATA: &str = "INSERT OR REPLACE INTO data (id, obj) VALUES (?, ?)";
}

/// Flattened search projection of one record / 记录的扁平化搜索投影
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub id: i64,
    pub key: String,
    pub title: String,
    pub year: String,
    pub creators: String,
    pub authors: String,
    pub editors: String,
    pub tags: String,
    pub collections: String,
    pub attachments: String,
    pub notes: String,
    pub abstract_text: String,
    pub publisher: String,
}

impl IndexedDocument {
    /// Denormalize a record into space-joined index fields / 扁平化
    pub fn project(record: &LibraryRecord) -> Self {
        Self {
            id: record.id,
            key: record.key.clone(),
            title: record.title().to_string(),
            year: record.year(),
            creators: record.family_names(),
            authors: record.family_names_with_role(CREATOR_ROLE_AUTHOR),
            editors: record.family_names_with_role(CREATOR_ROLE_EDITOR),
            tags: record.tags.join(" "),
            collections: record.collections.join(" "),
            attachments: join_mapped(&record.attachments, " ", |a| a.title.as_str()),
            notes: record.notes.join(" "),
            abstract_text: record.abstract_note().to_string(),
            publisher: record.publisher(),
        }
    }
}

impl Index {
    /// Bring the index up to date with the source / 将索引与数据源同步
    ///
    /// Serialized internally: at most one sync pass runs at a time, while
    /// searches keep running against committed state.
    pub(crate) async fn try_update(&self, force: bool) -> Result<(), SearchError> {
        let _gate = self.sync_gate.lock().await;
        let force = force || self.needs_full_sync.load(Ordering::SeqCst);

        let index_modified = Zotero::file_modified(&self.config.index_db_path);
        if !force {
            let source_modified = Zotero::file_modified(&self.config.zotero_db_path);
            if let (Some(source), Some(index)) = (source_modified, index_modified) {
                if source <= index {
                    tracing::debug!("index is up to date, skipping sync");
                    return Ok(());
                }
            }
        }

        let horizon = if force {
            None
        } else {
            index_modified.map(|ts| ts.naive_utc())
        };

        let zotero = Zotero::open(&self.config.zotero_db_path, self.config.snapshot_path()).await?;
        let result = self.sync_pass(&zotero, horizon).await;
        zotero.close().await;
        if result.is_ok() {
            // cleared only after a completed pass
            self.needs_full_sync.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn sync_pass(
        &self,
        zotero: &Zotero,
        horizon: Option<NaiveDateTime>,
    ) -> Result<(), SearchError> {
        tracing::info!("updating index (full pass: {})", horizon.is_none());

        let mut upserted = 0u64;
        let mut skipped = 0u64;
        let mut records = zotero.records(horizon);
        loop {
            let record = match records.next_record().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("failed to read source record: {}", e);
                    skipped += 1;
                    continue;
                }
            };
            match self.upsert_record(&record).await {
                Ok(()) => {
                    upserted += 1;
                    tracing::debug!("indexed item {} ({})", record.id, record.key);
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("failed to index item {} ({}): {}", record.id, record.key, e);
                }
            }
        }

        match zotero.valid_ids().await {
            Err(e) => {
                tracing::warn!("valid-id lookup failed, skipping deletion sweep: {}", e);
            }
            Ok(ids) if ids.is_empty() => {
                // ambiguous: an empty library and a broken lookup look alike
                tracing::warn!("source reported no valid ids, skipping deletion sweep");
            }
            Ok(ids) => self.sweep_deleted(&ids).await?,
        }

        tracing::info!("index update finished: {} upserted, {} skipped", upserted, skipped);
        Ok(())
    }

    /// Upsert one record; both relations in one transaction / 单记录事务
    async fn upsert_record(&self, record: &LibraryRecord) -> Result<(), SearchError> {
        let doc = IndexedDocument::project(record);
        let payload = serde_json::to_string(record)?;

        let mut tx = self.write_pool.begin().await?;
        sqlx::query(sql::UPSERT_SEARCH)
            .bind(doc.id)
            .bind(&doc.key)
            .bind(&doc.title)
            .bind(&doc.year)
            .bind(&doc.creators)
            .bind(&doc.authors)
            .bind(&doc.editors)
            .bind(&doc.tags)
            .bind(&doc.collections)
            .bind(&doc.attachments)
            .bind(&doc.notes)
            .bind(&doc.abstract_text)
            .bind(&doc.publisher)
            .execute(&mut *tx)
            .await?;
        sqlx::query(sql::UPSERT_DATA)
            .bind(record.id)
            .bind(&payload)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Drop rows whose id left the source's valid set / 墓碑清理
    ///
    /// One statement per relation, both inside one transaction so the two
    /// relations never disagree about the surviving id set.
    async fn sweep_deleted(&self, valid_ids: &[i64]) -> Result<(), SearchError> {
        let id_list = valid_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut tx = self.write_pool.begin().await?;
        let swept = sqlx::query(&format!(
            "DELETE FROM search_index WHERE rowid NOT IN ({})",
            id_list
        ))
        .execute(&mut *tx)
        .await?
        .rows_affected();
        sqlx::query(&format!("DELETE FROM data WHERE id NOT IN ({})", id_list))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if swept > 0 {
            tracing::debug!("swept {} deleted record(s)", swept);
        }
        Ok(())
    }
}
