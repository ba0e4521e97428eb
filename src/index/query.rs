//! Ranked full-text queries / 排序全文查询
//!
//! Queries run on the dedicated read-only pool, never on the writer's
//! connections, so a search cannot observe a half-committed record.

use sqlx::Row;

use crate::error::SearchError;
use crate::models::{LibraryRecord, SearchHit};

use super::Index;

/// Fixed cap on returned hits / 返回命中上限
const RESULT_LIMIT: i64 = 10;

pub(crate) mod sql {
    /// bm25 weights mirror column importance: title and person names first,
    /// organizational fields mid, descriptive text last; key never scores.
    pub const SEARCH: &str = "SELECT rowid, bm25(search_index, \
        0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.5, 0.4, 0.4, 0.4, 0.3, 0.4) AS score \
        FROM search_index WHERE search_index MATCH ? ORDER BY score LIMIT ?";
    pub const SELECT_DATA: &str = "SELECT obj FROM data WHERE id = ?";
}

/// Double embedded quotes and wrap the whole query so FTS5 always sees a
/// literal phrase, never its operator syntax / 转义为字面短语
fn sanitize_query(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

impl Index {
    /// Ranked search with payload rehydration / 排序搜索并还原完整记录
    pub(crate) async fn try_search(&self, text: &str) -> Result<Vec<SearchHit>, SearchError> {
        let needle = text.trim();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(sql::SEARCH)
            .bind(sanitize_query(needle))
            .bind(RESULT_LIMIT)
            .fetch_all(&self.read_pool)
            .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("rowid");
            let score: f64 = row.get("score");

            let payload: Option<(String,)> = sqlx::query_as(sql::SELECT_DATA)
                .bind(id)
                .fetch_optional(&self.read_pool)
                .await?;
            let Some((obj,)) = payload else {
                let fault = SearchError::Consistency(format!(
                    "search hit {} has no stored payload",
                    id
                ));
                tracing::warn!("{}, skipping", fault);
                continue;
            };
            match serde_json::from_str::<LibraryRecord>(&obj) {
                Ok(record) => hits.push(SearchHit {
                    record,
                    score: score as f32,
                }),
                Err(e) => {
                    tracing::warn!("stored payload for item {} is unreadable: {}", id, e);
                }
            }
        }
        Ok(hits)
    }
}
