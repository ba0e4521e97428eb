//! Zotero source reader / Zotero 数据源读取器
//!
//! Zotero owns its database and may be writing it at any moment, so a read
//! pass never touches the live file beyond one `std::fs::copy`: the copy is
//! opened read-only and every statement of the pass runs against that
//! snapshot. A pass therefore sees a single point-in-time state and holds no
//! lock against the writer.
//!
//! Access is read-only throughout; the reader never writes to the source.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};

use crate::error::SearchError;
use crate::models::{Attachment, Creator, LibraryRecord, MODIFIED_FORMAT};
use crate::utils::strip_html;

mod sql {
    pub const SELECT_ITEMS: &str = r#"
        SELECT items.itemID AS id,
               items.dateModified AS modified,
               items.key AS key,
               items.libraryID AS library,
               itemTypes.typeName AS itemType
          FROM items
          LEFT JOIN itemTypes ON items.itemTypeID = itemTypes.itemTypeID
          LEFT JOIN deletedItems ON items.itemID = deletedItems.itemID
         WHERE itemTypes.typeName NOT IN ('attachment', 'annotation', 'note')
           AND deletedItems.dateDeleted IS NULL
    "#;

    pub const SELECT_ITEMS_SINCE: &str = r#"
        SELECT items.itemID AS id,
               items.dateModified AS modified,
               items.key AS key,
               items.libraryID AS library,
               itemTypes.typeName AS itemType
          FROM items
          LEFT JOIN itemTypes ON items.itemTypeID = itemTypes.itemTypeID
          LEFT JOIN deletedItems ON items.itemID = deletedItems.itemID
         WHERE itemTypes.typeName NOT IN ('attachment', 'annotation', 'note')
           AND deletedItems.dateDeleted IS NULL
           AND items.dateModified > ?
    "#;

    pub const SELECT_VALID_IDS: &str = r#"
        SELECT items.itemID AS id
          FROM items
          LEFT JOIN itemTypes ON items.itemTypeID = itemTypes.itemTypeID
          LEFT JOIN deletedItems ON items.itemID = deletedItems.itemID
         WHERE itemTypes.typeName NOT IN ('attachment', 'annotation', 'note')
           AND deletedItems.dateDeleted IS NULL
    "#;

    pub const SELECT_METADATA: &str = r#"
        SELECT fields.fieldName AS name,
               itemDataValues.value AS value
          FROM itemData
          LEFT JOIN fields ON itemData.fieldID = fields.fieldID
          LEFT JOIN itemDataValues ON itemData.valueID = itemDataValues.valueID
         WHERE itemData.itemID = ?
    "#;

    pub const SELECT_CREATORS: &str = r#"
        SELECT creators.firstName AS given,
               creators.lastName AS family,
               itemCreators.orderIndex AS orderIndex,
               creatorTypes.creatorType AS role
          FROM creators
          LEFT JOIN itemCreators ON creators.creatorID = itemCreators.creatorID
          LEFT JOIN creatorTypes ON itemCreators.creatorTypeID = creatorTypes.creatorTypeID
         WHERE itemCreators.itemID = ?
         ORDER BY orderIndex ASC
    "#;

    pub const SELECT_ATTACHMENTS: &str = r#"
        SELECT items.key AS key,
               itemAttachments.path AS path,
               itemAttachments.contentType AS contentType,
               (SELECT itemDataValues.value
                  FROM itemData
                  LEFT JOIN fields ON itemData.fieldID = fields.fieldID
                  LEFT JOIN itemDataValues ON itemData.valueID = itemDataValues.valueID
                 WHERE itemData.itemID = items.itemID AND fields.fieldName = 'title') AS title,
               (SELECT itemDataValues.value
                  FROM itemData
                  LEFT JOIN fields ON itemData.fieldID = fields.fieldID
                  LEFT JOIN itemDataValues ON itemData.valueID = itemDataValues.valueID
                 WHERE itemData.itemID = items.itemID AND fields.fieldName = 'url') AS url
          FROM itemAttachments
          LEFT JOIN items ON itemAttachments.itemID = items.itemID
         WHERE itemAttachments.parentItemID = ?
    "#;

    pub const SELECT_COLLECTIONS: &str = r#"
        SELECT collections.collectionName AS name
          FROM collections
          LEFT JOIN collectionItems ON collections.collectionID = collectionItems.collectionID
         WHERE collectionItems.itemID = ?
    "#;

    pub const SELECT_NOTES: &str = r#"
        SELECT itemNotes.note AS note
          FROM itemNotes
         WHERE itemNotes.parentItemID = ?
    "#;

    pub const SELECT_TAGS: &str = r#"
        SELECT tags.name AS name
          FROM tags
          LEFT JOIN itemTags ON tags.tagID = itemTags.tagID
         WHERE itemTags.itemID = ?
    "#;
}

/// Read access to a snapshot of the Zotero library / Zotero 库的快照读取器
pub struct Zotero {
    db_path: PathBuf,
    pool: Pool<Sqlite>,
}

impl Zotero {
    /// Copy the live database aside and open the copy read-only / 建快照并打开
    pub async fn open(
        db_path: impl Into<PathBuf>,
        snapshot_path: impl Into<PathBuf>,
    ) -> Result<Self, SearchError> {
        let db_path = db_path.into();
        let snapshot_path = snapshot_path.into();

        if snapshot_path.exists() {
            std::fs::remove_file(&snapshot_path)
                .map_err(|e| SearchError::connection(&snapshot_path, e))?;
        }
        std::fs::copy(&db_path, &snapshot_path)
            .map_err(|e| SearchError::connection(&db_path, e))?;

        let db_url = format!("sqlite:{}?mode=ro", snapshot_path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&db_url)
            .await
            .map_err(|e| SearchError::connection(&snapshot_path, e))?;

        tracing::debug!("Zotero snapshot opened: {:?}", snapshot_path);
        Ok(Self { db_path, pool })
    }

    /// Modification time of a database file / 数据库文件修改时间
    pub fn file_modified(path: &Path) -> Option<DateTime<Utc>> {
        let mtime = std::fs::metadata(path).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(mtime))
    }

    /// Modification time of the live source file / 源文件修改时间
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        Self::file_modified(&self.db_path)
    }

    /// Cursor over the library's valid records / 有效记录游标
    ///
    /// With `since`, only records whose modification timestamp is strictly
    /// greater are yielded; without, every valid record. The cursor is
    /// finite and single-pass; it cannot be rewound.
    pub fn records(&self, since: Option<NaiveDateTime>) -> Records<'_> {
        let rows = match since {
            Some(ts) => sqlx::query(sql::SELECT_ITEMS_SINCE)
                .bind(ts.format(MODIFIED_FORMAT).to_string())
                .fetch(&self.pool),
            None => sqlx::query(sql::SELECT_ITEMS).fetch(&self.pool),
        };
        Records { reader: self, rows }
    }

    /// Complete set of live item ids / 当前有效条目集合
    ///
    /// `Ok` with an empty vec means the library genuinely holds no valid
    /// records; `Err` means the lookup itself failed. Callers must not
    /// treat the two alike when sweeping deletions.
    pub async fn valid_ids(&self) -> Result<Vec<i64>, SearchError> {
        let rows = sqlx::query(sql::SELECT_VALID_IDS)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get::<i64, _>("id")).collect())
    }

    /// Close the snapshot pool / 关闭快照连接池
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Hydrate one base row into a full record / 组装完整记录
    async fn hydrate(&self, row: &SqliteRow) -> Result<LibraryRecord, SearchError> {
        let id: i64 = row.get("id");
        let mut record = LibraryRecord {
            id,
            key: row.get("key"),
            modified: row.get("modified"),
            library: row.get("library"),
            item_type: row.get::<Option<String>, _>("itemType").unwrap_or_default(),
            meta: BTreeMap::new(),
            creators: Vec::new(),
            collections: Vec::new(),
            tags: Vec::new(),
            notes: Vec::new(),
            attachments: Vec::new(),
        };

        for meta_row in sqlx::query(sql::SELECT_METADATA)
            .bind(id)
            .fetch_all(&self.pool)
            .await?
        {
            let name: Option<String> = meta_row.get("name");
            let value: Option<String> = meta_row.get("value");
            if let (Some(name), Some(value)) = (name, value) {
                record.meta.insert(name, value);
            }
        }

        for creator_row in sqlx::query(sql::SELECT_CREATORS)
            .bind(id)
            .fetch_all(&self.pool)
            .await?
        {
            record.creators.push(Creator {
                order_index: creator_row.get::<Option<i64>, _>("orderIndex").unwrap_or(0),
                given: creator_row.get::<Option<String>, _>("given").unwrap_or_default(),
                family: creator_row.get::<Option<String>, _>("family").unwrap_or_default(),
                role: creator_row.get::<Option<String>, _>("role").unwrap_or_default(),
            });
        }

        for attachment_row in sqlx::query(sql::SELECT_ATTACHMENTS)
            .bind(id)
            .fetch_all(&self.pool)
            .await?
        {
            record.attachments.push(Attachment {
                key: attachment_row.get::<Option<String>, _>("key").unwrap_or_default(),
                path: attachment_row.get::<Option<String>, _>("path").unwrap_or_default(),
                title: attachment_row.get::<Option<String>, _>("title").unwrap_or_default(),
                url: attachment_row.get::<Option<String>, _>("url").unwrap_or_default(),
                content_type: attachment_row
                    .get::<Option<String>, _>("contentType")
                    .unwrap_or_default(),
            });
        }

        for collection_row in sqlx::query(sql::SELECT_COLLECTIONS)
            .bind(id)
            .fetch_all(&self.pool)
            .await?
        {
            if let Some(name) = collection_row.get::<Option<String>, _>("name") {
                record.collections.push(name);
            }
        }

        for tag_row in sqlx::query(sql::SELECT_TAGS)
            .bind(id)
            .fetch_all(&self.pool)
            .await?
        {
            if let Some(name) = tag_row.get::<Option<String>, _>("name") {
                record.tags.push(name);
            }
        }

        for note_row in sqlx::query(sql::SELECT_NOTES)
            .bind(id)
            .fetch_all(&self.pool)
            .await?
        {
            if let Some(note) = note_row.get::<Option<String>, _>("note") {
                record.notes.push(strip_html(&note));
            }
        }

        Ok(record)
    }
}

/// Lazy single-pass cursor over source records / 单趟惰性游标
pub struct Records<'a> {
    reader: &'a Zotero,
    rows: BoxStream<'a, Result<SqliteRow, sqlx::Error>>,
}

impl<'a> Records<'a> {
    /// Next fully hydrated record; `None` once the pass is exhausted
    pub async fn next_record(&mut self) -> Result<Option<LibraryRecord>, SearchError> {
        match self.rows.next().await {
            Some(row) => Ok(Some(self.reader.hydrate(&row?).await?)),
            None => Ok(None),
        }
    }
}
