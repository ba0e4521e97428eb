//! Test fixture: a miniature Zotero source database / 迷你 Zotero 测试库
//!
//! Creates only the tables the reader touches, with the column subset its
//! queries reference. Re-seeding an existing path replaces the file, the
//! same way Zotero rewrites its own database.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

const SOURCE_TABLES: [&str; 15] = [
    "CREATE TABLE items (itemID INTEGER PRIMARY KEY, itemTypeID INTEGER, libraryID INTEGER, key TEXT, dateModified TEXT)",
    "CREATE TABLE itemTypes (itemTypeID INTEGER PRIMARY KEY, typeName TEXT)",
    "CREATE TABLE deletedItems (itemID INTEGER PRIMARY KEY, dateDeleted TEXT)",
    "CREATE TABLE fields (fieldID INTEGER PRIMARY KEY, fieldName TEXT)",
    "CREATE TABLE itemData (itemID INTEGER, fieldID INTEGER, valueID INTEGER)",
    "CREATE TABLE itemDataValues (valueID INTEGER PRIMARY KEY, value TEXT)",
    "CREATE TABLE creators (creatorID INTEGER PRIMARY KEY, firstName TEXT, lastName TEXT)",
    "CREATE TABLE itemCreators (itemID INTEGER, creatorID INTEGER, creatorTypeID INTEGER, orderIndex INTEGER)",
    "CREATE TABLE creatorTypes (creatorTypeID INTEGER PRIMARY KEY, creatorType TEXT)",
    "CREATE TABLE collections (collectionID INTEGER PRIMARY KEY, collectionName TEXT, key TEXT)",
    "CREATE TABLE collectionItems (collectionID INTEGER, itemID INTEGER)",
    "CREATE TABLE tags (tagID INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE itemTags (itemID INTEGER, tagID INTEGER)",
    "CREATE TABLE itemNotes (itemID INTEGER PRIMARY KEY, parentItemID INTEGER, note TEXT)",
    "CREATE TABLE itemAttachments (itemID INTEGER PRIMARY KEY, parentItemID INTEGER, path TEXT, contentType TEXT)",
];

/// One library entry plus its child rows / 一条记录及其子行
pub struct FixtureItem {
    pub id: i64,
    pub key: String,
    pub item_type: String,
    pub modified: String,
    pub fields: Vec<(String, String)>,
    pub creators: Vec<(String, String, String)>, // given, family, role
    pub collections: Vec<String>,
    pub tags: Vec<String>,
    pub notes: Vec<String>,
    pub attachments: Vec<(String, String, String)>, // title, path, content type
    pub deleted: bool,
}

impl FixtureItem {
    pub fn new(id: i64, key: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            item_type: item_type.into(),
            modified: "2016-01-01 00:00:00".to_string(),
            fields: Vec::new(),
            creators: Vec::new(),
            collections: Vec::new(),
            tags: Vec::new(),
            notes: Vec::new(),
            attachments: Vec::new(),
            deleted: false,
        }
    }

    pub fn modified(mut self, ts: &str) -> Self {
        self.modified = ts.to_string();
        self
    }

    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    pub fn creator(mut self, given: &str, family: &str, role: &str) -> Self {
        self.creators
            .push((given.to_string(), family.to_string(), role.to_string()));
        self
    }

    pub fn collection(mut self, name: &str) -> Self {
        self.collections.push(name.to_string());
        self
    }

    pub fn tag(mut self, name: &str) -> Self {
        self.tags.push(name.to_string());
        self
    }

    pub fn note(mut self, html: &str) -> Self {
        self.notes.push(html.to_string());
        self
    }

    pub fn attachment(mut self, title: &str, path: &str, content_type: &str) -> Self {
        self.attachments
            .push((title.to_string(), path.to_string(), content_type.to_string()));
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// Interned lookup ids shared across the seeded file / 复用的查找表 id
#[derive(Default)]
struct Interner {
    types: HashMap<String, i64>,
    fields: HashMap<String, i64>,
    roles: HashMap<String, i64>,
    tags: HashMap<String, i64>,
    collections: HashMap<String, i64>,
    next_value: i64,
    next_creator: i64,
    next_child: i64,
}

impl Interner {
    fn new() -> Self {
        Self {
            next_value: 1,
            next_creator: 1,
            next_child: 10_000, // child item ids stay clear of fixture ids
            ..Default::default()
        }
    }
}

/// Write a fresh source database containing exactly `items` / 写入测试库
pub async fn seed_source(path: &Path, items: &[FixtureItem]) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await?;

    for statement in SOURCE_TABLES {
        sqlx::query(statement).execute(&pool).await?;
    }

    let mut interner = Interner::new();
    for item in items {
        insert_item(&pool, &mut interner, item).await?;
    }

    pool.close().await;
    Ok(())
}

/// Mark one item deleted in place, as Zotero's trash does / 标记删除
pub async fn mark_deleted(path: &Path, item_id: i64) -> Result<()> {
    let url = format!("sqlite:{}?mode=rw", path.to_string_lossy());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await?;
    sqlx::query("INSERT OR REPLACE INTO deletedItems (itemID, dateDeleted) VALUES (?, ?)")
        .bind(item_id)
        .bind("2024-01-01 00:00:00")
        .execute(&pool)
        .await?;
    pool.close().await;
    Ok(())
}

async fn intern(
    pool: &Pool<Sqlite>,
    map: &mut HashMap<String, i64>,
    insert_sql: &str,
    name: &str,
) -> Result<i64> {
    if let Some(&id) = map.get(name) {
        return Ok(id);
    }
    let id = map.len() as i64 + 1;
    sqlx::query(insert_sql).bind(id).bind(name).execute(pool).await?;
    map.insert(name.to_string(), id);
    Ok(id)
}

async fn insert_field_value(
    pool: &Pool<Sqlite>,
    interner: &mut Interner,
    item_id: i64,
    name: &str,
    value: &str,
) -> Result<()> {
    let field_id = intern(
        pool,
        &mut interner.fields,
        "INSERT INTO fields (fieldID, fieldName) VALUES (?, ?)",
        name,
    )
    .await?;
    let value_id = interner.next_value;
    interner.next_value += 1;
    sqlx::query("INSERT INTO itemDataValues (valueID, value) VALUES (?, ?)")
        .bind(value_id)
        .bind(value)
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO itemData (itemID, fieldID, valueID) VALUES (?, ?, ?)")
        .bind(item_id)
        .bind(field_id)
        .bind(value_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn insert_item_row(
    pool: &Pool<Sqlite>,
    interner: &mut Interner,
    id: i64,
    key: &str,
    item_type: &str,
    modified: &str,
) -> Result<()> {
    let type_id = intern(
        pool,
        &mut interner.types,
        "INSERT INTO itemTypes (itemTypeID, typeName) VALUES (?, ?)",
        item_type,
    )
    .await?;
    sqlx::query(
        "INSERT INTO items (itemID, itemTypeID, libraryID, key, dateModified) VALUES (?, ?, 1, ?, ?)",
    )
    .bind(id)
    .bind(type_id)
    .bind(key)
    .bind(modified)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_item(
    pool: &Pool<Sqlite>,
    interner: &mut Interner,
    item: &FixtureItem,
) -> Result<()> {
    insert_item_row(pool, interner, item.id, &item.key, &item.item_type, &item.modified).await?;
    if item.deleted {
        sqlx::query("INSERT INTO deletedItems (itemID, dateDeleted) VALUES (?, ?)")
            .bind(item.id)
            .bind("2024-01-01 00:00:00")
            .execute(pool)
            .await?;
    }

    for (name, value) in &item.fields {
        insert_field_value(pool, interner, item.id, name, value).await?;
    }

    for (order_index, (given, family, role)) in item.creators.iter().enumerate() {
        let creator_id = interner.next_creator;
        interner.next_creator += 1;
        sqlx::query("INSERT INTO creators (creatorID, firstName, lastName) VALUES (?, ?, ?)")
            .bind(creator_id)
            .bind(given)
            .bind(family)
            .execute(pool)
            .await?;
        let role_id = intern(
            pool,
            &mut interner.roles,
            "INSERT INTO creatorTypes (creatorTypeID, creatorType) VALUES (?, ?)",
            role,
        )
        .await?;
        sqlx::query(
            "INSERT INTO itemCreators (itemID, creatorID, creatorTypeID, orderIndex) VALUES (?, ?, ?, ?)",
        )
        .bind(item.id)
        .bind(creator_id)
        .bind(role_id)
        .bind(order_index as i64)
        .execute(pool)
        .await?;
    }

    for name in &item.collections {
        let collection_id = intern(
            pool,
            &mut interner.collections,
            "INSERT INTO collections (collectionID, collectionName) VALUES (?, ?)",
            name,
        )
        .await?;
        sqlx::query("INSERT INTO collectionItems (collectionID, itemID) VALUES (?, ?)")
            .bind(collection_id)
            .bind(item.id)
            .execute(pool)
            .await?;
    }

    for name in &item.tags {
        let tag_id = intern(
            pool,
            &mut interner.tags,
            "INSERT INTO tags (tagID, name) VALUES (?, ?)",
            name,
        )
        .await?;
        sqlx::query("INSERT INTO itemTags (itemID, tagID) VALUES (?, ?)")
            .bind(item.id)
            .bind(tag_id)
            .execute(pool)
            .await?;
    }

    // notes and attachments are child items of their own types
    for note in &item.notes {
        let child_id = interner.next_child;
        interner.next_child += 1;
        insert_item_row(
            pool,
            interner,
            child_id,
            &format!("CH{:06}", child_id),
            "note",
            &item.modified,
        )
        .await?;
        sqlx::query("INSERT INTO itemNotes (itemID, parentItemID, note) VALUES (?, ?, ?)")
            .bind(child_id)
            .bind(item.id)
            .bind(note)
            .execute(pool)
            .await?;
    }

    for (title, path, content_type) in &item.attachments {
        let child_id = interner.next_child;
        interner.next_child += 1;
        insert_item_row(
            pool,
            interner,
            child_id,
            &format!("CH{:06}", child_id),
            "attachment",
            &item.modified,
        )
        .await?;
        insert_field_value(pool, interner, child_id, "title", title).await?;
        sqlx::query(
            "INSERT INTO itemAttachments (itemID, parentItemID, path, contentType) VALUES (?, ?, ?, ?)",
        )
        .bind(child_id)
        .bind(item.id)
        .bind(path)
        .bind(content_type)
        .execute(pool)
        .await?;
    }

    Ok(())
}
