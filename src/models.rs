use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::utils;

pub const CREATOR_ROLE_AUTHOR: &str = "author";
pub const CREATOR_ROLE_EDITOR: &str = "editor";

/// Timestamp format Zotero writes into dateModified / Zotero 的时间戳格式
pub const MODIFIED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date-bearing fields, scanned in order; the first present one wins
const DATE_FIELDS: [&str; 5] = [
    "dateEnacted",
    "dateDecided",
    "filingDate",
    "issueDate",
    "date",
];

/// Publisher-like fields; all present ones are concatenated
const PUBLISHER_FIELDS: [&str; 5] = [
    "publisher",
    "journalAbbreviation",
    "conferenceName",
    "proceedingsTitle",
    "websiteTitle",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creator {
    /// Explicit position within the record's creator list / 排序序号
    pub order_index: i64,
    pub given: String,
    pub family: String,
    /// Role tag: author, editor, translator, ... / 角色
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub key: String,
    pub path: String,         // storage:Mirzadeh2022ArchitectureMatters.pdf
    pub title: String,        // Preprint PDF
    pub url: String,          // http://arxiv.org/pdf/2202.00275v1
    pub content_type: String, // application/pdf
}

/// One entry of the source library / 文献库中的一条记录
///
/// Transient: rebuilt from the source on every read pass. The serialized
/// form of this struct is what the index stores as payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryRecord {
    /// Internal numeric identifier, doubles as the index rowid / 内部ID
    pub id: i64,
    /// Stable external identifier, e.g. TP6IKMQ6 / 外部标识
    pub key: String,
    /// Modification timestamp, `YYYY-MM-DD HH:MM:SS` / 修改时间
    pub modified: String,
    pub library: i64,
    pub item_type: String,
    /// Field name -> value; keys vary by item type. Ordered so the
    /// serialized payload is stable across passes / 元数据映射
    pub meta: BTreeMap<String, String>,
    pub creators: Vec<Creator>,
    pub collections: Vec<String>,
    pub tags: Vec<String>,
    pub notes: Vec<String>,
    pub attachments: Vec<Attachment>,
}

impl LibraryRecord {
    /// Title, falling back to the type-specific caseName field / 标题
    pub fn title(&self) -> &str {
        self.meta
            .get("title")
            .or_else(|| self.meta.get("caseName"))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn abstract_note(&self) -> &str {
        self.meta.get("abstractNote").map(String::as_str).unwrap_or("")
    }

    /// Resolved 4-digit year; empty when no date-bearing field exists / 年份
    pub fn year(&self) -> String {
        for field in DATE_FIELDS {
            if let Some(value) = self.meta.get(field) {
                return utils::extract_year(value);
            }
        }
        String::new()
    }

    /// All publisher-like fields present on the record, space-joined / 出版方
    pub fn publisher(&self) -> String {
        let found: Vec<&str> = PUBLISHER_FIELDS
            .iter()
            .filter_map(|field| self.meta.get(*field).map(String::as_str))
            .collect();
        found.join(" ")
    }

    /// Family names of every creator, space-joined / 全部创作者姓氏
    pub fn family_names(&self) -> String {
        utils::join_mapped(&self.creators, " ", |c| c.family.as_str())
    }

    /// Family names of creators with the given role, space-joined / 按角色过滤
    pub fn family_names_with_role(&self, role: &str) -> String {
        let mut out = String::new();
        for creator in self.creators.iter().filter(|c| c.role == role) {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&creator.family);
        }
        out
    }

    pub fn modified_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.modified, MODIFIED_FORMAT).ok()
    }

    /// Short display form of the author list / 作者列表的显示摘要
    pub fn author_summary(&self) -> String {
        let authors: Vec<&str> = self
            .creators
            .iter()
            .filter(|c| c.role == CREATOR_ROLE_AUTHOR)
            .map(|c| c.family.as_str())
            .collect();
        match authors.len() {
            0 => String::new(),
            1 => authors[0].to_string(),
            2 => format!("{} and {}", authors[0], authors[1]),
            _ => format!("{} et al.", authors[0]),
        }
    }
}

/// One ranked search hit / 一条搜索命中
///
/// Scores are raw FTS5 bm25 values: more negative means more relevant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub record: LibraryRecord,
    pub score: f32,
}
