//! Text helpers shared by the reader and the index / 读取器与索引共享的文本工具

use once_cell::sync::Lazy;
use regex::Regex;

/// Leading `YYYY-MM-DD` date pattern / 日期前缀模式
static DATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").unwrap());

static HTML_TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Map every element to a string slice and join with a separator / 映射后拼接
pub fn join_mapped<'a, T, F>(items: &'a [T], sep: &str, mapper: F) -> String
where
    F: Fn(&'a T) -> &'a str,
{
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        out.push_str(mapper(item));
    }
    out
}

/// Extract the 4-digit year from a date value / 提取年份
///
/// `"2016-11-01"` yields `"2016"`; values that do not start with an ISO date
/// fall back to their first four characters.
pub fn extract_year(value: &str) -> String {
    if let Some(caps) = DATE_REGEX.captures(value) {
        return caps[1].to_string();
    }
    value.chars().take(4).collect()
}

/// Remove HTML tags and collapse the remaining whitespace / 去标签并压缩空白
pub fn strip_html(text: &str) -> String {
    let stripped = HTML_TAG_REGEX.replace_all(text, "");
    collapse_whitespace(&stripped)
}

/// Collapse whitespace runs into single spaces and trim / 压缩空白
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
