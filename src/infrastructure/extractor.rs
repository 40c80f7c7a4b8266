//! 标记提取器 - 基础设施层
//!
//! 把数据源返回的原始 HTML 按选择器提取为键值记录。
//! 管线只依赖 `MarkupExtractor` 接口；`RegexExtractor` 是默认实现。

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

/// 选择器
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `<textarea name="…">` 的内容
    TextareaValue { name: String },
    /// `<select name="…">` 下所有非空 `<option value>`
    SelectOptions { name: String },
    /// 带有全部指定 class 的元素的纯文本
    ElementText { tag: String, classes: Vec<String> },
}

/// 需要提取的一个字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelector {
    pub key: String,
    pub selector: Selector,
}

impl FieldSelector {
    pub fn new(key: impl Into<String>, selector: Selector) -> Self {
        Self {
            key: key.into(),
            selector,
        }
    }
}

/// 提取结果：每个键对应零个或多个值
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedRecord {
    values: HashMap<String, Vec<String>>,
}

impl ExtractedRecord {
    pub fn insert(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.values.insert(key.into(), values);
    }

    /// 第一个值；缺失时为 None
    pub fn first(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// 全部值；缺失时为空切片
    pub fn all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// 标记提取能力
pub trait MarkupExtractor: Send + Sync {
    /// 提取失败的字段不出现在结果中，不返回错误
    fn extract(&self, markup: &str, selectors: &[FieldSelector]) -> ExtractedRecord;
}

/// 基于正则的简单实现
#[derive(Debug, Default, Clone)]
pub struct RegexExtractor;

impl RegexExtractor {
    pub fn new() -> Self {
        Self
    }

    fn textarea_value(markup: &str, name: &str) -> Vec<String> {
        let pattern = format!(
            r#"(?is)<textarea[^>]*\bname\s*=\s*["']{}["'][^>]*>(.*?)</textarea>"#,
            regex::escape(name)
        );
        match Regex::new(&pattern) {
            Ok(re) => re
                .captures(markup)
                .and_then(|cap| cap.get(1))
                .map(|m| vec![textarea_text(m.as_str())])
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    fn select_options(markup: &str, name: &str) -> Vec<String> {
        let select_pattern = format!(
            r#"(?is)<select[^>]*\bname\s*=\s*["']{}["'][^>]*>(.*?)</select>"#,
            regex::escape(name)
        );
        let Ok(select_re) = Regex::new(&select_pattern) else {
            return Vec::new();
        };
        let Some(body) = select_re.captures(markup).and_then(|cap| cap.get(1)) else {
            return Vec::new();
        };
        let Ok(option_re) = Regex::new(r#"(?is)<option[^>]*\bvalue\s*=\s*"([^"]*)""#) else {
            return Vec::new();
        };
        option_re
            .captures_iter(body.as_str())
            .filter_map(|cap| cap.get(1).map(|m| decode_entities(m.as_str())))
            .filter(|v| !v.trim().is_empty())
            .collect()
    }

    fn element_text(markup: &str, tag: &str, classes: &[String]) -> Vec<String> {
        let pattern = format!(
            r#"(?is)<{tag}\b[^>]*\bclass\s*=\s*["']([^"']*)["'][^>]*>(.*?)</{tag}>"#,
            tag = regex::escape(tag)
        );
        let (Ok(re), Ok(tag_re)) = (Regex::new(&pattern), Regex::new(r"(?s)<[^>]+>")) else {
            return Vec::new();
        };
        re.captures_iter(markup)
            .filter(|cap| {
                let class_attr = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
                let present: Vec<&str> = class_attr.split_whitespace().collect();
                classes.iter().all(|c| present.contains(&c.as_str()))
            })
            .filter_map(|cap| cap.get(2))
            .map(|m| {
                let text = tag_re.replace_all(m.as_str(), " ");
                decode_entities(text.split_whitespace().collect::<Vec<_>>().join(" ").as_str())
            })
            .collect()
    }
}

impl MarkupExtractor for RegexExtractor {
    fn extract(&self, markup: &str, selectors: &[FieldSelector]) -> ExtractedRecord {
        let mut record = ExtractedRecord::default();
        for field in selectors {
            let values = match &field.selector {
                Selector::TextareaValue { name } => Self::textarea_value(markup, name),
                Selector::SelectOptions { name } => Self::select_options(markup, name),
                Selector::ElementText { tag, classes } => Self::element_text(markup, tag, classes),
            };
            if values.is_empty() {
                debug!("选择器 {} 没有匹配", field.key);
                continue;
            }
            record.insert(field.key.clone(), values);
        }
        record
    }
}

/// 常见 HTML 实体解码
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// 文本框的值：解析时只去掉紧跟开始标签的一个换行，其余空白原样保留
fn textarea_text(raw: &str) -> String {
    let raw = raw
        .strip_prefix("\r\n")
        .or_else(|| raw.strip_prefix('\n'))
        .unwrap_or(raw);
    decode_entities(raw)
}
