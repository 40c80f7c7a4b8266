use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::task::deserialize_lenient_string;

/// 权威系统返回的单条任务详情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailPayload {
    #[serde(default)]
    pub summary: Summary,
    /// 物流交付记录
    #[serde(rename = "awb", default)]
    pub delivery_record: DeliveryRecord,
    #[serde(default, deserialize_with = "deserialize_null_as_empty")]
    pub comments: Vec<Comment>,
    /// 权威系统中的审批记录编号
    #[serde(rename = "extractedId", default, deserialize_with = "deserialize_lenient_string")]
    pub extracted_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub npsn: String,
    #[serde(default)]
    pub school_name: Option<String>,
    #[serde(default)]
    pub kabupaten: Option<String>,
    #[serde(default)]
    pub provinsi: Option<String>,
    #[serde(default)]
    pub nomor_resi: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub bapp_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeliveryRecord {
    #[serde(rename = "OrderID", default)]
    pub order_id: Option<String>,
    #[serde(rename = "ListPhotoJSON", default, deserialize_with = "deserialize_null_as_empty")]
    pub photos: BTreeMap<String, Option<String>>,
    #[serde(rename = "SignatureURL", default)]
    pub signature_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_null_as_empty")]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub actual_receiver_address: Option<String>,
    #[serde(default)]
    pub connote_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub date: Option<String>,
}

/// 核验人员留下的评论
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "CreatedAt", default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub commenter_name: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// 页面展示用的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub title: String,
    pub src: String,
}

/// 审批历史
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalLog {
    pub date: String,
    pub status: String,
    pub user: String,
    pub note: String,
}

/// 学校信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolInfo {
    pub npsn: String,
    pub name: String,
    pub kabupaten: String,
    pub provinsi: String,
    pub address: String,
}

/// 当前任务的工作视图
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailView {
    pub school: SchoolInfo,
    pub serial_number: String,
    pub images: Vec<MediaItem>,
    pub history: Vec<ApprovalLog>,
    pub extracted_id: String,
    pub resi: String,
    pub bapp_id: String,
    pub verification_date: NaiveDate,
}

impl DetailPayload {
    /// 所有需要预加载的媒体地址（照片 + 签名）
    pub fn media_urls(&self) -> Vec<String> {
        self.media_items().into_iter().map(|m| m.src).collect()
    }

    fn media_items(&self) -> Vec<MediaItem> {
        let record = &self.delivery_record;
        let mut items: Vec<MediaItem> = record
            .photos
            .iter()
            .filter_map(|(key, url)| {
                url.as_deref().filter(|u| !u.is_empty()).map(|u| MediaItem {
                    title: key.to_uppercase(),
                    src: u.to_string(),
                })
            })
            .collect();

        if let Some(sig) = record.signature_url.as_deref().filter(|u| !u.is_empty()) {
            items.push(MediaItem {
                title: "SIGNATURE".to_string(),
                src: sig.to_string(),
            });
        }
        items
    }

    /// 核验日期：最后一条物流记录的日期，没有则使用 `today`
    pub fn verification_date(&self, today: NaiveDate) -> NaiveDate {
        self.delivery_record
            .history
            .last()
            .and_then(|h| h.date.as_deref())
            .and_then(|d| d.get(..10))
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .unwrap_or(today)
    }

    /// 转换为工作视图，缺失字段一律显示为 "-"
    pub fn to_view(&self, today: NaiveDate) -> DetailView {
        let summary = &self.summary;
        let record = &self.delivery_record;

        let history = self
            .comments
            .iter()
            .map(|c| ApprovalLog {
                date: c.created_at.clone().unwrap_or_default(),
                status: "REVISI/DITOLAK".to_string(),
                user: or_default(c.commenter_name.as_deref(), "Verifier"),
                note: c.comment.clone().unwrap_or_default(),
            })
            .collect();

        let resi = record
            .connote_number
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(summary.nomor_resi.as_deref())
            .unwrap_or("-")
            .to_string();

        DetailView {
            school: SchoolInfo {
                npsn: or_dash(Some(summary.npsn.as_str())),
                name: or_dash(summary.school_name.as_deref()),
                kabupaten: or_dash(summary.kabupaten.as_deref()),
                provinsi: or_dash(summary.provinsi.as_deref()),
                address: or_dash(record.actual_receiver_address.as_deref()),
            },
            serial_number: or_dash(record.order_id.as_deref()),
            images: self.media_items(),
            history,
            extracted_id: self.extracted_id.clone(),
            resi,
            bapp_id: summary.bapp_id.clone(),
            verification_date: self.verification_date(today),
        }
    }
}

fn or_dash(value: Option<&str>) -> String {
    or_default(value, "-")
}

fn or_default(value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

fn deserialize_null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
