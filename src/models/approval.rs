use std::fmt;

use chrono::{FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// 审批状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Approved,
    Rejected,
}

impl ApprovalStatus {
    /// 备注非空即驳回，空备注即通过
    pub fn from_note(note: &str) -> Self {
        if note.is_empty() {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// 写入权威系统的审批数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPayload {
    pub status: ApprovalStatus,
    #[serde(rename = "id")]
    pub extracted_id: String,
    pub note: String,
    #[serde(rename = "session_id")]
    pub session_token: String,
    pub bapp_id: String,
    pub bapp_date: String,
}

impl ApprovalPayload {
    pub fn new(
        note: String,
        extracted_id: String,
        session_token: String,
        bapp_id: String,
        bapp_date: String,
    ) -> Self {
        Self {
            status: ApprovalStatus::from_note(&note),
            extracted_id,
            note,
            session_token,
            bapp_id,
            bapp_date,
        }
    }

    /// 替换备注并重新推导状态
    pub fn with_note(mut self, note: String) -> Self {
        self.status = ApprovalStatus::from_note(&note);
        self.note = note;
        self
    }
}

/// 权威系统要求的时间格式：日期 + 当前时刻（UTC+7），固定微秒部分
pub fn format_authority_timestamp(date: NaiveDate) -> String {
    let now = match FixedOffset::east_opt(7 * 3600) {
        Some(wib) => Utc::now().with_timezone(&wib).time(),
        None => Utc::now().time(),
    };
    format_authority_timestamp_at(date, now)
}

pub fn format_authority_timestamp_at(date: NaiveDate, time: NaiveTime) -> String {
    format!("{}T{}.477893+07:00", date.format("%Y-%m-%d"), time.format("%H:%M:%S"))
}
