//! 驳回备注提取 - 业务能力层
//!
//! 提交成功后查看记录表单，取出数据源给出的备注；
//! 页面上有"Pihak pertama"相关的错误提示时补上对应的标准句子

use std::sync::Arc;

use tracing::{debug, warn};

use crate::clients::DataSourceApi;
use crate::infrastructure::{FieldSelector, MarkupExtractor, Selector};

/// 第一方身份不合规时追加的标准句子
pub const FIRST_PARTY_SENTENCE: &str =
    "(1AN) Pihak pertama hanya boleh dari kepala sekolah/wakil kepala sekolah/guru/pengajar/operator sekolah";

const FIRST_PARTY_MARKER: &str = "pihak pertama";
const NOTE_KEY: &str = "note";
const ALERT_KEY: &str = "alerts";

pub struct NoteExtractor {
    data_source: Arc<dyn DataSourceApi>,
    extractor: Arc<dyn MarkupExtractor>,
}

impl NoteExtractor {
    pub fn new(data_source: Arc<dyn DataSourceApi>, extractor: Arc<dyn MarkupExtractor>) -> Self {
        Self {
            data_source,
            extractor,
        }
    }

    /// 获取备注；任何失败都返回空备注
    pub async fn fetch(&self, record_id: &str, session: &str) -> String {
        let form = match self.data_source.view_form(record_id, session).await {
            Ok(form) => form,
            Err(e) => {
                warn!("查看表单失败 (id={}): {}", record_id, e);
                return String::new();
            }
        };
        match form.markup() {
            Some(markup) => self.extract(markup),
            None => {
                debug!("查看表单没有返回 HTML (id={})", record_id);
                String::new()
            }
        }
    }

    /// 从 HTML 中提取备注
    pub fn extract(&self, markup: &str) -> String {
        let selectors = [
            FieldSelector::new(
                NOTE_KEY,
                Selector::TextareaValue {
                    name: "description".to_string(),
                },
            ),
            FieldSelector::new(
                ALERT_KEY,
                Selector::ElementText {
                    tag: "div".to_string(),
                    classes: vec!["alert".to_string(), "alert-danger".to_string()],
                },
            ),
        ];
        let record = self.extractor.extract(markup, &selectors);

        let note = record.first(NOTE_KEY).unwrap_or_default().to_string();
        let first_party_flagged = record
            .all(ALERT_KEY)
            .iter()
            .any(|text| text.to_lowercase().contains(FIRST_PARTY_MARKER));

        if first_party_flagged {
            append_first_party_sentence(note)
        } else {
            note
        }
    }
}

/// 追加标准句子（已包含时不重复）
pub fn append_first_party_sentence(note: String) -> String {
    if note.contains(FIRST_PARTY_SENTENCE) {
        return note;
    }
    if note.is_empty() {
        FIRST_PARTY_SENTENCE.to_string()
    } else {
        format!("{} {}", note, FIRST_PARTY_SENTENCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::FormMarkup;
    use crate::infrastructure::RegexExtractor;
    use crate::models::ApprovalStatus;
    use crate::testing::StubDataSource;

    fn extractor() -> NoteExtractor {
        NoteExtractor::new(Arc::new(StubDataSource::default()), Arc::new(RegexExtractor::new()))
    }

    #[test]
    fn test_note_without_alert() {
        let html = r#"<textarea name="description">(1W) BAPP Hal 1 tidak ada</textarea>"#;
        assert_eq!(extractor().extract(html), "(1W) BAPP Hal 1 tidak ada");
    }

    #[test]
    fn test_whitespace_note_is_kept_and_rejects() {
        let html = r#"<textarea name="description">   </textarea>"#;
        let note = extractor().extract(html);
        assert_eq!(note, "   ");
        assert_eq!(ApprovalStatus::from_note(&note), ApprovalStatus::Rejected);
    }

    #[test]
    fn test_alert_appends_sentence_once() {
        let html = format!(
            r#"<textarea name="description">Foto buram {}</textarea>
               <div class="alert alert-danger">PIHAK PERTAMA tidak valid</div>
               <div class="alert alert-danger">Pihak pertama lagi</div>"#,
            FIRST_PARTY_SENTENCE
        );
        let note = extractor().extract(&html);
        assert_eq!(note.matches(FIRST_PARTY_SENTENCE).count(), 1);
        assert!(note.starts_with("Foto buram"));
    }

    #[test]
    fn test_alert_on_empty_note() {
        let html = r#"<textarea name="description"></textarea><div class="alert alert-danger">Pihak Pertama</div>"#;
        assert_eq!(extractor().extract(html), FIRST_PARTY_SENTENCE);
    }

    #[test]
    fn test_other_alerts_ignored() {
        let html = r#"<textarea name="description"></textarea><div class="alert alert-warning">Pihak pertama</div>"#;
        assert_eq!(extractor().extract(html), "");
    }

    #[tokio::test]
    async fn test_unavailable_form_gives_empty_note() {
        let stub = StubDataSource {
            view: FormMarkup {
                success: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let notes = NoteExtractor::new(Arc::new(stub), Arc::new(RegexExtractor::new()));
        assert_eq!(notes.fetch("77", "tok").await, "");
    }
}
