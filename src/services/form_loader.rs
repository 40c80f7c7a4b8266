//! 表单选项加载 - 业务能力层
//!
//! 从数据源的表单定义 HTML 解析出每个评估字段的可选值

use std::sync::Arc;

use tracing::{info, warn};

use crate::clients::DataSourceApi;
use crate::error::AppResult;
use crate::infrastructure::{FieldSelector, MarkupExtractor, Selector};
use crate::models::{EvaluationField, FieldId, FormOptions};

/// 表单中找不到某字段时使用的选项
pub const FALLBACK_OPTIONS: [&str; 3] = ["Sesuai", "Tidak Sesuai", "Tidak Ada"];

pub struct FormLoader {
    data_source: Arc<dyn DataSourceApi>,
    extractor: Arc<dyn MarkupExtractor>,
}

impl FormLoader {
    pub fn new(data_source: Arc<dyn DataSourceApi>, extractor: Arc<dyn MarkupExtractor>) -> Self {
        Self {
            data_source,
            extractor,
        }
    }

    /// 获取并解析表单定义
    ///
    /// 请求失败返回错误；响应不可用时返回未加载的空选项
    pub async fn load(&self, action_id: &str, session: &str) -> AppResult<FormOptions> {
        let form = self.data_source.get_form(action_id, session).await?;
        let Some(markup) = form.markup() else {
            warn!("⚠️ 表单定义不可用 (action_id={}): {:?}", action_id, form.message);
            return Ok(FormOptions::default());
        };

        let options = self.parse(markup, form.id_user.clone());
        info!("📋 表单选项已加载: {} 个字段, id_user={}", options.fields.len(), options.id_user);
        Ok(options)
    }

    /// 解析 HTML；每个字段都会有选项
    pub fn parse(&self, markup: &str, id_user: String) -> FormOptions {
        let selectors: Vec<FieldSelector> = FieldId::ALL
            .iter()
            .map(|id| {
                FieldSelector::new(
                    id.form_name(),
                    Selector::SelectOptions {
                        name: id.form_name().to_string(),
                    },
                )
            })
            .collect();
        let record = self.extractor.extract(markup, &selectors);

        let fields = FieldId::ALL
            .iter()
            .map(|&id| {
                let found = record.all(id.form_name());
                let options = if found.is_empty() {
                    FALLBACK_OPTIONS.iter().map(|s| s.to_string()).collect()
                } else {
                    found.to_vec()
                };
                EvaluationField { id, options }
            })
            .collect();

        FormOptions { fields, id_user }
    }
}
