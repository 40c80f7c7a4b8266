//! # BAPP Verifier
//!
//! 交付记录（BAPP）核验工具：逐条核验任务，提交评估结果并写入审批
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（HTTP 连接、本地存储），只暴露能力
//! - `RelayClient` - 唯一的 HTTP owner，提供 post_json() 能力
//! - `KeyValueStore` - 凭据和队列快照的持久化
//!
//! ### ② 业务能力层（Services）
//! - `clients/` - 数据源、权威系统、登录接口
//! - `services/` - 描述"我能做什么"
//! - `CredentialStore` - 凭据与会话刷新
//! - `DetailService` - 详情选择、重新获取、预取
//! - `FormLoader` / `NoteExtractor` - 从页面片段提取数据
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条任务"的完整处理流程
//! - `TaskQueue` - 过滤后的任务队列
//! - `EvaluationForm` - 评估表单与联动规则
//! - `SubmissionOrchestrator` - 流程编排（submit → 提取备注 → 刷新会话 → 写入审批）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session` - 核验会话，管理当前任务和后台提交
//! - `orchestrator/console` - 操作员控制台
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{JsonFileStore, KeyValueStore, MemoryStore, RelayClient};
pub use models::{ApprovalPayload, ApprovalStatus, DetailPayload, FieldId, SystemKind, Task};
pub use orchestrator::{App, Collaborators, SubmitOutcome, VerifierSession};
pub use workflow::{EvaluationForm, ProcessStatus, RetryPolicy, SubmissionOrchestrator, TaskQueue};
