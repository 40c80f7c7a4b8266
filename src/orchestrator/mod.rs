//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责会话状态和调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `session` - 核验会话
//! - 持有任务队列、评估表单、预取缓存
//! - 启动时恢复登录状态
//! - 把提交分派到快速通道或人工备注通道
//! - 收集后台提交的报告并统计
//!
//! ### `console` - 操作员控制台
//! - 管理应用生命周期（初始化、运行、退出统计）
//! - 创建中转客户端和本地存储
//! - 把输入命令翻译成会话调用
//!
//! ## 层次关系
//!
//! ```text
//! console (读取命令)
//!     ↓
//! session (队列 + 表单 + 当前任务)
//!     ↓
//! workflow::SubmissionOrchestrator (处理单条任务的提交)
//!     ↓
//! services (能力层：凭据 / 详情 / 表单 / 备注)
//!     ↓
//! infrastructure (基础设施：RelayClient / KeyValueStore)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：session 管状态，console 管输入输出
//! 2. **资源隔离**：只有 console 创建 RelayClient 和存储
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure

pub mod console;
pub mod session;

// 重新导出主要类型
pub use console::{App, Command};
pub use session::{BootstrapStatus, Collaborators, SessionStats, SubmitOutcome, VerifierSession};
