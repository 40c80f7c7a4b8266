//! 流程层（Workflow）
//!
//! 定义"一条任务"如何被排队、评估和提交；不持有 HTTP 客户端，只依赖 services

pub mod evaluation_form;
pub mod submission;
pub mod task_queue;

pub use evaluation_form::{error_phrase, CascadeRule, Condition, Effect, EvaluationForm, SerialOverride, CASCADE_RULES};
pub use submission::{
    FailedStage, PendingReview, ProcessStatus, ReportOutcome, RetryPolicy, ReviewDecision, SubmissionContext,
    SubmissionOrchestrator, SubmissionReport, SubmissionState, SubmitFailure,
};
pub use task_queue::{QueueFilter, TaskQueue};
