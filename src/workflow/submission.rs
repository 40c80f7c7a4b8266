//! 提交编排 - 流程层
//!
//! 核心职责：定义"一条任务"从提交到写入审批的完整流程
//!
//! 流程顺序：
//! 1. 提交评估结果到数据源（失败固定间隔重试，直到成功）
//! 2. 查看记录表单，提取驳回备注
//! 3. 刷新权威系统会话
//! 4. （人工备注模式）等待操作员确认备注
//! 5. 写入审批
//!
//! 快速通道把整个流程放到后台任务里，结果通过通道回报；
//! 人工备注模式由调用方逐步等待。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::clients::{AuthorityApi, DataSourceApi, LoginApi};
use crate::error::{AppResult, BusinessError};
use crate::models::{format_authority_timestamp, ApprovalPayload, SubmissionPayload, SystemKind, Task};
use crate::services::{CredentialStore, NoteExtractor, RefreshOutcome};
use crate::utils::truncate_text;

/// 单次提交失败的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitFailure {
    /// 网络层失败
    Transport(String),
    /// 数据源返回 success=false
    Rejected(Option<String>),
}

impl fmt::Display for SubmitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitFailure::Transport(msg) => write!(f, "网络错误: {}", msg),
            SubmitFailure::Rejected(Some(msg)) => write!(f, "数据源拒绝: {}", msg),
            SubmitFailure::Rejected(None) => write!(f, "数据源拒绝"),
        }
    }
}

type RetryPredicate = Arc<dyn Fn(u32, &SubmitFailure) -> bool + Send + Sync>;

/// 提交重试策略：固定间隔，是否继续由谓词决定
#[derive(Clone)]
pub struct RetryPolicy {
    pub delay: Duration,
    retry_if: RetryPredicate,
}

impl RetryPolicy {
    /// 永不放弃
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            delay,
            retry_if: Arc::new(|_, _| true),
        }
    }

    /// 零间隔、永不放弃（测试用）
    pub fn immediate() -> Self {
        Self::unbounded(Duration::ZERO)
    }

    /// 替换重试谓词；参数是已尝试次数和本次失败原因
    pub fn with_predicate(mut self, retry_if: impl Fn(u32, &SubmitFailure) -> bool + Send + Sync + 'static) -> Self {
        self.retry_if = Arc::new(retry_if);
        self
    }

    pub fn should_retry(&self, attempts: u32, failure: &SubmitFailure) -> bool {
        (self.retry_if)(attempts, failure)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy").field("delay", &self.delay).finish()
    }
}

/// 流程状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting(u32),
    SubmitSucceeded,
    FetchingRejectionNote,
    RefreshingCredential,
    AwaitingManualReview,
    WritingApproval,
    Done,
}

/// 失败阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    Submit,
    SaveApproval,
}

impl fmt::Display for FailedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailedStage::Submit => write!(f, "submit"),
            FailedStage::SaveApproval => write!(f, "save-approval"),
        }
    }
}

/// 处理状态指示灯
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProcessStatus {
    #[default]
    Idle,
    Processing,
    Success,
    Error { stage: FailedStage, message: String },
}

/// 一次提交所需的全部输入
#[derive(Debug, Clone)]
pub struct SubmissionContext {
    pub task: Task,
    pub payload: SubmissionPayload,
    /// 权威系统审批记录编号（来自详情）
    pub extracted_id: String,
    pub bapp_id: String,
    pub verification_date: NaiveDate,
}

/// 流程结局
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// 审批已写入
    Written,
    /// 没有写入审批（缺少令牌或审批编号）
    Skipped { reason: String },
    Failed { stage: FailedStage, message: String },
}

/// 一次提交的最终报告
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub npsn: String,
    pub attempts: u32,
    pub note: String,
    pub approval: Option<ApprovalPayload>,
    pub outcome: ReportOutcome,
    pub trail: Vec<SubmissionState>,
}

impl SubmissionReport {
    pub fn is_written(&self) -> bool {
        self.outcome == ReportOutcome::Written
    }
}

/// 等待人工确认的提交
#[derive(Debug, Clone)]
pub struct PendingReview {
    pub task: Task,
    pub attempts: u32,
    /// 提取到的备注草稿
    pub note: String,
    pub approval: Option<ApprovalPayload>,
    pub trail: Vec<SubmissionState>,
}

/// 人工确认的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    /// 使用修改后的备注（状态随备注重新推导）
    Confirm(String),
    /// 保留提取到的备注
    Keep,
}

/// 提交编排器
///
/// - 只依赖外部系统接口和凭据存储
/// - 不持有队列，不关心游标
/// - 克隆后共享同一个状态指示灯
#[derive(Clone)]
pub struct SubmissionOrchestrator {
    data_source: Arc<dyn DataSourceApi>,
    authority: Arc<dyn AuthorityApi>,
    login: Arc<dyn LoginApi>,
    credentials: CredentialStore,
    notes: Arc<NoteExtractor>,
    policy: RetryPolicy,
    status: Arc<watch::Sender<ProcessStatus>>,
}

impl SubmissionOrchestrator {
    pub fn new(
        data_source: Arc<dyn DataSourceApi>,
        authority: Arc<dyn AuthorityApi>,
        login: Arc<dyn LoginApi>,
        credentials: CredentialStore,
        notes: Arc<NoteExtractor>,
        policy: RetryPolicy,
    ) -> Self {
        let (status, _) = watch::channel(ProcessStatus::Idle);
        Self {
            data_source,
            authority,
            login,
            credentials,
            notes,
            policy,
            status: Arc::new(status),
        }
    }

    /// 替换重试策略
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 订阅状态指示灯
    pub fn subscribe(&self) -> watch::Receiver<ProcessStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> ProcessStatus {
        self.status.borrow().clone()
    }

    fn set_status(&self, status: ProcessStatus) {
        self.status.send_replace(status);
    }

    // ========== 阶段 1: 提交 ==========

    /// 提交直到成功，返回总尝试次数
    ///
    /// 只有重试谓词拒绝继续时才返回错误
    pub async fn submit_with_retry(&self, ctx: &SubmissionContext, trail: &mut Vec<SubmissionState>) -> AppResult<u32> {
        let session = self.credentials.require_session(SystemKind::DataSource)?;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            trail.push(SubmissionState::Submitting(attempt));
            debug!("{} 📤 提交第 {} 次", ctx.task, attempt);

            let failure = match self.data_source.submit(&ctx.payload, &session).await {
                Ok(resp) if resp.success => {
                    info!("{} ✓ 提交成功 (共 {} 次)", ctx.task, attempt);
                    trail.push(SubmissionState::SubmitSucceeded);
                    return Ok(attempt);
                }
                Ok(resp) => SubmitFailure::Rejected(resp.message),
                Err(e) => SubmitFailure::Transport(e.to_string()),
            };

            if !self.policy.should_retry(attempt, &failure) {
                error!("{} ❌ 放弃提交 (第 {} 次): {}", ctx.task, attempt, failure);
                return Err(BusinessError::RetryAbandoned {
                    attempts: attempt,
                    reason: failure.to_string(),
                }
                .into());
            }

            warn!(
                "{} ⚠️ 提交失败 (第 {} 次): {}，{} 毫秒后重试...",
                ctx.task,
                attempt,
                failure,
                self.policy.delay.as_millis()
            );
            sleep(self.policy.delay).await;
        }
    }

    // ========== 阶段 2 + 3: 备注与会话 ==========

    /// 提取备注、刷新会话并构建审批数据
    ///
    /// 没有权威系统令牌或审批编号时返回 None
    pub async fn prepare_approval(
        &self,
        ctx: &SubmissionContext,
        trail: &mut Vec<SubmissionState>,
    ) -> (String, Option<ApprovalPayload>) {
        trail.push(SubmissionState::FetchingRejectionNote);
        let note = match self.credentials.session_token(SystemKind::DataSource) {
            Some(session) => self.notes.fetch(&ctx.task.action_id, &session).await,
            None => String::new(),
        };
        if note.is_empty() {
            info!("{} 📝 没有驳回备注", ctx.task);
        } else {
            info!("{} 📝 驳回备注: {}", ctx.task, truncate_text(&note, 80));
        }

        trail.push(SubmissionState::RefreshingCredential);
        let token = match self.credentials.refresh(SystemKind::Authority, self.login.as_ref()).await {
            RefreshOutcome::Refreshed(token) => Some(token),
            RefreshOutcome::NoCredentials => self.credentials.session_token(SystemKind::Authority),
            RefreshOutcome::LoginFailed(reason) => {
                warn!("{} ⚠️ 会话刷新失败，继续使用原令牌: {}", ctx.task, reason);
                self.credentials.session_token(SystemKind::Authority)
            }
        };

        let approval = match token {
            Some(token) if !ctx.extracted_id.is_empty() => Some(ApprovalPayload::new(
                note.clone(),
                ctx.extracted_id.clone(),
                token,
                ctx.bapp_id.clone(),
                format_authority_timestamp(ctx.verification_date),
            )),
            _ => None,
        };
        (note, approval)
    }

    // ========== 阶段 5: 写入审批 ==========

    pub async fn write_approval(&self, payload: &ApprovalPayload) -> AppResult<()> {
        self.authority.save_approval(payload).await
    }

    /// 操作员手动重试之前失败的审批写入
    pub async fn retry_approval(&self, payload: &ApprovalPayload) -> AppResult<()> {
        self.set_status(ProcessStatus::Processing);
        match self.write_approval(payload).await {
            Ok(()) => {
                info!("✅ 审批重试成功: id={}", payload.extracted_id);
                self.set_status(ProcessStatus::Success);
                Ok(())
            }
            Err(e) => {
                self.set_status(ProcessStatus::Error {
                    stage: FailedStage::SaveApproval,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    // ========== 快速通道 ==========

    /// 完整执行一次提交（不等待人工确认）
    pub async fn run(&self, ctx: SubmissionContext) -> SubmissionReport {
        self.set_status(ProcessStatus::Processing);
        let mut trail = vec![SubmissionState::Idle];

        let attempts = match self.submit_with_retry(&ctx, &mut trail).await {
            Ok(n) => n,
            Err(e) => {
                let message = e.to_string();
                self.set_status(ProcessStatus::Error {
                    stage: FailedStage::Submit,
                    message: message.clone(),
                });
                return SubmissionReport {
                    npsn: ctx.task.npsn.clone(),
                    attempts: trail.iter().filter(|s| matches!(s, SubmissionState::Submitting(_))).count() as u32,
                    note: String::new(),
                    approval: None,
                    outcome: ReportOutcome::Failed {
                        stage: FailedStage::Submit,
                        message,
                    },
                    trail,
                };
            }
        };

        let (note, approval) = self.prepare_approval(&ctx, &mut trail).await;
        self.finish(&ctx.task, attempts, note, approval, trail).await
    }

    /// 后台执行，完成后把报告发到通道
    pub fn spawn(&self, ctx: SubmissionContext, reports: mpsc::UnboundedSender<SubmissionReport>) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let report = orchestrator.run(ctx).await;
            if reports.send(report).is_err() {
                debug!("报告通道已关闭");
            }
        })
    }

    // ========== 人工备注模式 ==========

    /// 执行到等待人工确认为止
    pub async fn run_until_review(&self, ctx: SubmissionContext) -> AppResult<PendingReview> {
        self.set_status(ProcessStatus::Processing);
        let mut trail = vec![SubmissionState::Idle];

        let attempts = match self.submit_with_retry(&ctx, &mut trail).await {
            Ok(n) => n,
            Err(e) => {
                self.set_status(ProcessStatus::Error {
                    stage: FailedStage::Submit,
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let (note, approval) = self.prepare_approval(&ctx, &mut trail).await;
        trail.push(SubmissionState::AwaitingManualReview);
        info!("{} ⏸ 等待人工确认备注", ctx.task);

        Ok(PendingReview {
            task: ctx.task,
            attempts,
            note,
            approval,
            trail,
        })
    }

    /// 按操作员的决定写入审批
    pub async fn finish_review(&self, pending: PendingReview, decision: ReviewDecision) -> SubmissionReport {
        let PendingReview {
            task,
            attempts,
            note,
            approval,
            trail,
        } = pending;

        let (note, approval) = match decision {
            ReviewDecision::Confirm(edited) => {
                let approval = approval.map(|a| a.with_note(edited.clone()));
                (edited, approval)
            }
            ReviewDecision::Keep => (note, approval),
        };
        self.finish(&task, attempts, note, approval, trail).await
    }

    async fn finish(
        &self,
        task: &Task,
        attempts: u32,
        note: String,
        approval: Option<ApprovalPayload>,
        mut trail: Vec<SubmissionState>,
    ) -> SubmissionReport {
        let Some(payload) = approval else {
            let reason = "没有权威系统令牌或审批编号".to_string();
            warn!("{} ⚠️ 跳过审批写入: {}", task, reason);
            trail.push(SubmissionState::Done);
            self.set_status(ProcessStatus::Success);
            return SubmissionReport {
                npsn: task.npsn.clone(),
                attempts,
                note,
                approval: None,
                outcome: ReportOutcome::Skipped { reason },
                trail,
            };
        };

        trail.push(SubmissionState::WritingApproval);
        let outcome = match self.write_approval(&payload).await {
            Ok(()) => {
                info!("{} ✅ 审批已写入: {}", task, payload.status);
                self.set_status(ProcessStatus::Success);
                ReportOutcome::Written
            }
            Err(e) => {
                error!("{} ❌ 审批写入失败: {}", task, e);
                let message = e.to_string();
                self.set_status(ProcessStatus::Error {
                    stage: FailedStage::SaveApproval,
                    message: message.clone(),
                });
                ReportOutcome::Failed {
                    stage: FailedStage::SaveApproval,
                    message,
                }
            }
        };
        trail.push(SubmissionState::Done);

        SubmissionReport {
            npsn: task.npsn.clone(),
            attempts,
            note,
            approval: Some(payload),
            outcome,
            trail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::FormMarkup;
    use crate::infrastructure::{MemoryStore, RegexExtractor};
    use crate::models::{ApprovalStatus, Credentials};
    use crate::testing::{task, StubAuthority, StubDataSource, StubLogin};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx(extracted_id: &str) -> SubmissionContext {
        let task = task("101", "SN-1");
        let payload = SubmissionPayload {
            id_user: "55".to_string(),
            npsn: task.npsn.clone(),
            sn_penyedia: task.serial_number.clone(),
            cek_sn_penyedia: String::new(),
            id_update: task.action_id.clone(),
            no_bapp: task.bapp_number.clone(),
            ket_tgl_bapp: "Sesuai".to_string(),
            tgl_bapp: "2026-01-07".to_string(),
            sn_bapp: task.serial_number.clone(),
            geo_tag: "Sesuai".to_string(),
            f_papan_identitas: "Sesuai".to_string(),
            f_box_pic: "Sesuai".to_string(),
            f_unit: "Sesuai".to_string(),
            spesifikasi_dxdiag: "Sesuai".to_string(),
            bc_bapp_sn: "Ada".to_string(),
            bapp_hal1: "Lengkap".to_string(),
            bapp_hal2: "Lengkap".to_string(),
            nm_ttd_bapp: "Konsisten".to_string(),
            stempel: "Sesuai".to_string(),
        };
        SubmissionContext {
            task,
            payload,
            extracted_id: extracted_id.to_string(),
            bapp_id: "B101".to_string(),
            verification_date: NaiveDate::from_ymd_opt(2026, 1, 7).unwrap(),
        }
    }

    struct Fixture {
        orchestrator: SubmissionOrchestrator,
        data_source: Arc<StubDataSource>,
        authority: Arc<StubAuthority>,
    }

    fn fixture(data_source: StubDataSource, policy: RetryPolicy) -> Fixture {
        let data_source = Arc::new(data_source);
        let authority = Arc::new(StubAuthority::default());
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
        credentials.set_session_token(SystemKind::DataSource, "ds").unwrap();
        credentials.set_session_token(SystemKind::Authority, "dac-old").unwrap();
        credentials
            .set_credentials(SystemKind::Authority, &Credentials::new("u", "p"))
            .unwrap();
        let notes = Arc::new(NoteExtractor::new(data_source.clone(), Arc::new(RegexExtractor::new())));
        let orchestrator = SubmissionOrchestrator::new(
            data_source.clone(),
            authority.clone(),
            Arc::new(StubLogin::default()),
            credentials,
            notes,
            policy,
        );
        Fixture {
            orchestrator,
            data_source,
            authority,
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let stub = StubDataSource {
            submit_failures: AtomicUsize::new(3),
            ..Default::default()
        };
        let f = fixture(stub, RetryPolicy::immediate());
        let report = f.orchestrator.run(ctx("X1")).await;

        assert_eq!(report.attempts, 4);
        assert_eq!(f.data_source.submit_calls.load(Ordering::SeqCst), 4);
        assert!(report.is_written());
        assert_eq!(f.orchestrator.status(), ProcessStatus::Success);
    }

    #[tokio::test]
    async fn test_predicate_can_abandon() {
        let stub = StubDataSource {
            submit_failures: AtomicUsize::new(10),
            ..Default::default()
        };
        let policy = RetryPolicy::immediate().with_predicate(|attempts, _| attempts < 2);
        let f = fixture(stub, policy);
        let report = f.orchestrator.run(ctx("X1")).await;

        assert_eq!(report.attempts, 2);
        assert!(matches!(
            report.outcome,
            ReportOutcome::Failed {
                stage: FailedStage::Submit,
                ..
            }
        ));
        assert!(f.authority.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_note_decides_status() {
        let stub = StubDataSource {
            view: FormMarkup {
                success: true,
                html: Some(r#"<textarea name="description">(1P) Stempel tidak ada</textarea>"#.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let f = fixture(stub, RetryPolicy::immediate());
        let report = f.orchestrator.run(ctx("X1")).await;

        let saved = f.authority.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].status, ApprovalStatus::Rejected);
        assert_eq!(saved[0].note, "(1P) Stempel tidak ada");
        // 登录不可用时沿用旧令牌
        assert_eq!(saved[0].session_token, "dac-old");
        assert_eq!(report.note, "(1P) Stempel tidak ada");
    }

    #[tokio::test]
    async fn test_missing_extracted_id_skips_write() {
        let f = fixture(StubDataSource::default(), RetryPolicy::immediate());
        let report = f.orchestrator.run(ctx("")).await;
        assert!(matches!(report.outcome, ReportOutcome::Skipped { .. }));
        assert!(f.authority.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_review_confirm_rederives_status() {
        let stub = StubDataSource {
            view: FormMarkup {
                success: true,
                html: Some(r#"<textarea name="description">Foto buram</textarea>"#.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let f = fixture(stub, RetryPolicy::immediate());
        let pending = f.orchestrator.run_until_review(ctx("X1")).await.unwrap();
        assert_eq!(pending.note, "Foto buram");
        assert_eq!(pending.trail.last(), Some(&SubmissionState::AwaitingManualReview));

        let report = f
            .orchestrator
            .finish_review(pending, ReviewDecision::Confirm(String::new()))
            .await;
        assert!(report.is_written());
        assert_eq!(f.authority.saved.lock().unwrap()[0].status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn test_trail_follows_state_order() {
        let f = fixture(StubDataSource::default(), RetryPolicy::immediate());
        let report = f.orchestrator.run(ctx("X1")).await;
        assert_eq!(
            report.trail,
            vec![
                SubmissionState::Idle,
                SubmissionState::Submitting(1),
                SubmissionState::SubmitSucceeded,
                SubmissionState::FetchingRejectionNote,
                SubmissionState::RefreshingCredential,
                SubmissionState::WritingApproval,
                SubmissionState::Done,
            ]
        );
    }
}
