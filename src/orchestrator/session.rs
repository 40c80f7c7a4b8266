//! 核验会话 - 编排层
//!
//! ## 职责
//!
//! 把队列、表单、详情服务和提交编排器串起来：
//!
//! 1. **启动**：迁移旧键，并发刷新两个系统的会话
//! 2. **加载队列**：抓取（或读取本地快照）→ 过滤 → 加载表单选项
//! 3. **切换任务**：重置表单，选中详情，后台预取下一条
//! 4. **提交**：快速通道立即前进；人工备注模式等待确认后前进
//! 5. **回收报告**：统计结果，保留失败的审批写入供重试

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::clients::{AuthorityApi, DataSourceApi, LoginApi};
use crate::config::Config;
use crate::error::{AppResult, BusinessError};
use crate::infrastructure::{KeyValueStore, MarkupExtractor, MediaPreloader};
use crate::models::{ApprovalPayload, Credentials, DetailPayload, DetailView, FieldId, SystemKind, Task};
use crate::services::{CredentialStore, DetailService, FormLoader, NoteExtractor, PrefetchCache};
use crate::utils::logging;
use crate::workflow::{
    EvaluationForm, FailedStage, PendingReview, ProcessStatus, QueueFilter, ReportOutcome, RetryPolicy,
    ReviewDecision, SubmissionContext, SubmissionOrchestrator, SubmissionReport, TaskQueue,
};

const SNAPSHOT_KEY: &str = "cached_scraped_data";
const SNAPSHOT_TIMESTAMP_KEY: &str = "cached_data_timestamp";

/// 会话依赖的外部协作者
pub struct Collaborators {
    pub data_source: Arc<dyn DataSourceApi>,
    pub authority: Arc<dyn AuthorityApi>,
    pub login: Arc<dyn LoginApi>,
    pub store: Arc<dyn KeyValueStore>,
    pub extractor: Arc<dyn MarkupExtractor>,
    pub preloader: Option<Arc<dyn MediaPreloader>>,
}

/// 启动时两个系统的登录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapStatus {
    pub authority: bool,
    pub data_source: bool,
}

/// 一次提交请求的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 正在提交或冷却中，忽略本次请求
    Ignored,
    /// 已交给后台，队列已前进
    Dispatched,
    /// 等待人工确认备注
    AwaitingReview { draft: String },
}

/// 会话统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub dispatched: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SessionStats {
    fn record(&mut self, report: &SubmissionReport) {
        match report.outcome {
            ReportOutcome::Written => self.written += 1,
            ReportOutcome::Skipped { .. } => self.skipped += 1,
            ReportOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// 核验会话
pub struct VerifierSession {
    config: Config,
    data_source: Arc<dyn DataSourceApi>,
    login: Arc<dyn LoginApi>,
    store: Arc<dyn KeyValueStore>,
    credentials: CredentialStore,
    details: DetailService,
    forms: FormLoader,
    orchestrator: SubmissionOrchestrator,
    queue: TaskQueue,
    form: EvaluationForm,
    current_detail: Option<DetailPayload>,
    detail_error: Option<String>,
    manual_note: bool,
    busy: Arc<AtomicBool>,
    pending_review: Option<PendingReview>,
    failed_approvals: VecDeque<ApprovalPayload>,
    reports_tx: mpsc::UnboundedSender<SubmissionReport>,
    reports_rx: mpsc::UnboundedReceiver<SubmissionReport>,
    prefetches: Vec<JoinHandle<bool>>,
    stats: SessionStats,
}

impl VerifierSession {
    pub fn new(config: Config, deps: Collaborators) -> Self {
        let credentials = CredentialStore::new(Arc::clone(&deps.store));
        let mut details = DetailService::new(deps.authority.clone(), credentials.clone(), PrefetchCache::new());
        if let Some(preloader) = deps.preloader {
            details = details.with_preloader(preloader);
        }
        let forms = FormLoader::new(deps.data_source.clone(), deps.extractor.clone());
        let notes = Arc::new(NoteExtractor::new(deps.data_source.clone(), deps.extractor));
        let orchestrator = SubmissionOrchestrator::new(
            deps.data_source.clone(),
            deps.authority,
            deps.login.clone(),
            credentials.clone(),
            notes,
            RetryPolicy::unbounded(config.retry_delay()),
        );
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let manual_note = config.manual_note_default;

        Self {
            config,
            data_source: deps.data_source,
            login: deps.login,
            store: deps.store,
            credentials,
            details,
            forms,
            orchestrator,
            queue: TaskQueue::new(),
            form: EvaluationForm::default(),
            current_detail: None,
            detail_error: None,
            manual_note,
            busy: Arc::new(AtomicBool::new(false)),
            pending_review: None,
            failed_approvals: VecDeque::new(),
            reports_tx,
            reports_rx,
            prefetches: Vec::new(),
            stats: SessionStats::default(),
        }
    }

    /// 替换提交重试策略
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.orchestrator = self.orchestrator.with_policy(policy);
        self
    }

    // ========== 启动与登录 ==========

    /// 迁移旧键并并发刷新两个系统的会话
    pub async fn bootstrap(&self) -> AppResult<BootstrapStatus> {
        self.credentials.migrate_legacy()?;

        let (authority, data_source) = futures::join!(
            self.credentials.bootstrap(SystemKind::Authority, self.login.as_ref()),
            self.credentials.bootstrap(SystemKind::DataSource, self.login.as_ref()),
        );
        info!(
            "🔑 会话状态: 权威系统={} 数据源={}",
            if authority { "已登录" } else { "未登录" },
            if data_source { "已登录" } else { "未登录" }
        );
        Ok(BootstrapStatus {
            authority,
            data_source,
        })
    }

    pub async fn login(&self, system: SystemKind, credentials: Credentials) -> AppResult<()> {
        self.credentials
            .login(system, credentials, self.login.as_ref())
            .await
            .map(|_| ())
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    // ========== 队列 ==========

    /// 重新加载队列、表单选项并激活第一条任务
    ///
    /// 有等待人工审核的提交时拒绝重新加载，确认后游标才能前进
    pub async fn reload_queue(&mut self) -> AppResult<usize> {
        if self.pending_review.is_some() {
            return Err(BusinessError::ReviewPending.into());
        }

        let restored = if self.config.prefer_cached_queue {
            self.load_snapshot()
        } else {
            None
        };

        let from_snapshot = restored.is_some();
        let total = match restored {
            Some(tasks) => self.queue.restore(tasks),
            None => {
                let session = self.credentials.require_session(SystemKind::DataSource)?;
                let raw = self.data_source.scrape(&session).await?;
                self.queue.load(raw, &QueueFilter::from_config(&self.config))
            }
        };
        logging::log_queue_loaded(total, from_snapshot);

        if let Err(e) = self.load_form_options().await {
            warn!("⚠️ 表单选项加载失败，使用默认值: {}", e);
        }
        self.activate_current().await;
        Ok(total)
    }

    /// 用第一条任务的表单定义加载字段选项
    pub async fn load_form_options(&mut self) -> AppResult<()> {
        let Some(first) = self.queue.tasks().first() else {
            return Ok(());
        };
        if first.action_id.is_empty() {
            warn!("⚠️ 第一条任务没有 action_id，跳过表单选项加载");
            return Ok(());
        }
        let session = self.credentials.require_session(SystemKind::DataSource)?;
        let options = self.forms.load(&first.action_id, &session).await?;
        self.form.set_options(options);
        Ok(())
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.queue.current()
    }

    // ========== 当前任务 ==========

    /// 切换到当前游标处的任务
    ///
    /// 返回是否拿到了详情；拿不到时视图为空并记录错误
    pub async fn activate_current(&mut self) -> bool {
        self.current_detail = None;
        self.detail_error = None;
        self.manual_note = self.config.manual_note_default;

        let Some(task) = self.queue.current().cloned() else {
            self.form.reset("");
            info!("🎉 队列已处理完");
            return false;
        };
        self.form.reset(&task.serial_number);
        info!("{} ▶ 开始核验 (剩余 {} 条)", task, self.queue.pending_count());

        if let Some(next) = self.queue.peek_next().cloned() {
            self.spawn_prefetch(next);
        }

        match self.details.select(&task).await {
            Ok(detail) => {
                self.adopt_detail(detail);
                true
            }
            Err(e) => {
                error!("{} ❌ 详情获取失败: {}", task, e);
                self.detail_error = Some(e.to_string());
                false
            }
        }
    }

    fn adopt_detail(&mut self, detail: DetailPayload) {
        if let Some(order_id) = detail.delivery_record.order_id.as_deref().filter(|s| !s.is_empty()) {
            self.form.set_serial_override(order_id);
        }
        self.current_detail = Some(detail);
    }

    fn spawn_prefetch(&mut self, next: Task) {
        self.prefetches.retain(|h| !h.is_finished());
        if self.details.cache().contains(&next.cache_key()) {
            return;
        }
        let details = self.details.clone();
        debug!("{} 后台预取", next);
        self.prefetches
            .push(tokio::spawn(async move { details.prefetch(&next).await }));
    }

    /// 等待所有后台预取结束，返回成功数量
    pub async fn settle_prefetch(&mut self) -> usize {
        let mut ok = 0;
        for handle in self.prefetches.drain(..) {
            if let Ok(true) = handle.await {
                ok += 1;
            }
        }
        ok
    }

    /// 绕过缓存重新获取当前任务的详情
    pub async fn refetch(&mut self) -> AppResult<()> {
        let task = self.queue.current().cloned().ok_or(BusinessError::NoCurrentTask)?;
        match self.details.refetch(&task).await {
            Ok(detail) => {
                self.detail_error = None;
                self.adopt_detail(detail);
                Ok(())
            }
            Err(e) => {
                self.detail_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn current_detail(&self) -> Option<&DetailPayload> {
        self.current_detail.as_ref()
    }

    pub fn detail_error(&self) -> Option<&str> {
        self.detail_error.as_deref()
    }

    pub fn current_view(&self, today: NaiveDate) -> Option<DetailView> {
        self.current_detail.as_ref().map(|d| d.to_view(today))
    }

    pub fn prefetch_cache(&self) -> &PrefetchCache {
        self.details.cache()
    }

    // ========== 表单 ==========

    pub fn form(&self) -> &EvaluationForm {
        &self.form
    }

    pub fn set_field(&mut self, field: FieldId, value: &str) {
        self.form.set(field, value);
    }

    pub fn set_serial_override(&mut self, value: &str) {
        self.form.set_serial_override(value);
    }

    pub fn manual_note(&self) -> bool {
        self.manual_note
    }

    pub fn toggle_manual_note(&mut self) -> bool {
        self.manual_note = !self.manual_note;
        self.manual_note
    }

    // ========== 提交 ==========

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// 提交当前任务
    pub async fn submit(&mut self) -> AppResult<SubmitOutcome> {
        if self.pending_review.is_some() || self.busy.swap(true, Ordering::SeqCst) {
            debug!("提交进行中，忽略本次请求");
            return Ok(SubmitOutcome::Ignored);
        }

        let ctx = match self.build_context() {
            Ok(ctx) => ctx,
            Err(e) => {
                self.busy.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        info!(
            "{} 📤 提交 ({})",
            ctx.task,
            if self.form.is_default() { "TERIMA" } else { "TOLAK" }
        );

        if self.manual_note {
            return match self.orchestrator.run_until_review(ctx).await {
                Ok(pending) => {
                    self.stats.dispatched += 1;
                    let draft = pending.note.clone();
                    self.pending_review = Some(pending);
                    Ok(SubmitOutcome::AwaitingReview { draft })
                }
                Err(e) => {
                    self.busy.store(false, Ordering::SeqCst);
                    Err(e)
                }
            };
        }

        self.orchestrator.spawn(ctx, self.reports_tx.clone());
        self.stats.dispatched += 1;

        let cooldown = self.config.fast_path_cooldown();
        if cooldown.is_zero() {
            self.busy.store(false, Ordering::SeqCst);
        } else {
            let busy = Arc::clone(&self.busy);
            tokio::spawn(async move {
                sleep(cooldown).await;
                busy.store(false, Ordering::SeqCst);
            });
        }

        self.queue.advance();
        self.activate_current().await;
        Ok(SubmitOutcome::Dispatched)
    }

    fn build_context(&self) -> AppResult<SubmissionContext> {
        let task = self.queue.current().cloned().ok_or(BusinessError::NoCurrentTask)?;
        let detail = self
            .current_detail
            .as_ref()
            .ok_or_else(|| BusinessError::DetailNotLoaded {
                npsn: task.npsn.clone(),
            })?;

        let verification_date = detail.verification_date(Local::now().date_naive());
        Ok(SubmissionContext {
            payload: self.form.build_submission(&task, verification_date),
            extracted_id: detail.extracted_id.clone(),
            bapp_id: detail.summary.bapp_id.clone(),
            verification_date,
            task,
        })
    }

    pub fn pending_review(&self) -> Option<&PendingReview> {
        self.pending_review.as_ref()
    }

    /// 使用修改后的备注写入审批并前进
    pub async fn confirm_review(&mut self, note: String) -> AppResult<SubmissionReport> {
        self.resolve_review(ReviewDecision::Confirm(note)).await
    }

    /// 保留原备注写入审批并前进
    pub async fn keep_review(&mut self) -> AppResult<SubmissionReport> {
        self.resolve_review(ReviewDecision::Keep).await
    }

    async fn resolve_review(&mut self, decision: ReviewDecision) -> AppResult<SubmissionReport> {
        let pending = self.pending_review.take().ok_or(BusinessError::ReviewNotPending)?;
        let report = self.orchestrator.finish_review(pending, decision).await;
        self.absorb(&report);
        self.busy.store(false, Ordering::SeqCst);

        self.queue.advance();
        self.activate_current().await;
        Ok(report)
    }

    /// 不提交，直接前进
    pub async fn skip(&mut self) -> bool {
        if self.pending_review.is_some() {
            warn!("⚠️ 有等待确认的备注，先确认或保留后再跳过");
            return false;
        }
        if self.queue.is_exhausted() {
            return false;
        }
        if let Some(task) = self.queue.current() {
            info!("{} ⏭ 跳过", task);
        }
        self.queue.advance();
        self.activate_current().await;
        true
    }

    // ========== 报告 ==========

    /// 收取已完成的后台报告（不等待）
    pub fn poll_reports(&mut self) -> Vec<SubmissionReport> {
        let mut reports = Vec::new();
        while let Ok(report) = self.reports_rx.try_recv() {
            self.absorb(&report);
            reports.push(report);
        }
        reports
    }

    /// 等待下一份后台报告
    pub async fn next_report(&mut self) -> Option<SubmissionReport> {
        let report = self.reports_rx.recv().await?;
        self.absorb(&report);
        Some(report)
    }

    fn absorb(&mut self, report: &SubmissionReport) {
        self.stats.record(report);
        if let ReportOutcome::Failed {
            stage: FailedStage::SaveApproval,
            ..
        } = report.outcome
        {
            if let Some(payload) = report.approval.clone() {
                self.failed_approvals.push_back(payload);
            }
        }
    }

    /// 按失败顺序重试最早一条失败的审批写入
    pub async fn retry_failed_approval(&mut self) -> AppResult<()> {
        let payload = self
            .failed_approvals
            .pop_front()
            .ok_or(BusinessError::NothingToRetry)?;
        match self.orchestrator.retry_approval(&payload).await {
            Ok(()) => {
                self.stats.failed = self.stats.failed.saturating_sub(1);
                self.stats.written += 1;
                Ok(())
            }
            Err(e) => {
                self.failed_approvals.push_front(payload);
                Err(e)
            }
        }
    }

    /// 等待重试的审批写入数量
    pub fn failed_approval_count(&self) -> usize {
        self.failed_approvals.len()
    }

    pub fn status(&self) -> ProcessStatus {
        self.orchestrator.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ProcessStatus> {
        self.orchestrator.subscribe()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    // ========== 本地快照 ==========

    /// 保存当前队列到本地存储
    pub fn save_snapshot(&self) -> AppResult<usize> {
        let tasks = self.queue.tasks();
        if tasks.is_empty() {
            return Ok(0);
        }
        self.store.set(SNAPSHOT_KEY, serde_json::to_value(tasks)?)?;
        self.store
            .set(SNAPSHOT_TIMESTAMP_KEY, JsonValue::String(Utc::now().to_rfc3339()))?;
        info!("💾 已保存 {} 条任务到本地快照", tasks.len());
        Ok(tasks.len())
    }

    pub fn clear_snapshot(&self) -> AppResult<()> {
        self.store.remove(SNAPSHOT_KEY)?;
        self.store.remove(SNAPSHOT_TIMESTAMP_KEY)?;
        info!("🗑 本地快照已清除");
        Ok(())
    }

    fn load_snapshot(&self) -> Option<Vec<Task>> {
        let value = self.store.get(SNAPSHOT_KEY)?;
        match serde_json::from_value::<Vec<Task>>(value) {
            Ok(tasks) if !tasks.is_empty() => {
                if let Some(JsonValue::String(ts)) = self.store.get(SNAPSHOT_TIMESTAMP_KEY) {
                    info!("📦 使用本地快照 (保存于 {})", ts);
                }
                Some(tasks)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("⚠️ 本地快照无法解析，改为抓取: {}", e);
                None
            }
        }
    }
}
