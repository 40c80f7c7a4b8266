//! 操作员控制台 - 编排层
//!
//! ## 职责
//!
//! 应用入口：创建 HTTP 中转客户端和本地存储，启动会话，
//! 然后逐行读取标准输入的命令驱动核验会话。
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一创建 `RelayClient` 和 `JsonFileStore` 的地方
//! - **薄前端**：不做业务判断，只把命令翻译成会话调用并显示结果

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::clients::{AuthorityClient, DataSourceClient, LoginClient};
use crate::config::Config;
use crate::infrastructure::{JsonFileStore, RegexExtractor, RelayClient};
use crate::models::{Credentials, FieldId, SystemKind};
use crate::orchestrator::session::{Collaborators, SubmitOutcome, VerifierSession};
use crate::utils::logging;
use crate::workflow::{ProcessStatus, ReportOutcome, SubmissionReport};

/// 控制台命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show,
    Set(FieldId, String),
    Serial(String),
    Submit,
    Skip,
    Refetch,
    ToggleManual,
    Confirm(String),
    Keep,
    Login(SystemKind, String, String),
    Reload,
    Save,
    Clear,
    Status,
    Retry,
    Help,
    Quit,
}

impl Command {
    /// 解析一行输入
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match head.to_ascii_lowercase().as_str() {
            "" | "show" | "s" => Ok(Command::Show),
            "set" => {
                let (field, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "用法: set <字段> <取值>".to_string())?;
                let id = FieldId::parse(field).ok_or_else(|| format!("未知的评估字段: {}", field))?;
                Ok(Command::Set(id, value.trim().to_string()))
            }
            "sn" => {
                if rest.is_empty() {
                    Err("用法: sn <序列号>".to_string())
                } else {
                    Ok(Command::Serial(rest.to_string()))
                }
            }
            "submit" | "ok" => Ok(Command::Submit),
            "skip" | "n" => Ok(Command::Skip),
            "refetch" | "r" => Ok(Command::Refetch),
            "manual" | "m" => Ok(Command::ToggleManual),
            "confirm" => Ok(Command::Confirm(rest.to_string())),
            "keep" => Ok(Command::Keep),
            "login" => {
                let parts: Vec<&str> = rest.split_whitespace().collect();
                let [system, username, password] = parts.as_slice() else {
                    return Err("用法: login <dac|datasource> <用户名> <密码>".to_string());
                };
                let system = match system.to_ascii_lowercase().as_str() {
                    "dac" => SystemKind::Authority,
                    "datasource" | "ds" => SystemKind::DataSource,
                    other => return Err(format!("未知系统: {}", other)),
                };
                Ok(Command::Login(system, username.to_string(), password.to_string()))
            }
            "reload" => Ok(Command::Reload),
            "save" => Ok(Command::Save),
            "clear" => Ok(Command::Clear),
            "status" => Ok(Command::Status),
            "retry" => Ok(Command::Retry),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(format!("未知命令: {}（输入 help 查看）", other)),
        }
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    session: VerifierSession,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;

        logging::log_startup(&config.relay_base_url, config.manual_note_default);

        let relay = RelayClient::new(config.relay_base_url.as_str());
        let store = JsonFileStore::open(&config.store_path).context("打开本地存储失败")?;

        let deps = Collaborators {
            data_source: Arc::new(DataSourceClient::new(relay.clone())),
            authority: Arc::new(AuthorityClient::new(relay.clone())),
            login: Arc::new(LoginClient::new(relay.clone())),
            store: Arc::new(store),
            extractor: Arc::new(RegexExtractor::new()),
            preloader: Some(Arc::new(relay)),
        };
        let session = VerifierSession::new(config.clone(), deps);

        let status = session.bootstrap().await.context("会话初始化失败")?;
        if !status.data_source {
            warn!("⚠️ 数据源未登录，请使用: login datasource <用户名> <密码>");
        }
        if !status.authority {
            warn!("⚠️ 权威系统未登录，请使用: login dac <用户名> <密码>");
        }

        Ok(Self { config, session })
    }

    /// 运行应用主逻辑
    pub async fn run(mut self) -> Result<()> {
        if self.session.credentials().session_token(SystemKind::DataSource).is_some() {
            if let Err(e) = self.session.reload_queue().await {
                error!("❌ 队列加载失败: {}", e);
            }
        }
        self.show();
        print_help();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("读取输入失败")? {
            self.report_finished();

            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(msg) => {
                    warn!("{}", msg);
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }
            if let Err(e) = self.execute(command).await {
                error!("❌ {}", e);
            }
        }

        self.report_finished();
        let stats = self.session.stats();
        if self.session.is_busy() || stats.dispatched > stats.written + stats.skipped + stats.failed {
            warn!("⚠️ 仍有提交在后台进行，退出后将不再重试");
        }
        logging::print_final_stats(stats.dispatched, stats.written, stats.failed, &self.config.output_log_file);
        Ok(())
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Show => self.show(),
            Command::Set(field, value) => {
                self.session.set_field(field, &value);
                self.show_form();
            }
            Command::Serial(value) => {
                self.session.set_serial_override(&value);
                info!("SN BAPP: {}", value);
            }
            Command::Submit => match self.session.submit().await? {
                SubmitOutcome::Ignored => info!("⏳ 提交进行中，请稍候"),
                SubmitOutcome::Dispatched => self.show(),
                SubmitOutcome::AwaitingReview { draft } => {
                    info!("📝 备注草稿: {}", if draft.is_empty() { "(空)" } else { draft.as_str() });
                    info!("输入 confirm <备注> 使用新备注，或 keep 保留草稿");
                }
            },
            Command::Skip => {
                if self.session.skip().await {
                    self.show();
                }
            }
            Command::Refetch => {
                self.session.refetch().await?;
                self.show();
            }
            Command::ToggleManual => {
                let on = self.session.toggle_manual_note();
                info!("📝 人工备注: {}", if on { "开启" } else { "关闭" });
            }
            Command::Confirm(note) => {
                let report = self.session.confirm_review(note).await?;
                log_report(&report);
                self.show();
            }
            Command::Keep => {
                let report = self.session.keep_review().await?;
                log_report(&report);
                self.show();
            }
            Command::Login(system, username, password) => {
                self.session
                    .login(system, Credentials::new(username, password))
                    .await?;
                if system == SystemKind::DataSource && self.session.queue().is_empty() {
                    self.session.reload_queue().await?;
                    self.show();
                }
            }
            Command::Reload => {
                self.session.reload_queue().await?;
                self.show();
            }
            Command::Save => {
                let saved = self.session.save_snapshot()?;
                if saved == 0 {
                    warn!("⚠️ 没有数据可以保存");
                }
            }
            Command::Clear => self.session.clear_snapshot()?,
            Command::Status => self.show_status(),
            Command::Retry => {
                self.session.retry_failed_approval().await?;
                self.show_status();
            }
            Command::Help => print_help(),
            Command::Quit => {}
        }
        Ok(())
    }

    /// 收取后台报告并记录
    fn report_finished(&mut self) {
        for report in self.session.poll_reports() {
            log_report(&report);
        }
    }

    // ========== 显示 ==========

    fn show(&self) {
        let queue = self.session.queue();
        let Some(task) = self.session.current_task() else {
            info!("🎉 没有待核验的任务");
            return;
        };

        info!("\n{}", "=".repeat(60));
        info!("{} ({}/{})", task, queue.cursor() + 1, queue.len());
        match self.session.current_view(Local::now().date_naive()) {
            Some(view) => {
                info!("🏫 {} | {} | {}", view.school.name, view.school.kabupaten, view.school.provinsi);
                info!("📍 {}", view.school.address);
                info!("🔢 SN: {} | 资源号: {} | 核验日期: {}", task.serial_number, view.resi, view.verification_date);
                info!("🖼 图片 {} 张", view.images.len());
                for img in &view.images {
                    info!("   {}: {}", img.title, img.src);
                }
                for log in &view.history {
                    info!("   [{}] {} {}: {}", log.date, log.status, log.user, logging::truncate_text(&log.note, 60));
                }
            }
            None => {
                let reason = self.session.detail_error().unwrap_or("尚未加载");
                warn!("⚠️ 没有详情: {}", reason);
            }
        }
        self.show_form();
    }

    fn show_form(&self) {
        let form = self.session.form();
        for (id, value) in form.values() {
            info!("  {} {:<24} {}", id, id.label(), value);
        }
        info!("  SN BAPP: {}", form.serial_override());
        let reason = form.reason();
        if !reason.is_empty() {
            info!("  驳回理由:\n{}", reason);
        }
        info!(
            "  ➜ {} | 人工备注: {} | 剩余 {} 条",
            if form.is_default() { "TERIMA" } else { "TOLAK" },
            if self.session.manual_note() { "开启" } else { "关闭" },
            self.session.queue().pending_count()
        );
    }

    fn show_status(&self) {
        match self.session.status() {
            ProcessStatus::Idle => info!("⚪ 空闲"),
            ProcessStatus::Processing => info!("🟡 处理中"),
            ProcessStatus::Success => info!("🟢 完成"),
            ProcessStatus::Error { stage, message } => {
                error!("🔴 失败 ({}): {}，输入 retry 重试", stage, message)
            }
        }
        let stats = self.session.stats();
        info!(
            "📊 已提交 {} | 写入 {} | 跳过 {} | 失败 {}",
            stats.dispatched, stats.written, stats.skipped, stats.failed
        );
        let pending = self.session.failed_approval_count();
        if pending > 0 {
            warn!("⚠️ {} 条审批写入待重试，输入 retry 逐条重试", pending);
        }
    }
}

fn log_report(report: &SubmissionReport) {
    match &report.outcome {
        ReportOutcome::Written => info!(
            "[任务 {}] ✅ 完成: 提交 {} 次，审批 {}",
            report.npsn,
            report.attempts,
            report
                .approval
                .as_ref()
                .map(|a| a.status.to_string())
                .unwrap_or_default()
        ),
        ReportOutcome::Skipped { reason } => {
            warn!("[任务 {}] ⚠️ 已提交，未写入审批: {}", report.npsn, reason)
        }
        ReportOutcome::Failed { stage, message } => {
            error!("[任务 {}] ❌ {} 失败: {}", report.npsn, stage, message)
        }
    }
}

fn print_help() {
    info!("命令: show | set <字段> <取值> | sn <序列号> | submit | skip | refetch | manual");
    info!("      confirm <备注> | keep | login <dac|datasource> <用户名> <密码>");
    info!("      reload | save | clear | status | retry | help | quit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_keeps_multiword_value() {
        assert_eq!(
            Command::parse("set q Tidak terlihat jelas"),
            Ok(Command::Set(FieldId::Q, "Tidak terlihat jelas".to_string()))
        );
    }

    #[test]
    fn test_parse_login() {
        assert_eq!(
            Command::parse("login dac verif rahasia"),
            Ok(Command::Login(SystemKind::Authority, "verif".to_string(), "rahasia".to_string()))
        );
        assert!(Command::parse("login dac verif").is_err());
        assert!(Command::parse("login other a b").is_err());
    }

    #[test]
    fn test_parse_confirm_allows_empty_note() {
        assert_eq!(Command::parse("confirm"), Ok(Command::Confirm(String::new())));
        assert_eq!(
            Command::parse("confirm (1P) Stempel tidak ada"),
            Ok(Command::Confirm("(1P) Stempel tidak ada".to_string()))
        );
    }

    #[test]
    fn test_parse_shortcuts_and_errors() {
        assert_eq!(Command::parse(""), Ok(Command::Show));
        assert_eq!(Command::parse("OK"), Ok(Command::Submit));
        assert_eq!(Command::parse("q"), Ok(Command::Quit));
        assert!(Command::parse("set Z Ada").is_err());
        assert!(Command::parse("dance").is_err());
    }
}
