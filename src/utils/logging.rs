/// 日志工具模块
///
/// 提供日志初始化以及格式化输出的辅助函数
use std::fs;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅器
///
/// `RUST_LOG` 优先；否则按 `verbose` 选择 debug 或 info 级别。
/// 重复初始化（例如测试中）会被静默忽略。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n核验日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(relay_base_url: &str, manual_note: bool) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 交付记录核验模式");
    info!("🔌 中转服务: {}", relay_base_url);
    info!("📝 人工备注默认: {}", if manual_note { "开启" } else { "关闭" });
    info!("{}", "=".repeat(60));
}

/// 记录队列加载信息
pub fn log_queue_loaded(total: usize, from_snapshot: bool) {
    let source = if from_snapshot { "本地快照" } else { "数据源" };
    info!("✓ 从{}加载了 {} 个待核验任务", source, total);
}

/// 打印会话统计信息
pub fn print_final_stats(dispatched: usize, written: usize, failed: usize, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 会话统计");
    info!(
        "结束时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📤 已提交: {}", dispatched);
    info!("✅ 审批写入成功: {}", written);
    info!("❌ 审批写入失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("Tidak ada", 20), "Tidak ada");
        assert_eq!(truncate_text("核验日志测试", 2), "核验...");
    }
}
