//! 任务队列 - 流程层
//!
//! 持有过滤后的任务列表和一个只增不减的游标

use tracing::debug;

use crate::config::Config;
use crate::models::Task;

/// 抓取结果的过滤与截取规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFilter {
    pub kind: String,
    pub status: String,
    /// 为 true 时保持抓取顺序（最新在前）
    pub reverse: bool,
    pub skip_leading: usize,
    pub window: usize,
}

impl Default for QueueFilter {
    fn default() -> Self {
        Self {
            kind: "Zyrex".to_string(),
            status: "PROSES".to_string(),
            reverse: false,
            skip_leading: 1,
            window: 50,
        }
    }
}

impl QueueFilter {
    pub fn from_config(config: &Config) -> Self {
        Self {
            kind: config.task_kind.clone(),
            status: config.task_status.clone(),
            reverse: config.reverse_queue,
            skip_leading: config.skip_leading,
            window: config.window_size,
        }
    }

    /// 过滤 → 排序 → 截取
    pub fn apply(&self, raw: Vec<Task>) -> Vec<Task> {
        let mut eligible: Vec<Task> = raw
            .into_iter()
            .filter(|t| t.kind == self.kind && t.status == self.status)
            .collect();

        // 抓取结果最新在前，默认翻转为最早在前
        if !self.reverse {
            eligible.reverse();
        }

        eligible
            .into_iter()
            .skip(self.skip_leading)
            .take(self.window)
            .collect()
    }
}

/// 任务队列
///
/// 不变量：`0 <= cursor <= tasks.len()`，游标只会前进，重新加载才会归零
#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    tasks: Vec<Task>,
    cursor: usize,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用原始抓取结果重建队列
    pub fn load(&mut self, raw: Vec<Task>, filter: &QueueFilter) -> usize {
        let total = raw.len();
        self.tasks = filter.apply(raw);
        self.cursor = 0;
        debug!("队列重建: 原始 {} 条，保留 {} 条", total, self.tasks.len());
        self.tasks.len()
    }

    /// 直接用已排好序的任务重建（本地快照）
    pub fn restore(&mut self, tasks: Vec<Task>) -> usize {
        self.tasks = tasks;
        self.cursor = 0;
        self.tasks.len()
    }

    pub fn current(&self) -> Option<&Task> {
        self.tasks.get(self.cursor)
    }

    pub fn peek_next(&self) -> Option<&Task> {
        self.tasks.get(self.cursor + 1)
    }

    /// 游标前进一格，已到末尾时不动
    pub fn advance(&mut self) -> Option<&Task> {
        if self.cursor < self.tasks.len() {
            self.cursor += 1;
        }
        self.current()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.tasks.len()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}
