// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 运行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// 正常完成
    Completed,
    /// 被用户停止
    Stopped,
    /// 未停止但没有数据
    NoData,
}

impl RunOutcome {
    /// 根据令牌状态和记录数推导运行结果
    pub fn decide(stopped: bool, record_count: usize) -> Self {
        match (stopped, record_count) {
            (true, _) => RunOutcome::Stopped,
            (false, 0) => RunOutcome::NoData,
            (false, _) => RunOutcome::Completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Stopped => "stopped",
            RunOutcome::NoData => "no_data",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 持久化路径选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistTarget {
    /// 写入主输出路径
    Primary,
    /// 写入单独的 partial 路径，从不覆盖主路径
    Partial,
    /// 不写文件，只记录日志
    Skip,
}

impl PersistTarget {
    pub fn for_outcome(outcome: RunOutcome, record_count: usize) -> Self {
        match (outcome, record_count) {
            (_, 0) => PersistTarget::Skip,
            (RunOutcome::Completed, _) => PersistTarget::Primary,
            (RunOutcome::Stopped, _) => PersistTarget::Partial,
            (RunOutcome::NoData, _) => PersistTarget::Skip,
        }
    }
}

/// 编排器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Draining,
}

/// 单个目标的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    NotStarted,
    Navigating,
    Retrying,
    Extracting,
    Done,
    Abandoned,
}

impl TargetState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TargetState::Done | TargetState::Abandoned)
    }
}

/// 时间参数
#[derive(Debug, Clone)]
pub struct Timings {
    pub navigation_timeout: Duration,
    pub item_wait: Duration,
    pub settle_after_navigation: Duration,
    pub settle_before_scroll: Duration,
    pub settle_after_scroll: Duration,
    pub settle_after_extract: Duration,
    /// 可中断睡眠的单步时长
    pub sleep_step: Duration,
    /// 编排器轮询间隔
    pub poll_interval: Duration,
    /// 停止后的宽限期
    pub grace_period: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(90),
            item_wait: Duration::from_secs(10),
            settle_after_navigation: Duration::from_millis(2000),
            settle_before_scroll: Duration::from_millis(4000),
            settle_after_scroll: Duration::from_millis(3000),
            settle_after_extract: Duration::from_millis(4000),
            sleep_step: Duration::from_millis(500),
            poll_interval: Duration::from_millis(200),
            grace_period: Duration::from_secs(5),
        }
    }
}

/// 一次运行的不可变配置
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub time_window_minutes: u32,
    pub max_items_per_target: usize,
    pub worker_count: usize,
    pub headless: bool,
    pub timings: Timings,
    pub max_navigation_retries: u32,
    pub scroll_delta_px: i64,
    pub screenshot_dir: PathBuf,
    pub table_dir: PathBuf,
    pub file_prefix: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            time_window_minutes: 60,
            max_items_per_target: 5,
            worker_count: 3,
            headless: true,
            timings: Timings::default(),
            max_navigation_retries: 2,
            scroll_delta_px: 1500,
            screenshot_dir: PathBuf::from("screenshots"),
            table_dir: PathBuf::from("."),
            file_prefix: "captured_items".to_string(),
        }
    }
}

impl RunConfig {
    /// 校验数值范围
    pub fn validate(&self) -> Result<(), String> {
        use crate::config::settings::{MAX_TIME_WINDOW_MIN, MIN_TIME_WINDOW_MIN};

        if !(MIN_TIME_WINDOW_MIN..=MAX_TIME_WINDOW_MIN).contains(&self.time_window_minutes) {
            return Err(format!(
                "Time window must be a number between {} and {} minutes",
                MIN_TIME_WINDOW_MIN, MAX_TIME_WINDOW_MIN
            ));
        }
        if self.max_items_per_target == 0 {
            return Err("max_items_per_target must be at least 1".to_string());
        }
        if self.worker_count == 0 {
            return Err("worker_count must be at least 1".to_string());
        }
        Ok(())
    }

    /// 本次运行的截图目录 `screenshot_dir/{run_label}`
    pub fn run_dir(&self, run_label: &str) -> PathBuf {
        self.screenshot_dir.join(run_label)
    }

    /// 主输出表格路径
    pub fn primary_table_path(&self, run_label: &str) -> PathBuf {
        self.table_dir
            .join(format!("{}_{}.xlsx", self.file_prefix, run_label))
    }

    /// 停止时使用的 partial 表格路径
    pub fn partial_table_path(&self, run_label: &str) -> PathBuf {
        self.table_dir
            .join(format!("{}_{}_partial.xlsx", self.file_prefix, run_label))
    }
}

/// 一次运行的汇总
#[derive(Debug)]
pub struct RunReport {
    pub run_label: String,
    pub outcome: RunOutcome,
    /// 内存中的真实记录数，与文件是否写成功无关
    pub captured: usize,
    /// 成功写入的表格路径
    pub table_path: Option<PathBuf>,
    /// 非致命的持久化错误
    pub persistence_error: Option<String>,
}
