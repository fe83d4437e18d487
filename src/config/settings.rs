// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use chrono::{FixedOffset, Offset, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::domain::models::run::{RunConfig, Timings};
use crate::utils::retry_policy::RetryPolicy;

/// 最小时间窗口（分钟）
pub const MIN_TIME_WINDOW_MIN: u32 = 1;
/// 最大时间窗口（分钟），即24小时
pub const MAX_TIME_WINDOW_MIN: u32 = 1440;

/// 应用程序配置设置
///
/// 包含抓取参数、时间参数、持久化、路径、显示和浏览器配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    /// 抓取配置
    #[validate(nested)]
    pub capture: CaptureSettings,
    /// 时间配置
    #[validate(nested)]
    pub timing: TimingSettings,
    /// 持久化配置
    #[validate(nested)]
    pub persistence: PersistenceSettings,
    /// 路径配置
    pub paths: PathSettings,
    /// 显示配置
    #[validate(nested)]
    pub display: DisplaySettings,
    /// 浏览器配置
    pub browser: BrowserSettings,
}

/// 抓取配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CaptureSettings {
    /// 时间窗口（分钟）
    #[validate(range(min = 1, max = 1440))]
    pub time_window_minutes: u32,
    /// 每个目标最多抓取的条目数
    #[validate(range(min = 1))]
    pub max_items_per_target: u32,
    /// 工作器数量
    #[validate(range(min = 1, max = 16))]
    pub worker_count: u32,
    /// 是否无头模式
    pub headless: bool,
}

/// 时间配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TimingSettings {
    #[validate(range(min = 1))]
    pub navigation_timeout_secs: u64,
    pub item_wait_secs: u64,
    pub settle_after_navigation_ms: u64,
    pub settle_before_scroll_ms: u64,
    pub settle_after_scroll_ms: u64,
    pub settle_after_extract_ms: u64,
    #[validate(range(min = 1))]
    pub sleep_step_ms: u64,
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,
    pub grace_period_secs: u64,
    pub max_navigation_retries: u32,
    pub scroll_delta_px: i64,
}

/// 持久化配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PersistenceSettings {
    /// 最大写入尝试次数
    #[validate(range(min = 1))]
    pub max_attempts: u32,
    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,
    /// 工作表名称
    #[validate(length(min = 1, max = 31))]
    pub sheet_title: String,
    /// 最大列宽
    #[validate(range(min = 1))]
    pub max_column_width: usize,
}

/// 路径配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct PathSettings {
    /// 目标列表文件
    pub targets_file: PathBuf,
    /// 截图根目录
    pub screenshot_dir: PathBuf,
    /// 表格输出目录
    pub table_dir: PathBuf,
    /// 表格文件名前缀
    pub file_prefix: String,
}

/// 显示配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DisplaySettings {
    /// 表格中时间的显示时区（相对UTC的小时数）
    #[validate(range(min = -12, max = 14))]
    pub utc_offset_hours: i32,
}

/// 浏览器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// 自定义Chrome可执行文件
    pub executable: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
    /// 连接已有浏览器而不是启动新进程
    pub remote_debugging_url: Option<String>,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次从默认值、`config/default.toml`、`config/{APP_ENVIRONMENT}.toml`
    /// 和 `SNAPRS__*` 环境变量加载
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("SNAPRS").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// 只使用内置默认值构建配置
    pub fn from_defaults() -> Result<Self, ConfigError> {
        Self::defaults()?.build()?.try_deserialize()
    }

    fn defaults() -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>, ConfigError>
    {
        Config::builder()
            // Capture
            .set_default("capture.time_window_minutes", 60)?
            .set_default("capture.max_items_per_target", 5)?
            .set_default("capture.worker_count", 3)?
            .set_default("capture.headless", true)?
            // Timing
            .set_default("timing.navigation_timeout_secs", 90)?
            .set_default("timing.item_wait_secs", 10)?
            .set_default("timing.settle_after_navigation_ms", 2000)?
            .set_default("timing.settle_before_scroll_ms", 4000)?
            .set_default("timing.settle_after_scroll_ms", 3000)?
            .set_default("timing.settle_after_extract_ms", 4000)?
            .set_default("timing.sleep_step_ms", 500)?
            .set_default("timing.poll_interval_ms", 200)?
            .set_default("timing.grace_period_secs", 5)?
            .set_default("timing.max_navigation_retries", 2)?
            .set_default("timing.scroll_delta_px", 1500)?
            // Persistence
            .set_default("persistence.max_attempts", 3)?
            .set_default("persistence.retry_delay_ms", 500)?
            .set_default("persistence.sheet_title", "Captured Items")?
            .set_default("persistence.max_column_width", 50)?
            // Paths
            .set_default("paths.targets_file", "targets.txt")?
            .set_default("paths.screenshot_dir", "screenshots")?
            .set_default("paths.table_dir", ".")?
            .set_default("paths.file_prefix", "captured_items")?
            // Display
            .set_default("display.utc_offset_hours", 5)?
            // Browser
            .set_default("browser.window_width", 1280)?
            .set_default("browser.window_height", 900)
    }

    /// 表格时间的显示时区
    ///
    /// 偏移量越界时退回UTC；校验通过的配置不会越界
    pub fn display_zone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.display.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }

    /// 持久化闸门的重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.persistence.max_attempts,
            Duration::from_millis(self.persistence.retry_delay_ms),
        )
    }

    /// 转换为一次运行使用的不可变配置
    pub fn run_config(&self) -> RunConfig {
        let t = &self.timing;
        RunConfig {
            time_window_minutes: self.capture.time_window_minutes,
            max_items_per_target: self.capture.max_items_per_target as usize,
            worker_count: self.capture.worker_count as usize,
            headless: self.capture.headless,
            timings: Timings {
                navigation_timeout: Duration::from_secs(t.navigation_timeout_secs),
                item_wait: Duration::from_secs(t.item_wait_secs),
                settle_after_navigation: Duration::from_millis(t.settle_after_navigation_ms),
                settle_before_scroll: Duration::from_millis(t.settle_before_scroll_ms),
                settle_after_scroll: Duration::from_millis(t.settle_after_scroll_ms),
                settle_after_extract: Duration::from_millis(t.settle_after_extract_ms),
                sleep_step: Duration::from_millis(t.sleep_step_ms),
                poll_interval: Duration::from_millis(t.poll_interval_ms),
                grace_period: Duration::from_secs(t.grace_period_secs),
            },
            max_navigation_retries: t.max_navigation_retries,
            scroll_delta_px: t.scroll_delta_px,
            screenshot_dir: self.paths.screenshot_dir.clone(),
            table_dir: self.paths.table_dir.clone(),
            file_prefix: self.paths.file_prefix.clone(),
        }
    }
}
