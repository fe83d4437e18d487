// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod mock_table;

use chrono::FixedOffset;
use snaprs::domain::models::run::{RunConfig, Timings};
use snaprs::domain::services::persistence_service::PersistenceGate;
use snaprs::utils::retry_policy::RetryPolicy;
use snaprs::workers::CaptureManager;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use mock_renderer::{MockItem, MockRenderer};
pub use mock_table::MockTableWriter;

pub const RUN_LABEL: &str = "2025-01-01_12-00";

/// 毫秒级时间参数，让完整运行在测试中很快结束
pub fn fast_timings() -> Timings {
    Timings {
        navigation_timeout: Duration::from_millis(200),
        item_wait: Duration::from_millis(50),
        settle_after_navigation: Duration::from_millis(2),
        settle_before_scroll: Duration::from_millis(2),
        settle_after_scroll: Duration::from_millis(2),
        settle_after_extract: Duration::from_millis(2),
        sleep_step: Duration::from_millis(1),
        poll_interval: Duration::from_millis(5),
        grace_period: Duration::from_millis(300),
    }
}

pub fn test_config(dir: &Path, worker_count: usize, max_items: usize) -> RunConfig {
    RunConfig {
        time_window_minutes: 60,
        max_items_per_target: max_items,
        worker_count,
        headless: true,
        timings: fast_timings(),
        max_navigation_retries: 2,
        scroll_delta_px: 1500,
        screenshot_dir: dir.join("screenshots"),
        table_dir: dir.to_path_buf(),
        file_prefix: "captured_items".to_string(),
    }
}

pub fn build_manager(
    renderer: &MockRenderer,
    writer: Arc<MockTableWriter>,
    config: RunConfig,
) -> CaptureManager {
    let gate = PersistenceGate::new(
        writer,
        RetryPolicy::new(3, Duration::from_millis(5)),
        "Captured Items",
        FixedOffset::east_opt(0).unwrap(),
    );
    CaptureManager::new(Arc::new(renderer.clone()), Arc::new(gate), config)
}
