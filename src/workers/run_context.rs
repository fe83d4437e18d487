// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::models::run::RunConfig;
use crate::domain::services::extraction_service::ExtractionPolicy;
use crate::infrastructure::result_store::ResultStore;
use crate::utils::cancellation::CancellationToken;
use crate::workers::session_registry::SessionRegistry;

/// 一次运行的共享状态
///
/// 由编排器创建并持有，启动时以 `Arc` 传给每个工作器
pub struct RunContext {
    pub config: Arc<RunConfig>,
    pub token: CancellationToken,
    pub store: ResultStore,
    pub sessions: SessionRegistry,
    /// 本次运行的截图目录
    pub run_dir: PathBuf,
}

impl RunContext {
    pub fn extraction_policy(&self) -> ExtractionPolicy {
        ExtractionPolicy {
            window_minutes: self.config.time_window_minutes,
            max_items: self.config.max_items_per_target,
            artifact_dir: self.run_dir.clone(),
        }
    }
}
