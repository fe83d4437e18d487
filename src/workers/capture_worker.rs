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

use metrics::counter;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::models::capture_record::{Batch, Target};
use crate::domain::models::run::TargetState;
use crate::domain::services::extraction_service::ItemExtractor;
use crate::engines::traits::{RenderError, RenderSession, Renderer, SessionOptions};
use crate::utils::cancellation::sleep_interruptible;
use crate::utils::errors::WorkerError;
use crate::utils::retry_policy::RetryState;
use crate::workers::run_context::RunContext;
use crate::workers::session_registry::SessionGuard;

/// 单个目标的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetReport {
    pub state: TargetState,
    pub captured: usize,
    /// 总尝试次数
    pub tries: u32,
}

/// 工作器汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub index: usize,
    pub targets_done: usize,
    pub targets_abandoned: usize,
    pub captured: usize,
    /// 工作器是否因异常提前结束
    pub crashed: bool,
}

/// 抓取工作器
///
/// 持有一个渲染会话，按顺序处理一个批次
pub struct CaptureWorker {
    index: usize,
    renderer: Arc<dyn Renderer>,
    ctx: Arc<RunContext>,
}

impl CaptureWorker {
    /// 创建新的抓取工作器实例
    pub fn new(index: usize, renderer: Arc<dyn Renderer>, ctx: Arc<RunContext>) -> Self {
        Self {
            index,
            renderer,
            ctx,
        }
    }

    /// 处理整个批次
    ///
    /// 不会返回错误：批次内的任何异常都在这里记录并吞掉，不影响其他工作器
    pub async fn run(self, batch: Batch) -> WorkerSummary {
        let mut summary = WorkerSummary {
            index: self.index,
            ..WorkerSummary::default()
        };

        if self.ctx.token.is_set() {
            summary.targets_abandoned = batch.len();
            return summary;
        }

        if let Err(e) = self.run_batch(&batch, &mut summary).await {
            summary.crashed = true;
            if !self.ctx.token.is_set() {
                error!(worker = self.index, "Worker crashed but recovered: {}", e);
            }
        }

        let handled = summary.targets_done + summary.targets_abandoned;
        summary.targets_abandoned += batch.len().saturating_sub(handled);
        debug!(worker = self.index, ?summary, "Worker finished");
        summary
    }

    async fn run_batch(&self, batch: &Batch, summary: &mut WorkerSummary) -> Result<(), WorkerError> {
        let options = SessionOptions {
            headless: self.ctx.config.headless,
        };
        let session = self.renderer.open_session(&options).await?;
        let guard = SessionGuard::new(session, self.ctx.sessions.clone());

        let result = self.process_targets(guard.session(), batch, summary).await;

        guard.release().await;
        result
    }

    async fn process_targets(
        &self,
        session: &dyn RenderSession,
        batch: &Batch,
        summary: &mut WorkerSummary,
    ) -> Result<(), WorkerError> {
        for target in batch.targets() {
            if self.ctx.token.is_set() {
                break;
            }

            let report = self.process_target(session, target).await?;
            summary.captured += report.captured;
            match report.state {
                TargetState::Done => summary.targets_done += 1,
                _ => summary.targets_abandoned += 1,
            }
        }
        Ok(())
    }

    /// 处理单个目标
    ///
    /// 状态机：NotStarted -> Navigating -> (Retrying -> Navigating)* -> Extracting -> Done，
    /// 任一步观察到停止信号或重试耗尽则进入 Abandoned。
    #[instrument(skip(self, session, target), fields(worker = self.index, target = %target))]
    pub async fn process_target(
        &self,
        session: &dyn RenderSession,
        target: &Target,
    ) -> Result<TargetReport, WorkerError> {
        let config = &self.ctx.config;
        let token = &self.ctx.token;
        let mut retry = RetryState::new(config.max_navigation_retries);
        let mut captured = 0usize;
        let mut state = TargetState::NotStarted;

        while !state.is_terminal() {
            state = match state {
                TargetState::NotStarted => {
                    if token.is_set() {
                        TargetState::Abandoned
                    } else {
                        info!("[Worker {}] Opening: {}", self.index, target);
                        TargetState::Navigating
                    }
                }
                TargetState::Navigating => {
                    if token.is_set() {
                        TargetState::Abandoned
                    } else {
                        match session
                            .navigate(target.as_str(), config.timings.navigation_timeout)
                            .await
                        {
                            Ok(()) => TargetState::Extracting,
                            Err(e) => self.on_failure(e, &mut retry, target)?,
                        }
                    }
                }
                TargetState::Retrying => {
                    if token.is_set() {
                        TargetState::Abandoned
                    } else {
                        match session.recover_page(config.timings.navigation_timeout).await {
                            Ok(()) => TargetState::Navigating,
                            Err(_) if token.is_set() => TargetState::Abandoned,
                            Err(e) if e.is_retryable() => {
                                debug!("Page recovery failed, navigating anyway: {}", e);
                                TargetState::Navigating
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
                TargetState::Extracting => match self.extract(session, target, &mut captured).await {
                    Ok(true) => TargetState::Done,
                    Ok(false) => TargetState::Abandoned,
                    // Records already stored for this target would be duplicated by a retry
                    Err(e) if captured > 0 && e.is_retryable() => {
                        warn!("Extraction interrupted after {} item(s): {}", captured, e);
                        TargetState::Done
                    }
                    Err(e) => self.on_failure(e, &mut retry, target)?,
                },
                TargetState::Done | TargetState::Abandoned => state,
            };
        }

        if state == TargetState::Abandoned {
            counter!("snaprs_targets_abandoned_total").increment(1);
        }

        Ok(TargetReport {
            state,
            captured,
            tries: retry.tries(),
        })
    }

    /// 导航类失败进入重试或放弃；其他失败向上传播到工作器边界
    fn on_failure(
        &self,
        error: RenderError,
        retry: &mut RetryState,
        target: &Target,
    ) -> Result<TargetState, WorkerError> {
        if self.ctx.token.is_set() {
            return Ok(TargetState::Abandoned);
        }
        if !error.is_retryable() {
            return Err(error.into());
        }

        counter!("snaprs_navigation_retries_total").increment(1);
        if retry.record_failure() {
            warn!(
                "Retry {}/{} for {}: {}",
                retry.attempt,
                retry.max_attempts + 1,
                target,
                error
            );
            Ok(TargetState::Retrying)
        } else {
            warn!("Giving up after retries: {} ({})", target, error);
            Ok(TargetState::Abandoned)
        }
    }

    /// 等待、滚动、再等待，然后提取条目写入结果存储
    ///
    /// # 返回值
    ///
    /// 正常结束返回true；观察到停止信号返回false
    async fn extract(
        &self,
        session: &dyn RenderSession,
        target: &Target,
        captured: &mut usize,
    ) -> Result<bool, RenderError> {
        let timings = &self.ctx.config.timings;
        let token = &self.ctx.token;
        let step = timings.sleep_step;

        if !sleep_interruptible(token, timings.settle_after_navigation, step).await {
            return Ok(false);
        }
        if !sleep_interruptible(token, timings.settle_before_scroll, step).await {
            return Ok(false);
        }
        session.scroll_by(self.ctx.config.scroll_delta_px).await?;
        if !sleep_interruptible(token, timings.settle_after_scroll, step).await {
            return Ok(false);
        }
        if token.is_set() {
            return Ok(false);
        }

        let mut extractor = ItemExtractor::from_session(
            session,
            target.clone(),
            self.ctx.extraction_policy(),
            token.clone(),
            timings.item_wait,
        )
        .await?;

        while let Some(record) = extractor.next().await {
            info!("✅ {} | {}", record.source_handle, record.item_link);
            self.ctx.store.append(record);
            counter!("snaprs_items_captured_total").increment(1);
            *captured += 1;
        }

        if extractor.emitted() == 0 {
            info!("  ┖─ No recent items captured for {}", target);
        }
        if token.is_set() {
            return Ok(false);
        }

        // Trailing pause between targets
        sleep_interruptible(token, timings.settle_after_extract, step).await;
        Ok(true)
    }
}
