// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::counter;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::models::capture_record::Target;
use crate::domain::models::run::{PersistTarget, RunConfig, RunOutcome, RunReport, RunState};
use crate::domain::services::persistence_service::PersistenceGate;
use crate::engines::traits::Renderer;
use crate::infrastructure::result_store::ResultStore;
use crate::queue::scheduler;
use crate::utils::cancellation::CancellationToken;
use crate::utils::errors::{RunError, WorkerError};
use crate::workers::capture_worker::{CaptureWorker, WorkerSummary};
use crate::workers::run_context::RunContext;
use crate::workers::session_registry::SessionRegistry;

/// 抓取管理器
///
/// 负责一次运行的完整生命周期：校验、分批、启动工作器、监控停止信号、
/// 强制回收会话、决定运行结果并调用持久化闸门。
/// 状态机为 `Idle -> Running -> Draining -> Idle`。
pub struct CaptureManager {
    renderer: Arc<dyn Renderer>,
    gate: Arc<PersistenceGate>,
    config: Arc<RunConfig>,
    token: CancellationToken,
    store: Mutex<ResultStore>,
    sessions: SessionRegistry,
    state: Mutex<RunState>,
}

impl CaptureManager {
    pub fn new(renderer: Arc<dyn Renderer>, gate: Arc<PersistenceGate>, config: RunConfig) -> Self {
        Self {
            renderer,
            gate,
            config: Arc::new(config),
            token: CancellationToken::new(),
            store: Mutex::new(ResultStore::new()),
            sessions: SessionRegistry::new(),
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 当前（或最近一次）运行的结果存储
    pub fn store(&self) -> ResultStore {
        self.store.lock().clone()
    }

    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// 请求停止当前运行
    ///
    /// 幂等；只设置停止信号，真正的收尾由监控循环完成
    pub fn stop(&self) {
        if self.token.set() {
            info!("Stop requested, finishing current operations...");
        }
    }

    /// 以当前本地时间命名并执行一次运行
    pub async fn run(&self, targets: Vec<Target>) -> Result<RunReport, RunError> {
        let label = chrono::Local::now().format("%Y-%m-%d_%H-%M").to_string();
        self.run_labeled(targets, &label).await
    }

    /// 执行一次运行
    ///
    /// # 参数
    ///
    /// * `targets` - 目标列表，不能为空
    /// * `run_label` - 运行标签，用于截图目录和表格文件名
    ///
    /// # 返回值
    ///
    /// * `Ok(RunReport)` - 运行结束（包括被停止、无数据、表格写入重试耗尽）
    /// * `Err(RunError)` - 配置无效、目标为空、已有运行或致命的持久化错误
    pub async fn run_labeled(
        &self,
        targets: Vec<Target>,
        run_label: &str,
    ) -> Result<RunReport, RunError> {
        if targets.is_empty() {
            warn!("No targets to process");
            return Err(RunError::NoTargets);
        }
        self.config.validate().map_err(RunError::InvalidConfig)?;

        let store = self.begin()?;
        let result = self.execute(targets, run_label, store).await;
        self.finish();
        result
    }

    fn begin(&self) -> Result<ResultStore, RunError> {
        let mut state = self.state.lock();
        if *state != RunState::Idle {
            return Err(RunError::AlreadyRunning);
        }
        *state = RunState::Running;

        self.token.clear();
        let store = ResultStore::new();
        *self.store.lock() = store.clone();
        Ok(store)
    }

    fn finish(&self) {
        self.token.clear();
        *self.state.lock() = RunState::Idle;
        info!("Ready for new run.");
    }

    async fn execute(
        &self,
        targets: Vec<Target>,
        run_label: &str,
        store: ResultStore,
    ) -> Result<RunReport, RunError> {
        let run_dir = self.config.run_dir(run_label);
        tokio::fs::create_dir_all(&run_dir).await?;

        info!(
            targets = targets.len(),
            workers = self.config.worker_count,
            window_minutes = self.config.time_window_minutes,
            "Starting run {}",
            run_label
        );

        let ctx = Arc::new(RunContext {
            config: self.config.clone(),
            token: self.token.clone(),
            store: store.clone(),
            sessions: self.sessions.clone(),
            run_dir,
        });

        let handles = self.spawn_workers(&targets, ctx);
        let handles = self.monitor(handles).await;
        self.teardown(handles).await;

        // Observe the stop flag before the token is cleared
        let stopped = self.token.is_set();
        self.token.clear();

        let records = store.snapshot();
        let captured = records.len();
        let outcome = RunOutcome::decide(stopped, captured);
        counter!("snaprs_runs_total", "outcome" => outcome.as_str()).increment(1);

        let mut report = RunReport {
            run_label: run_label.to_string(),
            outcome,
            captured,
            table_path: None,
            persistence_error: None,
        };

        let destination = match PersistTarget::for_outcome(outcome, captured) {
            PersistTarget::Primary => Some(self.config.primary_table_path(run_label)),
            PersistTarget::Partial => Some(self.config.partial_table_path(run_label)),
            PersistTarget::Skip => None,
        };

        match destination {
            Some(path) => match self.gate.persist(&records, &path).await {
                Ok(written) => report.table_path = Some(written),
                Err(e) if e.is_fatal() => {
                    error!("Run {} aborted, {} item(s) not saved: {}", run_label, captured, e);
                    return Err(e.into());
                }
                Err(e) => {
                    error!(
                        "Table save failed but {} item(s) were captured: {}",
                        captured, e
                    );
                    report.persistence_error = Some(e.to_string());
                }
            },
            None if stopped => info!("Run stopped with no data, nothing saved"),
            None => info!("No recent items found, nothing saved"),
        }

        info!(
            outcome = %report.outcome,
            path = ?report.table_path,
            "Captured {} record(s)",
            report.captured
        );
        Ok(report)
    }

    fn spawn_workers(
        &self,
        targets: &[Target],
        ctx: Arc<RunContext>,
    ) -> Vec<JoinHandle<WorkerSummary>> {
        let batches = scheduler::partition(targets, self.config.worker_count);
        let pool = Arc::new(Semaphore::new(self.config.worker_count));

        batches
            .into_iter()
            .map(|batch| {
                let worker = CaptureWorker::new(batch.index, self.renderer.clone(), ctx.clone());
                let pool = pool.clone();
                let token = ctx.token.clone();

                tokio::spawn(async move {
                    let Ok(_permit) = pool.acquire_owned().await else {
                        return WorkerSummary::default();
                    };
                    // Batches still queued for a permit when stop arrives never start
                    if token.is_set() {
                        return WorkerSummary {
                            index: batch.index,
                            targets_abandoned: batch.len(),
                            ..WorkerSummary::default()
                        };
                    }
                    worker.run(batch).await
                })
            })
            .collect()
    }

    /// 轮询等待工作器结束或停止信号
    ///
    /// 观察到停止信号时在后台强制关闭所有会话，并从同一时刻开始计算宽限期
    async fn monitor(
        &self,
        handles: Vec<JoinHandle<WorkerSummary>>,
    ) -> Vec<JoinHandle<WorkerSummary>> {
        let timings = &self.config.timings;
        let mut stop_seen_at: Option<Instant> = None;

        loop {
            if handles.iter().all(JoinHandle::is_finished) {
                break;
            }

            if self.token.is_set() {
                match stop_seen_at {
                    None => {
                        info!("Stopping workers...");
                        *self.state.lock() = RunState::Draining;
                        stop_seen_at = Some(Instant::now());
                        let sessions = self.sessions.clone();
                        tokio::spawn(async move {
                            let closed = sessions.close_all().await;
                            debug!(closed, "Forced session reclamation done");
                        });
                    }
                    Some(seen) if seen.elapsed() >= timings.grace_period => {
                        let pending = handles.iter().filter(|h| !h.is_finished()).count();
                        warn!(
                            "Grace period elapsed, abandoning {} unfinished worker(s)",
                            pending
                        );
                        break;
                    }
                    Some(_) => {}
                }
            }

            tokio::time::sleep(timings.poll_interval).await;
        }

        *self.state.lock() = RunState::Draining;
        handles
    }

    /// 回收已结束的工作器，中止其余工作器，不等待它们退出
    async fn teardown(&self, handles: Vec<JoinHandle<WorkerSummary>>) {
        for handle in handles {
            if !handle.is_finished() {
                handle.abort();
                continue;
            }

            match handle.await {
                Ok(summary) => debug!(
                    worker = summary.index,
                    done = summary.targets_done,
                    abandoned = summary.targets_abandoned,
                    captured = summary.captured,
                    "Worker joined"
                ),
                Err(e) => error!("{}", WorkerError::from(e)),
            }
        }

        if !self.sessions.is_empty() {
            let grace = self.config.timings.grace_period;
            if tokio::time::timeout(grace, self.sessions.close_all()).await.is_err() {
                warn!("Session cleanup exceeded {:?}, leaving it to the background", grace);
            }
        }
    }
}
