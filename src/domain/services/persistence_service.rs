// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::FixedOffset;
use metrics::counter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::domain::models::capture_record::{CaptureRecord, TableRow};
use crate::domain::repositories::table_repository::{TableError, TableWriter};
use crate::utils::retry_policy::RetryPolicy;

/// 持久化错误类型
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// 缺少序列化依赖，立即失败，不重试
    #[error("Missing dependency: {0}")]
    MissingDependency(String),
    /// 重试耗尽；内存中的记录不受影响
    #[error("Could not save table after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
    /// 没有可写入的记录
    #[error("No records to persist")]
    Empty,
}

impl PersistenceError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, PersistenceError::MissingDependency(_))
    }
}

/// 持久化闸门
///
/// 包装表格写入器，为瞬时写入失败提供固定间隔的重试
pub struct PersistenceGate {
    writer: Arc<dyn TableWriter>,
    policy: RetryPolicy,
    sheet_title: String,
    display_zone: FixedOffset,
}

impl PersistenceGate {
    pub fn new(
        writer: Arc<dyn TableWriter>,
        policy: RetryPolicy,
        sheet_title: impl Into<String>,
        display_zone: FixedOffset,
    ) -> Self {
        Self {
            writer,
            policy,
            sheet_title: sheet_title.into(),
            display_zone,
        }
    }

    /// 把记录快照写入目标路径
    ///
    /// # 返回值
    ///
    /// * `Ok(PathBuf)` - 写入成功的路径
    /// * `Err(PersistenceError)` - 致命错误或重试耗尽
    pub async fn persist(
        &self,
        records: &[CaptureRecord],
        destination: &Path,
    ) -> Result<PathBuf, PersistenceError> {
        if records.is_empty() {
            info!("No records captured, no table saved");
            return Err(PersistenceError::Empty);
        }

        let rows: Arc<Vec<TableRow>> = Arc::new(
            records
                .iter()
                .map(|r| TableRow::from_record(r, &self.display_zone))
                .collect(),
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.write_once(rows.clone(), destination).await {
                Ok(()) => {
                    info!(
                        path = %destination.display(),
                        rows = rows.len(),
                        "Table saved"
                    );
                    return Ok(destination.to_path_buf());
                }
                Err(TableError::MissingDependency(dep)) => {
                    error!("Missing table serialization dependency: {}", dep);
                    return Err(PersistenceError::MissingDependency(dep));
                }
                Err(e) if self.policy.should_retry(attempt) => {
                    counter!("snaprs_table_write_retries_total").increment(1);
                    warn!(
                        "Table save attempt {} failed, retrying... ({})",
                        attempt, e
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
                Err(e) => {
                    error!(
                        "Could not save table after {} attempts: {}",
                        attempt, e
                    );
                    return Err(PersistenceError::Exhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
            }
        }
    }

    async fn write_once(&self, rows: Arc<Vec<TableRow>>, destination: &Path) -> Result<(), TableError> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let writer = self.writer.clone();
        let path = destination.to_path_buf();
        let title = self.sheet_title.clone();

        tokio::task::spawn_blocking(move || writer.write_table(&rows, &path, &title))
            .await
            .map_err(|e| TableError::Write(format!("writer task failed: {}", e)))?
    }
}
