// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use snaprs::domain::models::capture_record::TableRow;
use snaprs::domain::repositories::table_repository::{TableError, TableWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

/// 模拟表格写入器
///
/// 记录每次成功写入的路径和行，可预设前N次失败或缺少依赖
#[derive(Default)]
pub struct MockTableWriter {
    failures_left: AtomicU32,
    missing_dependency: bool,
    attempts: AtomicU32,
    writes: Mutex<Vec<(PathBuf, Vec<TableRow>)>>,
}

impl MockTableWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(times),
            ..Self::default()
        }
    }

    pub fn missing_dependency() -> Self {
        Self {
            missing_dependency: true,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn written_paths(&self) -> Vec<PathBuf> {
        self.writes.lock().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn written_rows(&self) -> usize {
        self.writes.lock().iter().map(|(_, rows)| rows.len()).sum()
    }
}

impl TableWriter for MockTableWriter {
    fn write_table(
        &self,
        rows: &[TableRow],
        destination: &Path,
        _sheet_title: &str,
    ) -> Result<(), TableError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.missing_dependency {
            return Err(TableError::MissingDependency("xlsx".into()));
        }
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(TableError::Write("file is locked".into()));
        }

        std::fs::write(destination, b"table")?;
        self.writes
            .lock()
            .push((destination.to_path_buf(), rows.to_vec()));
        Ok(())
    }
}
