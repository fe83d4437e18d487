// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::path::Path;
use thiserror::Error;

use crate::domain::models::capture_record::TableRow;

/// 表格写入错误类型
#[derive(Error, Debug)]
pub enum TableError {
    /// 缺少必需的序列化能力，不可重试
    #[error("Missing dependency: {0}")]
    MissingDependency(String),
    /// 写入失败，可重试
    #[error("Write error: {0}")]
    Write(String),
    /// IO错误，可重试
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TableError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TableError::MissingDependency(_))
    }
}

/// 表格写入仓库特质
///
/// 把一组扁平记录写入表格文件：固定列、冻结表头、按内容设定列宽
pub trait TableWriter: Send + Sync {
    fn write_table(
        &self,
        rows: &[TableRow],
        destination: &Path,
        sheet_title: &str,
    ) -> Result<(), TableError>;
}

/// 计算每列宽度：min(max(最长单元格, 表头) + 3, max_width)
pub fn column_widths(rows: &[TableRow], max_width: usize) -> [usize; 5] {
    let mut widths = TableRow::HEADERS.map(|h| h.chars().count());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.cells()) {
            *width = (*width).max(cell.chars().count());
        }
    }
    widths.map(|w| (w + 3).min(max_width))
}
