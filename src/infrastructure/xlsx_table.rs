// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::path::Path;

use crate::domain::models::capture_record::TableRow;
use crate::domain::repositories::table_repository::{TableError, TableWriter};

/// Excel表格写入器
///
/// 需要 `xlsx` 特性；未启用时返回 `TableError::MissingDependency`
pub struct XlsxTableWriter {
    #[cfg_attr(not(feature = "xlsx"), allow(dead_code))]
    max_column_width: usize,
}

impl XlsxTableWriter {
    pub fn new(max_column_width: usize) -> Self {
        Self { max_column_width }
    }
}

impl Default for XlsxTableWriter {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(feature = "xlsx")]
impl TableWriter for XlsxTableWriter {
    fn write_table(
        &self,
        rows: &[TableRow],
        destination: &Path,
        sheet_title: &str,
    ) -> Result<(), TableError> {
        use crate::domain::repositories::table_repository::column_widths;
        use rust_xlsxwriter::{Format, Workbook};

        let to_err = |e: rust_xlsxwriter::XlsxError| TableError::Write(e.to_string());

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_title).map_err(to_err)?;

        let header = Format::new().set_bold();
        for (col, title) in TableRow::HEADERS.iter().enumerate() {
            sheet
                .write_string_with_format(0, col as u16, *title, &header)
                .map_err(to_err)?;
        }

        for (i, row) in rows.iter().enumerate() {
            let r = (i + 1) as u32;
            sheet.write_string(r, 0, &row.account_handle).map_err(to_err)?;
            sheet.write_string(r, 1, &row.item_link).map_err(to_err)?;
            sheet
                .write_url_with_text(r, 2, row.image.as_str(), TableRow::IMAGE_LABEL)
                .map_err(to_err)?;
            sheet.write_string(r, 3, &row.item_time).map_err(to_err)?;
            sheet.write_string(r, 4, &row.captured_at).map_err(to_err)?;
        }

        sheet.set_freeze_panes(1, 0).map_err(to_err)?;
        for (col, width) in column_widths(rows, self.max_column_width).iter().enumerate() {
            sheet
                .set_column_width(col as u16, *width as f64)
                .map_err(to_err)?;
        }

        workbook.save(destination).map_err(|e| match e {
            rust_xlsxwriter::XlsxError::IoError(io) => TableError::Io(io),
            other => TableError::Write(other.to_string()),
        })
    }
}

#[cfg(not(feature = "xlsx"))]
impl TableWriter for XlsxTableWriter {
    fn write_table(&self, _: &[TableRow], _: &Path, _: &str) -> Result<(), TableError> {
        Err(TableError::MissingDependency(
            "xlsx support is not compiled in; rebuild with `--features xlsx`".to_string(),
        ))
    }
}
