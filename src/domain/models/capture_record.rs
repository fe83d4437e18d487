// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::url_utils;

/// 抓取目标（个人主页地址）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target(String);

impl Target {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// 一个工作器的目标批次
///
/// 分区时创建，之后不再修改，所有权完整地转移给工作器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 批次序号，也是工作器序号
    pub index: usize,
    targets: Vec<Target>,
}

impl Batch {
    pub fn new(index: usize, targets: Vec<Target>) -> Self {
        Self { index, targets }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// 抓取记录
///
/// 截图成功后立即创建，之后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// 账号句柄
    pub source_handle: String,
    /// 条目链接
    pub item_link: String,
    /// 截图文件路径
    pub artifact_ref: String,
    /// 条目时间
    pub item_timestamp: DateTime<Utc>,
    /// 抓取时间
    pub captured_at: DateTime<Utc>,
}

/// 表格中的一行
///
/// 列顺序固定：`account_handle, item_link, image, item_time, captured_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub account_handle: String,
    pub item_link: String,
    /// 截图的 `file:///` 链接
    pub image: String,
    pub item_time: String,
    pub captured_at: String,
}

impl TableRow {
    /// 表头
    pub const HEADERS: [&'static str; 5] = [
        "account_handle",
        "item_link",
        "image",
        "item_time",
        "captured_at",
    ];

    /// 图片列的显示文字
    pub const IMAGE_LABEL: &'static str = "View Image";

    /// 把记录转换为表格行，时间按显示时区格式化
    pub fn from_record(record: &CaptureRecord, display_zone: &FixedOffset) -> Self {
        Self {
            account_handle: record.source_handle.clone(),
            item_link: record.item_link.clone(),
            image: url_utils::file_link(std::path::Path::new(&record.artifact_ref)),
            item_time: format_display(&record.item_timestamp, display_zone),
            captured_at: format_display(&record.captured_at, display_zone),
        }
    }

    /// 按列顺序返回单元格
    pub fn cells(&self) -> [&str; 5] {
        [
            &self.account_handle,
            &self.item_link,
            &self.image,
            &self.item_time,
            &self.captured_at,
        ]
    }
}

/// 以 `%Y-%m-%d %H:%M:%S` 格式显示本地时间
pub fn format_display(instant: &DateTime<Utc>, zone: &FixedOffset) -> String {
    instant
        .with_timezone(zone)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
