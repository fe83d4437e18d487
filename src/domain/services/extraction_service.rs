// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::models::capture_record::{CaptureRecord, Target};
use crate::engines::traits::{ItemHandle, RenderError, RenderSession};
use crate::utils::cancellation::CancellationToken;
use crate::utils::url_utils::{self, PermalinkError};

/// 截图文件扩展名
pub const ARTIFACT_EXTENSION: &str = "png";

/// 单个条目的处理错误，只会导致跳过该条目
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("missing permalink")]
    MissingLink,
    #[error(transparent)]
    Permalink(#[from] PermalinkError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// 条目提取策略
#[derive(Debug, Clone)]
pub struct ExtractionPolicy {
    /// 时间窗口（分钟），边界包含在内
    pub window_minutes: u32,
    /// 每个目标最多产出的记录数
    pub max_items: usize,
    /// 截图输出目录
    pub artifact_dir: PathBuf,
}

/// 解析时间戳属性，接受 `Z` 后缀和带偏移的RFC 3339，也接受不带时区的ISO时间（按UTC处理）
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// 条目是否在时间窗口内
///
/// 年龄恰好等于窗口时算在窗口内，超出一秒即排除
pub fn within_window(item_time: DateTime<Utc>, now: DateTime<Utc>, window_minutes: u32) -> bool {
    now.signed_duration_since(item_time) <= Duration::minutes(i64::from(window_minutes))
}

/// 条目提取器
///
/// 惰性、有限、不可重启的记录序列。每次 `next` 只处理到下一条合格条目为止，
/// 截图在 `next` 内完成。上限按产出数计算，跳过的条目不占名额。
pub struct ItemExtractor {
    target: Target,
    items: std::vec::IntoIter<Box<dyn ItemHandle>>,
    policy: ExtractionPolicy,
    token: CancellationToken,
    clock: fn() -> DateTime<Utc>,
    emitted: usize,
    finished: bool,
}

impl ItemExtractor {
    pub fn new(
        target: Target,
        items: Vec<Box<dyn ItemHandle>>,
        policy: ExtractionPolicy,
        token: CancellationToken,
    ) -> Self {
        Self {
            target,
            items: items.into_iter(),
            policy,
            token,
            clock: Utc::now,
            emitted: 0,
            finished: false,
        }
    }

    /// 空序列，用于页面上没有条目的情况
    pub fn empty(target: Target, policy: ExtractionPolicy, token: CancellationToken) -> Self {
        Self::new(target, Vec::new(), policy, token)
    }

    /// 替换时钟
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// 等待页面出现条目并构建提取器
    ///
    /// 在限定时间内没有出现条目容器时返回空序列，这不是可重试的错误
    pub async fn from_session(
        session: &dyn RenderSession,
        target: Target,
        policy: ExtractionPolicy,
        token: CancellationToken,
        wait: std::time::Duration,
    ) -> Result<Self, RenderError> {
        match session.wait_for_items(wait).await {
            Ok(()) => {}
            Err(RenderError::NotFound) => {
                debug!(target = %target, "No items found on page");
                return Ok(Self::empty(target, policy, token));
            }
            Err(e) => return Err(e),
        }

        let items = session.list_items().await?;
        Ok(Self::new(target, items, policy, token))
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// 产出下一条合格记录
    pub async fn next(&mut self) -> Option<CaptureRecord> {
        while !self.finished {
            if self.emitted >= self.policy.max_items || self.token.is_set() {
                break;
            }
            let Some(item) = self.items.next() else {
                break;
            };

            match self.process(item.as_ref()).await {
                Ok(Some(record)) => {
                    self.emitted += 1;
                    return Some(record);
                }
                Ok(None) => continue,
                Err(ItemError::Render(RenderError::SessionClosed)) => break,
                Err(e) => {
                    if !self.token.is_set() {
                        warn!(target = %self.target, "Item skipped: {}", e);
                    }
                }
            }
        }

        self.finished = true;
        None
    }

    async fn process(&self, item: &dyn ItemHandle) -> Result<Option<CaptureRecord>, ItemError> {
        if item.is_pinned().await? {
            return Ok(None);
        }

        let Some(raw) = item.timestamp().await? else {
            return Ok(None);
        };
        let Some(item_time) = parse_timestamp(&raw) else {
            debug!(target = %self.target, raw = %raw, "Unparseable item timestamp");
            return Ok(None);
        };

        let now = (self.clock)();
        if !within_window(item_time, now, self.policy.window_minutes) {
            return Ok(None);
        }

        let link = item.permalink().await?.ok_or(ItemError::MissingLink)?;
        let permalink = url_utils::parse_permalink(&link)?;

        let destination = self.policy.artifact_dir.join(format!(
            "{}.{}",
            permalink.artifact_stem(),
            ARTIFACT_EXTENSION
        ));

        if self.token.is_set() {
            return Ok(None);
        }
        item.capture_artifact(&destination).await?;

        Ok(Some(CaptureRecord {
            source_handle: permalink.handle,
            item_link: link,
            artifact_ref: destination.to_string_lossy().into_owned(),
            item_timestamp: item_time,
            captured_at: (self.clock)(),
        }))
    }
}
