// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

/// 单个目标的重试状态
///
/// 导航开始时创建，目标处理结束（成功、耗尽或取消）时丢弃。
/// `max_attempts` 是重试次数上限，不含首次尝试：2 表示最多共 3 次。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// 已失败的次数
    pub attempt: u32,
    /// 最大重试次数
    pub max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
        }
    }

    /// 记录一次失败
    ///
    /// # 返回值
    ///
    /// 还可以继续重试返回true，已耗尽返回false
    pub fn record_failure(&mut self) -> bool {
        self.attempt += 1;
        self.attempt <= self.max_attempts
    }

    /// 已经进行的尝试总数
    pub fn tries(&self) -> u32 {
        self.attempt.min(self.max_attempts) + 1
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt > self.max_attempts
    }
}

/// 固定间隔重试策略
///
/// 用于表格写入这类短操作：失败后等待固定时间再试。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 两次尝试之间的固定间隔
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// 第 `attempt` 次（从1开始）失败之后是否还应重试
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
