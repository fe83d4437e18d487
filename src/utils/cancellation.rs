// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 取消令牌
///
/// 进程内共享的停止信号。只允许 false -> true 的单调变化，
/// 仅由编排器在两次运行之间调用 `clear()` 复位。
///
/// 令牌只被轮询（`is_set`），从不被 await。
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置停止信号。可重复调用，可在任意线程调用。
    ///
    /// # 返回值
    ///
    /// 如果本次调用是第一次设置则返回true
    pub fn set(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    /// 非阻塞地检查停止信号
    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// 复位令牌。只能在没有活跃工作器时调用。
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// 可中断的睡眠
///
/// 把 `total` 拆成若干个不超过 `step` 的短睡眠，每次睡眠前检查令牌，
/// 因此取消延迟最多为一个 `step`。
///
/// # 返回值
///
/// 完整睡完返回true；因令牌被设置而提前返回false
pub async fn sleep_interruptible(token: &CancellationToken, total: Duration, step: Duration) -> bool {
    let step = if step.is_zero() {
        Duration::from_millis(1)
    } else {
        step
    };
    let mut remaining = total;

    while !remaining.is_zero() {
        if token.is_set() {
            return false;
        }
        let chunk = remaining.min(step);
        tokio::time::sleep(chunk).await;
        remaining = remaining.saturating_sub(chunk);
    }

    !token.is_set()
}
