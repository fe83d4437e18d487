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

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// 渲染引擎错误类型
#[derive(Error, Debug)]
pub enum RenderError {
    /// 导航失败（传输层错误）
    #[error("Navigation failed: {0}")]
    Navigation(String),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 页面上没有出现条目容器
    #[error("No item containers found")]
    NotFound,
    /// 会话已关闭（包括被强制回收）
    #[error("Render session closed")]
    SessionClosed,
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl RenderError {
    /// 判断错误是否可重试
    ///
    /// 只有导航类错误（超时、传输错误）可以重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, RenderError::Navigation(_) | RenderError::Timeout)
    }
}

/// 会话启动选项
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// 是否无头模式，对核心逻辑不透明
    pub headless: bool,
}

/// 渲染引擎特质
///
/// 负责创建渲染会话，每个工作器持有一个会话
#[async_trait]
pub trait Renderer: Send + Sync {
    /// 打开新的渲染会话
    async fn open_session(
        &self,
        options: &SessionOptions,
    ) -> Result<Arc<dyn RenderSession>, RenderError>;

    /// 引擎名称
    fn name(&self) -> &'static str;
}

/// 渲染会话特质
#[async_trait]
pub trait RenderSession: Send + Sync {
    /// 会话唯一标识，用于强制回收登记
    fn id(&self) -> Uuid;

    /// 在超时时间内导航到指定URL
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), RenderError>;

    /// 重试前恢复页面：页面仍打开则重新加载，否则打开新页面
    async fn recover_page(&self, timeout: Duration) -> Result<(), RenderError>;

    /// 向下滚动以触发懒加载
    async fn scroll_by(&self, delta_y: i64) -> Result<(), RenderError>;

    /// 等待条目容器出现，超时返回 `RenderError::NotFound`
    async fn wait_for_items(&self, timeout: Duration) -> Result<(), RenderError>;

    /// 按文档顺序列出条目
    async fn list_items(&self) -> Result<Vec<Box<dyn ItemHandle>>, RenderError>;

    /// 关闭会话。幂等：关闭已关闭的会话什么也不做。
    async fn close(&self);

    /// 会话是否已关闭
    fn is_closed(&self) -> bool;
}

/// 页面上单个条目的句柄
#[async_trait]
pub trait ItemHandle: Send + Sync {
    /// 是否为置顶条目
    async fn is_pinned(&self) -> Result<bool, RenderError>;

    /// 时间戳属性原文（类ISO-8601，接受 `Z` 后缀）
    async fn timestamp(&self) -> Result<Option<String>, RenderError>;

    /// 条目永久链接
    async fn permalink(&self) -> Result<Option<String>, RenderError>;

    /// 把条目区域截图保存到目标路径
    async fn capture_artifact(&self, destination: &Path) -> Result<(), RenderError>;
}
