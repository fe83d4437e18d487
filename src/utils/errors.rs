// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::domain::services::persistence_service::PersistenceError;
use crate::engines::traits::RenderError;

/// Worker错误类型
///
/// 只在工作器内部传播，不会越过工作器边界。
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("渲染错误: {0}")]
    Render(#[from] RenderError),

    #[error("工作器任务异常退出: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// 运行错误类型
///
/// 只有配置错误和致命的持久化错误会返回给调用方。
#[derive(Error, Debug)]
pub enum RunError {
    #[error("无效配置: {0}")]
    InvalidConfig(String),

    #[error("目标列表为空")]
    NoTargets,

    #[error("已有运行正在进行")]
    AlreadyRunning,

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("持久化失败: {0}")]
    Persistence(#[from] PersistenceError),
}

impl From<validator::ValidationErrors> for RunError {
    fn from(errors: validator::ValidationErrors) -> Self {
        RunError::InvalidConfig(errors.to_string())
    }
}

impl From<config::ConfigError> for RunError {
    fn from(error: config::ConfigError) -> Self {
        RunError::InvalidConfig(error.to_string())
    }
}
