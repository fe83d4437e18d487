// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
/// 包括取消令牌、重试状态、链接解析、遥测初始化等功能
pub mod cancellation;
pub mod errors;
pub mod retry_policy;
pub mod telemetry;
pub mod url_utils;
