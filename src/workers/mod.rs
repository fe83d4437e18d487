// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供抓取工作器和运行编排功能
/// 包括批次处理、会话生命周期管理和并发控制
pub mod capture_worker;
pub mod manager;
pub mod run_context;
pub mod session_registry;

pub use manager::CaptureManager;
