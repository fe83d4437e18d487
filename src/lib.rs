// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心实体、提取与持久化服务和仓库接口
pub mod domain;

/// 引擎模块
///
/// 定义渲染能力接口及其浏览器实现
pub mod engines;

/// 基础设施模块
///
/// 提供结果存储、表格写入和目标文件加载
pub mod infrastructure;

/// 队列模块
///
/// 实现目标分批
pub mod queue;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 实现抓取工作器和运行编排
pub mod workers;
