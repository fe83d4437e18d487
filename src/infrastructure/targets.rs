// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::domain::models::capture_record::Target;

/// 首次运行时写入的目标列表模板
pub const TEMPLATE: &str = "\
# Profile pages to capture, one URL per line.
# Blank lines and lines starting with '#' are ignored.
#
# https://x.com/rustlang
";

/// 目标列表加载结果
#[derive(Debug)]
pub enum TargetsFile {
    /// 读取到的目标
    Loaded(Vec<Target>),
    /// 文件不存在，已创建模板，需要用户填写后再运行
    TemplateCreated(PathBuf),
}

/// 解析目标列表：忽略空行和注释，重复行只保留第一次出现
pub fn parse_targets(content: &str) -> Vec<Target> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(line.to_string()))
        .map(Target::from)
        .collect()
}

/// 读取目标列表，文件不存在时写入模板
pub async fn load_or_bootstrap(path: &Path) -> std::io::Result<TargetsFile> {
    match fs::read_to_string(path).await {
        Ok(content) => {
            let targets = parse_targets(&content);
            info!(path = %path.display(), count = targets.len(), "Target list loaded");
            Ok(TargetsFile::Loaded(targets))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }
            fs::write(path, TEMPLATE).await?;
            info!(path = %path.display(), "First run: created target list template");
            Ok(TargetsFile::TemplateCreated(path.to_path_buf()))
        }
        Err(e) => Err(e),
    }
}
