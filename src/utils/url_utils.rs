// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;
use url::Url;

/// 永久链接解析错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PermalinkError {
    #[error("Invalid permalink URL: {0}")]
    InvalidUrl(String),
    #[error("Permalink has too few path segments: {0}")]
    TooShort(String),
}

/// 从条目永久链接中解析出的标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permalink {
    /// 账号句柄（路径第一段）
    pub handle: String,
    /// 条目ID（路径最后一段）
    pub item_id: String,
}

impl Permalink {
    /// 截图文件名主干 `{handle}_{item_id}`
    ///
    /// 同一条目重复抓取得到相同文件名，不同条目不会冲突。
    pub fn artifact_stem(&self) -> String {
        format!(
            "{}_{}",
            sanitize_file_component(&self.handle),
            sanitize_file_component(&self.item_id)
        )
    }
}

/// 解析形如 `https://host/{handle}/status/{id}` 的永久链接
pub fn parse_permalink(link: &str) -> Result<Permalink, PermalinkError> {
    let url = Url::parse(link).map_err(|_| PermalinkError::InvalidUrl(link.to_string()))?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if segments.len() < 2 {
        return Err(PermalinkError::TooShort(link.to_string()));
    }

    Ok(Permalink {
        handle: segments[0].to_string(),
        item_id: segments[segments.len() - 1].to_string(),
    })
}

/// 把路径分量中不适合做文件名的字符替换为 `-`
pub fn sanitize_file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// 把本地路径转换为 `file:///` 链接
///
/// 相对路径先按当前工作目录补全为绝对路径
pub fn file_link(path: &std::path::Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match Url::from_file_path(&absolute) {
        Ok(url) => url.to_string(),
        Err(_) => format!("file:///{}", absolute.to_string_lossy().replace('\\', "/")),
    }
}
