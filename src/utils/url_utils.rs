//! URL 处理工具
//!
//! 归一化、站点基址提取、路径段统计以及图片文件名相关的辅助函数。

use url::Url;

/// 归一化 URL:去掉 fragment,其余部分保持解析器输出。
/// 解析失败时原样返回,由调用方的入队校验兜底。
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.trim().to_string(),
    }
}

/// 提取站点基址 `scheme://host[:port]`,用于 SITE 范围判断
pub fn base_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => {
            let mut base = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
            if let Some(port) = url.port() {
                base.push_str(&format!(":{}", port));
            }
            base
        }
        Err(_) => raw.to_string(),
    }
}

/// 非空路径段数量,无法解析时按 0 处理
pub fn path_segment_count(raw: &str) -> usize {
    match Url::parse(raw) {
        Ok(url) => url.path().split('/').filter(|s| !s.is_empty()).count(),
        Err(_) => raw.trim_matches('/').split('/').filter(|s| !s.is_empty()).count(),
    }
}

/// 去掉 query 与 fragment 后的纯路径 URL,用于判断图片扩展名
pub fn strip_query(raw: &str) -> &str {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    &raw[..end]
}

/// 从 URL 提取小写文件扩展名,超过 5 字符视为无效
pub fn file_extension(raw: &str) -> Option<String> {
    let clean = strip_query(raw);
    let name = clean.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// 文件名长度上限,对齐常见文件系统限制
const MAX_FILE_NAME_LEN: usize = 255;

/// 替换文件名中不适合落盘的字符,超长时保留扩展名截断主干
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.chars().count() <= MAX_FILE_NAME_LEN {
        return cleaned;
    }
    match cleaned.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() && ext.chars().count() < MAX_FILE_NAME_LEN => {
            let keep = MAX_FILE_NAME_LEN - ext.chars().count() - 1;
            let stem: String = stem.chars().take(keep).collect();
            format!("{}.{}", stem, ext)
        }
        _ => cleaned.chars().take(MAX_FILE_NAME_LEN).collect(),
    }
}
