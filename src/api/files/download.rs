use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::encode_path_segment;
use crate::api::client::ApiClient;
use crate::error::ClientError;

/// 二进制拉取放宽到 10 分钟，避免大文件在慢速链路上被掐断。
const BINARY_TIMEOUT: Duration = Duration::from_secs(600);

/// 同一个文件资源的三种二进制形态，对应不同的服务端路径。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryVariant {
    /// 完整内容，带下载语义。
    Download,
    /// 原图内联展示。
    View,
    /// 缩略图。
    Preview,
}

impl BinaryVariant {
    fn path_suffix(&self) -> &'static str {
        match self {
            BinaryVariant::Download => "download",
            BinaryVariant::View => "view",
            BinaryVariant::Preview => "preview",
        }
    }
}

/// 拉取文件的二进制内容，返回字节与服务端声明的 Content-Type。
/// 经过请求管线，享有同样的 401 刷新重试语义。
pub fn fetch_file_blob(
    api: &ApiClient,
    file_id: &str,
    variant: BinaryVariant,
) -> Result<(Vec<u8>, String), ClientError> {
    if file_id.trim().is_empty() {
        return Err(ClientError::Validation("file id is required".into()));
    }

    let encoded_id = encode_path_segment(file_id.trim());
    let url = api.endpoint(&format!("files/{encoded_id}/{}/", variant.path_suffix()))?;

    let response = api.send_authorized(|http, access| {
        Ok(http
            .get(url.clone())
            .bearer_auth(access)
            .timeout(BINARY_TIMEOUT))
    })?;

    if response.status().as_u16() == 401 {
        return Err(ClientError::Unauthenticated);
    }
    if response.status().as_u16() == 404 {
        return Err(ClientError::operation(
            "fetching file content",
            "文件不存在，可能已被删除".to_string(),
        ));
    }
    if !response.status().is_success() {
        return Err(ClientError::operation(
            "fetching file content",
            format!("server returned HTTP {}", response.status()),
        ));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = response.bytes()?.to_vec();

    Ok((bytes, content_type))
}

/// 清理不适合做文件名的字符，空名回退到占位名。
pub fn sanitize_file_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let fallback = "download.bin";
    let candidate = if trimmed.is_empty() { fallback } else { trimmed };

    let sanitized: String = candidate
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect();

    let final_name = sanitized.trim();
    if final_name.is_empty() || final_name == "." || final_name == ".." {
        fallback.to_string()
    } else {
        final_name.to_string()
    }
}

/// 确保目标目录存在并返回落盘路径；同名文件直接覆盖由调用方决定。
pub fn prepare_destination(
    target_dir: &str,
    file_name: &str,
    overwrite: bool,
) -> Result<PathBuf, ClientError> {
    let dir_path = Path::new(target_dir);
    fs::create_dir_all(dir_path).map_err(|e| {
        ClientError::operation(
            "preparing download directory",
            format!("{}: {e}", dir_path.to_string_lossy()),
        )
    })?;

    let destination = dir_path.join(file_name);
    if destination.exists() && !overwrite {
        return Err(ClientError::operation(
            "preparing download destination",
            format!("文件已存在：{}", destination.to_string_lossy()),
        ));
    }

    Ok(destination)
}
