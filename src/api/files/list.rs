use serde::Deserialize;

use super::models::{FileRecord, Page};
use crate::api::client::ApiClient;
use crate::error::ClientError;

/// 拉取指定页（从 1 开始计数）的文件列表。
pub fn list_files(api: &ApiClient, page: u32) -> Result<Page<FileRecord>, ClientError> {
    let url = api.endpoint("files/")?;
    let response = api.send_authorized(|http, access| {
        Ok(http
            .get(url.clone())
            .query(&[("page", page)])
            .bearer_auth(access)
            .header("Accept", "application/json"))
    })?;

    if response.status().as_u16() == 401 {
        return Err(ClientError::Unauthenticated);
    }
    if !response.status().is_success() {
        return Err(ClientError::operation(
            "listing files",
            format!("server returned HTTP {}", response.status()),
        ));
    }

    let payload: FileListResponse = response.json()?;
    Ok(Page {
        total_count: payload.count,
        items: payload.results,
    })
}

/// 服务端分页报文。next/previous 是整页 URL，客户端用固定页大小
/// 自行换算页码，不跟随这两个链接。
#[derive(Debug, Deserialize)]
struct FileListResponse {
    count: u64,
    #[allow(dead_code)]
    next: Option<String>,
    #[allow(dead_code)]
    previous: Option<String>,
    results: Vec<FileRecord>,
}
