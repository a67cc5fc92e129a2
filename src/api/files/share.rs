use serde::Serialize;

use super::encode_path_segment;
use super::models::{ExpiresIn, ShareLink};
use crate::api::client::ApiClient;
use crate::error::ClientError;

#[derive(Debug, Serialize)]
struct ShareRequest<'a> {
    expires_in: &'a str,
}

/// 为指定文件创建限时分享链接。
/// 不做幂等保证：同一文件重复调用可能得到不同的链接，客户端也不缓存旧链接。
pub fn create_share_link(
    api: &ApiClient,
    file_id: &str,
    expires_in: ExpiresIn,
) -> Result<ShareLink, ClientError> {
    if file_id.trim().is_empty() {
        return Err(ClientError::Validation("file id is required".into()));
    }

    let encoded_id = encode_path_segment(file_id.trim());
    let url = api.endpoint(&format!("files/{encoded_id}/share/"))?;
    let body = ShareRequest {
        expires_in: expires_in.as_api_str(),
    };

    let response = api.send_authorized(|http, access| {
        Ok(http
            .post(url.clone())
            .bearer_auth(access)
            .header("Accept", "application/json")
            .json(&body))
    })?;

    if response.status().as_u16() == 401 {
        return Err(ClientError::Unauthenticated);
    }
    if response.status().as_u16() == 404 {
        return Err(ClientError::operation(
            "creating share link",
            "文件不存在，可能已被删除".to_string(),
        ));
    }
    if !response.status().is_success() {
        return Err(ClientError::operation(
            "creating share link",
            format!("server returned HTTP {}", response.status()),
        ));
    }

    let link: ShareLink = response.json()?;
    Ok(link)
}
