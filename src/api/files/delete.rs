use super::encode_path_segment;
use crate::api::client::ApiClient;
use crate::error::ClientError;

/// 删除指定文件。客户端不做软删除语义，成功即认为记录已从服务端集合移除。
pub fn delete_file(api: &ApiClient, file_id: &str) -> Result<(), ClientError> {
    if file_id.trim().is_empty() {
        return Err(ClientError::Validation("file id is required".into()));
    }

    let encoded_id = encode_path_segment(file_id.trim());
    let url = api.endpoint(&format!("files/{encoded_id}/"))?;

    let response =
        api.send_authorized(|http, access| Ok(http.delete(url.clone()).bearer_auth(access)))?;

    let status = response.status();
    if status.as_u16() == 401 {
        return Err(ClientError::Unauthenticated);
    }
    if status.as_u16() == 404 {
        return Err(ClientError::operation(
            "deleting file",
            "找不到要删除的文件，可能已被移除".to_string(),
        ));
    }
    if !status.is_success() {
        return Err(ClientError::operation(
            "deleting file",
            format!("server returned HTTP {status}"),
        ));
    }

    Ok(())
}
