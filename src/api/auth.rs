use reqwest::blocking::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::client::ApiClient;
use crate::error::ClientError;

/// 认证端点：注册、登录与当前用户查询。
/// 登录 / 注册成功后把令牌对写入注入的 TokenStore，再由会话层解析用户身份。

#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterCredentials {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// 当前登录用户。只在内存中存在，不落盘，由会话管理独占持有。
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
struct PrincipalDto {
    id: i64,
    email: String,
    date_joined: String,
}

impl From<PrincipalDto> for Principal {
    fn from(dto: PrincipalDto) -> Self {
        Principal {
            id: dto.id,
            email: dto.email,
            created_at: dto.date_joined,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenPairDto {
    access: String,
    refresh: String,
}

#[derive(Debug, Deserialize)]
struct RegisterResponseDto {
    #[allow(dead_code)]
    user: Option<PrincipalDto>,
    access: String,
    refresh: String,
}

/// 登录：换取令牌对并写入存储。服务端拒绝时错误消息原样上抛。
pub fn login(api: &ApiClient, credentials: &LoginCredentials) -> Result<(), ClientError> {
    let response = api.post_public("auth/token/", credentials)?;
    if !response.status().is_success() {
        return Err(read_auth_error(response));
    }
    let pair: TokenPairDto = response.json()?;
    api.tokens().set(&pair.access, &pair.refresh)?;
    Ok(())
}

/// 注册：创建账号，响应里直接携带令牌对。
pub fn register(api: &ApiClient, credentials: &RegisterCredentials) -> Result<(), ClientError> {
    let response = api.post_public("auth/register/", credentials)?;
    if !response.status().is_success() {
        return Err(read_auth_error(response));
    }
    let payload: RegisterResponseDto = response.json()?;
    api.tokens().set(&payload.access, &payload.refresh)?;
    Ok(())
}

/// 查询当前用户（"我是谁"）。经过请求管线，401 时可能触发透明刷新。
pub fn current_user(api: &ApiClient) -> Result<Principal, ClientError> {
    let url = api.endpoint("auth/me/")?;
    let response = api.send_authorized(|http, access| {
        Ok(http
            .get(url.clone())
            .bearer_auth(access)
            .header("Accept", "application/json"))
    })?;

    if response.status().as_u16() == 401 {
        return Err(ClientError::Unauthenticated);
    }
    if !response.status().is_success() {
        return Err(ClientError::operation(
            "fetching current user",
            format!("server returned HTTP {}", response.status()),
        ));
    }

    let dto: PrincipalDto = response.json()?;
    Ok(dto.into())
}

/// 提取服务端给出的拒绝原因：优先 detail 字段，其次字段级错误，
/// 最后退回原始报文，保证消息不被改写。
fn read_auth_error(response: Response) -> ClientError {
    let status = response.status();
    let raw = response.text().unwrap_or_default();

    let message = serde_json::from_str::<Value>(&raw)
        .ok()
        .and_then(|value| flatten_error_payload(&value))
        .unwrap_or_else(|| {
            if raw.trim().is_empty() {
                format!("authentication rejected with HTTP {status}")
            } else {
                raw.trim().to_string()
            }
        });

    ClientError::Authentication(message)
}

fn flatten_error_payload(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(flatten_error_payload).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        Value::Object(map) => {
            if let Some(detail) = map.get("detail").and_then(Value::as_str) {
                return Some(detail.to_string());
            }
            let parts: Vec<String> = map
                .iter()
                .filter_map(|(field, errors)| {
                    flatten_error_payload(errors).map(|msg| format!("{field}: {msg}"))
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_detail_field() {
        let value = json!({"detail": "No active account found"});
        assert_eq!(
            flatten_error_payload(&value).as_deref(),
            Some("No active account found")
        );
    }

    #[test]
    fn flattens_field_errors() {
        let value = json!({"email": ["user with this email already exists."]});
        assert_eq!(
            flatten_error_payload(&value).as_deref(),
            Some("email: user with this email already exists.")
        );
    }
}
