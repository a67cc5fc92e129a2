use thiserror::Error;

/// 客户端统一错误类型。网络层、本地校验与会话过期各自独立成枚举分支，
/// 便于上层按类别提示用户或跳转登录页。
#[derive(Debug, Error)]
pub enum ClientError {
    /// 本地校验失败（例如上传文件过大或类型不被允许），未发起任何网络请求。
    #[error("{0}")]
    Validation(String),

    /// 登录 / 注册被服务端拒绝，消息原样来自服务端。
    #[error("{0}")]
    Authentication(String),

    /// 会话已失效：access token 缺失，或 401 后刷新失败。
    /// 这是唯一会触发全局副作用（回到登录页）的错误。
    #[error("session expired; please sign in again")]
    Unauthenticated,

    /// 连接 / 传输层失败，与鉴权无关，由上层决定是否重试。
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// 鉴权之后的业务操作失败（列表、上传、删除、分享、下载）。
    #[error("{action} failed: {message}")]
    Operation {
        action: &'static str,
        message: String,
    },

    /// 本地 SQLite 持久化失败。
    #[error("local storage error: {0}")]
    Storage(String),
}

impl ClientError {
    pub(crate) fn operation(action: &'static str, message: impl Into<String>) -> Self {
        ClientError::Operation {
            action,
            message: message.into(),
        }
    }

    /// 是否属于必须重新登录的终态错误。
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, ClientError::Unauthenticated)
    }
}
