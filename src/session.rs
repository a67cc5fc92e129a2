use std::sync::{Arc, Mutex};

use crate::api::auth::{self, LoginCredentials, Principal, RegisterCredentials};
use crate::api::ApiClient;
use crate::error::ClientError;

/// 会话生命周期状态机。Unknown 只在启动探测完成前出现。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Unauthenticated,
    Authenticating,
    Authenticated,
}

struct SessionInner {
    state: SessionState,
    principal: Option<Principal>,
}

/// 当前用户状态的唯一持有者。启动时从持久化令牌恢复，
/// 暴露登录 / 注册 / 登出，并订阅请求管线的会话过期广播。
///
/// 不变量：`is_authenticated()` 当且仅当持有 Principal；
/// 状态为 Authenticated 与 Principal 是否存在永远一致。
pub struct SessionManager {
    api: Arc<ApiClient>,
    inner: Arc<Mutex<SessionInner>>,
}

impl SessionManager {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let inner = Arc::new(Mutex::new(SessionInner {
            state: SessionState::Unknown,
            principal: None,
        }));

        // 任何请求的刷新流程彻底失败时，这里被动回到未登录态。
        let hook_inner = Arc::clone(&inner);
        api.on_session_expired(Box::new(move || {
            log::warn!("[session] token refresh failed, dropping to unauthenticated");
            let mut guard = hook_inner.lock().unwrap_or_else(|p| p.into_inner());
            guard.state = SessionState::Unauthenticated;
            guard.principal = None;
        }));

        SessionManager { api, inner }
    }

    /// 启动探测：存在持久化令牌则尝试解析当前用户（管线可能透明刷新）。
    /// 解析失败清空令牌回到未登录态，失败原因只记日志不上抛。
    pub fn initialize(&self) -> Result<SessionState, ClientError> {
        if self.api.tokens().access()?.is_none() {
            self.transition(SessionState::Unauthenticated, None);
            return Ok(SessionState::Unauthenticated);
        }

        match auth::current_user(&self.api) {
            Ok(principal) => {
                self.transition(SessionState::Authenticated, Some(principal));
                Ok(SessionState::Authenticated)
            }
            Err(err) => {
                log::warn!("[session] startup auth check failed: {err}");
                if let Err(clear_err) = self.api.tokens().clear() {
                    log::warn!("[session] failed to clear tokens: {clear_err}");
                }
                self.transition(SessionState::Unauthenticated, None);
                Ok(SessionState::Unauthenticated)
            }
        }
    }

    /// 登录并解析用户身份。任何一步失败都回到未登录态，错误原样上抛。
    pub fn login(&self, credentials: &LoginCredentials) -> Result<Principal, ClientError> {
        self.transition(SessionState::Authenticating, None);
        if let Err(err) = auth::login(&self.api, credentials) {
            self.transition(SessionState::Unauthenticated, None);
            return Err(err);
        }
        self.resolve_principal()
    }

    /// 注册新账号，其余流程与登录一致。
    pub fn register(&self, credentials: &RegisterCredentials) -> Result<Principal, ClientError> {
        self.transition(SessionState::Authenticating, None);
        if let Err(err) = auth::register(&self.api, credentials) {
            self.transition(SessionState::Unauthenticated, None);
            return Err(err);
        }
        self.resolve_principal()
    }

    fn resolve_principal(&self) -> Result<Principal, ClientError> {
        match auth::current_user(&self.api) {
            Ok(principal) => {
                self.transition(SessionState::Authenticated, Some(principal.clone()));
                Ok(principal)
            }
            Err(err) => {
                self.transition(SessionState::Unauthenticated, None);
                Err(err)
            }
        }
    }

    /// 本地登出：同步清空令牌与用户身份，不要求网络往返。
    pub fn logout(&self) -> Result<(), ClientError> {
        self.transition(SessionState::Unauthenticated, None);
        self.api.tokens().clear()
    }

    pub fn state(&self) -> SessionState {
        let guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        guard.state
    }

    pub fn current_user(&self) -> Option<Principal> {
        let guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        guard.principal.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        let guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        guard.principal.is_some()
    }

    fn transition(&self, state: SessionState, principal: Option<Principal>) {
        debug_assert_eq!(
            state == SessionState::Authenticated,
            principal.is_some(),
            "authenticated state and principal presence must agree"
        );
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        guard.state = state;
        guard.principal = principal;
    }
}
