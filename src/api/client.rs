use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;
use crate::token_store::TokenStore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 所有对远端 API 的请求都经过这里：统一挂 Bearer 令牌，
/// 收到 401 时走一次"刷新并重放"流程，刷新失败则清空会话。
/// TokenStore 以注入方式持有，避免模块级单例，方便用假实现做单测。
pub struct ApiClient {
    http: Client,
    base_url: Url,
    tokens: Arc<dyn TokenStore>,
    /// 刷新闸门：并发 401 在此串行化，同一代 access token 最多触发一次远端刷新。
    refresh_gate: Mutex<()>,
    expired_hooks: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    /// 服务端开启轮换时会一并下发新的 refresh token。
    refresh: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, tokens: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ClientError::operation("parsing base url", e.to_string()))?;
        // join() 以 '/' 结尾的 base 为基准拼接相对路径。
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(Policy::limited(10))
            .build()?;

        Ok(ApiClient {
            http,
            base_url,
            tokens,
            refresh_gate: Mutex::new(()),
            expired_hooks: Mutex::new(Vec::new()),
        })
    }

    /// 注入的令牌存储，会话管理与登录流程共享同一实例。
    pub fn tokens(&self) -> Arc<dyn TokenStore> {
        Arc::clone(&self.tokens)
    }

    /// 拼接相对路径（不带前导 '/'），如 "files/" 或 "auth/me/"。
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::operation("building request url", e.to_string()))
    }

    /// 认证端点专用：不挂 Bearer，也不参与 401 刷新重试，
    /// 否则刷新失败会递归触发自身。
    pub(crate) fn post_public<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, ClientError> {
        let url = self.endpoint(path)?;
        Ok(self.http.post(url).json(body).send()?)
    }

    /// 鉴权请求的统一入口。build 闭包在给定 access token 的前提下构造请求，
    /// 重试时会用新令牌重新构造一次，而不是改动已发出的请求。
    ///
    /// 重试次数用显式计数控制：同一请求最多重放一次，第二个 401 原样返回，
    /// 不会再次触发刷新。没有 access token 时直接报未登录，不发网络请求。
    pub(crate) fn send_authorized<F>(&self, build: F) -> Result<Response, ClientError>
    where
        F: Fn(&Client, &str) -> Result<RequestBuilder, ClientError>,
    {
        let mut access = self.tokens.access()?.ok_or(ClientError::Unauthenticated)?;

        for attempt in 0..2u8 {
            let response = build(&self.http, &access)?.send()?;
            if response.status().as_u16() != 401 || attempt == 1 {
                return Ok(response);
            }
            log::debug!("[pipeline] got 401, attempting token refresh");
            access = self.refresh_access(&access)?;
        }
        unreachable!("authorized send loops at most twice");
    }

    /// 刷新 access token，stale_access 是触发 401 的那次请求所挂的令牌。
    ///
    /// 进入闸门后先对比存储中的令牌：如果已经与 stale 不同，
    /// 说明并发的另一个请求刚刚完成刷新，直接复用即可（single-flight）。
    /// 真正的刷新失败会清空两个令牌并广播会话过期，调用方只会看到
    /// Unauthenticated，不会看到刷新请求本身的错误。
    fn refresh_access(&self, stale_access: &str) -> Result<String, ClientError> {
        let _flight = self
            .refresh_gate
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        if let Some(current) = self.tokens.access()? {
            if current != stale_access {
                log::debug!("[pipeline] token already refreshed by a concurrent request");
                return Ok(current);
            }
        }

        let Some(refresh) = self.tokens.refresh()? else {
            // 没有 refresh token 就没有可尝试的刷新，立刻以未登录失败。
            return Err(ClientError::Unauthenticated);
        };

        match self.exchange_refresh_token(&refresh) {
            Ok((access, rotated)) => {
                let refresh = rotated.unwrap_or(refresh);
                self.tokens.set(&access, &refresh)?;
                log::debug!("[pipeline] access token refreshed");
                Ok(access)
            }
            Err(err) => {
                log::warn!("[pipeline] token refresh failed, terminating session: {err}");
                if let Err(clear_err) = self.tokens.clear() {
                    log::warn!("[pipeline] failed to clear tokens: {clear_err}");
                }
                self.notify_session_expired();
                Err(ClientError::Unauthenticated)
            }
        }
    }

    fn exchange_refresh_token(
        &self,
        refresh: &str,
    ) -> Result<(String, Option<String>), ClientError> {
        let response = self.post_public("auth/token/refresh/", &RefreshRequest { refresh })?;
        if !response.status().is_success() {
            return Err(ClientError::operation(
                "refreshing access token",
                format!("token endpoint returned HTTP {}", response.status()),
            ));
        }
        let payload: RefreshResponse = response.json()?;
        Ok((payload.access, payload.refresh))
    }

    /// 注册会话过期回调；刷新彻底失败时逐一触发，由会话层回到未登录态。
    pub fn on_session_expired(&self, hook: Box<dyn Fn() + Send + Sync>) {
        let mut hooks = self
            .expired_hooks
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        hooks.push(hook);
    }

    fn notify_session_expired(&self) {
        let hooks = self
            .expired_hooks
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        for hook in hooks.iter() {
            hook();
        }
    }
}
