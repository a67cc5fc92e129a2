use std::path::PathBuf;
use std::sync::Mutex;

use crate::db;
use crate::error::ClientError;

/// 令牌存取接口。access / refresh 必须成对写入、成对清除，
/// 这里不对令牌内容做任何校验，只当作不透明字符串保存。
/// 抽成 trait 是为了让请求管线与会话管理都以注入方式拿到同一实例，
/// 单测可以直接换成内存实现。
pub trait TokenStore: Send + Sync {
    fn set(&self, access: &str, refresh: &str) -> Result<(), ClientError>;
    fn access(&self) -> Result<Option<String>, ClientError>;
    fn refresh(&self) -> Result<Option<String>, ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

/// 默认的 SQLite 实现，令牌跨进程重启保留。
pub struct SqliteTokenStore {
    db_path: PathBuf,
}

impl SqliteTokenStore {
    /// 使用平台默认的应用数据目录。
    pub fn new() -> Result<Self, ClientError> {
        let db_path = db::default_database_path().map_err(ClientError::Storage)?;
        Ok(SqliteTokenStore { db_path })
    }

    /// 指定数据库文件位置，测试用。
    pub fn at_path(db_path: PathBuf) -> Self {
        SqliteTokenStore { db_path }
    }

    fn load_row(&self) -> Result<Option<db::TokenRow>, ClientError> {
        let conn = db::open_connection(&self.db_path).map_err(ClientError::Storage)?;
        db::load_token_row(&conn).map_err(ClientError::Storage)
    }
}

impl TokenStore for SqliteTokenStore {
    fn set(&self, access: &str, refresh: &str) -> Result<(), ClientError> {
        let conn = db::open_connection(&self.db_path).map_err(ClientError::Storage)?;
        db::upsert_token_row(&conn, access, refresh).map_err(ClientError::Storage)
    }

    fn access(&self) -> Result<Option<String>, ClientError> {
        Ok(self.load_row()?.map(|row| row.access_token))
    }

    fn refresh(&self) -> Result<Option<String>, ClientError> {
        Ok(self.load_row()?.map(|row| row.refresh_token))
    }

    fn clear(&self) -> Result<(), ClientError> {
        let conn = db::open_connection(&self.db_path).map_err(ClientError::Storage)?;
        db::clear_token_row(&conn).map_err(ClientError::Storage)
    }
}

/// 纯内存实现：测试与一次性会话使用，进程退出即失效。
#[derive(Default)]
pub struct MemoryTokenStore {
    pair: Mutex<Option<(String, String)>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn set(&self, access: &str, refresh: &str) -> Result<(), ClientError> {
        let mut pair = self.pair.lock().unwrap_or_else(|p| p.into_inner());
        *pair = Some((access.to_string(), refresh.to_string()));
        Ok(())
    }

    fn access(&self) -> Result<Option<String>, ClientError> {
        let pair = self.pair.lock().unwrap_or_else(|p| p.into_inner());
        Ok(pair.as_ref().map(|(access, _)| access.clone()))
    }

    fn refresh(&self) -> Result<Option<String>, ClientError> {
        let pair = self.pair.lock().unwrap_or_else(|p| p.into_inner());
        Ok(pair.as_ref().map(|(_, refresh)| refresh.clone()))
    }

    fn clear(&self) -> Result<(), ClientError> {
        let mut pair = self.pair.lock().unwrap_or_else(|p| p.into_inner());
        *pair = None;
        Ok(())
    }
}
