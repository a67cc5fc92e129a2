//! FileBox 桌面客户端核心：带透明令牌刷新的请求管线、会话管理、
//! 文件资源取用与缓存，以及缩略图预取。
//! 展示层（窗口、路由、表单）不在本 crate 范围内。

pub mod api;
pub mod blob;
pub(crate) mod db;
pub mod error;
pub mod file_manager;
pub mod session;
pub mod thumbnails;
pub mod token_store;

pub use api::auth::{LoginCredentials, Principal, RegisterCredentials};
pub use api::files::{
    DownloadOutcome, ExpiresIn, FileRecord, Page, ShareLink, UploadRequest, PAGE_SIZE,
};
pub use api::ApiClient;
pub use blob::{BlobHandle, BlobStore, ScopedBlob};
pub use error::ClientError;
pub use file_manager::FileManager;
pub use session::{SessionManager, SessionState};
pub use thumbnails::{ClaimPolicy, ThumbnailPrefetcher};
pub use token_store::{MemoryTokenStore, SqliteTokenStore, TokenStore};
