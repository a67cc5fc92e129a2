use serde::Deserialize;

/// 与服务端约定的固定分页大小。
pub const PAGE_SIZE: u64 = 10;

/// 服务端文件记录。除了被删除之外，客户端视角下不可变。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub created_at: String,
}

impl FileRecord {
    /// 是否适合做缩略图预取。
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// 分页结果。items 顺序由服务端决定（通常按创建时间倒序）。
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub total_count: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// 按固定页大小推算总页数。
    pub fn page_count(&self) -> u64 {
        self.total_count.div_ceil(PAGE_SIZE)
    }
}

/// 分享链接。不做客户端缓存，每次请求都可能得到新的链接。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShareLink {
    pub url: String,
    pub expires_at: String,
}

/// 分享有效期的封闭枚举，与服务端取值一一对应。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiresIn {
    OneHour,
    OneDay,
    SevenDays,
}

impl ExpiresIn {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            ExpiresIn::OneHour => "1h",
            ExpiresIn::OneDay => "24h",
            ExpiresIn::SevenDays => "7d",
        }
    }
}

/// 下载落盘后的结果描述，便于上层提示保存位置与大小。
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub file_name: String,
    pub saved_path: String,
    pub bytes_written: u64,
}
