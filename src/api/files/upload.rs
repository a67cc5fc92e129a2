use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};

use super::models::FileRecord;
use crate::api::client::ApiClient;
use crate::error::ClientError;

/// 上传大小上限，超过的文件在本地直接拒绝，不发起网络请求。
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// 允许上传的 MIME 类型白名单，与服务端校验保持一致。
pub const ALLOWED_UPLOAD_MIME_TYPES: [&str; 6] = [
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
];

/// 上传请求体较大，超时放宽到 120 秒。
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// 整数百分比进度回调（0–100，单调不减）。
pub type ProgressCallback = Box<dyn FnMut(u32) + Send>;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// 上传文件。本地校验（大小、类型）失败时同步返回 Validation 错误，
/// 此时既没有网络请求也没有任何进度回调。
/// 进度闸门在重试之间共享：401 触发重放时百分比不会回退。
pub fn upload_file(
    api: &ApiClient,
    request: UploadRequest,
    on_progress: Option<ProgressCallback>,
) -> Result<FileRecord, ClientError> {
    if request.file_name.trim().is_empty() {
        return Err(ClientError::Validation("file name cannot be empty".into()));
    }
    if request.bytes.len() as u64 > MAX_UPLOAD_BYTES {
        return Err(ClientError::Validation(format!(
            "file exceeds the {} MiB upload limit",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    if !ALLOWED_UPLOAD_MIME_TYPES.contains(&request.mime_type.as_str()) {
        return Err(ClientError::Validation(format!(
            "file type {} is not allowed",
            request.mime_type
        )));
    }

    let reporter = on_progress.map(|cb| {
        Arc::new(Mutex::new(MonotonicProgress {
            callback: cb,
            last: None,
        }))
    });

    let url = api.endpoint("files/upload/")?;
    let UploadRequest {
        file_name,
        mime_type,
        bytes,
    } = request;
    let total = bytes.len() as u64;

    let response = api.send_authorized(|http, access| {
        let reader = ProgressReader::new(Cursor::new(bytes.clone()), total, reporter.clone());
        let part = Part::reader_with_length(reader, total)
            .file_name(file_name.clone())
            .mime_str(&mime_type)?;
        let form = Form::new().part("file", part);
        Ok(http
            .post(url.clone())
            .bearer_auth(access)
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT))
    })?;

    if response.status().as_u16() == 401 {
        return Err(ClientError::Unauthenticated);
    }
    if !response.status().is_success() {
        return Err(ClientError::operation(
            "uploading file",
            format!("server returned HTTP {}", response.status()),
        ));
    }

    // 与读取进度解耦地补一个终值，确保回调序列以 100 收尾。
    if let Some(reporter) = reporter.as_ref() {
        let mut guard = reporter.lock().unwrap_or_else(|p| p.into_inner());
        guard.emit(100);
    }

    let record: FileRecord = response.json()?;
    Ok(record)
}

struct MonotonicProgress {
    callback: ProgressCallback,
    last: Option<u32>,
}

impl MonotonicProgress {
    /// 只向前推进：重复或回退的百分比被丢弃。
    fn emit(&mut self, percent: u32) {
        let percent = percent.min(100);
        if self.last.map_or(true, |last| percent > last) {
            self.last = Some(percent);
            (self.callback)(percent);
        }
    }
}

/// 包装请求体、按已发送字节换算整数百分比的 Reader。
struct ProgressReader<R: Read> {
    inner: R,
    sent: u64,
    total: u64,
    reporter: Option<Arc<Mutex<MonotonicProgress>>>,
}

impl<R: Read> ProgressReader<R> {
    fn new(inner: R, total: u64, reporter: Option<Arc<Mutex<MonotonicProgress>>>) -> Self {
        Self {
            inner,
            sent: 0,
            total,
            reporter,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read_bytes = self.inner.read(buf)?;
        if read_bytes > 0 {
            self.sent = self.sent.saturating_add(read_bytes as u64);
            if let Some(reporter) = self.reporter.as_ref() {
                let percent = if self.total == 0 {
                    100
                } else {
                    ((self.sent * 100) / self.total).min(100) as u32
                };
                let mut guard = reporter.lock().unwrap_or_else(|p| p.into_inner());
                guard.emit(percent);
            }
        }
        Ok(read_bytes)
    }
}
