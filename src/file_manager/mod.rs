use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use crate::api::files::{
    self, BinaryVariant, DownloadOutcome, ExpiresIn, FileRecord, Page, ProgressCallback,
    ShareLink, UploadRequest,
};
use crate::api::ApiClient;
use crate::blob::{BlobStore, ScopedBlob};
use crate::error::ClientError;

/// 文件资源的取用与缓存层：分页列表缓存、上传 / 删除后的缓存失效、
/// 带进度的上传、落盘下载与内联预览。所有网络操作都走请求管线。
///
/// 列表缓存按页号保存，任何写操作（上传、删除）之后整体失效，
/// 靠失效而不是操作排序来消除并发读写之间的陈旧数据。
pub struct FileManager {
    api: Arc<ApiClient>,
    blobs: BlobStore,
    listing_cache: Mutex<HashMap<u32, Page<FileRecord>>>,
}

impl FileManager {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self::with_blob_store(api, BlobStore::new())
    }

    /// 与缩略图预取器共享同一个 BlobStore 时使用。
    pub fn with_blob_store(api: Arc<ApiClient>, blobs: BlobStore) -> Self {
        FileManager {
            api,
            blobs,
            listing_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// 拉取指定页的文件列表，命中缓存时不发网络请求。
    pub fn list_files(&self, page: u32) -> Result<Page<FileRecord>, ClientError> {
        {
            let cache = self.lock_cache();
            if let Some(cached) = cache.get(&page) {
                return Ok(cached.clone());
            }
        }

        let fetched = files::list_files(&self.api, page)?;
        let mut cache = self.lock_cache();
        cache.insert(page, fetched.clone());
        Ok(fetched)
    }

    /// 上传文件，成功后使列表缓存失效，下一次 list_files 必然重新拉取。
    pub fn upload_file(
        &self,
        request: UploadRequest,
        on_progress: Option<ProgressCallback>,
    ) -> Result<FileRecord, ClientError> {
        let record = files::upload_file(&self.api, request, on_progress)?;
        self.invalidate_listings();
        Ok(record)
    }

    /// 删除文件并使列表缓存失效。
    pub fn delete_file(&self, file_id: &str) -> Result<(), ClientError> {
        files::delete_file(&self.api, file_id)?;
        self.invalidate_listings();
        Ok(())
    }

    /// 创建限时分享链接。不经过缓存，重复调用可能返回不同链接。
    pub fn create_share_link(
        &self,
        file_id: &str,
        expires_in: ExpiresIn,
    ) -> Result<ShareLink, ClientError> {
        files::create_share_link(&self.api, file_id, expires_in)
    }

    /// 下载文件到目标目录。整个调用只产生一个 blob 句柄，
    /// 落盘发起后立即释放，任何失败路径也不会让句柄存活到调用之外。
    pub fn download_file(
        &self,
        file_id: &str,
        suggested_name: &str,
        target_dir: &str,
        overwrite: bool,
    ) -> Result<DownloadOutcome, ClientError> {
        let (bytes, content_type) =
            files::fetch_file_blob(&self.api, file_id, BinaryVariant::Download)?;

        let scoped = ScopedBlob::new(
            self.blobs.clone(),
            self.blobs.create(bytes, &content_type),
        );

        let file_name = files::sanitize_file_name(suggested_name);
        let destination = files::prepare_destination(target_dir, &file_name, overwrite)?;

        let content = scoped
            .bytes()
            .ok_or_else(|| ClientError::operation("saving download", "blob released early".to_string()))?;
        fs::write(&destination, content.as_slice()).map_err(|e| {
            ClientError::operation(
                "saving download",
                format!("{}: {e}", destination.to_string_lossy()),
            )
        })?;

        let bytes_written = content.len() as u64;
        drop(scoped);
        log::debug!(
            "[files] saved {} bytes to {}",
            bytes_written,
            destination.to_string_lossy()
        );

        Ok(DownloadOutcome {
            file_name,
            saved_path: destination.to_string_lossy().into_owned(),
            bytes_written,
        })
    }

    /// 拉取原图用于内联展示。返回的 ScopedBlob 归调用方所有，
    /// 展示视图关闭或被替换时随作用域释放。
    pub fn view_file(&self, file_id: &str) -> Result<ScopedBlob, ClientError> {
        let (bytes, content_type) =
            files::fetch_file_blob(&self.api, file_id, BinaryVariant::View)?;
        let handle = self.blobs.create(bytes, &content_type);
        Ok(ScopedBlob::new(self.blobs.clone(), handle))
    }

    /// 清空分页缓存。
    pub fn invalidate_listings(&self) {
        let mut cache = self.lock_cache();
        if !cache.is_empty() {
            log::debug!("[files] invalidating {} cached listing page(s)", cache.len());
        }
        cache.clear();
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<u32, Page<FileRecord>>> {
        self.listing_cache
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}
