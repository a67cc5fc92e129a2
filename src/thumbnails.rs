use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::files::{fetch_file_blob, BinaryVariant, FileRecord, Page};
use crate::api::ApiClient;
use crate::blob::{BlobHandle, BlobStore};
use crate::error::ClientError;

/// 预取失败后认领标记的处理策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimPolicy {
    /// 失败也保留认领（原始行为）：本次会话内不再重试该文件，
    /// 避免坏资源反复打到服务端。
    #[default]
    KeepOnFailure,
    /// 失败即释放认领，后续 sync 可以再次尝试。
    ReleaseOnFailure,
}

/// 缩略图预取器：跟随当前展示的文件列表，为图片类记录拉取 preview，
/// 并把 blob 句柄按文件 id 缓存。
///
/// 认领集合（claimed）在发起请求之前同步写入，保证同一资源
/// 永远不会有第二个在途请求；对同一份列表快照重复 sync 是无操作。
/// 缓存条目在会话内不主动淘汰，数量受当前页大小约束。
pub struct ThumbnailPrefetcher {
    api: Arc<ApiClient>,
    blobs: BlobStore,
    cache: Mutex<HashMap<String, BlobHandle>>,
    claimed: Mutex<HashSet<String>>,
    policy: ClaimPolicy,
}

impl ThumbnailPrefetcher {
    pub fn new(api: Arc<ApiClient>, blobs: BlobStore) -> Self {
        Self::with_policy(api, blobs, ClaimPolicy::default())
    }

    pub fn with_policy(api: Arc<ApiClient>, blobs: BlobStore, policy: ClaimPolicy) -> Self {
        ThumbnailPrefetcher {
            api,
            blobs,
            cache: Mutex::new(HashMap::new()),
            claimed: Mutex::new(HashSet::new()),
            policy,
        }
    }

    /// 对一页列表快照做一轮预取。逐条处理：
    /// 非图片跳过，已缓存或已认领跳过，其余先认领再拉取。
    /// 单条失败只记日志，不中断整轮。
    pub fn sync(&self, page: &Page<FileRecord>) {
        for record in &page.items {
            if !record.is_image() {
                continue;
            }
            if !self.claim(&record.id) {
                continue;
            }

            match self.fetch_into_cache(record) {
                Ok(()) => {}
                Err(err) => {
                    log::warn!("[thumbs] preview fetch failed for {}: {err}", record.id);
                    if self.policy == ClaimPolicy::ReleaseOnFailure {
                        self.lock_claimed().remove(&record.id);
                    }
                }
            }
        }
    }

    /// 认领一个文件 id。返回 false 表示已被缓存或已有在途 / 历史认领。
    fn claim(&self, file_id: &str) -> bool {
        {
            let cache = self.lock_cache();
            if cache.contains_key(file_id) {
                return false;
            }
        }
        let mut claimed = self.lock_claimed();
        claimed.insert(file_id.to_string())
    }

    fn fetch_into_cache(&self, record: &FileRecord) -> Result<(), ClientError> {
        let (bytes, content_type) =
            fetch_file_blob(&self.api, &record.id, BinaryVariant::Preview)?;
        let handle = self.blobs.create(bytes, &content_type);
        let mut cache = self.lock_cache();
        if let Some(previous) = cache.insert(record.id.clone(), handle) {
            // 认领机制下不应出现，兜底释放以免泄漏。
            self.blobs.release(previous);
        }
        Ok(())
    }

    /// 查询某个文件的缩略图 blob URL。
    pub fn thumbnail_url(&self, file_id: &str) -> Option<String> {
        let cache = self.lock_cache();
        cache.get(file_id).map(|handle| handle.url().to_string())
    }

    /// 当前缓存的缩略图数量。
    pub fn cached_count(&self) -> usize {
        self.lock_cache().len()
    }

    /// 列表身份变化或会话结束时调用：释放所有句柄并重置认领集合。
    pub fn clear(&self) {
        let mut cache = self.lock_cache();
        for (_, handle) in cache.drain() {
            self.blobs.release(handle);
        }
        drop(cache);
        self.lock_claimed().clear();
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, BlobHandle>> {
        self.cache.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    fn lock_claimed(&self) -> MutexGuard<'_, HashSet<String>> {
        self.claimed
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}
