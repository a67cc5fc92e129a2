use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

/// 进程内二进制内容的注册表。拉取到的文件字节挂在这里，
/// 以 blob URL 的形式交给展示层引用。
///
/// 句柄是独占资源：谁创建谁负责释放，释放后条目即回收。
/// `live_handles` 暴露在册数量，用来在测试里断言没有句柄泄漏。
#[derive(Clone, Default)]
pub struct BlobStore {
    entries: Arc<Mutex<HashMap<Uuid, BlobEntry>>>,
}

// MIME 类型挂在句柄上随句柄流转，注册表只保管字节。
struct BlobEntry {
    bytes: Arc<Vec<u8>>,
}

/// 指向一段已拉取二进制内容的句柄。不可克隆，释放必须显式进行
/// （或交给 ScopedBlob 随作用域释放）。
#[derive(Debug)]
pub struct BlobHandle {
    id: Uuid,
    url: String,
    mime_type: String,
    size_bytes: u64,
}

impl BlobHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一段内容并发放句柄。
    pub fn create(&self, bytes: Vec<u8>, mime_type: &str) -> BlobHandle {
        let id = Uuid::new_v4();
        let size_bytes = bytes.len() as u64;
        let mut entries = self.lock_entries();
        entries.insert(
            id,
            BlobEntry {
                bytes: Arc::new(bytes),
            },
        );
        BlobHandle {
            id,
            url: format!("blob:{id}"),
            mime_type: mime_type.to_string(),
            size_bytes,
        }
    }

    /// 解引用句柄对应的内容。句柄已被释放时返回 None。
    pub fn read(&self, handle: &BlobHandle) -> Option<Arc<Vec<u8>>> {
        let entries = self.lock_entries();
        entries.get(&handle.id).map(|entry| Arc::clone(&entry.bytes))
    }

    /// 按 blob URL 解引用，给只拿得到 URL 的展示层用。
    pub fn read_url(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        let id = url.strip_prefix("blob:")?.parse::<Uuid>().ok()?;
        let entries = self.lock_entries();
        entries.get(&id).map(|entry| Arc::clone(&entry.bytes))
    }

    /// 释放句柄，消费所有权，保证释放后无法再被引用。
    pub fn release(&self, handle: BlobHandle) {
        let mut entries = self.lock_entries();
        if entries.remove(&handle.id).is_none() {
            log::warn!("[blob] released handle {} twice", handle.id);
        }
    }

    /// 当前在册的句柄数量。
    pub fn live_handles(&self) -> usize {
        self.lock_entries().len()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<Uuid, BlobEntry>> {
        self.entries.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

/// 随作用域释放的句柄包装：提前返回、错误路径、被新内容替换，
/// 任何一条退出路径都会把底层句柄归还给 BlobStore。
pub struct ScopedBlob {
    store: BlobStore,
    handle: Option<BlobHandle>,
}

impl ScopedBlob {
    pub fn new(store: BlobStore, handle: BlobHandle) -> Self {
        ScopedBlob {
            store,
            handle: Some(handle),
        }
    }

    pub fn handle(&self) -> &BlobHandle {
        self.handle
            .as_ref()
            .expect("handle present until dropped")
    }

    pub fn bytes(&self) -> Option<Arc<Vec<u8>>> {
        self.store.read(self.handle())
    }
}

impl Drop for ScopedBlob {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.store.release(handle);
        }
    }
}
