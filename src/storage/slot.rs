//! The single reusable cache slot
//!
//! Exactly one slot exists, so every acquisition overwrites the previously
//! cached media instead of growing the cache. The acquisition pipeline owns
//! the slot through at most one open [`SlotWriter`] at a time.

use crate::config::AcquisitionConfig;
use crate::types::PlayableReference;
use crate::utils::get_available_space;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Destination storage for one acquisition at a time
#[async_trait::async_trait]
pub trait CacheSlot: Send + Sync {
    /// Make sure byte-addressable storage exists and is writable
    async fn ensure_available(&self) -> io::Result<()>;

    /// Bytes that could still be written, when the host can tell
    async fn available_space(&self) -> Option<u64>;

    /// Open the slot for writing at offset 0, discarding previous content
    async fn open_writer(&self) -> io::Result<Box<dyn SlotWriter>>;

    /// Readable reference to the completed content
    async fn playable(&self, mime_type: &str) -> io::Result<PlayableReference>;

    /// Discard the cached content
    async fn clear(&self) -> io::Result<()>;

    /// Bytes currently held by the slot
    async fn cached_bytes(&self) -> u64;
}

/// Sequential writer over the cache slot
#[async_trait::async_trait]
pub trait SlotWriter: Send {
    /// Append one chunk
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Flush and close; later calls are no-ops
    async fn close(&mut self) -> io::Result<()>;
}

/// Cache slot backed by one file on disk
#[derive(Debug, Clone)]
pub struct FileCacheSlot {
    dir: PathBuf,
    path: PathBuf,
}

impl FileCacheSlot {
    /// Slot at `config.cache_dir / config.slot_file_name`
    pub fn new(config: &AcquisitionConfig) -> Self {
        Self {
            dir: config.cache_dir.clone(),
            path: config.slot_path(),
        }
    }

    /// Location of the slot file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl CacheSlot for FileCacheSlot {
    async fn ensure_available(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let metadata = tokio::fs::metadata(&self.dir).await?;
        if metadata.permissions().readonly() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("cache directory {} is read-only", self.dir.display()),
            ));
        }
        Ok(())
    }

    async fn available_space(&self) -> Option<u64> {
        match get_available_space(&self.dir) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!(dir = %self.dir.display(), error = %e, "could not query free space");
                None
            }
        }
    }

    async fn open_writer(&self) -> io::Result<Box<dyn SlotWriter>> {
        let file = tokio::fs::File::create(&self.path).await?;
        Ok(Box::new(FileSlotWriter { file: Some(file) }))
    }

    async fn playable(&self, mime_type: &str) -> io::Result<PlayableReference> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        Ok(PlayableReference {
            path: self.path.clone(),
            length: metadata.len(),
            mime_type: mime_type.to_string(),
        })
    }

    async fn clear(&self) -> io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn cached_bytes(&self) -> u64 {
        tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

struct FileSlotWriter {
    file: Option<tokio::fs::File>,
}

#[async_trait::async_trait]
impl SlotWriter for FileSlotWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(chunk).await,
            None => Err(io::Error::other("cache slot writer already closed")),
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }
}

/// Cache slot held in process memory
///
/// An optional capacity models a host storage quota: a write that would grow
/// the slot past it fails with [`io::ErrorKind::StorageFull`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheSlot {
    bytes: Arc<Mutex<Vec<u8>>>,
    capacity: Option<u64>,
}

/// Path reported for content held by a [`MemoryCacheSlot`]
pub const MEMORY_SLOT_PATH: &str = "memory://current_video";

impl MemoryCacheSlot {
    /// Unbounded slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot that rejects writes beyond `capacity` bytes
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            bytes: Arc::default(),
            capacity: Some(capacity),
        }
    }

    /// Copy of the cached bytes
    pub async fn contents(&self) -> Vec<u8> {
        self.bytes.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl CacheSlot for MemoryCacheSlot {
    async fn ensure_available(&self) -> io::Result<()> {
        Ok(())
    }

    async fn available_space(&self) -> Option<u64> {
        let used = self.bytes.lock().await.len() as u64;
        self.capacity.map(|cap| cap.saturating_sub(used))
    }

    async fn open_writer(&self) -> io::Result<Box<dyn SlotWriter>> {
        self.bytes.lock().await.clear();
        Ok(Box::new(MemorySlotWriter {
            bytes: self.bytes.clone(),
            capacity: self.capacity,
            closed: false,
        }))
    }

    async fn playable(&self, mime_type: &str) -> io::Result<PlayableReference> {
        Ok(PlayableReference {
            path: PathBuf::from(MEMORY_SLOT_PATH),
            length: self.bytes.lock().await.len() as u64,
            mime_type: mime_type.to_string(),
        })
    }

    async fn clear(&self) -> io::Result<()> {
        let mut bytes = self.bytes.lock().await;
        bytes.clear();
        bytes.shrink_to_fit();
        Ok(())
    }

    async fn cached_bytes(&self) -> u64 {
        self.bytes.lock().await.len() as u64
    }
}

struct MemorySlotWriter {
    bytes: Arc<Mutex<Vec<u8>>>,
    capacity: Option<u64>,
    closed: bool,
}

#[async_trait::async_trait]
impl SlotWriter for MemorySlotWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::other("cache slot writer already closed"));
        }
        let mut bytes = self.bytes.lock().await;
        if let Some(cap) = self.capacity
            && bytes.len() as u64 + chunk.len() as u64 > cap
        {
            return Err(io::Error::new(
                io::ErrorKind::StorageFull,
                format!("memory slot capacity of {} bytes exceeded", cap),
            ));
        }
        bytes.extend_from_slice(chunk);
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}
