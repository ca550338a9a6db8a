use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::frame::Frame;
use super::store::{CheckpointListener, PageHandle, PageStore};
use crate::primitives::concurrency::CheckpointLock;
use crate::primitives::io::{FileIo, StdFileIo};
use crate::types::page::{self, header, PageHeader};
use crate::types::{page_image_crc32, GroupId, PageFlag, PageId, PageListError, Result};

const MIN_PAGE_SIZE: u32 = 256;
const MAX_PAGE_SIZE: u32 = 64 * 1024;

/// Configuration for the file-backed page store.
#[derive(Clone, Debug)]
pub struct PagerOptions {
    /// Size of each page in bytes. Power of two between 256 and 65536.
    pub page_size: u32,
    /// Whether to verify page checksums when loading from disk.
    pub verify_checksums: bool,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            page_size: page::DEFAULT_PAGE_SIZE,
            verify_checksums: true,
        }
    }
}

impl PagerOptions {
    fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two()
            || self.page_size < MIN_PAGE_SIZE
            || self.page_size > MAX_PAGE_SIZE
        {
            return Err(PageListError::Invalid(
                "page size must be a power of two between 256 and 65536",
            ));
        }
        Ok(())
    }
}

/// Counters reported by [`Pager::stats`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct PagerStats {
    /// Page acquisitions served from resident frames.
    pub hits: u64,
    /// Page acquisitions that loaded from disk.
    pub misses: u64,
    /// Pages allocated.
    pub allocations: u64,
    /// Pages freed.
    pub frees: u64,
    /// Dirty pages written by checkpoints.
    pub dirty_writebacks: u64,
    /// Completed checkpoints.
    pub checkpoints: u64,
    /// Frames currently resident.
    pub resident_pages: u64,
}

impl fmt::Display for PagerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} allocations={} frees={} dirty_writebacks={} checkpoints={} resident={}",
            self.hits,
            self.misses,
            self.allocations,
            self.frees,
            self.dirty_writebacks,
            self.checkpoints,
            self.resident_pages
        )
    }
}

type PageKey = (GroupId, u64);

struct PartitionFile {
    io: Arc<StdFileIo>,
    next_index: u64,
}

#[derive(Default)]
struct PagerState {
    files: HashMap<(GroupId, u16), PartitionFile>,
    frames: HashMap<PageKey, Arc<Frame>>,
    freed: HashSet<PageKey>,
    pending_zero: Vec<PageKey>,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    allocations: AtomicU64,
    frees: AtomicU64,
    dirty_writebacks: AtomicU64,
    checkpoints: AtomicU64,
}

/// File-backed [`PageStore`].
///
/// Each `(group, partition)` pair lives in its own file under `dir`. Frames
/// stay resident until freed; dirty frames reach disk on [`Pager::checkpoint`].
pub struct Pager {
    dir: PathBuf,
    options: PagerOptions,
    state: Mutex<PagerState>,
    lock: CheckpointLock,
    listeners: Mutex<Vec<Weak<dyn CheckpointListener>>>,
    counters: Counters,
}

impl Pager {
    /// Opens a page store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>, options: PagerOptions) -> Result<Self> {
        options.validate()?;
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), page_size = options.page_size, "pager.open");
        Ok(Self {
            dir,
            options,
            state: Mutex::new(PagerState::default()),
            lock: CheckpointLock::new(),
            listeners: Mutex::new(Vec::new()),
            counters: Counters::default(),
        })
    }

    /// Directory holding the partition files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Options the store was opened with.
    pub fn options(&self) -> &PagerOptions {
        &self.options
    }

    fn partition_path(&self, group: GroupId, partition: u16) -> PathBuf {
        self.dir
            .join(format!("part-{}-{:04x}.pages", group.0, partition))
    }

    fn partition_file<'a>(
        &self,
        state: &'a mut PagerState,
        group: GroupId,
        partition: u16,
    ) -> Result<&'a mut PartitionFile> {
        if !state.files.contains_key(&(group, partition)) {
            let io = StdFileIo::open(self.partition_path(group, partition))?;
            let len = io.len()?;
            let page_size = u64::from(self.options.page_size);
            if len % page_size != 0 {
                warn!(
                    path = %io.path().display(),
                    group = group.0,
                    partition,
                    len,
                    "pager.partition_file.trailing_bytes"
                );
            }
            state.files.insert(
                (group, partition),
                PartitionFile {
                    io: Arc::new(io),
                    next_index: len / page_size,
                },
            );
        }
        state
            .files
            .get_mut(&(group, partition))
            .ok_or(PageListError::Invalid("partition file missing"))
    }

    fn page_offset(&self, id: PageId) -> u64 {
        u64::from(id.index()) * u64::from(self.options.page_size)
    }

    fn load_page(&self, file: &PartitionFile, id: PageId) -> Result<Box<[u8]>> {
        let mut buf = vec![0u8; self.options.page_size as usize].into_boxed_slice();
        file.io.read_at(self.page_offset(id), &mut buf)?;
        if self.options.verify_checksums && page::has_header(&buf) {
            let stored = PageHeader::decode(&buf)?.crc32;
            let expected = page_image_crc32(id.effective(), &buf);
            if stored != expected {
                warn!(page = %id, stored, expected, "pager.load_page.checksum_mismatch");
                return Err(PageListError::Corruption("page checksum mismatch"));
            }
        }
        Ok(buf)
    }

    /// Returns true if the page has been freed since the store was opened.
    pub fn is_freed(&self, group: GroupId, id: PageId) -> bool {
        self.state.lock().freed.contains(&(group, id.effective()))
    }

    /// Number of pages ever allocated in a partition, freed ones included.
    pub fn partition_len(&self, group: GroupId, partition: u16) -> Result<u64> {
        let mut state = self.state.lock();
        Ok(self.partition_file(&mut state, group, partition)?.next_index)
    }

    /// Persists every dirty page.
    ///
    /// Waits for in-flight operations, lets registered listeners persist their
    /// state, writes dirty frames with fresh checksums, zero-fills freed pages
    /// and syncs every partition file.
    pub fn checkpoint(&self) -> Result<()> {
        let _guard = self.lock.checkpoint();
        self.notify_listeners()?;

        let (dirty, zeroed, files) = {
            let mut state = self.state.lock();
            let dirty: Vec<Arc<Frame>> = state
                .frames
                .values()
                .filter(|frame| frame.is_dirty())
                .cloned()
                .collect();
            let zeroed = std::mem::take(&mut state.pending_zero);
            let files: HashMap<(GroupId, u16), Arc<StdFileIo>> = state
                .files
                .iter()
                .map(|(key, file)| (*key, Arc::clone(&file.io)))
                .collect();
            (dirty, zeroed, files)
        };

        let mut written = 0u64;
        for frame in &dirty {
            let io = files
                .get(&(frame.group, frame.id.partition()))
                .ok_or(PageListError::Invalid("partition file missing"))?;
            let mut buf = frame.buf.write();
            if !frame.take_dirty() {
                continue;
            }
            if page::has_header(&buf) {
                let crc = page_image_crc32(frame.id.effective(), &buf);
                buf[header::CRC32].copy_from_slice(&crc.to_be_bytes());
            }
            io.write_at(self.page_offset(frame.id), &buf)?;
            written += 1;
        }

        let zero = vec![0u8; self.options.page_size as usize];
        for (group, effective) in &zeroed {
            let id = PageId(*effective);
            if let Some(io) = files.get(&(*group, id.partition())) {
                io.write_at(self.page_offset(id), &zero)?;
            }
        }

        for io in files.values() {
            io.sync_all()?;
        }
        self.counters
            .dirty_writebacks
            .fetch_add(written, Ordering::Relaxed);
        self.counters.checkpoints.fetch_add(1, Ordering::Relaxed);
        info!(dirty = written, zeroed = zeroed.len(), "pager.checkpoint");
        Ok(())
    }

    fn notify_listeners(&self) -> Result<()> {
        let live: Vec<Arc<dyn CheckpointListener>> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|listener| listener.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in live {
            listener.on_checkpoint_begin()?;
        }
        Ok(())
    }

    /// Returns a snapshot of pager statistics.
    pub fn stats(&self) -> PagerStats {
        let resident_pages = self.state.lock().frames.len() as u64;
        PagerStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            allocations: self.counters.allocations.load(Ordering::Relaxed),
            frees: self.counters.frees.load(Ordering::Relaxed),
            dirty_writebacks: self.counters.dirty_writebacks.load(Ordering::Relaxed),
            checkpoints: self.counters.checkpoints.load(Ordering::Relaxed),
            resident_pages,
        }
    }
}

impl PageStore for Pager {
    fn page_size(&self) -> u32 {
        self.options.page_size
    }

    fn acquire_page(&self, group: GroupId, id: PageId) -> Result<PageHandle> {
        if id.is_none() || id.flag().is_none() {
            return Err(PageListError::Invalid("invalid page id"));
        }
        let key = (group, id.effective());
        let mut state = self.state.lock();
        if state.freed.contains(&key) {
            return Err(PageListError::NotFound);
        }
        if let Some(frame) = state.frames.get(&key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(PageHandle::new(id, Arc::clone(frame)));
        }
        let file = self.partition_file(&mut state, group, id.partition())?;
        if u64::from(id.index()) >= file.next_index {
            return Err(PageListError::NotFound);
        }
        let buf = self.load_page(file, id)?;
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let frame = Arc::new(Frame::new(group, id, buf, false));
        state.frames.insert(key, Arc::clone(&frame));
        Ok(PageHandle::new(id, frame))
    }

    fn allocate_page(&self, group: GroupId, partition: u16, flag: PageFlag) -> Result<PageId> {
        let mut state = self.state.lock();
        let file = self.partition_file(&mut state, group, partition)?;
        if file.next_index > u64::from(u32::MAX) {
            return Err(PageListError::OutOfSpace("partition page index exhausted"));
        }
        let index = file.next_index as u32;
        file.next_index += 1;
        let id = PageId::new(partition, flag, index);
        let buf = vec![0u8; self.options.page_size as usize].into_boxed_slice();
        state
            .frames
            .insert((group, id.effective()), Arc::new(Frame::new(group, id, buf, true)));
        self.counters.allocations.fetch_add(1, Ordering::Relaxed);
        debug!(group = group.0, page = %id, "pager.allocate_page");
        Ok(id)
    }

    fn free_page(&self, group: GroupId, id: PageId) -> Result<()> {
        if id.is_none() {
            return Err(PageListError::Invalid("invalid page id"));
        }
        let key = (group, id.effective());
        let mut state = self.state.lock();
        if state.freed.contains(&key) {
            return Err(PageListError::NotFound);
        }
        if let Some(frame) = state.frames.get(&key) {
            if frame.pin_count() > 0 {
                return Err(PageListError::Invalid("page is pinned"));
            }
        } else {
            let file = self.partition_file(&mut state, group, id.partition())?;
            if u64::from(id.index()) >= file.next_index {
                return Err(PageListError::NotFound);
            }
        }
        state.frames.remove(&key);
        state.freed.insert(key);
        state.pending_zero.push(key);
        self.counters.frees.fetch_add(1, Ordering::Relaxed);
        debug!(group = group.0, page = %id, "pager.free_page");
        Ok(())
    }

    fn checkpoint_lock(&self) -> &CheckpointLock {
        &self.lock
    }

    fn register_checkpoint_listener(&self, listener: Weak<dyn CheckpointListener>) {
        self.listeners.lock().push(listener);
    }
}
