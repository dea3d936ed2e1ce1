use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use memmap2::Mmap;
use simlink_core::{
    link::{Link, TransportError},
    message::Message,
};

use crate::{
    error::{ProtocolError, SharedMemoryError, SimError},
    protocol, Connection,
};

/// A flag the writer sets when a write is complete and the reader consumes.
#[derive(Debug, Default)]
struct ReadyFlag {
    ready: Mutex<bool>,
    cond: Condvar,
}

impl ReadyFlag {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self) {
        *self.lock() = true;
        self.cond.notify_all();
    }

    fn is_set(&self) -> bool {
        *self.lock()
    }

    /// Waits until the flag is set and clears it. Returns `false` on timeout.
    fn consume(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut ready = self.lock();
        while !*ready {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            ready = self
                .cond
                .wait_timeout(ready, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *ready = false;
        true
    }
}

/// The client's read-only mapping of a region.
struct Region {
    path: PathBuf,
    mmap: Mmap,
}

impl Region {
    fn create(dir: &Path, file_name: &str, size: usize) -> Result<Self, SharedMemoryError> {
        if size == 0 {
            return Err(SharedMemoryError::Io(format!(
                "size of `{file_name}` must be positive"
            )));
        }
        std::fs::create_dir_all(dir)?;

        let path = dir.join(file_name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        let mmap = match file
            .set_len(size as u64)
            .and_then(|()| unsafe { Mmap::map(&file) })
        {
            Ok(mmap) => mmap,
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                return Err(e.into());
            }
        };
        Ok(Self { path, mmap })
    }

    fn remove(self) -> Result<(), SharedMemoryError> {
        let Self { path, mmap } = self;
        drop(mmap);
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

struct HandleInner {
    name: String,
    file_name: String,
    size: usize,
    ready: ReadyFlag,
    region: Mutex<Option<Region>>,
}

/// A shared memory region negotiated with the host.
///
/// The host writes into the region and signals completion; [`read`](Self::read) waits for that
/// signal and copies the region out. Clones refer to the same region.
#[derive(Clone)]
pub struct SharedMemoryHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for SharedMemoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemoryHandle")
            .field("name", &self.inner.name)
            .field("file_name", &self.inner.file_name)
            .field("size", &self.inner.size)
            .field("released", &self.is_released())
            .finish()
    }
}

impl SharedMemoryHandle {
    fn new(name: &str, file_name: &str, size: usize, region: Region) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                name: name.to_owned(),
                file_name: file_name.to_owned(),
                size,
                ready: ReadyFlag::default(),
                region: Mutex::new(Some(region)),
            }),
        }
    }

    fn region(&self) -> MutexGuard<'_, Option<Region>> {
        self.inner
            .region
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The logical name, unique on its connection.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The name of the backing file. The host knows the region by this name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.inner.file_name
    }

    /// The size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// The backing file, or `None` once released.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.region().as_ref().map(|r| r.path.clone())
    }

    /// Checks if the region was released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.region().is_none()
    }

    /// Checks if a completed write has not been read yet.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.ready.is_set()
    }

    /// Signals that a write into the region is complete.
    pub fn mark_ready(&self) {
        self.inner.ready.set();
    }

    /// Waits for the ready signal and copies out exactly [`size`](Self::size) bytes.
    ///
    /// The signal is consumed, so the next read waits for the next write.
    pub fn read(&self, timeout: Duration) -> Result<Vec<u8>, SimError> {
        if self.is_released() {
            return Err(SharedMemoryError::Released(self.inner.name.clone()).into());
        }
        if !self.inner.ready.consume(timeout) {
            return Err(TransportError::Timeout(timeout).into());
        }

        let region = self.region();
        let region = region
            .as_ref()
            .ok_or_else(|| SharedMemoryError::Released(self.inner.name.clone()))?;
        Ok(region.mmap[..self.inner.size].to_vec())
    }

    fn take_region(&self) -> Option<Region> {
        self.region().take()
    }
}

impl<L: Link> Connection<L> {
    /// Creates a region of `size` bytes in `shm_dir` and announces it to the host.
    ///
    /// The backing file is named after the process, the connection and `name`, so regions of
    /// different connections never share a file. `name` must be a plain file name component.
    ///
    /// Fails with [`SharedMemoryError::NameInUse`] without contacting the host if the name is
    /// taken on this connection.
    pub fn negotiate_shared_memory(
        &self,
        name: &str,
        size: usize,
    ) -> Result<SharedMemoryHandle, SimError> {
        validate_name(name)?;
        self.ensure_open()?;

        let file_name = format!("simlink.{}.{}.{}", std::process::id(), self.serial(), name);
        let handle = {
            let mut registry = self.registry();
            if registry.regions.contains_key(name) {
                return Err(SharedMemoryError::NameInUse(name.to_owned()).into());
            }
            let region = Region::create(&self.option().shm_dir, &file_name, size)?;
            tracing::debug!("Created shared memory {} at {}", name, region.path.display());
            let handle = SharedMemoryHandle::new(name, &file_name, size, region);
            registry.regions.insert(name.to_owned(), handle.clone());
            handle
        };

        let res = self
            .call(
                Message::new("OpenSharedMemory")
                    .with("name", file_name.as_str())
                    .with("size", size),
                "OpenedSharedMemory",
            )
            .and_then(|ack| {
                let acked_name = protocol::field::<String>(&ack, "name")?;
                let acked_size = protocol::field::<usize>(&ack, "size")?;
                if acked_name != file_name || acked_size != size {
                    return Err(ProtocolError::UnexpectedAck {
                        expected: "OpenedSharedMemory".to_owned(),
                        actual: ack.ty().to_owned(),
                        reason: Some(format!(
                            "host opened `{acked_name}` with {acked_size} bytes, but `{file_name}` with {size} bytes was requested"
                        )),
                    }
                    .into());
                }
                Ok(())
            });

        if let Err(e) = res {
            self.registry().regions.remove(name);
            if let Some(region) = handle.take_region() {
                if let Err(e) = region.remove() {
                    tracing::warn!("Failed to remove shared memory {}: {}", name, e);
                }
            }
            return Err(e);
        }

        tracing::debug!("Negotiated shared memory {} ({} bytes)", name, size);
        Ok(handle)
    }

    /// Tells the host to stop using the region, unmaps it and removes its backing file.
    ///
    /// Releasing a released handle does nothing.
    pub fn release_shared_memory(&self, handle: &SharedMemoryHandle) -> Result<(), SimError> {
        {
            let mut registry = self.registry();
            if registry
                .regions
                .get(handle.name())
                .is_some_and(|h| Arc::ptr_eq(&h.inner, &handle.inner))
            {
                registry.regions.remove(handle.name());
            }
        }
        self.release_region(handle)
    }

    pub(crate) fn release_region(&self, handle: &SharedMemoryHandle) -> Result<(), SimError> {
        let Some(region) = handle.take_region() else {
            return Ok(());
        };

        let res = if self.is_open() {
            self.call(
                Message::new("CloseSharedMemory").with("name", handle.file_name()),
                "ClosedSharedMemory",
            )
            .map(|_| ())
        } else {
            Ok(())
        };

        region.remove()?;
        tracing::debug!("Released shared memory {}", handle.name());
        res
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(TransportError::ConnectionClosed)
        }
    }
}

fn validate_name(name: &str) -> Result<(), SharedMemoryError> {
    if name.is_empty() || name.contains(['/', '\\', '\0']) || name.contains("..") {
        return Err(SharedMemoryError::InvalidName(name.to_owned()));
    }
    Ok(())
}
