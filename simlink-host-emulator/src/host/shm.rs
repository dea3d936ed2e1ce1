use std::{fs::OpenOptions, path::Path};

use memmap2::MmapMut;

use crate::error::HostError;

/// The host's writable view of a region the client created.
pub struct HostRegion {
    name: String,
    size: usize,
    mmap: MmapMut,
    writes: usize,
}

impl HostRegion {
    pub(crate) fn open(dir: &Path, name: &str, size: usize) -> Result<Self, HostError> {
        if name.is_empty() || name.contains(['/', '\\', '\0']) || name.contains("..") {
            return Err(HostError::SharedMemory(
                name.to_owned(),
                "name must be a plain file name".to_owned(),
            ));
        }
        let path = dir.join(name);
        let err = |e: std::io::Error| HostError::SharedMemory(name.to_owned(), e.to_string());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(err)?;
        let len = file.metadata().map_err(err)?.len();
        if len < size as u64 {
            return Err(HostError::SharedMemory(
                name.to_owned(),
                format!("backing file has {len} bytes, but {size} bytes were requested"),
            ));
        }

        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(err)?;
        tracing::debug!("Mapped {} ({} bytes) from {}", name, size, path.display());

        Ok(Self {
            name: name.to_owned(),
            size,
            mmap,
            writes: 0,
        })
    }

    /// The name of the backing file.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The negotiated size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// The number of completed writes.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }

    /// The current contents of the region.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.mmap[..self.size]
    }

    /// Writes `data` at the start of the region, truncated to its size, and flushes it.
    ///
    /// Returns the number of bytes written.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.size);
        self.mmap[..n].copy_from_slice(&data[..n]);
        if let Err(e) = self.mmap.flush() {
            tracing::warn!("Failed to flush {}: {}", self.name, e);
        }
        self.writes += 1;
        n
    }
}
