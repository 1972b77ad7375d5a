//! Memory regions backing a buffer pool
//!
//! A region is a contiguous, 128-byte aligned byte range with a bus base
//! address. Addresses handed to the peer are `base_pa + offset` (IOVA
//! mode "va": the bus address equals the virtual address).

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fmt::Debug;
use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::ptr::NonNull;

use crate::InterfaceError;

const REGION_ALIGN: usize = 128;

/// Contiguous memory shared with the transport peer
pub trait MemoryRegion: Send + Sync + Debug {
    /// Pointer to the first byte of the region
    fn as_ptr(&self) -> *mut u8;

    /// Size of the region in bytes
    fn size(&self) -> usize;

    /// Bus address of the first byte
    fn base_pa(&self) -> u64 {
        self.as_ptr() as u64
    }
}

fn align_up(size: usize) -> usize {
    (size + REGION_ALIGN - 1) & !(REGION_ALIGN - 1)
}

/// Process-private region on the heap
#[derive(Debug)]
pub struct HeapRegion {
    ptr: NonNull<u8>,
    layout: Layout,
}

// The region is plain bytes; access is serialized by the pool's block ownership.
unsafe impl Send for HeapRegion {}
unsafe impl Sync for HeapRegion {}

impl HeapRegion {
    pub fn new(size: usize) -> Result<Self, InterfaceError> {
        if size == 0 {
            return Err(InterfaceError::Region("zero-sized region".into()));
        }
        let layout = Layout::from_size_align(align_up(size), REGION_ALIGN)
            .map_err(|e| InterfaceError::Region(e.to_string()))?;
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| InterfaceError::Region(format!("failed to allocate {} bytes", layout.size())))?;
        Ok(Self { ptr, layout })
    }
}

impl MemoryRegion for HeapRegion {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for HeapRegion {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// Region mapped from a file under /dev/shm, visible to other processes
#[derive(Debug)]
pub struct ShmRegion {
    ptr: NonNull<u8>,
    size: usize,
    map_len: usize,
    map_ptr: *mut libc::c_void,
    path: String,
}

unsafe impl Send for ShmRegion {}
unsafe impl Sync for ShmRegion {}

impl ShmRegion {
    /// Open (creating if needed) `/dev/shm/<name>` and map `size` bytes of it
    pub fn open(name: &str, size: usize) -> Result<Self, InterfaceError> {
        let size = align_up(size);
        let path = format!("/dev/shm/{}", name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| InterfaceError::Region(format!("failed to open {}: {}", path, e)))?;

        let file_size = file
            .metadata()
            .map_err(|e| InterfaceError::Region(e.to_string()))?
            .len() as usize;
        if file_size < size {
            file.set_len(size as u64)
                .map_err(|e| InterfaceError::Region(format!("failed to size {}: {}", path, e)))?;
        }

        // Extra room so the start can be aligned
        let map_len = size + REGION_ALIGN;
        let map_ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if map_ptr == libc::MAP_FAILED {
            return Err(InterfaceError::Region(format!(
                "mmap of {} failed: {}",
                path,
                std::io::Error::last_os_error()
            )));
        }

        let aligned = ((map_ptr as usize + REGION_ALIGN - 1) & !(REGION_ALIGN - 1)) as *mut u8;
        let ptr = match NonNull::new(aligned) {
            Some(ptr) => ptr,
            None => {
                unsafe { libc::munmap(map_ptr, map_len) };
                return Err(InterfaceError::Region("mmap returned null".into()));
            }
        };

        Ok(Self { ptr, size, map_len, map_ptr, path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl MemoryRegion for ShmRegion {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.map_ptr, self.map_len) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_region_alignment() {
        let region = HeapRegion::new(1000).unwrap();
        assert_eq!(region.as_ptr() as usize % REGION_ALIGN, 0);
        assert_eq!(region.size(), 1024);
        assert_eq!(region.base_pa(), region.as_ptr() as u64);
    }

    #[test]
    fn test_zero_region_rejected() {
        assert!(HeapRegion::new(0).is_err());
    }
}
