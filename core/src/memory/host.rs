//! Caller-owned host memory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{align_up, BackingStore, PAGE_SIZE};

/// Base of the simulated host address range.
const HOST_ADDRESS_BASE: u64 = 0x7f00_0000_0000;

static NEXT_HOST_ADDRESS: AtomicU64 = AtomicU64::new(HOST_ADDRESS_BASE);

/// A region of host memory supplied by an application.
///
/// Host memory has a stable (simulated) virtual address so that alignment
/// rules can be evaluated exactly as a driver would on a real pointer. The
/// bytes live in a shared [`BackingStore`]; a zero-copy allocation created
/// from this memory references the very same store.
#[derive(Debug)]
pub struct HostMemory {
    address: u64,
    store: Arc<BackingStore>,
}

impl HostMemory {
    /// Wrap `data` at a fresh page-aligned address.
    pub fn new(data: Vec<u8>) -> Arc<Self> {
        let span = align_up(data.len().max(1), PAGE_SIZE) + PAGE_SIZE;
        let address = NEXT_HOST_ADDRESS.fetch_add(span as u64, Ordering::Relaxed);
        Self::at_address(data, address)
    }

    /// Allocate `size` zeroed bytes at a fresh page-aligned address.
    pub fn zeroed(size: usize) -> Arc<Self> {
        Self::new(vec![0; size])
    }

    /// Wrap `data` at an explicit address.
    ///
    /// Useful to exercise alignment rules with deliberately misaligned pointers.
    pub fn at_address(data: Vec<u8>, address: u64) -> Arc<Self> {
        Arc::new(Self {
            address,
            store: Arc::new(BackingStore::from_vec(data)),
        })
    }

    /// Virtual address of the first byte.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the region is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The shared backing store.
    pub fn store(&self) -> &Arc<BackingStore> {
        &self.store
    }

    /// Copy of the current contents.
    pub fn to_vec(&self) -> Vec<u8> {
        self.store.snapshot()
    }

    /// Copy of `len` bytes starting at `offset`.
    pub fn read(&self, offset: usize, len: usize) -> Vec<u8> {
        let mut out = vec![0; len];
        self.store.read(offset, &mut out);
        out
    }

    /// Overwrite bytes starting at `offset`.
    pub fn write(&self, offset: usize, data: &[u8]) {
        self.store.write(offset, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_addresses_are_page_aligned_and_distinct() {
        let a = HostMemory::zeroed(100);
        let b = HostMemory::zeroed(100);
        assert_eq!(a.address() % PAGE_SIZE as u64, 0);
        assert_eq!(b.address() % PAGE_SIZE as u64, 0);
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn test_read_write() {
        let mem = HostMemory::new(vec![1, 2, 3, 4]);
        mem.write(1, &[9, 9]);
        assert_eq!(mem.to_vec(), vec![1, 9, 9, 4]);
        assert_eq!(mem.read(2, 2), vec![9, 4]);
    }
}
