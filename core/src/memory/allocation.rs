//! Graphics allocations and their backing stores.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::RwLock;

use super::HostMemory;
use crate::layout::ImageLayout;

bitflags! {
    /// What an allocation is used for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AllocationKind: u32 {
        /// Plain buffer memory.
        const BUFFER = 1 << 0;
        /// Command buffer consumed by the command streamer.
        const COMMAND_BUFFER = 1 << 1;
        /// Image surface.
        const IMAGE = 1 << 2;
        /// Writable by kernels.
        const WRITABLE = 1 << 3;
        /// Backed by caller-supplied host memory.
        const HOST_MEMORY = 1 << 4;
        /// Virtual padding view over another allocation.
        const PADDING = 1 << 5;
    }
}

impl Default for AllocationKind {
    fn default() -> Self {
        Self::empty()
    }
}

/// Parameters for [`MemoryManager::allocate_graphics_memory_with_properties`].
///
/// [`MemoryManager::allocate_graphics_memory_with_properties`]: super::MemoryManager::allocate_graphics_memory_with_properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationProperties {
    /// Root device owning the allocation.
    pub root_device_index: u32,
    /// Size in bytes.
    pub size: usize,
    /// Intended usage.
    pub kind: AllocationKind,
    /// Whether the allocation is shared by several OS contexts.
    pub multi_os_context_capable: bool,
}

impl AllocationProperties {
    /// Properties for an allocation of `size` bytes of the given kind.
    pub fn new(root_device_index: u32, size: usize, kind: AllocationKind) -> Self {
        Self {
            root_device_index,
            size,
            kind,
            multi_os_context_capable: false,
        }
    }

    /// Mark the allocation as shared between OS contexts.
    pub fn with_multi_os_context(mut self, capable: bool) -> Self {
        self.multi_os_context_capable = capable;
        self
    }
}

/// Bytes shared by host memory and the allocations aliasing it.
///
/// Accesses outside the stored range are clipped: writes past the end are
/// dropped and reads past the end yield zeros. This is how virtual padding
/// pages behave.
#[derive(Debug, Default)]
pub struct BackingStore {
    bytes: RwLock<Vec<u8>>,
}

impl BackingStore {
    /// A zero-filled store.
    pub fn zeroed(size: usize) -> Self {
        Self::from_vec(vec![0; size])
    }

    /// A store owning `bytes`.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: RwLock::new(bytes),
        }
    }

    /// Stored length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy bytes starting at `offset` into `out`.
    pub fn read(&self, offset: usize, out: &mut [u8]) {
        let bytes = self.bytes.read();
        let available = bytes.len().saturating_sub(offset).min(out.len());
        if available > 0 {
            out[..available].copy_from_slice(&bytes[offset..offset + available]);
        }
        out[available..].fill(0);
    }

    /// Copy `data` into the store starting at `offset`.
    pub fn write(&self, offset: usize, data: &[u8]) {
        let mut bytes = self.bytes.write();
        let available = bytes.len().saturating_sub(offset).min(data.len());
        if available > 0 {
            bytes[offset..offset + available].copy_from_slice(&data[..available]);
        }
    }

    /// Zero `len` bytes starting at `offset`.
    pub fn fill_zero(&self, offset: usize, len: usize) {
        let mut bytes = self.bytes.write();
        let end = bytes.len().min(offset.saturating_add(len));
        if offset < end {
            bytes[offset..end].fill(0);
        }
    }

    /// Copy of the whole contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.read().clone()
    }
}

/// A GPU-visible memory allocation.
///
/// Allocations are created by a [`MemoryManager`] and are reference-counted.
/// Several objects may share one allocation (an image created from a buffer,
/// a redescribed image view); only the object that requested the allocation
/// hands it back to the manager.
///
/// [`MemoryManager`]: super::MemoryManager
pub struct GraphicsAllocation {
    id: u64,
    root_device_index: u32,
    gpu_address: u64,
    size: usize,
    kind: AtomicU32,
    store: Arc<BackingStore>,
    host_memory: Option<Arc<HostMemory>>,
    layout: Option<ImageLayout>,
    padded_source: Option<Arc<GraphicsAllocation>>,
}

impl GraphicsAllocation {
    /// Create an allocation (called by memory managers).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u64,
        root_device_index: u32,
        gpu_address: u64,
        size: usize,
        kind: AllocationKind,
        store: Arc<BackingStore>,
        host_memory: Option<Arc<HostMemory>>,
        layout: Option<ImageLayout>,
        padded_source: Option<Arc<GraphicsAllocation>>,
    ) -> Self {
        Self {
            id,
            root_device_index,
            gpu_address,
            size,
            kind: AtomicU32::new(kind.bits()),
            store,
            host_memory,
            layout,
            padded_source,
        }
    }

    /// Unique allocation id within its memory manager.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Root device owning the allocation.
    pub fn root_device_index(&self) -> u32 {
        self.root_device_index
    }

    /// GPU virtual address.
    pub fn gpu_address(&self) -> u64 {
        self.gpu_address
    }

    /// CPU address: the host memory address for host-backed allocations,
    /// otherwise the GPU address (the simulated address spaces are unified).
    pub fn cpu_address(&self) -> u64 {
        self.host_memory
            .as_ref()
            .map_or(self.gpu_address, |host| host.address())
    }

    /// Size of the underlying buffer in bytes.
    pub fn underlying_buffer_size(&self) -> usize {
        self.size
    }

    /// Current usage kind.
    pub fn kind(&self) -> AllocationKind {
        AllocationKind::from_bits_truncate(self.kind.load(Ordering::Acquire))
    }

    /// Update the usage kind.
    pub fn set_kind(&self, kind: AllocationKind) {
        self.kind.store(kind.bits(), Ordering::Release);
    }

    /// The backing store (shared with host memory for zero-copy allocations).
    pub fn store(&self) -> &Arc<BackingStore> {
        &self.store
    }

    /// Host memory backing this allocation, if any.
    pub fn host_memory(&self) -> Option<&Arc<HostMemory>> {
        self.host_memory.as_ref()
    }

    /// Image layout the allocation was created for, if any.
    pub fn layout(&self) -> Option<&ImageLayout> {
        self.layout.as_ref()
    }

    /// For padding views, the allocation whose pages are mapped first.
    pub fn padded_source(&self) -> Option<&Arc<GraphicsAllocation>> {
        self.padded_source.as_ref()
    }

    /// Read `len` bytes at `offset`.
    pub fn read(&self, offset: usize, len: usize) -> Vec<u8> {
        let mut out = vec![0; len];
        self.store.read(offset, &mut out);
        out
    }

    /// Read into `out` starting at `offset`.
    pub fn read_into(&self, offset: usize, out: &mut [u8]) {
        self.store.read(offset, out);
    }

    /// Write `data` at `offset`.
    pub fn write(&self, offset: usize, data: &[u8]) {
        debug_assert!(
            offset + data.len() <= self.size,
            "write of {} bytes at {offset} overflows allocation of {} bytes",
            data.len(),
            self.size
        );
        self.store.write(offset, data);
    }

    /// Zero the whole underlying buffer.
    pub fn fill_zero(&self) {
        self.store.fill_zero(0, self.size);
    }
}

impl std::fmt::Debug for GraphicsAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsAllocation")
            .field("id", &self.id)
            .field("gpu_address", &format_args!("{:#x}", self.gpu_address))
            .field("size", &self.size)
            .field("kind", &self.kind())
            .field("host_backed", &self.host_memory.is_some())
            .field("padded", &self.padded_source.is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsAllocation: Send, Sync);
