//! Memory manager trait and the OS-agnostic software implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    align_size_whole_page, align_up, AllocationKind, AllocationProperties, BackingStore,
    GraphicsAllocation, HostMemory, PAGE_SIZE, PAGE_SIZE_64K,
};
use crate::error::AllocationError;
use crate::layout::ImageLayout;

/// Allocation policy consumed by command queues and memory objects.
///
/// Callers decide *what* to allocate; the manager decides *where*.
pub trait MemoryManager: Send + Sync {
    /// Allocate memory described by `properties`.
    fn allocate_graphics_memory_with_properties(
        &self,
        properties: &AllocationProperties,
    ) -> Result<Arc<GraphicsAllocation>, AllocationError>;

    /// Allocate `size` bytes, or wrap `host` memory when supplied (zero-copy).
    fn allocate_graphics_memory(
        &self,
        size: usize,
        host: Option<&Arc<HostMemory>>,
    ) -> Result<Arc<GraphicsAllocation>, AllocationError>;

    /// Allocate storage for an image with the given layout.
    fn allocate_graphics_memory_for_image(
        &self,
        layout: &ImageLayout,
    ) -> Result<Arc<GraphicsAllocation>, AllocationError>;

    /// Create a view of `source` extended to `size` bytes with virtual padding pages.
    fn create_graphics_allocation_with_padding(
        &self,
        source: &Arc<GraphicsAllocation>,
        size: usize,
    ) -> Result<Arc<GraphicsAllocation>, AllocationError>;

    /// Return an allocation to the manager.
    fn free_graphics_memory(&self, allocation: Arc<GraphicsAllocation>);

    /// Whether padding views can be created.
    fn peek_virtual_padding_support(&self) -> bool;
}

/// Bookkeeping snapshot of an [`OsAgnosticMemoryManager`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Allocations handed out and not yet freed.
    pub live_allocations: usize,
    /// Device bytes currently consumed.
    pub device_bytes_in_use: usize,
    /// Total number of successful allocations.
    pub total_allocations: u64,
    /// Total number of frees.
    pub total_frees: u64,
}

#[derive(Debug, Default)]
struct ManagerState {
    live: HashMap<u64, usize>,
    device_bytes_in_use: usize,
    total_allocations: u64,
    total_frees: u64,
}

/// Software memory manager with a simulated GPU address space.
///
/// Device memory can be capped with a byte budget, which is how out-of-memory
/// conditions are produced without real hardware.
///
/// # Example
///
/// ```
/// use xpu_core::memory::{MemoryManager, OsAgnosticMemoryManager};
///
/// let manager = OsAgnosticMemoryManager::new();
/// let allocation = manager.allocate_graphics_memory(4096, None).unwrap();
/// assert_eq!(allocation.underlying_buffer_size(), 4096);
/// manager.free_graphics_memory(allocation);
/// assert_eq!(manager.stats().live_allocations, 0);
/// ```
pub struct OsAgnosticMemoryManager {
    next_gpu_address: AtomicU64,
    next_id: AtomicU64,
    budget: Option<usize>,
    virtual_padding: bool,
    state: Mutex<ManagerState>,
}

impl OsAgnosticMemoryManager {
    /// Base of the simulated GPU address range.
    pub const GPU_ADDRESS_BASE: u64 = 0x1_0000_0000;

    /// Create a manager without a device memory budget.
    pub fn new() -> Self {
        Self {
            next_gpu_address: AtomicU64::new(Self::GPU_ADDRESS_BASE),
            next_id: AtomicU64::new(1),
            budget: None,
            virtual_padding: true,
            state: Mutex::new(ManagerState::default()),
        }
    }

    /// Cap device memory at `bytes`.
    pub fn with_budget(mut self, bytes: usize) -> Self {
        self.budget = Some(bytes);
        self
    }

    /// Enable or disable virtual padding support.
    pub fn with_virtual_padding(mut self, enabled: bool) -> Self {
        self.virtual_padding = enabled;
        self
    }

    /// Current bookkeeping snapshot.
    pub fn stats(&self) -> MemoryStats {
        let state = self.state.lock();
        MemoryStats {
            live_allocations: state.live.len(),
            device_bytes_in_use: state.device_bytes_in_use,
            total_allocations: state.total_allocations,
            total_frees: state.total_frees,
        }
    }

    fn reserve_gpu_range(&self, size: usize) -> u64 {
        let span = align_up(size.max(1), PAGE_SIZE_64K) as u64;
        self.next_gpu_address.fetch_add(span, Ordering::Relaxed)
    }

    fn charge(&self, size: usize, device_bytes: usize) -> Result<u64, AllocationError> {
        if size == 0 {
            return Err(AllocationError::ZeroSize);
        }
        let mut state = self.state.lock();
        if let Some(budget) = self.budget {
            let available = budget.saturating_sub(state.device_bytes_in_use);
            if device_bytes > available {
                log::warn!(
                    "OsAgnosticMemoryManager: allocation of {} bytes exceeds budget ({} available)",
                    device_bytes,
                    available
                );
                return Err(AllocationError::OutOfDeviceMemory {
                    requested: device_bytes,
                    available,
                });
            }
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        state.device_bytes_in_use += device_bytes;
        state.total_allocations += 1;
        state.live.insert(id, device_bytes);
        Ok(id)
    }

    fn allocate_device(
        &self,
        root_device_index: u32,
        size: usize,
        kind: AllocationKind,
        layout: Option<ImageLayout>,
    ) -> Result<Arc<GraphicsAllocation>, AllocationError> {
        let id = self.charge(size, size)?;
        let gpu_address = self.reserve_gpu_range(size);
        let allocation = Arc::new(GraphicsAllocation::new(
            id,
            root_device_index,
            gpu_address,
            size,
            kind,
            Arc::new(BackingStore::zeroed(size)),
            None,
            layout,
            None,
        ));
        log::trace!(
            "OsAgnosticMemoryManager: allocated {:?} ({} bytes at {:#x})",
            kind,
            size,
            gpu_address
        );
        Ok(allocation)
    }
}

impl Default for OsAgnosticMemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryManager for OsAgnosticMemoryManager {
    fn allocate_graphics_memory_with_properties(
        &self,
        properties: &AllocationProperties,
    ) -> Result<Arc<GraphicsAllocation>, AllocationError> {
        self.allocate_device(
            properties.root_device_index,
            properties.size,
            properties.kind,
            None,
        )
    }

    fn allocate_graphics_memory(
        &self,
        size: usize,
        host: Option<&Arc<HostMemory>>,
    ) -> Result<Arc<GraphicsAllocation>, AllocationError> {
        let Some(host) = host else {
            return self.allocate_device(0, size, AllocationKind::BUFFER, None);
        };

        let mapped = align_size_whole_page(host.address(), host.len());
        if mapped < size {
            return Err(AllocationError::HostMemoryTooSmall {
                requested: size,
                available: mapped,
            });
        }

        // Host pages are pinned, not charged against device memory.
        let id = self.charge(size, 0)?;
        let gpu_address = self.reserve_gpu_range(size);
        log::trace!(
            "OsAgnosticMemoryManager: wrapped host memory {:#x} ({} bytes) at {:#x}",
            host.address(),
            size,
            gpu_address
        );
        Ok(Arc::new(GraphicsAllocation::new(
            id,
            0,
            gpu_address,
            size,
            AllocationKind::BUFFER | AllocationKind::HOST_MEMORY,
            Arc::clone(host.store()),
            Some(Arc::clone(host)),
            None,
            None,
        )))
    }

    fn allocate_graphics_memory_for_image(
        &self,
        layout: &ImageLayout,
    ) -> Result<Arc<GraphicsAllocation>, AllocationError> {
        self.allocate_device(0, layout.size, AllocationKind::IMAGE, Some(*layout))
    }

    fn create_graphics_allocation_with_padding(
        &self,
        source: &Arc<GraphicsAllocation>,
        size: usize,
    ) -> Result<Arc<GraphicsAllocation>, AllocationError> {
        let id = self.charge(size, 0)?;
        let gpu_address = self.reserve_gpu_range(size);
        log::trace!(
            "OsAgnosticMemoryManager: padded allocation {} from {} to {} bytes",
            source.id(),
            source.underlying_buffer_size(),
            size
        );
        Ok(Arc::new(GraphicsAllocation::new(
            id,
            source.root_device_index(),
            gpu_address,
            size,
            source.kind() | AllocationKind::PADDING,
            Arc::clone(source.store()),
            source.host_memory().cloned(),
            None,
            Some(Arc::clone(source)),
        )))
    }

    fn free_graphics_memory(&self, allocation: Arc<GraphicsAllocation>) {
        let mut state = self.state.lock();
        match state.live.remove(&allocation.id()) {
            Some(device_bytes) => {
                state.device_bytes_in_use -= device_bytes;
                state.total_frees += 1;
                log::trace!("OsAgnosticMemoryManager: freed allocation {}", allocation.id());
            }
            None => {
                log::warn!(
                    "OsAgnosticMemoryManager: free of unknown allocation {}",
                    allocation.id()
                );
            }
        }
    }

    fn peek_virtual_padding_support(&self) -> bool {
        self.virtual_padding
    }
}

impl std::fmt::Debug for OsAgnosticMemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsAgnosticMemoryManager")
            .field("budget", &self.budget)
            .field("virtual_padding", &self.virtual_padding)
            .field("stats", &self.stats())
            .finish()
    }
}

static_assertions::assert_impl_all!(OsAgnosticMemoryManager: Send, Sync);
