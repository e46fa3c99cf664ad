//! Memory objects: buffers and images.
//!
//! Every memory object wraps a [`MemObj`], which holds the graphics
//! allocation and the bookkeeping shared by all object types. Objects that
//! derive from another object (an image over a buffer, an NV12 plane view)
//! pin their parent with an internal reference for their whole lifetime.

mod buffer;
pub mod image;

pub use buffer::Buffer;
pub use image::{Image, ImageDescriptor, ImageInfoParam, ImageInfoValue, SurfaceOffsets};

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;

use xpu_core::memory::{GraphicsAllocation, HostMemory, MemoryManager};

use crate::context::Context;

bitflags! {
    /// Memory object flags (`cl_mem_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemFlags: u64 {
        const READ_WRITE = 1 << 0;
        const WRITE_ONLY = 1 << 1;
        const READ_ONLY = 1 << 2;
        const USE_HOST_PTR = 1 << 3;
        const ALLOC_HOST_PTR = 1 << 4;
        const COPY_HOST_PTR = 1 << 5;
        const HOST_WRITE_ONLY = 1 << 7;
        const HOST_READ_ONLY = 1 << 8;
        const HOST_NO_ACCESS = 1 << 9;
    }
}

/// Memory object type (`cl_mem_object_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MemObjectType {
    Buffer = 0x10F0,
    Image2D = 0x10F1,
    Image3D = 0x10F2,
    Image2DArray = 0x10F3,
    Image1D = 0x10F4,
    Image1DArray = 0x10F5,
    Image1DBuffer = 0x10F6,
}

impl MemObjectType {
    pub fn is_image_2d(self) -> bool {
        self == Self::Image2D
    }

    pub fn is_image_2d_or_2d_array(self) -> bool {
        matches!(self, Self::Image2D | Self::Image2DArray)
    }

    pub fn is_array(self) -> bool {
        matches!(self, Self::Image1DArray | Self::Image2DArray)
    }

    pub fn is_1d(self) -> bool {
        matches!(self, Self::Image1D | Self::Image1DArray | Self::Image1DBuffer)
    }
}

static NEXT_MEM_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// State shared by all memory objects.
pub struct MemObj {
    id: u64,
    context: Arc<Context>,
    object_type: MemObjectType,
    flags: MemFlags,
    size: usize,
    host_ptr: Option<Arc<HostMemory>>,
    allocation: Arc<GraphicsAllocation>,
    owns_allocation: bool,
    zero_copy: bool,
    is_object_redescribed: bool,
    internal_refs: AtomicU32,
    pub(crate) map_state: Mutex<Option<MapInfo>>,
    pub(crate) map_storage: Mutex<Option<Arc<HostMemory>>>,
}

impl MemObj {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        context: Arc<Context>,
        object_type: MemObjectType,
        flags: MemFlags,
        size: usize,
        host_ptr: Option<Arc<HostMemory>>,
        allocation: Arc<GraphicsAllocation>,
        owns_allocation: bool,
        zero_copy: bool,
        is_object_redescribed: bool,
    ) -> Self {
        Self {
            id: NEXT_MEM_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            context,
            object_type,
            flags,
            size,
            host_ptr,
            allocation,
            owns_allocation,
            zero_copy,
            is_object_redescribed,
            internal_refs: AtomicU32::new(0),
            map_state: Mutex::new(None),
            map_storage: Mutex::new(None),
        }
    }

    /// Process-unique handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn object_type(&self) -> MemObjectType {
        self.object_type
    }

    pub fn flags(&self) -> MemFlags {
        self.flags
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Host memory the object was created with (`USE_HOST_PTR`), if any.
    pub fn host_ptr(&self) -> Option<&Arc<HostMemory>> {
        self.host_ptr.as_ref()
    }

    pub fn graphics_allocation(&self) -> &Arc<GraphicsAllocation> {
        &self.allocation
    }

    /// CPU address of the backing storage.
    pub fn cpu_address(&self) -> u64 {
        self.allocation.cpu_address()
    }

    /// Whether the object releases its allocation when dropped.
    pub fn owns_allocation(&self) -> bool {
        self.owns_allocation
    }

    pub fn is_mem_obj_zero_copy(&self) -> bool {
        self.zero_copy
    }

    pub fn is_object_redescribed(&self) -> bool {
        self.is_object_redescribed
    }

    /// Number of derived objects currently pinning this one.
    pub fn internal_ref_count(&self) -> u32 {
        self.internal_refs.load(Ordering::Acquire)
    }

    pub(crate) fn inc_ref_internal(&self) {
        self.internal_refs.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn dec_ref_internal(&self) {
        let previous = self.internal_refs.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "internal reference count underflow");
    }

    /// Whether the object is currently mapped.
    pub fn is_mapped(&self) -> bool {
        self.map_state.lock().is_some()
    }

    pub(crate) fn log_memory_objects(&self) -> bool {
        self.context.device().settings().log_memory_objects
    }
}

impl Drop for MemObj {
    fn drop(&mut self) {
        if self.log_memory_objects() {
            log::trace!(
                "MemObj {}: destroyed ({:?}, owns allocation: {})",
                self.id,
                self.object_type,
                self.owns_allocation
            );
        }
        if self.owns_allocation {
            self.context
                .memory_manager()
                .free_graphics_memory(Arc::clone(&self.allocation));
        }
    }
}

impl std::fmt::Debug for MemObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemObj")
            .field("id", &self.id)
            .field("object_type", &self.object_type)
            .field("flags", &self.flags)
            .field("size", &self.size)
            .field("zero_copy", &self.zero_copy)
            .field("allocation", &self.allocation.id())
            .finish()
    }
}

/// A reference to a buffer or an image.
#[derive(Debug, Clone)]
pub enum MemObjectRef {
    Buffer(Arc<Buffer>),
    Image(Arc<Image>),
}

impl MemObjectRef {
    pub fn mem_obj(&self) -> &MemObj {
        match self {
            Self::Buffer(buffer) => buffer.mem_obj(),
            Self::Image(image) => image.mem_obj(),
        }
    }

    pub fn id(&self) -> u64 {
        self.mem_obj().id()
    }

    pub fn as_buffer(&self) -> Option<&Arc<Buffer>> {
        match self {
            Self::Buffer(buffer) => Some(buffer),
            Self::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&Arc<Image>> {
        match self {
            Self::Image(image) => Some(image),
            Self::Buffer(_) => None,
        }
    }
}

impl PartialEq for MemObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for MemObjectRef {}

impl From<Arc<Buffer>> for MemObjectRef {
    fn from(buffer: Arc<Buffer>) -> Self {
        Self::Buffer(buffer)
    }
}

impl From<Arc<Image>> for MemObjectRef {
    fn from(image: Arc<Image>) -> Self {
        Self::Image(image)
    }
}

/// Internal reference held by a derived object on its parent.
#[derive(Debug)]
pub(crate) struct ParentPin(MemObjectRef);

impl ParentPin {
    pub(crate) fn new(parent: MemObjectRef) -> Self {
        parent.mem_obj().inc_ref_internal();
        Self(parent)
    }

    pub(crate) fn target(&self) -> &MemObjectRef {
        &self.0
    }
}

impl Drop for ParentPin {
    fn drop(&mut self) {
        self.0.mem_obj().dec_ref_internal();
    }
}

/// A freshly made allocation, released unless handed to a memory object.
pub(crate) struct PendingAllocation {
    memory_manager: Arc<dyn MemoryManager>,
    allocation: Arc<GraphicsAllocation>,
    armed: bool,
}

impl PendingAllocation {
    pub(crate) fn new(
        memory_manager: Arc<dyn MemoryManager>,
        allocation: Arc<GraphicsAllocation>,
    ) -> Self {
        Self {
            memory_manager,
            allocation,
            armed: true,
        }
    }

    pub(crate) fn allocation(&self) -> &Arc<GraphicsAllocation> {
        &self.allocation
    }

    /// Hand the allocation over to its new owner.
    pub(crate) fn disarm(mut self) -> Arc<GraphicsAllocation> {
        self.armed = false;
        Arc::clone(&self.allocation)
    }
}

impl Drop for PendingAllocation {
    fn drop(&mut self) {
        if self.armed {
            log::trace!("Releasing allocation {} after failed creation", self.allocation.id());
            self.memory_manager
                .free_graphics_memory(Arc::clone(&self.allocation));
        }
    }
}

/// An active mapping of a memory object.
#[derive(Debug, Clone)]
pub(crate) struct MapInfo {
    pub memory: Arc<HostMemory>,
    pub offset: usize,
    pub origin: [usize; 3],
    pub region: [usize; 3],
}

/// Host view of a mapped image region.
#[derive(Debug, Clone)]
pub struct MappedRegion {
    /// Host memory holding the mapped bytes.
    pub memory: Arc<HostMemory>,
    /// Offset of the region origin within `memory`.
    pub offset: usize,
    pub row_pitch: usize,
    pub slice_pitch: usize,
}

impl MappedRegion {
    /// Whether this describes the same mapped pointer as `other`.
    pub fn same_pointer(&self, memory: &Arc<HostMemory>, offset: usize) -> bool {
        Arc::ptr_eq(&self.memory, memory) && self.offset == offset
    }
}
