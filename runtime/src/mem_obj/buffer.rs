//! Buffer memory objects.

use std::sync::Arc;

use xpu_core::hw_info::MaxMemAllocSize;
use xpu_core::memory::HostMemory;

use super::{MemFlags, MemObj, MemObjectType, PendingAllocation};
use crate::context::Context;
use crate::error::ImageError;

/// A linear device buffer.
///
/// Buffers created with [`MemFlags::USE_HOST_PTR`] are zero-copy: their
/// allocation aliases the supplied host memory.
#[derive(Debug)]
pub struct Buffer {
    mem: MemObj,
}

impl Buffer {
    /// Create a buffer of `size` bytes.
    pub fn create(
        context: &Arc<Context>,
        flags: MemFlags,
        size: usize,
        host_ptr: Option<&Arc<HostMemory>>,
    ) -> Result<Arc<Self>, ImageError> {
        let max_size = context.device().get_cap::<MaxMemAllocSize>();
        if size == 0 || size as u64 > max_size {
            return Err(ImageError::InvalidBufferSize);
        }

        let wants_host_ptr = flags.intersects(MemFlags::USE_HOST_PTR | MemFlags::COPY_HOST_PTR);
        let host = match (wants_host_ptr, host_ptr) {
            (true, None) | (false, Some(_)) => return Err(ImageError::InvalidHostPtr),
            (true, Some(host)) if host.len() < size => return Err(ImageError::InvalidHostPtr),
            (_, host) => host,
        };

        let memory_manager = context.memory_manager();
        let zero_copy = flags.contains(MemFlags::USE_HOST_PTR);
        let allocation = if zero_copy {
            memory_manager.allocate_graphics_memory(size, host)
        } else {
            memory_manager.allocate_graphics_memory(size, None)
        }
        .map_err(|e| {
            log::warn!("Buffer allocation of {} bytes failed: {}", size, e);
            ImageError::OutOfHostMemory
        })?;
        let pending = PendingAllocation::new(Arc::clone(memory_manager), allocation);

        if flags.contains(MemFlags::COPY_HOST_PTR) && !zero_copy {
            if let Some(host) = host {
                pending.allocation().write(0, &host.read(0, size));
            }
        }

        let allocation = pending.disarm();
        log::trace!(
            "Buffer created: {} bytes, zero copy: {}, gpu address {:#x}",
            size,
            zero_copy,
            allocation.gpu_address()
        );

        let host_ptr_to_set = if zero_copy { host.cloned() } else { None };
        Ok(Arc::new(Self {
            mem: MemObj::new(
                Arc::clone(context),
                MemObjectType::Buffer,
                flags,
                size,
                host_ptr_to_set,
                allocation,
                true,
                zero_copy,
                false,
            ),
        }))
    }

    pub fn mem_obj(&self) -> &MemObj {
        &self.mem
    }

    pub fn size(&self) -> usize {
        self.mem.size()
    }

    pub fn flags(&self) -> MemFlags {
        self.mem.flags()
    }

    pub fn host_ptr(&self) -> Option<&Arc<HostMemory>> {
        self.mem.host_ptr()
    }

    /// Read `len` bytes at `offset`.
    pub fn read(&self, offset: usize, len: usize) -> Vec<u8> {
        self.mem.graphics_allocation().read(offset, len)
    }

    /// Write `data` at `offset`.
    pub fn write(&self, offset: usize, data: &[u8]) {
        self.mem.graphics_allocation().write(offset, data);
    }
}

static_assertions::assert_impl_all!(Buffer: Send, Sync);
