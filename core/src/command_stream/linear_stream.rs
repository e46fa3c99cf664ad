//! Linear command stream.

use std::sync::Arc;

use bytemuck::Pod;

use crate::memory::GraphicsAllocation;

/// A write cursor over one command buffer allocation.
///
/// Commands are appended front to back. When a stream runs out of space its
/// owner rebinds it to another allocation with [`replace_buffer`]; the
/// previous contents are never copied.
///
/// [`replace_buffer`]: LinearStream::replace_buffer
#[derive(Debug, Default)]
pub struct LinearStream {
    allocation: Option<Arc<GraphicsAllocation>>,
    max_available_space: usize,
    used: usize,
}

impl LinearStream {
    /// A stream over `allocation`, limited to `max_available_space` bytes.
    pub fn new(allocation: Arc<GraphicsAllocation>, max_available_space: usize) -> Self {
        debug_assert!(max_available_space <= allocation.underlying_buffer_size());
        Self {
            allocation: Some(allocation),
            max_available_space,
            used: 0,
        }
    }

    /// Bytes written so far.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Usable capacity.
    pub fn max_available_space(&self) -> usize {
        self.max_available_space
    }

    /// Bytes still available.
    pub fn available_space(&self) -> usize {
        self.max_available_space - self.used
    }

    /// The allocation currently backing the stream.
    pub fn graphics_allocation(&self) -> Option<&Arc<GraphicsAllocation>> {
        self.allocation.as_ref()
    }

    /// GPU address of the next write.
    pub fn current_gpu_address(&self) -> u64 {
        self.allocation
            .as_ref()
            .map_or(0, |allocation| allocation.gpu_address() + self.used as u64)
    }

    /// Reserve `size` bytes and return their offset.
    ///
    /// # Panics
    ///
    /// Panics if the stream cannot fit `size` more bytes. Callers reserve
    /// space up front.
    pub fn get_space(&mut self, size: usize) -> usize {
        assert!(
            size <= self.available_space(),
            "linear stream overflow: {size} bytes requested, {} available",
            self.available_space()
        );
        let offset = self.used;
        self.used += size;
        offset
    }

    /// Append raw bytes; returns their offset.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        let offset = self.get_space(bytes.len());
        if let Some(allocation) = &self.allocation {
            allocation.write(offset, bytes);
        }
        offset
    }

    /// Append a plain-old-data command; returns its offset.
    pub fn write<T: Pod>(&mut self, command: &T) -> usize {
        self.write_bytes(bytemuck::bytes_of(command))
    }

    /// Rebind to a fresh allocation and reset the cursor.
    pub fn replace_buffer(&mut self, allocation: Arc<GraphicsAllocation>, max_available_space: usize) {
        debug_assert!(max_available_space <= allocation.underlying_buffer_size());
        self.allocation = Some(allocation);
        self.max_available_space = max_available_space;
        self.used = 0;
    }

    /// Swap the backing allocation without moving the cursor.
    pub fn replace_graphics_allocation(&mut self, allocation: Arc<GraphicsAllocation>) {
        self.allocation = Some(allocation);
    }

    /// Drop the backing allocation.
    pub fn release(&mut self) -> Option<Arc<GraphicsAllocation>> {
        self.max_available_space = 0;
        self.used = 0;
        self.allocation.take()
    }
}
