//! Double-buffered command buffers.

use std::sync::Arc;

use xpu_core::command_stream::{CommandStreamReceiver, FlushStamp};
use xpu_core::device::Device;
use xpu_core::memory::{
    align_up, AllocationKind, AllocationProperties, GraphicsAllocation, MemoryManager,
    PAGE_SIZE_64K,
};

use crate::error::QueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BufferSlot {
    #[default]
    First,
    Second,
}

impl BufferSlot {
    fn index(self) -> usize {
        self as usize
    }

    fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

/// Two command buffers used alternately by one queue.
///
/// The host encodes into the active buffer while the device may still be
/// executing the other one. A buffer is handed out again only after the
/// flush stamp recorded for it has completed.
#[derive(Debug, Default)]
pub struct CommandBufferManager {
    buffers: [Option<Arc<GraphicsAllocation>>; 2],
    flush_id: [FlushStamp; 2],
    buffer_use: BufferSlot,
}

impl CommandBufferManager {
    /// Allocate both buffers, each `requested_size` rounded up to 64 KiB.
    ///
    /// Allocations that succeeded are kept on failure; [`destroy`] releases
    /// them.
    ///
    /// [`destroy`]: CommandBufferManager::destroy
    pub fn initialize(&mut self, device: &Device, requested_size: usize) -> Result<(), QueueError> {
        let aligned_size = align_up(requested_size, PAGE_SIZE_64K);
        let properties = AllocationProperties::new(
            device.root_device_index(),
            aligned_size,
            AllocationKind::COMMAND_BUFFER,
        )
        .with_multi_os_context(device.is_multi_device_capable());

        let memory_manager = device.memory_manager();
        for buffer in &mut self.buffers {
            match memory_manager.allocate_graphics_memory_with_properties(&properties) {
                Ok(allocation) => *buffer = Some(allocation),
                Err(err) => log::warn!("CommandBufferManager: allocation failed: {}", err),
            }
        }
        if self.buffers.iter().any(Option::is_none) {
            return Err(QueueError::OutOfDeviceMemory);
        }

        for allocation in self.buffers.iter().flatten() {
            allocation.fill_zero();
        }
        self.flush_id = [0; 2];
        self.buffer_use = BufferSlot::First;
        log::debug!("CommandBufferManager: two command buffers of {} bytes", aligned_size);
        Ok(())
    }

    /// Make the other buffer active, blocking until its last submission
    /// completed.
    pub fn switch_buffers(&mut self, receiver: &dyn CommandStreamReceiver) {
        self.buffer_use = self.buffer_use.other();
        let completion_id = self.flush_id[self.buffer_use.index()];
        log::debug!(
            "CommandBufferManager: switched to {:?} (flush stamp {})",
            self.buffer_use,
            completion_id
        );
        if completion_id != 0 {
            receiver.wait_for_flush_stamp(completion_id);
        }
    }

    /// Record the flush stamp of a submission from the active buffer.
    pub fn set_current_flush_stamp(&mut self, stamp: FlushStamp) {
        self.flush_id[self.buffer_use.index()] = stamp;
    }

    /// Flush stamp recorded for the active buffer.
    pub fn current_flush_stamp(&self) -> FlushStamp {
        self.flush_id[self.buffer_use.index()]
    }

    /// The active buffer, if allocated.
    pub fn current_buffer_allocation(&self) -> Option<&Arc<GraphicsAllocation>> {
        self.buffers[self.buffer_use.index()].as_ref()
    }

    /// Free both buffers. Safe to call more than once.
    pub fn destroy(&mut self, memory_manager: &dyn MemoryManager) {
        for buffer in &mut self.buffers {
            if let Some(allocation) = buffer.take() {
                memory_manager.free_graphics_memory(allocation);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xpu_core::command_stream::{CompletionMode, SoftwareCommandStreamReceiver};
    use xpu_core::hw_info::HardwareInfo;
    use xpu_core::memory::OsAgnosticMemoryManager;
    use xpu_core::settings::DebugSettings;

    fn device_with_budget(budget: Option<usize>) -> Arc<Device> {
        let settings = DebugSettings {
            device_memory_budget: budget,
            ..Default::default()
        };
        Device::with_settings(HardwareInfo::skylake(), settings)
    }

    #[test]
    fn test_initialize_rounds_to_64k() {
        let device = device_with_budget(None);
        let mut buffers = CommandBufferManager::default();
        buffers.initialize(&device, 1000).unwrap();

        let current = buffers.current_buffer_allocation().unwrap();
        assert_eq!(current.underlying_buffer_size(), PAGE_SIZE_64K);
        assert_eq!(current.kind(), AllocationKind::COMMAND_BUFFER);
        assert_eq!(current.read(0, 16), vec![0; 16]);
        assert_eq!(buffers.current_flush_stamp(), 0);

        buffers.destroy(device.memory_manager().as_ref());
        assert!(buffers.current_buffer_allocation().is_none());
    }

    #[test]
    fn test_second_allocation_failure_keeps_first() {
        let device = device_with_budget(Some(PAGE_SIZE_64K));
        let mut buffers = CommandBufferManager::default();
        assert_eq!(
            buffers.initialize(&device, PAGE_SIZE_64K),
            Err(QueueError::OutOfDeviceMemory)
        );
        assert!(buffers.current_buffer_allocation().is_some());

        let manager = device.memory_manager();
        buffers.destroy(manager.as_ref());
        buffers.destroy(manager.as_ref());
        assert!(buffers.current_buffer_allocation().is_none());
    }

    #[test]
    fn test_switch_alternates_buffers() {
        let device = device_with_budget(None);
        let receiver = SoftwareCommandStreamReceiver::new(CompletionMode::Immediate);
        let mut buffers = CommandBufferManager::default();
        buffers.initialize(&device, PAGE_SIZE_64K).unwrap();

        let first = Arc::clone(buffers.current_buffer_allocation().unwrap());
        buffers.switch_buffers(&receiver);
        let second = Arc::clone(buffers.current_buffer_allocation().unwrap());
        assert!(!Arc::ptr_eq(&first, &second));
        buffers.switch_buffers(&receiver);
        assert!(Arc::ptr_eq(buffers.current_buffer_allocation().unwrap(), &first));

        buffers.destroy(device.memory_manager().as_ref());
    }

    #[test]
    fn test_destroy_on_empty_manager() {
        let manager = OsAgnosticMemoryManager::new();
        let mut buffers = CommandBufferManager::default();
        buffers.destroy(&manager);
        assert_eq!(manager.stats().live_allocations, 0);
    }
}
