//! Command queues.
//!
//! A [`CommandQueueImp`] encodes into one of two command buffers owned by its
//! [`CommandBufferManager`], submits batches to a
//! [`CommandStreamReceiver`] and waits for completion by polling the
//! receiver's tag.

mod buffer_manager;
mod registry;

pub use buffer_manager::CommandBufferManager;
pub use registry::{CommandQueueAllocatorFn, CommandQueueRegistry};

use std::sync::Arc;

use xpu_core::command_stream::{
    BatchBuffer, CommandStreamReceiver, LinearStream, QueueThrottle, ResidencyContainer,
    TaskCount, DEFAULT_SLICE_COUNT, MI_BATCH_BUFFER_END,
};
use xpu_core::device::Device;
use xpu_core::hw_info::ProductFamily;
use xpu_core::memory::{GraphicsAllocation, CACHE_LINE_SIZE, KILOBYTE, PAGE_SIZE};

use crate::error::QueueError;

/// Usable bytes of each command buffer unless overridden by settings.
pub const DEFAULT_QUEUE_CMD_BUFFER_SIZE: usize = 128 * KILOBYTE;

/// Bytes the command streamer may prefetch past the end of a buffer.
const CS_OVERFETCH_SIZE: usize = PAGE_SIZE;

/// Submission mode of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommandQueueMode {
    #[default]
    Default,
    Synchronous,
    Asynchronous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommandQueuePriority {
    #[default]
    Normal,
    Low,
    High,
}

/// Queue creation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandQueueDesc {
    pub ordinal: u32,
    pub index: u32,
    pub mode: CommandQueueMode,
    pub priority: CommandQueuePriority,
}

/// A kernel whose printf buffer is printed after the queue synchronizes.
pub trait PrintfOutput: Send + Sync {
    fn print_printf_output(&self);
}

/// A command queue.
///
/// One thread submits through a queue at a time; every mutating method
/// takes `&mut self`.
pub struct CommandQueueImp {
    device: Arc<Device>,
    receiver: Arc<dyn CommandStreamReceiver>,
    desc: CommandQueueDesc,
    buffers: CommandBufferManager,
    command_stream: Option<LinearStream>,
    task_count: TaskCount,
    printf_functions: Vec<Arc<dyn PrintfOutput>>,
    is_copy_only: bool,
    internal_usage: bool,
    preemption_cmd_sync_programming: bool,
    default_queue_cmd_buffer_size: usize,
    total_cmd_buffer_size: usize,
}

impl CommandQueueImp {
    /// Create a queue through the global registry.
    ///
    /// Fails with [`QueueError::Uninitialized`] when no constructor is
    /// registered for `product_family`.
    pub fn create(
        product_family: ProductFamily,
        device: Arc<Device>,
        receiver: Arc<dyn CommandStreamReceiver>,
        desc: &CommandQueueDesc,
        copy_only: bool,
        internal: bool,
    ) -> Result<Box<Self>, QueueError> {
        CommandQueueRegistry::global().create(
            product_family,
            device,
            receiver,
            desc,
            copy_only,
            internal,
        )
    }

    /// Default constructor registered for every supported product.
    pub fn allocate(
        device: Arc<Device>,
        receiver: Arc<dyn CommandStreamReceiver>,
        desc: &CommandQueueDesc,
    ) -> Box<Self> {
        let default_queue_cmd_buffer_size = device
            .settings()
            .command_buffer_size
            .unwrap_or(DEFAULT_QUEUE_CMD_BUFFER_SIZE);
        Box::new(Self {
            device,
            receiver,
            desc: *desc,
            buffers: CommandBufferManager::default(),
            command_stream: None,
            task_count: 0,
            printf_functions: Vec::new(),
            is_copy_only: false,
            internal_usage: false,
            preemption_cmd_sync_programming: false,
            default_queue_cmd_buffer_size,
            total_cmd_buffer_size: default_queue_cmd_buffer_size
                + CACHE_LINE_SIZE
                + CS_OVERFETCH_SIZE,
        })
    }

    /// Allocate the command buffers and bind the stream to the first one.
    pub fn initialize(&mut self, copy_only: bool, internal: bool) -> Result<(), QueueError> {
        self.internal_usage = internal;
        self.buffers
            .initialize(&self.device, self.total_cmd_buffer_size)?;

        let allocation = self.current_buffer();
        self.command_stream = Some(LinearStream::new(
            allocation,
            self.default_queue_cmd_buffer_size,
        ));
        self.is_copy_only = copy_only;
        self.preemption_cmd_sync_programming =
            self.device.hardware_info().preemption_cmd_sync;
        Ok(())
    }

    fn current_buffer(&self) -> Arc<GraphicsAllocation> {
        Arc::clone(
            self.buffers
                .current_buffer_allocation()
                .unwrap_or_else(|| panic!("command queue has no command buffer")),
        )
    }

    fn stream_mut(&mut self) -> &mut LinearStream {
        self.command_stream
            .as_mut()
            .unwrap_or_else(|| panic!("command queue used before initialize"))
    }

    /// Make sure at least `size` bytes are available in the stream,
    /// switching command buffers if needed.
    ///
    /// # Panics
    ///
    /// Panics if the queue was not initialized.
    pub fn reserve_linear_stream_size(&mut self, size: usize) {
        if self.stream_mut().available_space() >= size {
            return;
        }
        self.buffers.switch_buffers(self.receiver.as_ref());
        let next = self.current_buffer();
        let usable = self.default_queue_cmd_buffer_size;
        self.stream_mut().replace_buffer(next, usable);
    }

    /// Append the batch-buffer end command; returns its offset.
    pub fn encode_batch_buffer_end(&mut self) -> usize {
        self.stream_mut().write(&MI_BATCH_BUFFER_END)
    }

    /// Submit the stream contents from `offset`.
    ///
    /// The flush stamp of the submission is recorded for the active buffer
    /// so that it is not reused before the device is done with it.
    pub fn submit_batch_buffer(
        &mut self,
        offset: usize,
        residency: &ResidencyContainer,
        end_cmd_offset: Option<usize>,
    ) {
        let stream = self
            .command_stream
            .as_ref()
            .unwrap_or_else(|| panic!("command queue used before initialize"));
        let allocation = stream
            .graphics_allocation()
            .unwrap_or_else(|| panic!("command stream has no allocation"));
        let batch = BatchBuffer {
            command_buffer_allocation: Arc::clone(allocation),
            start_offset: offset,
            chained_batch_buffer_start_offset: 0,
            requires_coherency: false,
            low_priority: self.desc.priority == CommandQueuePriority::Low,
            throttle: QueueThrottle::High,
            slice_count: DEFAULT_SLICE_COUNT,
            used_size: stream.used(),
            end_cmd_offset,
            copy_only: self.is_copy_only,
        };

        self.receiver.submit_batch_buffer(&batch, residency);
        self.buffers
            .set_current_flush_stamp(self.receiver.obtain_current_flush_stamp());
        self.task_count = self.receiver.peek_task_count();
    }

    /// Wait until everything submitted so far completed.
    ///
    /// `u64::MAX` waits without a timeout. Returns [`QueueError::NotReady`]
    /// if the work did not complete in time; the caller may poll again.
    pub fn synchronize(&mut self, timeout_us: u64) -> Result<(), QueueError> {
        let task_count_to_wait = self.task_count;
        let (enable_timeout, timeout) = if timeout_us == u64::MAX {
            (false, i64::MAX)
        } else {
            (true, i64::try_from(timeout_us).unwrap_or(i64::MAX))
        };

        self.receiver
            .wait_for_completion_with_timeout(enable_timeout, timeout, task_count_to_wait);
        if self.receiver.tag() < task_count_to_wait {
            log::warn!(
                "Command queue not ready after {}us (tag {}, waiting for {})",
                timeout_us,
                self.receiver.tag(),
                task_count_to_wait
            );
            return Err(QueueError::NotReady);
        }

        self.print_functions_printf_output();
        Ok(())
    }

    fn print_functions_printf_output(&mut self) {
        for function in self.printf_functions.drain(..) {
            function.print_printf_output();
        }
    }

    /// Print `function`'s printf output on the next successful synchronize.
    pub fn append_printf_function(&mut self, function: Arc<dyn PrintfOutput>) {
        self.printf_functions.push(function);
    }

    pub fn synchronous_mode(&self) -> CommandQueueMode {
        self.desc.mode
    }

    pub fn desc(&self) -> &CommandQueueDesc {
        &self.desc
    }

    /// Receiver task count after the last submission.
    pub fn task_count(&self) -> TaskCount {
        self.task_count
    }

    pub fn command_stream(&self) -> Option<&LinearStream> {
        self.command_stream.as_ref()
    }

    pub fn command_stream_mut(&mut self) -> Option<&mut LinearStream> {
        self.command_stream.as_mut()
    }

    pub fn is_copy_only(&self) -> bool {
        self.is_copy_only
    }

    pub fn is_internal(&self) -> bool {
        self.internal_usage
    }

    pub fn programs_preemption_sync(&self) -> bool {
        self.preemption_cmd_sync_programming
    }

    /// Usable bytes of each command buffer.
    pub fn command_buffer_size(&self) -> usize {
        self.default_queue_cmd_buffer_size
    }

    /// Destroy the queue, releasing its command buffers.
    pub fn destroy(self: Box<Self>) {
        drop(self);
    }

    fn release_buffers(&mut self) {
        self.command_stream = None;
        self.buffers.destroy(self.device.memory_manager().as_ref());
    }
}

impl Drop for CommandQueueImp {
    fn drop(&mut self) {
        self.release_buffers();
    }
}

impl std::fmt::Debug for CommandQueueImp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueueImp")
            .field("desc", &self.desc)
            .field("task_count", &self.task_count)
            .field("is_copy_only", &self.is_copy_only)
            .field("internal_usage", &self.internal_usage)
            .field("pending_printf", &self.printf_functions.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(CommandQueueImp: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use xpu_core::command_stream::{CompletionMode, SoftwareCommandStreamReceiver};
    use xpu_core::hw_info::HardwareInfo;
    use xpu_core::memory::{MemoryManager, OsAgnosticMemoryManager, PAGE_SIZE_64K};
    use xpu_core::settings::DebugSettings;

    struct Fixture {
        manager: Arc<OsAgnosticMemoryManager>,
        device: Arc<Device>,
        receiver: Arc<SoftwareCommandStreamReceiver>,
    }

    fn fixture(mode: CompletionMode, settings: DebugSettings) -> Fixture {
        let manager = Arc::new(OsAgnosticMemoryManager::new());
        let memory_manager: Arc<dyn MemoryManager> = Arc::clone(&manager) as _;
        let device = Device::new(HardwareInfo::skylake(), memory_manager, settings);
        Fixture {
            manager,
            device,
            receiver: Arc::new(SoftwareCommandStreamReceiver::new(mode)),
        }
    }

    fn queue(fixture: &Fixture, desc: &CommandQueueDesc) -> Box<CommandQueueImp> {
        let receiver: Arc<dyn CommandStreamReceiver> = Arc::clone(&fixture.receiver) as _;
        CommandQueueImp::create(
            ProductFamily::Skylake,
            Arc::clone(&fixture.device),
            receiver,
            desc,
            false,
            false,
        )
        .unwrap()
    }

    #[derive(Default)]
    struct CountingPrintf(AtomicUsize);

    impl PrintfOutput for CountingPrintf {
        fn print_printf_output(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_initialize_binds_stream() {
        let fixture = fixture(CompletionMode::Immediate, DebugSettings::default());
        let queue = queue(&fixture, &CommandQueueDesc::default());

        let stream = queue.command_stream().unwrap();
        assert_eq!(stream.max_available_space(), DEFAULT_QUEUE_CMD_BUFFER_SIZE);
        assert_eq!(stream.used(), 0);
        // 128 KiB + cache line + overfetch page rounds up to 192 KiB.
        assert_eq!(
            stream.graphics_allocation().unwrap().underlying_buffer_size(),
            3 * PAGE_SIZE_64K
        );
        assert_eq!(fixture.manager.stats().live_allocations, 2);
        assert!(!queue.programs_preemption_sync());

        queue.destroy();
        assert_eq!(fixture.manager.stats().live_allocations, 0);
    }

    #[test]
    fn test_command_buffer_size_from_settings() {
        let settings = DebugSettings {
            command_buffer_size: Some(4096),
            ..Default::default()
        };
        let fixture = fixture(CompletionMode::Immediate, settings);
        let queue = queue(&fixture, &CommandQueueDesc::default());
        assert_eq!(queue.command_buffer_size(), 4096);
        assert_eq!(queue.command_stream().unwrap().max_available_space(), 4096);
    }

    #[test]
    fn test_submit_records_batch() {
        let fixture = fixture(CompletionMode::Immediate, DebugSettings::default());
        let desc = CommandQueueDesc {
            priority: CommandQueuePriority::Low,
            ..Default::default()
        };
        let mut queue = queue(&fixture, &desc);

        queue.reserve_linear_stream_size(16);
        queue.command_stream_mut().unwrap().write_bytes(&[0; 12]);
        let end = queue.encode_batch_buffer_end();
        queue.submit_batch_buffer(0, &Vec::new(), Some(end));

        let submissions = fixture.receiver.submissions();
        assert_eq!(submissions.len(), 1);
        let batch = &submissions[0];
        assert_eq!(batch.used_size, 16);
        assert_eq!(batch.end_cmd_offset, Some(12));
        assert_eq!(batch.throttle, QueueThrottle::High);
        assert!(batch.low_priority);
        assert!(!batch.copy_only);
        assert_eq!(queue.task_count(), 1);
        assert_eq!(queue.buffers.current_flush_stamp(), 1);
    }

    #[test]
    fn test_synchronize_not_ready_then_ready() {
        let fixture = fixture(CompletionMode::Deferred, DebugSettings::default());
        let mut queue = queue(&fixture, &CommandQueueDesc::default());
        queue.reserve_linear_stream_size(4);
        let end = queue.encode_batch_buffer_end();
        queue.submit_batch_buffer(0, &Vec::new(), Some(end));

        let printf = Arc::new(CountingPrintf::default());
        queue.append_printf_function(Arc::clone(&printf) as Arc<dyn PrintfOutput>);

        assert_eq!(queue.synchronize(0), Err(QueueError::NotReady));
        assert_eq!(printf.0.load(Ordering::SeqCst), 0);

        fixture.receiver.complete_all();
        assert_eq!(queue.synchronize(u64::MAX), Ok(()));
        assert_eq!(printf.0.load(Ordering::SeqCst), 1);
        assert_eq!(queue.synchronize(0), Ok(()));
        assert_eq!(printf.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_synchronous_mode() {
        let fixture = fixture(CompletionMode::Immediate, DebugSettings::default());
        let desc = CommandQueueDesc {
            mode: CommandQueueMode::Synchronous,
            ..Default::default()
        };
        let queue = queue(&fixture, &desc);
        assert_eq!(queue.synchronous_mode(), CommandQueueMode::Synchronous);
    }

    #[test]
    fn test_out_of_device_memory_releases_first_buffer() {
        let manager = Arc::new(OsAgnosticMemoryManager::new().with_budget(3 * PAGE_SIZE_64K));
        let memory_manager: Arc<dyn MemoryManager> = Arc::clone(&manager) as _;
        let device = Device::new(HardwareInfo::skylake(), memory_manager, DebugSettings::default());
        let receiver: Arc<dyn CommandStreamReceiver> =
            Arc::new(SoftwareCommandStreamReceiver::default());

        let result = CommandQueueImp::create(
            ProductFamily::Skylake,
            device,
            receiver,
            &CommandQueueDesc::default(),
            false,
            false,
        );
        assert_eq!(result.unwrap_err(), QueueError::OutOfDeviceMemory);
        assert_eq!(manager.stats().live_allocations, 0);
        assert_eq!(manager.stats().total_frees, 1);
    }

    #[test]
    fn test_unknown_family_is_uninitialized() {
        let fixture = fixture(CompletionMode::Immediate, DebugSettings::default());
        let receiver: Arc<dyn CommandStreamReceiver> = Arc::clone(&fixture.receiver) as _;
        let result = CommandQueueImp::create(
            ProductFamily::Unknown,
            Arc::clone(&fixture.device),
            receiver,
            &CommandQueueDesc::default(),
            false,
            false,
        );
        assert_eq!(result.unwrap_err(), QueueError::Uninitialized);
    }
}
