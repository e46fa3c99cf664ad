//! Command stream receiver interface.

use std::sync::Arc;

use crate::memory::GraphicsAllocation;

/// Identifier of one submission, increasing with each flush. Zero means
/// "never submitted".
pub type FlushStamp = u64;

/// Count of submitted (or completed) tasks.
pub type TaskCount = u32;

/// Allocations that must be resident while a batch executes.
pub type ResidencyContainer = Vec<Arc<GraphicsAllocation>>;

/// Encoded `MI_BATCH_BUFFER_END`.
pub const MI_BATCH_BUFFER_END: u32 = 0x0500_0000;

/// Default slice count of a submission (use all slices).
pub const DEFAULT_SLICE_COUNT: u64 = 0;

/// Submission throttle hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueThrottle {
    Low,
    #[default]
    Medium,
    High,
}

/// Description of one batch handed to a receiver.
#[derive(Debug, Clone)]
pub struct BatchBuffer {
    pub command_buffer_allocation: Arc<GraphicsAllocation>,
    /// Offset of the first command to execute.
    pub start_offset: usize,
    pub chained_batch_buffer_start_offset: usize,
    pub requires_coherency: bool,
    pub low_priority: bool,
    pub throttle: QueueThrottle,
    pub slice_count: u64,
    /// Bytes of the stream used when the batch was built.
    pub used_size: usize,
    /// Offset of the batch-buffer-end command, if one was encoded.
    pub end_cmd_offset: Option<usize>,
    pub copy_only: bool,
}

/// Consumer of command buffers.
///
/// Receivers execute batches asynchronously and report progress through a
/// monotonically increasing completion tag.
pub trait CommandStreamReceiver: Send + Sync {
    /// Hand a batch to the hardware.
    fn submit_batch_buffer(&self, batch: &BatchBuffer, residency: &ResidencyContainer);

    /// Flush stamp of the most recent submission.
    fn obtain_current_flush_stamp(&self) -> FlushStamp;

    /// Block until the submission identified by `stamp` completed.
    fn wait_for_flush_stamp(&self, stamp: FlushStamp) -> bool;

    /// Poll until the tag reaches `task_count`, or until `timeout_us` elapsed
    /// when `enable_timeout` is set. Returns whether the tag got there.
    fn wait_for_completion_with_timeout(
        &self,
        enable_timeout: bool,
        timeout_us: i64,
        task_count: TaskCount,
    ) -> bool;

    /// Current value of the completion tag.
    fn tag(&self) -> TaskCount;

    /// Number of tasks submitted so far.
    fn peek_task_count(&self) -> TaskCount;
}
