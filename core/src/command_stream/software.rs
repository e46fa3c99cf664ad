//! Software command stream receiver.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{
    BatchBuffer, CommandStreamReceiver, FlushStamp, QueueThrottle, ResidencyContainer, TaskCount,
};

/// When submitted work completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// Every batch completes as it is submitted.
    #[default]
    Immediate,
    /// Batches complete only when signaled with
    /// [`SoftwareCommandStreamReceiver::complete_up_to`].
    Deferred,
}

/// What a receiver saw for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedBatch {
    pub task_count: TaskCount,
    pub allocation_id: u64,
    pub gpu_address: u64,
    pub start_offset: usize,
    pub used_size: usize,
    pub throttle: QueueThrottle,
    pub slice_count: u64,
    pub low_priority: bool,
    pub copy_only: bool,
    pub end_cmd_offset: Option<usize>,
    pub residency_count: usize,
}

/// A receiver that executes nothing and tracks completion in software.
///
/// Each submission bumps the task count; its flush stamp equals the new task
/// count. In [`CompletionMode::Deferred`] the completion tag stays behind
/// until a test (or another thread holding [`tag_handle`]) advances it.
///
/// [`tag_handle`]: SoftwareCommandStreamReceiver::tag_handle
#[derive(Debug)]
pub struct SoftwareCommandStreamReceiver {
    mode: CompletionMode,
    task_count: AtomicU32,
    tag: Arc<AtomicU32>,
    max_poll_timeout: Duration,
    submissions: Mutex<Vec<SubmittedBatch>>,
}

impl SoftwareCommandStreamReceiver {
    /// Create a receiver with the given completion mode.
    pub fn new(mode: CompletionMode) -> Self {
        Self {
            mode,
            task_count: AtomicU32::new(0),
            tag: Arc::new(AtomicU32::new(0)),
            max_poll_timeout: Duration::from_secs(2),
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// Warn when an untimed wait polls longer than `timeout_us`.
    pub fn with_max_poll_timeout(mut self, timeout_us: u64) -> Self {
        self.max_poll_timeout = Duration::from_micros(timeout_us);
        self
    }

    pub fn mode(&self) -> CompletionMode {
        self.mode
    }

    /// Shared handle to the completion tag, for signaling from other threads.
    pub fn tag_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.tag)
    }

    /// Mark every task up to `task_count` complete. The tag never moves back.
    pub fn complete_up_to(&self, task_count: TaskCount) {
        let previous = self.tag.fetch_max(task_count, Ordering::AcqRel);
        if task_count > previous {
            log::trace!("SoftwareCSR: tag {} -> {}", previous, task_count);
        }
    }

    /// Mark everything submitted so far complete.
    pub fn complete_all(&self) {
        self.complete_up_to(self.task_count.load(Ordering::Acquire));
    }

    /// Submissions seen so far.
    pub fn submissions(&self) -> Vec<SubmittedBatch> {
        self.submissions.lock().clone()
    }

    fn poll_until(&self, target: TaskCount, deadline: Option<Duration>) -> bool {
        let start = Instant::now();
        let mut warned = false;
        while self.tag.load(Ordering::Acquire) < target {
            let elapsed = start.elapsed();
            match deadline {
                Some(deadline) if elapsed >= deadline => return false,
                None if !warned && elapsed >= self.max_poll_timeout => {
                    log::warn!(
                        "SoftwareCSR: still waiting for task {} after {:?} (tag {})",
                        target,
                        elapsed,
                        self.tag.load(Ordering::Acquire)
                    );
                    warned = true;
                }
                _ => {}
            }
            std::thread::yield_now();
        }
        true
    }
}

impl Default for SoftwareCommandStreamReceiver {
    fn default() -> Self {
        Self::new(CompletionMode::default())
    }
}

impl CommandStreamReceiver for SoftwareCommandStreamReceiver {
    fn submit_batch_buffer(&self, batch: &BatchBuffer, residency: &ResidencyContainer) {
        let task_count = self.task_count.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!(
            "SoftwareCSR: submit task {} ({} bytes from offset {} of allocation {})",
            task_count,
            batch.used_size,
            batch.start_offset,
            batch.command_buffer_allocation.id()
        );
        self.submissions.lock().push(SubmittedBatch {
            task_count,
            allocation_id: batch.command_buffer_allocation.id(),
            gpu_address: batch.command_buffer_allocation.gpu_address(),
            start_offset: batch.start_offset,
            used_size: batch.used_size,
            throttle: batch.throttle,
            slice_count: batch.slice_count,
            low_priority: batch.low_priority,
            copy_only: batch.copy_only,
            end_cmd_offset: batch.end_cmd_offset,
            residency_count: residency.len(),
        });
        if self.mode == CompletionMode::Immediate {
            self.complete_up_to(task_count);
        }
    }

    fn obtain_current_flush_stamp(&self) -> FlushStamp {
        FlushStamp::from(self.task_count.load(Ordering::Acquire))
    }

    fn wait_for_flush_stamp(&self, stamp: FlushStamp) -> bool {
        let target = TaskCount::try_from(stamp).unwrap_or(TaskCount::MAX);
        log::debug!("SoftwareCSR: waiting for flush stamp {}", stamp);
        self.poll_until(target, None)
    }

    fn wait_for_completion_with_timeout(
        &self,
        enable_timeout: bool,
        timeout_us: i64,
        task_count: TaskCount,
    ) -> bool {
        let deadline =
            enable_timeout.then(|| Duration::from_micros(u64::try_from(timeout_us).unwrap_or(0)));
        self.poll_until(task_count, deadline)
    }

    fn tag(&self) -> TaskCount {
        self.tag.load(Ordering::Acquire)
    }

    fn peek_task_count(&self) -> TaskCount {
        self.task_count.load(Ordering::Acquire)
    }
}

static_assertions::assert_impl_all!(SoftwareCommandStreamReceiver: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryManager, OsAgnosticMemoryManager};

    fn batch() -> BatchBuffer {
        let manager = OsAgnosticMemoryManager::new();
        BatchBuffer {
            command_buffer_allocation: manager.allocate_graphics_memory(64, None).unwrap(),
            start_offset: 0,
            chained_batch_buffer_start_offset: 0,
            requires_coherency: false,
            low_priority: false,
            throttle: QueueThrottle::High,
            slice_count: 0,
            used_size: 16,
            end_cmd_offset: Some(12),
            copy_only: false,
        }
    }

    #[test]
    fn test_immediate_completion() {
        let csr = SoftwareCommandStreamReceiver::new(CompletionMode::Immediate);
        csr.submit_batch_buffer(&batch(), &Vec::new());
        assert_eq!(csr.peek_task_count(), 1);
        assert_eq!(csr.obtain_current_flush_stamp(), 1);
        assert_eq!(csr.tag(), 1);
        assert!(csr.wait_for_flush_stamp(1));
    }

    #[test]
    fn test_deferred_completion_times_out() {
        let csr = SoftwareCommandStreamReceiver::new(CompletionMode::Deferred);
        csr.submit_batch_buffer(&batch(), &Vec::new());
        assert_eq!(csr.tag(), 0);
        assert!(!csr.wait_for_completion_with_timeout(true, 0, 1));

        csr.complete_all();
        assert!(csr.wait_for_completion_with_timeout(true, 0, 1));
    }

    #[test]
    fn test_tag_never_moves_back() {
        let csr = SoftwareCommandStreamReceiver::new(CompletionMode::Deferred);
        csr.complete_up_to(5);
        csr.complete_up_to(3);
        assert_eq!(csr.tag(), 5);
    }

    #[test]
    fn test_flush_stamp_wait_unblocked_by_other_thread() {
        let csr = Arc::new(SoftwareCommandStreamReceiver::new(CompletionMode::Deferred));
        csr.submit_batch_buffer(&batch(), &Vec::new());
        let tag = csr.tag_handle();
        let signaler = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            tag.store(1, Ordering::Release);
        });
        assert!(csr.wait_for_flush_stamp(1));
        signaler.join().unwrap();
    }

    #[test]
    fn test_submission_record() {
        let csr = SoftwareCommandStreamReceiver::default();
        csr.submit_batch_buffer(&batch(), &Vec::new());
        let submissions = csr.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].throttle, QueueThrottle::High);
        assert_eq!(submissions[0].used_size, 16);
        assert_eq!(submissions[0].end_cmd_offset, Some(12));
    }
}
