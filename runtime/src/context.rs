//! Contexts and the internal transfer queue.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use xpu_core::device::Device;
use xpu_core::memory::{HostMemory, MemoryManager};

use crate::error::ImageError;
use crate::mem_obj::image::{copy_image_region, CopyDirection};
use crate::mem_obj::{Image, MappedRegion};

/// A context: the device memory objects are created on, plus the internal
/// queue used for driver-side transfers.
pub struct Context {
    device: Arc<Device>,
    is_shared_context: bool,
    special_queue: Mutex<InternalQueue>,
}

impl Context {
    /// Create a context on `device`.
    pub fn new(device: Arc<Device>) -> Arc<Self> {
        Self::create(device, false)
    }

    /// Create a context whose memory is shared with another API.
    ///
    /// Shared contexts never tile images and always place `USE_HOST_PTR`
    /// images directly in the supplied memory.
    pub fn new_shared(device: Arc<Device>) -> Arc<Self> {
        Self::create(device, true)
    }

    fn create(device: Arc<Device>, is_shared_context: bool) -> Arc<Self> {
        log::info!(
            "Context created on {} (shared: {})",
            device.hardware_info().name,
            is_shared_context
        );
        Arc::new(Self {
            device,
            is_shared_context,
            special_queue: Mutex::new(InternalQueue::default()),
        })
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn memory_manager(&self) -> &Arc<dyn MemoryManager> {
        self.device.memory_manager()
    }

    pub fn is_shared_context(&self) -> bool {
        self.is_shared_context
    }

    /// Lock the internal queue.
    pub fn special_queue(&self) -> MutexGuard<'_, InternalQueue> {
        self.special_queue.lock()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("device", &self.device)
            .field("is_shared_context", &self.is_shared_context)
            .finish()
    }
}

static_assertions::assert_impl_all!(Context: Send, Sync);

/// Task level of an event that has not completed.
pub const EVENT_NOT_READY: u32 = u32::MAX;

/// A completion event usable in wait lists.
#[derive(Debug)]
pub struct Event {
    task_level: AtomicU32,
}

impl Event {
    /// An event that completes when [`Event::set_complete`] is called.
    pub fn new_user() -> Arc<Self> {
        Arc::new(Self {
            task_level: AtomicU32::new(EVENT_NOT_READY),
        })
    }

    /// An event already completed at `task_level`.
    pub fn completed(task_level: u32) -> Arc<Self> {
        Arc::new(Self {
            task_level: AtomicU32::new(task_level),
        })
    }

    pub fn set_complete(&self, task_level: u32) {
        self.task_level.store(task_level, Ordering::Release);
    }

    pub fn task_level(&self) -> u32 {
        self.task_level.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.task_level() != EVENT_NOT_READY
    }
}

/// In-order queue the driver uses for its own image transfers.
///
/// Transfers execute when enqueued; non-blocking ones are counted as pending
/// until the next [`finish`](InternalQueue::finish).
#[derive(Debug, Default)]
pub struct InternalQueue {
    task_level: u32,
    pending: usize,
    finish_count: u64,
}

impl InternalQueue {
    /// Task level a command waiting on `wait_list` would run at, or
    /// [`EVENT_NOT_READY`] if any event is incomplete.
    pub fn task_level_from_wait_list(task_level: u32, wait_list: &[Arc<Event>]) -> u32 {
        wait_list.iter().try_fold(task_level, |level, event| {
            let event_level = event.task_level();
            (event_level != EVENT_NOT_READY).then(|| level.max(event_level))
        })
        .unwrap_or(EVENT_NOT_READY)
    }

    pub fn task_level(&self) -> u32 {
        self.task_level
    }

    /// Non-blocking transfers not yet finished.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Number of `finish` calls.
    pub fn finish_count(&self) -> u64 {
        self.finish_count
    }

    /// Wait for all enqueued work.
    pub fn finish(&mut self) {
        log::trace!("InternalQueue: finish ({} pending)", self.pending);
        self.pending = 0;
        self.finish_count += 1;
    }

    fn complete(&mut self, blocking: bool) {
        self.task_level += 1;
        if !blocking {
            self.pending += 1;
        }
    }

    /// Write `region` of `image` at `origin` from host memory.
    ///
    /// Zero pitches default to tightly packed rows and slices.
    #[allow(clippy::too_many_arguments)]
    pub fn enqueue_write_image(
        &mut self,
        image: &Image,
        blocking: bool,
        origin: [usize; 3],
        region: [usize; 3],
        row_pitch: usize,
        slice_pitch: usize,
        src: &HostMemory,
        src_offset: usize,
    ) -> Result<(), ImageError> {
        log::trace!(
            "InternalQueue: write image {} origin {:?} region {:?}",
            image.mem_obj().id(),
            origin,
            region
        );
        copy_image_region(
            image,
            origin,
            region,
            src.store(),
            src_offset,
            row_pitch,
            slice_pitch,
            CopyDirection::HostToImage,
        )?;
        self.complete(blocking);
        Ok(())
    }

    /// Read `region` of `image` at `origin` into host memory.
    #[allow(clippy::too_many_arguments)]
    pub fn enqueue_read_image(
        &mut self,
        image: &Image,
        blocking: bool,
        origin: [usize; 3],
        region: [usize; 3],
        row_pitch: usize,
        slice_pitch: usize,
        dst: &HostMemory,
        dst_offset: usize,
    ) -> Result<(), ImageError> {
        log::trace!(
            "InternalQueue: read image {} origin {:?} region {:?}",
            image.mem_obj().id(),
            origin,
            region
        );
        copy_image_region(
            image,
            origin,
            region,
            dst.store(),
            dst_offset,
            row_pitch,
            slice_pitch,
            CopyDirection::ImageToHost,
        )?;
        self.complete(blocking);
        Ok(())
    }

    /// Unmap a linearly addressed image, writing the mapped bytes back when
    /// the image does not alias them.
    pub fn enqueue_unmap_mem_object(
        &mut self,
        image: &Image,
        mapped: &MappedRegion,
    ) -> Result<(), ImageError> {
        let mut map_state = image.mem_obj().map_state.lock();
        let info = match map_state.as_ref() {
            Some(info) if mapped.same_pointer(&info.memory, info.offset) => info.clone(),
            _ => return Err(ImageError::InvalidValue),
        };

        if !image.aliases_host_memory() {
            copy_image_region(
                image,
                info.origin,
                info.region,
                info.memory.store(),
                info.offset,
                mapped.row_pitch,
                mapped.slice_pitch,
                CopyDirection::HostToImage,
            )?;
        }
        *map_state = None;
        self.complete(true);
        Ok(())
    }
}
