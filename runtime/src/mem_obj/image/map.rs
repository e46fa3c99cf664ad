//! Host mapping of image regions.

use std::sync::Arc;

use xpu_core::memory::HostMemory;

use super::Image;
use crate::context::{Event, InternalQueue, EVENT_NOT_READY};
use crate::error::ImageError;
use crate::mem_obj::{MapInfo, MappedRegion, MemFlags, MemObjectType};

impl Image {
    /// Map `region` at `origin` for host access.
    ///
    /// `USE_HOST_PTR` images map straight into their host memory; other
    /// images get driver-owned staging memory that lives as long as the
    /// image. The region's current contents are read in unless the host
    /// memory already is the image storage.
    pub fn map_region(
        &self,
        origin: [usize; 3],
        region: [usize; 3],
    ) -> Result<MappedRegion, ImageError> {
        let mut queue = self.mem.context().special_queue();
        let mut map_state = self.mem.map_state.lock();
        if map_state.is_some() {
            return Err(ImageError::InvalidOperation);
        }

        let row_pitch = self.host_ptr_row_pitch;
        let slice_pitch = match self.host_ptr_slice_pitch {
            0 => row_pitch * self.desc.height.max(1),
            pitch => pitch,
        };
        let memory = match self.mem.host_ptr() {
            Some(host) if self.mem.flags().contains(MemFlags::USE_HOST_PTR) => Arc::clone(host),
            _ => {
                let layers = self.desc.depth.max(self.desc.array_size).max(1);
                let mut storage = self.mem.map_storage.lock();
                Arc::clone(storage.get_or_insert_with(|| HostMemory::zeroed(slice_pitch * layers)))
            }
        };

        let element_size = self.surface_format.image_element_size_in_bytes;
        let offset = origin[0] * element_size
            + if self.desc.image_type == MemObjectType::Image1DArray {
                origin[1] * slice_pitch
            } else {
                origin[1] * row_pitch + origin[2] * slice_pitch
            };
        let region = region.map(|extent| extent.max(1));

        if !self.aliases_host_memory() {
            queue.enqueue_read_image(
                self,
                true,
                origin,
                region,
                row_pitch,
                slice_pitch,
                &memory,
                offset,
            )?;
        }

        log::trace!(
            "Image {}: mapped origin {:?} region {:?} at offset {}",
            self.mem.id(),
            origin,
            region,
            offset
        );
        *map_state = Some(MapInfo {
            memory: Arc::clone(&memory),
            offset,
            origin,
            region,
        });
        Ok(MappedRegion {
            memory,
            offset,
            row_pitch,
            slice_pitch,
        })
    }

    /// Unmap a region returned by [`map_region`](Image::map_region).
    ///
    /// Linear images go through the queue's unmap. Tiled images write the
    /// mapped bytes back with a non-blocking write, then finish the queue
    /// unless a `USE_HOST_PTR` image waits on an incomplete event.
    pub fn unmap(&self, mapped: &MappedRegion, wait_list: &[Arc<Event>]) -> Result<(), ImageError> {
        let mut queue = self.mem.context().special_queue();
        if !self.is_tiled {
            return queue.enqueue_unmap_mem_object(self, mapped);
        }

        let mut map_state = self.mem.map_state.lock();
        let info = match map_state.as_ref() {
            Some(info) if mapped.same_pointer(&info.memory, info.offset) => info.clone(),
            _ => return Err(ImageError::InvalidValue),
        };
        let region = info.region.map(|extent| extent.max(1));

        queue.enqueue_write_image(
            self,
            false,
            info.origin,
            region,
            mapped.row_pitch,
            mapped.slice_pitch,
            &info.memory,
            info.offset,
        )?;
        *map_state = None;

        let must_call_finish = !self.mem.flags().contains(MemFlags::USE_HOST_PTR)
            || InternalQueue::task_level_from_wait_list(queue.task_level(), wait_list)
                != EVENT_NOT_READY;
        if must_call_finish {
            queue.finish();
        }
        Ok(())
    }
}
