//! Copies between host memory and image surfaces.

use std::sync::Arc;

use xpu_core::memory::{BackingStore, HostMemory};

use super::{Image, ImageDescriptor};
use crate::error::ImageError;
use crate::mem_obj::MemObjectType;

/// Bytes of host memory spanned by `region` with the given pitches.
///
/// 1D array layers are `slice_pitch` apart. A zero extent spans no rows or
/// slices beyond the first.
pub fn calculate_host_ptr_size(
    region: [usize; 3],
    row_pitch: usize,
    slice_pitch: usize,
    pixel_size: usize,
    image_type: MemObjectType,
) -> usize {
    let row = region[0] * pixel_size;
    match image_type {
        MemObjectType::Image1D | MemObjectType::Image1DBuffer => row,
        MemObjectType::Image2D => region[1].saturating_sub(1) * row_pitch + row,
        MemObjectType::Image1DArray => region[1].saturating_sub(1) * slice_pitch + row,
        MemObjectType::Image3D | MemObjectType::Image2DArray => {
            region[2].saturating_sub(1) * slice_pitch + region[1].saturating_sub(1) * row_pitch + row
        }
        MemObjectType::Buffer => {
            log::warn!("calculate_host_ptr_size called for a buffer");
            0
        }
    }
}

/// Copy a whole linear image between two memories with their own pitches.
///
/// `image_count` array layers and `desc.depth` slices are copied; each layer
/// or slice starts a multiple of the slice pitch into the memory.
#[allow(clippy::too_many_arguments)]
pub fn transfer_data(
    src: &BackingStore,
    src_row_pitch: usize,
    src_slice_pitch: usize,
    dst: &BackingStore,
    dst_row_pitch: usize,
    dst_slice_pitch: usize,
    desc: &ImageDescriptor,
    pixel_size: usize,
    image_count: usize,
) {
    let height = desc.height.max(1);
    let depth = desc.depth.max(1);
    let line_width = desc.width.max(1) * pixel_size;
    let mut line = vec![0u8; line_width];

    log::trace!(
        "transfer_data: {} lines of {} bytes, {} slices, {} images",
        height,
        line_width,
        depth,
        image_count
    );
    for count in 0..image_count {
        for z in 0..depth {
            let current_image = z.max(count);
            let mut src_at = src_slice_pitch * current_image;
            let mut dst_at = dst_slice_pitch * current_image;
            for _ in 0..height {
                src.read(src_at, &mut line);
                dst.write(dst_at, &line);
                src_at += src_row_pitch;
                dst_at += dst_row_pitch;
            }
        }
    }
}

/// Direction of a region copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CopyDirection {
    HostToImage,
    ImageToHost,
}

/// Copy `region` at `origin` between host memory and the image surface.
///
/// Host rows are `row_pitch` apart and slices (or 1D array layers)
/// `slice_pitch` apart; zero pitches mean tightly packed. Tiled surfaces
/// are walked in contiguous runs.
#[allow(clippy::too_many_arguments)]
pub(crate) fn copy_image_region(
    image: &Image,
    origin: [usize; 3],
    region: [usize; 3],
    host: &BackingStore,
    host_offset: usize,
    row_pitch: usize,
    slice_pitch: usize,
    direction: CopyDirection,
) -> Result<(), ImageError> {
    let extent = image.copy_extent();
    for axis in 0..3 {
        if region[axis] == 0 || origin[axis] + region[axis] > extent[axis] {
            return Err(ImageError::InvalidValue);
        }
    }

    let is_1d_array = image.image_desc().image_type == MemObjectType::Image1DArray;
    let element_size = image.surface_format_info().image_element_size_in_bytes;
    let bytes = region[0] * element_size;
    let row_pitch = if row_pitch == 0 { bytes } else { row_pitch };
    let slice_pitch = match slice_pitch {
        0 if is_1d_array => row_pitch,
        0 => row_pitch * region[1],
        pitch => pitch,
    };
    let host_row_offset = |y: usize, z: usize| {
        if is_1d_array {
            y * slice_pitch
        } else {
            z * slice_pitch + y * row_pitch
        }
    };

    let host_end = host_offset + host_row_offset(region[1] - 1, region[2] - 1) + bytes;
    if host_end > host.len() {
        return Err(ImageError::InvalidValue);
    }

    let layout = image.layout();
    let store = image.mem_obj().graphics_allocation().store();
    let x0 = origin[0] * element_size;
    let mut line = vec![0u8; bytes];

    for z in 0..region[2] {
        for y in 0..region[1] {
            let host_at = host_offset + host_row_offset(y, z);
            let (row, slice) = if is_1d_array {
                (0, origin[1] + y)
            } else {
                (origin[1] + y, origin[2] + z)
            };

            if direction == CopyDirection::HostToImage {
                host.read(host_at, &mut line);
            }
            let mut done = 0;
            while done < bytes {
                let x = x0 + done;
                let run = layout.contiguous_run(x, bytes - done);
                let at = layout.byte_offset(x, row, slice);
                match direction {
                    CopyDirection::HostToImage => store.write(at, &line[done..done + run]),
                    CopyDirection::ImageToHost => store.read(at, &mut line[done..done + run]),
                }
                done += run;
            }
            if direction == CopyDirection::ImageToHost {
                host.write(host_at, &line);
            }
        }
    }
    Ok(())
}

impl Image {
    /// Copy the surface into the host memory the image was created on.
    ///
    /// Only meaningful for linear images with a host pointer.
    pub fn transfer_data_to_host_ptr(&self) -> Option<&Arc<HostMemory>> {
        let host = self.mem.host_ptr()?;
        debug_assert!(!self.is_tiled, "tiled images are transferred by the queue");
        transfer_data(
            self.mem.graphics_allocation().store(),
            self.image_row_pitch(),
            self.image_slice_pitch(),
            host.store(),
            self.host_ptr_row_pitch,
            self.host_ptr_slice_pitch,
            &self.desc,
            self.surface_format.image_element_size_in_bytes,
            self.image_count,
        );
        Some(host)
    }

    /// Copy the host memory the image was created on into its surface.
    pub fn transfer_data_from_host_ptr_to_memory_storage(&self) {
        let Some(host) = self.mem.host_ptr() else {
            return;
        };
        debug_assert!(!self.is_tiled, "tiled images are transferred by the queue");
        transfer_data(
            host.store(),
            self.host_ptr_row_pitch,
            self.host_ptr_slice_pitch,
            self.mem.graphics_allocation().store(),
            self.image_row_pitch(),
            self.image_slice_pitch(),
            &self.desc,
            self.surface_format.image_element_size_in_bytes,
            self.image_count,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::image_1d(MemObjectType::Image1D, [5, 1, 1], 4 * 5)]
    #[case::image_1d_buffer(MemObjectType::Image1DBuffer, [5, 1, 1], 4 * 5)]
    #[case::image_2d(MemObjectType::Image2D, [5, 3, 1], 2 * 64 + 4 * 5)]
    #[case::image_1d_array(MemObjectType::Image1DArray, [5, 3, 1], 2 * 1024 + 4 * 5)]
    #[case::image_2d_array(MemObjectType::Image2DArray, [5, 3, 2], 1024 + 2 * 64 + 4 * 5)]
    #[case::image_3d(MemObjectType::Image3D, [5, 3, 4], 3 * 1024 + 2 * 64 + 4 * 5)]
    #[case::image_2d_zero_height(MemObjectType::Image2D, [5, 0, 1], 4 * 5)]
    #[case::image_1d_array_zero_layers(MemObjectType::Image1DArray, [5, 0, 1], 4 * 5)]
    #[case::image_3d_zero_depth(MemObjectType::Image3D, [5, 3, 0], 2 * 64 + 4 * 5)]
    fn test_calculate_host_ptr_size(
        #[case] image_type: MemObjectType,
        #[case] region: [usize; 3],
        #[case] expected: usize,
    ) {
        assert_eq!(calculate_host_ptr_size(region, 64, 1024, 4, image_type), expected);
    }

    #[test]
    fn test_transfer_data_repitches_rows() {
        let src = BackingStore::from_vec((0..12).collect());
        let dst = BackingStore::zeroed(16);
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 2, 3);
        // 2 pixels of 2 bytes, source rows 4 bytes apart, destination rows 5 apart.
        transfer_data(&src, 4, 0, &dst, 5, 0, &desc, 2, 1);
        assert_eq!(
            dst.snapshot(),
            vec![0, 1, 2, 3, 0, 4, 5, 6, 7, 0, 8, 9, 10, 11, 0, 0]
        );
    }

    #[test]
    fn test_transfer_data_array_layers() {
        let src = BackingStore::from_vec(vec![1, 1, 2, 2]);
        let dst = BackingStore::zeroed(8);
        let desc = ImageDescriptor::new(MemObjectType::Image1DArray, 2, 0).with_array_size(2);
        transfer_data(&src, 2, 2, &dst, 4, 4, &desc, 1, 2);
        assert_eq!(dst.snapshot(), vec![1, 1, 0, 0, 2, 2, 0, 0]);
    }
}
