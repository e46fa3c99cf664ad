//! Views of an image with an equivalent unsigned integer format.
//!
//! Fill and copy kernels work on raw bits; these views share the source's
//! allocation and layout and only change how a pixel is interpreted.

use std::sync::Arc;

use super::{Image, ImageParams};
use crate::formats::{SurfaceFormatInfo, READ_WRITE_SURFACE_FORMATS};
use crate::mem_obj::{MemFlags, MemObjectRef, ParentPin};

/// Read-write table entries by `[bytes per channel / 2][channels / 2]`:
/// R, RG and RGBA with 8, 16 and 32 bit unsigned channels.
const FILL_FORMAT_INDICES: [[usize; 3]; 3] = [[17, 27, 5], [18, 28, 6], [19, 29, 7]];

/// Read-write table entries by `log2(bytes per pixel)`: R8, R16, R32,
/// RG32 and RGBA32 unsigned.
const BYTES_FORMAT_INDICES: [usize; 5] = [17, 18, 19, 29, 7];

impl Image {
    /// View keeping the channel count with unsigned integer channels of the
    /// same width.
    pub fn redescribe_fill_image(self: &Arc<Self>) -> Arc<Image> {
        let row = self.surface_format.per_channel_size_in_bytes as usize / 2;
        let column = self.surface_format.num_channels as usize / 2;
        self.redescribed_as(&READ_WRITE_SURFACE_FORMATS[FILL_FORMAT_INDICES[row][column]])
    }

    /// View with an unsigned integer format of the same pixel size.
    pub fn redescribe(self: &Arc<Self>) -> Arc<Image> {
        let exponent = self.surface_format.bytes_per_pixel().ilog2() as usize;
        self.redescribed_as(&READ_WRITE_SURFACE_FORMATS[BYTES_FORMAT_INDICES[exponent % 5]])
    }

    fn redescribed_as(self: &Arc<Self>, surface_format: &'static SurfaceFormatInfo) -> Arc<Image> {
        log::trace!(
            "Image {}: redescribed from {} to {}",
            self.mem.id(),
            self.surface_format.surface_format,
            surface_format.surface_format
        );
        let params = ImageParams {
            context: Arc::clone(self.mem.context()),
            flags: self.mem.flags() | MemFlags::USE_HOST_PTR,
            host_ptr: self.mem.host_ptr().cloned(),
            allocation: Arc::clone(self.mem.graphics_allocation()),
            owns_allocation: false,
            zero_copy: self.mem.is_mem_obj_zero_copy(),
            is_object_redescribed: true,
            surface_format,
            desc: self.desc.clone(),
            layout: self.layout,
            is_tiled: self.is_tiled,
            mip_level: self.mip_level,
            surface_offsets: self.surface_offsets,
            cube_face_index: self.cube_face_index,
            media_plane_type: self.media_plane_type,
            host_ptr_row_pitch: self.host_ptr_row_pitch,
            host_ptr_slice_pitch: self.host_ptr_slice_pitch,
            image_count: self.image_count,
            host_ptr_min_size: self.host_ptr_min_size,
            parent: Some(ParentPin::new(MemObjectRef::Image(Arc::clone(self)))),
        };
        let mut image = (self.create_function)(params);
        image.create_function = self.create_function;
        Arc::new(image)
    }
}
