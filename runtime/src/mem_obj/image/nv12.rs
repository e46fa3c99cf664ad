//! Writes to NV12 images, one plane at a time.

use std::sync::Arc;

use xpu_core::memory::HostMemory;

use super::{Image, ImageDescriptor};
use crate::error::ImageError;
use crate::formats::{get_surface_format_from_table, ChannelOrder, ChannelType, ImageFormat};
use crate::mem_obj::{MemFlags, MemObjectType};

impl Image {
    /// Upload host NV12 data: the Y plane rows followed by the interleaved
    /// UV rows, both `host_row_pitch` apart.
    ///
    /// Each plane is written through a plane view (`R` for Y, `RG` for UV at
    /// half resolution) on the context's internal queue.
    pub fn write_nv12_planes(
        self: &Arc<Self>,
        host: &Arc<HostMemory>,
        host_row_pitch: usize,
    ) -> Result<(), ImageError> {
        let context = self.mem.context();
        let flags = MemFlags::READ_WRITE;
        let mut region = [self.desc.width, self.desc.height, 1];

        let y_format = ImageFormat::new(ChannelOrder::R, ChannelType::UnormInt8);
        let y_surface = get_surface_format_from_table(flags, Some(&y_format))
            .ok_or(ImageError::FormatNotSupported)?;
        let mut plane_desc = ImageDescriptor::new(MemObjectType::Image2D, 0, 0)
            .with_depth(0)
            .with_mem_object(Arc::clone(self));
        let y_plane = Image::create(context, flags, y_surface, &plane_desc, None)?;
        context.special_queue().enqueue_write_image(
            &y_plane,
            true,
            [0, 0, 0],
            region,
            host_row_pitch,
            0,
            host,
            0,
        )?;

        region[0] /= 2;
        region[1] /= 2;
        plane_desc.depth = 1;
        let uv_format = ImageFormat::new(ChannelOrder::Rg, ChannelType::UnormInt8);
        let uv_surface = get_surface_format_from_table(flags, Some(&uv_format))
            .ok_or(ImageError::FormatNotSupported)?;
        let uv_plane = Image::create(context, flags, uv_surface, &plane_desc, None)?;
        context.special_queue().enqueue_write_image(
            &uv_plane,
            true,
            [0, 0, 0],
            region,
            host_row_pitch,
            0,
            host,
            host_row_pitch * self.desc.height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::formats::SurfaceFormatInfo;
    use xpu_core::device::Device;
    use xpu_core::hw_info::HardwareInfo;

    fn nv12() -> &'static SurfaceFormatInfo {
        let format = ImageFormat::new(ChannelOrder::Nv12, ChannelType::UnormInt8);
        get_surface_format_from_table(MemFlags::HOST_NO_ACCESS, Some(&format)).unwrap()
    }

    fn context() -> Arc<Context> {
        Context::new(Device::with_settings(HardwareInfo::skylake(), Default::default()))
    }

    #[test]
    fn test_plane_views() {
        let context = context();
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 8, 8);
        let parent = Image::create(&context, MemFlags::HOST_NO_ACCESS, nv12(), &desc, None).unwrap();

        let y_format = ImageFormat::new(ChannelOrder::R, ChannelType::UnormInt8);
        let y_surface = get_surface_format_from_table(MemFlags::READ_WRITE, Some(&y_format)).unwrap();
        let y_desc = ImageDescriptor::new(MemObjectType::Image2D, 0, 0).with_mem_object(Arc::clone(&parent));
        let y_plane = Image::create(&context, MemFlags::READ_WRITE, y_surface, &y_desc, None).unwrap();
        assert_eq!((y_plane.image_desc().width, y_plane.image_desc().height), (8, 8));
        assert_eq!(y_plane.media_plane_type(), 0);
        assert_eq!(y_plane.surface_offsets().offset, 0);

        let uv_format = ImageFormat::new(ChannelOrder::Rg, ChannelType::UnormInt8);
        let uv_surface = get_surface_format_from_table(MemFlags::READ_WRITE, Some(&uv_format)).unwrap();
        let uv_desc = y_desc.clone().with_depth(1);
        let uv_plane = Image::create(&context, MemFlags::READ_WRITE, uv_surface, &uv_desc, None).unwrap();
        assert_eq!((uv_plane.image_desc().width, uv_plane.image_desc().height), (4, 4));
        assert_eq!(uv_plane.media_plane_type(), 1);
        assert_eq!(
            uv_plane.surface_offsets().offset,
            parent.layout().y_offset_for_uv_plane * parent.image_row_pitch()
        );
        assert!(Arc::ptr_eq(
            uv_plane.mem_obj().graphics_allocation(),
            parent.mem_obj().graphics_allocation()
        ));
        assert_eq!(parent.mem_obj().internal_ref_count(), 2);
    }

    #[test]
    fn test_write_nv12_planes() {
        let context = context();
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 4, 4);
        let image = Image::create(&context, MemFlags::HOST_NO_ACCESS, nv12(), &desc, None).unwrap();

        // Four Y rows of 4 bytes, then two UV rows of 4 bytes.
        let host = HostMemory::new((1..=24).collect());
        image.write_nv12_planes(&host, 4).unwrap();
        assert_eq!(context.special_queue().task_level(), 2);

        let layout = image.layout();
        let allocation = image.mem_obj().graphics_allocation();
        let pixel = |x: usize, y: usize| allocation.read(layout.byte_offset(x, y, 0), 1)[0];
        assert_eq!(pixel(0, 0), 1);
        assert_eq!(pixel(3, 3), 16);
        let uv_row = layout.y_offset_for_uv_plane;
        assert_eq!(pixel(0, uv_row), 17);
        assert_eq!(pixel(3, uv_row + 1), 24);
        assert_eq!(image.mem_obj().internal_ref_count(), 0);
    }
}
