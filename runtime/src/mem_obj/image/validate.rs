//! Image argument validation.
//!
//! Every check returns the first violated constraint; nothing is allocated
//! before validation passes.

use std::sync::Arc;

use xpu_core::hw_info::{
    Image2dMaxHeight, Image2dMaxWidth, Image3dMaxDepth, Image3dMaxHeight, Image3dMaxWidth,
    ImageBaseAddressAlignment, ImageMaxArraySize, ImageMaxBufferSize, ImagePitchAlignment,
    PlanarYuvMaxHeight, PlanarYuvMaxWidth,
};
use xpu_core::memory::HostMemory;

use super::{create::allow_tiling, Image, ImageDescriptor};
use crate::context::Context;
use crate::error::ImageError;
use crate::formats::{
    get_surface_format_from_table, is_nv12_image, is_packed_yuv_image, ImageFormat,
    SurfaceFormatInfo,
};
use crate::mem_obj::{MemFlags, MemObjectType};

fn check(failed: bool, error: ImageError) -> Result<(), ImageError> {
    if failed {
        Err(error)
    } else {
        Ok(())
    }
}

impl Image {
    /// Validate an image request against the device limits.
    pub fn validate(
        context: &Context,
        flags: MemFlags,
        surface_format: Option<&SurfaceFormatInfo>,
        desc: &ImageDescriptor,
        host_ptr: Option<&Arc<HostMemory>>,
    ) -> Result<(), ImageError> {
        let surface_format = surface_format.ok_or(ImageError::FormatNotSupported)?;
        let device = context.device();
        let element_size = surface_format.image_element_size_in_bytes;
        let max_2d_width = device.get_cap::<Image2dMaxWidth>();
        let max_2d_height = device.get_cap::<Image2dMaxHeight>();
        let max_array_size = device.get_cap::<ImageMaxArraySize>();

        match desc.image_type {
            MemObjectType::Image2D => {
                check(
                    desc.width > max_2d_width || desc.height > max_2d_height,
                    ImageError::InvalidImageSize,
                )?;
                if let Some(mem_object) = &desc.mem_object {
                    if let Some(buffer) = mem_object.as_buffer() {
                        let pitch_alignment = device.get_cap::<ImagePitchAlignment>() as usize;
                        let base_alignment = device.get_cap::<ImageBaseAddressAlignment>() as u64;
                        let misaligned_host = buffer.flags().contains(MemFlags::USE_HOST_PTR)
                            && buffer
                                .host_ptr()
                                .map_or(false, |host| host.address() % base_alignment != 0);
                        let row_bytes = if desc.row_pitch != 0 {
                            desc.row_pitch
                        } else {
                            desc.width * element_size
                        };
                        let required = desc
                            .height
                            .checked_mul(row_bytes)
                            .ok_or(ImageError::InvalidImageSize)?;
                        check(
                            desc.row_pitch % pitch_alignment != 0
                                || misaligned_host
                                || required > buffer.size(),
                            ImageError::InvalidImageFormatDescriptor,
                        )?;
                        check(
                            flags.intersects(MemFlags::USE_HOST_PTR | MemFlags::COPY_HOST_PTR),
                            ImageError::InvalidValue,
                        )?;
                    }
                } else {
                    check(
                        desc.width == 0 || desc.height == 0,
                        ImageError::InvalidImageDescriptor,
                    )?;
                }
            }
            MemObjectType::Image1D => {
                check(desc.width == 0, ImageError::InvalidImageDescriptor)?;
                check(desc.width > max_2d_width, ImageError::InvalidImageSize)?;
            }
            MemObjectType::Image1DBuffer => {
                let buffer = desc
                    .parent_buffer()
                    .ok_or(ImageError::InvalidImageDescriptor)?;
                check(desc.width == 0, ImageError::InvalidImageDescriptor)?;
                check(
                    desc.width > device.get_cap::<ImageMaxBufferSize>()
                        || desc.width * element_size > buffer.size(),
                    ImageError::InvalidImageSize,
                )?;
            }
            MemObjectType::Image1DArray => {
                check(
                    desc.width == 0 || desc.array_size == 0,
                    ImageError::InvalidImageDescriptor,
                )?;
                check(
                    desc.width > max_2d_width || desc.array_size > max_array_size,
                    ImageError::InvalidImageSize,
                )?;
            }
            MemObjectType::Image2DArray => {
                check(
                    desc.width == 0 || desc.height == 0 || desc.array_size == 0,
                    ImageError::InvalidImageDescriptor,
                )?;
                check(
                    desc.width > max_2d_width
                        || desc.height > max_2d_height
                        || desc.array_size > max_array_size,
                    ImageError::InvalidImageSize,
                )?;
            }
            MemObjectType::Image3D => {
                check(
                    desc.width == 0 || desc.height == 0 || desc.depth == 0,
                    ImageError::InvalidImageDescriptor,
                )?;
                check(
                    desc.width > device.get_cap::<Image3dMaxWidth>()
                        || desc.height > device.get_cap::<Image3dMaxHeight>()
                        || desc.depth > device.get_cap::<Image3dMaxDepth>(),
                    ImageError::InvalidImageSize,
                )?;
            }
            MemObjectType::Buffer => return Err(ImageError::InvalidImageDescriptor),
        }

        if host_ptr.is_none() {
            check(
                desc.row_pitch != 0 && desc.mem_object.is_none(),
                ImageError::InvalidImageDescriptor,
            )?;
        } else if desc.row_pitch != 0 {
            check(
                desc.row_pitch % element_size != 0 || desc.row_pitch < desc.width * element_size,
                ImageError::InvalidImageDescriptor,
            )?;
            let host_size = [desc.height, desc.depth, desc.array_size]
                .into_iter()
                .map(|extent| extent.max(1))
                .try_fold(desc.row_pitch, usize::checked_mul);
            check(host_size.is_none(), ImageError::InvalidImageSize)?;
        }

        check(
            desc.mem_object.is_some()
                && !matches!(
                    desc.image_type,
                    MemObjectType::Image1DBuffer | MemObjectType::Image2D
                ),
            ImageError::InvalidImageFormatDescriptor,
        )?;
        if let Some(parent) = desc.parent_image() {
            check(
                !is_nv12_image(parent.image_format()),
                ImageError::InvalidImageDescriptor,
            )?;
        }

        Self::validate_image_traits(context, flags, &surface_format.format, desc, host_ptr)
    }

    /// Check that `format` is a well formed (order, type) pair.
    pub fn validate_image_format(format: Option<&ImageFormat>) -> Result<(), ImageError> {
        let format = format.ok_or(ImageError::InvalidImageFormatDescriptor)?;
        check(!format.is_valid(), ImageError::FormatNotSupported)
    }

    /// Extra rules for NV12 images and plane views.
    pub fn validate_planar_yuv(
        context: &Context,
        flags: MemFlags,
        desc: &ImageDescriptor,
        _host_ptr: Option<&Arc<HostMemory>>,
    ) -> Result<(), ImageError> {
        if let Some(mem_object) = &desc.mem_object {
            let parent = mem_object
                .as_image()
                .ok_or(ImageError::InvalidImageDescriptor)?;
            if parent.mem_obj().object_type() == MemObjectType::Image2D {
                check(desc.depth > 1, ImageError::InvalidImageDescriptor)?;
            }
            return Ok(());
        }

        check(!flags.contains(MemFlags::HOST_NO_ACCESS), ImageError::InvalidValue)?;
        check(
            desc.height % 4 != 0
                || desc.width % 4 != 0
                || desc.image_type != MemObjectType::Image2D,
            ImageError::InvalidImageDescriptor,
        )?;

        let device = context.device();
        check(
            desc.width > device.get_cap::<PlanarYuvMaxWidth>()
                || desc.height > device.get_cap::<PlanarYuvMaxHeight>(),
            ImageError::InvalidImageSize,
        )
    }

    /// Extra rules for packed 4:2:2 YUV images.
    pub fn validate_packed_yuv(flags: MemFlags, desc: &ImageDescriptor) -> Result<(), ImageError> {
        check(!flags.contains(MemFlags::READ_ONLY), ImageError::InvalidValue)?;
        check(
            desc.width % 2 != 0 || desc.image_type != MemObjectType::Image2D,
            ImageError::InvalidImageDescriptor,
        )
    }

    /// Format-specific rules.
    pub fn validate_image_traits(
        context: &Context,
        flags: MemFlags,
        format: &ImageFormat,
        desc: &ImageDescriptor,
        host_ptr: Option<&Arc<HostMemory>>,
    ) -> Result<(), ImageError> {
        if is_nv12_image(format) {
            Self::validate_planar_yuv(context, flags, desc, host_ptr)
        } else if is_packed_yuv_image(format) {
            Self::validate_packed_yuv(flags, desc)
        } else {
            Ok(())
        }
    }

    /// Validate the format and description, then create the image.
    pub fn validate_and_create_image(
        context: &Arc<Context>,
        flags: MemFlags,
        format: Option<&ImageFormat>,
        desc: &ImageDescriptor,
        host_ptr: Option<&Arc<HostMemory>>,
    ) -> Result<Arc<Image>, ImageError> {
        Self::validate_image_format(format)?;
        let surface_format = get_surface_format_from_table(flags, format);
        Self::validate(context, flags, surface_format, desc, host_ptr)?;
        let surface_format = surface_format.ok_or(ImageError::FormatNotSupported)?;
        Self::create(context, flags, surface_format, desc, host_ptr)
    }

    /// Device row and slice pitch an image with this description would get.
    pub fn get_image_params(
        context: &Context,
        surface_format: &SurfaceFormatInfo,
        desc: &ImageDescriptor,
    ) -> (usize, usize) {
        let tiled = !context.is_shared_context()
            && allow_tiling(desc, context.device().settings().force_linear_images);
        let layout = desc
            .image_query(surface_format, tiled, xpu_core::layout::Plane::None)
            .query();
        (layout.row_pitch, layout.slice_pitch)
    }

    pub fn is_image_2d(image_type: MemObjectType) -> bool {
        image_type.is_image_2d()
    }

    pub fn is_image_2d_or_2d_array(image_type: MemObjectType) -> bool {
        image_type.is_image_2d_or_2d_array()
    }

    pub fn is_depth_format(format: &ImageFormat) -> bool {
        format.is_depth_format()
    }

    pub fn is_snorm_format(format: &ImageFormat) -> bool {
        format.is_snorm_format()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{ChannelOrder, ChannelType};
    use crate::mem_obj::Buffer;
    use rstest::rstest;
    use xpu_core::device::Device;
    use xpu_core::hw_info::HardwareInfo;

    fn context() -> Arc<Context> {
        Context::new(Device::with_settings(HardwareInfo::skylake(), Default::default()))
    }

    fn format(order: ChannelOrder, data_type: ChannelType) -> &'static SurfaceFormatInfo {
        let format = ImageFormat::new(order, data_type);
        get_surface_format_from_table(MemFlags::READ_ONLY, Some(&format)).unwrap()
    }

    fn rgba8() -> &'static SurfaceFormatInfo {
        format(ChannelOrder::Rgba, ChannelType::UnormInt8)
    }

    #[test]
    fn test_missing_surface_format() {
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 4, 4);
        assert_eq!(
            Image::validate(&context(), MemFlags::READ_WRITE, None, &desc, None),
            Err(ImageError::FormatNotSupported)
        );
    }

    #[rstest]
    #[case::ok_2d(ImageDescriptor::new(MemObjectType::Image2D, 4, 4), Ok(()))]
    #[case::too_wide_2d(
        ImageDescriptor::new(MemObjectType::Image2D, 16385, 4),
        Err(ImageError::InvalidImageSize)
    )]
    #[case::zero_height_2d(
        ImageDescriptor::new(MemObjectType::Image2D, 4, 0),
        Err(ImageError::InvalidImageDescriptor)
    )]
    #[case::zero_width_1d(
        ImageDescriptor::new(MemObjectType::Image1D, 0, 0),
        Err(ImageError::InvalidImageDescriptor)
    )]
    #[case::deep_3d(
        ImageDescriptor::new(MemObjectType::Image3D, 4, 4).with_depth(2049),
        Err(ImageError::InvalidImageSize)
    )]
    #[case::empty_array(
        ImageDescriptor::new(MemObjectType::Image2DArray, 4, 4),
        Err(ImageError::InvalidImageDescriptor)
    )]
    #[case::buffer_type(
        ImageDescriptor::new(MemObjectType::Buffer, 4, 0),
        Err(ImageError::InvalidImageDescriptor)
    )]
    #[case::pitch_without_host_ptr(
        ImageDescriptor::new(MemObjectType::Image2D, 4, 4).with_row_pitch(64),
        Err(ImageError::InvalidImageDescriptor)
    )]
    fn test_descriptor_checks(
        #[case] desc: ImageDescriptor,
        #[case] expected: Result<(), ImageError>,
    ) {
        let result = Image::validate(&context(), MemFlags::READ_WRITE, Some(rgba8()), &desc, None);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_host_row_pitch_checks() {
        let context = context();
        let host = HostMemory::zeroed(1024);
        let short = ImageDescriptor::new(MemObjectType::Image2D, 4, 4).with_row_pitch(8);
        assert_eq!(
            Image::validate(&context, MemFlags::USE_HOST_PTR, Some(rgba8()), &short, Some(&host)),
            Err(ImageError::InvalidImageDescriptor)
        );
        let unaligned = ImageDescriptor::new(MemObjectType::Image2D, 4, 4).with_row_pitch(18);
        assert_eq!(
            Image::validate(&context, MemFlags::USE_HOST_PTR, Some(rgba8()), &unaligned, Some(&host)),
            Err(ImageError::InvalidImageDescriptor)
        );
        let ok = ImageDescriptor::new(MemObjectType::Image2D, 4, 4).with_row_pitch(32);
        assert!(Image::validate(&context, MemFlags::USE_HOST_PTR, Some(rgba8()), &ok, Some(&host)).is_ok());
    }

    #[test]
    fn test_2d_from_buffer_checks() {
        let context = context();
        let buffer = Buffer::create(&context, MemFlags::READ_WRITE, 256, None).unwrap();
        let fits = ImageDescriptor::new(MemObjectType::Image2D, 4, 4)
            .with_mem_object(Arc::clone(&buffer));
        assert!(Image::validate(&context, MemFlags::READ_WRITE, Some(rgba8()), &fits, None).is_ok());

        let too_tall = ImageDescriptor::new(MemObjectType::Image2D, 4, 17)
            .with_mem_object(Arc::clone(&buffer));
        assert_eq!(
            Image::validate(&context, MemFlags::READ_WRITE, Some(rgba8()), &too_tall, None),
            Err(ImageError::InvalidImageFormatDescriptor)
        );

        let odd_pitch = ImageDescriptor::new(MemObjectType::Image2D, 4, 4)
            .with_row_pitch(18)
            .with_mem_object(Arc::clone(&buffer));
        assert_eq!(
            Image::validate(&context, MemFlags::READ_WRITE, Some(rgba8()), &odd_pitch, None),
            Err(ImageError::InvalidImageFormatDescriptor)
        );

        assert_eq!(
            Image::validate(&context, MemFlags::COPY_HOST_PTR, Some(rgba8()), &fits, None),
            Err(ImageError::InvalidValue)
        );
    }

    #[test]
    fn test_1d_buffer_requires_buffer() {
        let context = context();
        let desc = ImageDescriptor::new(MemObjectType::Image1DBuffer, 16, 0);
        assert_eq!(
            Image::validate(&context, MemFlags::READ_WRITE, Some(rgba8()), &desc, None),
            Err(ImageError::InvalidImageDescriptor)
        );

        let buffer = Buffer::create(&context, MemFlags::READ_WRITE, 32, None).unwrap();
        let too_long = desc.with_mem_object(buffer);
        assert_eq!(
            Image::validate(&context, MemFlags::READ_WRITE, Some(rgba8()), &too_long, None),
            Err(ImageError::InvalidImageSize)
        );
    }

    #[test]
    fn test_parent_only_for_1d_buffer_and_2d() {
        let context = context();
        let buffer = Buffer::create(&context, MemFlags::READ_WRITE, 4096, None).unwrap();
        let desc = ImageDescriptor::new(MemObjectType::Image3D, 4, 4)
            .with_depth(4)
            .with_mem_object(buffer);
        assert_eq!(
            Image::validate(&context, MemFlags::READ_WRITE, Some(rgba8()), &desc, None),
            Err(ImageError::InvalidImageFormatDescriptor)
        );
    }

    #[test]
    fn test_planar_yuv_rules() {
        let context = context();
        let nv12 = ImageFormat::new(ChannelOrder::Nv12, ChannelType::UnormInt8);
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 8, 8);
        assert_eq!(
            Image::validate_image_traits(&context, MemFlags::READ_WRITE, &nv12, &desc, None),
            Err(ImageError::InvalidValue)
        );
        let odd = ImageDescriptor::new(MemObjectType::Image2D, 6, 8);
        assert_eq!(
            Image::validate_image_traits(&context, MemFlags::HOST_NO_ACCESS, &nv12, &odd, None),
            Err(ImageError::InvalidImageDescriptor)
        );
        let huge = ImageDescriptor::new(MemObjectType::Image2D, 8, 16356);
        assert_eq!(
            Image::validate_image_traits(&context, MemFlags::HOST_NO_ACCESS, &nv12, &huge, None),
            Err(ImageError::InvalidImageSize)
        );
        assert!(
            Image::validate_image_traits(&context, MemFlags::HOST_NO_ACCESS, &nv12, &desc, None)
                .is_ok()
        );
    }

    #[test]
    fn test_packed_yuv_rules() {
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 8, 8);
        assert_eq!(
            Image::validate_packed_yuv(MemFlags::READ_WRITE, &desc),
            Err(ImageError::InvalidValue)
        );
        let odd = ImageDescriptor::new(MemObjectType::Image2D, 7, 8);
        assert_eq!(
            Image::validate_packed_yuv(MemFlags::READ_ONLY, &odd),
            Err(ImageError::InvalidImageDescriptor)
        );
        assert!(Image::validate_packed_yuv(MemFlags::READ_ONLY, &desc).is_ok());
    }

    #[test]
    fn test_validate_image_format() {
        assert_eq!(
            Image::validate_image_format(None),
            Err(ImageError::InvalidImageFormatDescriptor)
        );
        let rgb565 = ImageFormat::new(ChannelOrder::Rgb, ChannelType::UnormShort565);
        assert!(Image::validate_image_format(Some(&rgb565)).is_ok());
        let bad = ImageFormat::new(ChannelOrder::Rgb, ChannelType::Float);
        assert_eq!(
            Image::validate_image_format(Some(&bad)),
            Err(ImageError::FormatNotSupported)
        );
    }

    #[test]
    fn test_get_image_params() {
        let context = context();
        let desc = ImageDescriptor::new(MemObjectType::Image1D, 10, 0);
        assert_eq!(Image::get_image_params(&context, rgba8(), &desc), (64, 64));
    }
}
