//! Static surface format tables.

use super::{ChannelOrder as O, ChannelType as T, ImageFormat, SurfaceFormatInfo};
use crate::mem_obj::MemFlags;

const fn sf(
    order: O,
    data_type: T,
    surface_format: &'static str,
    num_channels: u32,
    per_channel_size_in_bytes: u32,
    image_element_size_in_bytes: usize,
) -> SurfaceFormatInfo {
    SurfaceFormatInfo {
        format: ImageFormat::new(order, data_type),
        surface_format,
        num_channels,
        per_channel_size_in_bytes,
        image_element_size_in_bytes,
    }
}

macro_rules! common_formats {
    ($($extra:expr,)*) => {
        [
            sf(O::Rgba, T::UnormInt8, "R8G8B8A8_UNORM", 4, 1, 4),
            sf(O::Rgba, T::UnormInt16, "R16G16B16A16_UNORM", 4, 2, 8),
            sf(O::Rgba, T::SignedInt8, "R8G8B8A8_SINT", 4, 1, 4),
            sf(O::Rgba, T::SignedInt16, "R16G16B16A16_SINT", 4, 2, 8),
            sf(O::Rgba, T::SignedInt32, "R32G32B32A32_SINT", 4, 4, 16),
            sf(O::Rgba, T::UnsignedInt8, "R8G8B8A8_UINT", 4, 1, 4),
            sf(O::Rgba, T::UnsignedInt16, "R16G16B16A16_UINT", 4, 2, 8),
            sf(O::Rgba, T::UnsignedInt32, "R32G32B32A32_UINT", 4, 4, 16),
            sf(O::Rgba, T::HalfFloat, "R16G16B16A16_FLOAT", 4, 2, 8),
            sf(O::Rgba, T::Float, "R32G32B32A32_FLOAT", 4, 4, 16),
            sf(O::Bgra, T::UnormInt8, "B8G8R8A8_UNORM", 4, 1, 4),
            sf(O::R, T::Float, "R32_FLOAT", 1, 4, 4),
            sf(O::R, T::UnormInt8, "R8_UNORM", 1, 1, 1),
            sf(O::R, T::UnormInt16, "R16_UNORM", 1, 2, 2),
            sf(O::R, T::SignedInt8, "R8_SINT", 1, 1, 1),
            sf(O::R, T::SignedInt16, "R16_SINT", 1, 2, 2),
            sf(O::R, T::SignedInt32, "R32_SINT", 1, 4, 4),
            sf(O::R, T::UnsignedInt8, "R8_UINT", 1, 1, 1),
            sf(O::R, T::UnsignedInt16, "R16_UINT", 1, 2, 2),
            sf(O::R, T::UnsignedInt32, "R32_UINT", 1, 4, 4),
            sf(O::R, T::HalfFloat, "R16_FLOAT", 1, 2, 2),
            sf(O::A, T::UnormInt8, "A8_UNORM", 1, 1, 1),
            sf(O::Rg, T::UnormInt8, "R8G8_UNORM", 2, 1, 2),
            sf(O::Rg, T::UnormInt16, "R16G16_UNORM", 2, 2, 4),
            sf(O::Rg, T::SignedInt8, "R8G8_SINT", 2, 1, 2),
            sf(O::Rg, T::SignedInt16, "R16G16_SINT", 2, 2, 4),
            sf(O::Rg, T::SignedInt32, "R32G32_SINT", 2, 4, 8),
            sf(O::Rg, T::UnsignedInt8, "R8G8_UINT", 2, 1, 2),
            sf(O::Rg, T::UnsignedInt16, "R16G16_UINT", 2, 2, 4),
            sf(O::Rg, T::UnsignedInt32, "R32G32_UINT", 2, 4, 8),
            sf(O::Rg, T::HalfFloat, "R16G16_FLOAT", 2, 2, 4),
            sf(O::Rg, T::Float, "R32G32_FLOAT", 2, 4, 8),
            sf(O::Luminance, T::UnormInt8, "L8_UNORM", 1, 1, 1),
            sf(O::Luminance, T::UnormInt16, "L16_UNORM", 1, 2, 2),
            sf(O::Luminance, T::HalfFloat, "L16_FLOAT", 1, 2, 2),
            sf(O::Luminance, T::Float, "L32_FLOAT", 1, 4, 4),
            sf(O::Intensity, T::UnormInt8, "I8_UNORM", 1, 1, 1),
            sf(O::Intensity, T::UnormInt16, "I16_UNORM", 1, 2, 2),
            sf(O::Intensity, T::HalfFloat, "I16_FLOAT", 1, 2, 2),
            sf(O::Intensity, T::Float, "I32_FLOAT", 1, 4, 4),
            sf(O::A, T::UnormInt16, "A16_UNORM", 1, 2, 2),
            sf(O::A, T::HalfFloat, "A16_FLOAT", 1, 2, 2),
            sf(O::A, T::Float, "A32_FLOAT", 1, 4, 4),
            $($extra,)*
        ]
    };
}

/// Formats readable by kernels.
pub static READ_ONLY_SURFACE_FORMATS: [SurfaceFormatInfo; 45] = common_formats![
    sf(O::Srgba, T::UnormInt8, "R8G8B8A8_UNORM_SRGB", 4, 1, 4),
    sf(O::Sbgra, T::UnormInt8, "B8G8R8A8_UNORM_SRGB", 4, 1, 4),
];

/// Formats writable by kernels.
pub static WRITE_ONLY_SURFACE_FORMATS: [SurfaceFormatInfo; 43] = common_formats![];

/// Formats readable and writable by kernels.
pub static READ_WRITE_SURFACE_FORMATS: [SurfaceFormatInfo; 43] = common_formats![];

pub static READ_ONLY_DEPTH_SURFACE_FORMATS: [SurfaceFormatInfo; 4] = [
    sf(O::Depth, T::Float, "R32_FLOAT", 1, 4, 4),
    sf(O::Depth, T::UnormInt16, "R16_UNORM", 1, 2, 2),
    sf(O::DepthStencil, T::UnormInt24, "R24_UNORM_X8_TYPELESS", 1, 4, 4),
    sf(O::DepthStencil, T::Float, "R32_FLOAT_X8X24_TYPELESS", 2, 4, 8),
];

pub static READ_WRITE_DEPTH_SURFACE_FORMATS: [SurfaceFormatInfo; 2] = [
    sf(O::Depth, T::Float, "R32_FLOAT", 1, 4, 4),
    sf(O::Depth, T::UnormInt16, "R16_UNORM", 1, 2, 2),
];

pub static SNORM_SURFACE_FORMATS: [SurfaceFormatInfo; 6] = [
    sf(O::R, T::SnormInt8, "R8_SNORM", 1, 1, 1),
    sf(O::R, T::SnormInt16, "R16_SNORM", 1, 2, 2),
    sf(O::Rg, T::SnormInt8, "R8G8_SNORM", 2, 1, 2),
    sf(O::Rg, T::SnormInt16, "R16G16_SNORM", 2, 2, 4),
    sf(O::Rgba, T::SnormInt8, "R8G8B8A8_SNORM", 4, 1, 4),
    sf(O::Rgba, T::SnormInt16, "R16G16B16A16_SNORM", 4, 2, 8),
];

pub static PLANAR_YUV_SURFACE_FORMATS: [SurfaceFormatInfo; 1] =
    [sf(O::Nv12, T::UnormInt8, "NV12", 1, 1, 1)];

pub static PACKED_YUV_SURFACE_FORMATS: [SurfaceFormatInfo; 4] = [
    sf(O::Yuyv, T::UnormInt8, "YCRCB_NORMAL", 2, 1, 2),
    sf(O::Uyvy, T::UnormInt8, "YCRCB_SWAPY", 2, 1, 2),
    sf(O::Yvyu, T::UnormInt8, "YCRCB_SWAPUV", 2, 1, 2),
    sf(O::Vyuy, T::UnormInt8, "YCRCB_SWAPUVY", 2, 1, 2),
];

/// Table a format is looked up in for the given access flags.
fn select_table(flags: MemFlags, format: &ImageFormat) -> &'static [SurfaceFormatInfo] {
    let depth = format.is_depth_format();
    if super::is_nv12_image(format) {
        &PLANAR_YUV_SURFACE_FORMATS
    } else if super::is_packed_yuv_image(format) {
        &PACKED_YUV_SURFACE_FORMATS
    } else if format.is_snorm_format() {
        &SNORM_SURFACE_FORMATS
    } else if flags.contains(MemFlags::READ_ONLY) {
        if depth {
            &READ_ONLY_DEPTH_SURFACE_FORMATS
        } else {
            &READ_ONLY_SURFACE_FORMATS
        }
    } else if flags.contains(MemFlags::WRITE_ONLY) {
        if depth {
            &READ_WRITE_DEPTH_SURFACE_FORMATS
        } else {
            &WRITE_ONLY_SURFACE_FORMATS
        }
    } else if depth {
        &READ_WRITE_DEPTH_SURFACE_FORMATS
    } else {
        &READ_WRITE_SURFACE_FORMATS
    }
}

/// Look up the surface format backing `format` for images created with `flags`.
///
/// Returns `None` when the format is absent or not in the selected table.
pub fn get_surface_format_from_table(
    flags: MemFlags,
    format: Option<&ImageFormat>,
) -> Option<&'static SurfaceFormatInfo> {
    let format = format?;
    select_table(flags, format)
        .iter()
        .find(|info| info.format == *format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_consistent() {
        let tables: [&[SurfaceFormatInfo]; 8] = [
            &READ_ONLY_SURFACE_FORMATS,
            &WRITE_ONLY_SURFACE_FORMATS,
            &READ_WRITE_SURFACE_FORMATS,
            &READ_ONLY_DEPTH_SURFACE_FORMATS,
            &READ_WRITE_DEPTH_SURFACE_FORMATS,
            &SNORM_SURFACE_FORMATS,
            &PLANAR_YUV_SURFACE_FORMATS,
            &PACKED_YUV_SURFACE_FORMATS,
        ];
        for table in tables {
            for info in table {
                assert!(info.format.is_valid(), "{:?} is not a valid format", info.format);
                assert_eq!(
                    info.bytes_per_pixel() as usize,
                    info.image_element_size_in_bytes,
                    "{}",
                    info.surface_format
                );
            }
        }
    }

    #[test]
    fn test_srgb_only_read_only() {
        let srgba = ImageFormat::new(O::Srgba, T::UnormInt8);
        assert!(get_surface_format_from_table(MemFlags::READ_ONLY, Some(&srgba)).is_some());
        assert!(get_surface_format_from_table(MemFlags::READ_WRITE, Some(&srgba)).is_none());
        assert!(get_surface_format_from_table(MemFlags::WRITE_ONLY, Some(&srgba)).is_none());
    }

    #[test]
    fn test_depth_stencil_only_read_only() {
        let ds = ImageFormat::new(O::DepthStencil, T::UnormInt24);
        assert!(get_surface_format_from_table(MemFlags::READ_ONLY, Some(&ds)).is_some());
        assert!(get_surface_format_from_table(MemFlags::READ_WRITE, Some(&ds)).is_none());
    }

    #[test]
    fn test_missing_format() {
        assert!(get_surface_format_from_table(MemFlags::READ_WRITE, None).is_none());
        let rgb = ImageFormat::new(O::Rgb, T::UnormShort565);
        assert!(get_surface_format_from_table(MemFlags::READ_WRITE, Some(&rgb)).is_none());
    }

    #[test]
    fn test_read_write_lookup() {
        let rg = ImageFormat::new(O::Rg, T::UnsignedInt32);
        let info = get_surface_format_from_table(MemFlags::READ_WRITE, Some(&rg)).unwrap();
        assert_eq!(info.image_element_size_in_bytes, 8);
    }
}
