//! Image formats and the surface format tables.
//!
//! An [`ImageFormat`] is an API-level (channel order, channel type) pair. The
//! driver supports a subset of them, listed in static [`SurfaceFormatInfo`]
//! tables selected by access flags (see [`get_surface_format_from_table`]).
//! The `is_valid_*` predicates describe which pairs are well formed at all.

mod tables;

pub use tables::{
    get_surface_format_from_table, PACKED_YUV_SURFACE_FORMATS, PLANAR_YUV_SURFACE_FORMATS,
    READ_ONLY_DEPTH_SURFACE_FORMATS, READ_ONLY_SURFACE_FORMATS, READ_WRITE_DEPTH_SURFACE_FORMATS,
    READ_WRITE_SURFACE_FORMATS, SNORM_SURFACE_FORMATS, WRITE_ONLY_SURFACE_FORMATS,
};

use bytemuck::{Pod, Zeroable};

macro_rules! raw_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:literal,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum $name {
            $($variant = $value,)*
        }

        impl $name {
            /// Every value.
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            /// Decode an API value.
            pub fn from_raw(raw: u32) -> Option<Self> {
                match raw {
                    $($value => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// The API value.
            pub fn raw(self) -> u32 {
                self as u32
            }
        }
    };
}

raw_enum! {
    /// Channel order (`cl_channel_order`).
    ChannelOrder {
        R = 0x10B0,
        A = 0x10B1,
        Rg = 0x10B2,
        Ra = 0x10B3,
        Rgb = 0x10B4,
        Rgba = 0x10B5,
        Bgra = 0x10B6,
        Argb = 0x10B7,
        Intensity = 0x10B8,
        Luminance = 0x10B9,
        Rx = 0x10BA,
        Rgx = 0x10BB,
        Rgbx = 0x10BC,
        Depth = 0x10BD,
        DepthStencil = 0x10BE,
        Srgb = 0x10BF,
        Srgbx = 0x10C0,
        Srgba = 0x10C1,
        Sbgra = 0x10C2,
        Abgr = 0x10C3,
        Nv12 = 0x410E,
        Yuyv = 0x4076,
        Uyvy = 0x4077,
        Yvyu = 0x4078,
        Vyuy = 0x4079,
    }
}

raw_enum! {
    /// Channel data type (`cl_channel_type`).
    ChannelType {
        SnormInt8 = 0x10D0,
        SnormInt16 = 0x10D1,
        UnormInt8 = 0x10D2,
        UnormInt16 = 0x10D3,
        UnormShort565 = 0x10D4,
        UnormShort555 = 0x10D5,
        UnormInt101010 = 0x10D6,
        SignedInt8 = 0x10D7,
        SignedInt16 = 0x10D8,
        SignedInt32 = 0x10D9,
        UnsignedInt8 = 0x10DA,
        UnsignedInt16 = 0x10DB,
        UnsignedInt32 = 0x10DC,
        HalfFloat = 0x10DD,
        Float = 0x10DE,
        UnormInt24 = 0x10DF,
        UnormInt1010102 = 0x10E0,
    }
}

/// An API image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageFormat {
    pub order: ChannelOrder,
    pub data_type: ChannelType,
}

/// Wire layout of an [`ImageFormat`] (`cl_image_format`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RawImageFormat {
    pub image_channel_order: u32,
    pub image_channel_data_type: u32,
}

const NORMALIZED_AND_FLOAT: &[ChannelType] = &[
    ChannelType::UnormInt8,
    ChannelType::UnormInt16,
    ChannelType::SnormInt8,
    ChannelType::SnormInt16,
    ChannelType::HalfFloat,
    ChannelType::Float,
];

const ALL_COMPONENT_TYPES: &[ChannelType] = &[
    ChannelType::UnormInt8,
    ChannelType::UnormInt16,
    ChannelType::SnormInt8,
    ChannelType::SnormInt16,
    ChannelType::HalfFloat,
    ChannelType::Float,
    ChannelType::SignedInt8,
    ChannelType::SignedInt16,
    ChannelType::SignedInt32,
    ChannelType::UnsignedInt8,
    ChannelType::UnsignedInt16,
    ChannelType::UnsignedInt32,
];

impl ImageFormat {
    pub const fn new(order: ChannelOrder, data_type: ChannelType) -> Self {
        Self { order, data_type }
    }

    /// Decode raw API values; `None` if either value is unknown.
    pub fn from_raw(order: u32, data_type: u32) -> Option<Self> {
        Some(Self::new(
            ChannelOrder::from_raw(order)?,
            ChannelType::from_raw(data_type)?,
        ))
    }

    pub fn to_raw(self) -> RawImageFormat {
        RawImageFormat {
            image_channel_order: self.order.raw(),
            image_channel_data_type: self.data_type.raw(),
        }
    }

    pub fn is_valid_single_channel(&self) -> bool {
        matches!(self.order, ChannelOrder::A | ChannelOrder::R | ChannelOrder::Rx)
            && ALL_COMPONENT_TYPES.contains(&self.data_type)
    }

    pub fn is_valid_intensity(&self) -> bool {
        self.order == ChannelOrder::Intensity && NORMALIZED_AND_FLOAT.contains(&self.data_type)
    }

    pub fn is_valid_luminance(&self) -> bool {
        self.order == ChannelOrder::Luminance && NORMALIZED_AND_FLOAT.contains(&self.data_type)
    }

    pub fn is_valid_depth(&self) -> bool {
        self.order == ChannelOrder::Depth
            && matches!(self.data_type, ChannelType::UnormInt16 | ChannelType::Float)
    }

    pub fn is_valid_double_channel(&self) -> bool {
        matches!(self.order, ChannelOrder::Rg | ChannelOrder::Rgx | ChannelOrder::Ra)
            && ALL_COMPONENT_TYPES.contains(&self.data_type)
    }

    pub fn is_valid_triple_channel(&self) -> bool {
        matches!(self.order, ChannelOrder::Rgb | ChannelOrder::Rgbx)
            && matches!(
                self.data_type,
                ChannelType::UnormShort565 | ChannelType::UnormShort555 | ChannelType::UnormInt101010
            )
    }

    pub fn is_valid_rgba(&self) -> bool {
        self.order == ChannelOrder::Rgba && ALL_COMPONENT_TYPES.contains(&self.data_type)
    }

    pub fn is_valid_srgb(&self) -> bool {
        matches!(
            self.order,
            ChannelOrder::Srgb | ChannelOrder::Srgbx | ChannelOrder::Srgba | ChannelOrder::Sbgra
        ) && self.data_type == ChannelType::UnormInt8
    }

    pub fn is_valid_argb(&self) -> bool {
        matches!(self.order, ChannelOrder::Argb | ChannelOrder::Bgra | ChannelOrder::Abgr)
            && matches!(
                self.data_type,
                ChannelType::UnormInt8
                    | ChannelType::SnormInt8
                    | ChannelType::SignedInt8
                    | ChannelType::UnsignedInt8
            )
    }

    pub fn is_valid_depth_stencil(&self) -> bool {
        self.order == ChannelOrder::DepthStencil
            && matches!(self.data_type, ChannelType::UnormInt24 | ChannelType::Float)
    }

    pub fn is_valid_yuv(&self) -> bool {
        (is_nv12_image(self) || is_packed_yuv_image(self))
            && self.data_type == ChannelType::UnormInt8
    }

    /// Whether any of the closed membership predicates accepts the format.
    pub fn is_valid(&self) -> bool {
        self.is_valid_single_channel()
            || self.is_valid_intensity()
            || self.is_valid_luminance()
            || self.is_valid_depth()
            || self.is_valid_double_channel()
            || self.is_valid_triple_channel()
            || self.is_valid_rgba()
            || self.is_valid_srgb()
            || self.is_valid_argb()
            || self.is_valid_depth_stencil()
            || self.is_valid_yuv()
    }

    /// Depth or depth-stencil channel order.
    pub fn is_depth_format(&self) -> bool {
        matches!(self.order, ChannelOrder::Depth | ChannelOrder::DepthStencil)
    }

    /// Signed normalized channel type.
    pub fn is_snorm_format(&self) -> bool {
        matches!(self.data_type, ChannelType::SnormInt8 | ChannelType::SnormInt16)
    }
}

/// Two-plane 4:2:0 YUV.
pub fn is_nv12_image(format: &ImageFormat) -> bool {
    format.order == ChannelOrder::Nv12
}

/// Packed 4:2:2 YUV.
pub fn is_packed_yuv_image(format: &ImageFormat) -> bool {
    matches!(
        format.order,
        ChannelOrder::Yuyv | ChannelOrder::Uyvy | ChannelOrder::Yvyu | ChannelOrder::Vyuy
    )
}

/// Whether the channel order carries an alpha (or padding) channel.
pub fn has_alpha_channel(format: &ImageFormat) -> bool {
    matches!(
        format.order,
        ChannelOrder::A
            | ChannelOrder::Rx
            | ChannelOrder::Ra
            | ChannelOrder::Rgx
            | ChannelOrder::Rgbx
            | ChannelOrder::Rgba
            | ChannelOrder::Bgra
            | ChannelOrder::Argb
            | ChannelOrder::Intensity
            | ChannelOrder::Srgba
            | ChannelOrder::Sbgra
            | ChannelOrder::Srgbx
            | ChannelOrder::Abgr
    )
}

/// A format the hardware can sample or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceFormatInfo {
    pub format: ImageFormat,
    /// Hardware surface format name.
    pub surface_format: &'static str,
    pub num_channels: u32,
    pub per_channel_size_in_bytes: u32,
    pub image_element_size_in_bytes: usize,
}

impl SurfaceFormatInfo {
    /// Bytes per pixel computed from the channel layout.
    pub fn bytes_per_pixel(&self) -> u32 {
        self.num_channels * self.per_channel_size_in_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip() {
        assert_eq!(ChannelOrder::from_raw(0x10B5), Some(ChannelOrder::Rgba));
        assert_eq!(ChannelType::from_raw(0x10E0), Some(ChannelType::UnormInt1010102));
        assert_eq!(ChannelOrder::from_raw(0x1234), None);
        assert_eq!(ChannelOrder::Nv12.raw(), 0x410E);
        assert!(ImageFormat::from_raw(0x10B5, 0xFFFF).is_none());
    }

    #[test]
    fn test_depth_and_snorm() {
        assert!(ImageFormat::new(ChannelOrder::DepthStencil, ChannelType::Float).is_depth_format());
        assert!(!ImageFormat::new(ChannelOrder::R, ChannelType::Float).is_depth_format());
        assert!(ImageFormat::new(ChannelOrder::R, ChannelType::SnormInt16).is_snorm_format());
        assert!(!ImageFormat::new(ChannelOrder::R, ChannelType::UnormInt16).is_snorm_format());
    }

    #[test]
    fn test_has_alpha_channel() {
        assert!(has_alpha_channel(&ImageFormat::new(ChannelOrder::Rgba, ChannelType::UnormInt8)));
        assert!(has_alpha_channel(&ImageFormat::new(ChannelOrder::Intensity, ChannelType::Float)));
        assert!(!has_alpha_channel(&ImageFormat::new(ChannelOrder::Rgb, ChannelType::UnormShort565)));
        assert!(!has_alpha_channel(&ImageFormat::new(ChannelOrder::Luminance, ChannelType::Float)));
        assert!(!has_alpha_channel(&ImageFormat::new(ChannelOrder::Srgb, ChannelType::UnormInt8)));
    }

    #[test]
    fn test_yuv_predicates() {
        let nv12 = ImageFormat::new(ChannelOrder::Nv12, ChannelType::UnormInt8);
        assert!(is_nv12_image(&nv12));
        assert!(nv12.is_valid_yuv());
        assert!(!ImageFormat::new(ChannelOrder::Nv12, ChannelType::UnormInt16).is_valid_yuv());
        assert!(is_packed_yuv_image(&ImageFormat::new(ChannelOrder::Vyuy, ChannelType::UnormInt8)));
    }

    #[test]
    fn test_raw_format_bytes() {
        let raw = ImageFormat::new(ChannelOrder::Rgba, ChannelType::UnormInt8).to_raw();
        let bytes = bytemuck::bytes_of(&raw);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &0x10B5u32.to_le_bytes());
    }
}
