//! Hardware description and device capabilities.

use std::fmt;

/// Product family of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductFamily {
    Skylake,
    Kabylake,
    Coffeelake,
    Icelake,
    Lakefield,
    Tigerlake,
    Rocketlake,
    AlderlakeS,
    Dg1,
    Unknown,
}

impl ProductFamily {
    /// Core family the product belongs to, if known.
    pub fn core_family(self) -> Option<GfxCoreFamily> {
        match self {
            Self::Skylake | Self::Kabylake | Self::Coffeelake => Some(GfxCoreFamily::Gen9),
            Self::Icelake | Self::Lakefield => Some(GfxCoreFamily::Gen11),
            Self::Tigerlake | Self::Rocketlake | Self::AlderlakeS | Self::Dg1 => {
                Some(GfxCoreFamily::Gen12Lp)
            }
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Skylake => "SKL",
            Self::Kabylake => "KBL",
            Self::Coffeelake => "CFL",
            Self::Icelake => "ICL",
            Self::Lakefield => "LKF",
            Self::Tigerlake => "TGL",
            Self::Rocketlake => "RKL",
            Self::AlderlakeS => "ADL-S",
            Self::Dg1 => "DG1",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Render core family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GfxCoreFamily {
    Gen9,
    Gen11,
    Gen12Lp,
}

/// Limits a device reports for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub image2d_max_width: usize,
    pub image2d_max_height: usize,
    pub image3d_max_width: usize,
    pub image3d_max_height: usize,
    pub image3d_max_depth: usize,
    pub image_max_array_size: usize,
    /// Max pixels of a 1D image over a buffer.
    pub image_max_buffer_size: usize,
    pub planar_yuv_max_width: usize,
    pub planar_yuv_max_height: usize,
    /// Row pitch alignment of a 2D image over a buffer, in pixels.
    pub image_pitch_alignment: u32,
    /// Base address alignment of a 2D image over a buffer, in pixels.
    pub image_base_address_alignment: u32,
    pub max_mem_alloc_size: u64,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            image2d_max_width: 16384,
            image2d_max_height: 16384,
            image3d_max_width: 16384,
            image3d_max_height: 16384,
            image3d_max_depth: 2048,
            image_max_array_size: 2048,
            image_max_buffer_size: 1 << 26,
            planar_yuv_max_width: 16384,
            planar_yuv_max_height: 16352,
            image_pitch_alignment: 4,
            image_base_address_alignment: 4,
            max_mem_alloc_size: 1 << 31,
        }
    }
}

/// Static description of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareInfo {
    pub product_family: ProductFamily,
    pub core_family: GfxCoreFamily,
    pub name: &'static str,
    pub capabilities: DeviceCapabilities,
    /// Whether the command streamer needs explicit preemption programming.
    pub preemption_cmd_sync: bool,
    pub supports_render_compression: bool,
}

impl HardwareInfo {
    /// Hardware description for a known product family.
    pub fn for_product(product_family: ProductFamily) -> Option<Self> {
        let core_family = product_family.core_family()?;
        let name = match product_family {
            ProductFamily::Skylake => "Skylake GT2",
            ProductFamily::Kabylake => "Kabylake GT2",
            ProductFamily::Coffeelake => "Coffeelake GT2",
            ProductFamily::Icelake => "Icelake LP",
            ProductFamily::Lakefield => "Lakefield",
            ProductFamily::Tigerlake => "Tigerlake LP",
            ProductFamily::Rocketlake => "Rocketlake",
            ProductFamily::AlderlakeS => "Alderlake S",
            ProductFamily::Dg1 => "DG1",
            ProductFamily::Unknown => return None,
        };
        Some(Self {
            product_family,
            core_family,
            name,
            capabilities: DeviceCapabilities::default(),
            preemption_cmd_sync: core_family == GfxCoreFamily::Gen12Lp,
            supports_render_compression: core_family == GfxCoreFamily::Gen12Lp,
        })
    }

    /// The default test device.
    pub fn skylake() -> Self {
        Self {
            product_family: ProductFamily::Skylake,
            core_family: GfxCoreFamily::Gen9,
            name: "Skylake GT2",
            capabilities: DeviceCapabilities::default(),
            preemption_cmd_sync: false,
            supports_render_compression: false,
        }
    }
}

/// A typed capability query.
///
/// Each capability is a unit type, so [`Device::get_cap`] returns the value
/// with its proper type.
///
/// [`Device::get_cap`]: crate::device::Device::get_cap
pub trait DeviceCap {
    type Value: Copy;

    fn get(caps: &DeviceCapabilities) -> Self::Value;
}

macro_rules! device_caps {
    ($($(#[$meta:meta])* $name:ident: $ty:ty => $field:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub struct $name;

            impl DeviceCap for $name {
                type Value = $ty;

                fn get(caps: &DeviceCapabilities) -> $ty {
                    caps.$field
                }
            }
        )*
    };
}

device_caps! {
    Image2dMaxWidth: usize => image2d_max_width;
    Image2dMaxHeight: usize => image2d_max_height;
    Image3dMaxWidth: usize => image3d_max_width;
    Image3dMaxHeight: usize => image3d_max_height;
    Image3dMaxDepth: usize => image3d_max_depth;
    ImageMaxArraySize: usize => image_max_array_size;
    ImageMaxBufferSize: usize => image_max_buffer_size;
    PlanarYuvMaxWidth: usize => planar_yuv_max_width;
    PlanarYuvMaxHeight: usize => planar_yuv_max_height;
    ImagePitchAlignment: u32 => image_pitch_alignment;
    /// Base address alignment, in pixels.
    ImageBaseAddressAlignment: u32 => image_base_address_alignment;
    MaxMemAllocSize: u64 => max_mem_alloc_size;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_family_mapping() {
        assert_eq!(ProductFamily::Skylake.core_family(), Some(GfxCoreFamily::Gen9));
        assert_eq!(ProductFamily::Icelake.core_family(), Some(GfxCoreFamily::Gen11));
        assert_eq!(ProductFamily::Dg1.core_family(), Some(GfxCoreFamily::Gen12Lp));
        assert_eq!(ProductFamily::Unknown.core_family(), None);
    }

    #[test]
    fn test_for_product() {
        let tgl = HardwareInfo::for_product(ProductFamily::Tigerlake).unwrap();
        assert!(tgl.preemption_cmd_sync);
        assert!(tgl.supports_render_compression);
        assert_eq!(HardwareInfo::for_product(ProductFamily::Skylake), Some(HardwareInfo::skylake()));
        assert!(HardwareInfo::for_product(ProductFamily::Unknown).is_none());
    }

    #[test]
    fn test_typed_caps() {
        let caps = DeviceCapabilities::default();
        assert_eq!(Image2dMaxWidth::get(&caps), 16384);
        assert_eq!(PlanarYuvMaxHeight::get(&caps), 16352);
        let alignment: u32 = ImagePitchAlignment::get(&caps);
        assert_eq!(alignment, 4);
    }
}
