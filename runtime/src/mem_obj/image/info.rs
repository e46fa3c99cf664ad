//! Image property queries (`clGetImageInfo`).

use super::Image;
use crate::error::ImageError;
use crate::formats::ImageFormat;
use crate::mem_obj::MemObjectType;

/// Queryable image property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ImageInfoParam {
    Format = 0x1110,
    ElementSize = 0x1111,
    RowPitch = 0x1112,
    SlicePitch = 0x1113,
    Width = 0x1114,
    Height = 0x1115,
    Depth = 0x1116,
    ArraySize = 0x1117,
    Buffer = 0x1118,
    NumMipLevels = 0x1119,
    NumSamples = 0x111A,
}

impl ImageInfoParam {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0x1110 => Self::Format,
            0x1111 => Self::ElementSize,
            0x1112 => Self::RowPitch,
            0x1113 => Self::SlicePitch,
            0x1114 => Self::Width,
            0x1115 => Self::Height,
            0x1116 => Self::Depth,
            0x1117 => Self::ArraySize,
            0x1118 => Self::Buffer,
            0x1119 => Self::NumMipLevels,
            0x111A => Self::NumSamples,
            _ => return None,
        })
    }
}

/// Value of an image property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageInfoValue {
    Format(ImageFormat),
    Size(usize),
    Uint(u32),
    /// Handle of the associated memory object, if any.
    MemObject(Option<u64>),
}

impl ImageInfoValue {
    /// Wire encoding: `size_t` values are 8 bytes, handles are 0 when absent.
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            Self::Format(format) => bytemuck::bytes_of(&format.to_raw()).to_vec(),
            Self::Size(value) => bytemuck::bytes_of(&(value as u64)).to_vec(),
            Self::Uint(value) => bytemuck::bytes_of(&value).to_vec(),
            Self::MemObject(handle) => bytemuck::bytes_of(&handle.unwrap_or(0)).to_vec(),
        }
    }
}

/// Dimension scaled down to `mip_level`, never below 1.
fn mip_scaled(value: usize, mip_level: u32) -> usize {
    if mip_level == 0 {
        value
    } else {
        (value >> mip_level).max(1)
    }
}

impl Image {
    /// Query an image property.
    pub fn image_info(&self, param: ImageInfoParam) -> ImageInfoValue {
        let desc = &self.desc;
        match param {
            ImageInfoParam::Format => ImageInfoValue::Format(self.surface_format.format),
            ImageInfoParam::ElementSize => {
                ImageInfoValue::Size(self.surface_format.image_element_size_in_bytes)
            }
            ImageInfoParam::RowPitch => ImageInfoValue::Size(self.host_ptr_row_pitch),
            ImageInfoParam::SlicePitch => {
                let has_slices = !matches!(
                    desc.image_type,
                    MemObjectType::Image2D | MemObjectType::Image1D | MemObjectType::Image1DBuffer
                );
                ImageInfoValue::Size(if has_slices { self.host_ptr_slice_pitch } else { 0 })
            }
            ImageInfoParam::Width => ImageInfoValue::Size(mip_scaled(desc.width, self.mip_level)),
            ImageInfoParam::Height => {
                let height = if desc.image_type.is_1d() { 0 } else { desc.height };
                ImageInfoValue::Size(if height == 0 {
                    0
                } else {
                    mip_scaled(height, self.mip_level)
                })
            }
            ImageInfoParam::Depth => {
                let depth = if desc.image_type == MemObjectType::Image3D {
                    desc.depth
                } else {
                    0
                };
                ImageInfoValue::Size(if depth == 0 {
                    0
                } else {
                    mip_scaled(depth, self.mip_level)
                })
            }
            ImageInfoParam::ArraySize => ImageInfoValue::Size(if desc.image_type.is_array() {
                desc.array_size
            } else {
                0
            }),
            ImageInfoParam::Buffer => {
                ImageInfoValue::MemObject(desc.mem_object.as_ref().map(|mem| mem.id()))
            }
            ImageInfoParam::NumMipLevels => ImageInfoValue::Uint(desc.num_mip_levels),
            ImageInfoParam::NumSamples => ImageInfoValue::Uint(desc.num_samples),
        }
    }

    /// Byte-level query following the `get_info` contract.
    ///
    /// Returns the size of the value. When `out` is given it must be large
    /// enough to hold the value, which is copied to its start.
    pub fn image_info_bytes(&self, param: u32, out: Option<&mut [u8]>) -> Result<usize, ImageError> {
        let param = ImageInfoParam::from_raw(param).ok_or(ImageError::InvalidValue)?;
        let bytes = self.image_info(param).to_bytes();
        if let Some(out) = out {
            if out.len() < bytes.len() {
                return Err(ImageError::InvalidValue);
            }
            out[..bytes.len()].copy_from_slice(&bytes);
        }
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_scaled() {
        assert_eq!(mip_scaled(16, 0), 16);
        assert_eq!(mip_scaled(16, 2), 4);
        assert_eq!(mip_scaled(16, 8), 1);
    }

    #[test]
    fn test_param_codes() {
        assert_eq!(ImageInfoParam::from_raw(0x1112), Some(ImageInfoParam::RowPitch));
        assert_eq!(ImageInfoParam::from_raw(0x111A), Some(ImageInfoParam::NumSamples));
        assert_eq!(ImageInfoParam::from_raw(0x1120), None);
        assert_eq!(ImageInfoParam::Buffer as u32, 0x1118);
    }

    #[test]
    fn test_value_encoding() {
        assert_eq!(ImageInfoValue::Size(16).to_bytes(), 16u64.to_ne_bytes().to_vec());
        assert_eq!(ImageInfoValue::Uint(3).to_bytes(), 3u32.to_ne_bytes().to_vec());
        assert_eq!(ImageInfoValue::MemObject(None).to_bytes(), vec![0; 8]);
        assert_eq!(
            ImageInfoValue::Format(ImageFormat::new(
                crate::formats::ChannelOrder::R,
                crate::formats::ChannelType::Float
            ))
            .to_bytes()
            .len(),
            8
        );
    }
}
