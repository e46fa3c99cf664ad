//! Images.
//!
//! An [`Image`] is created in one of three ways:
//! - over a parent [`Buffer`](super::Buffer) (1D buffer and 2D images), sharing its allocation
//! - as a plane view of a parent NV12 image, sharing the parent's allocation
//! - from scratch, with a fresh allocation laid out by an [`ImageQuery`]
//!
//! Creation, validation and the views derived from an existing image live in
//! the submodules; this module holds the type and its accessors.

mod create;
mod factory;
mod info;
mod map;
mod nv12;
mod redescribe;
mod transfer;
mod validate;

pub use factory::{register_image_factory, CreateImageFn};
pub use info::{ImageInfoParam, ImageInfoValue};
pub use transfer::{calculate_host_ptr_size, transfer_data};

pub(crate) use transfer::{copy_image_region, CopyDirection};

use std::sync::Arc;

use xpu_core::layout::{ImageLayout, ImageQuery, Plane, SurfaceDimension};
use xpu_core::memory::HostMemory;

use super::{MemFlags, MemObj, MemObjectRef, MemObjectType, ParentPin};
use crate::context::Context;
use crate::formats::{is_nv12_image, ImageFormat, SurfaceFormatInfo};

/// Cube face index of images that are not cube map faces.
pub const NO_CUBE_MAP: u32 = 6;

/// Image description (`cl_image_desc`).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    pub image_type: MemObjectType,
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub array_size: usize,
    pub row_pitch: usize,
    pub slice_pitch: usize,
    pub num_mip_levels: u32,
    pub num_samples: u32,
    /// Parent buffer or NV12 image.
    pub mem_object: Option<MemObjectRef>,
}

impl ImageDescriptor {
    pub fn new(image_type: MemObjectType, width: usize, height: usize) -> Self {
        Self {
            image_type,
            width,
            height,
            depth: 0,
            array_size: 0,
            row_pitch: 0,
            slice_pitch: 0,
            num_mip_levels: 0,
            num_samples: 0,
            mem_object: None,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_array_size(mut self, array_size: usize) -> Self {
        self.array_size = array_size;
        self
    }

    pub fn with_row_pitch(mut self, row_pitch: usize) -> Self {
        self.row_pitch = row_pitch;
        self
    }

    pub fn with_slice_pitch(mut self, slice_pitch: usize) -> Self {
        self.slice_pitch = slice_pitch;
        self
    }

    pub fn with_mip_levels(mut self, num_mip_levels: u32) -> Self {
        self.num_mip_levels = num_mip_levels;
        self
    }

    pub fn with_mem_object(mut self, mem_object: impl Into<MemObjectRef>) -> Self {
        self.mem_object = Some(mem_object.into());
        self
    }

    fn parent_buffer(&self) -> Option<&Arc<super::Buffer>> {
        self.mem_object.as_ref().and_then(MemObjectRef::as_buffer)
    }

    fn parent_image(&self) -> Option<&Arc<Image>> {
        self.mem_object.as_ref().and_then(MemObjectRef::as_image)
    }

    /// Layout query for this description.
    ///
    /// NV12 formats query the planar layout, restricted to `plane`.
    fn image_query(
        &self,
        surface_format: &SurfaceFormatInfo,
        allow_tiling: bool,
        plane: Plane,
    ) -> ImageQuery {
        let (dimension, height) = match self.image_type {
            MemObjectType::Image1D | MemObjectType::Image1DBuffer | MemObjectType::Buffer => {
                (SurfaceDimension::D1, 1)
            }
            MemObjectType::Image1DArray => (SurfaceDimension::D1Array, 1),
            MemObjectType::Image2D => (SurfaceDimension::D2, self.height),
            MemObjectType::Image2DArray => (SurfaceDimension::D2Array, self.height),
            MemObjectType::Image3D => (SurfaceDimension::D3, self.height),
        };
        let query = ImageQuery::new(
            dimension,
            self.width,
            height,
            surface_format.image_element_size_in_bytes,
        )
        .with_depth(self.depth)
        .with_array_size(self.array_size)
        .with_tiling(allow_tiling);

        if is_nv12_image(&surface_format.format) {
            query.with_planar_yuv(plane)
        } else {
            query
        }
    }
}

/// Position of the surface inside its allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceOffsets {
    pub offset: usize,
    pub x_offset: usize,
    pub y_offset: usize,
    pub y_offset_for_uv_plane: usize,
}

impl From<&ImageLayout> for SurfaceOffsets {
    fn from(layout: &ImageLayout) -> Self {
        Self {
            offset: layout.offset,
            x_offset: layout.x_offset,
            y_offset: layout.y_offset,
            y_offset_for_uv_plane: layout.y_offset_for_uv_plane,
        }
    }
}

/// Everything a per-family image constructor needs.
///
/// Produced by [`Image::create`] and the redescribe paths, consumed by the
/// [`CreateImageFn`] registered for the device's core family.
pub struct ImageParams {
    context: Arc<Context>,
    flags: MemFlags,
    host_ptr: Option<Arc<HostMemory>>,
    allocation: Arc<xpu_core::memory::GraphicsAllocation>,
    owns_allocation: bool,
    zero_copy: bool,
    is_object_redescribed: bool,
    surface_format: &'static SurfaceFormatInfo,
    desc: ImageDescriptor,
    layout: ImageLayout,
    is_tiled: bool,
    mip_level: u32,
    surface_offsets: SurfaceOffsets,
    cube_face_index: u32,
    media_plane_type: u32,
    host_ptr_row_pitch: usize,
    host_ptr_slice_pitch: usize,
    image_count: usize,
    host_ptr_min_size: usize,
    parent: Option<ParentPin>,
}

impl ImageParams {
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn is_tiled(&self) -> bool {
        self.is_tiled
    }
}

/// An image memory object.
pub struct Image {
    mem: MemObj,
    // Declared after `mem` so the parent outlives the allocation release.
    parent: Option<ParentPin>,
    format: ImageFormat,
    surface_format: &'static SurfaceFormatInfo,
    desc: ImageDescriptor,
    layout: ImageLayout,
    is_tiled: bool,
    mip_level: u32,
    surface_offsets: SurfaceOffsets,
    cube_face_index: u32,
    media_plane_type: u32,
    host_ptr_row_pitch: usize,
    host_ptr_slice_pitch: usize,
    image_count: usize,
    host_ptr_min_size: usize,
    render_compressed: bool,
    create_function: CreateImageFn,
}

impl Image {
    /// Construct an image from prepared parameters.
    ///
    /// This is the base constructor per-family factories build on.
    pub fn from_params(params: ImageParams) -> Image {
        let mem = MemObj::new(
            params.context,
            params.desc.image_type,
            params.flags,
            params.layout.size,
            params.host_ptr,
            params.allocation,
            params.owns_allocation,
            params.zero_copy,
            params.is_object_redescribed,
        );
        Image {
            mem,
            parent: params.parent,
            format: params.surface_format.format,
            surface_format: params.surface_format,
            desc: params.desc,
            layout: params.layout,
            is_tiled: params.is_tiled,
            mip_level: params.mip_level,
            surface_offsets: params.surface_offsets,
            cube_face_index: params.cube_face_index,
            media_plane_type: params.media_plane_type,
            host_ptr_row_pitch: params.host_ptr_row_pitch,
            host_ptr_slice_pitch: params.host_ptr_slice_pitch,
            image_count: params.image_count,
            host_ptr_min_size: params.host_ptr_min_size,
            render_compressed: false,
            create_function: Image::from_params,
        }
    }

    pub fn mem_obj(&self) -> &MemObj {
        &self.mem
    }

    pub fn context(&self) -> &Arc<Context> {
        self.mem.context()
    }

    pub fn flags(&self) -> MemFlags {
        self.mem.flags()
    }

    pub fn image_format(&self) -> &ImageFormat {
        &self.format
    }

    pub fn surface_format_info(&self) -> &'static SurfaceFormatInfo {
        self.surface_format
    }

    pub fn image_desc(&self) -> &ImageDescriptor {
        &self.desc
    }

    pub fn layout(&self) -> &ImageLayout {
        &self.layout
    }

    /// Whether the surface uses a tiled layout.
    pub fn allow_tiling(&self) -> bool {
        self.is_tiled
    }

    pub fn mip_level(&self) -> u32 {
        self.mip_level
    }

    pub fn surface_offsets(&self) -> SurfaceOffsets {
        self.surface_offsets
    }

    pub fn cube_face_index(&self) -> u32 {
        self.cube_face_index
    }

    /// 0 for the Y plane of an NV12 image, 1 for the UV plane.
    pub fn media_plane_type(&self) -> u32 {
        self.media_plane_type
    }

    /// Row pitch of the host memory the image was created from.
    pub fn host_ptr_row_pitch(&self) -> usize {
        self.host_ptr_row_pitch
    }

    pub fn host_ptr_slice_pitch(&self) -> usize {
        self.host_ptr_slice_pitch
    }

    pub fn image_count(&self) -> usize {
        self.image_count
    }

    /// Minimum number of host bytes holding the whole image.
    pub fn host_ptr_min_size(&self) -> usize {
        self.host_ptr_min_size
    }

    /// Row pitch of the device surface.
    pub fn image_row_pitch(&self) -> usize {
        self.layout.row_pitch
    }

    pub fn image_slice_pitch(&self) -> usize {
        self.layout.slice_pitch
    }

    pub fn qpitch(&self) -> usize {
        self.layout.qpitch
    }

    pub fn is_render_compressed(&self) -> bool {
        self.render_compressed
    }

    /// The buffer or image this image was derived from.
    pub fn associated_mem_object(&self) -> Option<&MemObjectRef> {
        self.parent.as_ref().map(ParentPin::target)
    }

    /// Whether the allocation is the very memory the image was created on.
    pub(crate) fn aliases_host_memory(&self) -> bool {
        self.mem.host_ptr().map_or(false, |host| {
            Arc::ptr_eq(host.store(), self.mem.graphics_allocation().store())
        })
    }

    /// `(width, height, depth)` addressable by transfers, counting array
    /// layers in the last used dimension.
    pub(crate) fn copy_extent(&self) -> [usize; 3] {
        let desc = &self.desc;
        match desc.image_type {
            MemObjectType::Image1D | MemObjectType::Image1DBuffer | MemObjectType::Buffer => {
                [desc.width, 1, 1]
            }
            MemObjectType::Image1DArray => [desc.width, desc.array_size, 1],
            MemObjectType::Image2D => [desc.width, desc.height, 1],
            MemObjectType::Image2DArray => [desc.width, desc.height, desc.array_size],
            MemObjectType::Image3D => [desc.width, desc.height, desc.depth],
        }
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("mem", &self.mem)
            .field("format", &self.format)
            .field("desc", &self.desc)
            .field("is_tiled", &self.is_tiled)
            .field("render_compressed", &self.render_compressed)
            .finish()
    }
}

static_assertions::assert_impl_all!(Image: Send, Sync);
