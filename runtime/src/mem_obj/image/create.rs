//! Image creation.

use std::sync::Arc;

use xpu_core::layout::{ImageLayout, Plane};
use xpu_core::memory::{
    align_size_whole_page, AllocationKind, GraphicsAllocation, HostMemory, CACHE_LINE_SIZE,
};

use super::{Image, ImageDescriptor, ImageParams, SurfaceOffsets, NO_CUBE_MAP};
use crate::context::Context;
use crate::error::ImageError;
use crate::formats::{is_nv12_image, SurfaceFormatInfo};
use crate::mem_obj::{MemFlags, MemObjectRef, MemObjectType, ParentPin, PendingAllocation};

/// Whether a surface for `desc` may be tiled.
pub(super) fn allow_tiling(desc: &ImageDescriptor, force_linear: bool) -> bool {
    if force_linear || desc.parent_buffer().is_some() {
        return false;
    }
    !matches!(
        desc.image_type,
        MemObjectType::Image1D
            | MemObjectType::Image1DArray
            | MemObjectType::Image1DBuffer
            | MemObjectType::Buffer
    )
}

/// Storage chosen for a new image.
struct Storage {
    allocation: Arc<GraphicsAllocation>,
    layout: ImageLayout,
    owns_allocation: bool,
    zero_copy: bool,
    transfer_needed: bool,
}

impl Image {
    /// Create an image from a validated description.
    ///
    /// `surface_format` is the table entry for the requested format. Host
    /// memory is required with [`MemFlags::USE_HOST_PTR`] and
    /// [`MemFlags::COPY_HOST_PTR`] and ignored otherwise.
    pub fn create(
        context: &Arc<Context>,
        flags: MemFlags,
        surface_format: &'static SurfaceFormatInfo,
        desc: &ImageDescriptor,
        host_ptr: Option<&Arc<HostMemory>>,
    ) -> Result<Arc<Image>, ImageError> {
        let memory_manager = context.memory_manager();
        let settings = context.device().settings();
        let parent_buffer = desc.parent_buffer().cloned();
        let parent_image = desc.parent_image().cloned();

        let mut image_width = desc.width;
        let mut image_height = 1;
        let mut image_depth = 1;
        let image_count = if desc.image_type.is_array() {
            desc.array_size
        } else {
            1
        };
        match desc.image_type {
            MemObjectType::Image3D => {
                image_depth = desc.depth;
                image_height = desc.height;
            }
            MemObjectType::Image2D | MemObjectType::Image2DArray => image_height = desc.height,
            _ => {}
        }

        let mut plane = Plane::None;
        if let Some(parent) = &parent_image {
            debug_assert!(is_nv12_image(parent.image_format()));
            image_width = parent.desc.width;
            image_height = parent.desc.height;
            image_depth = 1;
            if desc.depth != 0 {
                image_width /= 2;
                image_height /= 2;
                plane = Plane::U;
            } else {
                plane = Plane::Y;
            }
        }

        let element_size = surface_format.image_element_size_in_bytes;
        let host_ptr_row_pitch = if desc.row_pitch != 0 {
            desc.row_pitch
        } else {
            image_width
                .checked_mul(element_size)
                .ok_or(ImageError::InvalidImageSize)?
        };
        let mut host_ptr_slice_pitch = if desc.slice_pitch != 0 {
            desc.slice_pitch
        } else {
            host_ptr_row_pitch
                .checked_mul(image_height)
                .ok_or(ImageError::InvalidImageSize)?
        };
        let passed_size = [image_height, image_depth, image_count]
            .into_iter()
            .try_fold(host_ptr_row_pitch, usize::checked_mul)
            .ok_or(ImageError::InvalidImageSize)?;
        let host_ptr_min_size = match desc.image_type {
            MemObjectType::Image3D => host_ptr_slice_pitch.checked_mul(image_depth),
            MemObjectType::Image2D => {
                let plane_size = host_ptr_row_pitch.checked_mul(image_height);
                if is_nv12_image(&surface_format.format) {
                    plane_size.and_then(|size| size.checked_add(size / 2))
                } else {
                    plane_size
                }
            }
            MemObjectType::Image1DArray | MemObjectType::Image2DArray => {
                host_ptr_slice_pitch.checked_mul(image_count)
            }
            MemObjectType::Image1D | MemObjectType::Image1DBuffer => Some(host_ptr_row_pitch),
            MemObjectType::Buffer => Some(0),
        }
        .ok_or(ImageError::InvalidImageSize)?;
        let mut is_tiled =
            !context.is_shared_context() && allow_tiling(desc, settings.force_linear_images);

        let mut host_source = host_ptr.cloned();
        let mut host_ptr_to_set = if flags.contains(MemFlags::USE_HOST_PTR) {
            host_ptr.cloned()
        } else {
            None
        };
        let mut is_object_redescribed = false;
        let mut parent = None;

        let storage = match (&parent_buffer, &parent_image) {
            (Some(buffer), _)
                if matches!(
                    desc.image_type,
                    MemObjectType::Image1DBuffer | MemObjectType::Image2D
                ) =>
            {
                is_object_redescribed = true;
                host_source = buffer.host_ptr().cloned();
                host_ptr_to_set = host_source.clone();

                let query = desc
                    .image_query(surface_format, false, Plane::None)
                    .with_row_pitch(Some(desc.row_pitch).filter(|&pitch| pitch > 0));
                let mut allocation = Arc::clone(buffer.mem_obj().graphics_allocation());
                let layout = query.query_from_buffer_params(allocation.underlying_buffer_size());
                let mut owns_allocation = false;

                if memory_manager.peek_virtual_padding_support()
                    && desc.image_type == MemObjectType::Image2D
                {
                    let required = query.query().size;
                    if required > allocation.underlying_buffer_size() {
                        log::debug!(
                            "Padding buffer of {} bytes to {} for a 2D image",
                            allocation.underlying_buffer_size(),
                            required
                        );
                        allocation = memory_manager
                            .create_graphics_allocation_with_padding(&allocation, required)
                            .map_err(|e| {
                                log::warn!("Image padding allocation failed: {}", e);
                                ImageError::OutOfHostMemory
                            })?;
                        owns_allocation = true;
                    }
                }

                parent = Some(ParentPin::new(MemObjectRef::Buffer(Arc::clone(buffer))));
                Storage {
                    allocation,
                    layout,
                    owns_allocation,
                    zero_copy: true,
                    transfer_needed: false,
                }
            }
            (_, Some(parent_image)) => {
                is_tiled = parent_image.allow_tiling();
                let layout = parent_image
                    .desc
                    .image_query(parent_image.surface_format, is_tiled, plane)
                    .query();
                Storage {
                    allocation: Arc::clone(parent_image.mem.graphics_allocation()),
                    layout,
                    owns_allocation: false,
                    zero_copy: false,
                    transfer_needed: false,
                }
            }
            _ => {
                let layout = desc.image_query(surface_format, is_tiled, Plane::None).query();
                if flags.contains(MemFlags::USE_HOST_PTR) {
                    let host = host_ptr.ok_or(ImageError::InvalidHostPtr)?;
                    let copy_required = align_size_whole_page(host.address(), layout.size)
                        > align_size_whole_page(host.address(), passed_size)
                        || layout.row_pitch != host_ptr_row_pitch
                        || layout.slice_pitch != host_ptr_slice_pitch
                        || host.address() % CACHE_LINE_SIZE as u64 != 0
                        || is_tiled;

                    if copy_required && !context.is_shared_context() {
                        log::debug!("USE_HOST_PTR image needs a copy of the host memory");
                        Storage {
                            allocation: memory_manager
                                .allocate_graphics_memory_for_image(&layout)
                                .map_err(|e| {
                                    log::warn!("Image allocation failed: {}", e);
                                    ImageError::OutOfHostMemory
                                })?,
                            layout,
                            owns_allocation: true,
                            zero_copy: false,
                            transfer_needed: true,
                        }
                    } else {
                        Storage {
                            allocation: memory_manager
                                .allocate_graphics_memory(layout.size, Some(host))
                                .map_err(|e| {
                                    log::warn!("Host memory cannot back the image: {}", e);
                                    ImageError::InvalidHostPtr
                                })?,
                            layout,
                            owns_allocation: true,
                            zero_copy: true,
                            transfer_needed: false,
                        }
                    }
                } else {
                    Storage {
                        allocation: memory_manager
                            .allocate_graphics_memory_for_image(&layout)
                            .map_err(|e| {
                                log::warn!("Image allocation failed: {}", e);
                                ImageError::OutOfHostMemory
                            })?,
                        layout,
                        owns_allocation: true,
                        zero_copy: true,
                        transfer_needed: false,
                    }
                }
            }
        };

        let pending = storage
            .owns_allocation
            .then(|| PendingAllocation::new(Arc::clone(memory_manager), Arc::clone(&storage.allocation)));

        if matches!(
            desc.image_type,
            MemObjectType::Image2D | MemObjectType::Image1D | MemObjectType::Image1DBuffer
        ) {
            host_ptr_slice_pitch = 0;
        }

        let allocation = &storage.allocation;
        let origin_bits = allocation.kind() & (AllocationKind::HOST_MEMORY | AllocationKind::PADDING);
        let kind = if flags.intersects(
            MemFlags::READ_ONLY | MemFlags::HOST_READ_ONLY | MemFlags::HOST_NO_ACCESS,
        ) {
            AllocationKind::IMAGE
        } else {
            AllocationKind::IMAGE | AllocationKind::WRITABLE
        };
        allocation.set_kind(kind | origin_bits);

        if settings.log_memory_objects {
            log::trace!(
                "Image storage: host ptr {:?}, size {}, gpu address {:#x}, tiled {}",
                host_source.as_ref().map(|host| host.address()),
                allocation.underlying_buffer_size(),
                allocation.gpu_address(),
                is_tiled
            );
        }

        let copy_in = flags.contains(MemFlags::COPY_HOST_PTR) || storage.transfer_needed;
        if !is_tiled && copy_in {
            let Some(source) = &host_source else {
                return Err(ImageError::InvalidValue);
            };
            transfer_data_into(
                source,
                host_ptr_row_pitch,
                host_ptr_slice_pitch,
                allocation,
                &storage.layout,
                desc,
                element_size,
                image_count,
            );
        }

        let mut descriptor = desc.clone();
        let mut media_plane_type = 0;
        if let Some(parent_image) = &parent_image {
            descriptor = ImageDescriptor {
                image_type: MemObjectType::Image2D,
                width: image_width,
                height: image_height,
                depth: 1,
                array_size: 0,
                row_pitch: 0,
                slice_pitch: 0,
                num_mip_levels: parent_image.desc.num_mip_levels,
                num_samples: parent_image.desc.num_samples,
                mem_object: desc.mem_object.clone(),
            };
            media_plane_type = desc.depth as u32;
            parent = Some(ParentPin::new(MemObjectRef::Image(Arc::clone(parent_image))));
        }
        if !desc.image_type.is_array() {
            descriptor.array_size = 0;
        }

        let allocation = match pending {
            Some(pending) => pending.disarm(),
            None => Arc::clone(&storage.allocation),
        };
        let params = ImageParams {
            context: Arc::clone(context),
            flags,
            host_ptr: host_ptr_to_set,
            allocation,
            owns_allocation: storage.owns_allocation,
            zero_copy: storage.zero_copy,
            is_object_redescribed,
            surface_format,
            desc: descriptor,
            surface_offsets: SurfaceOffsets::from(&storage.layout),
            layout: storage.layout,
            is_tiled,
            mip_level: 0,
            cube_face_index: NO_CUBE_MAP,
            media_plane_type,
            host_ptr_row_pitch,
            host_ptr_slice_pitch,
            image_count,
            host_ptr_min_size,
            parent,
        };
        let image = Arc::new(Image::create_image_hw(params));

        if is_tiled && copy_in {
            let Some(source) = &host_source else {
                return Err(ImageError::InvalidValue);
            };
            if is_nv12_image(image.image_format()) {
                image.write_nv12_planes(source, host_ptr_row_pitch)?;
            } else {
                let mut region = [image_width, image_height, image_depth];
                if desc.image_type == MemObjectType::Image2DArray {
                    region[2] = desc.array_size;
                }
                context.special_queue().enqueue_write_image(
                    &image,
                    true,
                    [0, 0, 0],
                    region,
                    host_ptr_row_pitch,
                    host_ptr_slice_pitch,
                    source,
                    0,
                )?;
            }
        }

        log::debug!(
            "Image {} created: {:?} {}x{}x{}, format {}, tiled {}, zero copy {}",
            image.mem.id(),
            image.desc.image_type,
            image_width,
            image_height,
            image_depth,
            surface_format.surface_format,
            is_tiled,
            image.mem.is_mem_obj_zero_copy()
        );
        Ok(image)
    }
}

#[allow(clippy::too_many_arguments)]
fn transfer_data_into(
    source: &HostMemory,
    row_pitch: usize,
    slice_pitch: usize,
    allocation: &GraphicsAllocation,
    layout: &ImageLayout,
    desc: &ImageDescriptor,
    element_size: usize,
    image_count: usize,
) {
    super::transfer_data(
        source.store(),
        row_pitch,
        slice_pitch,
        allocation.store(),
        layout.row_pitch,
        layout.slice_pitch,
        desc,
        element_size,
        image_count,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{get_surface_format_from_table, ChannelOrder, ChannelType, ImageFormat};
    use crate::mem_obj::Buffer;
    use xpu_core::device::Device;
    use xpu_core::hw_info::{HardwareInfo, ProductFamily};
    use xpu_core::settings::DebugSettings;

    fn context_with(settings: DebugSettings) -> Arc<Context> {
        Context::new(Device::with_settings(HardwareInfo::skylake(), settings))
    }

    fn rgba8() -> &'static SurfaceFormatInfo {
        let format = ImageFormat::new(ChannelOrder::Rgba, ChannelType::UnormInt8);
        get_surface_format_from_table(MemFlags::READ_WRITE, Some(&format)).unwrap()
    }

    #[test]
    fn test_allow_tiling() {
        let desc_2d = ImageDescriptor::new(MemObjectType::Image2D, 4, 4);
        assert!(allow_tiling(&desc_2d, false));
        assert!(!allow_tiling(&desc_2d, true));
        let desc_1d_array = ImageDescriptor::new(MemObjectType::Image1DArray, 4, 0);
        assert!(!allow_tiling(&desc_1d_array, false));
    }

    #[test]
    fn test_fresh_2d_image_is_tiled_and_zero_copy() {
        let context = context_with(DebugSettings::default());
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 4, 4);
        let image = Image::create(&context, MemFlags::READ_WRITE, rgba8(), &desc, None).unwrap();
        assert!(image.allow_tiling());
        assert!(image.mem_obj().is_mem_obj_zero_copy());
        assert_eq!(image.host_ptr_row_pitch(), 16);
        assert_eq!(image.host_ptr_min_size(), 64);
        assert_eq!(image.host_ptr_slice_pitch(), 0);
        assert_eq!(
            image.mem_obj().graphics_allocation().kind(),
            AllocationKind::IMAGE | AllocationKind::WRITABLE
        );
    }

    #[test]
    fn test_use_host_ptr_zero_copy_when_layout_matches() {
        let context = context_with(DebugSettings {
            force_linear_images: true,
            ..Default::default()
        });
        // 16 RGBA pixels fill exactly one 64 byte row; 4 rows keep the height aligned.
        let host = HostMemory::new((0..=255).collect());
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 16, 4);
        let image =
            Image::create(&context, MemFlags::USE_HOST_PTR, rgba8(), &desc, Some(&host)).unwrap();
        assert!(image.mem_obj().is_mem_obj_zero_copy());
        assert!(image.aliases_host_memory());
    }

    #[test]
    fn test_use_host_ptr_copies_when_pitch_differs() {
        let context = context_with(DebugSettings {
            force_linear_images: true,
            ..Default::default()
        });
        let host = HostMemory::new((0..64).collect());
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 4, 4);
        let image =
            Image::create(&context, MemFlags::USE_HOST_PTR, rgba8(), &desc, Some(&host)).unwrap();
        assert!(!image.mem_obj().is_mem_obj_zero_copy());
        let allocation = image.mem_obj().graphics_allocation();
        assert_eq!(allocation.read(0, 16), (0..16).collect::<Vec<u8>>());
        assert_eq!(allocation.read(64, 16), (16..32).collect::<Vec<u8>>());
    }

    #[test]
    fn test_row_pitch_overflow_is_invalid_image_size() {
        let context = context_with(DebugSettings::default());
        let host = HostMemory::new((0..64).collect());
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 4, 4).with_row_pitch(1 << 62);
        assert_eq!(
            Image::create(&context, MemFlags::USE_HOST_PTR, rgba8(), &desc, Some(&host)).unwrap_err(),
            ImageError::InvalidImageSize
        );

        let array = ImageDescriptor::new(MemObjectType::Image2DArray, 4, 4)
            .with_array_size(4)
            .with_slice_pitch(usize::MAX / 2);
        assert_eq!(
            Image::create(&context, MemFlags::COPY_HOST_PTR, rgba8(), &array, Some(&host)).unwrap_err(),
            ImageError::InvalidImageSize
        );
    }

    #[test]
    fn test_copy_without_host_ptr_releases_allocation() {
        let context = context_with(DebugSettings {
            force_linear_images: true,
            device_memory_budget: Some(256),
            ..Default::default()
        });
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 4, 4);
        assert_eq!(
            Image::create(&context, MemFlags::COPY_HOST_PTR, rgba8(), &desc, None).unwrap_err(),
            ImageError::InvalidValue
        );
        // The failed attempt gave its 256 bytes back.
        assert!(Image::create(&context, MemFlags::READ_WRITE, rgba8(), &desc, None).is_ok());
    }

    #[test]
    fn test_tiled_copy_goes_through_internal_queue() {
        let context = context_with(DebugSettings::default());
        let host = HostMemory::new((0..64).collect());
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 4, 4);
        let image =
            Image::create(&context, MemFlags::COPY_HOST_PTR, rgba8(), &desc, Some(&host)).unwrap();
        assert!(image.allow_tiling());
        assert_eq!(context.special_queue().task_level(), 1);

        let out = HostMemory::zeroed(64);
        context
            .special_queue()
            .enqueue_read_image(&image, true, [0, 0, 0], [4, 4, 1], 0, 0, &out, 0)
            .unwrap();
        assert_eq!(out.to_vec(), host.to_vec());
    }

    #[test]
    fn test_image_over_buffer_pins_parent() {
        let context = context_with(DebugSettings::default());
        let buffer = Buffer::create(&context, MemFlags::READ_WRITE, 256, None).unwrap();
        let desc = ImageDescriptor::new(MemObjectType::Image1DBuffer, 64, 0)
            .with_mem_object(Arc::clone(&buffer));
        let image = Image::create(&context, MemFlags::READ_WRITE, rgba8(), &desc, None).unwrap();
        assert_eq!(buffer.mem_obj().internal_ref_count(), 1);
        assert!(image.mem_obj().is_object_redescribed());
        assert!(!image.mem_obj().owns_allocation());
        drop(image);
        assert_eq!(buffer.mem_obj().internal_ref_count(), 0);
    }

    #[test]
    fn test_2d_image_over_small_buffer_is_padded() {
        let context = context_with(DebugSettings::default());
        let buffer = Buffer::create(&context, MemFlags::READ_WRITE, 64, None).unwrap();
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 4, 4)
            .with_mem_object(Arc::clone(&buffer));
        let image = Image::create(&context, MemFlags::READ_WRITE, rgba8(), &desc, None).unwrap();
        let allocation = image.mem_obj().graphics_allocation();
        assert!(allocation.kind().contains(AllocationKind::PADDING));
        assert!(image.mem_obj().owns_allocation());
        assert!(Arc::ptr_eq(
            allocation.padded_source().unwrap(),
            buffer.mem_obj().graphics_allocation()
        ));
    }

    #[test]
    fn test_gen12lp_tiled_images_are_compressed() {
        let hw_info = HardwareInfo::for_product(ProductFamily::Tigerlake).unwrap();
        let context = Context::new(Device::with_settings(hw_info, DebugSettings::default()));
        let desc = ImageDescriptor::new(MemObjectType::Image2D, 8, 8);
        let image = Image::create(&context, MemFlags::READ_WRITE, rgba8(), &desc, None).unwrap();
        assert!(image.is_render_compressed());

        let linear = ImageDescriptor::new(MemObjectType::Image1D, 8, 0);
        let image = Image::create(&context, MemFlags::READ_WRITE, rgba8(), &linear, None).unwrap();
        assert!(!image.is_render_compressed());
    }
}
