//! Per core family image constructors.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;

use xpu_core::hw_info::GfxCoreFamily;

use super::{Image, ImageParams};

/// Constructor producing the family-specific image.
pub type CreateImageFn = fn(ImageParams) -> Image;

static IMAGE_FACTORY: OnceLock<RwLock<HashMap<GfxCoreFamily, CreateImageFn>>> = OnceLock::new();

fn image_factory() -> &'static RwLock<HashMap<GfxCoreFamily, CreateImageFn>> {
    IMAGE_FACTORY.get_or_init(|| {
        let mut factory: HashMap<GfxCoreFamily, CreateImageFn> = HashMap::new();
        factory.insert(GfxCoreFamily::Gen9, Image::from_params);
        factory.insert(GfxCoreFamily::Gen11, Image::from_params);
        factory.insert(GfxCoreFamily::Gen12Lp, create_gen12lp_image);
        RwLock::new(factory)
    })
}

/// Register (or replace) the image constructor of a core family.
pub fn register_image_factory(family: GfxCoreFamily, create: CreateImageFn) {
    log::debug!("Registering image factory for {:?}", family);
    image_factory().write().insert(family, create);
}

/// Tiled surfaces on Gen12LP are render compressed when the SKU supports it.
fn create_gen12lp_image(params: ImageParams) -> Image {
    let compress = params.is_tiled()
        && params
            .context()
            .device()
            .hardware_info()
            .supports_render_compression;
    let mut image = Image::from_params(params);
    image.render_compressed = compress;
    image
}

impl Image {
    /// Build the image through the constructor registered for the device.
    ///
    /// Devices are only created for known families, so a missing
    /// constructor is a programming error.
    pub(super) fn create_image_hw(params: ImageParams) -> Image {
        let hw_info = params.context().device().hardware_info();
        let family = hw_info.core_family;
        let create = image_factory()
            .read()
            .get(&family)
            .copied()
            .unwrap_or_else(|| panic!("no image factory registered for {:?}", family));
        let mut image = create(params);
        image.create_function = create;
        image
    }

    /// Constructor this image was built with; redescribed views reuse it.
    pub fn create_function(&self) -> CreateImageFn {
        self.create_function
    }
}
