//! # xpu-runtime
//!
//! API-facing objects of the compute runtime.
//!
//! ## Modules
//!
//! - [`formats`] - Image formats and surface format tables
//! - [`context`] - Contexts, events and the internal transfer queue
//! - [`mem_obj`] - Buffers and images
//! - [`queue`] - Command queues and their double-buffered command buffers
//! - [`error`] - Error types and API status codes
//!
//! ## Example
//!
//! ```
//! use xpu_core::device::Device;
//! use xpu_core::hw_info::HardwareInfo;
//! use xpu_runtime::context::Context;
//! use xpu_runtime::formats::{ChannelOrder, ChannelType, ImageFormat};
//! use xpu_runtime::mem_obj::{Image, ImageDescriptor, MemFlags, MemObjectType};
//!
//! let device = Device::with_settings(HardwareInfo::skylake(), Default::default());
//! let context = Context::new(device);
//! let format = ImageFormat::new(ChannelOrder::Rgba, ChannelType::UnormInt8);
//! let desc = ImageDescriptor::new(MemObjectType::Image2D, 4, 4);
//! let image =
//!     Image::validate_and_create_image(&context, MemFlags::READ_WRITE, Some(&format), &desc, None)
//!         .unwrap();
//! assert_eq!(image.host_ptr_row_pitch(), 16);
//! ```

pub mod context;
pub mod error;
pub mod formats;
pub mod mem_obj;
pub mod queue;

pub use context::{Context, Event, InternalQueue};
pub use error::{ImageError, QueueError};
pub use mem_obj::{Buffer, Image, ImageDescriptor, MemFlags, MemObjectType};
pub use queue::{CommandQueueDesc, CommandQueueImp, CommandQueueRegistry};

/// Runtime library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging-visible state of the runtime.
///
/// Builds the process-wide command queue registry up front so the first
/// queue creation does not pay for it.
pub fn init() {
    xpu_core::init();
    let registry = queue::CommandQueueRegistry::global();
    log::info!("xpu-runtime v{} initialized ({:?})", VERSION, registry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
