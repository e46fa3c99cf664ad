//! # xpu-core
//!
//! Device-side building blocks of the compute runtime: hardware description,
//! memory management, surface layout and command submission.

pub mod command_stream;
pub mod device;
pub mod error;
pub mod hw_info;
pub mod layout;
pub mod memory;
pub mod settings;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version.
pub fn init() {
    log::info!("xpu-core v{} initialized", VERSION);
}
