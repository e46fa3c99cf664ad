//! Shared fixtures for the runtime integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use xpu_core::command_stream::{CommandStreamReceiver, CompletionMode, SoftwareCommandStreamReceiver};
use xpu_core::device::Device;
use xpu_core::hw_info::{HardwareInfo, ProductFamily};
use xpu_core::settings::DebugSettings;
use xpu_runtime::context::Context;
use xpu_runtime::formats::{ChannelOrder, ChannelType, ImageFormat};
use xpu_runtime::queue::{CommandQueueDesc, CommandQueueImp};

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn device(settings: DebugSettings) -> Arc<Device> {
    init_logging();
    Device::with_settings(HardwareInfo::skylake(), settings)
}

pub fn context() -> Arc<Context> {
    Context::new(device(DebugSettings::default()))
}

pub fn format(order: ChannelOrder, data_type: ChannelType) -> ImageFormat {
    ImageFormat::new(order, data_type)
}

pub fn rgba8() -> ImageFormat {
    format(ChannelOrder::Rgba, ChannelType::UnormInt8)
}

/// A queue on a Skylake device and the software receiver it submits to.
pub struct QueueFixture {
    pub device: Arc<Device>,
    pub receiver: Arc<SoftwareCommandStreamReceiver>,
    pub queue: Box<CommandQueueImp>,
}

pub fn queue_fixture(mode: CompletionMode, settings: DebugSettings) -> QueueFixture {
    let device = device(settings);
    let receiver = Arc::new(SoftwareCommandStreamReceiver::new(mode));
    let csr: Arc<dyn CommandStreamReceiver> = Arc::clone(&receiver) as _;
    let queue = CommandQueueImp::create(
        ProductFamily::Skylake,
        Arc::clone(&device),
        csr,
        &CommandQueueDesc::default(),
        false,
        false,
    )
    .expect("queue creation");
    QueueFixture {
        device,
        receiver,
        queue,
    }
}
