//! Device handle shared by contexts and command queues.

use std::sync::Arc;

use crate::hw_info::{DeviceCap, DeviceCapabilities, HardwareInfo};
use crate::memory::{MemoryManager, OsAgnosticMemoryManager};
use crate::settings::DebugSettings;

/// A device: hardware description, memory manager and debug settings.
///
/// # Thread Safety
///
/// `Device` is `Send + Sync` and is shared through `Arc`.
pub struct Device {
    hw_info: HardwareInfo,
    memory_manager: Arc<dyn MemoryManager>,
    root_device_index: u32,
    settings: DebugSettings,
}

impl Device {
    /// Create a device with an explicit memory manager.
    pub fn new(
        hw_info: HardwareInfo,
        memory_manager: Arc<dyn MemoryManager>,
        settings: DebugSettings,
    ) -> Arc<Self> {
        log::info!(
            "Device created: {} ({}, {:?})",
            hw_info.name,
            hw_info.product_family,
            hw_info.core_family
        );
        Arc::new(Self {
            hw_info,
            memory_manager,
            root_device_index: 0,
            settings,
        })
    }

    /// Create a device backed by an [`OsAgnosticMemoryManager`] configured
    /// from `settings`.
    pub fn with_settings(hw_info: HardwareInfo, settings: DebugSettings) -> Arc<Self> {
        let mut manager =
            OsAgnosticMemoryManager::new().with_virtual_padding(settings.virtual_padding);
        if let Some(budget) = settings.device_memory_budget {
            manager = manager.with_budget(budget);
        }
        Self::new(hw_info, Arc::new(manager), settings)
    }

    pub fn hardware_info(&self) -> &HardwareInfo {
        &self.hw_info
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.hw_info.capabilities
    }

    /// Typed capability query.
    ///
    /// ```
    /// use xpu_core::device::Device;
    /// use xpu_core::hw_info::{HardwareInfo, Image2dMaxWidth};
    ///
    /// let device = Device::with_settings(HardwareInfo::skylake(), Default::default());
    /// assert_eq!(device.get_cap::<Image2dMaxWidth>(), 16384);
    /// ```
    pub fn get_cap<C: DeviceCap>(&self) -> C::Value {
        C::get(&self.hw_info.capabilities)
    }

    pub fn memory_manager(&self) -> &Arc<dyn MemoryManager> {
        &self.memory_manager
    }

    pub fn root_device_index(&self) -> u32 {
        self.root_device_index
    }

    /// Single root device only.
    pub fn is_multi_device_capable(&self) -> bool {
        false
    }

    pub fn settings(&self) -> &DebugSettings {
        &self.settings
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.hw_info.name)
            .field("product_family", &self.hw_info.product_family)
            .field("root_device_index", &self.root_device_index)
            .finish()
    }
}

static_assertions::assert_impl_all!(Device: Send, Sync);
