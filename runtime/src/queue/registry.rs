//! Command queue constructors keyed by product family.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use xpu_core::command_stream::CommandStreamReceiver;
use xpu_core::device::Device;
use xpu_core::hw_info::ProductFamily;

use super::{CommandQueueDesc, CommandQueueImp};
use crate::error::QueueError;

/// Constructor of an uninitialized queue for one product family.
pub type CommandQueueAllocatorFn =
    fn(Arc<Device>, Arc<dyn CommandStreamReceiver>, &CommandQueueDesc) -> Box<CommandQueueImp>;

const SUPPORTED_PRODUCTS: [ProductFamily; 9] = [
    ProductFamily::Skylake,
    ProductFamily::Kabylake,
    ProductFamily::Coffeelake,
    ProductFamily::Icelake,
    ProductFamily::Lakefield,
    ProductFamily::Tigerlake,
    ProductFamily::Rocketlake,
    ProductFamily::AlderlakeS,
    ProductFamily::Dg1,
];

static GLOBAL_REGISTRY: OnceLock<CommandQueueRegistry> = OnceLock::new();

/// Maps a product family to its queue constructor.
///
/// The global registry knows every supported product. Tests and embedders
/// build local registries to add or hide families.
#[derive(Default)]
pub struct CommandQueueRegistry {
    allocators: RwLock<HashMap<ProductFamily, CommandQueueAllocatorFn>>,
}

impl CommandQueueRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the constructors of all supported products.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for family in SUPPORTED_PRODUCTS {
            registry.register(family, CommandQueueImp::allocate);
        }
        registry
    }

    /// The process-wide registry used by [`CommandQueueImp::create`].
    pub fn global() -> &'static Self {
        GLOBAL_REGISTRY.get_or_init(Self::with_defaults)
    }

    /// Register (or replace) the constructor of `family`.
    pub fn register(&self, family: ProductFamily, allocator: CommandQueueAllocatorFn) {
        log::debug!("Registering command queue allocator for {}", family);
        self.allocators.write().insert(family, allocator);
    }

    /// Remove the constructor of `family`, returning it.
    pub fn unregister(&self, family: ProductFamily) -> Option<CommandQueueAllocatorFn> {
        self.allocators.write().remove(&family)
    }

    pub fn get(&self, family: ProductFamily) -> Option<CommandQueueAllocatorFn> {
        self.allocators.read().get(&family).copied()
    }

    /// Allocate and initialize a queue for `product_family`.
    ///
    /// A queue whose initialization fails is destroyed before the error is
    /// returned.
    pub fn create(
        &self,
        product_family: ProductFamily,
        device: Arc<Device>,
        receiver: Arc<dyn CommandStreamReceiver>,
        desc: &CommandQueueDesc,
        copy_only: bool,
        internal: bool,
    ) -> Result<Box<CommandQueueImp>, QueueError> {
        let Some(allocator) = self.get(product_family) else {
            log::warn!("No command queue allocator for {}", product_family);
            return Err(QueueError::Uninitialized);
        };

        let mut queue = allocator(device, receiver, desc);
        if let Err(err) = queue.initialize(copy_only, internal) {
            log::warn!("Command queue initialization failed: {}", err);
            queue.destroy();
            return Err(err);
        }
        log::info!(
            "Command queue created for {} (copy only: {}, internal: {})",
            product_family,
            copy_only,
            internal
        );
        Ok(queue)
    }
}

impl std::fmt::Debug for CommandQueueRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut families: Vec<String> = self
            .allocators
            .read()
            .keys()
            .map(ToString::to_string)
            .collect();
        families.sort();
        f.debug_struct("CommandQueueRegistry")
            .field("families", &families)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_known_products() {
        let registry = CommandQueueRegistry::with_defaults();
        for family in SUPPORTED_PRODUCTS {
            assert!(registry.get(family).is_some(), "{family} not registered");
        }
        assert!(registry.get(ProductFamily::Unknown).is_none());
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = CommandQueueRegistry::new();
        assert!(registry.get(ProductFamily::Dg1).is_none());
        registry.register(ProductFamily::Dg1, CommandQueueImp::allocate);
        assert!(registry.get(ProductFamily::Dg1).is_some());
        assert!(registry.unregister(ProductFamily::Dg1).is_some());
        assert!(registry.unregister(ProductFamily::Dg1).is_none());
    }
}
