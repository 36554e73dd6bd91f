//! Component Registry
//!
//! Central table of component factories, queried by declared type and port.

use log::debug;
use parking_lot::RwLock;
use std::sync::Arc;

use super::types::{ComponentFactory, Port};

/// Registry of component factories.
///
/// One instance is built at startup and shared as `Arc<ComponentRegistry>`
/// with every slot and container. Entries keep their registration order so
/// that the first registered candidate is the default tab.
pub struct ComponentRegistry {
    /// Factories in registration order, unique by name
    factories: RwLock<Vec<Arc<ComponentFactory>>>,
}

impl ComponentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(Vec::new()),
        }
    }

    /// Register a factory, replacing any existing factory with the same name
    pub fn register(&self, factory: ComponentFactory) {
        let mut factories = self.factories.write();
        let factory = Arc::new(factory);

        if let Some(existing) = factories.iter_mut().find(|f| f.name == factory.name) {
            debug!(
                "Replacing component {} ({} / {})",
                factory.name, factory.handled_type, factory.port
            );
            *existing = factory;
        } else {
            debug!(
                "Registered component {} ({} / {})",
                factory.name, factory.handled_type, factory.port
            );
            factories.push(factory);
        }
    }

    /// Register several factories in order
    pub fn register_all(&self, factories: impl IntoIterator<Item = ComponentFactory>) {
        for factory in factories {
            self.register(factory);
        }
    }

    /// Remove a factory by name
    pub fn unregister(&self, name: &str) -> Option<Arc<ComponentFactory>> {
        let mut factories = self.factories.write();
        let index = factories.iter().position(|f| f.name == name)?;
        Some(factories.remove(index))
    }

    /// Get a factory by name
    pub fn get_by_identity(&self, name: &str) -> Option<Arc<ComponentFactory>> {
        self.factories.read().iter().find(|f| f.name == name).cloned()
    }

    /// All factories handling `type_name` on `port`, in registration order.
    ///
    /// Only the top-level name is compared; generic arguments are resolved
    /// by the container component itself.
    pub fn get_by_type_and_port(&self, type_name: &str, port: Port) -> Vec<Arc<ComponentFactory>> {
        self.factories
            .read()
            .iter()
            .filter(|f| f.handled_type == type_name && f.port == port)
            .cloned()
            .collect()
    }

    /// List all factories
    pub fn list_all(&self) -> Vec<Arc<ComponentFactory>> {
        self.factories.read().clone()
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
