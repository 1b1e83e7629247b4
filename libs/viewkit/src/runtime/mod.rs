//! Runtime side of the framework: module and component instances, the
//! per-call resolution context, and the factory that drives them.

mod component_instance;
mod context;
mod error;
mod factory;
mod module_instance;

pub use component_instance::{ComponentInstance, ComponentValue, LazyRenderable, Renderable, SharedError};
pub use context::{ComponentLookup, DependencyMap, Resolved, ResolutionContext};
pub use error::FactoryError;
pub use factory::Factory;
pub use module_instance::ModuleInstance;
