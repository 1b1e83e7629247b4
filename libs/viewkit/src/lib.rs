//! # ViewKit - Declarative Module Composition for View Trees
//!
//! Dependency injection and module composition for component-based UIs.
//!
//! ## Features
//!
//! - **Declarative**: `#[module(...)]`, `#[component(...)]` and
//!   `#[derive(Injectable)]` attach metadata to plain types
//! - **Auto-discovery**: registrations are collected via inventory
//! - **Explicit visibility**: a provider is injectable only where its module
//!   is imported and exports it, or where its module is global
//! - **Phase-based resolution**: modules → link → providers → components →
//!   provider values
//!
//! ## Basic Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use viewkit::{component, module, ComponentFactory, Factory, Injectable, MetadataRegistry};
//!
//! #[derive(Injectable)]
//! pub struct BarService;
//!
//! #[derive(Injectable)]
//! pub struct FooService {
//!     bar: Arc<BarService>,
//! }
//!
//! #[component(factory = ComponentFactory::value("<foo/>"), declarations = [FooService])]
//! pub struct FooComponent;
//!
//! #[module(providers = [BarService], exports = [BarService])]
//! pub struct BarModule;
//!
//! #[module(imports = [BarModule], providers = [FooService],
//!          components = [FooComponent], exports = [FooComponent])]
//! pub struct FooModule;
//!
//! let mut factory = Factory::new(MetadataRegistry::discover()?);
//! let root = factory.create(viewkit::class::<FooModule>()).await?;
//! let deps = factory.generate_dependency_map(&root)?;
//! ```

// Lets the macros refer to `::viewkit` from inside this crate's own tests.
extern crate self as viewkit;

pub use anyhow::Result;
pub use async_trait::async_trait;

// Re-export inventory for user convenience
pub use inventory;

pub mod config;
pub mod contracts;
pub mod metadata;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod token;

pub use config::FactoryConfig;
pub use contracts::{Args, Injectable, Interceptor, Platform};
pub use metadata::{
    BasicProvider, ComponentFactory, ComponentOptions, DependencyList, InjectSite, ModuleOptions,
    ModuleRef, ProviderDef, ValueFactory,
};
pub use registry::{MetadataRegistry, RegistryBuilder, RegistryError};
pub use router::{RouteOptions, RouterItem, RouterModule};
pub use runtime::{
    ComponentInstance, ComponentLookup, ComponentValue, DependencyMap, Factory, FactoryError,
    ModuleInstance, Renderable, Resolved, ResolutionContext,
};
pub use token::{class, ClassId, Instance, Token};

// Re-export the macros from the proc-macro crate
pub use viewkit_macros::{component, module, Injectable};
