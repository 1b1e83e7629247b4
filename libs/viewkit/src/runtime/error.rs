use std::time::Duration;

use thiserror::Error;

use crate::token::{ClassId, Token};

/// Structured errors raised while building the module graph and resolving
/// instances. Every variant is fatal for the `create` call that raised it.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("{class} is not a module, did you register it with #[module]?")]
    NotAModule { class: ClassId },

    #[error("{class} is not a component, did you register it with #[component]?")]
    NotAComponent { class: ClassId },

    #[error("{class} has no injectable metadata, did you derive Injectable for it?")]
    NotInjectable { class: ClassId },

    #[error("loading a deferred import of module {module} failed")]
    DeferredImport {
        module: ClassId,
        #[source]
        source: anyhow::Error,
    },

    #[error("root module {module} must export exactly one component, found {found}")]
    RootComponentCount { module: ClassId, found: usize },

    #[error("exported root component {component} is not declared by any reachable module")]
    RootComponentMissing { component: ClassId },

    #[error("Module cannot import itself: {module}")]
    SelfImport { module: ClassId },

    #[error("Cyclic dependence relation between {a} and {b}")]
    CyclicDependence { a: ClassId, b: ClassId },

    #[error("cyclic module import detected: {}", join_path(path))]
    CycleDetected { path: Vec<ClassId> },

    #[error("{token} is declared by both {first} and {second}")]
    DuplicateDeclaration {
        token: Token,
        first: ClassId,
        second: ClassId,
    },

    #[error("Cannot find the module that provides {token}, please make sure it is exported")]
    ProviderNotFound { token: Token },

    #[error("Provider {provider} cannot depend on itself")]
    SelfDependency { provider: ClassId },

    #[error("cyclic provider dependency detected: {}", join_path(path))]
    ProviderCycle { path: Vec<ClassId> },

    #[error(
        "Cannot inject {dependency} into provider {provider}, \
         please make sure {module} imports the module that exports it"
    )]
    CannotInjectIntoProvider {
        dependency: Token,
        provider: Token,
        module: ClassId,
    },

    #[error(
        "Cannot inject {dependency} into component {component}, \
         please make sure {module} imports the module that exports it"
    )]
    CannotInjectIntoComponent {
        dependency: Token,
        component: ClassId,
        module: ClassId,
    },

    #[error("Cannot inject {dependency} into component {component}: no instance was created for it")]
    ProviderInstanceMissing {
        dependency: Token,
        component: ClassId,
    },

    #[error("value of {token} requested by {requested_by} has not been generated yet")]
    ProviderNotReady { token: Token, requested_by: Token },

    #[error("constructing provider {provider} failed")]
    ProviderConstruction {
        provider: ClassId,
        #[source]
        source: anyhow::Error,
    },

    #[error("factory of component {component} failed")]
    ComponentFactory {
        component: ClassId,
        #[source]
        source: anyhow::Error,
    },

    #[error("factory of {token} in module {module} failed")]
    ValueFactory {
        token: Token,
        module: ClassId,
        #[source]
        source: anyhow::Error,
    },

    #[error("platform failed to generate component {component}")]
    Platform {
        component: ClassId,
        #[source]
        source: anyhow::Error,
    },

    #[error("{what} did not complete within {timeout:?}")]
    Timeout { what: String, timeout: Duration },

    #[error("unknown component '{0}'")]
    UnknownComponent(String),

    #[error("route '{path}' must set exactly one of a component class or a module class")]
    InvalidRoute { path: String },

    #[error("route '{path}' uses component {component} which is not reachable from the root module")]
    RouteComponentNotFound { path: String, component: ClassId },

    #[error("module routes recurse back into themselves: {}", join_path(path))]
    RouteCycle { path: Vec<ClassId> },

    #[error("no application has been created yet")]
    NotCreated,
}

fn join_path(path: &[ClassId]) -> String {
    path.iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(" -> ")
}
