//! Route tree construction from declarative route options.
//!
//! A route either renders a component or mounts another module's routes
//! under its path. Module routes are flattened into the parent list.

use std::any::Any;
use std::sync::Arc;

use crate::runtime::{ComponentInstance, Factory, FactoryError, ResolutionContext};
use crate::token::ClassId;

/// One declared route.
#[derive(Clone, Debug, Default)]
pub struct RouteOptions {
    pub path: String,
    pub use_component_class: Option<ClassId>,
    pub use_module_class: Option<ClassId>,
    pub children: Vec<RouteOptions>,
}

impl RouteOptions {
    /// Route rendering component `C`.
    pub fn component<C: Any>(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            use_component_class: Some(ClassId::of::<C>()),
            ..Default::default()
        }
    }

    /// Route mounting the routes of module `M`.
    pub fn module<M: Any>(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            use_module_class: Some(ClassId::of::<M>()),
            ..Default::default()
        }
    }

    pub fn children(mut self, children: impl IntoIterator<Item = RouteOptions>) -> Self {
        self.children.extend(children);
        self
    }
}

/// A resolved route: full path plus the component instance it renders.
#[derive(Clone, Debug)]
pub struct RouterItem {
    pub path: String,
    pub component: Arc<ComponentInstance>,
    pub children: Vec<RouterItem>,
}

impl RouterItem {
    /// Depth-first list of `(path, component name)` pairs.
    pub fn flatten(&self) -> Vec<(String, &'static str)> {
        let mut out = vec![(self.path.clone(), self.component.name())];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }
}

pub struct RouterModule;

impl RouterModule {
    /// Resolves `routes` against the factory's current application.
    pub fn create_router_items(
        factory: &Factory,
        routes: &[RouteOptions],
    ) -> Result<Vec<RouterItem>, FactoryError> {
        let ctx = factory.context().ok_or(FactoryError::NotCreated)?;
        let mut mounting = Vec::new();
        create_items(ctx, routes, "", &mut mounting)
    }

    /// Resolves the routes declared on the root module.
    pub fn root_routes(factory: &Factory) -> Result<Vec<RouterItem>, FactoryError> {
        let root = factory
            .root_module_instance()
            .ok_or(FactoryError::NotCreated)?;
        Self::create_router_items(factory, &root.metadata().routes)
    }
}

fn create_items(
    ctx: &ResolutionContext,
    routes: &[RouteOptions],
    prefix: &str,
    mounting: &mut Vec<ClassId>,
) -> Result<Vec<RouterItem>, FactoryError> {
    let mut items = Vec::new();
    for route in routes {
        let path = join_path(prefix, &route.path);
        match (route.use_component_class, route.use_module_class) {
            (Some(component), None) => {
                let instance = ctx.component_instances().get(&component).cloned().ok_or_else(|| {
                    FactoryError::RouteComponentNotFound {
                        path: path.clone(),
                        component,
                    }
                })?;
                let children = create_items(ctx, &route.children, &path, mounting)?;
                items.push(RouterItem {
                    path,
                    component: instance,
                    children,
                });
            }
            (None, Some(module)) => {
                if mounting.contains(&module) {
                    let mut cycle = mounting.clone();
                    cycle.push(module);
                    return Err(FactoryError::RouteCycle { path: cycle });
                }
                let meta = ctx
                    .registry
                    .module(module)
                    .cloned()
                    .ok_or(FactoryError::NotAModule { class: module })?;

                mounting.push(module);
                let mut mounted = create_items(ctx, &meta.routes, &path, mounting)?;
                mounting.pop();

                for item in &mut mounted {
                    let extra = create_items(ctx, &route.children, &item.path, mounting)?;
                    item.children.extend(extra);
                }
                items.extend(mounted);
            }
            _ => {
                return Err(FactoryError::InvalidRoute {
                    path: route.path.clone(),
                })
            }
        }
    }
    Ok(items)
}

/// Joins a parent path and a segment with exactly one `/` between them.
/// A leading `/` on the first non-empty part is kept.
pub fn join_path(prefix: &str, segment: &str) -> String {
    let rooted = prefix.starts_with('/') || (prefix.is_empty() && segment.starts_with('/'));
    let head = prefix.trim_matches('/');
    let tail = segment.trim_matches('/');
    let joined = match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (false, true) => head.to_string(),
        (false, false) => format!("{head}/{tail}"),
    };
    if rooted {
        format!("/{joined}")
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_normalizes_slashes() {
        assert_eq!(join_path("", "/home"), "/home");
        assert_eq!(join_path("/p", "x"), "/p/x");
        assert_eq!(join_path("/p/", "/x/"), "/p/x");
        assert_eq!(join_path("/p", ""), "/p");
        assert_eq!(join_path("/p", "/"), "/p");
        assert_eq!(join_path("/", "x"), "/x");
        assert_eq!(join_path("", "/"), "/");
        assert_eq!(join_path("p", "x"), "p/x");
    }

    struct Page;
    struct Area;

    #[test]
    fn route_builders() {
        let r = RouteOptions::module::<Area>("/area").children([RouteOptions::component::<Page>("p")]);
        assert_eq!(r.use_module_class, Some(ClassId::of::<Area>()));
        assert!(r.use_component_class.is_none());
        assert_eq!(r.children.len(), 1);
        assert_eq!(r.children[0].use_component_class, Some(ClassId::of::<Page>()));
    }
}
