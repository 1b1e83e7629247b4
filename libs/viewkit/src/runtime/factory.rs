//! Factory - turns a root module class into a fully resolved application

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use super::context::{bounded, ComponentLookup, DependencyMap, ProviderOwner, Resolved, ResolutionContext};
use super::{ComponentInstance, ComponentValue, FactoryError, ModuleInstance};
use crate::config::FactoryConfig;
use crate::contracts::{Args, Platform};
use crate::metadata::{ModuleRef, ProviderDef};
use crate::registry::MetadataRegistry;
use crate::token::{ClassId, Instance, Token};

/// Builds the module graph, instantiates providers and components, and keeps
/// the result of the last successful [`create`](Factory::create).
pub struct Factory {
    registry: Arc<MetadataRegistry>,
    platform: Option<Arc<dyn Platform>>,
    config: FactoryConfig,
    context: Option<Arc<ResolutionContext>>,
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("registry", &self.registry)
            .field("platform", &self.platform.is_some())
            .field("config", &self.config)
            .field("context", &self.context)
            .finish()
    }
}

impl Factory {
    pub fn new(registry: impl Into<Arc<MetadataRegistry>>) -> Self {
        Self {
            registry: registry.into(),
            platform: None,
            config: FactoryConfig::default(),
            context: None,
        }
    }

    pub fn with_platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_config(mut self, config: FactoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Resolution state of the last successful `create`.
    pub fn context(&self) -> Option<&Arc<ResolutionContext>> {
        self.context.as_ref()
    }

    /// Resolves the application rooted at `root` and returns the instance of
    /// the one component the root module exports.
    ///
    /// On error the factory keeps no partial state: accessors report nothing
    /// until a later call succeeds.
    pub async fn create(&mut self, root: ClassId) -> Result<Arc<ComponentInstance>, FactoryError> {
        self.context = None;
        let timeout = self.config.resolve_timeout;
        let mut ctx = ResolutionContext::new(self.registry.clone(), root);

        info!(root = %root, "Phase: modules");
        build_module_graph(&mut ctx, timeout).await?;
        let root_component = exported_root_component(&ctx)?;

        info!("Phase: link");
        link_imports(&ctx)?;
        index_owners(&mut ctx)?;

        let reachable = reachable_modules(&ctx)?;
        debug!(modules = reachable.len(), "Module graph resolved");

        info!("Phase: providers");
        for module in &reachable {
            instantiate_module_providers(&mut ctx, module)?;
        }

        info!("Phase: components");
        for module in &reachable {
            instantiate_module_components(&mut ctx, module)?;
        }
        self.render_components(&ctx).await?;

        info!("Phase: provider values");
        for module in ctx.modules.values().rev() {
            module.generate_provider_values(&ctx, timeout).await?;
        }

        let instance = ctx
            .components
            .get(&root_component)
            .cloned()
            .ok_or(FactoryError::RootComponentMissing {
                component: root_component,
            })?;

        info!(
            root = %root,
            component = %instance.class(),
            modules = ctx.modules.len(),
            providers = ctx.providers.len(),
            components = ctx.components.len(),
            "Application created"
        );
        self.context = Some(Arc::new(ctx));
        Ok(instance)
    }

    /// Populates every component, in reverse creation order, then wires its
    /// interceptors from a dependency map that tolerates pending values.
    async fn render_components(&self, ctx: &ResolutionContext) -> Result<(), FactoryError> {
        let timeout = self.config.resolve_timeout;
        let order: Vec<_> = ctx.components.values().rev().cloned().collect();

        for instance in order {
            let class = instance.class();
            if !instance.has_component() {
                let meta = instance.metadata();
                let raw = if meta.lazy {
                    ComponentValue::lazy(meta.factory.call())
                } else {
                    let value = bounded(
                        timeout,
                        || format!("factory of component {class}"),
                        meta.factory.call(),
                    )
                    .await?
                    .map_err(|source| FactoryError::ComponentFactory {
                        component: class,
                        source,
                    })?;
                    ComponentValue::Ready(value)
                };

                let value = match &self.platform {
                    Some(platform) => bounded(
                        timeout,
                        || format!("platform generation of component {class}"),
                        platform.generate_component(&instance, raw),
                    )
                    .await?
                    .map_err(|source| FactoryError::Platform {
                        component: class,
                        source,
                    })?,
                    None => raw,
                };
                instance.set_component(value);
            }

            let deps = ctx.dependency_map(&instance, true)?;
            if self.config.log_dependency_maps {
                debug!(
                    component = %class,
                    tokens = ?deps.tokens().collect::<Vec<_>>(),
                    "Dependency map"
                );
            }
            attach_interceptors(ctx, &instance, &deps);
        }
        Ok(())
    }

    /// Dependency map of a component of the current application.
    ///
    /// Every declared basic provider must have its value by now; a pending
    /// one is reported as [`FactoryError::ProviderNotReady`].
    pub fn generate_dependency_map<'a>(
        &self,
        lookup: impl Into<ComponentLookup<'a>>,
    ) -> Result<DependencyMap, FactoryError> {
        let ctx = self.context.as_ref().ok_or(FactoryError::NotCreated)?;
        let instance = ctx.lookup(lookup.into())?;
        ctx.dependency_map(&instance, false)
    }

    pub fn module_instance_map(&self) -> IndexMap<ClassId, Arc<ModuleInstance>> {
        self.context
            .as_ref()
            .map(|ctx| ctx.modules.clone())
            .unwrap_or_default()
    }

    pub fn component_instance_map(&self) -> IndexMap<ClassId, Arc<ComponentInstance>> {
        self.context
            .as_ref()
            .map(|ctx| ctx.components.clone())
            .unwrap_or_default()
    }

    pub fn root_module_instance(&self) -> Option<Arc<ModuleInstance>> {
        let ctx = self.context.as_ref()?;
        ctx.modules.get(&ctx.root).cloned()
    }

    pub fn component_instance(&self, class: ClassId) -> Option<Arc<ComponentInstance>> {
        self.context.as_ref()?.components.get(&class).cloned()
    }

    /// Typed access to a class provider of the current application.
    pub fn provider<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.context
            .as_ref()?
            .providers
            .get(&ClassId::of::<T>())?
            .clone()
            .downcast::<T>()
            .ok()
    }
}

/* ------------------------------ module graph ----------------------------- */

/// Depth-first preorder walk of the imports. Deferred imports are awaited
/// where they are met; value imports carry no module.
async fn build_module_graph(
    ctx: &mut ResolutionContext,
    timeout: Option<Duration>,
) -> Result<(), FactoryError> {
    let mut stack: Vec<(Option<ClassId>, ModuleRef)> = vec![(None, ModuleRef::Class(ctx.root))];

    while let Some((importer, module_ref)) = stack.pop() {
        let class = match module_ref {
            ModuleRef::Class(c) => c,
            ModuleRef::Value(_) => continue,
            ModuleRef::Deferred(deferred) => {
                let module = importer.unwrap_or(ctx.root);
                bounded(
                    timeout,
                    || format!("deferred import of module {module}"),
                    deferred.load(),
                )
                .await?
                .map_err(|source| FactoryError::DeferredImport { module, source })?
            }
        };

        if let Some(importer) = importer {
            if let Some(edges) = ctx.edges.get_mut(&importer) {
                edges.push(class);
            }
        }
        if ctx.modules.contains_key(&class) {
            continue;
        }

        let meta = ctx
            .registry
            .module(class)
            .cloned()
            .ok_or(FactoryError::NotAModule { class })?;
        let instance = Arc::new(ModuleInstance::new(meta.clone(), ctx.globals.clone()));
        if meta.global {
            ctx.globals.write().push(Arc::downgrade(&instance));
        }
        debug!(module = %class, global = meta.global, "Module instance created");
        ctx.modules.insert(class, instance);
        ctx.edges.insert(class, Vec::new());

        for import in meta.imports.iter().rev() {
            stack.push((Some(class), import.clone()));
        }
    }
    Ok(())
}

fn exported_root_component(ctx: &ResolutionContext) -> Result<ClassId, FactoryError> {
    let root = ctx.require_module(ctx.root)?;
    let exported: Vec<ClassId> = root
        .exports()
        .iter()
        .filter_map(Token::as_class)
        .filter(|c| ctx.registry.is_component(*c))
        .collect();
    match exported.as_slice() {
        [component] => Ok(*component),
        _ => Err(FactoryError::RootComponentCount {
            module: ctx.root,
            found: exported.len(),
        }),
    }
}

/// Validates the recorded import edges and links every module to its direct
/// imports.
fn link_imports(ctx: &ResolutionContext) -> Result<(), FactoryError> {
    for (class, imports) in &ctx.edges {
        let module = ctx.require_module(*class)?;
        for imported in imports {
            if imported == class {
                return Err(FactoryError::SelfImport { module: *class });
            }
            if ctx
                .edges
                .get(imported)
                .is_some_and(|back| back.contains(class))
            {
                return Err(FactoryError::CyclicDependence {
                    a: *class,
                    b: *imported,
                });
            }
            module.add_imported_module_instance(&ctx.require_module(*imported)?);
        }
    }

    let names: Vec<ClassId> = ctx.edges.keys().copied().collect();
    let adj: Vec<Vec<usize>> = ctx
        .edges
        .values()
        .map(|imports| {
            imports
                .iter()
                .filter_map(|c| ctx.edges.get_index_of(c))
                .collect()
        })
        .collect();
    if let Some(path) = detect_cycle_with_path(&names, &adj) {
        return Err(FactoryError::CycleDetected { path });
    }
    Ok(())
}

/// Cycle detection over the import edges, reporting the cycle as a path
/// that ends where it started.
fn detect_cycle_with_path(names: &[ClassId], adj: &[Vec<usize>]) -> Option<Vec<ClassId>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    fn dfs(
        node: usize,
        names: &[ClassId],
        adj: &[Vec<usize>],
        colors: &mut [Color],
        path: &mut Vec<usize>,
    ) -> Option<Vec<ClassId>> {
        colors[node] = Color::Gray;
        path.push(node);

        for &next in &adj[node] {
            match colors[next] {
                Color::Gray => {
                    if let Some(start) = path.iter().position(|&n| n == next) {
                        let mut cycle: Vec<ClassId> = path[start..].iter().map(|&i| names[i]).collect();
                        cycle.push(names[next]);
                        return Some(cycle);
                    }
                }
                Color::White => {
                    if let Some(cycle) = dfs(next, names, adj, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        path.pop();
        colors[node] = Color::Black;
        None
    }

    let mut colors = vec![Color::White; names.len()];
    let mut path = Vec::new();
    for i in 0..names.len() {
        if colors[i] == Color::White {
            if let Some(cycle) = dfs(i, names, adj, &mut colors, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

/// Maps every declared token to its module. Class providers and components
/// belong to exactly one module. A basic token may be declared by several
/// modules; its entry only marks it basic, and values are looked up through
/// exports (see `ResolutionContext::basic_value`).
fn index_owners(ctx: &mut ResolutionContext) -> Result<(), FactoryError> {
    for (class, module) in &ctx.modules {
        for def in module.metadata().providers.values() {
            let token = def.token();
            let basic = matches!(def, ProviderDef::Basic(_));
            match ctx.provider_owner.get(&token).copied() {
                Some(first) if !basic || !first.basic => {
                    return Err(FactoryError::DuplicateDeclaration {
                        token,
                        first: first.module,
                        second: *class,
                    });
                }
                Some(_) => {}
                None => {
                    ctx.provider_owner.insert(token, ProviderOwner { module: *class, basic });
                }
            }
        }
        for b in module.basic_providers() {
            ctx.provider_owner
                .entry(b.provide.clone())
                .or_insert(ProviderOwner { module: *class, basic: true });
        }
        for component in &module.metadata().components {
            if let Some(first) = ctx.component_owner.insert(*component, *class) {
                return Err(FactoryError::DuplicateDeclaration {
                    token: Token::Class(*component),
                    first,
                    second: *class,
                });
            }
        }
    }
    Ok(())
}

/// Modules reachable from the root through linked imports, root first.
fn reachable_modules(ctx: &ResolutionContext) -> Result<Vec<Arc<ModuleInstance>>, FactoryError> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut stack = vec![ctx.require_module(ctx.root)?];
    while let Some(module) = stack.pop() {
        if !seen.insert(module.class()) {
            continue;
        }
        let mut imports = module.imported_module_instances();
        imports.reverse();
        stack.extend(imports);
        order.push(module);
    }
    Ok(order)
}

/* -------------------------------- providers ------------------------------ */

fn instantiate_module_providers(
    ctx: &mut ResolutionContext,
    module: &ModuleInstance,
) -> Result<(), FactoryError> {
    for def in module.metadata().providers.values() {
        if let ProviderDef::Class(class) = def {
            let mut stack = Vec::new();
            create_provider_instance(ctx, *class, &mut stack)?;
        }
    }
    Ok(())
}

/// Constructs a class provider after its dependencies, memoized per
/// context. `stack` holds the providers under construction.
fn create_provider_instance(
    ctx: &mut ResolutionContext,
    class: ClassId,
    stack: &mut Vec<ClassId>,
) -> Result<Instance, FactoryError> {
    if let Some(existing) = ctx.providers.get(&class) {
        return Ok(existing.clone());
    }
    if let Some(pos) = stack.iter().position(|c| *c == class) {
        let mut path = stack[pos..].to_vec();
        path.push(class);
        return Err(FactoryError::ProviderCycle { path });
    }

    let token = Token::Class(class);
    let owner = ctx
        .provider_owner
        .get(&token)
        .copied()
        .ok_or(FactoryError::ProviderNotFound { token })?;
    let owner = ctx.require_module(owner.module)?;
    let meta = ctx
        .registry
        .provider(class)
        .cloned()
        .ok_or(FactoryError::NotInjectable { class })?;

    stack.push(class);
    let mut positional = Vec::with_capacity(meta.dependencies.params().len());
    for dep in meta.dependencies.params() {
        let value = provider_dependency(ctx, class, &owner, dep, stack)?;
        positional.push((dep.clone(), value));
    }
    let mut properties = HashMap::new();
    for (key, dep) in meta.dependencies.properties() {
        let value = provider_dependency(ctx, class, &owner, dep, stack)?;
        properties.insert(*key, (dep.clone(), value));
    }
    stack.pop();

    let mut args = Args::new(class, positional, properties);
    let instance = (meta.construct)(&mut args)
        .map_err(|source| FactoryError::ProviderConstruction { provider: class, source })?;

    debug!(provider = %class, module = %owner.class(), "Provider instance created");
    ctx.providers.insert(class, instance.clone());
    Ok(instance)
}

fn provider_dependency(
    ctx: &mut ResolutionContext,
    provider: ClassId,
    owner: &ModuleInstance,
    dep: &Token,
    stack: &mut Vec<ClassId>,
) -> Result<Instance, FactoryError> {
    if dep.as_class() == Some(provider) {
        return Err(FactoryError::SelfDependency { provider });
    }
    let dep_owner = ctx
        .provider_owner
        .get(dep)
        .copied()
        .ok_or_else(|| FactoryError::ProviderNotFound { token: dep.clone() })?;
    if !owner.has_depended_provider_class(dep) {
        return Err(FactoryError::CannotInjectIntoProvider {
            dependency: dep.clone(),
            provider: Token::Class(provider),
            module: owner.class(),
        });
    }

    match (dep_owner.basic, dep.as_class()) {
        (false, Some(class)) => create_provider_instance(ctx, class, stack),
        _ => ctx
            .basic_value(owner, dep)
            .ok_or_else(|| FactoryError::ProviderNotReady {
                token: dep.clone(),
                requested_by: Token::Class(provider),
            }),
    }
}

/* ------------------------------- components ------------------------------ */

fn instantiate_module_components(
    ctx: &mut ResolutionContext,
    module: &ModuleInstance,
) -> Result<(), FactoryError> {
    for class in &module.metadata().components {
        if ctx.components.contains_key(class) {
            continue;
        }
        let meta = ctx
            .registry
            .component(*class)
            .cloned()
            .ok_or(FactoryError::NotAComponent { class: *class })?;
        let instance = Arc::new(ComponentInstance::new(meta, module.class()));
        debug!(component = %class, module = %module.class(), uuid = %instance.uuid(), "Component instance created");
        ctx.components_by_id.insert(instance.uuid(), *class);
        ctx.components.insert(*class, instance);
    }
    Ok(())
}

fn attach_interceptors(ctx: &ResolutionContext, instance: &ComponentInstance, deps: &DependencyMap) {
    let mut attached = Vec::new();
    for class in &instance.metadata().interceptors {
        let Some(Resolved::Provider(value)) = deps.get(&Token::Class(*class)) else {
            continue;
        };
        let cast = ctx.registry.provider(*class).and_then(|p| p.interceptor);
        match cast.and_then(|cast| cast(value.clone())) {
            Some(interceptor) => attached.push(interceptor),
            None => warn!(
                component = %instance.class(),
                interceptor = %class,
                "Provider is not registered as an interceptor, skipped"
            ),
        }
    }
    instance.set_interceptors(attached);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::class;

    struct A;
    struct B;
    struct C;

    #[test]
    fn cycle_path_closes_on_its_start() {
        let names = vec![class::<A>(), class::<B>(), class::<C>()];
        let adj = vec![vec![1], vec![2], vec![0]];
        let path = detect_cycle_with_path(&names, &adj).unwrap();
        assert_eq!(path, vec![class::<A>(), class::<B>(), class::<C>(), class::<A>()]);
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let names = vec![class::<A>(), class::<B>(), class::<C>()];
        let adj = vec![vec![1, 2], vec![2], vec![]];
        assert!(detect_cycle_with_path(&names, &adj).is_none());
    }
}
