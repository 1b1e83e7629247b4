//! Per-`create` resolution state and the dependency maps derived from it.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::RwLock;
use uuid::Uuid;

use super::module_instance::GlobalModules;
use super::{ComponentInstance, ComponentValue, FactoryError, ModuleInstance};
use crate::registry::MetadataRegistry;
use crate::token::{ClassId, Instance, Token};

/// Which module declares a provider token, and how.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ProviderOwner {
    pub module: ClassId,
    pub basic: bool,
}

/// Everything one `create` call resolves.
///
/// A fresh context is built per call and handed to the factory once the
/// call succeeds; nothing leaks between applications.
pub struct ResolutionContext {
    pub(crate) registry: Arc<MetadataRegistry>,
    pub(crate) root: ClassId,
    /// Creation order, which is depth-first preorder over the imports.
    pub(crate) modules: IndexMap<ClassId, Arc<ModuleInstance>>,
    pub(crate) globals: GlobalModules,
    /// Import edges per module, recorded before they are linked.
    pub(crate) edges: IndexMap<ClassId, Vec<ClassId>>,
    pub(crate) provider_owner: HashMap<Token, ProviderOwner>,
    pub(crate) component_owner: HashMap<ClassId, ClassId>,
    pub(crate) providers: HashMap<ClassId, Instance>,
    pub(crate) components: IndexMap<ClassId, Arc<ComponentInstance>>,
    pub(crate) components_by_id: HashMap<Uuid, ClassId>,
}

impl std::fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("root", &self.root)
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("providers", &self.providers.len())
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ResolutionContext {
    pub(crate) fn new(registry: Arc<MetadataRegistry>, root: ClassId) -> Self {
        Self {
            registry,
            root,
            modules: IndexMap::new(),
            globals: Arc::new(RwLock::new(Vec::new())),
            edges: IndexMap::new(),
            provider_owner: HashMap::new(),
            component_owner: HashMap::new(),
            providers: HashMap::new(),
            components: IndexMap::new(),
            components_by_id: HashMap::new(),
        }
    }

    pub fn root(&self) -> ClassId {
        self.root
    }

    pub fn module_instances(&self) -> &IndexMap<ClassId, Arc<ModuleInstance>> {
        &self.modules
    }

    pub fn component_instances(&self) -> &IndexMap<ClassId, Arc<ComponentInstance>> {
        &self.components
    }

    pub fn provider_instance(&self, class: ClassId) -> Option<&Instance> {
        self.providers.get(&class)
    }

    pub fn module_instance(&self, class: ClassId) -> Option<&Arc<ModuleInstance>> {
        self.modules.get(&class)
    }

    pub(crate) fn require_module(&self, class: ClassId) -> Result<Arc<ModuleInstance>, FactoryError> {
        self.modules
            .get(&class)
            .cloned()
            .ok_or(FactoryError::NotAModule { class })
    }

    /// Value of a basic provider as seen from `from`.
    ///
    /// The module's own declaration wins. Otherwise the value comes from the
    /// first direct import, then global module, that exports the token,
    /// following re-exports down to the declaring module. Modules that
    /// declare the token without exporting it are never consulted.
    pub(crate) fn basic_value(&self, from: &ModuleInstance, token: &Token) -> Option<Instance> {
        if from.declares_basic(token) {
            return from.value_provider_item(token);
        }
        let mut seen = HashSet::from([from.class()]);
        from.exporters_of(token)
            .iter()
            .find_map(|m| declaring_module(m, token, &mut seen))?
            .value_provider_item(token)
    }

    /// One `inject` entry of a `use_factory` provider declared in `module`.
    pub(crate) fn value_factory_argument(
        &self,
        module: &ModuleInstance,
        provide: &Token,
        token: &Token,
    ) -> Result<Instance, FactoryError> {
        if !module.has_depended_provider_class(token) {
            return Err(FactoryError::CannotInjectIntoProvider {
                dependency: token.clone(),
                provider: provide.clone(),
                module: module.class(),
            });
        }
        let not_ready = || FactoryError::ProviderNotReady {
            token: token.clone(),
            requested_by: provide.clone(),
        };

        if let Some(component) = token.as_class().and_then(|c| self.components.get(&c)) {
            let value = component.component().ok_or_else(not_ready)?;
            return Ok(Arc::new(value) as Instance);
        }

        match self.provider_owner.get(token) {
            Some(owner) if owner.basic => self.basic_value(module, token).ok_or_else(not_ready),
            Some(_) => token
                .as_class()
                .and_then(|c| self.providers.get(&c).cloned())
                .ok_or_else(not_ready),
            None => Err(FactoryError::ProviderNotFound {
                token: token.clone(),
            }),
        }
    }

    /// Resolves one entry of a component's dependency map.
    ///
    /// `Ok(None)` means the entry is a basic provider whose value is still
    /// pending and `allow_pending` was set.
    pub(crate) fn component_dependency(
        &self,
        instance: &ComponentInstance,
        owner: &ModuleInstance,
        token: &Token,
        allow_pending: bool,
    ) -> Result<Option<Resolved>, FactoryError> {
        if let Some(class) = token.as_class() {
            if let Some(dep) = self.components.get(&class) {
                return Ok(Some(Resolved::Component(dep.component())));
            }
        }

        if !owner.has_depended_provider_class(token) {
            return Err(FactoryError::CannotInjectIntoComponent {
                dependency: token.clone(),
                component: instance.class(),
                module: owner.class(),
            });
        }

        let missing = || FactoryError::ProviderInstanceMissing {
            dependency: token.clone(),
            component: instance.class(),
        };
        match self.provider_owner.get(token) {
            Some(p) if p.basic => match self.basic_value(owner, token) {
                Some(v) => Ok(Some(Resolved::Provider(v))),
                None if allow_pending => Ok(None),
                None => Err(FactoryError::ProviderNotReady {
                    token: token.clone(),
                    requested_by: Token::Class(instance.class()),
                }),
            },
            Some(_) => token
                .as_class()
                .and_then(|c| self.providers.get(&c).cloned())
                .map(|v| Some(Resolved::Provider(v)))
                .ok_or_else(missing),
            None => Err(missing()),
        }
    }

    /// Builds the dependency map of one component: its declarations, then
    /// any interceptor class not already declared. Interceptors that cannot
    /// be resolved are left out instead of failing.
    pub(crate) fn dependency_map(
        &self,
        instance: &ComponentInstance,
        allow_pending: bool,
    ) -> Result<DependencyMap, FactoryError> {
        let meta = instance.metadata();
        let owner = self.require_module(instance.module_class())?;

        let mut map = IndexMap::new();
        for token in meta.dependencies.tokens() {
            if let Some(resolved) =
                self.component_dependency(instance, &owner, token, allow_pending)?
            {
                map.insert(token.clone(), resolved);
            }
        }

        for class in &meta.interceptors {
            let token = Token::Class(*class);
            if map.contains_key(&token) {
                continue;
            }
            match self.component_dependency(instance, &owner, &token, allow_pending) {
                Ok(Some(resolved)) => {
                    map.insert(token, resolved);
                }
                Ok(None) => {}
                Err(e) => tracing::debug!(
                    component = %instance.class(),
                    interceptor = %class,
                    error = %e,
                    "Interceptor not resolvable, skipped"
                ),
            }
        }

        Ok(DependencyMap(Arc::new(map)))
    }

    /// Finds a component by instance, id string or class.
    pub(crate) fn lookup(&self, lookup: ComponentLookup<'_>) -> Result<Arc<ComponentInstance>, FactoryError> {
        let class = match lookup {
            ComponentLookup::Instance(c) => c.class(),
            ComponentLookup::Class(c) => c,
            ComponentLookup::Id(id) => Uuid::parse_str(id)
                .ok()
                .and_then(|uuid| self.components_by_id.get(&uuid).copied())
                .ok_or_else(|| FactoryError::UnknownComponent(id.to_string()))?,
        };
        self.components
            .get(&class)
            .cloned()
            .ok_or_else(|| FactoryError::UnknownComponent(class.name().to_string()))
    }
}

/// Walks exports from `module` to the module that declares `token`.
fn declaring_module(
    module: &Arc<ModuleInstance>,
    token: &Token,
    seen: &mut HashSet<ClassId>,
) -> Option<Arc<ModuleInstance>> {
    if !seen.insert(module.class()) {
        return None;
    }
    if module.declares_basic(token) {
        return Some(module.clone());
    }
    module
        .exporters_of(token)
        .iter()
        .find_map(|m| declaring_module(m, token, seen))
}

/// Key accepted by [`Factory::generate_dependency_map`](super::Factory::generate_dependency_map).
#[derive(Clone, Copy, Debug)]
pub enum ComponentLookup<'a> {
    Instance(&'a ComponentInstance),
    /// The component's uuid, as a string.
    Id(&'a str),
    Class(ClassId),
}

impl<'a> From<&'a ComponentInstance> for ComponentLookup<'a> {
    fn from(c: &'a ComponentInstance) -> Self {
        ComponentLookup::Instance(c)
    }
}

impl<'a> From<&'a Arc<ComponentInstance>> for ComponentLookup<'a> {
    fn from(c: &'a Arc<ComponentInstance>) -> Self {
        ComponentLookup::Instance(c.as_ref())
    }
}

impl<'a> From<&'a str> for ComponentLookup<'a> {
    fn from(id: &'a str) -> Self {
        ComponentLookup::Id(id)
    }
}

impl From<ClassId> for ComponentLookup<'_> {
    fn from(c: ClassId) -> Self {
        ComponentLookup::Class(c)
    }
}

/// One resolved entry of a dependency map.
#[derive(Clone)]
pub enum Resolved {
    Provider(Instance),
    /// A component dependency. `None` while its factory has not run yet.
    Component(Option<ComponentValue>),
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolved::Provider(_) => f.write_str("Provider"),
            Resolved::Component(v) => f.debug_tuple("Component").field(v).finish(),
        }
    }
}

/// Immutable token → value map handed to the rendering layer.
#[derive(Clone, Debug, Default)]
pub struct DependencyMap(Arc<IndexMap<Token, Resolved>>);

impl DependencyMap {
    pub fn get(&self, token: &Token) -> Option<&Resolved> {
        self.0.get(token)
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.0.contains_key(token)
    }

    /// Typed provider instance registered under its own type.
    pub fn provider<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.typed(&Token::of::<T>())
    }

    /// Typed value registered under a string token.
    pub fn named<T: Any + Send + Sync>(&self, name: &'static str) -> Option<Arc<T>> {
        self.typed(&Token::from(name))
    }

    pub fn component<C: Any>(&self) -> Option<ComponentValue> {
        match self.0.get(&Token::of::<C>())? {
            Resolved::Component(v) => v.clone(),
            Resolved::Provider(_) => None,
        }
    }

    fn typed<T: Any + Send + Sync>(&self, token: &Token) -> Option<Arc<T>> {
        match self.0.get(token)? {
            Resolved::Provider(v) => v.clone().downcast::<T>().ok(),
            Resolved::Component(_) => None,
        }
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Awaits `fut`, bounded by `timeout` when one is configured.
pub(crate) async fn bounded<T, W, F>(
    timeout: Option<Duration>,
    what: W,
    fut: F,
) -> Result<T, FactoryError>
where
    W: FnOnce() -> String,
    F: Future<Output = T>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| FactoryError::Timeout {
                what: what(),
                timeout: limit,
            }),
        None => Ok(fut.await),
    }
}
