//! Declarative metadata attached to modules, providers and components.
//!
//! The `*Options` types are what users (or the macros) hand to the
//! [`RegistryBuilder`](crate::registry::RegistryBuilder); the `*Meta` types
//! are the normalized records the factory reads back by [`ClassId`].

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use indexmap::{IndexMap, IndexSet};
use uuid::Uuid;

use crate::contracts::{Args, Injectable, Interceptor};
use crate::router::RouteOptions;
use crate::runtime::Renderable;
use crate::token::{ClassId, Instance, Token};

// ============================ dependency lists ============================

/// Where an explicitly injected token is delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectSite {
    /// Constructor argument at this position.
    Param(usize),
    /// Keyed property, read with [`Args::property`].
    Property(&'static str),
}

/// What a provider's constructor or a component's `declarations` depend on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyList {
    params: Vec<Token>,
    properties: Vec<(&'static str, Token)>,
}

impl DependencyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, token: impl Into<Token>) -> Self {
        self.params.push(token.into());
        self
    }

    pub fn property(mut self, key: &'static str, token: impl Into<Token>) -> Self {
        self.set_property(key, token.into());
        self
    }

    pub fn params(&self) -> &[Token] {
        &self.params
    }

    pub fn properties(&self) -> &[(&'static str, Token)] {
        &self.properties
    }

    /// Every token, positional ones first, in declared order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.params
            .iter()
            .chain(self.properties.iter().map(|(_, t)| t))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.properties.is_empty()
    }

    pub(crate) fn apply(&mut self, site: InjectSite, token: Token) -> Result<(), String> {
        match site {
            InjectSite::Param(i) if i < self.params.len() => {
                self.params[i] = token;
                Ok(())
            }
            InjectSite::Param(i) if i == self.params.len() => {
                self.params.push(token);
                Ok(())
            }
            InjectSite::Param(i) => Err(format!(
                "inject index {i} leaves a gap after {} declared parameters",
                self.params.len()
            )),
            InjectSite::Property(key) => {
                self.set_property(key, token);
                Ok(())
            }
        }
    }

    fn set_property(&mut self, key: &'static str, token: Token) {
        if let Some(slot) = self.properties.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = token;
        } else {
            self.properties.push((key, token));
        }
    }
}

impl<T: Into<Token>> FromIterator<T> for DependencyList {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().map(Into::into).collect(),
            properties: Vec::new(),
        }
    }
}

// ============================ basic providers ============================

type ValueFactoryFn =
    dyn Fn(Vec<Instance>) -> BoxFuture<'static, anyhow::Result<Instance>> + Send + Sync;

/// Async factory of a `use_factory` basic provider.
///
/// Receives its `inject` values positionally. Component tokens arrive as
/// `Arc<ComponentValue>`.
#[derive(Clone)]
pub struct ValueFactory(Arc<ValueFactoryFn>);

impl ValueFactory {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Instance>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Instance>> + Send + 'static,
    {
        Self(Arc::new(move |args| f(args).boxed()))
    }

    pub(crate) fn call(&self, args: Vec<Instance>) -> BoxFuture<'static, anyhow::Result<Instance>> {
        (self.0)(args)
    }
}

#[derive(Clone)]
pub enum BasicProviderKind {
    UseValue(Instance),
    UseFactory {
        inject: Vec<Token>,
        factory: ValueFactory,
    },
}

/// A provider that is a value or a factory rather than a constructible type.
#[derive(Clone)]
pub struct BasicProvider {
    pub provide: Token,
    pub kind: BasicProviderKind,
}

impl BasicProvider {
    pub fn value<T: Any + Send + Sync>(provide: impl Into<Token>, value: T) -> Self {
        Self {
            provide: provide.into(),
            kind: BasicProviderKind::UseValue(Arc::new(value)),
        }
    }

    pub fn factory<F, Fut>(
        provide: impl Into<Token>,
        inject: impl IntoIterator<Item = Token>,
        f: F,
    ) -> Self
    where
        F: Fn(Vec<Instance>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Instance>> + Send + 'static,
    {
        Self {
            provide: provide.into(),
            kind: BasicProviderKind::UseFactory {
                inject: inject.into_iter().collect(),
                factory: ValueFactory::new(f),
            },
        }
    }

    pub fn is_factory(&self) -> bool {
        matches!(self.kind, BasicProviderKind::UseFactory { .. })
    }
}

impl fmt::Debug for BasicProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            BasicProviderKind::UseValue(_) => "use_value",
            BasicProviderKind::UseFactory { .. } => "use_factory",
        };
        f.debug_struct("BasicProvider")
            .field("provide", &self.provide)
            .field("kind", &kind)
            .finish()
    }
}

/// One entry of a module's `providers`.
#[derive(Clone, Debug)]
pub enum ProviderDef {
    Class(ClassId),
    Basic(BasicProvider),
}

impl ProviderDef {
    pub fn token(&self) -> Token {
        match self {
            ProviderDef::Class(c) => Token::Class(*c),
            ProviderDef::Basic(b) => b.provide.clone(),
        }
    }
}

impl From<ClassId> for ProviderDef {
    fn from(c: ClassId) -> Self {
        ProviderDef::Class(c)
    }
}

impl From<BasicProvider> for ProviderDef {
    fn from(b: BasicProvider) -> Self {
        ProviderDef::Basic(b)
    }
}

// ============================ module references ============================

type ModuleLoaderFn = dyn Fn() -> BoxFuture<'static, anyhow::Result<ClassId>> + Send + Sync;

/// A module whose class is only known after an async load.
#[derive(Clone)]
pub struct DeferredModule(Arc<ModuleLoaderFn>);

impl DeferredModule {
    pub(crate) fn load(&self) -> BoxFuture<'static, anyhow::Result<ClassId>> {
        (self.0)()
    }
}

/// One entry of a module's `imports`.
#[derive(Clone)]
pub enum ModuleRef {
    Class(ClassId),
    Deferred(DeferredModule),
    Value(BasicProvider),
}

impl ModuleRef {
    pub fn of<M: Any>() -> Self {
        ModuleRef::Class(ClassId::of::<M>())
    }

    pub fn deferred<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ClassId>> + Send + 'static,
    {
        ModuleRef::Deferred(DeferredModule(Arc::new(move || loader().boxed())))
    }
}

impl From<ClassId> for ModuleRef {
    fn from(c: ClassId) -> Self {
        ModuleRef::Class(c)
    }
}

impl From<BasicProvider> for ModuleRef {
    fn from(b: BasicProvider) -> Self {
        ModuleRef::Value(b)
    }
}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleRef::Class(c) => write!(f, "Class({c})"),
            ModuleRef::Deferred(_) => f.write_str("Deferred"),
            ModuleRef::Value(b) => write!(f, "Value({})", b.provide),
        }
    }
}

// ============================ module ============================

/// Arguments of the `module` decorator.
#[derive(Clone, Debug, Default)]
pub struct ModuleOptions {
    pub imports: Vec<ModuleRef>,
    pub providers: Vec<ProviderDef>,
    pub components: Vec<ClassId>,
    pub exports: Vec<Token>,
    pub routes: Vec<RouteOptions>,
}

impl ModuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import(mut self, m: impl Into<ModuleRef>) -> Self {
        self.imports.push(m.into());
        self
    }

    pub fn imports<I: IntoIterator<Item = ClassId>>(mut self, ms: I) -> Self {
        self.imports.extend(ms.into_iter().map(ModuleRef::Class));
        self
    }

    pub fn provider(mut self, p: impl Into<ProviderDef>) -> Self {
        self.providers.push(p.into());
        self
    }

    pub fn providers<I: IntoIterator<Item = ClassId>>(mut self, ps: I) -> Self {
        self.providers.extend(ps.into_iter().map(ProviderDef::Class));
        self
    }

    pub fn component(mut self, c: ClassId) -> Self {
        self.components.push(c);
        self
    }

    pub fn components<I: IntoIterator<Item = ClassId>>(mut self, cs: I) -> Self {
        self.components.extend(cs);
        self
    }

    pub fn export(mut self, t: impl Into<Token>) -> Self {
        self.exports.push(t.into());
        self
    }

    pub fn exports<I, T>(mut self, ts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Token>,
    {
        self.exports.extend(ts.into_iter().map(Into::into));
        self
    }

    pub fn routes<I: IntoIterator<Item = RouteOptions>>(mut self, rs: I) -> Self {
        self.routes.extend(rs);
        self
    }
}

/// Normalized module record.
#[derive(Debug)]
pub struct ModuleMeta {
    pub class: ClassId,
    pub imports: Vec<ModuleRef>,
    pub providers: IndexMap<Token, ProviderDef>,
    pub components: IndexSet<ClassId>,
    pub exports: IndexSet<Token>,
    pub routes: Vec<RouteOptions>,
    pub global: bool,
}

impl ModuleMeta {
    /// Deduplicates every list while keeping first-seen order. Deferred
    /// imports cannot be compared and are all kept.
    pub(crate) fn normalize(class: ClassId, opts: ModuleOptions) -> Self {
        let mut seen_classes = IndexSet::new();
        let mut seen_values = IndexSet::new();
        let imports = opts
            .imports
            .into_iter()
            .filter(|m| match m {
                ModuleRef::Class(c) => seen_classes.insert(*c),
                ModuleRef::Value(b) => seen_values.insert(b.provide.clone()),
                ModuleRef::Deferred(_) => true,
            })
            .collect();

        let mut providers = IndexMap::new();
        for p in opts.providers {
            providers.entry(p.token()).or_insert(p);
        }

        Self {
            class,
            imports,
            providers,
            components: opts.components.into_iter().collect(),
            exports: opts.exports.into_iter().collect(),
            routes: opts.routes,
            global: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.class.name()
    }
}

// ============================ providers ============================

pub type Constructor = Arc<dyn Fn(&mut Args) -> anyhow::Result<Instance> + Send + Sync>;

pub(crate) type InterceptorCaster = fn(Instance) -> Option<Arc<dyn Interceptor>>;

/// Normalized provider record.
pub struct ProviderMeta {
    pub class: ClassId,
    pub dependencies: DependencyList,
    pub(crate) construct: Constructor,
    pub(crate) interceptor: Option<InterceptorCaster>,
}

impl ProviderMeta {
    pub(crate) fn of<P: Injectable>() -> Self {
        Self {
            class: ClassId::of::<P>(),
            dependencies: P::dependencies(),
            construct: Arc::new(|args| Ok(Arc::new(P::construct(args)?) as Instance)),
            interceptor: None,
        }
    }

    pub fn is_interceptor(&self) -> bool {
        self.interceptor.is_some()
    }
}

impl fmt::Debug for ProviderMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderMeta")
            .field("class", &self.class)
            .field("dependencies", &self.dependencies)
            .field("is_interceptor", &self.interceptor.is_some())
            .finish()
    }
}

pub(crate) fn cast_interceptor<I: Interceptor>(value: Instance) -> Option<Arc<dyn Interceptor>> {
    value
        .downcast::<I>()
        .ok()
        .map(|i| i as Arc<dyn Interceptor>)
}

// ============================ components ============================

type ComponentFactoryFn = dyn Fn() -> BoxFuture<'static, anyhow::Result<Renderable>> + Send + Sync;

/// Produces a component's framework-native renderable.
#[derive(Clone)]
pub struct ComponentFactory(Arc<ComponentFactoryFn>);

impl ComponentFactory {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Renderable>> + Send + 'static,
    {
        Self(Arc::new(move || f().boxed()))
    }

    /// Factory resolving immediately to a fixed value.
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        let value: Renderable = Arc::new(value);
        Self::new(move || {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    pub(crate) fn call(&self) -> BoxFuture<'static, anyhow::Result<Renderable>> {
        (self.0)()
    }
}

impl fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComponentFactory")
    }
}

/// Arguments of the `component` decorator.
#[derive(Clone, Debug)]
pub struct ComponentOptions {
    pub factory: ComponentFactory,
    pub declarations: Vec<Token>,
    pub lazy: bool,
    pub styles: Vec<String>,
    pub suspense_fallback: Option<Renderable>,
    pub boundary_component: Option<Renderable>,
    pub element_props: IndexMap<String, String>,
}

impl ComponentOptions {
    pub fn new(factory: ComponentFactory) -> Self {
        Self {
            factory,
            declarations: Vec::new(),
            lazy: false,
            styles: Vec::new(),
            suspense_fallback: None,
            boundary_component: None,
            element_props: IndexMap::new(),
        }
    }

    pub fn declarations<I, T>(mut self, ds: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Token>,
    {
        self.declarations.extend(ds.into_iter().map(Into::into));
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn styles<I, S>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.styles.extend(styles.into_iter().map(Into::into));
        self
    }

    pub fn suspense_fallback<T: Any + Send + Sync>(mut self, fallback: T) -> Self {
        self.suspense_fallback = Some(Arc::new(fallback));
        self
    }

    pub fn boundary_component<T: Any + Send + Sync>(mut self, boundary: T) -> Self {
        self.boundary_component = Some(Arc::new(boundary));
        self
    }

    pub fn element_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.element_props.insert(key.into(), value.into());
        self
    }
}

/// Normalized component record.
pub struct ComponentMeta {
    pub class: ClassId,
    pub dependencies: DependencyList,
    pub factory: ComponentFactory,
    pub lazy: bool,
    pub styles: Vec<String>,
    pub suspense_fallback: Option<Renderable>,
    pub boundary_component: Option<Renderable>,
    pub element_props: IndexMap<String, String>,
    pub interceptors: Vec<ClassId>,
    pub uuid: Uuid,
}

impl ComponentMeta {
    pub(crate) fn from_options(class: ClassId, opts: ComponentOptions) -> Self {
        Self {
            class,
            dependencies: opts.declarations.into_iter().collect(),
            factory: opts.factory,
            lazy: opts.lazy,
            styles: opts.styles,
            suspense_fallback: opts.suspense_fallback,
            boundary_component: opts.boundary_component,
            element_props: opts.element_props,
            interceptors: Vec::new(),
            uuid: Uuid::new_v4(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.class.name()
    }
}

impl fmt::Debug for ComponentMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMeta")
            .field("class", &self.class)
            .field("dependencies", &self.dependencies)
            .field("lazy", &self.lazy)
            .field("styles", &self.styles)
            .field("interceptors", &self.interceptors)
            .field("uuid", &self.uuid)
            .finish_non_exhaustive()
    }
}
