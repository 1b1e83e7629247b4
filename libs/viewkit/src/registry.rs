// viewkit/src/registry.rs
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::contracts::{Args, Injectable, Interceptor};
use crate::metadata::{
    cast_interceptor, ComponentMeta, ComponentOptions, DependencyList, InjectSite, ModuleMeta,
    ModuleOptions, ProviderMeta,
};
use crate::token::{ClassId, Instance, Token};

/// Everything known about one registered type.
#[derive(Debug, Clone)]
pub enum Metadata {
    Module(Arc<ModuleMeta>),
    Provider(Arc<ProviderMeta>),
    Component(Arc<ComponentMeta>),
}

impl Metadata {
    fn kind(&self) -> &'static str {
        match self {
            Metadata::Module(_) => "module",
            Metadata::Provider(_) => "injectable",
            Metadata::Component(_) => "component",
        }
    }
}

/// The function type submitted by the macros via `inventory::submit!`.
pub struct Registrator(pub fn(&mut RegistryBuilder));

inventory::collect!(Registrator);

/// Immutable class → metadata store the factory resolves against.
#[derive(Default)]
pub struct MetadataRegistry {
    classes: HashMap<ClassId, Metadata>,
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = |kind: &str| self.classes.values().filter(|m| m.kind() == kind).count();
        f.debug_struct("MetadataRegistry")
            .field("modules", &count("module"))
            .field("providers", &count("injectable"))
            .field("components", &count("component"))
            .finish()
    }
}

impl MetadataRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Discover via inventory, have registrators fill the builder, then build.
    pub fn discover() -> Result<Self, RegistryError> {
        let mut b = RegistryBuilder::default();
        for r in ::inventory::iter::<Registrator> {
            r.0(&mut b);
        }
        b.build()
    }

    pub fn get(&self, class: ClassId) -> Option<&Metadata> {
        self.classes.get(&class)
    }

    pub fn module(&self, class: ClassId) -> Option<&Arc<ModuleMeta>> {
        match self.classes.get(&class) {
            Some(Metadata::Module(m)) => Some(m),
            _ => None,
        }
    }

    pub fn provider(&self, class: ClassId) -> Option<&Arc<ProviderMeta>> {
        match self.classes.get(&class) {
            Some(Metadata::Provider(p)) => Some(p),
            _ => None,
        }
    }

    pub fn component(&self, class: ClassId) -> Option<&Arc<ComponentMeta>> {
        match self.classes.get(&class) {
            Some(Metadata::Component(c)) => Some(c),
            _ => None,
        }
    }

    /// The dependency list of a provider or a component: both kinds share
    /// this one lookup path.
    pub fn dependencies(&self, class: ClassId) -> Option<&DependencyList> {
        match self.classes.get(&class)? {
            Metadata::Provider(p) => Some(&p.dependencies),
            Metadata::Component(c) => Some(&c.dependencies),
            Metadata::Module(_) => None,
        }
    }

    pub fn is_component(&self, class: ClassId) -> bool {
        matches!(self.classes.get(&class), Some(Metadata::Component(_)))
    }

    /// Quick lookup of a module by its short type name, e.g. `AppModule`.
    pub fn module_by_name(&self, name: &str) -> Option<ClassId> {
        let mut matches = self.classes.iter().filter_map(|(c, m)| match m {
            Metadata::Module(_) if c.name() == name || c.type_name() == name => Some(*c),
            _ => None,
        });
        matches.next()
    }

    pub fn modules(&self) -> impl Iterator<Item = &Arc<ModuleMeta>> {
        self.classes.values().filter_map(|m| match m {
            Metadata::Module(m) => Some(m),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Pending registration of a class, before the decorators that only
/// annotate (`global`, `inject`, `use_interceptors`) are folded in.
enum Pending {
    Module(ModuleMeta),
    Provider(ProviderMeta),
    Component(ComponentMeta),
}

impl Pending {
    fn kind(&self) -> &'static str {
        match self {
            Pending::Module(_) => "module",
            Pending::Provider(_) => "injectable",
            Pending::Component(_) => "component",
        }
    }
}

/// Builder that registrators feed; one call per decorator per class.
/// Uniqueness is enforced at build time.
#[derive(Default)]
pub struct RegistryBuilder {
    classes: HashMap<ClassId, Pending>,
    globals: Vec<ClassId>,
    injections: Vec<(ClassId, InjectSite, Token)>,
    interceptors: Vec<(ClassId, Vec<ClassId>)>,
    errors: Vec<String>,
}

impl RegistryBuilder {
    fn insert(&mut self, class: ClassId, pending: Pending) {
        if let Some(existing) = self.classes.get(&class) {
            self.errors.push(format!(
                "'{}' is already registered as {} (attempted {})",
                class.type_name(),
                existing.kind(),
                pending.kind()
            ));
            return;
        }
        self.classes.insert(class, pending);
    }

    pub fn module<M: Any>(&mut self, opts: ModuleOptions) -> &mut Self {
        self.module_with(ClassId::of::<M>(), opts)
    }

    pub fn module_with(&mut self, class: ClassId, opts: ModuleOptions) -> &mut Self {
        self.insert(class, Pending::Module(ModuleMeta::normalize(class, opts)));
        self
    }

    pub fn injectable<P: Injectable>(&mut self) -> &mut Self {
        self.insert(ClassId::of::<P>(), Pending::Provider(ProviderMeta::of::<P>()));
        self
    }

    /// Registers a provider from an explicit manifest instead of the
    /// [`Injectable`] trait.
    pub fn injectable_with<F>(
        &mut self,
        class: ClassId,
        dependencies: DependencyList,
        construct: F,
    ) -> &mut Self
    where
        F: Fn(&mut Args) -> anyhow::Result<Instance> + Send + Sync + 'static,
    {
        let meta = ProviderMeta {
            class,
            dependencies,
            construct: Arc::new(construct),
            interceptor: None,
        };
        self.insert(class, Pending::Provider(meta));
        self
    }

    /// Registers an injectable that can also be attached to components with
    /// [`use_interceptors`](Self::use_interceptors).
    pub fn interceptor<I: Injectable + Interceptor>(&mut self) -> &mut Self {
        let mut meta = ProviderMeta::of::<I>();
        meta.interceptor = Some(cast_interceptor::<I>);
        self.insert(ClassId::of::<I>(), Pending::Provider(meta));
        self
    }

    pub fn component<C: Any>(&mut self, opts: ComponentOptions) -> &mut Self {
        self.component_with(ClassId::of::<C>(), opts)
    }

    pub fn component_with(&mut self, class: ClassId, opts: ComponentOptions) -> &mut Self {
        self.insert(
            class,
            Pending::Component(ComponentMeta::from_options(class, opts)),
        );
        self
    }

    /// Explicit token for a constructor parameter or a keyed property.
    pub fn inject<P: Any>(&mut self, site: InjectSite, token: impl Into<Token>) -> &mut Self {
        self.injections
            .push((ClassId::of::<P>(), site, token.into()));
        self
    }

    pub fn global<M: Any>(&mut self) -> &mut Self {
        self.globals.push(ClassId::of::<M>());
        self
    }

    pub fn use_interceptors<C: Any>(
        &mut self,
        interceptors: impl IntoIterator<Item = ClassId>,
    ) -> &mut Self {
        self.interceptors
            .push((ClassId::of::<C>(), interceptors.into_iter().collect()));
        self
    }

    /// Fold the annotating decorators into their targets and freeze.
    ///
    /// Annotations whose target was never registered under a matching kind
    /// are dropped: the factory reports the missing registration when (and
    /// if) it reaches that class.
    pub fn build(mut self) -> Result<MetadataRegistry, RegistryError> {
        for class in std::mem::take(&mut self.globals) {
            match self.classes.get_mut(&class) {
                Some(Pending::Module(m)) => m.global = true,
                _ => tracing::debug!(class = %class, "global() on a non-module class ignored"),
            }
        }

        for (class, site, token) in std::mem::take(&mut self.injections) {
            let target = match self.classes.get_mut(&class) {
                Some(Pending::Provider(p)) => &mut p.dependencies,
                Some(Pending::Component(c)) => &mut c.dependencies,
                _ => {
                    tracing::debug!(class = %class, "inject() on an unregistered class ignored");
                    continue;
                }
            };
            if let Err(e) = target.apply(site, token) {
                self.errors.push(format!("{}: {e}", class.type_name()));
            }
        }

        for (class, list) in std::mem::take(&mut self.interceptors) {
            match self.classes.get_mut(&class) {
                Some(Pending::Component(c)) => {
                    for i in list {
                        if !c.interceptors.contains(&i) {
                            c.interceptors.push(i);
                        }
                    }
                }
                _ => tracing::debug!(
                    class = %class,
                    "use_interceptors() on a non-component class ignored"
                ),
            }
        }

        if !self.errors.is_empty() {
            return Err(RegistryError::InvalidRegistryConfiguration {
                errors: self.errors,
            });
        }

        let classes = self
            .classes
            .into_iter()
            .map(|(class, pending)| {
                let meta = match pending {
                    Pending::Module(m) => Metadata::Module(Arc::new(m)),
                    Pending::Provider(p) => Metadata::Provider(Arc::new(p)),
                    Pending::Component(c) => Metadata::Component(Arc::new(c)),
                };
                (class, meta)
            })
            .collect::<HashMap<_, _>>();

        tracing::debug!(classes = classes.len(), "Metadata registry built");

        Ok(MetadataRegistry { classes })
    }
}

/// Structured errors for the metadata registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid registry configuration:\n{errors:#?}")]
    InvalidRegistryConfiguration { errors: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ComponentFactory;
    use crate::token::class;

    /* --------------------------- Test helpers ------------------------- */
    struct Svc;
    impl Injectable for Svc {
        fn dependencies() -> DependencyList {
            DependencyList::new()
        }
        fn construct(_args: &mut Args) -> anyhow::Result<Self> {
            Ok(Svc)
        }
    }

    struct Uses;
    impl Injectable for Uses {
        fn dependencies() -> DependencyList {
            DependencyList::new().param(class::<Svc>())
        }
        fn construct(args: &mut Args) -> anyhow::Result<Self> {
            args.next::<Svc>()?;
            Ok(Uses)
        }
    }

    struct Guard;
    #[async_trait::async_trait]
    impl Interceptor for Guard {
        async fn intercept(&self, _c: &crate::runtime::ComponentInstance) -> anyhow::Result<()> {
            Ok(())
        }
    }
    impl Injectable for Guard {
        fn dependencies() -> DependencyList {
            DependencyList::new()
        }
        fn construct(_args: &mut Args) -> anyhow::Result<Self> {
            Ok(Guard)
        }
    }

    struct View;
    struct Shell;

    /* ------------------------------- Tests ---------------------------- */

    #[test]
    fn providers_and_components_share_the_dependency_lookup() {
        let mut b = MetadataRegistry::builder();
        b.injectable::<Svc>().injectable::<Uses>().component::<View>(
            ComponentOptions::new(ComponentFactory::value("view")).declarations([class::<Svc>()]),
        );
        let reg = b.build().unwrap();

        assert_eq!(
            reg.dependencies(class::<Uses>()).unwrap().params(),
            &[Token::of::<Svc>()]
        );
        assert_eq!(
            reg.dependencies(class::<View>()).unwrap().params(),
            &[Token::of::<Svc>()]
        );
        assert!(reg.dependencies(class::<Svc>()).unwrap().is_empty());
        assert!(reg.dependencies(class::<Shell>()).is_none());
    }

    #[test]
    fn annotations_fold_into_targets() {
        let mut b = MetadataRegistry::builder();
        b.module::<Shell>(ModuleOptions::new())
            .global::<Shell>()
            .injectable::<Uses>()
            .inject::<Uses>(InjectSite::Param(0), "svc-token")
            .inject::<Uses>(InjectSite::Property("locale"), "locale")
            .interceptor::<Guard>()
            .component::<View>(ComponentOptions::new(ComponentFactory::value("view")))
            .use_interceptors::<View>([class::<Guard>(), class::<Guard>()]);
        let reg = b.build().unwrap();

        assert!(reg.module(class::<Shell>()).unwrap().global);
        let deps = reg.dependencies(class::<Uses>()).unwrap();
        assert_eq!(deps.params(), &[Token::from("svc-token")]);
        assert_eq!(deps.properties(), &[("locale", Token::from("locale"))]);
        assert!(reg.provider(class::<Guard>()).unwrap().is_interceptor());
        assert_eq!(
            reg.component(class::<View>()).unwrap().interceptors,
            vec![class::<Guard>()]
        );
    }

    #[test]
    fn duplicate_registration_reported_in_configuration_errors() {
        let mut b = MetadataRegistry::builder();
        b.injectable::<Svc>();
        b.module_with(class::<Svc>(), ModuleOptions::new());

        let err = b.build().unwrap_err();
        match err {
            RegistryError::InvalidRegistryConfiguration { errors } => {
                assert!(
                    errors.iter().any(|e| e.contains("already registered")),
                    "expected duplicate registration error, got {errors:?}"
                );
            }
        }
    }

    #[test]
    fn annotations_on_unknown_classes_are_permissive() {
        let mut b = MetadataRegistry::builder();
        b.global::<Svc>()
            .inject::<Shell>(InjectSite::Param(0), "x")
            .use_interceptors::<Shell>([class::<Guard>()]);
        let reg = b.build().unwrap();
        assert!(reg.is_empty());
    }

    #[test]
    fn module_lookup_by_name() {
        let mut b = MetadataRegistry::builder();
        b.module::<Shell>(ModuleOptions::new());
        let reg = b.build().unwrap();
        assert_eq!(reg.module_by_name("Shell"), Some(class::<Shell>()));
        assert_eq!(reg.module_by_name("View"), None);
    }
}
