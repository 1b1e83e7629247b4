use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::metadata::DependencyList;
use crate::runtime::{ComponentInstance, ComponentValue};
use crate::token::{ClassId, Instance, Token};

/// A provider type the factory can construct.
///
/// `dependencies()` is the explicit replacement for constructor-parameter
/// reflection: it lists, in order, what `construct` expects to find in
/// [`Args`]. `#[derive(Injectable)]` generates both from the struct fields.
pub trait Injectable: Any + Send + Sync + Sized {
    fn dependencies() -> DependencyList;

    fn construct(args: &mut Args) -> anyhow::Result<Self>;
}

/// Cross-cutting hook attached to a component with `use_interceptors`.
///
/// Interceptors are resolved like any other dependency of the component and
/// run, in declaration order, before the component renders.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, component: &ComponentInstance) -> anyhow::Result<()>;
}

/// Presentation layer hook.
///
/// When installed on the factory, every component value passes through
/// `generate_component` before it is stored in its `ComponentInstance`.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn generate_component(
        &self,
        instance: &ComponentInstance,
        value: ComponentValue,
    ) -> anyhow::Result<ComponentValue>;
}

/// Resolved constructor arguments for one provider.
///
/// Positional values follow the provider's dependency list order; property
/// values are keyed by the name given at the injection site.
pub struct Args {
    owner: ClassId,
    positional: Vec<(Token, Instance)>,
    properties: HashMap<&'static str, (Token, Instance)>,
    cursor: usize,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("owner", &self.owner)
            .field(
                "positional",
                &self.positional.iter().map(|(t, _)| t).collect::<Vec<_>>(),
            )
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl Args {
    pub(crate) fn new(
        owner: ClassId,
        positional: Vec<(Token, Instance)>,
        properties: HashMap<&'static str, (Token, Instance)>,
    ) -> Self {
        Self {
            owner,
            positional,
            properties,
            cursor: 0,
        }
    }

    /// The provider being constructed.
    pub fn owner(&self) -> ClassId {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    /// Positional argument `index`, downcast to `T`.
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> anyhow::Result<Arc<T>> {
        let (token, value) = self.positional.get(index).ok_or_else(|| {
            anyhow::anyhow!(
                "{} has no constructor argument at index {} ({} resolved)",
                self.owner,
                index,
                self.positional.len()
            )
        })?;
        downcast(self.owner, token, value.clone())
    }

    /// Next positional argument, in declaration order.
    #[allow(clippy::should_implement_trait)]
    pub fn next<T: Any + Send + Sync>(&mut self) -> anyhow::Result<Arc<T>> {
        let value = self.get::<T>(self.cursor)?;
        self.cursor += 1;
        Ok(value)
    }

    /// Property-injected value registered under `key`.
    pub fn property<T: Any + Send + Sync>(&self, key: &str) -> anyhow::Result<Arc<T>> {
        let (token, value) = self.properties.get(key).ok_or_else(|| {
            anyhow::anyhow!("{} has no injected property '{}'", self.owner, key)
        })?;
        downcast(self.owner, token, value.clone())
    }

    /// Untyped access, for manifests registered with `injectable_with`.
    pub fn raw(&self, index: usize) -> Option<&Instance> {
        self.positional.get(index).map(|(_, v)| v)
    }
}

fn downcast<T: Any + Send + Sync>(
    owner: ClassId,
    token: &Token,
    value: Instance,
) -> anyhow::Result<Arc<T>> {
    value.downcast::<T>().map_err(|_| {
        anyhow::anyhow!(
            "dependency {} of {} is not a {}",
            token,
            owner,
            std::any::type_name::<T>()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::class;

    struct Owner;
    struct Dep(u32);

    fn args() -> Args {
        let mut props = HashMap::new();
        props.insert(
            "locale",
            (Token::from("locale"), Arc::new(String::from("en")) as Instance),
        );
        Args::new(
            class::<Owner>(),
            vec![
                (Token::of::<Dep>(), Arc::new(Dep(7)) as Instance),
                (Token::from("retries"), Arc::new(3u8) as Instance),
            ],
            props,
        )
    }

    #[test]
    fn positional_and_property_access() {
        let mut a = args();
        assert_eq!(a.len(), 2);
        assert_eq!(a.next::<Dep>().unwrap().0, 7);
        assert_eq!(*a.next::<u8>().unwrap(), 3);
        assert_eq!(a.property::<String>("locale").unwrap().as_str(), "en");
    }

    #[test]
    fn wrong_type_and_missing_index_are_errors() {
        let a = args();
        let err = a.get::<String>(0).unwrap_err().to_string();
        assert!(err.contains("Dep of Owner"), "{err}");
        assert!(a.get::<Dep>(5).is_err());
        assert!(a.property::<String>("missing").is_err());
    }
}
