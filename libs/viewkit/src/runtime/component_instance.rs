//! Component Instance - a component's metadata plus its lazily produced renderable

use std::any::Any;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::contracts::Interceptor;
use crate::metadata::ComponentMeta;
use crate::token::ClassId;

/// Framework-native value produced by a component factory.
pub type Renderable = Arc<dyn Any + Send + Sync>;

/// Error of a lazy component factory, shared by every waiter.
pub type SharedError = Arc<anyhow::Error>;

pub type LazyRenderable = Shared<BoxFuture<'static, Result<Renderable, SharedError>>>;

/// What a component slot holds once populated.
#[derive(Clone)]
pub enum ComponentValue {
    /// The factory already ran to completion.
    Ready(Renderable),
    /// `lazy` components keep the pending factory for the rendering layer
    /// to suspend on.
    Lazy(LazyRenderable),
}

impl ComponentValue {
    pub fn ready<T: Any + Send + Sync>(value: T) -> Self {
        ComponentValue::Ready(Arc::new(value))
    }

    pub(crate) fn lazy(fut: BoxFuture<'static, anyhow::Result<Renderable>>) -> Self {
        ComponentValue::Lazy(fut.map(|r| r.map_err(Arc::new)).boxed().shared())
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, ComponentValue::Lazy(_))
    }

    pub fn as_ready(&self) -> Option<&Renderable> {
        match self {
            ComponentValue::Ready(r) => Some(r),
            ComponentValue::Lazy(_) => None,
        }
    }

    /// Typed view of a ready value.
    pub fn downcast_ready<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.as_ready()?.clone().downcast::<T>().ok()
    }

    /// Waits for lazy values; ready values return immediately.
    pub async fn resolve(&self) -> Result<Renderable, SharedError> {
        match self {
            ComponentValue::Ready(r) => Ok(r.clone()),
            ComponentValue::Lazy(fut) => fut.clone().await,
        }
    }
}

impl std::fmt::Debug for ComponentValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentValue::Ready(_) => f.write_str("Ready"),
            ComponentValue::Lazy(_) => f.write_str("Lazy"),
        }
    }
}

/// Runtime wrapper of one reachable component.
pub struct ComponentInstance {
    meta: Arc<ComponentMeta>,
    module: ClassId,
    component: RwLock<Option<ComponentValue>>,
    interceptors: RwLock<Vec<Arc<dyn Interceptor>>>,
}

impl std::fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("class", &self.meta.class)
            .field("module", &self.module)
            .field("uuid", &self.meta.uuid)
            .field("component", &*self.component.read())
            .field("interceptors", &self.interceptors.read().len())
            .finish()
    }
}

impl ComponentInstance {
    pub(crate) fn new(meta: Arc<ComponentMeta>, module: ClassId) -> Self {
        Self {
            meta,
            module,
            component: RwLock::new(None),
            interceptors: RwLock::new(Vec::new()),
        }
    }

    pub fn class(&self) -> ClassId {
        self.meta.class
    }

    pub fn name(&self) -> &'static str {
        self.meta.class.name()
    }

    pub fn uuid(&self) -> Uuid {
        self.meta.uuid
    }

    pub fn metadata(&self) -> &Arc<ComponentMeta> {
        &self.meta
    }

    /// The module that declares this component.
    pub fn module_class(&self) -> ClassId {
        self.module
    }

    pub fn set_component(&self, value: ComponentValue) {
        *self.component.write() = Some(value);
    }

    /// Current renderable; `None` until the factory has populated it.
    pub fn component(&self) -> Option<ComponentValue> {
        self.component.read().clone()
    }

    pub fn has_component(&self) -> bool {
        self.component.read().is_some()
    }

    pub(crate) fn set_interceptors(&self, interceptors: Vec<Arc<dyn Interceptor>>) {
        *self.interceptors.write() = interceptors;
    }

    pub fn interceptors(&self) -> Vec<Arc<dyn Interceptor>> {
        self.interceptors.read().clone()
    }

    /// Runs every attached interceptor in order; the first failure stops the
    /// chain.
    pub async fn intercept(&self) -> anyhow::Result<()> {
        for interceptor in self.interceptors() {
            interceptor.intercept(self).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ComponentFactory, ComponentOptions};
    use crate::token::class;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Card;
    struct Owner;

    fn instance() -> ComponentInstance {
        let meta = ComponentMeta::from_options(
            class::<Card>(),
            ComponentOptions::new(ComponentFactory::value("card")),
        );
        ComponentInstance::new(Arc::new(meta), class::<Owner>())
    }

    #[test]
    fn slot_is_empty_until_set() {
        let c = instance();
        assert!(c.component().is_none());
        assert!(!c.has_component());

        c.set_component(ComponentValue::ready("card"));
        let value = c.component().unwrap();
        assert_eq!(*value.downcast_ready::<&str>().unwrap(), "card");
        assert_eq!(c.module_class(), class::<Owner>());
        assert_eq!(c.name(), "Card");
    }

    #[tokio::test]
    async fn lazy_value_resolves_once_for_all_waiters() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let value = ComponentValue::lazy(
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(42u32) as Renderable)
            }
            .boxed(),
        );
        assert!(value.is_lazy());
        assert!(value.as_ready().is_none());

        let a = value.resolve().await.unwrap();
        let b = value.clone().resolve().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct Recorder(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl Interceptor for Recorder {
        async fn intercept(&self, _c: &ComponentInstance) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Deny;

    #[async_trait::async_trait]
    impl Interceptor for Deny {
        async fn intercept(&self, c: &ComponentInstance) -> anyhow::Result<()> {
            anyhow::bail!("{} is not allowed", c.name())
        }
    }

    #[tokio::test]
    async fn interceptors_run_in_order_and_stop_on_error() {
        let hits = Arc::new(AtomicUsize::new(0));
        let c = instance();
        c.set_interceptors(vec![
            Arc::new(Recorder(hits.clone())),
            Arc::new(Deny),
            Arc::new(Recorder(hits.clone())),
        ]);

        let err = c.intercept().await.unwrap_err();
        assert_eq!(err.to_string(), "Card is not allowed");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
