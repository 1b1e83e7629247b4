use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use viewkit::{component, ComponentFactory, ComponentInstance, Injectable, Interceptor, Renderable};

use crate::domain::{CartService, CatalogService, PriceFormatter};
use crate::platform::Markup;

/// Counts and logs component renders.
#[derive(Injectable)]
#[injectable(interceptor)]
pub struct AccessLog {
    #[inject(skip)]
    hits: AtomicUsize,
}

impl AccessLog {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Interceptor for AccessLog {
    async fn intercept(&self, component: &ComponentInstance) -> anyhow::Result<()> {
        let hit = self.hits.fetch_add(1, Ordering::SeqCst) + 1;
        info!(component = component.name(), uuid = %component.uuid(), hit, "Component accessed");
        Ok(())
    }
}

#[component(
    factory = ComponentFactory::value(Markup::new("<shop-shell/>")),
    declarations = [CartService, "store.name"],
    styles = ["shell.css"],
    interceptors = [AccessLog]
)]
pub struct ShopShell;

#[component(
    factory = ComponentFactory::value(Markup::new("<product-list/>")),
    declarations = [CatalogService, PriceFormatter]
)]
pub struct ProductListPage;

async fn load_product_details() -> anyhow::Result<Renderable> {
    Ok(Arc::new(Markup::new("<product-details/>")))
}

#[component(
    factory = ComponentFactory::new(load_product_details),
    lazy,
    declarations = [CatalogService]
)]
pub struct ProductDetailsPage;

#[component(
    factory = ComponentFactory::value(Markup::new("<cart/>")),
    declarations = [CartService, ProductListPage, "currency"],
    interceptors = [AccessLog]
)]
pub struct CartPage;
