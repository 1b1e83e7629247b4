use std::sync::Arc;

use tracing::debug;
use viewkit::registry::{Registrator, RegistryBuilder};
use viewkit::{class, module, BasicProvider, Instance, ModuleOptions, RouteOptions, Token};

use crate::components::{AccessLog, CartPage, ProductDetailsPage, ProductListPage, ShopShell};
use crate::domain::{CartService, CatalogService, PriceFormatter};

/// Store-wide values and formatting, visible to every module (global).
///
/// Registered by hand because its value and factory providers have no
/// attribute form.
pub struct CoreModule;

pub const CURRENCY: &str = "currency";
pub const STORE_NAME: &str = "store.name";

fn register_core(b: &mut RegistryBuilder) {
    b.module::<CoreModule>(
        ModuleOptions::new()
            .provider(BasicProvider::value(CURRENCY, String::from("EUR")))
            .provider(BasicProvider::factory(
                STORE_NAME,
                [Token::from(CURRENCY)],
                |args: Vec<Instance>| async move {
                    let currency = args
                        .first()
                        .cloned()
                        .and_then(|v| v.downcast::<String>().ok())
                        .ok_or_else(|| anyhow::anyhow!("currency is not a String"))?;
                    debug!(%currency, "Generating store name");
                    Ok(Arc::new(format!("Demo Shop ({currency})")) as Instance)
                },
            ))
            .provider(class::<PriceFormatter>())
            .export(class::<PriceFormatter>())
            .export(CURRENCY)
            .export(STORE_NAME),
    )
    .global::<CoreModule>();
}

viewkit::inventory::submit! {
    Registrator(register_core)
}

/// Product browsing: list and (lazily loaded) details pages.
#[module(
    imports = [CoreModule],
    providers = [CatalogService],
    components = [ProductListPage, ProductDetailsPage],
    exports = [CatalogService, ProductListPage],
    routes = [
        RouteOptions::component::<ProductListPage>("/"),
        RouteOptions::component::<ProductDetailsPage>("/:id"),
    ]
)]
pub struct CatalogModule;

/// Application root: the shell, the cart and the catalog mounted under
/// `/products`.
#[module(
    imports = [CatalogModule],
    providers = [CartService, AccessLog],
    components = [ShopShell, CartPage],
    exports = [ShopShell],
    routes = [
        RouteOptions::component::<ShopShell>("/")
            .children([RouteOptions::component::<CartPage>("cart")]),
        RouteOptions::module::<CatalogModule>("/products"),
    ]
)]
pub struct AppModule;
