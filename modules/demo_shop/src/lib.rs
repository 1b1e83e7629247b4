// === MODULE DEFINITION ===
// Module, component and provider types registered through inventory
pub mod components;
pub mod module;
pub mod platform;

pub use components::{AccessLog, CartPage, ProductDetailsPage, ProductListPage, ShopShell};
pub use module::{AppModule, CatalogModule, CoreModule, CURRENCY, STORE_NAME};
pub use platform::{Markup, MarkupPlatform};

#[doc(hidden)]
pub mod domain;
