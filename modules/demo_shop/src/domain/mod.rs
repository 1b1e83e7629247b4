pub mod cart;
pub mod catalog;
pub mod pricing;

pub use cart::{CartError, CartService};
pub use catalog::{CatalogService, Product};
pub use pricing::PriceFormatter;
