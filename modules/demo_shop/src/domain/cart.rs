use std::sync::Arc;

use parking_lot::Mutex;
use viewkit::Injectable;

use super::CatalogService;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Unknown product: {0}")]
    UnknownProduct(u32),
    #[error("Quantity must be positive")]
    ZeroQuantity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: u32,
    pub quantity: u32,
}

/// Session cart; one instance per resolved application.
#[derive(Injectable)]
pub struct CartService {
    catalog: Arc<CatalogService>,
    #[inject(skip)]
    lines: Mutex<Vec<CartLine>>,
}

impl CartService {
    pub fn add(&self, product_id: u32, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }
        if self.catalog.get(product_id).is_none() {
            return Err(CartError::UnknownProduct(product_id));
        }

        let mut lines = self.lines.lock();
        match lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity += quantity,
            None => lines.push(CartLine {
                product_id,
                quantity,
            }),
        }
        tracing::debug!(product_id, quantity, "Added to cart");
        Ok(())
    }

    pub fn lines(&self) -> Vec<CartLine> {
        self.lines.lock().clone()
    }

    pub fn total_cents(&self) -> u64 {
        self.lines
            .lock()
            .iter()
            .filter_map(|l| {
                self.catalog
                    .get(l.product_id)
                    .map(|p| p.price_cents * u64::from(l.quantity))
            })
            .sum()
    }

    /// `"3 items, 57.50 EUR"`
    pub fn summary(&self) -> String {
        let count: u32 = self.lines.lock().iter().map(|l| l.quantity).sum();
        format!(
            "{count} items, {}",
            self.catalog.formatter().format(self.total_cents())
        )
    }
}
