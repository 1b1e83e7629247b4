use std::sync::Arc;

use viewkit::Injectable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub price_cents: u64,
}

/// Fixed product list the demo ships with.
#[derive(Debug, Clone)]
pub struct Stock(Vec<Product>);

impl Default for Stock {
    fn default() -> Self {
        let product = |id, name: &str, price_cents| Product {
            id,
            name: name.to_string(),
            price_cents,
        };
        Self(vec![
            product(1, "Espresso cup", 900),
            product(2, "Pour-over kettle", 4_450),
            product(3, "Burr grinder", 12_900),
        ])
    }
}

#[derive(Injectable)]
pub struct CatalogService {
    formatter: Arc<super::PriceFormatter>,
    #[inject(skip)]
    stock: Stock,
}

impl CatalogService {
    pub fn products(&self) -> &[Product] {
        &self.stock.0
    }

    pub fn get(&self, id: u32) -> Option<&Product> {
        self.stock.0.iter().find(|p| p.id == id)
    }

    /// `"Burr grinder - 129.00 EUR"`
    pub fn label(&self, id: u32) -> Option<String> {
        self.get(id)
            .map(|p| format!("{} - {}", p.name, self.formatter.format(p.price_cents)))
    }

    pub fn formatter(&self) -> &Arc<super::PriceFormatter> {
        &self.formatter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceFormatter;

    fn catalog() -> CatalogService {
        CatalogService {
            formatter: Arc::new(PriceFormatter::new("USD")),
            stock: Stock::default(),
        }
    }

    #[test]
    fn lookup_and_label() {
        let c = catalog();
        assert_eq!(c.products().len(), 3);
        assert_eq!(c.get(2).map(|p| p.name.as_str()), Some("Pour-over kettle"));
        assert_eq!(c.label(3).as_deref(), Some("Burr grinder - 129.00 USD"));
        assert!(c.label(42).is_none());
    }
}
