use std::sync::Arc;

use viewkit::Injectable;

/// Formats minor-unit amounts in the store currency.
#[derive(Injectable)]
pub struct PriceFormatter {
    #[inject(property = "currency")]
    currency: Arc<String>,
}

impl PriceFormatter {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: Arc::new(currency.into()),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn format(&self, cents: u64) -> String {
        format!("{}.{:02} {}", cents / 100, cents % 100, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minor_units() {
        let f = PriceFormatter::new("EUR");
        assert_eq!(f.format(1250), "12.50 EUR");
        assert_eq!(f.format(5), "0.05 EUR");
        assert_eq!(f.currency(), "EUR");
    }
}
