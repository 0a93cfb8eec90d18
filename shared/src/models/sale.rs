//! Sale Record Model

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Issuing company identity printed in the ticket header
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyInfo {
    /// Stable identifier, used as the logo cache key
    pub id: String,
    #[serde(default)]
    pub legal_name: String,
    /// Tax identification number (RUT)
    #[serde(default)]
    pub tax_id: String,
    #[serde(default)]
    pub address: String,
    /// Logo image reference (file path)
    pub logo: Option<String>,
}

/// One sold line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: u32,
    pub unit_price: i64,
    pub subtotal: i64,
}

impl LineItem {
    /// Create a line whose subtotal is `quantity * unit_price`
    pub fn new(description: impl Into<String>, quantity: u32, unit_price: i64) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            subtotal: unit_price * quantity as i64,
        }
    }
}

/// Completed sale, the input of a single ticket build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRecord {
    pub company: CompanyInfo,
    /// Receipt number (folio)
    pub receipt_id: String,
    pub issued_at: NaiveDateTime,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub total: i64,
    /// Signed tax document (XML) carrying the TED stamp
    #[serde(default)]
    pub document: Option<String>,
}

impl SaleRecord {
    /// Sum of line subtotals
    pub fn items_total(&self) -> i64 {
        self.items.iter().map(|i| i.subtotal).sum()
    }

    pub fn has_logo(&self) -> bool {
        self.company.logo.as_deref().is_some_and(|l| !l.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_item_subtotal() {
        let item = LineItem::new("Widget", 3, 1500);
        assert_eq!(item.subtotal, 4500);
    }

    #[test]
    fn test_sale_deserialize_defaults() {
        let json = r#"{
            "company": {"id": "acme", "legal_name": "ACME"},
            "receipt_id": "77",
            "issued_at": "2026-10-16T12:30:00",
            "total": 0
        }"#;
        let sale: SaleRecord = serde_json::from_str(json).unwrap();
        assert!(sale.items.is_empty());
        assert!(sale.document.is_none());
        assert!(!sale.has_logo());
        assert_eq!(sale.items_total(), 0);
    }
}
