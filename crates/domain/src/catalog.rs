//! Product availability collaborator.
//!
//! Checkout asks the catalog whether each product can be sold right now
//! and at what price. The shop's real catalog lives elsewhere; the
//! in-memory implementation backs tests and the standalone API.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::money::Money;

/// Product identifier (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Units on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "quantity", rename_all = "snake_case")]
pub enum Stock {
    /// Made to order; never runs out.
    Unlimited,
    Limited(u32),
}

impl Stock {
    pub fn covers(&self, quantity: u32) -> bool {
        match self {
            Stock::Unlimited => true,
            Stock::Limited(on_hand) => *on_hand >= quantity,
        }
    }
}

/// What checkout needs to know about products.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Whether the product is on sale at `at`. Unknown products are not.
    async fn is_available_now(&self, product_id: &ProductId, at: DateTime<Utc>) -> bool;

    async fn current_price(&self, product_id: &ProductId) -> Option<Money>;

    async fn stock_quantity(&self, product_id: &ProductId) -> Option<Stock>;

    async fn product_name(&self, product_id: &ProductId) -> Option<String>;
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: Stock,
    pub active: bool,
    /// Daily sale window, e.g. bread only until 14:00.
    pub available_from: Option<NaiveTime>,
    pub available_until: Option<NaiveTime>,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock: Stock::Unlimited,
            active: true,
            available_from: None,
            available_until: None,
        }
    }

    pub fn with_stock(mut self, stock: Stock) -> Self {
        self.stock = stock;
        self
    }

    pub fn with_window(mut self, from: NaiveTime, until: NaiveTime) -> Self {
        self.available_from = Some(from);
        self.available_until = Some(until);
        self
    }

    pub fn is_available_at(&self, at: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        let time = at.time();
        self.available_from.is_none_or(|from| time >= from)
            && self.available_until.is_none_or(|until| time < until)
    }
}

/// Catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, product: Product) {
        self.products.write().await.insert(product.id.clone(), product);
    }

    pub async fn set_stock(&self, product_id: &ProductId, stock: Stock) {
        if let Some(product) = self.products.write().await.get_mut(product_id) {
            product.stock = stock;
        }
    }

    pub async fn set_price(&self, product_id: &ProductId, price: Money) {
        if let Some(product) = self.products.write().await.get_mut(product_id) {
            product.price = price;
        }
    }

    pub async fn get(&self, product_id: &ProductId) -> Option<Product> {
        self.products.read().await.get(product_id).cloned()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn is_available_now(&self, product_id: &ProductId, at: DateTime<Utc>) -> bool {
        self.products
            .read()
            .await
            .get(product_id)
            .is_some_and(|p| p.is_available_at(at))
    }

    async fn current_price(&self, product_id: &ProductId) -> Option<Money> {
        self.products.read().await.get(product_id).map(|p| p.price)
    }

    async fn stock_quantity(&self, product_id: &ProductId) -> Option<Stock> {
        self.products.read().await.get(product_id).map(|p| p.stock)
    }

    async fn product_name(&self, product_id: &ProductId) -> Option<String> {
        self.products
            .read()
            .await
            .get(product_id)
            .map(|p| p.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stock_covers_quantity() {
        assert!(Stock::Unlimited.covers(1_000));
        assert!(Stock::Limited(3).covers(3));
        assert!(!Stock::Limited(2).covers(3));
    }

    #[tokio::test]
    async fn availability_respects_window_and_active_flag() {
        let catalog = InMemoryCatalog::new();
        let bread = Product::new("SKU-BREAD", "Sourdough", Money::from_cents(420)).with_window(
            NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        );
        catalog.insert(bread).await;
        let id = ProductId::new("SKU-BREAD");

        let morning = Utc.with_ymd_and_hms(2026, 1, 19, 9, 30, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2026, 1, 19, 18, 0, 0).unwrap();
        assert!(catalog.is_available_now(&id, morning).await);
        assert!(!catalog.is_available_now(&id, evening).await);
        assert!(!catalog.is_available_now(&ProductId::new("missing"), morning).await);
        assert_eq!(catalog.product_name(&id).await.as_deref(), Some("Sourdough"));
    }
}
