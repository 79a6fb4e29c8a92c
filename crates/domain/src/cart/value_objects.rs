//! Value objects for the cart domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ProductId;
use crate::location::Address;
use crate::money::Money;
use crate::settings::Settings;

/// A chosen product option, e.g. "Filling: pistachio (+0.50)".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customization {
    pub name: String,
    pub option: String,
    pub cost: Money,
}

impl Customization {
    pub fn new(name: impl Into<String>, option: impl Into<String>, cost: Money) -> Self {
        Self {
            name: name.into(),
            option: option.into(),
            cost,
        }
    }
}

/// A cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    #[serde(default)]
    pub customizations: Vec<Customization>,
    pub special_instructions: Option<String>,
}

impl CartItem {
    pub fn customization_cost(&self) -> Money {
        self.customizations.iter().map(|c| c.cost).sum()
    }

    /// `quantity × unit price + customization cost`, unrounded.
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity) + self.customization_cost()
    }
}

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    Delivery,
    #[default]
    Pickup,
    #[serde(alias = "dine-in")]
    DineIn,
}

impl DeliveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::Delivery => "delivery",
            DeliveryType::Pickup => "pickup",
            DeliveryType::DineIn => "dine_in",
        }
    }
}

impl std::fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeliveryPreference {
    #[serde(rename = "type")]
    pub delivery_type: DeliveryType,
    pub address: Option<Address>,
    pub instructions: Option<String>,
    pub preferred_time: Option<DateTime<Utc>>,
}

impl DeliveryPreference {
    pub fn pickup() -> Self {
        Self::default()
    }

    pub fn delivery_to(address: Address) -> Self {
        Self {
            delivery_type: DeliveryType::Delivery,
            address: Some(address),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Card,
    Cash,
    MobilePayment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentPreference {
    pub method: PaymentMethod,
    pub loyalty_points_used: u64,
}

/// Derived cart amounts, all unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub tax: Money,
    pub discount: Money,
    pub loyalty_discount: Money,
    pub total: Money,
}

impl CartTotals {
    /// `total = max(0, subtotal + deliveryFee + tax − discount − loyaltyDiscount)`.
    pub fn compute(
        items: &[CartItem],
        delivery_type: DeliveryType,
        discount: Money,
        loyalty_points_used: u64,
        settings: &Settings,
    ) -> Self {
        let subtotal: Money = items.iter().map(CartItem::line_total).sum();
        let delivery_fee = match delivery_type {
            DeliveryType::Delivery => settings.delivery_fee,
            DeliveryType::Pickup | DeliveryType::DineIn => Money::ZERO,
        };
        let tax = subtotal.apply_rate(settings.tax_rate);
        let loyalty_discount = settings.points_value(loyalty_points_used);
        let total = (subtotal + delivery_fee + tax - discount - loyalty_discount).non_negative();

        Self {
            subtotal,
            delivery_fee,
            tax,
            discount,
            loyalty_discount,
            total,
        }
    }
}
