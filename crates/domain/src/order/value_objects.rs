//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use common::Actor;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::cart::{CartItem, Customization, DeliveryType, PaymentMethod};
use crate::catalog::ProductId;
use crate::loyalty::Benefits;
use crate::money::Money;
use crate::settings::Settings;

use super::OrderStatus;

/// A purchased line, frozen at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    /// Catalog price at the time of purchase.
    pub unit_price: Money,
    pub customizations: Vec<Customization>,
    /// Summed customization cost, charged once per line.
    pub customization_cost: Money,
    pub special_instructions: Option<String>,
    /// `quantity × unit price + customization cost`, rounded to cents.
    pub total_price: Money,
}

impl OrderLine {
    /// Snapshots a cart line at `unit_price`.
    pub fn from_cart_item(item: &CartItem, product_name: String, unit_price: Money) -> Self {
        let customization_cost = item.customization_cost();
        Self {
            product_id: item.product_id.clone(),
            product_name,
            quantity: item.quantity,
            unit_price,
            customizations: item.customizations.clone(),
            customization_cost,
            special_instructions: item.special_instructions.clone(),
            total_price: (unit_price.times(item.quantity) + customization_cost).rounded(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Charged amounts of an order, all rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderPricing {
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub tax: Money,
    /// Cart discount plus the tier discount.
    pub discount: Money,
    pub loyalty_discount: Money,
    pub final_amount: Money,
    pub points_earned: u64,
}

impl OrderPricing {
    /// Prices a checkout.
    ///
    /// Points are earned on the amount before tier benefits. Free delivery
    /// then waives the fee, and the tier discount is taken off what remains,
    /// so a waived fee is never discounted.
    pub fn compute(
        lines: &[OrderLine],
        delivery_type: DeliveryType,
        cart_discount: Money,
        loyalty_points_used: u64,
        benefits: Benefits,
        settings: &Settings,
    ) -> Self {
        let subtotal: Money = lines.iter().map(|line| line.total_price).sum();
        let mut delivery_fee = match delivery_type {
            DeliveryType::Delivery => settings.delivery_fee.rounded(),
            DeliveryType::Pickup | DeliveryType::DineIn => Money::ZERO,
        };
        let tax = subtotal.apply_rate(settings.tax_rate).rounded();
        let mut discount = cart_discount.rounded();
        let loyalty_discount = settings.points_value(loyalty_points_used).rounded();

        let before_benefits = final_amount(subtotal, delivery_fee, tax, discount, loyalty_discount);
        let points_earned = (before_benefits.amount() * settings.points_per_currency_unit)
            .floor()
            .to_u64()
            .unwrap_or(0);

        if benefits.free_delivery {
            delivery_fee = Money::ZERO;
        }
        let discounted = final_amount(subtotal, delivery_fee, tax, discount, loyalty_discount);
        discount += discounted.apply_rate(benefits.discount_rate()).rounded();

        Self {
            subtotal,
            delivery_fee,
            tax,
            discount,
            loyalty_discount,
            final_amount: final_amount(subtotal, delivery_fee, tax, discount, loyalty_discount),
            points_earned,
        }
    }

    /// Re-derives the final amount with `extra` discount added.
    pub fn with_extra_discount(self, extra: Money) -> Self {
        let discount = self.discount + extra.rounded();
        Self {
            discount,
            final_amount: final_amount(
                self.subtotal,
                self.delivery_fee,
                self.tax,
                discount,
                self.loyalty_discount,
            ),
            ..self
        }
    }
}

/// `max(0, subtotal + deliveryFee + tax − discount − loyaltyDiscount)`.
pub fn final_amount(
    subtotal: Money,
    delivery_fee: Money,
    tax: Money,
    discount: Money,
    loyalty_discount: Money,
) -> Money {
    (subtotal + delivery_fee + tax - discount - loyalty_discount).non_negative()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(flatten)]
    pub pricing: OrderPricing,
}

/// Points moved by an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoyaltyPoints {
    /// Credited once the order is delivered.
    pub earned: u64,
    /// Debited at checkout.
    pub used: u64,
}

/// One entry of an order's status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub note: String,
    pub actor: Actor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loyalty::Tier;

    fn line(price_cents: i64, quantity: u32, customization_cents: i64) -> OrderLine {
        let mut item = CartItem {
            product_id: ProductId::new("p"),
            product_name: "P".into(),
            quantity,
            unit_price: Money::from_cents(price_cents),
            customizations: vec![],
            special_instructions: None,
        };
        if customization_cents > 0 {
            item.customizations.push(Customization::new(
                "extra",
                "yes",
                Money::from_cents(customization_cents),
            ));
        }
        OrderLine::from_cart_item(&item, "P".into(), Money::from_cents(price_cents))
    }

    #[test]
    fn pickup_order_without_benefits() {
        let lines = [line(350, 2, 0), line(0, 1, 50)];
        let pricing = OrderPricing::compute(
            &lines,
            DeliveryType::Pickup,
            Money::ZERO,
            0,
            Benefits::default(),
            &Settings::default(),
        );

        assert_eq!(pricing.subtotal, Money::from_cents(750));
        assert_eq!(pricing.tax, Money::from_cents(173));
        assert_eq!(pricing.final_amount, Money::from_cents(923));
        assert_eq!(pricing.points_earned, 9);
    }

    #[test]
    fn silver_member_gets_free_delivery_and_discount() {
        let lines = [line(1000, 2, 0)];
        let pricing = OrderPricing::compute(
            &lines,
            DeliveryType::Delivery,
            Money::ZERO,
            100,
            Tier::Silver.benefits(),
            &Settings::default(),
        );

        // 20.00 + 2.50 + 4.60 - 1.00 = 26.10 before benefits
        assert_eq!(pricing.points_earned, 26);
        assert_eq!(pricing.delivery_fee, Money::ZERO);
        assert_eq!(pricing.loyalty_discount, Money::from_units(1));
        // 5% of 23.60, the fee already waived
        assert_eq!(pricing.discount, Money::from_cents(118));
        assert_eq!(pricing.final_amount, Money::from_cents(2000 + 460 - 118 - 100));
    }

    #[test]
    fn waived_fee_is_not_discounted_again() {
        let lines = [line(1000, 1, 0)];
        let settings = Settings::default();
        let delivered = OrderPricing::compute(
            &lines,
            DeliveryType::Delivery,
            Money::ZERO,
            0,
            Tier::Silver.benefits(),
            &settings,
        );
        let picked_up = OrderPricing::compute(
            &lines,
            DeliveryType::Pickup,
            Money::ZERO,
            0,
            Tier::Silver.benefits(),
            &settings,
        );

        assert_eq!(delivered.discount, picked_up.discount);
        assert_eq!(delivered.final_amount, picked_up.final_amount);
        assert!(delivered.points_earned > picked_up.points_earned);
    }

    #[test]
    fn final_amount_never_negative() {
        let pricing = OrderPricing::compute(
            &[line(100, 1, 0)],
            DeliveryType::Pickup,
            Money::from_units(50),
            0,
            Benefits::default(),
            &Settings::default(),
        );
        assert_eq!(pricing.final_amount, Money::ZERO);
        assert_eq!(pricing.points_earned, 0);
    }

    #[test]
    fn extra_discount_rederives_final() {
        let pricing = OrderPricing::compute(
            &[line(1000, 1, 0)],
            DeliveryType::Pickup,
            Money::ZERO,
            0,
            Benefits::default(),
            &Settings::default(),
        );
        let adjusted = pricing.with_extra_discount(Money::from_units(2));
        assert_eq!(adjusted.discount, Money::from_units(2));
        assert_eq!(adjusted.final_amount, Money::from_cents(1230 - 200));
        assert_eq!(adjusted.points_earned, pricing.points_earned);
    }
}
