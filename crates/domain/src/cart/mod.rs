//! Cart aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod value_objects;

pub use aggregate::Cart;
pub use commands::*;
pub use events::{
    CartClearedData, CartCreatedData, CartEvent, DeliveryPreferenceSetData, DiscountSetData,
    ExpiredItemsDiscardedData, ItemAddedData, ItemQuantityChangedData, ItemRemovedData,
    ItemUpdatedData, PaymentPreferenceSetData,
};
pub use service::CartService;
pub use value_objects::{
    CartItem, CartTotals, Customization, DeliveryPreference, DeliveryType, PaymentMethod,
    PaymentPreference,
};

use thiserror::Error;

use crate::catalog::ProductId;
use crate::error::ErrorKind;
use crate::location::LocationError;

/// Errors that can occur during cart operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CartError {
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: i32 },

    #[error("Quantity {quantity} of {product_id} exceeds the per-item limit of {max}")]
    ItemQuantityLimit {
        product_id: ProductId,
        quantity: u32,
        max: u32,
    },

    #[error("Cart would hold {units} units, over the limit of {max}")]
    CartUnitLimit { units: u32, max: u32 },

    #[error("{field} must not be negative")]
    NegativeAmount { field: &'static str },

    #[error("Item not found in cart: {product_id}")]
    ItemNotFound { product_id: ProductId },

    #[error("Delivery orders need a delivery address")]
    AddressRequired,

    #[error("Invalid delivery address: {0}")]
    InvalidAddress(#[from] LocationError),

    #[error("Cart is empty")]
    Empty,
}

impl CartError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CartError::ItemNotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Validation,
        }
    }
}
