//! The caller's cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::cart::{
    AddCartItem, CartTotals, ClearCart, Customization, DeliveryPreference, PaymentMethod,
    RemoveCartItem, SetCartDiscount, SetDeliveryPreference, SetPaymentPreference,
    UpdateCartItemQuantity,
};
use domain::{Cart, Money};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::parse_user_id;
use crate::error::Result;
use crate::identity::Identity;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CartResponse {
    pub cart: Cart,
    pub totals: CartTotals,
}

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Money,
    #[serde(default)]
    pub customizations: Vec<Customization>,
    pub special_instructions: Option<String>,
}

#[derive(Deserialize)]
pub struct QuantityRequest {
    pub quantity: i32,
}

#[derive(Deserialize)]
pub struct PaymentRequest {
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub loyalty_points_used: u64,
}

#[derive(Deserialize)]
pub struct DiscountRequest {
    pub amount: Money,
}

fn respond<S: EventStore + Clone + 'static>(state: &AppState<S>, cart: Cart) -> Json<CartResponse> {
    let totals = state.fulfillment.carts().totals(&cart);
    Json(CartResponse { cart, totals })
}

/// GET /cart
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<CartResponse>> {
    let cart = state.fulfillment.carts().get_cart(identity.user_id).await?;
    Ok(respond(&state, cart))
}

/// POST /cart/items
#[tracing::instrument(skip(state, req), fields(user_id = %identity.user_id))]
pub async fn add_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartResponse>> {
    let mut cmd = AddCartItem::new(
        identity.user_id,
        req.product_id,
        req.product_name,
        req.quantity,
        req.unit_price,
    );
    for customization in req.customizations {
        cmd = cmd.with_customization(customization);
    }
    if let Some(instructions) = req.special_instructions {
        cmd = cmd.with_instructions(instructions);
    }
    let result = state.fulfillment.carts().add_item(cmd).await?;
    Ok(respond(&state, result.aggregate))
}

/// PATCH /cart/items/{product_id}
pub async fn update_quantity<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(product_id): Path<String>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<CartResponse>> {
    let cmd = UpdateCartItemQuantity::new(identity.user_id, product_id, req.quantity);
    let result = state.fulfillment.carts().update_item_quantity(cmd).await?;
    Ok(respond(&state, result.aggregate))
}

/// DELETE /cart/items/{product_id}
pub async fn remove_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(product_id): Path<String>,
) -> Result<Json<CartResponse>> {
    let cmd = RemoveCartItem::new(identity.user_id, product_id);
    let result = state.fulfillment.carts().remove_item(cmd).await?;
    Ok(respond(&state, result.aggregate))
}

/// PUT /cart/delivery
pub async fn set_delivery<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(delivery): Json<DeliveryPreference>,
) -> Result<Json<CartResponse>> {
    let cmd = SetDeliveryPreference {
        user_id: identity.user_id,
        delivery,
    };
    let result = state.fulfillment.carts().set_delivery(cmd).await?;
    Ok(respond(&state, result.aggregate))
}

/// PUT /cart/payment
pub async fn set_payment<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<CartResponse>> {
    let cmd = SetPaymentPreference {
        user_id: identity.user_id,
        method: req.method,
        loyalty_points_used: req.loyalty_points_used,
    };
    let result = state.fulfillment.carts().set_payment(cmd).await?;
    Ok(respond(&state, result.aggregate))
}

/// PUT /carts/{user_id}/discount, staff only.
pub async fn set_discount<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(user_id): Path<String>,
    Json(req): Json<DiscountRequest>,
) -> Result<Json<CartResponse>> {
    identity.require_staff()?;
    let cmd = SetCartDiscount {
        user_id: parse_user_id(&user_id)?,
        amount: req.amount,
    };
    let result = state.fulfillment.carts().set_discount(cmd).await?;
    Ok(respond(&state, result.aggregate))
}

/// DELETE /cart
pub async fn clear<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<CartResponse>> {
    let cmd = ClearCart::new(identity.user_id, "Cleared by customer");
    let result = state.fulfillment.carts().clear(cmd).await?;
    Ok(respond(&state, result.aggregate))
}
