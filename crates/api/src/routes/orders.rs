//! Order queries and staff-side order operations.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::AggregateId;
use domain::order::{ApplyAdjustment, PaymentStatus, UpdateOrderStatus, UpdatePaymentStatus};
use domain::{Money, Order, OrderStatus};
use event_store::{EventEnvelope, EventStore};
use projections::CustomerOrder;
use serde::{Deserialize, Serialize};

use super::parse_aggregate_id;
use crate::error::{ApiError, Result};
use crate::identity::Identity;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct PaymentStatusRequest {
    pub status: PaymentStatus,
}

#[derive(Deserialize)]
pub struct AdjustmentRequest {
    pub discount: Money,
    pub reason: String,
}

/// A row of the caller's order history.
#[derive(Serialize)]
pub struct OrderSummaryResponse {
    pub id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub item_count: u32,
    pub final_amount: Money,
    pub delivery_id: Option<String>,
    pub placed_at: String,
}

impl From<CustomerOrder> for OrderSummaryResponse {
    fn from(order: CustomerOrder) -> Self {
        Self {
            id: order.order_id.to_string(),
            order_number: order.order_number.to_string(),
            status: order.status,
            payment_status: order.payment_status,
            item_count: order.item_count,
            final_amount: order.final_amount(),
            delivery_id: order.delivery_id.map(|id| id.to_string()),
            placed_at: order.placed_at.to_rfc3339(),
        }
    }
}

/// Loads an order the caller may see: their own, or any for staff.
async fn visible_order<S: EventStore + Clone + 'static>(
    state: &AppState<S>,
    identity: &Identity,
    order_id: AggregateId,
) -> Result<Order> {
    let order = state.fulfillment.orders().get_order(order_id).await?;
    if identity.is_staff() || order.user_id() == Some(identity.user_id) {
        Ok(order)
    } else {
        // Someone else's order looks the same as a missing one.
        Err(domain::DomainError::not_found("Order", order_id).into())
    }
}

/// GET /orders, the caller's history newest first.
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<Vec<OrderSummaryResponse>>> {
    state.refresh_views().await?;
    let orders = state.customer_orders.orders_for(identity.user_id).await;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /orders/{id}
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    let order_id = parse_aggregate_id(&id)?;
    Ok(Json(visible_order(&state, &identity, order_id).await?))
}

/// GET /orders/{id}/events, the raw audit trail.
pub async fn events<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelope>>> {
    let order_id = parse_aggregate_id(&id)?;
    visible_order(&state, &identity, order_id).await?;
    let events = state
        .store
        .get_events_for_aggregate(order_id)
        .await
        .map_err(domain::DomainError::from)?;
    Ok(Json(events))
}

/// POST /orders/{id}/status
///
/// Customers may only touch their own orders; the transition policy decides
/// the rest.
#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn update_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Order>> {
    let order_id = parse_aggregate_id(&id)?;
    visible_order(&state, &identity, order_id).await?;

    let mut cmd = UpdateOrderStatus::new(order_id, req.status, identity.actor());
    if let Some(note) = req.note {
        cmd = cmd.with_note(note);
    }
    Ok(Json(state.fulfillment.update_order_status(cmd).await?))
}

/// POST /orders/{id}/payment, staff only.
pub async fn update_payment<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<PaymentStatusRequest>,
) -> Result<Json<Order>> {
    identity.require_staff()?;
    let order_id = parse_aggregate_id(&id)?;
    let result = state
        .fulfillment
        .orders()
        .update_payment_status(UpdatePaymentStatus::new(order_id, req.status))
        .await?;
    Ok(Json(result.aggregate))
}

/// POST /orders/{id}/adjustment
pub async fn apply_adjustment<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<AdjustmentRequest>,
) -> Result<Json<Order>> {
    let order_id = parse_aggregate_id(&id)?;
    if req.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("an adjustment needs a reason".into()));
    }
    let cmd = ApplyAdjustment::new(order_id, req.discount, req.reason, identity.actor());
    let result = state.fulfillment.orders().apply_adjustment(cmd).await?;
    Ok(Json(result.aggregate))
}
