//! Turning the caller's cart into an order.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::Order;
use event_store::EventStore;

use crate::error::Result;
use crate::identity::Identity;
use crate::state::AppState;

/// POST /checkout
///
/// Places the order, redeems the points chosen on the cart and clears it.
/// On failure nothing is left behind.
#[tracing::instrument(skip(state), fields(user_id = %identity.user_id))]
pub async fn checkout<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<(StatusCode, Json<Order>)> {
    let order = state
        .fulfillment
        .checkout(identity.user_id, identity.actor())
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}
