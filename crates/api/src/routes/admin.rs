//! Staff upkeep of the in-memory catalog and user directory.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::Role;
use domain::{Money, Product, Stock};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::parse_user_id;
use crate::error::{ApiError, Result};
use crate::identity::Identity;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub price: Money,
    /// Omitted means made to order.
    pub stock: Option<u32>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

#[derive(Deserialize, Serialize)]
pub struct RoleRequest {
    pub role: Role,
}

/// PUT /catalog/{product_id}, staff only.
pub async fn put_product<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(product_id): Path<String>,
    Json(req): Json<ProductRequest>,
) -> Result<StatusCode> {
    identity.require_staff()?;
    if req.price.is_negative() {
        return Err(ApiError::BadRequest("price cannot be negative".into()));
    }
    let mut product = Product::new(product_id.as_str(), req.name, req.price)
        .with_stock(req.stock.map_or(Stock::Unlimited, Stock::Limited));
    product.active = req.active;
    state.catalog.insert(product).await;
    tracing::info!(%product_id, by = %identity.user_id, "catalog entry updated");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /directory/{user_id}, admins only.
pub async fn put_role<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(user_id): Path<String>,
    Json(req): Json<RoleRequest>,
) -> Result<StatusCode> {
    if identity.role != Role::Admin {
        return Err(ApiError::Forbidden("only admins manage roles".into()));
    }
    if req.role == Role::System {
        return Err(ApiError::BadRequest("the system role is internal".into()));
    }
    let user_id = parse_user_id(&user_id)?;
    state.directory.register(user_id, req.role).await;
    tracing::info!(%user_id, role = %req.role, "directory entry updated");
    Ok(StatusCode::NO_CONTENT)
}
