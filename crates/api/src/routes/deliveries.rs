//! Delivery tracking for customers, couriers and dispatch staff.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::Role;
use domain::delivery::{
    AssignDriver, CancelDelivery, CompleteDelivery, FailDelivery, MarkPickedUp, UpdateLocation,
};
use domain::{Delivery, DomainError};
use event_store::EventStore;
use projections::DriverDelivery;
use serde::{Deserialize, Serialize};

use super::{parse_aggregate_id, parse_user_id};
use crate::error::{ApiError, Result};
use crate::identity::Identity;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AssignRequest {
    pub driver_id: String,
}

#[derive(Deserialize)]
pub struct LocationRequest {
    pub lat: f64,
    pub lng: f64,
    pub accuracy: Option<f64>,
}

#[derive(Deserialize, Default)]
pub struct CompleteRequest {
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Serialize)]
pub struct BoardEntry {
    pub delivery_id: String,
    pub order_id: String,
    pub status: domain::DeliveryStatus,
    pub street: String,
    pub city: String,
    pub estimated_delivery: Option<String>,
}

impl From<DriverDelivery> for BoardEntry {
    fn from(d: DriverDelivery) -> Self {
        Self {
            delivery_id: d.delivery_id.to_string(),
            order_id: d.order_id.to_string(),
            status: d.status,
            street: d.destination.street,
            city: d.destination.city,
            estimated_delivery: d.estimated_delivery.map(|at| at.to_rfc3339()),
        }
    }
}

/// GET /deliveries/board
///
/// Drivers see their open deliveries, staff see the unassigned queue.
pub async fn board<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<Vec<BoardEntry>>> {
    state.refresh_views().await?;
    let entries = match identity.role {
        Role::Driver => state.driver_deliveries.active_for(identity.user_id).await,
        _ if identity.is_staff() => state.driver_deliveries.unassigned().await,
        role => return Err(ApiError::Forbidden(format!("{role} has no delivery board"))),
    };
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// GET /deliveries/{id}
///
/// Visible to the customer it is for, its driver and staff.
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Delivery>> {
    let delivery_id = parse_aggregate_id(&id)?;
    let delivery = state.fulfillment.deliveries().get_delivery(delivery_id).await?;
    let visible = identity.is_staff()
        || delivery.customer_id() == Some(identity.user_id)
        || delivery.driver_id() == Some(identity.user_id);
    if !visible {
        return Err(DomainError::not_found("Delivery", delivery_id).into());
    }
    Ok(Json(delivery))
}

/// POST /deliveries/{id}/assign
#[tracing::instrument(skip(state, req))]
pub async fn assign<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<Delivery>> {
    let cmd = AssignDriver::new(
        parse_aggregate_id(&id)?,
        parse_user_id(&req.driver_id)?,
        identity.actor(),
    );
    Ok(Json(state.fulfillment.assign_driver(cmd).await?))
}

/// POST /deliveries/{id}/location
pub async fn update_location<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<LocationRequest>,
) -> Result<Json<Delivery>> {
    let mut cmd = UpdateLocation::new(parse_aggregate_id(&id)?, req.lat, req.lng, identity.actor());
    if let Some(accuracy) = req.accuracy {
        cmd = cmd.with_accuracy(accuracy);
    }
    Ok(Json(state.fulfillment.update_location(cmd).await?))
}

/// POST /deliveries/{id}/pickup
pub async fn pick_up<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Delivery>> {
    let cmd = MarkPickedUp::new(parse_aggregate_id(&id)?, identity.actor());
    Ok(Json(state.fulfillment.mark_picked_up(cmd).await?))
}

/// POST /deliveries/{id}/complete
#[tracing::instrument(skip(state, req))]
pub async fn complete<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
    req: Option<Json<CompleteRequest>>,
) -> Result<Json<Delivery>> {
    let Json(req) = req.unwrap_or_default();
    let mut cmd = CompleteDelivery::new(parse_aggregate_id(&id)?, identity.actor());
    if let Some(notes) = req.notes {
        cmd = cmd.with_notes(notes);
    }
    Ok(Json(state.fulfillment.complete_delivery(cmd).await?))
}

/// POST /deliveries/{id}/fail
#[tracing::instrument(skip(state, req))]
pub async fn fail<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<Delivery>> {
    let cmd = FailDelivery::new(parse_aggregate_id(&id)?, req.reason, identity.actor());
    Ok(Json(state.fulfillment.fail_delivery(cmd).await?))
}

/// POST /deliveries/{id}/cancel
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<Delivery>> {
    let cmd = CancelDelivery::new(parse_aggregate_id(&id)?, req.reason, identity.actor());
    Ok(Json(state.fulfillment.cancel_delivery(cmd).await?))
}
