//! Route handlers, one module per resource.

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod deliveries;
pub mod health;
pub mod loyalty;
pub mod metrics;
pub mod orders;

use common::{AggregateId, UserId};

use crate::error::ApiError;

pub(crate) fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    uuid::Uuid::parse_str(id)
        .map(AggregateId::from_uuid)
        .map_err(|e| ApiError::BadRequest(format!("invalid id {id}: {e}")))
}

pub(crate) fn parse_user_id(id: &str) -> Result<UserId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid user id {id}: {e}")))
}
