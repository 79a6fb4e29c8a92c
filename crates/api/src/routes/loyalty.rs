//! Loyalty balance, rewards and staff adjustments.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::LoyaltyAccount;
use domain::loyalty::{AdjustPoints, AwardBonus, ORDER_GOALS, OrderGoal, REWARDS, RedeemReward, Reward};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::parse_user_id;
use crate::error::Result;
use crate::identity::Identity;
use crate::state::AppState;

#[derive(Serialize)]
pub struct RewardsResponse {
    pub rewards: &'static [Reward],
    pub order_goals: &'static [OrderGoal],
}

#[derive(Deserialize)]
pub struct AdjustRequest {
    /// Signed: negative amounts take points away.
    pub amount: i64,
    pub reason: String,
}

#[derive(Deserialize)]
pub struct BonusRequest {
    pub amount: u64,
    pub description: String,
}

/// GET /loyalty
pub async fn account<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<LoyaltyAccount>> {
    let account = state
        .fulfillment
        .loyalty()
        .get_account(identity.user_id)
        .await?;
    Ok(Json(account))
}

/// GET /loyalty/rewards
pub async fn rewards() -> Json<RewardsResponse> {
    Json(RewardsResponse {
        rewards: REWARDS,
        order_goals: ORDER_GOALS,
    })
}

/// POST /loyalty/rewards/{reward_id}/redeem
#[tracing::instrument(skip(state), fields(user_id = %identity.user_id))]
pub async fn redeem<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(reward_id): Path<String>,
) -> Result<Json<LoyaltyAccount>> {
    let result = state
        .fulfillment
        .loyalty()
        .redeem_reward(RedeemReward::new(identity.user_id, reward_id))
        .await?;
    Ok(Json(result.aggregate))
}

/// GET /loyalty/accounts/{user_id}, staff only.
pub async fn account_of<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(user_id): Path<String>,
) -> Result<Json<LoyaltyAccount>> {
    identity.require_staff()?;
    let account = state
        .fulfillment
        .loyalty()
        .get_account(parse_user_id(&user_id)?)
        .await?;
    Ok(Json(account))
}

/// POST /loyalty/accounts/{user_id}/adjust
pub async fn adjust<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(user_id): Path<String>,
    Json(req): Json<AdjustRequest>,
) -> Result<Json<LoyaltyAccount>> {
    let cmd = AdjustPoints::new(
        parse_user_id(&user_id)?,
        req.amount,
        req.reason,
        identity.actor(),
    );
    let result = state.fulfillment.loyalty().adjust_points(cmd).await?;
    Ok(Json(result.aggregate))
}

/// POST /loyalty/accounts/{user_id}/bonus, staff only.
pub async fn bonus<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(user_id): Path<String>,
    Json(req): Json<BonusRequest>,
) -> Result<Json<LoyaltyAccount>> {
    identity.require_staff()?;
    let cmd = AwardBonus::new(parse_user_id(&user_id)?, req.amount, req.description);
    let result = state.fulfillment.loyalty().award_bonus(cmd).await?;
    Ok(Json(result.aggregate))
}

/// POST /loyalty/accounts/{user_id}/expire, staff only.
pub async fn expire<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(user_id): Path<String>,
) -> Result<Json<LoyaltyAccount>> {
    identity.require_staff()?;
    let result = state
        .fulfillment
        .loyalty()
        .expire_points(parse_user_id(&user_id)?)
        .await?;
    Ok(Json(result.aggregate))
}
