//! Loyalty ledger: points balance, tiers, rewards and goals.

mod aggregate;
mod commands;
mod events;
mod rewards;
mod service;
mod tier;

pub use aggregate::{
    LoyaltyAccount, Points, PointsTransaction, Statistics, TierChange, TransactionType,
};
pub use commands::*;
pub use events::{
    AccountOpenedData, BonusAwardedData, LoyaltyEvent, PointsAdjustedData, PointsEarnedData,
    PointsExpiredData, PointsUsedData,
};
pub use rewards::{ORDER_GOALS, OrderGoal, REWARDS, Reward, find_reward};
pub use service::LoyaltyService;
pub use tier::{Benefits, TIER_TABLE, Tier, TierRule, calculate_tier};

use common::Role;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during loyalty operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoyaltyError {
    #[error("Invalid points amount: {amount}")]
    InvalidAmount { amount: i64 },

    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: u64, available: u64 },

    #[error("Reward not found: {reward_id}")]
    RewardNotFound { reward_id: String },

    #[error("Role {role} may not adjust points")]
    AdjustmentNotPermitted { role: Role },
}

impl LoyaltyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoyaltyError::InvalidAmount { .. } | LoyaltyError::AdjustmentNotPermitted { .. } => {
                ErrorKind::Validation
            }
            LoyaltyError::InsufficientPoints { .. } => ErrorKind::InsufficientPoints,
            LoyaltyError::RewardNotFound { .. } => ErrorKind::NotFound,
        }
    }
}
