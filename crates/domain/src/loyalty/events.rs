//! Loyalty ledger events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LoyaltyEvent {
    AccountOpened(AccountOpenedData),
    PointsEarned(PointsEarnedData),
    PointsUsed(PointsUsedData),
    PointsExpired(PointsExpiredData),
    BonusAwarded(BonusAwardedData),
    PointsAdjusted(PointsAdjustedData),
}

impl DomainEvent for LoyaltyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LoyaltyEvent::AccountOpened(_) => "AccountOpened",
            LoyaltyEvent::PointsEarned(_) => "PointsEarned",
            LoyaltyEvent::PointsUsed(_) => "PointsUsed",
            LoyaltyEvent::PointsExpired(_) => "PointsExpired",
            LoyaltyEvent::BonusAwarded(_) => "BonusAwarded",
            LoyaltyEvent::PointsAdjusted(_) => "PointsAdjusted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountOpenedData {
    pub account_id: AggregateId,
    pub user_id: UserId,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsEarnedData {
    pub amount: u64,
    pub description: String,
    pub related_order: Option<AggregateId>,
    /// Amount paid for the order, when the points come from one.
    pub order_total: Option<Money>,
    pub expires_at: Option<DateTime<Utc>>,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsUsedData {
    pub amount: u64,
    pub description: String,
    pub related_order: Option<AggregateId>,
    pub reward_id: Option<String>,
    pub used_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsExpiredData {
    pub amount: u64,
    /// Positions of the earned transactions that lapsed.
    pub expired_transactions: Vec<usize>,
    pub expired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusAwardedData {
    pub amount: u64,
    pub description: String,
    /// Set when the bonus completes an order-count goal.
    pub goal_id: Option<String>,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsAdjustedData {
    /// Signed correction.
    pub amount: i64,
    pub reason: String,
    pub adjusted_at: DateTime<Utc>,
}
