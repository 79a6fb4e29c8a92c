//! Loyalty commands.

use chrono::Duration;
use common::{Actor, AggregateId, UserId};

use crate::command::Command;
use crate::money::Money;

use super::LoyaltyAccount;

/// Credit points, usually for a delivered order.
#[derive(Debug, Clone)]
pub struct AddPoints {
    pub user_id: UserId,
    pub amount: u64,
    pub description: String,
    pub related_order: Option<AggregateId>,
    /// Amount paid for the related order; feeds the spending statistics.
    pub order_total: Option<Money>,
    /// Overrides the configured points lifetime.
    pub expires_in: Option<Duration>,
}

impl AddPoints {
    pub fn new(user_id: UserId, amount: u64, description: impl Into<String>) -> Self {
        Self {
            user_id,
            amount,
            description: description.into(),
            related_order: None,
            order_total: None,
            expires_in: None,
        }
    }

    pub fn for_order(mut self, order_id: AggregateId, order_total: Money) -> Self {
        self.related_order = Some(order_id);
        self.order_total = Some(order_total);
        self
    }

    pub fn expires_in(mut self, lifetime: Duration) -> Self {
        self.expires_in = Some(lifetime);
        self
    }
}

impl Command for AddPoints {
    type Aggregate = LoyaltyAccount;

    fn aggregate_id(&self) -> AggregateId {
        LoyaltyAccount::id_for(self.user_id)
    }
}

#[derive(Debug, Clone)]
pub struct UsePoints {
    pub user_id: UserId,
    pub amount: u64,
    pub description: String,
    pub related_order: Option<AggregateId>,
}

impl UsePoints {
    pub fn new(user_id: UserId, amount: u64, description: impl Into<String>) -> Self {
        Self {
            user_id,
            amount,
            description: description.into(),
            related_order: None,
        }
    }

    pub fn for_order(mut self, order_id: AggregateId) -> Self {
        self.related_order = Some(order_id);
        self
    }
}

impl Command for UsePoints {
    type Aggregate = LoyaltyAccount;

    fn aggregate_id(&self) -> AggregateId {
        LoyaltyAccount::id_for(self.user_id)
    }
}

#[derive(Debug, Clone)]
pub struct AwardBonus {
    pub user_id: UserId,
    pub amount: u64,
    pub description: String,
}

impl AwardBonus {
    pub fn new(user_id: UserId, amount: u64, description: impl Into<String>) -> Self {
        Self {
            user_id,
            amount,
            description: description.into(),
        }
    }
}

impl Command for AwardBonus {
    type Aggregate = LoyaltyAccount;

    fn aggregate_id(&self) -> AggregateId {
        LoyaltyAccount::id_for(self.user_id)
    }
}

/// Signed manual correction made by staff.
#[derive(Debug, Clone)]
pub struct AdjustPoints {
    pub user_id: UserId,
    pub amount: i64,
    pub reason: String,
    pub actor: Actor,
}

impl AdjustPoints {
    pub fn new(user_id: UserId, amount: i64, reason: impl Into<String>, actor: Actor) -> Self {
        Self {
            user_id,
            amount,
            reason: reason.into(),
            actor,
        }
    }
}

impl Command for AdjustPoints {
    type Aggregate = LoyaltyAccount;

    fn aggregate_id(&self) -> AggregateId {
        LoyaltyAccount::id_for(self.user_id)
    }
}

#[derive(Debug, Clone)]
pub struct RedeemReward {
    pub user_id: UserId,
    pub reward_id: String,
}

impl RedeemReward {
    pub fn new(user_id: UserId, reward_id: impl Into<String>) -> Self {
        Self {
            user_id,
            reward_id: reward_id.into(),
        }
    }
}

impl Command for RedeemReward {
    type Aggregate = LoyaltyAccount;

    fn aggregate_id(&self) -> AggregateId {
        LoyaltyAccount::id_for(self.user_id)
    }
}
