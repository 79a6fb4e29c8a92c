//! Loyalty service.
//!
//! Every write goes through [`CommandHandler::execute_with_retry`]: a
//! command that loses an append race is re-evaluated against the winner's
//! balance instead of being lost or double-spending.

use std::sync::Arc;

use common::{Actor, Clock, UserId};
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::money::Money;
use crate::settings::Settings;

use super::{AddPoints, AdjustPoints, AwardBonus, LoyaltyAccount, RedeemReward, UsePoints};

/// Service for managing loyalty accounts.
pub struct LoyaltyService<S: EventStore> {
    handler: CommandHandler<S, LoyaltyAccount>,
    settings: Arc<Settings>,
    clock: Arc<dyn Clock>,
}

impl<S: EventStore> LoyaltyService<S> {
    pub fn new(store: S, settings: Arc<Settings>, clock: Arc<dyn Clock>) -> Self {
        Self {
            handler: CommandHandler::new(store),
            settings,
            clock,
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, LoyaltyAccount> {
        &self.handler
    }

    /// Loads a user's account; users who never earned points get an empty one.
    #[tracing::instrument(skip(self))]
    pub async fn get_account(&self, user_id: UserId) -> Result<LoyaltyAccount, DomainError> {
        self.handler.load(LoyaltyAccount::id_for(user_id)).await
    }

    /// Tier discount a user would get on `order_amount`, unrounded.
    #[tracing::instrument(skip(self))]
    pub async fn available_discount(
        &self,
        user_id: UserId,
        order_amount: Money,
    ) -> Result<Money, DomainError> {
        let account = self.get_account(user_id).await?;
        Ok(account.get_available_discount(order_amount))
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_points(
        &self,
        cmd: AddPoints,
    ) -> Result<CommandResult<LoyaltyAccount>, DomainError> {
        let now = self.clock.now();
        let settings = &self.settings;
        let aggregate_id = cmd.aggregate_id();
        let result = self
            .handler
            .execute_with_retry(aggregate_id, Some(Actor::system()), |account| {
                account.add_points(&cmd, settings, now)
            })
            .await?;

        let tier = result.aggregate.tier();
        tracing::info!(user_id = %cmd.user_id, amount = cmd.amount, %tier, "points earned");
        metrics::counter!("loyalty_points_earned_total").increment(cmd.amount);
        self.handler.snapshot_if_due(aggregate_id, &result).await?;
        Ok(result)
    }

    /// Debits points; fails with insufficient points against the latest balance.
    #[tracing::instrument(skip(self))]
    pub async fn use_points(
        &self,
        cmd: UsePoints,
    ) -> Result<CommandResult<LoyaltyAccount>, DomainError> {
        let now = self.clock.now();
        let aggregate_id = cmd.aggregate_id();
        let result = self
            .handler
            .execute_with_retry(aggregate_id, Some(Actor::customer(cmd.user_id)), |account| {
                account.use_points(cmd.amount, &cmd.description, cmd.related_order, None, now)
            })
            .await?;

        tracing::info!(user_id = %cmd.user_id, amount = cmd.amount, "points used");
        metrics::counter!("loyalty_points_redeemed_total").increment(cmd.amount);
        self.handler.snapshot_if_due(aggregate_id, &result).await?;
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn redeem_reward(
        &self,
        cmd: RedeemReward,
    ) -> Result<CommandResult<LoyaltyAccount>, DomainError> {
        let now = self.clock.now();
        let aggregate_id = cmd.aggregate_id();
        let result = self
            .handler
            .execute_with_retry(aggregate_id, Some(Actor::customer(cmd.user_id)), |account| {
                account.redeem_reward(&cmd.reward_id, now)
            })
            .await?;

        let spent: u64 = result
            .aggregate
            .transactions()
            .last()
            .map_or(0, |tx| tx.amount.unsigned_abs());
        tracing::info!(user_id = %cmd.user_id, reward_id = %cmd.reward_id, "reward redeemed");
        metrics::counter!("loyalty_points_redeemed_total").increment(spent);
        self.handler.snapshot_if_due(aggregate_id, &result).await?;
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn award_bonus(
        &self,
        cmd: AwardBonus,
    ) -> Result<CommandResult<LoyaltyAccount>, DomainError> {
        let now = self.clock.now();
        let aggregate_id = cmd.aggregate_id();
        let result = self
            .handler
            .execute_with_retry(aggregate_id, Some(Actor::system()), |account| {
                account.award_bonus(cmd.user_id, cmd.amount, &cmd.description, now)
            })
            .await?;
        self.handler.snapshot_if_due(aggregate_id, &result).await?;
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn adjust_points(
        &self,
        cmd: AdjustPoints,
    ) -> Result<CommandResult<LoyaltyAccount>, DomainError> {
        let now = self.clock.now();
        let aggregate_id = cmd.aggregate_id();
        let result = self
            .handler
            .execute_with_retry(aggregate_id, Some(cmd.actor), |account| {
                account.adjust_points(cmd.user_id, cmd.amount, &cmd.reason, cmd.actor, now)
            })
            .await?;

        tracing::info!(
            user_id = %cmd.user_id,
            amount = cmd.amount,
            actor = %cmd.actor,
            "points adjusted"
        );
        self.handler.snapshot_if_due(aggregate_id, &result).await?;
        Ok(result)
    }

    /// Expires a user's lapsed points as of now.
    #[tracing::instrument(skip(self))]
    pub async fn expire_points(
        &self,
        user_id: UserId,
    ) -> Result<CommandResult<LoyaltyAccount>, DomainError> {
        let now = self.clock.now();
        let aggregate_id = LoyaltyAccount::id_for(user_id);
        let result = self
            .handler
            .execute_with_retry(aggregate_id, Some(Actor::system()), |account| {
                account.expire_points(now)
            })
            .await?;

        if !result.events.is_empty() {
            tracing::info!(%user_id, "lapsed points expired");
        }
        self.handler.snapshot_if_due(aggregate_id, &result).await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::error::ErrorKind;
    use crate::loyalty::Tier;
    use chrono::{Duration, TimeZone, Utc};
    use common::FixedClock;
    use event_store::InMemoryEventStore;

    fn service() -> (LoyaltyService<InMemoryEventStore>, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 5, 2, 10, 0, 0).unwrap(),
        ));
        let service = LoyaltyService::new(
            InMemoryEventStore::new(),
            Arc::new(Settings::default()),
            clock.clone(),
        );
        (service, clock)
    }

    #[tokio::test]
    async fn unknown_user_has_empty_account() {
        let (service, _) = service();
        let account = service.get_account(UserId::new()).await.unwrap();
        assert!(account.id().is_none());
        assert_eq!(account.current_points(), 0);
        assert_eq!(account.tier(), Tier::Bronze);
    }

    #[tokio::test]
    async fn earn_then_redeem() {
        let (service, _) = service();
        let user = UserId::new();

        service.add_points(AddPoints::new(user, 150, "Order")).await.unwrap();
        let result = service
            .use_points(UsePoints::new(user, 100, "Order discount"))
            .await
            .unwrap();
        assert_eq!(result.aggregate.current_points(), 50);

        let err = service
            .use_points(UsePoints::new(user, 100, "Order discount"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientPoints);

        let reloaded = service.get_account(user).await.unwrap();
        assert_eq!(reloaded.current_points(), 50);
        assert_eq!(reloaded.version(), result.new_version);
    }

    #[tokio::test]
    async fn reward_redemption_spends_its_cost() {
        let (service, _) = service();
        let user = UserId::new();
        service.add_points(AddPoints::new(user, 300, "Order")).await.unwrap();

        let result = service
            .redeem_reward(RedeemReward::new(user, "free-pastry"))
            .await
            .unwrap();
        assert_eq!(result.aggregate.current_points(), 150);

        let err = service
            .redeem_reward(RedeemReward::new(user, "yacht"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn expiry_uses_the_clock() {
        let (service, clock) = service();
        let user = UserId::new();
        service
            .add_points(AddPoints::new(user, 80, "Promo").expires_in(Duration::days(7)))
            .await
            .unwrap();

        let result = service.expire_points(user).await.unwrap();
        assert!(result.events.is_empty());

        clock.advance(Duration::days(8));
        let result = service.expire_points(user).await.unwrap();
        assert_eq!(result.aggregate.current_points(), 0);
        assert_eq!(result.aggregate.points().expired, 80);
    }

    #[tokio::test]
    async fn customers_cannot_adjust() {
        let (service, _) = service();
        let user = UserId::new();
        let err = service
            .adjust_points(AdjustPoints::new(user, 10, "please", Actor::customer(user)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let result = service
            .adjust_points(AdjustPoints::new(user, 10, "Apology", Actor::staff(UserId::new())))
            .await
            .unwrap();
        assert_eq!(result.aggregate.current_points(), 10);
    }
}
