//! Loyalty account aggregate.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, Role, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::money::Money;
use crate::settings::Settings;

use super::events::{
    AccountOpenedData, BonusAwardedData, PointsAdjustedData, PointsEarnedData, PointsExpiredData,
    PointsUsedData,
};
use super::{
    AddPoints, Benefits, LoyaltyError, LoyaltyEvent, ORDER_GOALS, Tier, calculate_tier,
    find_reward,
};

/// Balance counters.
///
/// `current == total - used - expired + adjusted` holds after every event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Points {
    pub current: u64,
    pub total: u64,
    pub used: u64,
    pub expired: u64,
    /// Signed sum of manual adjustments.
    pub adjusted: i64,
}

impl Points {
    pub fn is_balanced(&self) -> bool {
        i128::from(self.current)
            == i128::from(self.total) - i128::from(self.used) - i128::from(self.expired)
                + i128::from(self.adjusted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Earned,
    Used,
    Expired,
    Bonus,
    Adjustment,
}

/// One entry of the account's transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Negative for debits.
    pub amount: i64,
    pub description: String,
    pub related_order: Option<AggregateId>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Set once an earned transaction has lapsed.
    #[serde(default)]
    pub expired: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierChange {
    pub tier: Tier,
    pub achieved_at: DateTime<Utc>,
    pub points_achieved: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_orders: u32,
    pub total_spent: Money,
    /// Consecutive calendar days with an order.
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_order_at: Option<DateTime<Utc>>,
}

impl Statistics {
    fn record_order(&mut self, total: Money, at: DateTime<Utc>) {
        self.total_spent += total;
        let day = at.date_naive();
        self.current_streak = match self.last_order_at.map(|last| last.date_naive()) {
            Some(last) if last == day => self.current_streak.max(1),
            Some(last) if last.succ_opt() == Some(day) => self.current_streak + 1,
            _ => 1,
        };
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_order_at = Some(at);
    }
}

/// A user's points ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    user_id: Option<UserId>,

    points: Points,

    tier: Tier,

    benefits: Benefits,

    tier_history: Vec<TierChange>,

    transactions: Vec<PointsTransaction>,

    statistics: Statistics,

    completed_goals: Vec<String>,

    created_at: Option<DateTime<Utc>>,
}

impl Aggregate for LoyaltyAccount {
    type Event = LoyaltyEvent;
    type Error = LoyaltyError;

    fn aggregate_type() -> &'static str {
        "LoyaltyAccount"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            LoyaltyEvent::AccountOpened(data) => {
                self.id = Some(data.account_id);
                self.user_id = Some(data.user_id);
                self.created_at = Some(data.opened_at);
                self.benefits = self.tier.benefits();
            }
            LoyaltyEvent::PointsEarned(data) => {
                self.points.current += data.amount;
                self.points.total += data.amount;
                self.statistics.total_orders += 1;
                if let Some(total) = data.order_total {
                    self.statistics.record_order(total, data.earned_at);
                }
                self.record(
                    TransactionType::Earned,
                    signed(data.amount),
                    data.description,
                    data.related_order,
                    data.expires_at,
                    data.earned_at,
                );
                self.update_tier(data.earned_at);
            }
            LoyaltyEvent::PointsUsed(data) => {
                self.points.current = self.points.current.saturating_sub(data.amount);
                self.points.used += data.amount;
                self.record(
                    TransactionType::Used,
                    -signed(data.amount),
                    data.description,
                    data.related_order,
                    None,
                    data.used_at,
                );
                self.update_tier(data.used_at);
            }
            LoyaltyEvent::PointsExpired(data) => {
                for index in &data.expired_transactions {
                    if let Some(tx) = self.transactions.get_mut(*index) {
                        tx.expired = true;
                    }
                }
                if data.amount > 0 {
                    self.points.current = self.points.current.saturating_sub(data.amount);
                    self.points.expired += data.amount;
                    self.record(
                        TransactionType::Expired,
                        -signed(data.amount),
                        "Points expired".to_string(),
                        None,
                        None,
                        data.expired_at,
                    );
                }
                self.update_tier(data.expired_at);
            }
            LoyaltyEvent::BonusAwarded(data) => {
                self.points.current += data.amount;
                self.points.total += data.amount;
                if let Some(goal_id) = data.goal_id {
                    self.completed_goals.push(goal_id);
                }
                self.record(
                    TransactionType::Bonus,
                    signed(data.amount),
                    data.description,
                    None,
                    None,
                    data.awarded_at,
                );
                self.update_tier(data.awarded_at);
            }
            LoyaltyEvent::PointsAdjusted(data) => {
                self.points.current = self.points.current.saturating_add_signed(data.amount);
                self.points.adjusted += data.amount;
                self.record(
                    TransactionType::Adjustment,
                    data.amount,
                    data.reason,
                    None,
                    None,
                    data.adjusted_at,
                );
                self.update_tier(data.adjusted_at);
            }
        }
    }
}

impl SnapshotCapable for LoyaltyAccount {
    fn snapshot_interval() -> usize {
        50
    }
}

fn signed(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}

// Query methods
impl LoyaltyAccount {
    /// Stream id of the account owned by `user_id`.
    pub fn id_for(user_id: UserId) -> AggregateId {
        AggregateId::for_user(Self::aggregate_type(), user_id)
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn points(&self) -> Points {
        self.points
    }

    pub fn current_points(&self) -> u64 {
        self.points.current
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn benefits(&self) -> Benefits {
        self.benefits
    }

    pub fn tier_history(&self) -> &[TierChange] {
        &self.tier_history
    }

    pub fn transactions(&self) -> &[PointsTransaction] {
        &self.transactions
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn completed_goals(&self) -> &[String] {
        &self.completed_goals
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Tier discount on an order of `order_amount`, unrounded.
    pub fn get_available_discount(&self, order_amount: Money) -> Money {
        order_amount.apply_rate(self.benefits.discount_rate())
    }

    /// Earned transactions that lapse at or before `now` and have not
    /// already been expired.
    fn lapsed_transactions(&self, now: DateTime<Utc>) -> Vec<(usize, u64)> {
        self.transactions
            .iter()
            .enumerate()
            .filter(|(_, tx)| {
                tx.kind == TransactionType::Earned
                    && !tx.expired
                    && tx.expires_at.is_some_and(|at| at <= now)
            })
            .map(|(index, tx)| (index, tx.amount.unsigned_abs()))
            .collect()
    }
}

// Command methods (return events)
impl LoyaltyAccount {
    /// Credits points and any order-count goal bonuses they unlock.
    pub fn add_points(
        &self,
        cmd: &AddPoints,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Result<Vec<LoyaltyEvent>, LoyaltyError> {
        if cmd.amount == 0 {
            return Err(LoyaltyError::InvalidAmount { amount: 0 });
        }

        let mut events = self.open_if_new(cmd.user_id, now);
        events.push(LoyaltyEvent::PointsEarned(PointsEarnedData {
            amount: cmd.amount,
            description: cmd.description.clone(),
            related_order: cmd.related_order,
            order_total: cmd.order_total,
            expires_at: cmd.expires_in.or(settings.points_ttl).map(|ttl| now + ttl),
            earned_at: now,
        }));

        let orders = self.statistics.total_orders + 1;
        for goal in ORDER_GOALS {
            if orders >= goal.target_orders && !self.completed_goals.iter().any(|g| g == goal.id) {
                events.push(LoyaltyEvent::BonusAwarded(BonusAwardedData {
                    amount: goal.bonus_points,
                    description: goal.description.to_string(),
                    goal_id: Some(goal.id.to_string()),
                    awarded_at: now,
                }));
            }
        }

        Ok(events)
    }

    /// Debits points; fails when the balance does not cover `amount`.
    pub fn use_points(
        &self,
        amount: u64,
        description: &str,
        related_order: Option<AggregateId>,
        reward_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<LoyaltyEvent>, LoyaltyError> {
        if amount == 0 {
            return Err(LoyaltyError::InvalidAmount { amount: 0 });
        }
        if amount > self.points.current {
            return Err(LoyaltyError::InsufficientPoints {
                requested: amount,
                available: self.points.current,
            });
        }

        Ok(vec![LoyaltyEvent::PointsUsed(PointsUsedData {
            amount,
            description: description.to_string(),
            related_order,
            reward_id: reward_id.map(str::to_string),
            used_at: now,
        })])
    }

    /// Spends a catalog reward's cost.
    pub fn redeem_reward(
        &self,
        reward_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<LoyaltyEvent>, LoyaltyError> {
        let reward = find_reward(reward_id).ok_or_else(|| LoyaltyError::RewardNotFound {
            reward_id: reward_id.to_string(),
        })?;
        self.use_points(
            reward.points_cost,
            &format!("Redeemed {}", reward.name),
            None,
            Some(reward.id),
            now,
        )
    }

    pub fn award_bonus(
        &self,
        user_id: UserId,
        amount: u64,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<LoyaltyEvent>, LoyaltyError> {
        if amount == 0 {
            return Err(LoyaltyError::InvalidAmount { amount: 0 });
        }

        let mut events = self.open_if_new(user_id, now);
        events.push(LoyaltyEvent::BonusAwarded(BonusAwardedData {
            amount,
            description: description.to_string(),
            goal_id: None,
            awarded_at: now,
        }));
        Ok(events)
    }

    /// Signed correction; staff, admins and the backend itself only.
    pub fn adjust_points(
        &self,
        user_id: UserId,
        amount: i64,
        reason: &str,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<LoyaltyEvent>, LoyaltyError> {
        if !(actor.role.is_staff() || actor.role == Role::System) {
            return Err(LoyaltyError::AdjustmentNotPermitted { role: actor.role });
        }
        if amount == 0 {
            return Err(LoyaltyError::InvalidAmount { amount });
        }
        if amount < 0 && amount.unsigned_abs() > self.points.current {
            return Err(LoyaltyError::InsufficientPoints {
                requested: amount.unsigned_abs(),
                available: self.points.current,
            });
        }

        let mut events = self.open_if_new(user_id, now);
        events.push(LoyaltyEvent::PointsAdjusted(PointsAdjustedData {
            amount,
            reason: reason.to_string(),
            adjusted_at: now,
        }));
        Ok(events)
    }

    /// Expires lapsed earned points in one transaction, capped at the
    /// current balance. Nothing to expire yields no events.
    pub fn expire_points(&self, now: DateTime<Utc>) -> Result<Vec<LoyaltyEvent>, LoyaltyError> {
        let lapsed = self.lapsed_transactions(now);
        if lapsed.is_empty() {
            return Ok(vec![]);
        }

        let due: u64 = lapsed.iter().map(|(_, amount)| amount).sum();
        Ok(vec![LoyaltyEvent::PointsExpired(PointsExpiredData {
            amount: due.min(self.points.current),
            expired_transactions: lapsed.into_iter().map(|(index, _)| index).collect(),
            expired_at: now,
        })])
    }

    fn open_if_new(&self, user_id: UserId, now: DateTime<Utc>) -> Vec<LoyaltyEvent> {
        if self.id.is_some() {
            return vec![];
        }
        vec![LoyaltyEvent::AccountOpened(AccountOpenedData {
            account_id: Self::id_for(user_id),
            user_id,
            opened_at: now,
        })]
    }

    fn record(
        &mut self,
        kind: TransactionType,
        amount: i64,
        description: String,
        related_order: Option<AggregateId>,
        expires_at: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    ) {
        self.transactions.push(PointsTransaction {
            kind,
            amount,
            description,
            related_order,
            expires_at,
            expired: false,
            timestamp,
        });
    }

    fn update_tier(&mut self, at: DateTime<Utc>) {
        let tier = calculate_tier(self.points.current);
        if tier != self.tier {
            self.tier = tier;
            self.benefits = tier.benefits();
            self.tier_history.push(TierChange {
                tier,
                achieved_at: at,
                points_achieved: self.points.current,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
    }

    fn account_with(points: u64) -> (LoyaltyAccount, UserId) {
        let user = UserId::new();
        let mut account = LoyaltyAccount::default();
        let events = account
            .add_points(&AddPoints::new(user, points, "Welcome"), &Settings::default(), now())
            .unwrap();
        account.apply_events(events);
        (account, user)
    }

    #[test]
    fn first_credit_opens_the_account() {
        let (account, user) = account_with(150);
        assert_eq!(account.id(), Some(LoyaltyAccount::id_for(user)));
        assert_eq!(account.current_points(), 150);
        assert_eq!(account.points().total, 150);
        assert_eq!(account.statistics().total_orders, 1);
        assert_eq!(account.transactions().len(), 1);
        assert_eq!(
            account.transactions()[0].expires_at,
            Some(now() + Duration::days(365))
        );
    }

    #[test]
    fn zero_amount_is_rejected() {
        let (account, user) = account_with(10);
        let settings = Settings::default();
        assert!(matches!(
            account.add_points(&AddPoints::new(user, 0, "x"), &settings, now()),
            Err(LoyaltyError::InvalidAmount { amount: 0 })
        ));
        assert!(account.use_points(0, "x", None, None, now()).is_err());
    }

    #[test]
    fn redeeming_debits_the_balance() {
        let (mut account, _) = account_with(150);
        let events = account.use_points(100, "Order discount", None, None, now()).unwrap();
        account.apply_events(events);

        assert_eq!(account.current_points(), 50);
        assert_eq!(account.points().used, 100);
        assert_eq!(account.transactions().last().unwrap().amount, -100);
        assert!(account.points().is_balanced());

        assert!(matches!(
            account.use_points(100, "again", None, None, now()),
            Err(LoyaltyError::InsufficientPoints {
                requested: 100,
                available: 50
            })
        ));
    }

    #[test]
    fn crossing_200_reaches_silver() {
        let (mut account, user) = account_with(150);
        assert_eq!(account.tier(), Tier::Bronze);
        assert!(account.tier_history().is_empty());

        let events = account
            .add_points(&AddPoints::new(user, 60, "Order"), &Settings::default(), now())
            .unwrap();
        account.apply_events(events);

        assert_eq!(account.tier(), Tier::Silver);
        assert!(account.benefits().free_delivery);
        assert_eq!(account.tier_history().len(), 1);
        assert_eq!(account.tier_history()[0].points_achieved, 210);
    }

    #[test]
    fn tier_follows_balance_down() {
        let (mut account, _) = account_with(250);
        let events = account.redeem_reward("free-coffee", now()).unwrap();
        account.apply_events(events);
        assert_eq!(account.current_points(), 150);
        assert_eq!(account.tier(), Tier::Bronze);
        assert_eq!(account.benefits(), Benefits::default());
    }

    #[test]
    fn unknown_reward_is_not_found() {
        let (account, _) = account_with(500);
        let err = account.redeem_reward("free-car", now()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[test]
    fn fifth_order_awards_goal_bonus_once() {
        let user = UserId::new();
        let settings = Settings::default();
        let mut account = LoyaltyAccount::default();
        for _ in 0..6 {
            let events = account
                .add_points(&AddPoints::new(user, 10, "Order"), &settings, now())
                .unwrap();
            account.apply_events(events);
        }

        assert_eq!(account.completed_goals(), ["orders-5".to_string()]);
        assert_eq!(account.current_points(), 60 + 50);
        let bonuses = account
            .transactions()
            .iter()
            .filter(|tx| tx.kind == TransactionType::Bonus)
            .count();
        assert_eq!(bonuses, 1);
        assert_eq!(account.statistics().total_orders, 6);
    }

    #[test]
    fn order_totals_drive_streaks() {
        let user = UserId::new();
        let settings = Settings::default();
        let mut account = LoyaltyAccount::default();
        let days = [0, 1, 1, 2, 5];
        for day in days {
            let at = now() + Duration::days(day);
            let cmd = AddPoints::new(user, 5, "Order").for_order(AggregateId::new(), Money::from_units(5));
            let events = account.add_points(&cmd, &settings, at).unwrap();
            account.apply_events(events);
        }

        let stats = account.statistics();
        assert_eq!(stats.total_spent, Money::from_units(25));
        assert_eq!(stats.longest_streak, 3);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.last_order_at, Some(now() + Duration::days(5)));
    }

    #[test]
    fn expiry_is_capped_at_current_and_runs_once() {
        let (mut account, _) = account_with(100);
        let events = account.use_points(80, "Order", None, None, now()).unwrap();
        account.apply_events(events);

        let later = now() + Duration::days(366);
        let events = account.expire_points(later).unwrap();
        account.apply_events(events);

        assert_eq!(account.current_points(), 0);
        assert_eq!(account.points().expired, 20);
        assert!(account.transactions()[0].expired);
        assert!(account.points().is_balanced());
        assert!(account.expire_points(later).unwrap().is_empty());
    }

    #[test]
    fn nothing_expires_early() {
        let (account, _) = account_with(100);
        assert!(account.expire_points(now() + Duration::days(30)).unwrap().is_empty());
    }

    #[test]
    fn adjustments_are_signed_and_bounded() {
        let (mut account, user) = account_with(40);
        let staff = Actor::staff(UserId::new());

        let events = account.adjust_points(user, -30, "Goodwill reversal", staff, now()).unwrap();
        account.apply_events(events);
        assert_eq!(account.current_points(), 10);
        assert_eq!(account.points().adjusted, -30);
        assert!(account.points().is_balanced());

        assert!(matches!(
            account.adjust_points(user, -11, "too much", staff, now()),
            Err(LoyaltyError::InsufficientPoints { .. })
        ));
        assert!(matches!(
            account.adjust_points(user, 5, "self-service", Actor::customer(user), now()),
            Err(LoyaltyError::AdjustmentNotPermitted { role: Role::Customer })
        ));
    }

    #[test]
    fn discount_uses_tier_rate() {
        let (account, _) = account_with(520);
        assert_eq!(account.tier(), Tier::Gold);
        assert_eq!(
            account.get_available_discount(Money::from_units(20)).rounded(),
            Money::from_units(2)
        );
    }
}
