//! Reward catalog and order-count goals.

use serde::Serialize;

/// Something a customer can buy with points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reward {
    pub id: &'static str,
    pub name: &'static str,
    pub points_cost: u64,
}

pub const REWARDS: &[Reward] = &[
    Reward {
        id: "free-coffee",
        name: "Free coffee",
        points_cost: 100,
    },
    Reward {
        id: "free-pastry",
        name: "Free pastry of the day",
        points_cost: 150,
    },
    Reward {
        id: "cake-slice",
        name: "Slice of cake",
        points_cost: 250,
    },
    Reward {
        id: "celebration-cake",
        name: "Celebration cake",
        points_cost: 1000,
    },
];

pub fn find_reward(reward_id: &str) -> Option<&'static Reward> {
    REWARDS.iter().find(|reward| reward.id == reward_id)
}

/// A one-time bonus for reaching a number of orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderGoal {
    pub id: &'static str,
    pub description: &'static str,
    pub target_orders: u32,
    pub bonus_points: u64,
}

pub const ORDER_GOALS: &[OrderGoal] = &[
    OrderGoal {
        id: "orders-5",
        description: "Fifth order bonus",
        target_orders: 5,
        bonus_points: 50,
    },
    OrderGoal {
        id: "orders-10",
        description: "Tenth order bonus",
        target_orders: 10,
        bonus_points: 100,
    },
    OrderGoal {
        id: "orders-25",
        description: "Twenty-fifth order bonus",
        target_orders: 25,
        bonus_points: 250,
    },
];
