//! Tier table.
//!
//! One ordered table maps a points balance to a tier and the tier to its
//! benefits; nothing else decides either.

use serde::{Deserialize, Serialize};

use crate::money::Rate;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
        }
    }

    pub fn benefits(&self) -> Benefits {
        TIER_TABLE
            .iter()
            .find(|rule| rule.tier == *self)
            .map(|rule| rule.benefits)
            .unwrap_or_default()
    }

    /// Points needed to reach this tier.
    pub fn min_points(&self) -> u64 {
        TIER_TABLE
            .iter()
            .find(|rule| rule.tier == *self)
            .map_or(0, |rule| rule.min_points)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Benefits {
    /// Whole percent taken off an order.
    pub discount_percentage: u32,
    pub free_delivery: bool,
    pub priority_support: bool,
}

impl Benefits {
    pub fn discount_rate(&self) -> Rate {
        Rate::percent(self.discount_percentage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierRule {
    pub min_points: u64,
    pub tier: Tier,
    pub benefits: Benefits,
}

/// Ordered by ascending threshold.
pub const TIER_TABLE: [TierRule; 4] = [
    TierRule {
        min_points: 0,
        tier: Tier::Bronze,
        benefits: Benefits {
            discount_percentage: 0,
            free_delivery: false,
            priority_support: false,
        },
    },
    TierRule {
        min_points: 200,
        tier: Tier::Silver,
        benefits: Benefits {
            discount_percentage: 5,
            free_delivery: true,
            priority_support: false,
        },
    },
    TierRule {
        min_points: 500,
        tier: Tier::Gold,
        benefits: Benefits {
            discount_percentage: 10,
            free_delivery: true,
            priority_support: true,
        },
    },
    TierRule {
        min_points: 1000,
        tier: Tier::Platinum,
        benefits: Benefits {
            discount_percentage: 15,
            free_delivery: true,
            priority_support: true,
        },
    },
];

/// Highest tier whose threshold is at most `points`.
pub fn calculate_tier(points: u64) -> Tier {
    TIER_TABLE
        .iter()
        .rev()
        .find(|rule| rule.min_points <= points)
        .map_or(Tier::Bronze, |rule| rule.tier)
}
