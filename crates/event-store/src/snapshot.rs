use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AggregateId, Version};

/// Serialized aggregate state at a given stream version.
///
/// Loading replays only the events after the snapshot, which keeps
/// long-lived streams (loyalty ledgers, tracked deliveries) cheap to load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    /// Stream version the state corresponds to.
    pub version: Version,
    pub timestamp: DateTime<Utc>,
    pub state: serde_json::Value,
}

impl Snapshot {
    /// Creates a snapshot from a serializable state.
    pub fn from_state<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            state: serde_json::to_value(state)?,
        })
    }

    /// Deserializes the snapshot state into a concrete type.
    pub fn into_state<T: for<'de> Deserialize<'de>>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Balance {
        current: u64,
        tier: String,
    }

    #[test]
    fn state_survives_snapshotting() {
        let original = Balance {
            current: 250,
            tier: "silver".to_string(),
        };

        let snapshot = Snapshot::from_state(
            AggregateId::new(),
            "LoyaltyAccount",
            Version::new(50),
            &original,
        )
        .unwrap();

        assert_eq!(snapshot.version, Version::new(50));
        let restored: Balance = snapshot.into_state().unwrap();
        assert_eq!(restored, original);
    }
}
