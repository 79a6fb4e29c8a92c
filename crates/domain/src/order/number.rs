//! Human-readable order numbers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// `<prefix><YY><MM><DD><seq3>`, e.g. `SP260314007`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Formats the `sequence`-th order of `date`. Sequences above 999 widen
    /// the suffix rather than wrap.
    pub fn new(prefix: &str, date: NaiveDate, sequence: i64) -> Self {
        Self(format!("{prefix}{}{sequence:03}", date.format("%y%m%d")))
    }

    /// Key of the per-day counter the sequence is drawn from.
    pub fn sequence_key(date: NaiveDate) -> String {
        format!("order-number:{}", date.format("%y%m%d"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 4).unwrap()
    }

    #[test]
    fn pads_the_sequence() {
        assert_eq!(OrderNumber::new("SP", day(), 1).as_str(), "SP260304001");
        assert_eq!(OrderNumber::new("SP", day(), 42).as_str(), "SP260304042");
        assert_eq!(OrderNumber::new("SP", day(), 1234).as_str(), "SP2603041234");
    }

    #[test]
    fn one_counter_per_day() {
        let next = day().succ_opt().unwrap();
        assert_eq!(OrderNumber::sequence_key(day()), "order-number:260304");
        assert_ne!(OrderNumber::sequence_key(day()), OrderNumber::sequence_key(next));
    }
}
