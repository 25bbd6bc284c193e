//! Time-boxed task offers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an offer. Every state other than `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Cancelled,
}

impl OfferStatus {
    pub fn can_transition_to(&self, target: OfferStatus) -> bool {
        *self == OfferStatus::Pending && target != OfferStatus::Pending
    }

    pub fn is_terminal(&self) -> bool {
        *self != OfferStatus::Pending
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A proposal of one task to one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOffer {
    pub id: Uuid,
    pub task_id: Uuid,
    pub worker_id: Uuid,
    pub offered_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub status: OfferStatus,
    pub base_earning: Decimal,
    pub bonus_earning: Decimal,
    /// Minutes for the worker to reach the task.
    pub estimated_minutes: u32,
    pub distance_km: f64,
    pub decline_reason: Option<String>,
}

impl TaskOffer {
    /// Create a pending offer valid for `ttl` from `now`.
    pub fn new(task_id: Uuid, worker_id: Uuid, now: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            worker_id,
            offered_at: now,
            expires_at: now + ttl,
            responded_at: None,
            status: OfferStatus::Pending,
            base_earning: Decimal::ZERO,
            bonus_earning: Decimal::ZERO,
            estimated_minutes: 0,
            distance_km: 0.0,
            decline_reason: None,
        }
    }

    /// Past the deadline, whatever the stored status says.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Pending and still within its deadline.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == OfferStatus::Pending && !self.is_expired_at(now)
    }

    pub fn total_earning(&self) -> Decimal {
        self.base_earning + self.bonus_earning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn only_pending_transitions() {
        assert!(OfferStatus::Pending.can_transition_to(OfferStatus::Accepted));
        assert!(OfferStatus::Pending.can_transition_to(OfferStatus::Cancelled));
        assert!(!OfferStatus::Pending.can_transition_to(OfferStatus::Pending));
        assert!(!OfferStatus::Accepted.can_transition_to(OfferStatus::Cancelled));
        assert!(!OfferStatus::Expired.can_transition_to(OfferStatus::Accepted));
        assert!(OfferStatus::Declined.is_terminal());
    }

    #[test]
    fn expiry_is_wall_clock_based() {
        let now = Utc::now();
        let offer = TaskOffer::new(Uuid::new_v4(), Uuid::new_v4(), now, chrono::Duration::seconds(30));
        assert!(offer.is_active_at(now));
        assert!(!offer.is_expired_at(now + chrono::Duration::seconds(30)));
        assert!(offer.is_expired_at(now + chrono::Duration::seconds(31)));
        assert!(!offer.is_active_at(now + chrono::Duration::seconds(31)));
    }

    #[test]
    fn total_earning_sums_parts() {
        let mut offer = TaskOffer::new(Uuid::new_v4(), Uuid::new_v4(), Utc::now(), chrono::Duration::seconds(30));
        offer.base_earning = dec!(1200.50);
        offer.bonus_earning = dec!(150);
        assert_eq!(offer.total_earning(), dec!(1350.50));
    }
}
