//! Field task and its lifecycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::geo::{Address, GeoPoint};

/// Category of field work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Delivery,
    Collection,
    Survey,
    Merchandising,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Delivery => "delivery",
            Self::Collection => "collection",
            Self::Survey => "survey",
            Self::Merchandising => "merchandising",
        };
        write!(f, "{s}")
    }
}

/// Status of a task. The engine drives `Pending → Offered → Accepted`;
/// everything after acceptance belongs to the task owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Offered,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl TaskStatus {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Pending, Offered) | (Pending, Accepted) | (Pending, Cancelled) |
            // Re-allocation re-offers an already offered task
            (Offered, Offered) | (Offered, Accepted) | (Offered, Cancelled) |
            (Accepted, InProgress) | (Accepted, Cancelled) |
            (InProgress, Completed) | (InProgress, Failed)
        )
    }

    /// Whether new offers may be made and accepted for the task.
    pub fn is_offerable(&self) -> bool {
        matches!(self, Self::Pending | Self::Offered)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Offered => "offered",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A unit of field work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub task_type: TaskType,
    pub pickup: Option<Address>,
    pub dropoff: Address,
    pub total_weight_kg: f64,
    /// Cash to collect from the customer, zero when prepaid.
    pub collection_amount: Decimal,
    pub status: TaskStatus,
    pub assigned_worker_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a pending task with only a dropoff address.
    pub fn new(task_type: TaskType, dropoff: Address) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type,
            pickup: None,
            dropoff,
            total_weight_kg: 0.0,
            collection_amount: Decimal::ZERO,
            status: TaskStatus::Pending,
            assigned_worker_id: None,
            assigned_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_pickup(mut self, pickup: Address) -> Self {
        self.pickup = Some(pickup);
        self
    }

    pub fn with_weight(mut self, kg: f64) -> Self {
        self.total_weight_kg = kg;
        self
    }

    pub fn with_collection(mut self, amount: Decimal) -> Self {
        self.collection_amount = amount;
        self
    }

    /// Where the worker has to go first: the pickup if any, else the dropoff.
    pub fn location(&self) -> GeoPoint {
        self.pickup
            .as_ref()
            .map(|a| a.location)
            .unwrap_or(self.dropoff.location)
    }

    pub fn is_weight_bearing(&self) -> bool {
        self.total_weight_kg > 0.0
    }

    pub fn requires_cash_collection(&self) -> bool {
        self.collection_amount > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn dropoff() -> Address {
        Address::new("12 Marina Rd", GeoPoint::new(6.45, 3.39))
    }

    #[test]
    fn location_prefers_pickup() {
        let task = Task::new(TaskType::Delivery, dropoff());
        assert_eq!(task.location(), GeoPoint::new(6.45, 3.39));

        let task = task.with_pickup(Address::new("Warehouse 4", GeoPoint::new(6.50, 3.35)));
        assert_eq!(task.location(), GeoPoint::new(6.50, 3.35));
    }

    #[test]
    fn engine_owned_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Offered));
        assert!(TaskStatus::Offered.can_transition_to(TaskStatus::Offered));
        assert!(TaskStatus::Offered.can_transition_to(TaskStatus::Accepted));
        assert!(!TaskStatus::Accepted.can_transition_to(TaskStatus::Offered));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Offered));
    }

    #[test]
    fn offerable_states() {
        assert!(TaskStatus::Pending.is_offerable());
        assert!(TaskStatus::Offered.is_offerable());
        assert!(!TaskStatus::Accepted.is_offerable());
        assert!(!TaskStatus::InProgress.is_offerable());
    }

    #[test]
    fn cash_collection_flag() {
        let task = Task::new(TaskType::Collection, dropoff());
        assert!(!task.requires_cash_collection());
        let task = task.with_collection(dec!(2500.00));
        assert!(task.requires_cash_collection());
    }

    #[test]
    fn task_status_display() {
        assert_eq!(TaskStatus::InProgress.to_string(), "in_progress");
        let json = serde_json::to_string(&TaskStatus::Offered).unwrap();
        assert_eq!(json, "\"offered\"");
    }
}
