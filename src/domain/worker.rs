//! Gig worker profile, as read from the worker-profile service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::TaskType;

/// Vehicle type assumed for ETA purposes when a worker has no vehicle on file.
pub const DEFAULT_VEHICLE_TYPE: &str = "motorcycle";

/// Kind of field agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerType {
    Driver,
    Rider,
    Cyclist,
    Collector,
    Surveyor,
    Merchandiser,
    Walker,
}

impl std::fmt::Display for WorkerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Driver => "driver",
            Self::Rider => "rider",
            Self::Cyclist => "cyclist",
            Self::Collector => "collector",
            Self::Surveyor => "surveyor",
            Self::Merchandiser => "merchandiser",
            Self::Walker => "walker",
        };
        write!(f, "{s}")
    }
}

/// Account standing of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Active,
    Inactive,
    Suspended,
    Deactivated,
}

/// KYC outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

/// Live availability as reported by the worker's app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerAvailability {
    Online,
    Offline,
    Busy,
}

impl std::fmt::Display for WorkerAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
            Self::Busy => write!(f, "busy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_type: String,
    pub capacity_kg: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPreferences {
    /// Empty means any task type is fine.
    pub preferred_types: Vec<TaskType>,
    /// Whether the worker is willing to collect cash on delivery.
    pub accept_cod: bool,
}

/// A field agent profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GigWorker {
    pub id: Uuid,
    pub name: String,
    pub worker_type: WorkerType,
    pub status: WorkerStatus,
    pub verification_status: VerificationStatus,
    /// Average rating in [0, 5].
    pub rating: f64,
    pub completed_tasks: u32,
    /// Fraction of offers accepted, in [0, 1].
    pub acceptance_rate: f64,
    /// Fraction of tasks completed on time, in [0, 1].
    pub on_time_rate: f64,
    pub vehicle: Option<Vehicle>,
    pub preferences: TaskPreferences,
}

impl GigWorker {
    /// A fresh, approved, active worker with neutral performance figures.
    pub fn new(name: impl Into<String>, worker_type: WorkerType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            worker_type,
            status: WorkerStatus::Active,
            verification_status: VerificationStatus::Approved,
            rating: 4.0,
            completed_tasks: 0,
            acceptance_rate: 0.8,
            on_time_rate: 0.8,
            vehicle: None,
            preferences: TaskPreferences::default(),
        }
    }

    pub fn with_vehicle(mut self, vehicle_type: impl Into<String>, capacity_kg: f64) -> Self {
        self.vehicle = Some(Vehicle {
            vehicle_type: vehicle_type.into(),
            capacity_kg,
        });
        self
    }

    pub fn vehicle_type(&self) -> &str {
        self.vehicle
            .as_ref()
            .map(|v| v.vehicle_type.as_str())
            .unwrap_or(DEFAULT_VEHICLE_TYPE)
    }

    pub fn accepts_task_type(&self, task_type: TaskType) -> bool {
        self.preferences.preferred_types.is_empty()
            || self.preferences.preferred_types.contains(&task_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_preferences_accept_everything() {
        let worker = GigWorker::new("Ada", WorkerType::Rider);
        assert!(worker.accepts_task_type(TaskType::Delivery));
        assert!(worker.accepts_task_type(TaskType::Survey));
    }

    #[test]
    fn preferences_restrict_task_types() {
        let mut worker = GigWorker::new("Ada", WorkerType::Rider);
        worker.preferences.preferred_types = vec![TaskType::Collection];
        assert!(worker.accepts_task_type(TaskType::Collection));
        assert!(!worker.accepts_task_type(TaskType::Delivery));
    }

    #[test]
    fn vehicle_type_defaults_to_motorcycle() {
        let worker = GigWorker::new("Ada", WorkerType::Rider);
        assert_eq!(worker.vehicle_type(), "motorcycle");
        let worker = worker.with_vehicle("van", 800.0);
        assert_eq!(worker.vehicle_type(), "van");
    }

    #[test]
    fn worker_type_serde() {
        let json = serde_json::to_string(&WorkerType::Merchandiser).unwrap();
        assert_eq!(json, "\"merchandiser\"");
        assert_eq!(WorkerType::Merchandiser.to_string(), "merchandiser");
    }
}
