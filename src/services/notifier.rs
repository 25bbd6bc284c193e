//! Worker notifier: pushes offers and task updates to worker devices.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Task, TaskOffer, TaskStatus};
use crate::error::NotifyError;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

#[async_trait]
pub trait WorkerNotifier: Send + Sync {
    async fn push_offer(
        &self,
        worker_id: Uuid,
        offer: &TaskOffer,
        task: &Task,
    ) -> Result<(), NotifyError>;

    async fn push_task_update(
        &self,
        worker_id: Uuid,
        task: &Task,
        message: &str,
    ) -> Result<(), NotifyError>;
}

/// Events delivered to worker-facing push gateways.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// A new offer for the worker to accept or decline.
    Offer { worker_id: Uuid, offer: TaskOffer },
    /// Something changed about a task the worker was involved with.
    TaskUpdate {
        worker_id: Uuid,
        task_id: Uuid,
        status: TaskStatus,
        message: String,
    },
}

impl WorkerEvent {
    pub fn worker_id(&self) -> Uuid {
        match self {
            Self::Offer { worker_id, .. } | Self::TaskUpdate { worker_id, .. } => *worker_id,
        }
    }
}

/// In-process notifier that fans events out over a broadcast channel to any
/// number of subscribers (push gateways, simulators, tests).
pub struct BroadcastNotifier {
    tx: broadcast::Sender<WorkerEvent>,
}

impl BroadcastNotifier {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self { tx })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl WorkerNotifier for BroadcastNotifier {
    async fn push_offer(
        &self,
        worker_id: Uuid,
        offer: &TaskOffer,
        _task: &Task,
    ) -> Result<(), NotifyError> {
        debug!(worker_id = %worker_id, offer_id = %offer.id, "Pushing offer");
        // ok if no subscribers are listening yet
        let _ = self.tx.send(WorkerEvent::Offer {
            worker_id,
            offer: offer.clone(),
        });
        Ok(())
    }

    async fn push_task_update(
        &self,
        worker_id: Uuid,
        task: &Task,
        message: &str,
    ) -> Result<(), NotifyError> {
        debug!(worker_id = %worker_id, task_id = %task.id, note = message, "Pushing task update");
        let _ = self.tx.send(WorkerEvent::TaskUpdate {
            worker_id,
            task_id: task.id,
            status: task.status,
            message: message.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{Address, GeoPoint, TaskType};

    #[tokio::test]
    async fn subscribers_receive_offers_and_updates() {
        let notifier = BroadcastNotifier::new();
        let mut rx = notifier.subscribe();

        let task = Task::new(TaskType::Survey, Address::new("Shop 3", GeoPoint::new(6.5, 3.4)));
        let worker_id = Uuid::new_v4();
        let offer = TaskOffer::new(task.id, worker_id, Utc::now(), chrono::Duration::seconds(30));

        notifier.push_offer(worker_id, &offer, &task).await.unwrap();
        notifier
            .push_task_update(worker_id, &task, "taken by another worker")
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            WorkerEvent::Offer { offer: got, .. } => assert_eq!(got.id, offer.id),
            other => panic!("Expected Offer, got {other:?}"),
        }
        let update = rx.recv().await.unwrap();
        assert_eq!(update.worker_id(), worker_id);
        assert!(matches!(update, WorkerEvent::TaskUpdate { .. }));
    }

    #[tokio::test]
    async fn push_without_subscribers_succeeds() {
        let notifier = BroadcastNotifier::new();
        let task = Task::new(TaskType::Survey, Address::new("Shop 3", GeoPoint::new(6.5, 3.4)));
        assert!(
            notifier
                .push_task_update(Uuid::new_v4(), &task, "hello")
                .await
                .is_ok()
        );
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = WorkerEvent::TaskUpdate {
            worker_id: Uuid::nil(),
            task_id: Uuid::nil(),
            status: TaskStatus::Accepted,
            message: "taken".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task_update");
        assert_eq!(json["status"], "accepted");
    }
}
