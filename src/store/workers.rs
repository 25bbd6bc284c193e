//! In-memory worker repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{GeoPoint, GigWorker, WorkerType};
use crate::error::StoreError;

use super::traits::{WorkerPositions, WorkerRepository};

/// Worker profiles held in memory. Radius queries read online positions
/// from `positions`, the way a database fed by the same heartbeat ingester
/// would.
pub struct InMemoryWorkerRepository {
    workers: RwLock<HashMap<Uuid, GigWorker>>,
    positions: Arc<dyn WorkerPositions>,
}

impl InMemoryWorkerRepository {
    pub fn new(positions: Arc<dyn WorkerPositions>) -> Self {
        Self {
            workers: RwLock::new(HashMap::new()),
            positions,
        }
    }

    /// Insert or replace a worker profile.
    pub async fn upsert(&self, worker: GigWorker) {
        debug!(worker_id = %worker.id, worker_type = %worker.worker_type, "Worker profile stored");
        self.workers.write().await.insert(worker.id, worker);
    }

    pub async fn len(&self) -> usize {
        self.workers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workers.read().await.is_empty()
    }
}

#[async_trait]
impl WorkerRepository for InMemoryWorkerRepository {
    async fn get_worker(&self, id: Uuid) -> Result<Option<GigWorker>, StoreError> {
        Ok(self.workers.read().await.get(&id).cloned())
    }

    async fn find_online_within_radius(
        &self,
        center: GeoPoint,
        radius_km: f64,
        types: &[WorkerType],
    ) -> Result<Vec<GigWorker>, StoreError> {
        let online = self.positions.online_positions().await;
        let workers = self.workers.read().await;

        let mut found: Vec<GigWorker> = online
            .iter()
            .filter(|(_, loc)| loc.distance_km(&center) <= radius_km)
            .filter_map(|(id, _)| workers.get(id))
            .filter(|w| types.contains(&w.worker_type))
            .cloned()
            .collect();
        found.sort_by_key(|w| w.id);

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed set of online positions.
    struct StaticPositions(Vec<(Uuid, GeoPoint)>);

    #[async_trait]
    impl WorkerPositions for StaticPositions {
        async fn online_positions(&self) -> Vec<(Uuid, GeoPoint)> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn radius_query_filters_type_distance_and_presence() {
        let center = GeoPoint::new(6.5, 3.4);

        let near_rider = GigWorker::new("near rider", WorkerType::Rider);
        let far_rider = GigWorker::new("far rider", WorkerType::Rider);
        let near_walker = GigWorker::new("near walker", WorkerType::Walker);
        let offline_rider = GigWorker::new("offline rider", WorkerType::Rider);

        let positions = StaticPositions(vec![
            (near_rider.id, GeoPoint::new(6.51, 3.4)),
            (far_rider.id, GeoPoint::new(7.5, 3.4)),
            (near_walker.id, GeoPoint::new(6.5, 3.41)),
        ]);
        let repo = InMemoryWorkerRepository::new(Arc::new(positions));

        for w in [&near_rider, &far_rider, &near_walker, &offline_rider] {
            repo.upsert(w.clone()).await;
        }

        let found = repo
            .find_online_within_radius(center, 10.0, &[WorkerType::Rider, WorkerType::Driver])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, near_rider.id);
    }

    #[tokio::test]
    async fn get_worker_returns_none_for_unknown() {
        let repo = InMemoryWorkerRepository::new(Arc::new(StaticPositions(Vec::new())));
        assert!(repo.get_worker(Uuid::new_v4()).await.unwrap().is_none());
        assert!(repo.is_empty().await);
    }
}
