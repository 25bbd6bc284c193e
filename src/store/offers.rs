//! In-memory offer repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{OfferStatus, TaskOffer};
use crate::error::StoreError;

use super::traits::OfferRepository;

#[derive(Default)]
pub struct InMemoryOfferRepository {
    offers: RwLock<HashMap<Uuid, TaskOffer>>,
}

impl InMemoryOfferRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every offer ever made for a task, any status, oldest first.
    pub async fn offers_for_task(&self, task_id: Uuid) -> Vec<TaskOffer> {
        let offers = self.offers.read().await;
        let mut found: Vec<TaskOffer> = offers
            .values()
            .filter(|o| o.task_id == task_id)
            .cloned()
            .collect();
        found.sort_by_key(|o| o.offered_at);
        found
    }

    pub async fn len(&self) -> usize {
        self.offers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.offers.read().await.is_empty()
    }

    async fn active_where<F>(&self, now: DateTime<Utc>, pred: F) -> Vec<TaskOffer>
    where
        F: Fn(&TaskOffer) -> bool,
    {
        let offers = self.offers.read().await;
        let mut found: Vec<TaskOffer> = offers
            .values()
            .filter(|o| o.is_active_at(now) && pred(o))
            .cloned()
            .collect();
        found.sort_by_key(|o| o.offered_at);
        found
    }
}

#[async_trait]
impl OfferRepository for InMemoryOfferRepository {
    async fn create_offer(&self, offer: &TaskOffer) -> Result<(), StoreError> {
        let mut offers = self.offers.write().await;
        if offers.contains_key(&offer.id) {
            return Err(StoreError::Conflict(format!("offer {} already exists", offer.id)));
        }
        offers.insert(offer.id, offer.clone());
        debug!(offer_id = %offer.id, task_id = %offer.task_id, worker_id = %offer.worker_id, "Offer stored");
        Ok(())
    }

    async fn get_offer(&self, id: Uuid) -> Result<Option<TaskOffer>, StoreError> {
        Ok(self.offers.read().await.get(&id).cloned())
    }

    async fn active_offers_for_task(
        &self,
        task_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskOffer>, StoreError> {
        Ok(self.active_where(now, |o| o.task_id == task_id).await)
    }

    async fn active_offers_for_worker(
        &self,
        worker_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskOffer>, StoreError> {
        Ok(self.active_where(now, |o| o.worker_id == worker_id).await)
    }

    async fn update_offer_status(
        &self,
        id: Uuid,
        status: OfferStatus,
        decline_reason: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut offers = self.offers.write().await;
        let offer = offers.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            entity: "offer".to_string(),
            id: id.to_string(),
        })?;

        if !offer.status.can_transition_to(status) {
            debug!(offer_id = %id, from = %offer.status, to = %status, "Offer already resolved");
            return Ok(false);
        }

        offer.status = status;
        if matches!(status, OfferStatus::Accepted | OfferStatus::Declined) {
            offer.responded_at = Some(Utc::now());
        }
        if let Some(reason) = decline_reason {
            offer.decline_reason = Some(reason.to_string());
        }
        Ok(true)
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<Vec<TaskOffer>, StoreError> {
        let mut offers = self.offers.write().await;
        let mut expired = Vec::new();

        for offer in offers.values_mut() {
            if offer.status == OfferStatus::Pending && offer.is_expired_at(now) {
                offer.status = OfferStatus::Expired;
                expired.push(offer.clone());
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Expired stale offers");
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(task_id: Uuid, ttl_secs: i64) -> TaskOffer {
        TaskOffer::new(task_id, Uuid::new_v4(), Utc::now(), chrono::Duration::seconds(ttl_secs))
    }

    #[tokio::test]
    async fn create_rejects_duplicate_ids() {
        let repo = InMemoryOfferRepository::new();
        let o = offer(Uuid::new_v4(), 30);
        repo.create_offer(&o).await.unwrap();
        assert!(matches!(
            repo.create_offer(&o).await.unwrap_err(),
            StoreError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn status_update_only_leaves_pending_once() {
        let repo = InMemoryOfferRepository::new();
        let o = offer(Uuid::new_v4(), 30);
        repo.create_offer(&o).await.unwrap();

        assert!(
            repo.update_offer_status(o.id, OfferStatus::Declined, Some("too far"))
                .await
                .unwrap()
        );
        assert!(
            !repo
                .update_offer_status(o.id, OfferStatus::Accepted, None)
                .await
                .unwrap()
        );

        let stored = repo.get_offer(o.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OfferStatus::Declined);
        assert_eq!(stored.decline_reason.as_deref(), Some("too far"));
        assert!(stored.responded_at.is_some());
    }

    #[tokio::test]
    async fn active_offers_exclude_expired_and_resolved() {
        let repo = InMemoryOfferRepository::new();
        let task_id = Uuid::new_v4();
        let live = offer(task_id, 30);
        let stale = offer(task_id, -5);
        let declined = offer(task_id, 30);
        let other_task = offer(Uuid::new_v4(), 30);

        for o in [&live, &stale, &declined, &other_task] {
            repo.create_offer(o).await.unwrap();
        }
        repo.update_offer_status(declined.id, OfferStatus::Declined, None)
            .await
            .unwrap();

        let active = repo.active_offers_for_task(task_id, Utc::now()).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, live.id);

        let for_worker = repo
            .active_offers_for_worker(live.worker_id, Utc::now())
            .await
            .unwrap();
        assert_eq!(for_worker.len(), 1);
        assert_eq!(repo.offers_for_task(task_id).await.len(), 3);
    }

    #[tokio::test]
    async fn expire_stale_marks_only_overdue_pending_offers() {
        let repo = InMemoryOfferRepository::new();
        let task_id = Uuid::new_v4();
        let live = offer(task_id, 30);
        let stale = offer(task_id, -5);
        repo.create_offer(&live).await.unwrap();
        repo.create_offer(&stale).await.unwrap();

        let expired = repo.expire_stale(Utc::now()).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stale.id);

        let again = repo.expire_stale(Utc::now()).await.unwrap();
        assert!(again.is_empty());
        let stored = repo.get_offer(stale.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OfferStatus::Expired);
    }
}
