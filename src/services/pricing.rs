//! Earning calculator: what a worker would be paid for a task.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::{GigWorker, Task, TaskType};
use crate::error::PricingError;

/// Itemised earning for one worker doing one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningBreakdown {
    pub base_earning: Decimal,
    pub distance_earning: Decimal,
    pub weight_earning: Decimal,
    pub surge_multiplier: Decimal,
    pub bonus_earning: Decimal,
    pub total_earning: Decimal,
}

impl EarningBreakdown {
    /// Everything except the bonus, i.e. what the offer shows as base pay.
    pub fn guaranteed(&self) -> Decimal {
        self.total_earning - self.bonus_earning
    }
}

#[async_trait]
pub trait EarningCalculator: Send + Sync {
    async fn calculate(
        &self,
        task: &Task,
        worker: &GigWorker,
        distance_km: f64,
    ) -> Result<EarningBreakdown, PricingError>;
}

/// Static rate card with a capped surge multiplier.
#[derive(Debug, Clone)]
pub struct RateCardPricing {
    pub delivery_base: Decimal,
    pub collection_base: Decimal,
    pub field_visit_base: Decimal,
    pub per_km: Decimal,
    pub per_kg: Decimal,
    pub surge_multiplier: Decimal,
    pub max_surge_multiplier: Decimal,
    /// Paid on top to workers rated at least `top_rated_threshold`.
    pub top_rated_bonus: Decimal,
    pub top_rated_threshold: f64,
}

impl Default for RateCardPricing {
    fn default() -> Self {
        Self {
            delivery_base: dec!(500),
            collection_base: dec!(400),
            field_visit_base: dec!(1000),
            per_km: dec!(100),
            per_kg: dec!(10),
            surge_multiplier: Decimal::ONE,
            max_surge_multiplier: dec!(2.5),
            top_rated_bonus: dec!(150),
            top_rated_threshold: 4.7,
        }
    }
}

impl RateCardPricing {
    pub fn with_surge(mut self, multiplier: Decimal) -> Self {
        self.surge_multiplier = multiplier;
        self
    }

    fn base_for(&self, task_type: TaskType) -> Decimal {
        match task_type {
            TaskType::Delivery => self.delivery_base,
            TaskType::Collection => self.collection_base,
            TaskType::Survey | TaskType::Merchandising => self.field_visit_base,
        }
    }
}

fn to_decimal(task: &Task, what: &str, value: f64) -> Result<Decimal, PricingError> {
    if value < 0.0 {
        return Err(PricingError::InvalidInput {
            task_id: task.id,
            reason: format!("negative {what}: {value}"),
        });
    }
    Decimal::from_f64(value).ok_or_else(|| PricingError::InvalidInput {
        task_id: task.id,
        reason: format!("{what} is not representable: {value}"),
    })
}

#[async_trait]
impl EarningCalculator for RateCardPricing {
    async fn calculate(
        &self,
        task: &Task,
        worker: &GigWorker,
        distance_km: f64,
    ) -> Result<EarningBreakdown, PricingError> {
        let distance = to_decimal(task, "distance", distance_km)?;
        let weight = to_decimal(task, "weight", task.total_weight_kg)?;

        let base_earning = self.base_for(task.task_type);
        let distance_earning = (self.per_km * distance).round_dp(2);
        let weight_earning = (self.per_kg * weight).round_dp(2);
        let surge_multiplier = self
            .surge_multiplier
            .max(Decimal::ONE)
            .min(self.max_surge_multiplier);

        let bonus_earning = if worker.rating >= self.top_rated_threshold {
            self.top_rated_bonus
        } else {
            Decimal::ZERO
        };

        let subtotal = (base_earning + distance_earning + weight_earning) * surge_multiplier;
        let total_earning = (subtotal + bonus_earning).round_dp(2);

        Ok(EarningBreakdown {
            base_earning,
            distance_earning,
            weight_earning,
            surge_multiplier,
            bonus_earning,
            total_earning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, GeoPoint, WorkerType};

    fn delivery(weight: f64) -> Task {
        Task::new(TaskType::Delivery, Address::new("dropoff", GeoPoint::new(6.45, 3.39)))
            .with_weight(weight)
    }

    #[tokio::test]
    async fn rate_card_breakdown() {
        let pricing = RateCardPricing::default();
        let worker = GigWorker::new("Ada", WorkerType::Rider);

        let e = pricing.calculate(&delivery(5.0), &worker, 2.5).await.unwrap();
        assert_eq!(e.base_earning, dec!(500));
        assert_eq!(e.distance_earning, dec!(250));
        assert_eq!(e.weight_earning, dec!(50));
        assert_eq!(e.bonus_earning, Decimal::ZERO);
        assert_eq!(e.total_earning, dec!(800));
        assert_eq!(e.guaranteed(), dec!(800));
    }

    #[tokio::test]
    async fn surge_is_capped_and_bonus_added() {
        let pricing = RateCardPricing::default().with_surge(dec!(4));
        let mut worker = GigWorker::new("Ada", WorkerType::Rider);
        worker.rating = 4.9;

        let e = pricing.calculate(&delivery(0.0), &worker, 1.0).await.unwrap();
        assert_eq!(e.surge_multiplier, dec!(2.5));
        // (500 + 100) * 2.5 + 150
        assert_eq!(e.total_earning, dec!(1650));
        assert_eq!(e.guaranteed(), dec!(1500));
    }

    #[tokio::test]
    async fn negative_distance_is_rejected() {
        let pricing = RateCardPricing::default();
        let worker = GigWorker::new("Ada", WorkerType::Rider);
        let err = pricing
            .calculate(&delivery(1.0), &worker, -1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::InvalidInput { .. }));
    }
}
