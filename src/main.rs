use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal_macros::dec;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use gig_dispatch::allocation::{
    AllocationEngine, AllocationStrategy, EngineDeps, WorkerStateRegistry, spawn_expiry_task,
};
use gig_dispatch::config::AllocationConfig;
use gig_dispatch::domain::{
    Address, GeoPoint, GigWorker, Task, TaskType, WorkerAvailability, WorkerType,
};
use gig_dispatch::error::Result;
use gig_dispatch::services::{BroadcastNotifier, HaversineGeo, RateCardPricing, WorkerEvent};
use gig_dispatch::store::{
    InMemoryOfferRepository, InMemoryTaskRepository, InMemoryWorkerRepository, TaskRepository,
};

/// Centre of the simulated service area (Lagos mainland).
const CITY_CENTRE: GeoPoint = GeoPoint {
    latitude: 6.5244,
    longitude: 3.3792,
};

/// Share of offers the simulated workers accept.
const ACCEPT_PROBABILITY: f64 = 0.7;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = load_config().context("invalid allocation config")?;

    eprintln!("Gig dispatch v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Offer timeout: {:?}", config.offer_timeout);
    eprintln!("   Max concurrent offers: {}", config.max_concurrent_offers);
    eprintln!("   Search radius: {} km\n", config.max_worker_distance_km);

    // ── Collaborators ────────────────────────────────────────────────────
    let registry = Arc::new(WorkerStateRegistry::new());
    let workers = Arc::new(InMemoryWorkerRepository::new(registry.clone()));
    let tasks = Arc::new(InMemoryTaskRepository::new());
    let offers = Arc::new(InMemoryOfferRepository::new());
    let notifier = BroadcastNotifier::new();

    let engine = AllocationEngine::new(
        config,
        EngineDeps {
            workers: workers.clone(),
            tasks: tasks.clone(),
            offers: offers.clone(),
            geo: Arc::new(HaversineGeo::new()),
            pricing: Arc::new(RateCardPricing::default().with_surge(dec!(1.2))),
            notifier: notifier.clone(),
            registry,
        },
    );

    // ── Simulated fleet ──────────────────────────────────────────────────
    let mut rng = StdRng::seed_from_u64(7);
    for (i, worker) in seed_fleet().into_iter().enumerate() {
        let location = GeoPoint::new(
            CITY_CENTRE.latitude + rng.gen_range(-0.04..0.04),
            CITY_CENTRE.longitude + rng.gen_range(-0.04..0.04),
        );
        let worker_id = worker.id;
        workers.upsert(worker).await;
        engine.update_worker_location(worker_id, location).await;
        // leave one worker offline so discovery has something to skip
        if i != 0 {
            engine
                .set_worker_availability(worker_id, WorkerAvailability::Online)
                .await;
        }
    }

    let responder = spawn_simulated_responses(Arc::clone(&engine), notifier.subscribe());
    let sweeper = spawn_expiry_task(Arc::clone(&engine));

    // ── Tasks ────────────────────────────────────────────────────────────
    let jobs = vec![
        (
            Task::new(TaskType::Delivery, address("12 Allen Avenue, Ikeja", 0.01, 0.005))
                .with_pickup(address("Balogun Market", -0.005, 0.0))
                .with_weight(4.5),
            AllocationStrategy::Nearest,
        ),
        (
            Task::new(TaskType::Delivery, address("Adeniran Ogunsanya St", 0.02, -0.01))
                .with_weight(25.0),
            AllocationStrategy::Broadcast,
        ),
        (
            Task::new(TaskType::Collection, address("Mama Nkechi Provisions", -0.01, 0.01))
                .with_collection(dec!(18500)),
            AllocationStrategy::Broadcast,
        ),
        (
            Task::new(TaskType::Survey, address("Yaba Tech Gate", 0.0, 0.02)),
            AllocationStrategy::AiOptimized,
        ),
        (
            Task::new(TaskType::Merchandising, address("Shoprite Surulere", -0.02, -0.01)),
            AllocationStrategy::Nearest,
        ),
    ];

    let mut task_ids = Vec::with_capacity(jobs.len());
    for (task, strategy) in jobs {
        let task_id = task.id;
        tasks.insert(task).await;
        task_ids.push(task_id);

        match engine.allocate_task(task_id, strategy).await {
            Ok(result) => info!(
                task_id = %task_id,
                strategy = %strategy,
                success = result.success,
                offers_created = result.offers_created,
                "Allocation returned"
            ),
            Err(e) => warn!(task_id = %task_id, error = %e, "Allocation failed"),
        }
    }

    // Give simulated workers time to respond and re-allocations to settle.
    tokio::time::sleep(Duration::from_millis(500)).await;

    print_task_table(tasks.as_ref(), &task_ids).await?;

    let stats = engine.stats();
    eprintln!("\n{}", serde_json::to_string_pretty(&stats)?);

    responder.abort();
    sweeper.abort();
    Ok(())
}

fn load_config() -> Result<AllocationConfig> {
    let config = AllocationConfig::from_env();
    config.validate()?;
    Ok(config)
}

async fn print_task_table(tasks: &dyn TaskRepository, task_ids: &[Uuid]) -> Result<()> {
    for task_id in task_ids {
        if let Some(task) = tasks.get_task(*task_id).await? {
            eprintln!(
                "   {} {:<13} {:<9} worker={}",
                task.id,
                task.task_type,
                task.status,
                task.assigned_worker_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }
    Ok(())
}

fn address(line: &str, dlat: f64, dlng: f64) -> Address {
    Address::new(
        line,
        GeoPoint::new(CITY_CENTRE.latitude + dlat, CITY_CENTRE.longitude + dlng),
    )
}

fn seed_fleet() -> Vec<GigWorker> {
    let mut fleet = vec![
        GigWorker::new("Tunde", WorkerType::Rider).with_vehicle("motorcycle", 20.0),
        GigWorker::new("Chioma", WorkerType::Rider).with_vehicle("motorcycle", 30.0),
        GigWorker::new("Emeka", WorkerType::Driver).with_vehicle("van", 800.0),
        GigWorker::new("Aisha", WorkerType::Cyclist).with_vehicle("bicycle", 8.0),
        GigWorker::new("Kunle", WorkerType::Collector).with_vehicle("motorcycle", 15.0),
        GigWorker::new("Ngozi", WorkerType::Surveyor),
        GigWorker::new("Bisi", WorkerType::Merchandiser).with_vehicle("foot", 5.0),
        GigWorker::new("Segun", WorkerType::Walker).with_vehicle("walking", 5.0),
    ];

    // a spread of track records
    let profiles = [
        (4.9, 640, 0.95, 0.97),
        (4.6, 210, 0.88, 0.92),
        (4.2, 90, 0.80, 0.85),
        (3.9, 35, 0.70, 0.75),
        (4.8, 410, 0.90, 0.94),
        (4.4, 120, 0.85, 0.90),
        (4.1, 60, 0.75, 0.80),
        (3.2, 12, 0.60, 0.65),
    ];
    for (worker, (rating, completed, acceptance, on_time)) in fleet.iter_mut().zip(profiles) {
        worker.rating = rating;
        worker.completed_tasks = completed;
        worker.acceptance_rate = acceptance;
        worker.on_time_rate = on_time;
    }
    fleet[4].preferences.accept_cod = true;
    fleet[2].preferences.accept_cod = true;
    fleet
}

/// Answer offers the way a real fleet might: most accept, some decline.
fn spawn_simulated_responses(
    engine: Arc<AllocationEngine>,
    mut events: tokio::sync::broadcast::Receiver<WorkerEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Simulated responder lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let WorkerEvent::Offer { worker_id, offer } = event else {
                continue;
            };

            let think_ms = rand::random::<u64>() % 50;
            tokio::time::sleep(Duration::from_millis(think_ms)).await;

            if rand::random::<f64>() < ACCEPT_PROBABILITY {
                match engine.accept_offer(offer.id, worker_id).await {
                    Ok(task) => info!(task_id = %task.id, worker_id = %worker_id, "Simulated worker accepted"),
                    Err(e) => info!(worker_id = %worker_id, error = %e, "Simulated accept rejected"),
                }
            } else if let Err(e) = engine
                .decline_offer(offer.id, worker_id, Some("too far"))
                .await
            {
                info!(worker_id = %worker_id, error = %e, "Simulated decline rejected");
            }
        }
    })
}
