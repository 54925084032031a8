use std::sync::Arc;

use clap::Parser;

use offer_scheduler::cli::Cli;
use offer_scheduler::config::SchedulerConfig;
use offer_scheduler::scheduler::collaborators::{
    FixedRescheduleCalculator, InMemoryStorage, JitteredReturnDelay, NullDriver, NullMaintenanceController, NullPreemptor,
};
use offer_scheduler::{logger, Scheduler};

mod demo_assigner;

use demo_assigner::AlwaysAssign;

/// Demonstrates wiring the three core components with in-memory/test-double collaborators,
/// since real Storage/Driver/MaintenanceController/Assigner/Preemptor implementations are out
/// of scope for this crate.
#[tokio::main]
async fn main() {
    logger::init();

    let config: SchedulerConfig = Cli::parse().into();
    log::info!("starting offer-scheduler with config {config:?}");

    let storage = Arc::new(InMemoryStorage::new());
    let reschedule_calculator = Arc::new(FixedRescheduleCalculator { delay_ms: 1 });
    let return_delay = Arc::new(JitteredReturnDelay::new(
        std::time::Duration::from_secs(config.return_delay_base_secs),
        std::time::Duration::from_millis(config.return_delay_jitter_ms),
    ));

    let scheduler = Scheduler::new(
        &config,
        storage,
        Arc::new(NullDriver),
        Arc::new(NullMaintenanceController),
        Arc::new(AlwaysAssign),
        Arc::new(NullPreemptor),
        reschedule_calculator,
        return_delay,
    );

    log::info!(
        "scheduler online: {} offers held, {} reservations cached",
        scheduler.offer_queue.len(),
        scheduler.reservation_cache_size()
    );

    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    log::info!("shutting down");
}
