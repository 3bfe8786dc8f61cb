//! Procurement relay service
//!
//! Serves the library API, runs the relay cycle on a fixed period and
//! applies procured books arriving on the subscribed category topics.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use procurement_relay::api::{self, AppState, HealthState, HealthStatus};
use procurement_relay::broker::{KafkaChannel, MessageChannel, OrderEnqueuer, QueueDrainer};
use procurement_relay::catalog::{ArrivalListener, BookCatalog, InMemoryCatalog};
use procurement_relay::config::Config;
use procurement_relay::error::Result;
use procurement_relay::logging;
use procurement_relay::procurement::HttpProcurementClient;
use procurement_relay::relay::{
    CategoryRouter, JobSettings, ProcurementJob, Scheduler, RELAY_COMPONENT,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::from_env()?);
    config.validate()?;

    logging::init_tracing(&config.server)?;
    config.log_config();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting procurement relay");

    let channel: Arc<dyn MessageChannel> = Arc::new(KafkaChannel::new(config.broker.clone()));
    let catalog: Arc<dyn BookCatalog> = Arc::new(InMemoryCatalog::seeded());
    let health = Arc::new(HealthState::new());
    health
        .update_component(
            RELAY_COMPONENT,
            HealthStatus::Healthy,
            Some("waiting for first cycle".to_string()),
        )
        .await;

    let job = ProcurementJob::new(
        QueueDrainer::new(channel.clone()),
        Arc::new(HttpProcurementClient::new(&config.procurement)?),
        CategoryRouter::from_config(channel.clone(), &config.broker),
        JobSettings {
            library_id: config.library.library_id.clone(),
            orders_queue: config.broker.orders_queue.clone(),
            idle_timeout: config.broker.idle_receive_timeout(),
        },
    );
    let scheduler = Scheduler::new(
        Arc::new(job),
        config.scheduler.cycle_period(),
        config.scheduler.run_on_startup,
    )
    .with_health(health.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = vec![tokio::spawn(scheduler.run(shutdown_rx.clone()))];

    let topics: Vec<String> = config
        .library
        .categories()?
        .into_iter()
        .map(|category| config.broker.topic_for(category))
        .collect();
    if topics.is_empty() {
        info!("No subscribed categories, arrival listener disabled");
    } else {
        let listener = ArrivalListener::new(
            channel.clone(),
            catalog.clone(),
            config.broker.idle_receive_timeout(),
        );
        tasks.extend(listener.spawn(topics, shutdown_rx));
    }

    let state = AppState {
        catalog,
        enqueuer: OrderEnqueuer::new(channel, config.broker.orders_queue.clone()),
        health,
        library_id: config.library.library_id.clone(),
    };

    let signal = async move {
        api::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };
    api::create_server(config.clone(), state, signal).await?;

    let background = futures::future::join_all(tasks);
    if tokio::time::timeout(config.server.shutdown_timeout(), background)
        .await
        .is_err()
    {
        warn!("Background tasks did not stop within the shutdown timeout");
    }

    info!("Procurement relay shutdown complete");
    Ok(())
}
