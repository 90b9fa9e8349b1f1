//! Development server for the bank simulation API
//!
//! Spawns the API against a fresh database, loads a small demo dataset and
//! then keeps the mocked clock in step with real time.
//!
//! Usage: cargo run -p dev-server

use anyhow::Result;
use jiff::Timestamp;
use std::time::Duration;
use test_helpers::mock::DevDataset;
use tokio::time::interval;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let subscriber = api::telemetry::get_subscriber("info".into());
    api::telemetry::init_subscriber(subscriber);

    info!("🚀 Starting bank simulation development server");

    let app = test_helpers::spawn_app().await;
    info!("✅ API server running on http://127.0.0.1:{}", app.port);

    info!("📊 Loading demo data...");
    let dataset = DevDataset::create(&app).await?;

    start_time_sync_task(&app);

    info!("🎯 Development server ready!");
    info!("   API: http://127.0.0.1:{}/api", app.port);
    dataset.print_summary();
    info!("👋 Press Ctrl+C to shutdown");

    tokio::signal::ctrl_c().await?;
    info!("🛑 Shutting down development server");
    Ok(())
}

/// Daily limits are windowed on the mocked clock, so it has to follow real
/// time once the dataset is in place.
fn start_time_sync_task(app: &test_helpers::TestApp) {
    let time_source = app.time_source.clone();

    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            time_source.set(Timestamp::now());
        }
    });
}
