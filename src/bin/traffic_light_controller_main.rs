// traffic_light_controller_main.rs
use adaptive_signal::config::{load_config, IntersectionConfig};
use adaptive_signal::control_system::{run_until, RuntimeSettings, TrafficLightController};
use adaptive_signal::detection::{CsvFrameDetector, Detector};
use adaptive_signal::models::demand::RandomNoise;
use adaptive_signal::storage::{CsvRoadStore, MemoryRoadStore, RoadStore};
use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() {
    env_logger::init();
    println!("Starting traffic light controller...");
    if let Err(e) = run().await {
        eprintln!("Controller error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    // Optional path to an intersection JSON file; the built-in four roads otherwise.
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(path)?,
        None => IntersectionConfig::default(),
    }
    .with_default_status_log();

    match config.store_path.clone() {
        Some(path) => run_with_store(&config, CsvRoadStore::open(path)?).await,
        None => run_with_store(&config, MemoryRoadStore::new()).await,
    }
}

async fn run_with_store<S: RoadStore>(
    config: &IntersectionConfig,
    store: S,
) -> Result<(), Box<dyn Error>> {
    let noise = match config.seed {
        Some(seed) => RandomNoise::seeded(seed),
        None => RandomNoise::from_os_rng(),
    };
    let mut controller = TrafficLightController::from_config(config, store, noise, Instant::now())?;
    let detector: Arc<dyn Detector> = Arc::new(CsvFrameDetector::new());

    run_until(
        &mut controller,
        detector,
        RuntimeSettings::from(config),
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("Failed to listen for Ctrl-C: {}", e);
            }
        },
    )
    .await;

    let stats = controller.stats();
    println!(
        "Stopped after {} rotations and {} preemptions.",
        stats.rotations, stats.preemptions
    );
    Ok(())
}
