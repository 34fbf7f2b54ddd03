use adaptive_signal::global_variables::{DEMAND_CHART_FILE, STATUS_LOG_FILE};
use adaptive_signal::monitoring::traffic_monitoring_system::{
    read_status_records, render_demand_chart, summarize,
};
use std::error::Error;
use std::path::PathBuf;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Report error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let status_file = PathBuf::from(args.next().unwrap_or_else(|| STATUS_LOG_FILE.to_string()));
    let chart_file = PathBuf::from(args.next().unwrap_or_else(|| DEMAND_CHART_FILE.to_string()));

    let records = read_status_records(&status_file)?;
    println!("Read {} status rows from {}", records.len(), status_file.display());

    for road in summarize(&records) {
        println!(
            "{}: {} samples, green {:.0}%, emergency in {} samples, vehicles avg {:.1} / max {:.1}, green time avg {:.1} s",
            road.road_name,
            road.samples,
            100.0 * road.green_samples as f64 / road.samples as f64,
            road.emergency_samples,
            road.average_vehicle_count,
            road.max_vehicle_count,
            road.average_green_time
        );
    }

    render_demand_chart(&records, &chart_file)
}
