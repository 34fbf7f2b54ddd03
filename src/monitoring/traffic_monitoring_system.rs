use crate::shared_data::{StatusRecord, StatusSnapshot};
use plotters::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Per-road figures over a whole status history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadSummary {
    pub road_name: String,
    pub samples: usize,
    pub green_samples: usize,
    pub emergency_samples: usize,
    pub average_vehicle_count: f64,
    pub max_vehicle_count: f64,
    pub average_green_time: f64,
}

// Generic helper to append records to a CSV file, writing headers only for a new file.
fn log_to_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<(), Box<dyn Error>> {
    let file_exists = path.exists() && path.metadata()?.len() > 0;
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Appends one row per road for `snapshot`.
pub fn log_status(path: &Path, snapshot: &StatusSnapshot) -> Result<(), Box<dyn Error>> {
    log_to_csv(path, &snapshot.records())
}

pub fn read_status_records(path: &Path) -> Result<Vec<StatusRecord>, Box<dyn Error>> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: StatusRecord = result?;
        records.push(record);
    }
    Ok(records)
}

/// Summaries in first-seen road order.
pub fn summarize(records: &[StatusRecord]) -> Vec<RoadSummary> {
    let mut order: Vec<u32> = Vec::new();
    let mut grouped: BTreeMap<u32, Vec<&StatusRecord>> = BTreeMap::new();
    for record in records {
        if !grouped.contains_key(&record.road_id) {
            order.push(record.road_id);
        }
        grouped.entry(record.road_id).or_default().push(record);
    }

    order
        .iter()
        .filter_map(|id| grouped.get(id))
        .map(|rows| {
            let samples = rows.len();
            let total_count: f64 = rows.iter().map(|r| r.vehicle_count).sum();
            let total_green: f64 = rows.iter().map(|r| r.green_time).sum();
            RoadSummary {
                road_name: rows[0].road_name.clone(),
                samples,
                green_samples: rows.iter().filter(|r| r.is_green).count(),
                emergency_samples: rows.iter().filter(|r| r.has_emergency_vehicle).count(),
                average_vehicle_count: total_count / samples as f64,
                max_vehicle_count: rows.iter().map(|r| r.vehicle_count).fold(0.0, f64::max),
                average_green_time: total_green / samples as f64,
            }
        })
        .collect()
}

/// Line chart of vehicle count per road over the recorded history.
pub fn render_demand_chart(records: &[StatusRecord], output: &Path) -> Result<(), Box<dyn Error>> {
    if records.is_empty() {
        println!("No status records to plot.");
        return Ok(());
    }

    let start = records.iter().map(|r| r.timestamp).min().unwrap_or(0);
    let mut series: BTreeMap<(u32, String), Vec<(f64, f64)>> = BTreeMap::new();
    for r in records {
        let t = r.timestamp.saturating_sub(start) as f64 / 1000.0;
        series
            .entry((r.road_id, r.road_name.clone()))
            .or_default()
            .push((t, r.vehicle_count));
    }
    let max_t = series
        .values()
        .flatten()
        .map(|(t, _)| *t)
        .fold(1.0, f64::max);
    let max_count = records
        .iter()
        .map(|r| r.vehicle_count)
        .fold(1.0, f64::max);

    let backend = BitMapBackend::new(output, (1024, 600));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Vehicle Count per Road", ("sans-serif", 20))
        .margin(40)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..max_t, 0.0..max_count * 1.1)?;

    chart
        .configure_mesh()
        .x_desc("Seconds since first sample")
        .y_desc("Vehicles")
        .draw()?;

    for (idx, ((_, name), points)) in series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        chart
            .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
            .label(name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    println!("Demand chart saved to {}", output.display());
    Ok(())
}
