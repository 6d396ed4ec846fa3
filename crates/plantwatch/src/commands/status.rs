//! Status, watch, and connection-test handlers.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tabled::Tabled;

use plantwatch_config::FileSettingsStore;
use plantwatch_core::{
    Coordinator, DeviceFailure, MoistureSensor, MoistureStatus, SettingsStore, StatusSnapshot,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Report shape ─────────────────────────────────────────────────────

/// What `status` and `watch` print for one completed pass.
#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    overall: MoistureStatus,
    refreshed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    sensors: Vec<&'a MoistureSensor>,
    failures: &'a [DeviceFailure],
}

impl<'a> StatusReport<'a> {
    /// Most urgent first; ties keep the hub's order.
    fn from_snapshot(snapshot: &'a StatusSnapshot) -> Self {
        let mut sensors: Vec<&MoistureSensor> = snapshot.sensors.iter().collect();
        sensors.sort_by_key(|sensor| sensor.status.severity());
        Self {
            overall: snapshot.overall,
            refreshed_at: snapshot.completed_at,
            error: snapshot.error.as_ref().map(ToString::to_string),
            sensors,
            failures: &snapshot.device_failures,
        }
    }
}

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Moisture")]
    moisture: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Last Reading")]
    last_reading: String,
}

impl SensorRow {
    fn new(sensor: &MoistureSensor, color: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: sensor.id.to_string(),
            name: sensor.display_name().to_owned(),
            status: output::paint_status(sensor.status, color),
            moisture: sensor.moisture_percentage(),
            battery: sensor.battery_percentage(),
            last_reading: sensor.last_activity_relative(now),
        }
    }
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(
        || "never".to_owned(),
        |at| at.with_timezone(&Local).format("%H:%M:%S").to_string(),
    )
}

fn detail(report: &StatusReport<'_>, color: bool) -> String {
    let now = Utc::now();
    let mut out = format!(
        "Overall: {}   (refreshed {})\n",
        output::paint_status(report.overall, color),
        format_time(report.refreshed_at)
    );
    if let Some(ref error) = report.error {
        let _ = writeln!(out, "Last refresh failed: {error}");
    }
    if report.sensors.is_empty() {
        out.push_str("No moisture sensors found");
    } else {
        let rows: Vec<SensorRow> = report
            .sensors
            .iter()
            .map(|sensor| SensorRow::new(sensor, color, now))
            .collect();
        out.push_str(&output::render_table(&rows));
    }
    out
}

fn plain(report: &StatusReport<'_>) -> String {
    report
        .sensors
        .iter()
        .map(|sensor| {
            format!(
                "{}\t{}\t{}\t{}",
                sensor.id,
                sensor.status,
                sensor.moisture_percentage(),
                sensor.display_name()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_snapshot(snapshot: &StatusSnapshot, global: &GlobalOpts) {
    let color = output::should_color(&global.color);
    let report = StatusReport::from_snapshot(snapshot);
    let out = output::render_single(
        &global.output,
        &report,
        |report| detail(report, color),
        plain,
    );
    output::print_output(&out, global.quiet);

    if !global.quiet {
        for failure in report.failures {
            eprintln!(
                "warning: could not read {} (#{}): {}",
                failure.device_name, failure.device_id, failure.error
            );
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

pub async fn status(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    coordinator.refresh().await?;
    print_snapshot(&coordinator.current_snapshot(), global);
    Ok(())
}

/// Refresh now and on every timer tick, printing each pass, until Ctrl-C.
///
/// A pass that fails for a transient reason is shown and the timer keeps
/// going; missing or rejected credentials end the session.
pub async fn watch(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    let mut updates = coordinator.subscribe();

    if let Err(e) = coordinator.start().await {
        if e.needs_setup() {
            coordinator.shutdown().await;
            return Err(e.into());
        }
    }
    let first = updates.borrow_and_update().clone();
    print_snapshot(&first, global);

    if !global.quiet {
        eprintln!(
            "Refreshing every {} min. Press Ctrl-C to stop.",
            coordinator.refresh_interval().as_secs() / 60
        );
    }

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            changed = updates.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let snapshot = updates.borrow_and_update().clone();
                if let Some(ref e) = snapshot.error {
                    if e.needs_setup() {
                        break Err(e.clone().into());
                    }
                }
                print_snapshot(&snapshot, global);
            }
        }
    };

    coordinator.shutdown().await;
    result
}

pub async fn test(
    coordinator: &Coordinator,
    store: &FileSettingsStore,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let address = store.load_settings().hub_address;
    coordinator.test_connection().await?;
    if !global.quiet {
        eprintln!("Connected to hub at {address}");
    }
    Ok(())
}
