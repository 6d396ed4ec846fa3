//! Per-sensor actions: watering marks and custom names.

use chrono::Utc;

use plantwatch_core::{Coordinator, DeviceId, MoistureSensor};

use crate::cli::{GlobalOpts, RenameArgs};
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(sensor: &MoistureSensor, color: bool) -> String {
    let watered = if sensor.is_just_watered { "yes" } else { "no" };
    format!(
        "{} (#{})\n  Status:       {}\n  Moisture:     {}\n  Battery:      {}\n  Last reading: {}\n  Watered:      {watered}",
        sensor.display_name(),
        sensor.id,
        output::paint_status(sensor.status, color),
        sensor.moisture_percentage(),
        sensor.battery_percentage(),
        sensor.last_activity_relative(Utc::now()),
    )
}

fn print_sensor(sensor: &MoistureSensor, global: &GlobalOpts) {
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        sensor,
        |s| detail(s, color),
        |s| format!("{}\t{}\t{}", s.id, s.status, s.display_name()),
    );
    output::print_output(&out, global.quiet);
}

/// Refresh and make sure the hub still reports this sensor.
async fn existing_sensor(coordinator: &Coordinator, id: DeviceId) -> Result<MoistureSensor, CliError> {
    coordinator.refresh().await?;
    util::find_sensor(coordinator, id)
}

pub async fn water(coordinator: &Coordinator, id: i64, global: &GlobalOpts) -> Result<(), CliError> {
    let id = DeviceId(id);
    let before = existing_sensor(coordinator, id).await?;
    if !before.can_mark_watered() && !global.quiet {
        eprintln!(
            "note: {} reads {}, marking it anyway",
            before.display_name(),
            before.status.label()
        );
    }

    coordinator.mark_just_watered(id)?.await??;
    print_sensor(&util::find_sensor(coordinator, id)?, global);
    Ok(())
}

pub async fn unwater(
    coordinator: &Coordinator,
    id: i64,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = DeviceId(id);
    coordinator.clear_just_watered(id)?.await??;
    print_sensor(&util::find_sensor(coordinator, id)?, global);
    Ok(())
}

pub async fn rename(
    coordinator: &Coordinator,
    args: RenameArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = DeviceId(args.id);
    existing_sensor(coordinator, id).await?;

    coordinator.set_custom_name(id, args.name)?.await??;
    print_sensor(&util::find_sensor(coordinator, id)?, global);
    Ok(())
}
