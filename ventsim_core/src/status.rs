//! Ambient status printer: a human-readable snapshot every 15 s. Purely
//! cosmetic — nothing here feeds back into the simulation.

use ventsim_common::codec::{raw_to_percentage, raw_to_pressure, raw_to_temp};
use ventsim_common::consts::{HR_PU1, HR_PX1, HR_TEMPS_BASE};

use crate::equipment::{EquipmentModel, ACTUATOR_NAMES};
use crate::register_store::RegisterStore;

/// Log a one-line summary of sensor readings and running equipment.
pub fn print_status(store: &RegisterStore, equipment: &EquipmentModel) {
    let temps = match store.read_holding(HR_TEMPS_BASE, 7) {
        Ok(t) => t,
        Err(_) => return,
    };
    let px1_raw = store.read_holding_one(HR_PX1).unwrap_or(0);
    let pu1_raw = store.read_holding_one(HR_PU1).unwrap_or(0);

    let running: Vec<&str> = equipment
        .running_indices()
        .into_iter()
        .map(|i| ACTUATOR_NAMES[i])
        .collect();

    tracing::info!(
        tx1 = raw_to_temp(temps[0]),
        tx2 = raw_to_temp(temps[1]),
        tx6 = raw_to_temp(temps[5]),
        tx7 = raw_to_temp(temps[6]),
        px1_bar = raw_to_pressure(px1_raw),
        me_load_pct = raw_to_percentage(pu1_raw),
        running = running.join(","),
        "status"
    );
}
