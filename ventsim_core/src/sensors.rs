//! Sensor Simulator (§4.D): the 1 Hz tick that advances seven temperatures,
//! one pressure and main-engine load from physics and sinusoidal cycles,
//! writing holding registers 10..19.

use rand::Rng;
use ventsim_common::codec::{percentage_to_raw, pressure_to_raw, temp_to_raw};
use ventsim_common::config::{CycleConfig, SimConfig};
use ventsim_common::consts::{HR_PU1, HR_PX1, HR_TEMPS_BASE, SWP_RANGE};
use ventsim_common::error::CoreError;

use crate::anomaly::{SensorAlarmCycle, SensorCode};
use crate::equipment::EquipmentModel;
use crate::register_store::RegisterStore;

fn cyclic_temp(cycle: &CycleConfig, sim_tick: u64) -> f64 {
    let (mid, amp) = cycle.mid_amp();
    let phase = std::f64::consts::TAU * (sim_tick as f64 + cycle.phase_s) / cycle.period_s;
    mid + amp * phase.sin()
}

fn uniform(lo: f64, hi: f64) -> f64 {
    rand::thread_rng().gen_range(lo..hi)
}

/// Alarm-override value for a high-temperature channel: two degrees above
/// its own threshold, matching TX1=32.0, TX2=52.0 and TX6=52.0 from the
/// given threshold defaults (HR 7000..7006 = 300,500,500,500,400,500,400).
fn alarm_temp_override(threshold_raw: u16) -> f64 {
    let threshold_c = threshold_raw as f64 / 10.0;
    threshold_c + 2.0 + uniform(-0.5, 0.5)
}

/// Runs the sensor tick loop and owns the state carried from one tick to
/// the next (simTick counter and the previous tick's meLoad).
pub struct SensorSimulator {
    sim_tick: u64,
    prev_me_load: f64,
}

impl SensorSimulator {
    pub fn new() -> Self {
        Self { sim_tick: 0, prev_me_load: 0.0 }
    }

    pub fn sim_tick(&self) -> u64 {
        self.sim_tick
    }

    /// Run one tick: schedulers must already have been advanced by the
    /// caller before this is invoked (§4.D step 2).
    pub fn tick(
        &mut self,
        store: &RegisterStore,
        equipment: &EquipmentModel,
        alarm_cycle: &SensorAlarmCycle,
        cfg: &SimConfig,
    ) -> Result<(), CoreError> {
        self.sim_tick += 1;
        let heat_load_factor = self.prev_me_load / 60.0;
        let thresholds = store.read_holding(ventsim_common::consts::HR_THRESHOLDS_BASE, 10)?;

        let tx1 = if alarm_cycle.is_selected(SensorCode::Tx1) {
            alarm_temp_override(thresholds[0])
        } else {
            cfg.seawater_temp_c + uniform(-0.5, 0.5)
        };

        let tx2 = if alarm_cycle.is_selected(SensorCode::Tx2) {
            alarm_temp_override(thresholds[1])
        } else {
            (tx1 + 8.0 * heat_load_factor + uniform(-0.5, 0.5)).min(48.5)
        };

        let tx3 = if alarm_cycle.is_selected(SensorCode::Tx3) {
            alarm_temp_override(thresholds[2])
        } else {
            (tx1 + 6.0 * heat_load_factor + uniform(-0.5, 0.5)).min(48.5)
        };

        let tx4 = if alarm_cycle.is_selected(SensorCode::Tx4) {
            alarm_temp_override(thresholds[3])
        } else {
            cyclic_temp(&cfg.tx4_cycle, self.sim_tick) + uniform(-0.3, 0.3)
        };

        let tx5 = if alarm_cycle.is_selected(SensorCode::Tx5) {
            alarm_temp_override(thresholds[4])
        } else {
            cyclic_temp(&cfg.tx5_cycle, self.sim_tick) + uniform(-0.3, 0.3)
        };

        let tx6 = if alarm_cycle.is_selected(SensorCode::Tx6) {
            alarm_temp_override(thresholds[5])
        } else {
            cyclic_temp(&cfg.tx6_cycle, self.sim_tick) + uniform(-0.3, 0.3)
        };

        let tx7 = if alarm_cycle.is_selected(SensorCode::Tx7) {
            alarm_temp_override(thresholds[6])
        } else {
            cfg.ambient_temp_c + uniform(-1.0, 1.0)
        };

        let n_swp_running =
            equipment.running_indices().iter().filter(|i| SWP_RANGE.contains(i)).count() as f64;

        let px1 = if alarm_cycle.is_selected(SensorCode::Px1Low) {
            1.0
        } else if alarm_cycle.is_selected(SensorCode::Px1High) {
            4.2
        } else {
            (1.5 + 0.5 * n_swp_running + 0.3 * heat_load_factor + uniform(-0.1, 0.1))
                .clamp(1.5, 3.5)
        };

        let me_load = if alarm_cycle.is_selected(SensorCode::Pu1High) {
            90.0 + uniform(-1.0, 1.0)
        } else {
            let (mid, amp) = cfg.me_load_cycle.mid_amp();
            mid + amp
                * (std::f64::consts::TAU * self.sim_tick as f64 / cfg.me_load_cycle.period_s).sin()
        };

        let temps = [tx1, tx2, tx3, tx4, tx5, tx6, tx7].map(temp_to_raw);
        store.write_holding(HR_TEMPS_BASE, &temps)?;
        store.write_holding_one(HR_PX1, pressure_to_raw(px1))?;
        store.write_holding_one(HR_PU1, percentage_to_raw(me_load))?;

        self.prev_me_load = me_load;
        Ok(())
    }
}

impl Default for SensorSimulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ventsim_common::codec::raw_to_temp;
    use ventsim_common::config::{default_actuators, default_thresholds};

    fn test_setup() -> (RegisterStore, EquipmentModel, SimConfig) {
        let store = RegisterStore::new();
        store
            .write_holding(ventsim_common::consts::HR_THRESHOLDS_BASE, &default_thresholds())
            .unwrap();
        let equipment = EquipmentModel::from_defaults(&default_actuators());
        (store, equipment, SimConfig::default())
    }

    #[test]
    fn tx2_and_tx3_respect_the_48_5_cap() {
        let (store, equipment, cfg) = test_setup();
        let alarms = SensorAlarmCycle::new();
        let mut sim = SensorSimulator::new();
        sim.prev_me_load = 1000.0; // absurd load to try to blow past the cap
        sim.tick(&store, &equipment, &alarms, &cfg).unwrap();
        let tx2 = raw_to_temp(store.read_holding_one(11).unwrap());
        let tx3 = raw_to_temp(store.read_holding_one(12).unwrap());
        assert!(tx2 <= 48.5);
        assert!(tx3 <= 48.5);
    }

    #[test]
    fn px1_stays_in_normal_band_with_no_alarm() {
        let (store, equipment, cfg) = test_setup();
        let alarms = SensorAlarmCycle::new();
        let mut sim = SensorSimulator::new();
        sim.tick(&store, &equipment, &alarms, &cfg).unwrap();
        let px1 = ventsim_common::codec::raw_to_pressure(store.read_holding_one(17).unwrap());
        assert!((1.5..=3.5).contains(&px1));
    }

    #[test]
    fn me_load_stays_in_normal_band_with_no_alarm() {
        let (store, equipment, cfg) = test_setup();
        let alarms = SensorAlarmCycle::new();
        let mut sim = SensorSimulator::new();
        sim.tick(&store, &equipment, &alarms, &cfg).unwrap();
        let me_load =
            ventsim_common::codec::raw_to_percentage(store.read_holding_one(19).unwrap());
        assert!((15.0..=45.0).contains(&me_load));
    }
}
