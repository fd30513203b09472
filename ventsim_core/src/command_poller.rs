//! Command Poller (§4.H): 10 Hz scan of control coils, translated into
//! Equipment Model mutations. Momentary start/stop/bwd coils are consumed
//! on read; auto/vfd mode coils are level-sensitive and logged on edge.

use rand::Rng;
use ventsim_common::consts::{co_auto, co_fan_bwd, co_start, co_stop, co_vfd, ACTUATOR_COUNT, FAN_RANGE};
use ventsim_common::error::CoreError;

use crate::equipment::EquipmentModel;
use crate::register_store::RegisterStore;

fn jittered_45hz() -> f64 {
    45.0 + rand::thread_rng().gen_range(-2.0..2.0)
}

/// Tracks the previous poll's mode-coil values so mode changes can be
/// logged on the edge rather than every poll.
pub struct CommandPoller {
    prev_auto: [bool; ACTUATOR_COUNT],
    prev_vfd: [bool; ACTUATOR_COUNT],
}

impl CommandPoller {
    pub fn new(equipment: &EquipmentModel) -> Self {
        let snapshot = equipment.snapshot();
        let mut prev_auto = [false; ACTUATOR_COUNT];
        let mut prev_vfd = [false; ACTUATOR_COUNT];
        for i in 0..ACTUATOR_COUNT {
            prev_auto[i] = snapshot[i].auto_mode;
            prev_vfd[i] = snapshot[i].vfd_mode;
        }
        Self { prev_auto, prev_vfd }
    }

    /// Run one 100 ms poll.
    pub fn poll(&mut self, store: &RegisterStore, equipment: &EquipmentModel) -> Result<(), CoreError> {
        for i in 0..ACTUATOR_COUNT {
            if FAN_RANGE.contains(&i) {
                self.poll_fan(store, equipment, i)?;
            } else {
                self.poll_pump(store, equipment, i)?;
            }
            self.poll_mode_coils(store, equipment, i)?;
        }
        Ok(())
    }

    fn poll_pump(&self, store: &RegisterStore, equipment: &EquipmentModel, i: usize) -> Result<(), CoreError> {
        if store.take_coil(co_start(i))? && !equipment.get(i).is_running() {
            equipment.start_pump(i);
            equipment.set_commanded_hz(i, jittered_45hz());
        }
        if store.take_coil(co_stop(i))? && equipment.get(i).is_running() {
            equipment.stop(i);
        }
        Ok(())
    }

    fn poll_fan(&self, store: &RegisterStore, equipment: &EquipmentModel, i: usize) -> Result<(), CoreError> {
        let j = i - FAN_RANGE.start;
        if store.take_coil(co_start(i))? {
            equipment.start_fan_fwd(i);
            equipment.set_commanded_hz(i, jittered_45hz());
        }
        if store.take_coil(co_stop(i))? {
            equipment.stop(i);
        }
        if store.take_coil(co_fan_bwd(j))? {
            equipment.start_fan_bwd(i);
            equipment.set_commanded_hz(i, jittered_45hz());
        }
        Ok(())
    }

    fn poll_mode_coils(&mut self, store: &RegisterStore, equipment: &EquipmentModel, i: usize) -> Result<(), CoreError> {
        let auto = store.read_coil_one(co_auto(i))?;
        if auto != self.prev_auto[i] {
            tracing::info!(actuator = i, auto_mode = auto, "auto/manual mode changed");
            equipment.set_auto_mode(i, auto);
            self.prev_auto[i] = auto;
        }
        let vfd = store.read_coil_one(co_vfd(i))?;
        if vfd != self.prev_vfd[i] {
            tracing::info!(actuator = i, vfd_mode = vfd, "vfd/bypass mode changed");
            equipment.set_vfd_mode(i, vfd);
            self.prev_vfd[i] = vfd;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ventsim_common::config::default_actuators;

    #[test]
    fn start_coil_starts_a_stopped_pump() {
        let store = RegisterStore::new();
        let equipment = EquipmentModel::from_defaults(&default_actuators());
        let mut poller = CommandPoller::new(&equipment);
        store.write_coil(co_start(2), true).unwrap(); // SWP3
        poller.poll(&store, &equipment).unwrap();
        assert!(equipment.get(2).is_running());
        assert!(!store.read_coil_one(co_start(2)).unwrap()); // consumed
    }

    #[test]
    fn stop_coil_stops_a_running_pump() {
        let store = RegisterStore::new();
        let equipment = EquipmentModel::from_defaults(&default_actuators());
        let mut poller = CommandPoller::new(&equipment);
        store.write_coil(co_stop(0), true).unwrap(); // SWP1, running at boot
        poller.poll(&store, &equipment).unwrap();
        assert!(!equipment.get(0).is_running());
        assert_eq!(equipment.get(0).commanded_hz, 0.0);
    }

    #[test]
    fn bwd_coil_reverses_a_forward_running_fan() {
        let store = RegisterStore::new();
        let equipment = EquipmentModel::from_defaults(&default_actuators());
        let mut poller = CommandPoller::new(&equipment);
        assert!(equipment.get(6).run_fwd); // FAN1 running fwd at boot
        store.write_coil(co_fan_bwd(0), true).unwrap();
        poller.poll(&store, &equipment).unwrap();
        let a = equipment.get(6);
        assert!(a.run_bwd && !a.run_fwd);
        assert!((43.0..=47.0).contains(&a.commanded_hz));
    }

    #[test]
    fn mode_coil_is_not_cleared_after_poll() {
        let store = RegisterStore::new();
        let equipment = EquipmentModel::from_defaults(&default_actuators());
        let mut poller = CommandPoller::new(&equipment);
        store.write_coil(co_auto(0), false).unwrap();
        poller.poll(&store, &equipment).unwrap();
        assert!(!store.read_coil_one(co_auto(0)).unwrap());
        assert!(!equipment.get(0).auto_mode);
    }
}
