//! EquipmentModel (§4.C): run-state, mode and commanded-frequency for the
//! ten actuators (3 SWP, 3 FWP, 4 FAN). A single `RwLock` admits concurrent
//! readers; writers exclude everyone else, a strict superset of "writers
//! exclude each other" and simpler to reason about. Callers must never
//! hold this lock while also
//! holding the register store's lock (the register lock is always
//! innermost) — every method here is self-contained and returns before the
//! caller touches the register store.

use parking_lot::RwLock;
use ventsim_common::config::ActuatorDefaults;
use ventsim_common::consts::{ACTUATOR_COUNT, FAN_RANGE};

/// Actuator class; governs which run-state fields are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorKind {
    Swp,
    Fwp,
    Fan,
}

pub const ACTUATOR_KINDS: [ActuatorKind; ACTUATOR_COUNT] = [
    ActuatorKind::Swp,
    ActuatorKind::Swp,
    ActuatorKind::Swp,
    ActuatorKind::Fwp,
    ActuatorKind::Fwp,
    ActuatorKind::Fwp,
    ActuatorKind::Fan,
    ActuatorKind::Fan,
    ActuatorKind::Fan,
    ActuatorKind::Fan,
];

pub const ACTUATOR_NAMES: [&str; ACTUATOR_COUNT] = [
    "SWP1", "SWP2", "SWP3", "FWP1", "FWP2", "FWP3", "FAN1", "FAN2", "FAN3", "FAN4",
];

/// Full-load current used as the denominator for overcurrent ratio
/// telemetry. Not part of the external register ABI, so the exact values
/// are a reasonable in-universe assumption rather than a spec figure.
fn rated_current_a(kind: ActuatorKind) -> f64 {
    match kind {
        ActuatorKind::Swp => 45.0,
        ActuatorKind::Fwp => 38.0,
        ActuatorKind::Fan => 22.0,
    }
}

/// One actuator's run-state, mode and commanded frequency.
#[derive(Debug, Clone, Copy)]
pub struct Actuator {
    pub kind: ActuatorKind,
    /// Pump run state (SWP/FWP only).
    pub running: bool,
    /// Fan forward run state (FAN only).
    pub run_fwd: bool,
    /// Fan backward run state (FAN only).
    pub run_bwd: bool,
    pub ess_on: bool,
    pub abnormal: bool,
    pub auto_mode: bool,
    pub vfd_mode: bool,
    pub commanded_hz: f64,
    pub rated_current_a: f64,
}

impl Actuator {
    fn new(kind: ActuatorKind, defaults: ActuatorDefaults) -> Self {
        let running = defaults.running && kind != ActuatorKind::Fan;
        let run_fwd = defaults.running && kind == ActuatorKind::Fan;
        Actuator {
            kind,
            running,
            run_fwd,
            run_bwd: false,
            ess_on: defaults.running,
            abnormal: false,
            auto_mode: defaults.auto_mode,
            vfd_mode: defaults.vfd_mode,
            commanded_hz: if defaults.running { 50.0 } else { 0.0 },
            rated_current_a: rated_current_a(kind),
        }
    }

    pub fn is_running(&self) -> bool {
        match self.kind {
            ActuatorKind::Fan => self.run_fwd || self.run_bwd,
            _ => self.running,
        }
    }
}

/// Shared equipment state for all ten actuators.
pub struct EquipmentModel {
    actuators: RwLock<[Actuator; ACTUATOR_COUNT]>,
}

impl EquipmentModel {
    pub fn from_defaults(defaults: &[ActuatorDefaults; ACTUATOR_COUNT]) -> Self {
        let mut arr = [Actuator::new(ActuatorKind::Swp, defaults[0]); ACTUATOR_COUNT];
        for i in 0..ACTUATOR_COUNT {
            arr[i] = Actuator::new(ACTUATOR_KINDS[i], defaults[i]);
        }
        Self { actuators: RwLock::new(arr) }
    }

    /// Snapshot of all ten actuators, for modules that only read.
    pub fn snapshot(&self) -> [Actuator; ACTUATOR_COUNT] {
        *self.actuators.read()
    }

    pub fn get(&self, i: usize) -> Actuator {
        self.actuators.read()[i]
    }

    pub fn running_indices(&self) -> Vec<usize> {
        let arr = self.actuators.read();
        (0..ACTUATOR_COUNT).filter(|&i| arr[i].is_running()).collect()
    }

    fn with_mut<F, R>(&self, i: usize, f: F) -> R
    where
        F: FnOnce(&mut Actuator) -> R,
    {
        let mut arr = self.actuators.write();
        f(&mut arr[i])
    }

    /// Start a pump actuator (SWP/FWP). No-op for fans.
    pub fn start_pump(&self, i: usize) {
        self.with_mut(i, |a| {
            if a.kind != ActuatorKind::Fan {
                a.running = true;
                a.ess_on = true;
                if a.commanded_hz == 0.0 {
                    a.commanded_hz = 50.0;
                }
            }
        });
    }

    /// Stop any actuator: clears run-state and forces commandedHz to 0.
    pub fn stop(&self, i: usize) {
        self.with_mut(i, |a| {
            a.running = false;
            a.run_fwd = false;
            a.run_bwd = false;
            a.ess_on = false;
            a.commanded_hz = 0.0;
        });
    }

    /// Start a fan forward. Forward and backward are mutually exclusive.
    pub fn start_fan_fwd(&self, i: usize) {
        self.with_mut(i, |a| {
            if a.kind == ActuatorKind::Fan {
                a.run_fwd = true;
                a.run_bwd = false;
                a.ess_on = true;
                if a.commanded_hz == 0.0 {
                    a.commanded_hz = 50.0;
                }
            }
        });
    }

    /// Start a fan backward (bwd coil, §4.H). Forward and backward are
    /// mutually exclusive.
    pub fn start_fan_bwd(&self, i: usize) {
        self.with_mut(i, |a| {
            if a.kind == ActuatorKind::Fan {
                a.run_fwd = false;
                a.run_bwd = true;
                a.ess_on = true;
                if a.commanded_hz == 0.0 {
                    a.commanded_hz = 50.0;
                }
            }
        });
    }

    pub fn set_auto_mode(&self, i: usize, value: bool) {
        self.with_mut(i, |a| a.auto_mode = value);
    }

    pub fn set_vfd_mode(&self, i: usize, value: bool) {
        self.with_mut(i, |a| a.vfd_mode = value);
    }

    pub fn set_abnormal(&self, i: usize, value: bool) {
        self.with_mut(i, |a| a.abnormal = value);
    }

    /// Command-poller-owned direct commandedHz assignment (§4.H): used for
    /// the initial kick on start/stop/bwd, bypassing the VFD emitter's
    /// slew limiter.
    pub fn set_commanded_hz(&self, i: usize, hz: f64) {
        self.with_mut(i, |a| a.commanded_hz = hz.clamp(0.0, 60.0));
    }

    /// VFD-telemetry-owned setpoint slew toward `target_hz`, clamped to
    /// [0, 60] and rate-limited to ±0.5 Hz per tick (§4.F).
    pub fn slew_commanded_hz(&self, i: usize, target_hz: f64) -> f64 {
        self.with_mut(i, |a| {
            if !a.is_running() {
                a.commanded_hz = 0.0;
                return 0.0;
            }
            let target = target_hz.clamp(0.0, 60.0);
            let delta = target - a.commanded_hz;
            if delta.abs() > 0.5 {
                a.commanded_hz += 0.5 * delta.signum();
            } else {
                a.commanded_hz = target;
            }
            a.commanded_hz
        })
    }

    pub fn is_fan(i: usize) -> bool {
        FAN_RANGE.contains(&i)
    }
}

/// Pack the ten actuators' run and fault state into the HR 4000..4001
/// status block (§6 bit layout):
///
/// - HR 4000 bits 0..15: SWP1{run,ess,abn}, SWP2{run,ess,abn},
///   SWP3{run,ess,abn}, FWP1{run,ess,abn}, FWP2{run,ess,abn}, FWP3.run.
/// - HR 4001 bits 0..13: FWP3{ess,abn}, then FAN1..4{runFwd,runBwd,abn}.
const FAN_RANGE_INDICES: [usize; 4] = [6, 7, 8, 9];

pub fn pack_equipment_status(actuators: &[Actuator; ACTUATOR_COUNT]) -> [u16; 2] {
    let mut w0: u16 = 0;
    let mut bit = 0u16;
    for &i in &[0usize, 1, 2, 3, 4] {
        let a = &actuators[i];
        if a.is_running() {
            w0 |= 1 << bit;
        }
        if a.ess_on {
            w0 |= 1 << (bit + 1);
        }
        if a.abnormal {
            w0 |= 1 << (bit + 2);
        }
        bit += 3;
    }
    if actuators[5].is_running() {
        w0 |= 1 << 15;
    }

    let mut w1: u16 = 0;
    if actuators[5].ess_on {
        w1 |= 1 << 0;
    }
    if actuators[5].abnormal {
        w1 |= 1 << 1;
    }
    let mut bit = 2u16;
    for &i in &FAN_RANGE_INDICES {
        let a = &actuators[i];
        if a.run_fwd {
            w1 |= 1 << bit;
        }
        if a.run_bwd {
            w1 |= 1 << (bit + 1);
        }
        if a.abnormal {
            w1 |= 1 << (bit + 2);
        }
        bit += 3;
    }
    [w0, w1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ventsim_common::config::default_actuators;

    #[test]
    fn boot_defaults_match_running_set() {
        let eq = EquipmentModel::from_defaults(&default_actuators());
        assert!(eq.get(0).is_running()); // SWP1
        assert!(!eq.get(2).is_running()); // SWP3
        assert!(eq.get(6).is_running()); // FAN1
        assert!(!eq.get(9).is_running()); // FAN4
    }

    #[test]
    fn stop_clears_commanded_hz() {
        let eq = EquipmentModel::from_defaults(&default_actuators());
        eq.stop(0);
        let a = eq.get(0);
        assert!(!a.is_running());
        assert_eq!(a.commanded_hz, 0.0);
    }

    #[test]
    fn fan_forward_and_backward_are_exclusive() {
        let eq = EquipmentModel::from_defaults(&default_actuators());
        eq.start_fan_fwd(6);
        assert!(eq.get(6).run_fwd);
        eq.start_fan_bwd(6);
        let a = eq.get(6);
        assert!(a.run_bwd && !a.run_fwd);
    }

    #[test]
    fn slew_moves_at_most_half_hz_per_call() {
        let eq = EquipmentModel::from_defaults(&default_actuators());
        eq.start_pump(2);
        let moved = eq.slew_commanded_hz(2, 60.0);
        assert!((moved - 50.5).abs() < 1e-9);
    }

    #[test]
    fn slew_forces_zero_when_not_running() {
        let eq = EquipmentModel::from_defaults(&default_actuators());
        assert_eq!(eq.slew_commanded_hz(2, 40.0), 0.0);
    }

    #[test]
    fn status_packing_reflects_running_and_abnormal_bits() {
        let eq = EquipmentModel::from_defaults(&default_actuators());
        eq.set_abnormal(1, true); // SWP2
        let words = pack_equipment_status(&eq.snapshot());
        assert_eq!(words[0] & (1 << 0), 1 << 0); // SWP1 running
        assert_eq!(words[0] & (1 << 6), 0); // SWP3 not running
        assert_eq!(words[0] & (1 << 5), 1 << 5); // SWP2 abnormal
    }

    #[test]
    fn status_packing_fwp3_run_bit_is_high_bit_of_word0() {
        let eq = EquipmentModel::from_defaults(&default_actuators());
        eq.start_pump(5); // FWP3
        let words = pack_equipment_status(&eq.snapshot());
        assert_eq!(words[0] & (1 << 15), 1 << 15);
    }

    #[test]
    fn status_packing_fan_bits_land_in_word1() {
        let eq = EquipmentModel::from_defaults(&default_actuators());
        eq.start_fan_fwd(6); // FAN1
        let words = pack_equipment_status(&eq.snapshot());
        assert_eq!(words[1] & (1 << 2), 1 << 2); // FAN1 runFwd
    }
}
