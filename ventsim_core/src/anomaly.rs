//! Anomaly Scheduler (§4.E): two independent periodic state machines that
//! force sensor alarm conditions and VFD anomaly conditions onto selected
//! channels.
//!
//! Both machines share the same Idle/Firing shape: `advance` moves the
//! machine forward by exactly one simulation tick.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Idle/Firing phase shared by both scheduler state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Firing,
}

/// One of the ten sensor channels that can be force-alarmed (§3 catalog).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCode {
    Tx1,
    Tx2,
    Tx3,
    Tx4,
    Tx5,
    Tx6,
    Tx7,
    Px1Low,
    Px1High,
    Pu1High,
}

/// The fixed 10-entry selection catalog (§3).
pub const SENSOR_CATALOG: [SensorCode; 10] = [
    SensorCode::Tx1,
    SensorCode::Tx2,
    SensorCode::Tx3,
    SensorCode::Tx4,
    SensorCode::Tx5,
    SensorCode::Tx6,
    SensorCode::Tx7,
    SensorCode::Px1Low,
    SensorCode::Px1High,
    SensorCode::Pu1High,
];

const ALARM_IDLE_TICKS: u32 = 90;
const ALARM_FIRING_TICKS: u32 = 15;

/// SensorAlarmCycle state machine (§4.E).
#[derive(Debug)]
pub struct SensorAlarmCycle {
    phase: Phase,
    counter: u32,
    duration: u32,
    cycle_number: u64,
    selected: Vec<SensorCode>,
}

impl SensorAlarmCycle {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            counter: 0,
            duration: 0,
            cycle_number: 0,
            selected: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cycle_number(&self) -> u64 {
        self.cycle_number
    }

    /// Advance the state machine by one tick.
    pub fn advance(&mut self) {
        match self.phase {
            Phase::Idle => {
                self.counter += 1;
                if self.counter >= ALARM_IDLE_TICKS {
                    self.cycle_number += 1;
                    let mut rng = StdRng::seed_from_u64(self.cycle_number);
                    let mut catalog = SENSOR_CATALOG;
                    catalog.shuffle(&mut rng);
                    self.selected = catalog[..2].to_vec();
                    self.duration = 0;
                    self.phase = Phase::Firing;
                    tracing::info!(
                        cycle = self.cycle_number,
                        selected = ?self.selected,
                        "sensor alarm cycle firing"
                    );
                }
            }
            Phase::Firing => {
                self.duration += 1;
                if self.duration >= ALARM_FIRING_TICKS {
                    tracing::info!(cycle = self.cycle_number, "sensor alarm cycle cleared");
                    self.phase = Phase::Idle;
                    self.counter = 0;
                    self.selected.clear();
                }
            }
        }
    }

    /// Whether `code` is currently force-alarmed.
    pub fn is_selected(&self, code: SensorCode) -> bool {
        self.phase == Phase::Firing && self.selected.contains(&code)
    }
}

impl Default for SensorAlarmCycle {
    fn default() -> Self {
        Self::new()
    }
}

/// VFD anomaly archetype (§4.E table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyType {
    MotorOverheat,
    InverterOverheat,
    CurrentImbalance,
    Overcurrent,
    HighLoad,
    DcVoltageAbnormal,
}

pub const ANOMALY_TYPES: [AnomalyType; 6] = [
    AnomalyType::MotorOverheat,
    AnomalyType::InverterOverheat,
    AnomalyType::CurrentImbalance,
    AnomalyType::Overcurrent,
    AnomalyType::HighLoad,
    AnomalyType::DcVoltageAbnormal,
];

/// Non-thermal field perturbed by an anomaly type (the "other" column).
#[derive(Debug, Clone, Copy)]
pub enum OtherField {
    /// system_temp raw range.
    SystemTemp(i32, i32),
    /// phase current imbalance, percent.
    PhaseImbalancePct(i32, i32),
    /// current ratio versus rated current.
    CurrentRatio(f64, f64),
    /// torque raw range.
    Torque(i32, i32),
    /// dc_link raw range.
    DcLink(i32, i32),
}

/// Range tables for one anomaly type (§4.E).
#[derive(Debug, Clone, Copy)]
pub struct AnomalyRanges {
    pub motor_thermal: Option<(i32, i32)>,
    pub heatsink: Option<(i32, i32)>,
    pub inverter_thermal: Option<(i32, i32)>,
    pub other: OtherField,
    pub severity: u8,
}

impl AnomalyType {
    pub const fn ranges(self) -> AnomalyRanges {
        match self {
            AnomalyType::MotorOverheat => AnomalyRanges {
                motor_thermal: Some((95, 110)),
                heatsink: Some((72, 85)),
                inverter_thermal: Some((85, 95)),
                other: OtherField::SystemTemp(55, 70),
                severity: 2,
            },
            AnomalyType::InverterOverheat => AnomalyRanges {
                motor_thermal: Some((82, 92)),
                heatsink: Some((75, 88)),
                inverter_thermal: Some((95, 115)),
                other: OtherField::SystemTemp(58, 72),
                severity: 2,
            },
            AnomalyType::CurrentImbalance => AnomalyRanges {
                motor_thermal: Some((83, 93)),
                heatsink: Some((62, 72)),
                inverter_thermal: None,
                other: OtherField::PhaseImbalancePct(18, 35),
                severity: 2,
            },
            AnomalyType::Overcurrent => AnomalyRanges {
                motor_thermal: Some((98, 115)),
                heatsink: Some((74, 86)),
                inverter_thermal: Some((88, 100)),
                other: OtherField::CurrentRatio(1.15, 1.35),
                severity: 3,
            },
            AnomalyType::HighLoad => AnomalyRanges {
                motor_thermal: Some((85, 98)),
                heatsink: Some((65, 75)),
                inverter_thermal: None,
                other: OtherField::Torque(140, 180),
                severity: 1,
            },
            AnomalyType::DcVoltageAbnormal => AnomalyRanges {
                motor_thermal: Some((82, 92)),
                heatsink: None,
                inverter_thermal: Some((83, 93)),
                other: OtherField::DcLink(480, 520),
                severity: 2,
            },
        }
    }
}

const VFD_IDLE_TICKS: u32 = 60;
const VFD_FIRING_TICKS: u32 = 60;

/// VFDAnomalyCycle state machine (§4.E).
#[derive(Debug)]
pub struct VfdAnomalyCycle {
    phase: Phase,
    counter: u32,
    duration: u32,
    cycle_number: u64,
    selections: Vec<(usize, AnomalyType)>,
}

impl VfdAnomalyCycle {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            counter: 0,
            duration: 0,
            cycle_number: 0,
            selections: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Advance the state machine by one tick, given the currently running
    /// actuator indices.
    pub fn advance(&mut self, running: &[usize]) {
        match self.phase {
            Phase::Idle => {
                self.counter += 1;
                if self.counter >= VFD_IDLE_TICKS {
                    if running.is_empty() {
                        // Retry next tick without resetting the counter.
                        return;
                    }
                    self.cycle_number += 1;
                    let mut rng = StdRng::seed_from_u64(self.cycle_number);
                    let k = if running.len() >= 2 {
                        *[1usize, 2].choose(&mut rng).unwrap()
                    } else {
                        1
                    };
                    let mut pool = running.to_vec();
                    pool.shuffle(&mut rng);
                    self.selections = pool[..k]
                        .iter()
                        .map(|&idx| (idx, *ANOMALY_TYPES.choose(&mut rng).unwrap()))
                        .collect();
                    self.duration = 0;
                    self.phase = Phase::Firing;
                    tracing::info!(
                        cycle = self.cycle_number,
                        selections = ?self.selections,
                        "VFD anomaly cycle firing"
                    );
                }
            }
            Phase::Firing => {
                self.duration += 1;
                if self.duration >= VFD_FIRING_TICKS {
                    tracing::info!(cycle = self.cycle_number, "VFD anomaly cycle cleared");
                    self.phase = Phase::Idle;
                    self.counter = 0;
                    self.selections.clear();
                }
            }
        }
    }

    /// Anomaly type affecting actuator `idx`, if any, while firing.
    pub fn anomaly_for(&self, idx: usize) -> Option<AnomalyType> {
        if self.phase != Phase::Firing {
            return None;
        }
        self.selections
            .iter()
            .find(|(i, _)| *i == idx)
            .map(|(_, t)| *t)
    }
}

impl Default for VfdAnomalyCycle {
    fn default() -> Self {
        Self::new()
    }
}
