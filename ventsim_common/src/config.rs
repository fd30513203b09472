//! Simulation configuration types, TOML-loadable with §6 defaults.
//!
//! Every field carries a `#[serde(default = ...)]` so that an empty or
//! missing config file reproduces the documented defaults exactly.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use crate::consts::{TCP_PORT, UNIT_ID};

fn default_bind_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), TCP_PORT)
}

fn default_unit_id() -> u8 {
    UNIT_ID
}

fn default_seawater_temp() -> f64 {
    24.0
}

fn default_ambient_temp() -> f64 {
    28.0
}

/// Parameters of a sinusoidal cyclic signal (§4.D `cyclicTemp`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CycleConfig {
    pub min: f64,
    pub max: f64,
    pub period_s: f64,
    pub phase_s: f64,
}

impl CycleConfig {
    /// Midpoint and amplitude of the cycle.
    pub fn mid_amp(&self) -> (f64, f64) {
        ((self.min + self.max) / 2.0, (self.max - self.min) / 2.0)
    }
}

fn default_tx4() -> CycleConfig {
    CycleConfig { min: 43.0, max: 47.0, period_s: 180.0, phase_s: 0.0 }
}

fn default_tx5() -> CycleConfig {
    CycleConfig { min: 33.0, max: 37.0, period_s: 180.0, phase_s: 60.0 }
}

fn default_tx6() -> CycleConfig {
    CycleConfig { min: 38.0, max: 48.0, period_s: 180.0, phase_s: 0.0 }
}

fn default_me_load_cycle() -> CycleConfig {
    CycleConfig { min: 15.0, max: 45.0, period_s: 180.0, phase_s: 0.0 }
}

pub fn default_thresholds() -> [u16; 10] {
    [300, 500, 500, 500, 400, 500, 400, 150, 400, 850]
}

/// Per-actuator boot defaults (§6 "Defaults").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActuatorDefaults {
    pub running: bool,
    pub auto_mode: bool,
    pub vfd_mode: bool,
}

impl ActuatorDefaults {
    const fn new(running: bool) -> Self {
        Self { running, auto_mode: true, vfd_mode: true }
    }
}

pub fn default_actuators() -> [ActuatorDefaults; 10] {
    // [SWP1, SWP2, SWP3, FWP1, FWP2, FWP3, FAN1, FAN2, FAN3, FAN4]
    // Running at boot: SWP1, SWP2, FWP1, FWP2, FAN1, FAN2.
    [
        ActuatorDefaults::new(true),  // SWP1
        ActuatorDefaults::new(true),  // SWP2
        ActuatorDefaults::new(false), // SWP3
        ActuatorDefaults::new(true),  // FWP1
        ActuatorDefaults::new(true),  // FWP2
        ActuatorDefaults::new(false), // FWP3
        ActuatorDefaults::new(true),  // FAN1
        ActuatorDefaults::new(true),  // FAN2
        ActuatorDefaults::new(false), // FAN3
        ActuatorDefaults::new(false), // FAN4
    ]
}

/// Top-level simulation configuration, loaded from an optional TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// TCP listen address for the Modbus front-end.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Modbus unit id this server answers on.
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Seawater temperature baseline, °C.
    #[serde(default = "default_seawater_temp")]
    pub seawater_temp_c: f64,

    /// Ambient (outside air) temperature baseline, °C.
    #[serde(default = "default_ambient_temp")]
    pub ambient_temp_c: f64,

    /// TX4 cyclic temperature parameters.
    #[serde(default = "default_tx4")]
    pub tx4_cycle: CycleConfig,

    /// TX5 cyclic temperature parameters.
    #[serde(default = "default_tx5")]
    pub tx5_cycle: CycleConfig,

    /// TX6 cyclic temperature parameters.
    #[serde(default = "default_tx6")]
    pub tx6_cycle: CycleConfig,

    /// Main-engine load sinusoidal cycle.
    #[serde(default = "default_me_load_cycle")]
    pub me_load_cycle: CycleConfig,

    /// Alarm threshold registers HR 7000..7009.
    #[serde(default = "default_thresholds")]
    pub thresholds: [u16; 10],

    /// Actuator boot defaults, in [SWP1..3, FWP1..3, FAN1..4] order.
    #[serde(default = "default_actuators")]
    pub actuators: [ActuatorDefaults; 10],
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            unit_id: default_unit_id(),
            seawater_temp_c: default_seawater_temp(),
            ambient_temp_c: default_ambient_temp(),
            tx4_cycle: default_tx4(),
            tx5_cycle: default_tx5(),
            tx6_cycle: default_tx6(),
            me_load_cycle: default_me_load_cycle(),
            thresholds: default_thresholds(),
            actuators: default_actuators(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a TOML file. Missing fields fall back to
    /// their `#[serde(default)]` values.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::ConfigError(format!("failed to read {:?}: {}", path, e)))?;
        toml::from_str(&content)
            .map_err(|e| CoreError::ConfigError(format!("failed to parse {:?}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.unit_id, 3);
        assert_eq!(cfg.bind_addr.port(), 502);
        assert_eq!(cfg.thresholds, [300, 500, 500, 500, 400, 500, 400, 150, 400, 850]);
        assert!(cfg.actuators[0].running); // SWP1
        assert!(!cfg.actuators[2].running); // SWP3
        assert!(cfg.actuators[6].running); // FAN1
        assert!(!cfg.actuators[9].running); // FAN4
    }

    #[test]
    fn empty_toml_reproduces_defaults() {
        let cfg: SimConfig = toml::from_str("").expect("empty toml parses");
        assert_eq!(cfg.unit_id, SimConfig::default().unit_id);
        assert_eq!(cfg.tx6_cycle, default_tx6());
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = SimConfig::load(Path::new("/nonexistent/path.toml")).unwrap_err();
        assert!(matches!(err, CoreError::ConfigError(_)));
    }

    #[test]
    fn load_from_tempfile_overrides_one_field() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "unit_id = 7").unwrap();
        let cfg = SimConfig::load(file.path()).unwrap();
        assert_eq!(cfg.unit_id, 7);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.thresholds, default_thresholds());
    }
}
