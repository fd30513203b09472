//! Register/coil address map for the engine-room ventilation and cooling
//! plant simulator.
//!
//! Single source of truth for every externally-visible address. This is the
//! external ABI (§6 of the design spec) — reproduced bit-exact, never
//! renumbered.

/// Number of allocated table slots (discrete inputs, coils, holding and
/// input registers each cover the full Modbus address space).
pub const TABLE_SIZE: usize = 65535;

/// Modbus unit id this server answers on.
pub const UNIT_ID: u8 = 3;

/// Default TCP port.
pub const TCP_PORT: u16 = 502;

/// Number of actuators: 3 SWP, 3 FWP, 4 FAN, in that fixed order.
pub const ACTUATOR_COUNT: usize = 10;

/// Actuator index range helpers (i in 0..ACTUATOR_COUNT).
pub const SWP_RANGE: std::ops::Range<usize> = 0..3;
pub const FWP_RANGE: std::ops::Range<usize> = 3..6;
pub const FAN_RANGE: std::ops::Range<usize> = 6..10;

// ─── Holding registers — sensors (§6) ──────────────────────────────
/// TX1..TX7 base address (7 words, °C×10, signed two's-complement).
pub const HR_TEMPS_BASE: u16 = 10;
pub const HR_TEMPS_COUNT: u16 = 7;
/// PX1, bar×4608.
pub const HR_PX1: u16 = 17;
/// M/E load (PU1), %×276.48.
pub const HR_PU1: u16 = 19;

// ─── VFD telemetry blocks (§4.F, §6) ───────────────────────────────
/// Base address of VFD block i: `VFD_BASE + 20*i .. +19`.
pub const VFD_BASE: u16 = 160;
pub const VFD_BLOCK_WORDS: u16 = 20;

/// Word offsets within a VFD block.
pub mod vfd_word {
    pub const FREQ: u16 = 0;
    pub const MOTOR_CURRENT: u16 = 1;
    pub const MOTOR_THERMAL: u16 = 2;
    pub const HEATSINK_THERMAL: u16 = 3;
    pub const INVERTER_THERMAL: u16 = 4;
    pub const SYSTEM_TEMP: u16 = 5;
    pub const TORQUE: u16 = 6;
    pub const PHASE_U: u16 = 7;
    pub const PHASE_V: u16 = 8;
    pub const KWH_LOW: u16 = 9;
    pub const KWH_HIGH: u16 = 10;
    pub const NUM_STARTS: u16 = 11;
    pub const DC_LINK: u16 = 12;
    pub const PHASE_W: u16 = 13;
    pub const RUN_HOURS_LOW: u16 = 18;
    pub const RUN_HOURS_HIGH: u16 = 19;
}

// ─── Equipment status bitfield (§6) ────────────────────────────────
pub const HR_EQUIP_STATUS_BASE: u16 = 4000;
pub const HR_EQUIP_STATUS_COUNT: u16 = 2;

// ─── Edge-AI / external-writer registers (§6, client-owned) ────────
pub const HR_EDGE_AI_TARGET_HZ: u16 = 5000;
pub const HR_SAVINGS_PER_ACTUATOR: u16 = 5100;
pub const HR_VFD_DIAG_SCORE: u16 = 5200;
pub const HR_SYSTEM_SAVINGS_RATIO: u16 = 5300;
pub const HR_CUMULATIVE_KWH: u16 = 5400;
pub const HR_POWER_BREAKDOWN: u16 = 5500;
pub const HR_POWER_SNAPSHOT: u16 = 5620;

// ─── Alarm thresholds and detector output (§4.G, §6) ───────────────
pub const HR_THRESHOLDS_BASE: u16 = 7000;
pub const HR_THRESHOLDS_COUNT: u16 = 10;
pub const HR_ALARM_BITS_BASE: u16 = 7100;
pub const HR_ALARM_BITS_COUNT: u16 = 4;
pub const HR_RECENT_ALARMS_BASE: u16 = 7200;
pub const RECENT_ALARM_RING_LEN: usize = 10;
pub const RECENT_ALARM_BLOCK_WORDS: u16 = 8;

// ─── Coils (§6) ─────────────────────────────────────────────────────
pub const CO_START_STOP_BASE: u16 = 64064;
pub const CO_FAN_BWD_BASE: u16 = 64084;
pub const CO_AUTO_MANUAL_BASE: u16 = 64160;
pub const CO_VFD_BYPASS_BASE: u16 = 64320;

/// Start coil address for actuator `i`.
#[inline]
pub const fn co_start(i: usize) -> u16 {
    CO_START_STOP_BASE + (2 * i) as u16
}

/// Stop coil address for actuator `i`.
#[inline]
pub const fn co_stop(i: usize) -> u16 {
    CO_START_STOP_BASE + (2 * i) as u16 + 1
}

/// Backward coil address for fan index `j` (0..4, fans only).
#[inline]
pub const fn co_fan_bwd(j: usize) -> u16 {
    CO_FAN_BWD_BASE + j as u16
}

/// Auto/manual mode coil for actuator `i`.
#[inline]
pub const fn co_auto(i: usize) -> u16 {
    CO_AUTO_MANUAL_BASE + i as u16
}

/// VFD/bypass mode coil for actuator `i`.
#[inline]
pub const fn co_vfd(i: usize) -> u16 {
    CO_VFD_BYPASS_BASE + i as u16
}

/// Device identification strings (§6, §13 SPEC_FULL).
pub const VENDOR_NAME: &str = "OMTech";
pub const PRODUCT_CODE: &str = "ESS-HMI";
pub const VENDOR_URL: &str = "http://www.omtech.com";
pub const PRODUCT_NAME: &str = "ESS PLC Simulator";
pub const MODEL_NAME: &str = "ESS-SIM-001";
pub const MAJOR_MINOR_REVISION: &str = "1.0.0";
