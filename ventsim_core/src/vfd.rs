//! VFD Telemetry Emitter (§4.F): per-actuator 20-word telemetry block,
//! Edge-AI setpoint slewing, and the kWh/run-hour/start counters.

use rand::Rng;
use ventsim_common::codec::{hz_to_raw, pack_u32_words, raw_to_hz, unpack_u32_words};
use ventsim_common::consts::{
    vfd_word, ACTUATOR_COUNT, CO_AUTO_MANUAL_BASE, CO_VFD_BYPASS_BASE, HR_EDGE_AI_TARGET_HZ,
    VFD_BASE, VFD_BLOCK_WORDS,
};
use ventsim_common::error::CoreError;

use crate::anomaly::{AnomalyType, OtherField, VfdAnomalyCycle};
use crate::equipment::EquipmentModel;
use crate::register_store::RegisterStore;

fn uniform(lo: f64, hi: f64) -> f64 {
    rand::thread_rng().gen_range(lo..hi)
}

fn randint(lo: i32, hi: i32) -> i32 {
    rand::thread_rng().gen_range(lo..=hi)
}

/// One actuator's telemetry words before the anomaly override pass.
struct Telemetry {
    freq: f64,
    motor_current_raw: u16,
    motor_thermal: i32,
    heatsink_thermal: i32,
    inverter_thermal: i32,
    system_temp: i32,
    torque: i32,
    phase_u: i32,
    phase_v: i32,
    phase_w: i32,
    dc_link: i32,
}

fn normal_telemetry(freq: f64, rated_current_a: f64) -> Telemetry {
    let motor_current_raw = ((rated_current_a * uniform(0.70, 0.85)) * 10.0).floor() as u16;
    let motor_current_amps = motor_current_raw as f64 / 10.0;
    let per_phase = motor_current_amps / 3f64.sqrt();
    Telemetry {
        freq,
        motor_current_raw,
        motor_thermal: randint(50, 75),
        heatsink_thermal: randint(40, 55),
        inverter_thermal: randint(45, 70),
        system_temp: randint(35, 50),
        torque: (freq * 2.0 + uniform(-5.0, 5.0)).floor() as i32,
        phase_u: ((per_phase + uniform(-2.0, 2.0)) * 10.0).floor() as i32,
        phase_v: ((per_phase + uniform(-2.0, 2.0)) * 10.0).floor() as i32,
        phase_w: ((per_phase + uniform(-2.0, 2.0)) * 10.0).floor() as i32,
        dc_link: randint(540, 560),
    }
}

fn apply_anomaly(t: &mut Telemetry, anomaly: AnomalyType, rated_current_a: f64) {
    let ranges = anomaly.ranges();
    if let Some((lo, hi)) = ranges.motor_thermal {
        t.motor_thermal = randint(lo, hi);
    }
    if let Some((lo, hi)) = ranges.heatsink {
        t.heatsink_thermal = randint(lo, hi);
    }
    if let Some((lo, hi)) = ranges.inverter_thermal {
        t.inverter_thermal = randint(lo, hi);
    }
    match ranges.other {
        OtherField::SystemTemp(lo, hi) => t.system_temp = randint(lo, hi),
        OtherField::Torque(lo, hi) => t.torque = randint(lo, hi),
        OtherField::DcLink(lo, hi) => t.dc_link = randint(lo, hi),
        OtherField::CurrentRatio(lo, hi) => {
            let ratio = uniform(lo, hi);
            t.motor_current_raw = (rated_current_a * ratio * 10.0).floor() as u16;
        }
        OtherField::PhaseImbalancePct(lo, hi) => {
            let imbalance = randint(lo, hi) as f64 / 100.0;
            t.phase_w = (t.phase_w as f64 * (1.0 + imbalance)).floor() as i32;
        }
    }
}

fn write_block(
    store: &RegisterStore,
    base: u16,
    t: &Telemetry,
    kwh: u32,
    run_hours: u32,
    num_starts: u16,
) -> Result<(), CoreError> {
    let mut words = [0u16; VFD_BLOCK_WORDS as usize];
    words[vfd_word::FREQ as usize] = hz_to_raw(t.freq);
    words[vfd_word::MOTOR_CURRENT as usize] = t.motor_current_raw;
    words[vfd_word::MOTOR_THERMAL as usize] = t.motor_thermal as u16;
    words[vfd_word::HEATSINK_THERMAL as usize] = t.heatsink_thermal as u16;
    words[vfd_word::INVERTER_THERMAL as usize] = t.inverter_thermal as u16;
    words[vfd_word::SYSTEM_TEMP as usize] = t.system_temp as u16;
    words[vfd_word::TORQUE as usize] = t.torque as u16;
    words[vfd_word::PHASE_U as usize] = t.phase_u as u16;
    words[vfd_word::PHASE_V as usize] = t.phase_v as u16;
    words[vfd_word::PHASE_W as usize] = t.phase_w as u16;
    words[vfd_word::DC_LINK as usize] = t.dc_link as u16;
    let kwh_words = pack_u32_words(kwh);
    words[vfd_word::KWH_LOW as usize] = kwh_words[0];
    words[vfd_word::KWH_HIGH as usize] = kwh_words[1];
    words[vfd_word::NUM_STARTS as usize] = num_starts;
    let rh_words = pack_u32_words(run_hours);
    words[vfd_word::RUN_HOURS_LOW as usize] = rh_words[0];
    words[vfd_word::RUN_HOURS_HIGH as usize] = rh_words[1];
    store.write_holding(base, &words)
}

/// Emit telemetry for all ten actuators. Called once per sensor tick,
/// after sensor values and equipment status have been written.
pub fn emit_all(
    store: &RegisterStore,
    equipment: &EquipmentModel,
    anomaly: &VfdAnomalyCycle,
) -> Result<(), CoreError> {
    for i in 0..ACTUATOR_COUNT {
        emit_one(store, equipment, anomaly, i)?;
        store.write_coil(CO_AUTO_MANUAL_BASE + i as u16, equipment.get(i).auto_mode)?;
        store.write_coil(CO_VFD_BYPASS_BASE + i as u16, equipment.get(i).vfd_mode)?;
    }
    Ok(())
}

fn emit_one(
    store: &RegisterStore,
    equipment: &EquipmentModel,
    anomaly: &VfdAnomalyCycle,
    i: usize,
) -> Result<(), CoreError> {
    let base = VFD_BASE + VFD_BLOCK_WORDS * i as u16;
    let a = equipment.get(i);

    let commanded_hz = if a.auto_mode && a.vfd_mode && a.is_running() {
        let target_raw = store.read_holding_one(HR_EDGE_AI_TARGET_HZ + i as u16)?;
        if target_raw > 0 {
            equipment.slew_commanded_hz(i, raw_to_hz(target_raw))
        } else {
            // No Edge-AI writer has claimed this target yet; hold the
            // current commandedHz rather than slewing toward an unset 0.
            a.commanded_hz
        }
    } else {
        a.commanded_hz
    };

    let existing = store.read_holding(base, VFD_BLOCK_WORDS)?;
    let kwh = unpack_u32_words(existing[vfd_word::KWH_LOW as usize], existing[vfd_word::KWH_HIGH as usize]);
    let run_hours = unpack_u32_words(
        existing[vfd_word::RUN_HOURS_LOW as usize],
        existing[vfd_word::RUN_HOURS_HIGH as usize],
    );
    let mut num_starts = existing[vfd_word::NUM_STARTS as usize];
    if num_starts == 0 {
        num_starts = randint(100, 500) as u16;
    }

    if !a.is_running() {
        let mut words = [0u16; VFD_BLOCK_WORDS as usize];
        words[vfd_word::HEATSINK_THERMAL as usize] = 25;
        words[vfd_word::SYSTEM_TEMP as usize] = 25;
        // Persistent counters are not reset by the non-running branch —
        // only the instantaneous telemetry fields are zeroed.
        let kwh_words = pack_u32_words(kwh);
        words[vfd_word::KWH_LOW as usize] = kwh_words[0];
        words[vfd_word::KWH_HIGH as usize] = kwh_words[1];
        words[vfd_word::NUM_STARTS as usize] = num_starts;
        let rh_words = pack_u32_words(run_hours);
        words[vfd_word::RUN_HOURS_LOW as usize] = rh_words[0];
        words[vfd_word::RUN_HOURS_HIGH as usize] = rh_words[1];
        return store.write_holding(base, &words);
    }

    let actual_hz = (commanded_hz + uniform(-0.3, 0.3)).clamp(0.0, 60.0);
    let mut telemetry = normal_telemetry(actual_hz, a.rated_current_a);
    if let Some(anomaly_type) = anomaly.anomaly_for(i) {
        apply_anomaly(&mut telemetry, anomaly_type, a.rated_current_a);
    }

    write_block(store, base, &telemetry, kwh + 1, run_hours + 1, num_starts)
}
