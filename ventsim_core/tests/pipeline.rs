//! End-to-end exercise of one full sensor-tick pipeline, the command
//! poller, and the alarm detector working together against a shared
//! register store — without any network I/O.

use ventsim_common::codec::{raw_to_pressure, raw_to_temp};
use ventsim_common::config::SimConfig;
use ventsim_common::consts::{
    co_auto, co_start, co_stop, co_vfd, ACTUATOR_COUNT, HR_ALARM_BITS_BASE, HR_EQUIP_STATUS_BASE,
    HR_THRESHOLDS_BASE,
};
use ventsim_core::alarms::AlarmDetector;
use ventsim_core::anomaly::{SensorAlarmCycle, VfdAnomalyCycle};
use ventsim_core::command_poller::CommandPoller;
use ventsim_core::equipment::{pack_equipment_status, EquipmentModel};
use ventsim_core::register_store::RegisterStore;
use ventsim_core::sensors::SensorSimulator;
use ventsim_core::vfd;

struct Harness {
    store: RegisterStore,
    equipment: EquipmentModel,
    cfg: SimConfig,
    sim: SensorSimulator,
    sensor_alarms: SensorAlarmCycle,
    vfd_anomalies: VfdAnomalyCycle,
    detector: AlarmDetector,
    poller: CommandPoller,
}

impl Harness {
    fn new() -> Self {
        let cfg = SimConfig::default();
        let store = RegisterStore::new();
        store.write_holding(HR_THRESHOLDS_BASE, &cfg.thresholds).unwrap();
        for i in 0..ACTUATOR_COUNT {
            store.write_coil(co_auto(i), cfg.actuators[i].auto_mode).unwrap();
            store.write_coil(co_vfd(i), cfg.actuators[i].vfd_mode).unwrap();
        }
        let equipment = EquipmentModel::from_defaults(&cfg.actuators);
        let poller = CommandPoller::new(&equipment);
        Harness {
            store,
            equipment,
            cfg,
            sim: SensorSimulator::new(),
            sensor_alarms: SensorAlarmCycle::new(),
            vfd_anomalies: VfdAnomalyCycle::new(),
            detector: AlarmDetector::new(),
            poller,
        }
    }

    fn tick(&mut self) {
        self.sensor_alarms.advance();
        self.vfd_anomalies.advance(&self.equipment.running_indices());
        self.sim.tick(&self.store, &self.equipment, &self.sensor_alarms, &self.cfg).unwrap();
        let status = pack_equipment_status(&self.equipment.snapshot());
        self.store.write_holding(HR_EQUIP_STATUS_BASE, &status).unwrap();
        vfd::emit_all(&self.store, &self.equipment, &self.vfd_anomalies).unwrap();
        self.detector.detect(&self.store).unwrap();
    }

    fn poll(&mut self) {
        self.poller.poll(&self.store, &self.equipment).unwrap();
    }
}

#[test]
fn start_swp3_brings_it_running_within_one_tick() {
    let mut h = Harness::new();
    assert!(!h.equipment.get(2).is_running()); // SWP3 stopped at boot

    h.store.write_coil(co_start(2), true).unwrap();
    h.poll();
    assert!(h.equipment.get(2).is_running());

    h.tick();
    let status = h.store.read_holding(HR_EQUIP_STATUS_BASE, 2).unwrap();
    assert_eq!(status[0] & (1 << 6), 1 << 6); // SWP3 running bit

    let vfd_freq_raw =
        h.store.read_holding_one(ventsim_common::consts::VFD_BASE + ventsim_common::consts::VFD_BLOCK_WORDS * 2).unwrap();
    assert!(vfd_freq_raw >= 420); // >= 42.0 Hz
}

#[test]
fn stopping_a_pump_clears_commanded_hz_and_status_bit() {
    let mut h = Harness::new();
    assert!(h.equipment.get(0).is_running()); // SWP1 running at boot

    h.store.write_coil(co_stop(0), true).unwrap();
    h.poll();
    assert!(!h.equipment.get(0).is_running());
    assert_eq!(h.equipment.get(0).commanded_hz, 0.0);

    h.tick();
    let status = h.store.read_holding(HR_EQUIP_STATUS_BASE, 1).unwrap();
    assert_eq!(status[0] & 1, 0);
}

#[test]
fn ten_ticks_keep_temps_and_pressure_in_their_normal_bands() {
    let mut h = Harness::new();
    for _ in 0..10 {
        h.tick();
        let tx2 = raw_to_temp(h.store.read_holding_one(11).unwrap());
        let tx3 = raw_to_temp(h.store.read_holding_one(12).unwrap());
        let px1 = raw_to_pressure(h.store.read_holding_one(17).unwrap());
        assert!(tx2 <= 48.5);
        assert!(tx3 <= 48.5);
        assert!((1.5..=3.5).contains(&px1));
    }
}

#[test]
fn kwh_counter_is_monotonic_while_running() {
    let mut h = Harness::new();
    let addr = ventsim_common::consts::VFD_BASE + ventsim_common::consts::vfd_word::KWH_LOW;
    h.tick();
    let first = h.store.read_holding_one(addr).unwrap();
    h.tick();
    let second = h.store.read_holding_one(addr).unwrap();
    assert!(second > first);
}

#[test]
fn alarm_detector_flags_unack_count_matching_ring_size() {
    let mut h = Harness::new();
    h.store.write_holding_one(10, 320).unwrap(); // force TX1 above threshold
    h.detector.detect(&h.store).unwrap();
    let bits = h.store.read_holding(HR_ALARM_BITS_BASE, 4).unwrap();
    assert_eq!(bits[2] as usize, h.detector.ring_snapshot().len());
}
