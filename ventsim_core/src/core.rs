//! PlcCore: owns the Register Store and Equipment Model and spawns the
//! five logical tasks described in §5 — sensor tick, command poller,
//! status printer, and the Modbus accept loop (which itself spawns one
//! thread per client). Shutdown is cooperative on an atomic `running` flag
//! checked at each loop head.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ventsim_common::config::SimConfig;
use ventsim_common::consts::{
    co_auto, co_vfd, ACTUATOR_COUNT, HR_EQUIP_STATUS_BASE, HR_THRESHOLDS_BASE, HR_VFD_DIAG_SCORE,
};

use crate::alarms::AlarmDetector;
use crate::anomaly::{SensorAlarmCycle, VfdAnomalyCycle};
use crate::command_poller::CommandPoller;
use crate::equipment::{pack_equipment_status, EquipmentModel};
use crate::register_store::RegisterStore;
use crate::sensors::SensorSimulator;
use crate::status;
use crate::vfd;

/// Default VFD diagnostic score before any Edge-AI writer connects.
const DEFAULT_VFD_DIAG_SCORE: u16 = 100;

pub struct PlcCore {
    store: Arc<RegisterStore>,
    equipment: Arc<EquipmentModel>,
    cfg: SimConfig,
    running: Arc<AtomicBool>,
}

impl PlcCore {
    pub fn new(cfg: SimConfig) -> Self {
        let store = Arc::new(RegisterStore::new());
        let equipment = Arc::new(EquipmentModel::from_defaults(&cfg.actuators));
        Self { store, equipment, cfg, running: Arc::new(AtomicBool::new(true)) }
    }

    /// Seed thresholds, the VFD diagnostic score and the auto/VFD mode
    /// coils before any thread starts. The mode coils must be seeded from
    /// `cfg.actuators` here — otherwise they read as `false` on the
    /// poller's first poll while `CommandPoller::new` seeds `prev_auto`/
    /// `prev_vfd` as `true` from the equipment defaults, and the mismatch
    /// is read as an edge that flips every actuator into MANUAL/BYPASS.
    fn seed_registers(&self) -> Result<(), ventsim_common::error::CoreError> {
        self.store.write_holding(HR_THRESHOLDS_BASE, &self.cfg.thresholds)?;
        self.store.write_holding(HR_VFD_DIAG_SCORE, &[DEFAULT_VFD_DIAG_SCORE; 10])?;
        for i in 0..ACTUATOR_COUNT {
            self.store.write_coil(co_auto(i), self.cfg.actuators[i].auto_mode)?;
            self.store.write_coil(co_vfd(i), self.cfg.actuators[i].vfd_mode)?;
        }
        Ok(())
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run the core until `running` clears. Blocks the calling thread —
    /// the Modbus accept loop runs inline here, the rest on background
    /// threads.
    pub fn run(&self) -> std::io::Result<()> {
        if let Err(e) = self.seed_registers() {
            tracing::error!(error = %e, "failed to seed registers");
        }

        let sim_handle = self.spawn_sim_thread();
        let poller_handle = self.spawn_poller_thread();
        let status_handle = self.spawn_status_thread();

        let result = crate::modbus::run_accept_loop(
            self.cfg.bind_addr,
            self.cfg.unit_id,
            self.store.clone(),
            self.running.clone(),
        );

        self.running.store(false, Ordering::Relaxed);
        sim_handle.join().ok();
        poller_handle.join().ok();
        status_handle.join().ok();
        result
    }

    pub fn shutdown(&self) {
        tracing::info!("shutdown requested");
        self.running.store(false, Ordering::Relaxed);
    }

    fn spawn_sim_thread(&self) -> std::thread::JoinHandle<()> {
        let store = self.store.clone();
        let equipment = self.equipment.clone();
        let cfg = self.cfg.clone();
        let running = self.running.clone();
        std::thread::spawn(move || {
            let mut sim = SensorSimulator::new();
            let mut sensor_alarms = SensorAlarmCycle::new();
            let mut vfd_anomalies = VfdAnomalyCycle::new();
            let mut detector = AlarmDetector::new();
            while running.load(Ordering::Relaxed) {
                sensor_alarms.advance();
                vfd_anomalies.advance(&equipment.running_indices());

                if let Err(e) = sim.tick(&store, &equipment, &sensor_alarms, &cfg) {
                    tracing::error!(error = %e, "sensor tick failed, skipping");
                    std::thread::sleep(Duration::from_secs(1));
                    continue;
                }

                let status_words = pack_equipment_status(&equipment.snapshot());
                if let Err(e) = store.write_holding(HR_EQUIP_STATUS_BASE, &status_words) {
                    tracing::error!(error = %e, "equipment status write failed");
                }

                if let Err(e) = vfd::emit_all(&store, &equipment, &vfd_anomalies) {
                    tracing::error!(error = %e, "vfd telemetry emission failed");
                }

                if let Err(e) = detector.detect(&store) {
                    tracing::error!(error = %e, "alarm detection failed");
                }

                std::thread::sleep(Duration::from_secs(1));
            }
        })
    }

    fn spawn_poller_thread(&self) -> std::thread::JoinHandle<()> {
        let store = self.store.clone();
        let equipment = self.equipment.clone();
        let running = self.running.clone();
        std::thread::spawn(move || {
            let mut poller = CommandPoller::new(&equipment);
            while running.load(Ordering::Relaxed) {
                if let Err(e) = poller.poll(&store, &equipment) {
                    tracing::error!(error = %e, "command poll failed");
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        })
    }

    fn spawn_status_thread(&self) -> std::thread::JoinHandle<()> {
        let store = self.store.clone();
        let equipment = self.equipment.clone();
        let running = self.running.clone();
        std::thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                status::print_status(&store, &equipment);
                std::thread::sleep(Duration::from_secs(15));
            }
        })
    }
}
