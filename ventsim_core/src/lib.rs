//! Engine-room ventilation and cooling plant PLC simulator.
//!
//! A Modbus/TCP server that impersonates an industrial PLC: a
//! physically-coherent sensor model, a fault-injection scheduler, and a
//! command interpreter share one register bank that is served to network
//! clients over Modbus.

pub mod alarms;
pub mod anomaly;
pub mod command_poller;
pub mod core;
pub mod equipment;
pub mod modbus;
pub mod register_store;
pub mod sensors;
pub mod status;
pub mod vfd;

pub use core::PlcCore;
