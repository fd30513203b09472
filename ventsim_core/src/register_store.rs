//! RegisterStore (§4.A): the single shared-state hub behind every Modbus
//! data table. One `RwLock` guards all four tables together, giving
//! span operations atomicity with respect to any other call that touches
//! overlapping addresses.

use parking_lot::RwLock;
use ventsim_common::consts::TABLE_SIZE;
use ventsim_common::error::CoreError;

struct Banks {
    discrete_inputs: Vec<bool>,
    coils: Vec<bool>,
    holding: Vec<u16>,
    input: Vec<u16>,
}

impl Banks {
    fn new() -> Self {
        Self {
            discrete_inputs: vec![false; TABLE_SIZE],
            coils: vec![false; TABLE_SIZE],
            holding: vec![0u16; TABLE_SIZE],
            input: vec![0u16; TABLE_SIZE],
        }
    }
}

/// Shared register bank backing the Modbus address space.
pub struct RegisterStore {
    banks: RwLock<Banks>,
}

fn validate_span(addr: u16, count: u16) -> Result<std::ops::Range<usize>, CoreError> {
    if count == 0 {
        return Err(CoreError::OutOfRange { address: addr, count });
    }
    let start = addr as usize;
    let end = start + count as usize;
    if end > TABLE_SIZE {
        return Err(CoreError::OutOfRange { address: addr, count });
    }
    Ok(start..end)
}

impl RegisterStore {
    pub fn new() -> Self {
        Self { banks: RwLock::new(Banks::new()) }
    }

    // ── Holding registers ──────────────────────────────────────────

    pub fn read_holding(&self, addr: u16, count: u16) -> Result<Vec<u16>, CoreError> {
        let span = validate_span(addr, count)?;
        Ok(self.banks.read().holding[span].to_vec())
    }

    pub fn read_holding_one(&self, addr: u16) -> Result<u16, CoreError> {
        Ok(self.read_holding(addr, 1)?[0])
    }

    pub fn write_holding(&self, addr: u16, values: &[u16]) -> Result<(), CoreError> {
        let span = validate_span(addr, values.len() as u16)?;
        self.banks.write().holding[span].copy_from_slice(values);
        Ok(())
    }

    pub fn write_holding_one(&self, addr: u16, value: u16) -> Result<(), CoreError> {
        self.write_holding(addr, &[value])
    }

    // ── Input registers ────────────────────────────────────────────

    pub fn read_input(&self, addr: u16, count: u16) -> Result<Vec<u16>, CoreError> {
        let span = validate_span(addr, count)?;
        Ok(self.banks.read().input[span].to_vec())
    }

    pub fn write_input(&self, addr: u16, values: &[u16]) -> Result<(), CoreError> {
        let span = validate_span(addr, values.len() as u16)?;
        self.banks.write().input[span].copy_from_slice(values);
        Ok(())
    }

    // ── Coils ───────────────────────────────────────────────────────

    pub fn read_coils(&self, addr: u16, count: u16) -> Result<Vec<bool>, CoreError> {
        let span = validate_span(addr, count)?;
        Ok(self.banks.read().coils[span].to_vec())
    }

    pub fn read_coil_one(&self, addr: u16) -> Result<bool, CoreError> {
        Ok(self.read_coils(addr, 1)?[0])
    }

    pub fn write_coil(&self, addr: u16, value: bool) -> Result<(), CoreError> {
        self.write_coils(addr, &[value])
    }

    pub fn write_coils(&self, addr: u16, values: &[bool]) -> Result<(), CoreError> {
        let span = validate_span(addr, values.len() as u16)?;
        self.banks.write().coils[span].copy_from_slice(values);
        Ok(())
    }

    /// Read a coil and, if set, clear it in the same write-lock acquisition.
    /// Used by the command poller to consume momentary start/stop/bwd coils
    /// without a lost-write race against the Modbus front-end.
    pub fn take_coil(&self, addr: u16) -> Result<bool, CoreError> {
        let span = validate_span(addr, 1)?;
        let mut banks = self.banks.write();
        let was_set = banks.coils[span.start];
        if was_set {
            banks.coils[span.start] = false;
        }
        Ok(was_set)
    }

    // ── Discrete inputs ─────────────────────────────────────────────

    pub fn read_discrete(&self, addr: u16, count: u16) -> Result<Vec<bool>, CoreError> {
        let span = validate_span(addr, count)?;
        Ok(self.banks.read().discrete_inputs[span].to_vec())
    }

    pub fn write_discrete(&self, addr: u16, values: &[bool]) -> Result<(), CoreError> {
        let span = validate_span(addr, values.len() as u16)?;
        self.banks.write().discrete_inputs[span].copy_from_slice(values);
        Ok(())
    }
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let store = RegisterStore::new();
        store.write_holding(10, &[1, 2, 3]).unwrap();
        assert_eq!(store.read_holding(10, 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn out_of_range_span_is_rejected() {
        let store = RegisterStore::new();
        let err = store.read_holding(TABLE_SIZE as u16 - 1, 2).unwrap_err();
        assert!(matches!(err, CoreError::OutOfRange { .. }));
    }

    #[test]
    fn zero_count_is_rejected() {
        let store = RegisterStore::new();
        assert!(store.read_holding(10, 0).is_err());
    }

    #[test]
    fn take_coil_clears_on_read() {
        let store = RegisterStore::new();
        store.write_coil(64064, true).unwrap();
        assert!(store.take_coil(64064).unwrap());
        assert!(!store.take_coil(64064).unwrap());
    }

    #[test]
    fn coils_default_to_false() {
        let store = RegisterStore::new();
        assert_eq!(store.read_coils(0, 4).unwrap(), vec![false; 4]);
    }
}
