//! Shared error type for ventsim.
//!
//! A small, cloneable `thiserror` enum that every layer (register store,
//! simulation, Modbus front-end, config loading) converges on.

use thiserror::Error;

/// Error conditions raised anywhere in the ventsim core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A read or write addressed registers/coils outside the allocated
    /// table, or a multi-register span that would overflow it.
    #[error("out of range: address {address}, count {count}")]
    OutOfRange {
        /// First address of the offending access.
        address: u16,
        /// Number of registers/coils requested.
        count: u16,
    },

    /// A Modbus PDU was malformed (bad length, bad function code framing).
    #[error("invalid PDU: {0}")]
    InvalidPdu(String),

    /// A client socket failed mid-session; the session is dropped silently.
    #[error("transient I/O error: {0}")]
    TransientIo(String),

    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// An invariant was violated inside the simulation. The offending tick
    /// is skipped and the next tick proceeds.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Modbus exception code this error maps to, per spec §7.
    ///
    /// Returns `None` for errors that never reach the wire (they close the
    /// session, or are swallowed and logged instead).
    pub fn modbus_exception(&self) -> Option<u8> {
        match self {
            CoreError::OutOfRange { .. } => Some(0x02),
            CoreError::InvalidPdu(_) => Some(0x03),
            CoreError::TransientIo(_) | CoreError::ConfigError(_) | CoreError::Internal(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_maps_to_exception_2() {
        let err = CoreError::OutOfRange { address: 65534, count: 1 };
        assert_eq!(err.modbus_exception(), Some(0x02));
    }

    #[test]
    fn invalid_pdu_maps_to_exception_3() {
        let err = CoreError::InvalidPdu("bad value".into());
        assert_eq!(err.modbus_exception(), Some(0x03));
    }

    #[test]
    fn internal_error_has_no_wire_mapping() {
        let err = CoreError::Internal("tick panicked".into());
        assert_eq!(err.modbus_exception(), None);
    }
}
