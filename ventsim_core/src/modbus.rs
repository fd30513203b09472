//! Modbus TCP Front-end (§4.I): hand-rolled MBAP + PDU codec over the
//! Register Store. There is no wire-codec crate in the dependency stack;
//! the Register Store is the canonical hub every table must route through,
//! so the framing lives here in the same terse, binary-protocol style the
//! teacher uses for its own inter-process wire format.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ventsim_common::consts::{
    MAJOR_MINOR_REVISION, MODEL_NAME, PRODUCT_CODE, PRODUCT_NAME, UNIT_ID, VENDOR_NAME, VENDOR_URL,
};
use ventsim_common::error::CoreError;

use crate::register_store::RegisterStore;

const MBAP_HEADER_LEN: usize = 7;
const MAX_READ_COILS: u16 = 2000;
const MAX_READ_REGISTERS: u16 = 125;
const MAX_WRITE_REGISTERS: u16 = 123;
const MAX_WRITE_COILS: u16 = 1968;

const FC_READ_COILS: u8 = 1;
const FC_READ_DISCRETE_INPUTS: u8 = 2;
const FC_READ_HOLDING: u8 = 3;
const FC_READ_INPUT: u8 = 4;
const FC_WRITE_SINGLE_COIL: u8 = 5;
const FC_WRITE_SINGLE_HOLDING: u8 = 6;
const FC_WRITE_MULTIPLE_COILS: u8 = 15;
const FC_WRITE_MULTIPLE_HOLDING: u8 = 16;
const FC_REPORT_SERVER_ID: u8 = 0x11;

const EXC_ILLEGAL_FUNCTION: u8 = 0x01;
const EXC_ILLEGAL_DATA_ADDRESS: u8 = 0x02;
const EXC_ILLEGAL_DATA_VALUE: u8 = 0x03;

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; (bits.len() + 7) / 8];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count).map(|i| (bytes[i / 8] >> (i % 8)) & 1 == 1).collect()
}

/// Build the PDU response body for one request, given the unit id already
/// validated by the caller.
fn handle_pdu(store: &RegisterStore, pdu: &[u8]) -> Vec<u8> {
    if pdu.is_empty() {
        return vec![FC_READ_HOLDING | 0x80, EXC_ILLEGAL_FUNCTION];
    }
    let fc = pdu[0];
    let body = &pdu[1..];
    match fc {
        FC_READ_COILS | FC_READ_DISCRETE_INPUTS => read_bits_response(store, fc, body),
        FC_READ_HOLDING | FC_READ_INPUT => read_words_response(store, fc, body),
        FC_WRITE_SINGLE_COIL => write_single_coil_response(store, fc, body),
        FC_WRITE_SINGLE_HOLDING => write_single_holding_response(store, fc, body),
        FC_WRITE_MULTIPLE_COILS => write_multiple_coils_response(store, fc, body),
        FC_WRITE_MULTIPLE_HOLDING => write_multiple_holding_response(store, fc, body),
        FC_REPORT_SERVER_ID => report_server_id_response(),
        _ => vec![fc | 0x80, EXC_ILLEGAL_FUNCTION],
    }
}

/// Report Server ID (FC 0x11): identifies this simulator to HMI/diagnostic
/// clients. Additional data is the vendor/product/model identity strings,
/// NUL-separated.
fn report_server_id_response() -> Vec<u8> {
    let additional = [VENDOR_NAME, PRODUCT_CODE, VENDOR_URL, PRODUCT_NAME, MODEL_NAME, MAJOR_MINOR_REVISION]
        .join("\0");
    let mut out = vec![FC_REPORT_SERVER_ID, (2 + additional.len()) as u8, UNIT_ID, 0xFF];
    out.extend_from_slice(additional.as_bytes());
    out
}

fn exception(fc: u8, err: &CoreError) -> Vec<u8> {
    let code = err.modbus_exception().unwrap_or(EXC_ILLEGAL_DATA_VALUE);
    vec![fc | 0x80, code]
}

fn read_u16(body: &[u8], offset: usize) -> Option<u16> {
    body.get(offset..offset + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn read_bits_response(store: &RegisterStore, fc: u8, body: &[u8]) -> Vec<u8> {
    let (Some(addr), Some(count)) = (read_u16(body, 0), read_u16(body, 2)) else {
        return vec![fc | 0x80, EXC_ILLEGAL_DATA_VALUE];
    };
    if count == 0 || count > MAX_READ_COILS {
        return vec![fc | 0x80, EXC_ILLEGAL_DATA_VALUE];
    }
    let result =
        if fc == FC_READ_COILS { store.read_coils(addr, count) } else { store.read_discrete(addr, count) };
    match result {
        Ok(bits) => {
            let packed = pack_bits(&bits);
            let mut out = vec![fc, packed.len() as u8];
            out.extend(packed);
            out
        }
        Err(e) => exception(fc, &e),
    }
}

fn read_words_response(store: &RegisterStore, fc: u8, body: &[u8]) -> Vec<u8> {
    let (Some(addr), Some(count)) = (read_u16(body, 0), read_u16(body, 2)) else {
        return vec![fc | 0x80, EXC_ILLEGAL_DATA_VALUE];
    };
    if count == 0 || count > MAX_READ_REGISTERS {
        return vec![fc | 0x80, EXC_ILLEGAL_DATA_VALUE];
    }
    let result = if fc == FC_READ_HOLDING { store.read_holding(addr, count) } else { store.read_input(addr, count) };
    match result {
        Ok(words) => {
            let mut out = vec![fc, (words.len() * 2) as u8];
            for w in words {
                out.extend_from_slice(&w.to_be_bytes());
            }
            out
        }
        Err(e) => exception(fc, &e),
    }
}

fn write_single_coil_response(store: &RegisterStore, fc: u8, body: &[u8]) -> Vec<u8> {
    let (Some(addr), Some(raw)) = (read_u16(body, 0), read_u16(body, 2)) else {
        return vec![fc | 0x80, EXC_ILLEGAL_DATA_VALUE];
    };
    let value = match raw {
        0xFF00 => true,
        0x0000 => false,
        _ => return vec![fc | 0x80, EXC_ILLEGAL_DATA_VALUE],
    };
    match store.write_coil(addr, value) {
        Ok(()) => {
            let mut out = vec![fc];
            out.extend_from_slice(body);
            out
        }
        Err(e) => exception(fc, &e),
    }
}

fn write_single_holding_response(store: &RegisterStore, fc: u8, body: &[u8]) -> Vec<u8> {
    let (Some(addr), Some(value)) = (read_u16(body, 0), read_u16(body, 2)) else {
        return vec![fc | 0x80, EXC_ILLEGAL_DATA_VALUE];
    };
    match store.write_holding_one(addr, value) {
        Ok(()) => {
            let mut out = vec![fc];
            out.extend_from_slice(&addr.to_be_bytes());
            out.extend_from_slice(&value.to_be_bytes());
            out
        }
        Err(e) => exception(fc, &e),
    }
}

fn write_multiple_coils_response(store: &RegisterStore, fc: u8, body: &[u8]) -> Vec<u8> {
    let (Some(addr), Some(count)) = (read_u16(body, 0), read_u16(body, 2)) else {
        return vec![fc | 0x80, EXC_ILLEGAL_DATA_VALUE];
    };
    let Some(&byte_count) = body.get(4) else {
        return vec![fc | 0x80, EXC_ILLEGAL_DATA_VALUE];
    };
    if count == 0 || count > MAX_WRITE_COILS || body.len() < 5 + byte_count as usize {
        return vec![fc | 0x80, EXC_ILLEGAL_DATA_VALUE];
    }
    let bits = unpack_bits(&body[5..5 + byte_count as usize], count as usize);
    match store.write_coils(addr, &bits) {
        Ok(()) => {
            let mut out = vec![fc];
            out.extend_from_slice(&addr.to_be_bytes());
            out.extend_from_slice(&count.to_be_bytes());
            out
        }
        Err(e) => exception(fc, &e),
    }
}

fn write_multiple_holding_response(store: &RegisterStore, fc: u8, body: &[u8]) -> Vec<u8> {
    let (Some(addr), Some(count)) = (read_u16(body, 0), read_u16(body, 2)) else {
        return vec![fc | 0x80, EXC_ILLEGAL_DATA_VALUE];
    };
    let Some(&byte_count) = body.get(4) else {
        return vec![fc | 0x80, EXC_ILLEGAL_DATA_VALUE];
    };
    if count == 0
        || count > MAX_WRITE_REGISTERS
        || byte_count as usize != count as usize * 2
        || body.len() < 5 + byte_count as usize
    {
        return vec![fc | 0x80, EXC_ILLEGAL_DATA_VALUE];
    }
    let words: Vec<u16> = body[5..5 + byte_count as usize]
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    match store.write_holding(addr, &words) {
        Ok(()) => {
            let mut out = vec![fc];
            out.extend_from_slice(&addr.to_be_bytes());
            out.extend_from_slice(&count.to_be_bytes());
            out
        }
        Err(e) => exception(fc, &e),
    }
}

/// Serve one client connection until it disconnects or `running` clears.
fn serve_client(mut stream: TcpStream, store: Arc<RegisterStore>, unit_id: u8, running: Arc<AtomicBool>) {
    stream.set_read_timeout(Some(std::time::Duration::from_millis(250))).ok();
    let mut header = [0u8; MBAP_HEADER_LEN];
    while running.load(Ordering::Relaxed) {
        match stream.read_exact(&mut header) {
            Ok(()) => {}
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(_) => return,
        }
        let transaction_id = u16::from_be_bytes([header[0], header[1]]);
        let protocol_id = u16::from_be_bytes([header[2], header[3]]);
        let length = u16::from_be_bytes([header[4], header[5]]);
        let frame_unit_id = header[6];
        if protocol_id != 0 || length == 0 || length > 260 {
            return;
        }
        let mut pdu = vec![0u8; length as usize - 1];
        if stream.read_exact(&mut pdu).is_err() {
            return;
        }
        if frame_unit_id != unit_id {
            continue;
        }
        let response_pdu = handle_pdu(&store, &pdu);
        let mut frame = Vec::with_capacity(MBAP_HEADER_LEN + response_pdu.len());
        frame.extend_from_slice(&transaction_id.to_be_bytes());
        frame.extend_from_slice(&0u16.to_be_bytes());
        frame.extend_from_slice(&((response_pdu.len() + 1) as u16).to_be_bytes());
        frame.push(unit_id);
        frame.extend(response_pdu);
        if stream.write_all(&frame).is_err() {
            return;
        }
    }
}

/// Accept loop: binds `bind_addr` and spawns one thread per client.
/// Returns once `running` clears and the listener has been dropped.
pub fn run_accept_loop(
    bind_addr: SocketAddr,
    unit_id: u8,
    store: Arc<RegisterStore>,
    running: Arc<AtomicBool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr)?;
    listener.set_nonblocking(true)?;
    tracing::info!(%bind_addr, unit_id, "modbus front-end listening");
    let mut handles = Vec::new();
    while running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                tracing::debug!(%peer, "modbus client connected");
                let store = store.clone();
                let running = running.clone();
                handles.push(std::thread::spawn(move || serve_client(stream, store, unit_id, running)));
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            Err(e) => {
                tracing::warn!(error = %e, "modbus accept failed");
            }
        }
    }
    for h in handles {
        let _ = h.join();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_holding_round_trips_through_the_pdu_codec() {
        let store = RegisterStore::new();
        store.write_holding(10, &[1, 2, 3]).unwrap();
        let req = [FC_READ_HOLDING, 0, 10, 0, 3];
        let resp = handle_pdu(&store, &req);
        assert_eq!(resp[0], FC_READ_HOLDING);
        assert_eq!(resp[1], 6);
        assert_eq!(&resp[2..8], &[0, 1, 0, 2, 0, 3]);
    }

    #[test]
    fn out_of_range_read_returns_exception_02() {
        let store = RegisterStore::new();
        let req = [FC_READ_HOLDING, 255, 255, 0, 10];
        let resp = handle_pdu(&store, &req);
        assert_eq!(resp[0], FC_READ_HOLDING | 0x80);
        assert_eq!(resp[1], EXC_ILLEGAL_DATA_ADDRESS);
    }

    #[test]
    fn write_single_coil_accepts_ff00_and_0000_only() {
        let store = RegisterStore::new();
        let bad = [FC_WRITE_SINGLE_COIL, 0, 0, 0x12, 0x34];
        let resp = handle_pdu(&store, &bad);
        assert_eq!(resp[0], FC_WRITE_SINGLE_COIL | 0x80);
        assert_eq!(resp[1], EXC_ILLEGAL_DATA_VALUE);
    }

    #[test]
    fn write_multiple_holding_then_read_back() {
        let store = RegisterStore::new();
        let req = [FC_WRITE_MULTIPLE_HOLDING, 0, 20, 0, 2, 4, 0, 9, 0, 8];
        let resp = handle_pdu(&store, &req);
        assert_eq!(resp[0], FC_WRITE_MULTIPLE_HOLDING);
        assert_eq!(store.read_holding(20, 2).unwrap(), vec![9, 8]);
    }

    #[test]
    fn unsupported_function_code_is_illegal_function() {
        let store = RegisterStore::new();
        let resp = handle_pdu(&store, &[0x2B]);
        assert_eq!(resp[1], EXC_ILLEGAL_FUNCTION);
    }

    #[test]
    fn report_server_id_carries_vendor_and_product_strings() {
        let resp = handle_pdu(&RegisterStore::new(), &[FC_REPORT_SERVER_ID]);
        assert_eq!(resp[0], FC_REPORT_SERVER_ID);
        assert_eq!(resp[2], UNIT_ID);
        assert_eq!(resp[3], 0xFF);
        let additional = String::from_utf8(resp[4..].to_vec()).unwrap();
        assert!(additional.contains("OMTech"));
        assert!(additional.contains("ESS-HMI"));
    }

    #[test]
    fn pack_and_unpack_bits_round_trip() {
        let bits = vec![true, false, true, true, false, false, false, false, true];
        let packed = pack_bits(&bits);
        assert_eq!(unpack_bits(&packed, bits.len()), bits);
    }
}
