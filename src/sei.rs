//! SEI message walking and GA94 caption payload parsing.
//!
//! An SEI RBSP carries a sequence of messages, each a `payload_type` and
//! `payload_size` (both 0xFF-escaped) followed by that many payload bytes.
//! Captions travel in user_data_registered_itu_t_t35 messages (type 4) with
//! the ATSC "GA94" identifier.

use tracing::trace;

use crate::types::{CcPacket, NalUnitType, SeiUnit};

/// user_data_registered_itu_t_t35
const PAYLOAD_TYPE_USER_DATA: usize = 4;
/// itu_t_t35_country_code for the United States
const COUNTRY_CODE_US: u8 = 181;
/// itu_t_t35_provider_code for ATSC
const PROVIDER_CODE_ATSC: u16 = 0x0031;
/// ATSC1 user_identifier
const USER_IDENTIFIER_GA94: &[u8; 4] = b"GA94";
/// user_data_type_code for cc_data
const USER_DATA_TYPE_CC: u8 = 3;

/// Extract all caption byte pairs from one SEI unit.
///
/// Non-SEI units, malformed messages and non-caption payloads yield nothing;
/// parsing never fails.
pub fn parse_cc_packets(unit: &SeiUnit<'_>) -> Vec<CcPacket> {
    let mut packets = Vec::new();
    if unit.nal_unit_type != NalUnitType::SeiRbsp {
        return packets;
    }

    let data = unit.escaped_rbsp;
    let mut i = 0;
    // Walk every message in the RBSP; the trailing-bits byte terminates it.
    while i < data.len() && data[i] != 0x80 {
        let mut payload_type = 0usize;
        while i < data.len() && data[i] == 0xff {
            payload_type += 255;
            i += 1;
        }
        if i >= data.len() {
            break;
        }
        payload_type += data[i] as usize;
        i += 1;

        let mut payload_size = 0usize;
        while i < data.len() && data[i] == 0xff {
            payload_size += 255;
            i += 1;
        }
        if i >= data.len() {
            break;
        }
        payload_size += data[i] as usize;
        i += 1;

        let end = match i.checked_add(payload_size) {
            Some(end) if end <= data.len() => end,
            _ => {
                trace!(payload_type, payload_size, "truncated SEI message");
                break;
            }
        };
        if payload_type == PAYLOAD_TYPE_USER_DATA {
            parse_user_data(unit.pts, unit.dts, &data[i..end], &mut packets);
        } else {
            trace!(payload_type, "skipping SEI message");
        }
        i = end;
    }

    packets
}

/// Parse one user_data_registered_itu_t_t35 payload into caption pairs.
fn parse_user_data(pts: i64, dts: i64, payload: &[u8], out: &mut Vec<CcPacket>) {
    // country + provider + "GA94" + type code + flags + reserved
    if payload.len() < 9
        || payload[0] != COUNTRY_CODE_US
        || u16::from_be_bytes([payload[1], payload[2]]) != PROVIDER_CODE_ATSC
        || &payload[3..7] != USER_IDENTIFIER_GA94
        || payload[7] != USER_DATA_TYPE_CC
    {
        trace!("skipping non-caption user data");
        return;
    }

    let flags = payload[8];
    if flags & 0x40 == 0 {
        // process_cc_data_flag unset, the block is filler
        return;
    }
    let cc_count = (flags & 0x1f) as usize;

    let triples = payload.get(10..).unwrap_or(&[]);
    for n in 0..cc_count {
        let Some(triple) = triples.get(n * 3..n * 3 + 3) else {
            trace!(cc_count, "cc_data block shorter than cc_count");
            break;
        };
        let cc_type = triple[0] & 0x03;
        // Invalid pairs still occupy the stream as null padding so the
        // decoders' duplicate-suppression windows stay intact.
        let cc_data = if triple[0] & 0x04 != 0 {
            (((triple[1] & 0x7f) as u16) << 8) | (triple[2] & 0x7f) as u16
        } else {
            0
        };
        out.push(CcPacket {
            pts,
            dts,
            cc_type,
            cc_data,
        });
    }
}
