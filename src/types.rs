//! Core types shared by the SEI parser, the channel decoders and the demuxer.

use serde::{Deserialize, Serialize};

use crate::error::CaptionError;

/// NAL unit classification, as far as caption extraction cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// Supplemental enhancement information (nal_unit_type 6)
    SeiRbsp,
    /// Anything else; ignored by the demuxer
    Other,
}

/// One SEI NAL unit with its frame timestamps.
///
/// `escaped_rbsp` is the raw RBSP payload with emulation-prevention bytes
/// already removed by the caller. Timestamps are in stream ticks.
#[derive(Debug, Clone, Copy)]
pub struct SeiUnit<'a> {
    pub nal_unit_type: NalUnitType,
    pub escaped_rbsp: &'a [u8],
    pub pts: i64,
    pub dts: i64,
}

/// One caption byte pair extracted from a GA94 user-data message.
///
/// `cc_type` 0 and 1 carry CEA-608 field 1 and field 2 respectively; 2 and 3
/// carry CEA-708 and are filtered out during routing. `cc_data` packs the two
/// payload bytes big-endian with parity bits already stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcPacket {
    pub pts: i64,
    pub dts: i64,
    pub cc_type: u8,
    pub cc_data: u16,
}

impl CcPacket {
    /// Pack two 7-bit characters into a printable-text pair.
    ///
    /// CEA-608 always transmits characters two at a time, so the text must be
    /// exactly two characters long.
    pub fn from_chars(pts: i64, dts: i64, cc_type: u8, text: &str) -> Result<Self, CaptionError> {
        let mut chars = text.chars();
        let (c0, c1) = match (chars.next(), chars.next(), chars.next()) {
            (Some(c0), Some(c1), None) => (c0, c1),
            _ => return Err(CaptionError::InvalidPacketLength(text.chars().count())),
        };
        for c in [c0, c1] {
            if (c as u32) > 0x7f {
                return Err(CaptionError::InvalidPacketChar(c));
            }
        }
        Ok(CcPacket {
            pts,
            dts,
            cc_type,
            cc_data: ((c0 as u16) << 8) | c1 as u16,
        })
    }

    /// Which interleaved field this pair belongs to (0 or 1).
    pub fn field(&self) -> u8 {
        self.cc_type & 0x01
    }
}

/// CEA-608 caption channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptionChannel {
    /// Field 1, data channel 1
    CC1,
    /// Field 1, data channel 2
    CC2,
    /// Field 2, data channel 1
    CC3,
    /// Field 2, data channel 2
    CC4,
}

impl CaptionChannel {
    /// Build from a field number and data channel number, both zero-based.
    pub fn from_field_channel(field: u8, channel: u8) -> Self {
        match (field & 1, channel & 1) {
            (0, 0) => CaptionChannel::CC1,
            (0, 1) => CaptionChannel::CC2,
            (1, 0) => CaptionChannel::CC3,
            _ => CaptionChannel::CC4,
        }
    }

    /// Decoder slot index (0..4).
    pub fn index(&self) -> usize {
        match self {
            CaptionChannel::CC1 => 0,
            CaptionChannel::CC2 => 1,
            CaptionChannel::CC3 => 2,
            CaptionChannel::CC4 => 3,
        }
    }
}

impl std::fmt::Display for CaptionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptionChannel::CC1 => write!(f, "CC1"),
            CaptionChannel::CC2 => write!(f, "CC2"),
            CaptionChannel::CC3 => write!(f, "CC3"),
            CaptionChannel::CC4 => write!(f, "CC4"),
        }
    }
}

/// A finished caption cue with timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub channel: CaptionChannel,
}

/// Events produced by [`CaptionDemuxer::flush`](crate::CaptionDemuxer::flush).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CaptionEvent {
    /// First packet routed to a channel since construction or reset
    NewStream(CaptionChannel),
    /// A completed caption cue
    Cue(Cue),
}
