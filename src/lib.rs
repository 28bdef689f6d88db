//! CEA-608 closed caption extraction from H.264 SEI user data.
//!
//! Broadcast video carries CEA-608 captions inside
//! user_data_registered_itu_t_t35 SEI messages with the ATSC "GA94"
//! identifier. This crate turns a stream of SEI units into timed caption
//! cues:
//!
//! - [`CaptionDemuxer`] parses the SEI payloads, reorders the caption byte
//!   pairs by decode time, drops pairs re-delivered by overlapping segments,
//!   and routes each pair to the right channel decoder.
//! - [`Cea608Decoder`] is the per-channel state machine covering pop-on,
//!   roll-up and paint-on captions, with italic/underline formatting.
//!
//! The caller is responsible for NAL unit extraction and for removing
//! emulation-prevention bytes from the SEI RBSP.
//!
//! ```
//! use cea608_demux::{CaptionDemuxer, NalUnitType, SeiUnit};
//!
//! let mut demuxer = CaptionDemuxer::new();
//! # let rbsp: Vec<u8> = vec![0x80];
//! demuxer.push(&SeiUnit {
//!     nal_unit_type: NalUnitType::SeiRbsp,
//!     escaped_rbsp: &rbsp,
//!     pts: 0,
//!     dts: 0,
//! });
//! for event in demuxer.flush() {
//!     println!("{event:?}");
//! }
//! ```

mod cea608;
mod charset;
mod demux;
mod error;
mod sei;
mod types;

pub use cea608::{Cea608Decoder, RawCue};
pub use demux::CaptionDemuxer;
pub use error::CaptionError;
pub use sei::parse_cc_packets;
pub use types::{CaptionChannel, CaptionEvent, CcPacket, Cue, NalUnitType, SeiUnit};

/// Result type for caption operations
pub type Result<T> = std::result::Result<T, CaptionError>;
