//! Caption demuxer.
//!
//! Collects caption byte pairs from SEI units, reorders them by decode time,
//! drops pairs re-delivered by overlapping segments, and routes the rest to
//! the four channel decoders. Cue timestamps are converted from stream ticks
//! to seconds on the way out.

use std::collections::HashMap;

use tracing::debug;

use crate::cea608::{Cea608Decoder, RawCue};
use crate::error::CaptionError;
use crate::sei::parse_cc_packets;
use crate::types::{CaptionChannel, CaptionEvent, CcPacket, Cue, SeiUnit};

/// MPEG-TS clock rate, the default timescale
const DEFAULT_TIMESCALE: u32 = 90_000;

/// How far behind `latest_dts` forwarded-pair history is kept, in seconds.
/// Re-delivered segments land within a few segment durations of the live
/// edge; anything older than this is not worth remembering.
const DEDUP_HORIZON_SECS: i64 = 30;

/// A buffered pair tagged with the push that produced it.
#[derive(Debug, Clone, Copy)]
struct Pending {
    seq: u64,
    packet: CcPacket,
}

/// Demultiplexes CEA-608 captions out of SEI units.
#[derive(Debug)]
pub struct CaptionDemuxer {
    timescale: u32,
    buffer: Vec<Pending>,
    push_seq: u64,
    /// Highest decode time fully forwarded to the decoders
    latest_dts: Option<i64>,
    /// Forwarded pair content per dts, for overlap detection; pruned to
    /// [`DEDUP_HORIZON_SECS`] behind `latest_dts` at every flush
    forwarded: HashMap<i64, Vec<(u8, u16, u64)>>,
    /// Active data channel per field, latched until changed
    active_channel: [Option<u8>; 2],
    /// Channels that have produced at least one routed packet
    seen: [bool; 4],
    decoders: [Cea608Decoder; 4],
}

impl Default for CaptionDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptionDemuxer {
    /// Create a demuxer with the MPEG-TS 90 kHz timescale.
    pub fn new() -> Self {
        CaptionDemuxer {
            timescale: DEFAULT_TIMESCALE,
            buffer: Vec::new(),
            push_seq: 0,
            latest_dts: None,
            forwarded: HashMap::new(),
            active_channel: [None; 2],
            seen: [false; 4],
            decoders: [
                Cea608Decoder::new(CaptionChannel::CC1),
                Cea608Decoder::new(CaptionChannel::CC2),
                Cea608Decoder::new(CaptionChannel::CC3),
                Cea608Decoder::new(CaptionChannel::CC4),
            ],
        }
    }

    /// Create a demuxer with an explicit timescale in ticks per second.
    pub fn with_timescale(timescale: u32) -> Result<Self, CaptionError> {
        if timescale == 0 {
            return Err(CaptionError::ZeroTimescale);
        }
        let mut demuxer = Self::new();
        demuxer.timescale = timescale;
        Ok(demuxer)
    }

    /// Parse and buffer one SEI unit. No decoding happens until
    /// [`flush`](Self::flush).
    pub fn push(&mut self, unit: &SeiUnit<'_>) {
        let packets = parse_cc_packets(unit);
        if packets.is_empty() {
            return;
        }
        let seq = self.push_seq;
        self.push_seq += 1;
        self.buffer
            .extend(packets.into_iter().map(|packet| Pending { seq, packet }));
    }

    /// Sort, deduplicate, decode and drain everything buffered so far.
    ///
    /// Decoders are flushed afterwards so in-progress roll-up and paint-on
    /// captions are emitted with the last processed timestamp as their end.
    pub fn flush(&mut self) -> Vec<CaptionEvent> {
        let mut events = Vec::new();

        let mut pending = std::mem::take(&mut self.buffer);
        // Field interleaving makes SEI order differ from decode order
        pending.sort_by_key(|p| p.packet.dts);

        for p in pending {
            if self.is_duplicate(&p) {
                debug!(dts = p.packet.dts, "dropping re-delivered pair");
                continue;
            }
            self.forwarded.entry(p.packet.dts).or_default().push((
                p.packet.cc_type,
                p.packet.cc_data,
                p.seq,
            ));
            self.latest_dts = Some(match self.latest_dts {
                Some(latest) => latest.max(p.packet.dts),
                None => p.packet.dts,
            });
            self.route(&p.packet, &mut events);
        }

        if let Some(latest) = self.latest_dts {
            let horizon = latest - DEDUP_HORIZON_SECS * self.timescale as i64;
            self.forwarded.retain(|&dts, _| dts >= horizon);
        }

        for i in 0..self.decoders.len() {
            self.decoders[i].flush();
            self.drain_cues(i, &mut events);
        }

        events
    }

    /// Discard all buffered data and decoder state. Nothing is emitted.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.push_seq = 0;
        self.latest_dts = None;
        self.forwarded.clear();
        self.active_channel = [None; 2];
        self.seen = [false; 4];
        for decoder in &mut self.decoders {
            decoder.reset();
        }
    }

    /// Highest decode time forwarded so far.
    pub fn latest_dts(&self) -> Option<i64> {
        self.latest_dts
    }

    /// A pair at or before `latest_dts` whose content was already forwarded
    /// for the same dts by a different push is a re-delivered segment.
    fn is_duplicate(&self, p: &Pending) -> bool {
        let Some(latest) = self.latest_dts else {
            return false;
        };
        if p.packet.dts > latest {
            return false;
        }
        self.forwarded
            .get(&p.packet.dts)
            .is_some_and(|seen| {
                seen.iter().any(|&(cc_type, cc_data, seq)| {
                    cc_type == p.packet.cc_type && cc_data == p.packet.cc_data && seq != p.seq
                })
            })
    }

    fn route(&mut self, packet: &CcPacket, events: &mut Vec<CaptionEvent>) {
        if packet.cc_type >= 2 {
            // CEA-708, not handled here
            return;
        }
        let field = packet.field();

        // Channel-selecting control codes latch the field's data channel
        if packet.cc_data & 0x7800 == 0x1000 {
            self.active_channel[field as usize] = Some(0);
        } else if packet.cc_data & 0x7800 == 0x1800 {
            self.active_channel[field as usize] = Some(1);
        }
        let Some(channel) = self.active_channel[field as usize] else {
            // No channel selected yet on this field
            return;
        };

        let channel = CaptionChannel::from_field_channel(field, channel);
        let index = channel.index();
        if !self.seen[index] {
            self.seen[index] = true;
            debug!(%channel, "new caption stream");
            events.push(CaptionEvent::NewStream(channel));
        }
        self.decoders[index].push(packet);
        self.drain_cues(index, events);
    }

    fn drain_cues(&mut self, index: usize, events: &mut Vec<CaptionEvent>) {
        let cues = self.decoders[index].take_cues();
        for cue in cues {
            events.push(CaptionEvent::Cue(self.to_seconds(cue)));
        }
    }

    fn to_seconds(&self, cue: RawCue) -> Cue {
        Cue {
            start_time: cue.start_pts as f64 / self.timescale as f64,
            end_time: cue.end_pts as f64 / self.timescale as f64,
            text: cue.text,
            channel: cue.channel,
        }
    }
}
