//! End-to-end demuxer tests built on hand-assembled SEI units.

use cea608_demux::{CaptionChannel, CaptionDemuxer, CaptionEvent, Cue, NalUnitType, SeiUnit};

/// Assemble a GA94 caption SEI RBSP from (cc_type, cc_data) pairs.
fn sei_rbsp(pairs: &[(u8, u16)]) -> Vec<u8> {
    let mut payload = vec![181, 0x00, 0x31, b'G', b'A', b'9', b'4', 3];
    payload.push(0x40 | pairs.len() as u8);
    payload.push(0xff); // reserved
    for &(cc_type, cc_data) in pairs {
        payload.push(0xfc | cc_type);
        payload.push((cc_data >> 8) as u8);
        payload.push((cc_data & 0xff) as u8);
    }
    payload.push(0xff); // marker_bits

    let mut rbsp = vec![0x04, payload.len() as u8];
    rbsp.extend_from_slice(&payload);
    rbsp.push(0x80);
    rbsp
}

fn push(demuxer: &mut CaptionDemuxer, pts: i64, dts: i64, pairs: &[(u8, u16)]) {
    let rbsp = sei_rbsp(pairs);
    demuxer.push(&SeiUnit {
        nal_unit_type: NalUnitType::SeiRbsp,
        escaped_rbsp: &rbsp,
        pts,
        dts,
    });
}

fn chars(text: &str) -> u16 {
    let b = text.as_bytes();
    ((b[0] as u16) << 8) | b[1] as u16
}

fn cues(events: Vec<CaptionEvent>) -> Vec<Cue> {
    events
        .into_iter()
        .filter_map(|e| match e {
            CaptionEvent::Cue(cue) => Some(cue),
            CaptionEvent::NewStream(_) => None,
        })
        .collect()
}

const RCL: u16 = 0x1420;
const RU2: u16 = 0x1425;
const EDM: u16 = 0x142c;
const CR: u16 = 0x142d;
const EOC: u16 = 0x142f;

#[test]
fn extracts_a_pop_on_caption() {
    let mut demuxer = CaptionDemuxer::new();
    push(
        &mut demuxer,
        0,
        0,
        &[(0, RCL), (0, chars("hi")), (0, EOC)],
    );
    push(&mut demuxer, 90_000, 90_000, &[(0, EDM)]);

    let events = demuxer.flush();
    assert_eq!(events[0], CaptionEvent::NewStream(CaptionChannel::CC1));
    let cues = cues(events);
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].text, "hi");
    assert_eq!(cues[0].start_time, 0.0);
    assert_eq!(cues[0].end_time, 1.0);
    assert_eq!(cues[0].channel, CaptionChannel::CC1);
}

#[test]
fn new_stream_is_reported_once_per_channel() {
    let mut demuxer = CaptionDemuxer::new();
    push(&mut demuxer, 0, 0, &[(0, RU2), (0, chars("ab")), (0, CR)]);
    let first: Vec<_> = demuxer
        .flush()
        .into_iter()
        .filter(|e| matches!(e, CaptionEvent::NewStream(_)))
        .collect();
    assert_eq!(first, vec![CaptionEvent::NewStream(CaptionChannel::CC1)]);

    push(&mut demuxer, 1000, 1000, &[(0, chars("cd")), (0, CR)]);
    let second = demuxer.flush();
    assert!(!second
        .iter()
        .any(|e| matches!(e, CaptionEvent::NewStream(_))));
}

#[test]
fn routes_both_fields_to_their_channels() {
    let mut demuxer = CaptionDemuxer::new();
    // field 1 carries CC1, field 2 carries CC3
    push(
        &mut demuxer,
        0,
        0,
        &[
            (0, RCL),
            (1, 0x1520),
            (0, chars("1a")),
            (1, chars("3c")),
            (0, EOC),
            (1, 0x152f),
        ],
    );
    push(&mut demuxer, 9000, 9000, &[(0, EDM), (1, 0x152c)]);

    let events = demuxer.flush();
    let streams: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, CaptionEvent::NewStream(_)))
        .collect();
    assert_eq!(streams.len(), 2);

    let cues = cues(events);
    assert_eq!(cues.len(), 2);
    let cc1 = cues.iter().find(|c| c.channel == CaptionChannel::CC1).unwrap();
    let cc3 = cues.iter().find(|c| c.channel == CaptionChannel::CC3).unwrap();
    assert_eq!(cc1.text, "1a");
    assert_eq!(cc3.text, "3c");
}

#[test]
fn switches_data_channels_mid_field() {
    let mut demuxer = CaptionDemuxer::new();
    push(
        &mut demuxer,
        0,
        0,
        &[
            (0, RU2),
            (0, chars("1a")),
            (0, CR),
            // data channel 2 control codes move the field to CC2
            (0, 0x1c25),
            (0, chars("2b")),
            (0, 0x1c2d),
        ],
    );

    let cues = cues(demuxer.flush());
    assert_eq!(cues.len(), 2);
    assert_eq!(cues[0].channel, CaptionChannel::CC1);
    assert_eq!(cues[0].text, "1a");
    assert_eq!(cues[1].channel, CaptionChannel::CC2);
    assert_eq!(cues[1].text, "2b");
}

#[test]
fn drops_data_sent_before_any_channel_selection() {
    let mut demuxer = CaptionDemuxer::new();
    push(&mut demuxer, 0, 0, &[(0, chars("no")), (0, chars("pe"))]);
    assert!(demuxer.flush().is_empty());
}

#[test]
fn filters_cea708_packets() {
    let mut demuxer = CaptionDemuxer::new();
    push(
        &mut demuxer,
        0,
        0,
        &[(2, 0x1234), (3, 0x5678), (0, RU2), (0, chars("ok")), (0, CR)],
    );
    let cues = cues(demuxer.flush());
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].text, "ok");
}

#[test]
fn sorts_buffered_units_by_dts() {
    let mut demuxer = CaptionDemuxer::new();
    // the erase arrives first in SEI order but later in decode order
    push(&mut demuxer, 18_000, 18_000, &[(0, EDM)]);
    push(
        &mut demuxer,
        9000,
        9000,
        &[(0, RCL), (0, chars("hi")), (0, EOC)],
    );

    let cues = cues(demuxer.flush());
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].text, "hi");
    assert_eq!(cues[0].start_time, 0.1);
    assert_eq!(cues[0].end_time, 0.2);
}

#[test]
fn drops_redelivered_segments() {
    let mut demuxer = CaptionDemuxer::new();
    let segment = [(0, RU2), (0, chars("hi")), (0, CR)];
    push(&mut demuxer, 1000, 1000, &segment);
    push(&mut demuxer, 1000, 1000, &segment);

    let cues = cues(demuxer.flush());
    assert_eq!(cues.len(), 1);
}

#[test]
fn drops_redelivered_segments_across_flushes() {
    let mut demuxer = CaptionDemuxer::new();
    push(&mut demuxer, 1000, 1000, &[(0, RU2), (0, chars("hi"))]);
    push(&mut demuxer, 2000, 2000, &[(0, CR)]);
    assert_eq!(cues(demuxer.flush()).len(), 1);

    // the same two units come around again
    push(&mut demuxer, 1000, 1000, &[(0, RU2), (0, chars("hi"))]);
    push(&mut demuxer, 2000, 2000, &[(0, CR)]);
    assert!(cues(demuxer.flush()).is_empty());

    // genuinely new data still decodes; the roll-up window kept "hi"
    push(&mut demuxer, 3000, 3000, &[(0, chars("yo")), (0, CR)]);
    let fresh = cues(demuxer.flush());
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].text, "hi\nyo");
}

#[test]
fn doubled_control_codes_within_a_unit_are_forwarded() {
    let mut demuxer = CaptionDemuxer::new();
    // broadcast streams double every control code at the same timestamp
    push(
        &mut demuxer,
        0,
        0,
        &[
            (0, RCL),
            (0, RCL),
            (0, chars("hi")),
            (0, EOC),
            (0, EOC),
        ],
    );
    push(&mut demuxer, 9000, 9000, &[(0, EDM), (0, EDM)]);

    let cues = cues(demuxer.flush());
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].text, "hi");
}

#[test]
fn tracks_latest_dts_and_clears_it_on_reset() {
    let mut demuxer = CaptionDemuxer::new();
    push(&mut demuxer, 13_000, 13_000, &[(0, RU2)]);
    demuxer.flush();
    assert_eq!(demuxer.latest_dts(), Some(13_000));

    demuxer.reset();
    assert_eq!(demuxer.latest_dts(), None);

    push(&mut demuxer, 4000, 4000, &[(0, RU2)]);
    demuxer.flush();
    assert_eq!(demuxer.latest_dts(), Some(4000));
}

#[test]
fn reset_drops_channel_selection_and_buffers() {
    let mut demuxer = CaptionDemuxer::new();
    push(&mut demuxer, 0, 0, &[(0, RU2), (0, chars("ab"))]);
    demuxer.reset();

    // without a fresh channel-selecting code the field is inactive again
    push(&mut demuxer, 1000, 1000, &[(0, chars("cd")), (0, CR)]);
    assert!(demuxer.flush().is_empty());
}

#[test]
fn flush_completes_open_roll_up_captions() {
    let mut demuxer = CaptionDemuxer::new();
    push(&mut demuxer, 0, 0, &[(0, RU2)]);
    push(&mut demuxer, 9000, 9000, &[(0, chars("hi"))]);

    let cues = cues(demuxer.flush());
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].text, "hi");
    assert_eq!(cues[0].end_time, 0.1);
}

#[test]
fn caption_spanning_two_flushes_does_not_repeat_its_first_span() {
    let mut demuxer = CaptionDemuxer::new();
    push(
        &mut demuxer,
        1000,
        1000,
        &[(0, RCL), (0, chars("hi")), (0, EOC)],
    );
    // null padding advances the clock to the end of the first segment
    push(&mut demuxer, 1500, 1500, &[(0, 0)]);
    let first = cues(demuxer.flush());
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].text, "hi");

    push(&mut demuxer, 2000, 2000, &[(0, EDM)]);
    let second = cues(demuxer.flush());
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].text, "hi");
    // the second cue picks up where the first left off
    assert_eq!(second[0].start_time, first[0].end_time);
    assert_eq!(second[0].end_time, 2000.0 / 90_000.0);
}

#[test]
fn honors_a_custom_timescale() {
    let mut demuxer = CaptionDemuxer::with_timescale(1000).unwrap();
    push(
        &mut demuxer,
        3000,
        3000,
        &[(0, RU2), (0, chars("hi")), (0, CR)],
    );

    let cues = cues(demuxer.flush());
    assert_eq!(cues[0].start_time, 0.0);
    assert_eq!(cues[0].end_time, 3.0);
}

#[test]
fn ignores_units_without_caption_payloads() {
    let mut demuxer = CaptionDemuxer::new();
    // pic_timing message only
    let rbsp = vec![0x01, 0x02, 0xaa, 0xbb, 0x80];
    demuxer.push(&SeiUnit {
        nal_unit_type: NalUnitType::SeiRbsp,
        escaped_rbsp: &rbsp,
        pts: 0,
        dts: 0,
    });
    assert!(demuxer.flush().is_empty());
}
