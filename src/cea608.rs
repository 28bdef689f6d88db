//! CEA-608 (Line 21) channel decoder.
//!
//! One decoder instance handles a single caption channel (CC1 through CC4).
//! It consumes parity-stripped byte pairs in decode order and accumulates
//! finished cues, which the caller drains with [`Cea608Decoder::take_cues`].
//!
//! # Format Overview
//!
//! - Two-byte control codes and character pairs
//! - Roll-up, pop-on, and paint-on caption modes
//! - 15 display rows; italics and underline via mid-row codes and PACs
//! - Control codes are transmitted twice; the repeat must be ignored

use tracing::debug;

use crate::charset::translate;
use crate::types::{CaptionChannel, CcPacket};

/// Lowest display row
const BOTTOM_ROW: usize = 14;

/// PAC row lookup keyed by `cc_data & 0x1720`. The index is the row number.
const ROWS: [u16; 15] = [
    0x1100, 0x1120, 0x1200, 0x1220, 0x1500, 0x1520, 0x1600, 0x1620, 0x1700, 0x1720, 0x1000,
    0x1300, 0x1320, 0x1400, 0x1420,
];

// Control code opcodes, combined with the per-channel control prefix.
const RCL: u8 = 0x20;
const BS: u8 = 0x21;
const RU2: u8 = 0x25;
const RU3: u8 = 0x26;
const RU4: u8 = 0x27;
const RDC: u8 = 0x29;
const EDM: u8 = 0x2c;
const CR: u8 = 0x2d;
const ENM: u8 = 0x2e;
const EOC: u8 = 0x2f;

/// A decoded caption with timestamps still in stream ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCue {
    pub start_pts: i64,
    pub end_pts: i64,
    pub text: String,
    pub channel: CaptionChannel,
}

/// One byte pair classified against a channel's code space, with its payload
/// bits decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Code {
    /// Null pair; keeps duplicate suppression intact but does nothing
    Padding,
    /// RCL, enters pop-on mode
    ResumeCaptionLoading,
    /// EOC, flips the display memories
    EndOfCaption,
    /// RU2/RU3/RU4 with the window height
    RollUp(usize),
    /// RDC, enters paint-on mode
    ResumeDirectCaptioning,
    /// CR, scrolls the roll-up window
    CarriageReturn,
    /// BS, deletes the last character on the write row
    Backspace,
    /// EDM, erases the displayed memory
    EraseDisplayed,
    /// ENM, erases the non-displayed memory
    EraseNonDisplayed,
    /// TO1-TO3; accepted, but columns are not tracked
    TabOffset,
    /// Special character, one glyph with no fallback
    Special(char),
    /// Extended character; replaces the fallback character before it
    Extended(char),
    /// Mid-row style change
    MidRow { italics: bool, underline: bool },
    /// Preamble address code; `row` is `None` for the one unassigned
    /// row pattern
    Pac {
        row: Option<usize>,
        underline: bool,
        italics: bool,
    },
    /// Two printable bytes; a zero second byte carries nothing
    Text(char, Option<char>),
    Unrecognized,
}

/// Caption display mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptionMode {
    /// No mode selected yet; writes land in the non-displayed buffer
    None,
    /// Captions composed off-screen and flipped in by EOC
    PopOn,
    /// Captions scroll within a 2-4 row window
    RollUp,
    /// Captions painted directly to the display
    PaintOn,
}

/// CEA-608 decoder state for one caption channel
#[derive(Debug)]
pub struct Cea608Decoder {
    channel: CaptionChannel,
    // Code-space constants for this field and data channel
    base: u8,
    ext: u8,
    offset: u8,
    control: u16,
    mode: CaptionMode,
    displayed: [String; 15],
    non_displayed: [String; 15],
    /// Current write row (roll-up base row while rolling up)
    row: usize,
    /// Top row of the roll-up window
    top_row: usize,
    roll_up_rows: usize,
    /// Open formatting tags, in the order they were opened
    formatting: Vec<&'static str>,
    /// Previous control pair, for mandated-duplicate suppression
    last_control_code: Option<u16>,
    start_pts: i64,
    last_pts: i64,
    /// Text has reached the display since the last erase/shift/emit
    caption_open: bool,
    cues: Vec<RawCue>,
}

impl Cea608Decoder {
    /// Create a decoder for one caption channel.
    pub fn new(channel: CaptionChannel) -> Self {
        let field = (channel.index() >> 1) as u8;
        let data_channel = (channel.index() & 1) as u8;
        let base = 0x10 | (data_channel << 3);
        Cea608Decoder {
            channel,
            base,
            ext: base | 0x01,
            offset: base | 0x07,
            control: ((0x14 | field | (data_channel << 3)) as u16) << 8,
            mode: CaptionMode::None,
            displayed: std::array::from_fn(|_| String::new()),
            non_displayed: std::array::from_fn(|_| String::new()),
            row: BOTTOM_ROW,
            top_row: BOTTOM_ROW,
            roll_up_rows: 2,
            formatting: Vec::new(),
            last_control_code: None,
            start_pts: 0,
            last_pts: 0,
            caption_open: false,
            cues: Vec::new(),
        }
    }

    /// The channel this decoder serves.
    pub fn channel(&self) -> CaptionChannel {
        self.channel
    }

    /// Process one byte pair.
    pub fn push(&mut self, packet: &CcPacket) {
        let data = packet.cc_data;
        let pts = packet.pts;
        self.last_pts = pts;

        // Control codes are transmitted twice; drop the immediate repeat.
        if Some(data) == self.last_control_code {
            self.last_control_code = None;
            return;
        }
        if data & 0xf000 == 0x1000 {
            self.last_control_code = Some(data);
        } else if data != 0 {
            self.last_control_code = None;
        }

        match self.classify(data) {
            Code::Padding => {}
            Code::ResumeCaptionLoading => self.set_pop_on(pts),
            Code::EndOfCaption => {
                // EOC acts as a pop-on operation regardless of the prior mode
                self.mode = CaptionMode::PopOn;
                self.clear_formatting();
                self.flush_displayed(pts);
                std::mem::swap(&mut self.displayed, &mut self.non_displayed);
                for row in &mut self.non_displayed {
                    row.clear();
                }
                self.start_pts = pts;
                self.caption_open = self.displayed.iter().any(|r| !r.trim().is_empty());
            }
            Code::RollUp(rows) => {
                self.roll_up_rows = rows;
                self.set_roll_up(pts, None);
            }
            Code::CarriageReturn => {
                if self.mode == CaptionMode::RollUp {
                    self.clear_formatting();
                    self.flush_displayed(pts);
                    self.shift_rows_up();
                    self.start_pts = pts;
                    self.caption_open = false;
                }
            }
            Code::Backspace => {
                let row = self.row;
                self.write_buffer()[row].pop();
            }
            Code::EraseDisplayed => {
                // In roll-up and paint-on the open tags sit in the displayed
                // memory; close them before it leaves as a cue. Pop-on tags
                // belong to the off-screen composition and stay open.
                if matches!(self.mode, CaptionMode::RollUp | CaptionMode::PaintOn) {
                    self.clear_formatting();
                }
                self.flush_displayed(pts);
                for row in &mut self.displayed {
                    row.clear();
                }
                self.caption_open = false;
            }
            Code::EraseNonDisplayed => {
                for row in &mut self.non_displayed {
                    row.clear();
                }
            }
            Code::ResumeDirectCaptioning => {
                if self.mode != CaptionMode::PaintOn {
                    self.clear_formatting();
                    self.flush_displayed(pts);
                    self.wipe_buffers();
                }
                self.mode = CaptionMode::PaintOn;
                self.start_pts = pts;
            }
            Code::Special(glyph) => self.write_char(glyph),
            Code::Extended(glyph) => {
                // Extended characters replace the standard character sent
                // just before them as a fallback for older decoders.
                let row = self.row;
                self.write_buffer()[row].pop();
                self.write_char(glyph);
            }
            Code::MidRow { italics, underline } => {
                // Attributes are not additive; a mid-row code resets them
                // and always occupies one space.
                self.clear_formatting();
                self.write_char(' ');
                if italics {
                    self.add_formatting("i");
                }
                if underline {
                    self.add_formatting("u");
                }
            }
            Code::TabOffset => {}
            Code::Pac {
                row,
                underline,
                italics,
            } => {
                let mut row = row.unwrap_or(self.row);
                if self.mode == CaptionMode::RollUp {
                    // The window must fit above the base row
                    if row + 1 < self.roll_up_rows {
                        row = self.roll_up_rows - 1;
                    }
                    self.set_roll_up(pts, Some(row));
                }
                if row != self.row {
                    self.clear_formatting();
                    self.row = row;
                }
                if underline && !self.formatting.contains(&"u") {
                    self.add_formatting("u");
                }
                if italics {
                    self.add_formatting("i");
                }
            }
            Code::Text(first, second) => {
                self.write_char(first);
                if let Some(second) = second {
                    self.write_char(second);
                }
            }
            Code::Unrecognized => {
                debug!(channel = %self.channel, data, "unrecognized byte pair");
            }
        }
    }

    /// Classify one parity-stripped pair against this channel's code space.
    fn classify(&self, data: u16) -> Code {
        let char0 = (data >> 8) as u8;
        let char1 = (data & 0xff) as u8;

        if data == 0 {
            Code::Padding
        } else if data == self.cmd(RCL) {
            Code::ResumeCaptionLoading
        } else if data == self.cmd(EOC) {
            Code::EndOfCaption
        } else if data == self.cmd(RU2) {
            Code::RollUp(2)
        } else if data == self.cmd(RU3) {
            Code::RollUp(3)
        } else if data == self.cmd(RU4) {
            Code::RollUp(4)
        } else if data == self.cmd(CR) {
            Code::CarriageReturn
        } else if data == self.cmd(BS) {
            Code::Backspace
        } else if data == self.cmd(EDM) {
            Code::EraseDisplayed
        } else if data == self.cmd(ENM) {
            Code::EraseNonDisplayed
        } else if data == self.cmd(RDC) {
            Code::ResumeDirectCaptioning
        } else if self.is_special_char(char0, char1) {
            Code::Special(translate((((char0 & 0x03) as u16) << 8) | char1 as u16))
        } else if self.is_ext_char(char0, char1) {
            Code::Extended(translate((((char0 & 0x03) as u16) << 8) | char1 as u16))
        } else if self.is_mid_row_code(char0, char1) {
            Code::MidRow {
                italics: char1 & 0x0e == 0x0e,
                underline: char1 & 0x01 == 0x01,
            }
        } else if self.is_offset_code(char0, char1) {
            Code::TabOffset
        } else if self.is_pac(char0, char1) {
            Code::Pac {
                row: ROWS.iter().position(|&r| r == data & 0x1720),
                underline: char1 & 0x01 == 0x01,
                // only the white-italics color pattern maps to a tag
                italics: Self::is_color_pac(char1) && char1 & 0x0e == 0x0e,
            }
        } else if Self::is_normal_char(char0) {
            let second = if char1 != 0 {
                Some(translate(char1 as u16))
            } else {
                None
            };
            Code::Text(translate(char0 as u16), second)
        } else {
            Code::Unrecognized
        }
    }

    /// Emit the in-progress caption, if any, ending at the last processed
    /// packet's timestamp.
    ///
    /// The displayed memory stays on screen, so the caption restarts at the
    /// flush point; a later erase emits only the remainder instead of
    /// repeating the span already reported.
    pub fn flush(&mut self) {
        if self.caption_open {
            self.clear_formatting();
            self.flush_displayed(self.last_pts);
            self.start_pts = self.last_pts;
            self.caption_open = false;
        }
    }

    /// Drain accumulated cues in emission order.
    pub fn take_cues(&mut self) -> Vec<RawCue> {
        std::mem::take(&mut self.cues)
    }

    /// Return to the freshly constructed state.
    pub fn reset(&mut self) {
        self.mode = CaptionMode::None;
        for row in &mut self.displayed {
            row.clear();
        }
        for row in &mut self.non_displayed {
            row.clear();
        }
        self.row = BOTTOM_ROW;
        self.top_row = BOTTOM_ROW;
        self.roll_up_rows = 2;
        self.formatting.clear();
        self.last_control_code = None;
        self.start_pts = 0;
        self.last_pts = 0;
        self.caption_open = false;
        self.cues.clear();
    }

    fn cmd(&self, op: u8) -> u16 {
        self.control | op as u16
    }

    fn is_special_char(&self, char0: u8, char1: u8) -> bool {
        char0 == self.ext && (0x30..=0x3f).contains(&char1)
    }

    fn is_ext_char(&self, char0: u8, char1: u8) -> bool {
        (char0 == self.ext + 1 || char0 == self.ext + 2) && (0x20..=0x3f).contains(&char1)
    }

    fn is_mid_row_code(&self, char0: u8, char1: u8) -> bool {
        char0 == self.ext && (0x20..=0x2f).contains(&char1)
    }

    fn is_offset_code(&self, char0: u8, char1: u8) -> bool {
        char0 == self.offset && (0x21..=0x23).contains(&char1)
    }

    fn is_pac(&self, char0: u8, char1: u8) -> bool {
        (self.base..self.base + 8).contains(&char0) && (0x40..=0x7f).contains(&char1)
    }

    fn is_color_pac(char1: u8) -> bool {
        (0x40..=0x4f).contains(&char1) || (0x60..=0x7f).contains(&char1)
    }

    fn is_normal_char(char0: u8) -> bool {
        (0x20..=0x7f).contains(&char0)
    }

    /// The buffer writes currently land in.
    fn write_buffer(&mut self) -> &mut [String; 15] {
        match self.mode {
            CaptionMode::PopOn | CaptionMode::None => &mut self.non_displayed,
            CaptionMode::RollUp | CaptionMode::PaintOn => &mut self.displayed,
        }
    }

    fn write_char(&mut self, c: char) {
        let row = self.row;
        let on_display = matches!(self.mode, CaptionMode::RollUp | CaptionMode::PaintOn);
        self.write_buffer()[row].push(c);
        if on_display {
            self.caption_open = true;
        }
    }

    fn write_str(&mut self, s: &str) {
        let row = self.row;
        let on_display = matches!(self.mode, CaptionMode::RollUp | CaptionMode::PaintOn);
        self.write_buffer()[row].push_str(s);
        if on_display {
            self.caption_open = true;
        }
    }

    fn add_formatting(&mut self, tag: &'static str) {
        self.formatting.push(tag);
        let open = format!("<{tag}>");
        self.write_str(&open);
    }

    fn clear_formatting(&mut self) {
        if self.formatting.is_empty() {
            return;
        }
        let mut closing = String::new();
        for tag in self.formatting.drain(..).rev() {
            closing.push_str("</");
            closing.push_str(tag);
            closing.push('>');
        }
        self.write_str(&closing);
    }

    fn set_pop_on(&mut self, pts: i64) {
        if self.mode != CaptionMode::PopOn {
            // Close tags while the outgoing mode's write buffer is current
            self.clear_formatting();
            self.flush_displayed(pts);
            self.wipe_buffers();
        }
        self.mode = CaptionMode::PopOn;
    }

    fn set_roll_up(&mut self, pts: i64, new_base: Option<usize>) {
        if self.mode != CaptionMode::RollUp {
            // Close tags while the outgoing mode's write buffer is current
            self.clear_formatting();
            self.flush_displayed(pts);
            self.wipe_buffers();
            self.row = BOTTOM_ROW;
            self.mode = CaptionMode::RollUp;
        }
        if let Some(new_base) = new_base {
            if new_base != self.row {
                // Move the visible window to the new base row
                for i in 0..self.roll_up_rows {
                    let (Some(dst), Some(src)) =
                        (new_base.checked_sub(i), self.row.checked_sub(i))
                    else {
                        break;
                    };
                    if dst <= BOTTOM_ROW && src <= BOTTOM_ROW {
                        self.displayed[dst] = std::mem::take(&mut self.displayed[src]);
                    }
                }
            }
        }
        let base = new_base.unwrap_or(self.row);
        self.top_row = (base + 1).saturating_sub(self.roll_up_rows);
    }

    /// Scroll the roll-up window up one row.
    fn shift_rows_up(&mut self) {
        for i in 0..self.top_row {
            self.displayed[i].clear();
        }
        for i in self.row + 1..=BOTTOM_ROW {
            self.displayed[i].clear();
        }
        for i in self.top_row..self.row {
            self.displayed[i] = std::mem::take(&mut self.displayed[i + 1]);
        }
        self.displayed[self.row].clear();
    }

    /// Wipe both memories and drop any open formatting.
    fn wipe_buffers(&mut self) {
        for row in &mut self.displayed {
            row.clear();
        }
        for row in &mut self.non_displayed {
            row.clear();
        }
        self.formatting.clear();
        self.caption_open = false;
    }

    /// Emit the displayed memory as a cue if it holds any text.
    fn flush_displayed(&mut self, pts: i64) {
        let content: String = self
            .displayed
            .iter()
            .map(|row| row.trim())
            .collect::<Vec<_>>()
            .join("\n");
        let content = content.trim_matches('\n');
        if !content.is_empty() {
            debug!(channel = %self.channel, start = self.start_pts, end = pts, "caption");
            self.cues.push(RawCue {
                start_pts: self.start_pts,
                end_pts: pts,
                text: content.to_string(),
                channel: self.channel,
            });
        }
    }
}
