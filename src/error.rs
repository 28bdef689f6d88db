//! Caption demuxing errors

use thiserror::Error;

/// Errors from caption extraction
#[derive(Error, Debug)]
pub enum CaptionError {
    /// Caption packet text must be exactly two characters
    #[error("caption packet expects exactly 2 characters, got {0}")]
    InvalidPacketLength(usize),

    /// Caption packet characters must be 7-bit
    #[error("caption packet character {0:?} is not 7-bit")]
    InvalidPacketChar(char),

    /// Timescale must be nonzero
    #[error("timescale must be nonzero")]
    ZeroTimescale,
}
