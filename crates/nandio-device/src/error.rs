//! Error types for packet reception
//!
//! no_std compatible; `std::error::Error` is implemented behind the `std`
//! feature.

use core::fmt;

/// Packet channel receive failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// Short read or bad magic. The protocol has no resynchronization, so
    /// a mismatched magic is indistinguishable from transport corruption.
    Transport,
    /// Header or payload checksum mismatch
    Crc,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport error"),
            Self::Crc => write!(f, "checksum mismatch"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ChannelError {}
