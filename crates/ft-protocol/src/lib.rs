//! CPU↔DSP wire protocol: framing, message catalog, and response bookkeeping.
//!
//! The wire format is a fixed, unescaped frame:
//!
//! ```text
//! START_BYTE(0xF0) | msg_type(u8) | msg_id(u8) | payload_length(u8) | payload[len]
//! ```
//!
//! There is no byte-stuffing: a corrupt or truncated frame is recovered from
//! by construction, because the parser always re-synchronises on the next
//! `START_BYTE` rather than attempting to resume mid-frame.

#![cfg_attr(not(test), no_std)]

pub mod frame;
pub mod message;
pub mod pending;

pub use frame::{FrameParser, RawFrame, START_BYTE};
pub use message::{
    GetParamNamePayload, GetParamValuePayload, Message, ModuleMessage, ParamNamePayload,
    ParamValuePayload, PortStatePayload, ProfilePayload, SetParamValuePayload, SetPortStatePayload,
    SystemMessage, MAX_PARAM_NAME_LENGTH,
};
pub use pending::PendingResponses;

use thiserror_no_std::Error;

/// Errors raised while decoding or encoding a protocol message.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// `msg_type` byte did not match `MODULE` or `SYSTEM`.
    #[error("unknown message type {0}")]
    UnknownMsgType(u8),
    /// `msg_id` byte did not match any message known for that type.
    #[error("unknown message id {0}")]
    UnknownMsgId(u8),
    /// Declared payload length did not match what the message requires.
    #[error("payload length {got} does not match expected {expected}")]
    BadPayloadLength {
        /// Length actually present.
        got: usize,
        /// Length the decoded message requires.
        expected: usize,
    },
}
