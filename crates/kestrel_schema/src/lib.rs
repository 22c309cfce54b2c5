//! Framed wire protocol spoken between sandboxes and the coordinator.
//!
//! Every message is one atomic frame: a fixed 29-byte header followed by a
//! type-specific body. All integers are little-endian; body strings are
//! `u32le` length-prefixed UTF-8; the two header identifiers are fixed
//! 14-byte NUL-padded ASCII fields.

pub mod error_object;
mod frames;
mod wire;

pub use error_object::{
    ErrorLocation, SerializedError, KIND_EMPTY_SUITE, KIND_FAILING, KIND_TIMEOUT,
};
pub use frames::{
    Action, ActionBody, ErrorBody, Frame, FrameBody, FrameType, Kind, Location, LogBody, Status,
    StatusBody, WireContext,
};
pub use wire::{decode, encode, SchemaError, HEADER_LENGTH, ID_LENGTH};
