//! Protocol module: dialect definitions, typed message values, and the v2 frame codec.

pub mod codec;
pub mod crc;
pub mod dialect;
pub mod messages;
pub mod sequence;

pub use codec::{
    decode_frame, encode_frame, encode_message, split_datagram, Frame, FrameHeader, ProtocolError,
};
pub use dialect::{
    Dialect, DialectError, FieldDef, FieldType, MessageDef, HEARTBEAT_ID, HEARTBEAT_NAME,
};
pub use messages::{BuildError, FieldValue, Message};
pub use sequence::SequenceCounter;
