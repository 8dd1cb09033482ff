// src/core/protocol/mod.rs

pub mod resp_frame;
pub mod resp_value;

pub use resp_frame::{RespFrame, RespFrameCodec, command_wire_len, encode_command, parse_frame};
pub use resp_value::RespValue;
