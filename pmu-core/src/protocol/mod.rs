//! The wire protocol (spec.md §4.F/§4.G/§4.H): byte-stuffed framing, the
//! command dispatcher, and the telemetry streamer.

pub mod commands;
pub mod crc;
pub mod frame;
pub mod telemetry;
