//! Configuration blob decoder (spec.md §4.C). Turns a TLV-shaped byte slice
//! into virtual-channel definitions and output bindings, resolving every
//! reference through a JSON-id → runtime-id mapping built while decoding.
//!
//! Wire layout (little-endian throughout; this exact byte schema is a
//! device-level ABI of this implementation, since spec.md leaves it to "the
//! host authoring tool" — see DESIGN.md):
//!
//! ```text
//! header:  version:u8  reserved:u8  record_count:u16
//! record:  tag:u8  json_id:u16  len:u8  payload[len]
//! ```
//!
//! `json_id == 0` means "anonymous" — the record's own output is never
//! referenced by another node, so no mapping entry is recorded for it.
//! Reference fields inside a payload follow the same convention: `0` always
//! resolves to `ChannelId::NONE` (spec.md §4.C: "unresolved references
//! become 0").

mod decode;
mod validate;

pub use decode::{decode, DecodedConfig};
pub use validate::{validate_dependency_order, DependencyWarning};

const HEADER_LEN: usize = 4;
const RECORD_HEADER_LEN: usize = 4;
const SUPPORTED_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum RecordTag {
    Logic = 1,
    Math = 2,
    Timer = 3,
    Filter = 4,
    Switch = 5,
    PowerOutputBinding = 6,
}

impl RecordTag {
    fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(RecordTag::Logic),
            2 => Some(RecordTag::Math),
            3 => Some(RecordTag::Timer),
            4 => Some(RecordTag::Filter),
            5 => Some(RecordTag::Switch),
            6 => Some(RecordTag::PowerOutputBinding),
            _ => None,
        }
    }
}
