//! Error types surfaced to callers. Per spec.md §7, runtime engine errors
//! (div-by-zero, missing reference, out-of-bounds) are absorbed internally
//! and never show up here; only config/flash/protocol failures do.

/// Why a configuration blob was rejected. The prior graph is always left in
/// place when this is returned (spec.md §4.C, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Blob shorter than the fixed header.
    Truncated,
    /// Header version this decoder doesn't understand.
    BadVersion,
    /// Declared channel count would overflow the channel store.
    TooManyChannels,
    /// A record's type tag isn't one this decoder knows.
    UnknownRecordType,
    /// A record's declared length runs past the end of the blob.
    RecordOverrun,
}

/// Why a flash load didn't produce an active configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// No valid header magic at the start of the sector; sector is blank or foreign.
    Empty,
    /// Header's size field is out of the sector's bounds.
    SizeOutOfRange,
    /// Stored CRC16 didn't match the payload.
    CrcMismatch,
    /// The underlying erase or write call failed.
    WriteFailed,
}
