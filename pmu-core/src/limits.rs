//! Compile-time capacities for every fixed-size table in the core.
//!
//! Sized from spec.md §3/§9's guidance ("maxima plus ~30% slack"). Keeping
//! every capacity here means a board integrator can see the whole static
//! footprint in one place instead of hunting array declarations.

/// Total channel store capacity (physical in + physical out + virtual).
pub const MAX_CHANNELS: usize = 256;

/// Virtual channels loadable from a single configuration blob.
pub const MAX_VIRTUAL_CHANNELS: usize = 192;

/// Physical analog input count (runtime ids 0..=19 per spec.md §3).
pub const MAX_ANALOG_INPUTS: usize = 20;

/// Physical digital input count (runtime ids 50..=57 per spec.md §3).
pub const MAX_DIGITAL_INPUTS: usize = 8;

/// Physical power output slots.
pub const MAX_POWER_OUTPUTS: usize = 24;

/// Power-output bindings decoded from a configuration blob.
pub const MAX_OUTPUT_BINDINGS: usize = MAX_POWER_OUTPUTS;

/// Physical output pins a single binding may gang together.
pub const MAX_PINS_PER_BINDING: usize = 4;

/// Channel name length, including no terminator (spec.md §3: "bounded, <=32 chars").
pub const MAX_NAME_LEN: usize = 32;

/// Max input refs on a single Logic node.
pub const MAX_LOGIC_INPUTS: usize = 2;

/// Max input refs on a single Math node.
pub const MAX_MATH_INPUTS: usize = 8;

/// Max breakpoints in a Math `LookupN` table.
pub const MAX_LOOKUP_POINTS: usize = 12;

/// Max ring size for filter nodes (spec.md §3: "window size (<=16)").
pub const MAX_FILTER_WINDOW: usize = 16;

/// Max virtual channels surfaced per telemetry frame (spec.md §4.H).
pub const TELEMETRY_MAX_CHANNELS: usize = 16;

/// Staging buffer for one outbound frame (spec.md §4.F: "~600 bytes").
pub const TX_STAGING_CAPACITY: usize = 600;

/// Bounded RX ring drained between TX bytes (spec.md §4.F: "~256 bytes").
pub const RX_RING_CAPACITY: usize = 256;

/// Largest payload a single frame can carry (length byte is 0..=255).
pub const MAX_FRAME_PAYLOAD: usize = 255;

/// Configuration blob buffer held by the dispatcher/flash store.
pub const MAX_CONFIG_BLOB_LEN: usize = 8192;

/// Bytes of payload per `GET_CONFIG`/`LOAD_BINARY` chunk (spec.md §4.G: "up to 251 bytes").
pub const CONFIG_CHUNK_PAYLOAD_LEN: usize = 251;
