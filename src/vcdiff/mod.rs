// VCDIFF format implementation (RFC 3284), plus the unofficial 'S'-version
// interleaved/checksum extension.
//
// This module implements decoding only: a chunked, restartable driver that
// turns any delivery of delta bytes -- one byte at a time or the whole file
// at once -- into decoded target output.
//
// # Modules
//
// - `varint`        — Variable-length integer encoding (base-128, big-endian)
// - `cursor`         — Non-destructive parse cursor over a buffered tail
// - `address_cache`  — NEAR/SAME address cache for COPY instruction addresses
// - `code_table`     — Default RFC 3284 code table, custom table load/serialize
// - `header`         — File header and per-window header parsing
// - `executor`        — Instruction dispatch and window reconstruction
// - `checksum`        — Adler-32, for the 'S'-version checksum extension
// - `sink`             — `DeltaSink`, the decoder's output collector
// - `error`             — The `DecodeError` taxonomy
// - `driver`             — The chunked `Decoder` state machine

pub mod address_cache;
pub mod checksum;
pub mod code_table;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod executor;
pub mod header;
pub mod sink;
pub mod varint;

pub use address_cache::AddressCache;
pub use code_table::{CodeTable, CodeTableEntry, Instruction};
pub use driver::{Decoder, DecoderOptions, decode_all, decode_all_with_options};
pub use error::{DecodeError, Section};
pub use header::{FileHeader, VCDIFF_MAGIC, Version, WindowHeader};
pub use sink::DeltaSink;
