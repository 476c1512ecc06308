//! Oxidelta: a streaming VCDIFF (RFC 3284) decoder, plus the unofficial
//! 'S'-version interleaved/checksum extension.
//!
//! This crate implements decoding only -- producing a VCDIFF delta is out
//! of scope. The entry points are [`vcdiff::Decoder`], for chunked or
//! restartable input, and [`vcdiff::decode_all`] for the common case where
//! the whole delta is already in memory.
//!
//! # Quick Start
//!
//! ```
//! use oxidelta::vcdiff::decode_all;
//!
//! let source = b"hello old world";
//! // A minimal VCDIFF delta: one VCD_SOURCE window that COPYs all 15
//! // source bytes to the target (opcode 19 = COPY mode 0, explicit size).
//! let delta: &[u8] = &[
//!     0xD6, 0xC3, 0xC4, 0x00, 0x00, // magic + version + header indicator
//!     0x01,             // window indicator: VCD_SOURCE
//!     0x0F, 0x00,       // source segment length=15, position=0
//!     0x08,             // length of the delta encoding that follows
//!     0x0F,             // target window length = 15
//!     0x00,             // delta indicator (no secondary compression)
//!     0x00, 0x02, 0x01, // data/instructions/addresses section lengths
//!     0x13, 0x0F,       // instructions: COPY mode 0, size 15
//!     0x00,             // addresses: mode VCD_SELF, address 0
//! ];
//!
//! let decoded = decode_all(source, delta).unwrap();
//! assert_eq!(decoded, source);
//! ```

pub mod vcdiff;
