use thiserror::Error;

/// A logical section of a window body, named in section-length-mismatch
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Data,
    Instructions,
    Addresses,
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Section::Data => "data",
            Section::Instructions => "instructions",
            Section::Addresses => "addresses",
        };
        write!(f, "{name}")
    }
}

/// The complete taxonomy of ways a delta can be rejected.
///
/// Every variant is a terminal condition: once returned from
/// [`crate::vcdiff::Decoder::decode_chunk`] or
/// [`crate::vcdiff::Decoder::finish`], the decoder that produced it is
/// poisoned and must not be driven further.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("bad magic byte at offset {offset}: expected {expected:#04x}, found {found:#04x}")]
    BadMagic {
        offset: usize,
        expected: u8,
        found: u8,
    },

    #[error("unsupported VCDIFF version byte {version:#04x}")]
    UnsupportedVersion { version: u8 },

    #[error("unsupported feature: {feature}")]
    UnsupportedFeature { feature: &'static str },

    #[error("malformed varint at offset {offset}")]
    MalformedVarint { offset: usize },

    #[error("malformed header: {reason}")]
    MalformedHeader { reason: String },

    #[error("size limit exceeded: {reason}")]
    SizeLimitExceeded { reason: String },

    #[error("invalid COPY address {address} (here={here})")]
    BadAddress { address: u64, here: u64 },

    #[error("bad opcode {opcode}: {reason}")]
    BadOpcode { opcode: u8, reason: String },

    #[error("{section} section length mismatch: expected {expected} bytes, consumed {actual}")]
    SectionLengthMismatch {
        section: Section,
        expected: u64,
        actual: u64,
    },

    #[error("checksum mismatch: header declared {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("VCD_TARGET windows are disallowed by this decoder's options")]
    VcdTargetDisallowed,

    #[error("decoder lifecycle violation: {reason}")]
    LifecycleViolation { reason: &'static str },
}
