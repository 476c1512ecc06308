// VCDIFF file and window headers (RFC 3284 Sections 4.1-4.3), generalized to
// the unofficial 'S'-version extension: an alternate version byte that
// permits an interleaved data/instructions/addresses layout and an optional
// per-window Adler-32 checksum.
//
// Every parse function here takes a `Cursor` over the *entire still-buffered
// unparsed tail* and returns `Ok(None)` when that tail doesn't yet hold a
// complete structure. Callers never roll back a `Cursor` -- they simply
// discard it and try again from scratch once more bytes have arrived, which
// is cheap because headers are tiny and needs no checkpoint bookkeeping.

use bitflags::bitflags;

use crate::vcdiff::cursor::Cursor;
use crate::vcdiff::error::DecodeError;
use crate::vcdiff::varint::sizeof_u64;

/// The three VCDIFF magic bytes, common to both version bytes.
pub const VCDIFF_MAGIC: [u8; 3] = [0xD6, 0xC3, 0xC4];

/// Hard ceiling on any single window's target size: 2^31 - 1, the largest
/// value representable by the format's 31-bit size integers.
pub const HARD_MAX_WINSIZE: u64 = (1u64 << 31) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// Plain RFC 3284, version byte 0x00.
    Rfc3284,
    /// The unofficial 'S' (0x53) interleaved/checksum extension.
    Interleaved,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderIndicator: u8 {
        /// Secondary-compressor table follows (not implemented; rejected).
        const VCD_DECOMPRESS = 0x01;
        /// A custom code table follows the application header.
        const VCD_CODETABLE  = 0x02;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WinIndicator: u8 {
        /// Window has a source segment drawn from the dictionary.
        const VCD_SOURCE   = 0x01;
        /// Window has a source segment drawn from previously-decoded target.
        const VCD_TARGET   = 0x02;
        /// Window carries an Adler-32 checksum ('S' version only).
        const VCD_CHECKSUM = 0x04;
    }
}

/// The delta indicator byte. RFC 3284 reserves bits for secondary
/// compression of the data/inst/addr sections; this decoder implements no
/// secondary compressor, so any nonzero value is rejected outright.
pub type DeltaIndicator = u8;

#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    pub version: Version,
    pub indicator: HeaderIndicator,
}

/// Parse the four-byte VCDIFF file header (magic + version + indicator).
///
/// Fails fast on the first mismatching magic byte rather than waiting for
/// all three to accumulate, so a caller feeding one byte at a time sees an
/// error as soon as it's knowable.
pub fn parse_file_header(cur: &mut Cursor<'_>) -> Result<Option<FileHeader>, DecodeError> {
    for &expected in VCDIFF_MAGIC.iter() {
        match cur.peek_byte() {
            None => return Ok(None),
            Some(found) if found == expected => {
                cur.consume_byte();
            }
            Some(found) => {
                return Err(DecodeError::BadMagic {
                    offset: cur.position(),
                    expected,
                    found,
                });
            }
        }
    }

    let version_byte = match cur.consume_byte() {
        Some(b) => b,
        None => return Ok(None),
    };
    let version = match version_byte {
        0x00 => Version::Rfc3284,
        0x53 => Version::Interleaved,
        other => return Err(DecodeError::UnsupportedVersion { version: other }),
    };

    let indicator_byte = match cur.consume_byte() {
        Some(b) => b,
        None => return Ok(None),
    };
    let indicator = HeaderIndicator::from_bits(indicator_byte).ok_or_else(|| {
        DecodeError::MalformedHeader {
            reason: format!("invalid header indicator bits {indicator_byte:#04x}"),
        }
    })?;
    if indicator.contains(HeaderIndicator::VCD_DECOMPRESS) {
        return Err(DecodeError::UnsupportedFeature {
            feature: "VCD_DECOMPRESS (secondary compressor table)",
        });
    }

    Ok(Some(FileHeader { version, indicator }))
}

#[derive(Debug, Clone, Copy)]
pub struct SourceSegment {
    pub len: u32,
    pub offset: u32,
    pub from_target: bool,
}

#[derive(Debug, Clone)]
pub struct WindowHeader {
    pub win_ind: WinIndicator,
    pub source_segment: Option<SourceSegment>,
    pub target_window_len: u32,
    pub data_len: u32,
    pub inst_len: u32,
    pub addr_len: u32,
    pub checksum: Option<u32>,
    /// True when this window's data/addresses are folded into the
    /// instructions stream ('S' version, data_len == addr_len == 0).
    pub interleaved: bool,
}

/// Options that bound the resources a window header parse may commit to,
/// threaded through from [`crate::vcdiff::DecoderOptions`].
pub struct WindowLimits {
    pub max_target_window_size: u64,
    pub max_target_file_size: u64,
    pub allow_vcd_target: bool,
}

/// Parse one window header, given the already-known file version and the
/// total number of target bytes produced by prior windows (used to enforce
/// `max_target_file_size`).
pub fn parse_window_header(
    cur: &mut Cursor<'_>,
    version: Version,
    limits: &WindowLimits,
    target_bytes_so_far: u64,
) -> Result<Option<WindowHeader>, DecodeError> {
    let win_ind_byte = match cur.consume_byte() {
        Some(b) => b,
        None => return Ok(None),
    };
    let win_ind = WinIndicator::from_bits(win_ind_byte).ok_or_else(|| DecodeError::MalformedHeader {
        reason: format!("invalid window indicator bits {win_ind_byte:#04x}"),
    })?;
    if win_ind.contains(WinIndicator::VCD_SOURCE) && win_ind.contains(WinIndicator::VCD_TARGET) {
        return Err(DecodeError::MalformedHeader {
            reason: "window indicator sets both VCD_SOURCE and VCD_TARGET".into(),
        });
    }
    if win_ind.contains(WinIndicator::VCD_CHECKSUM) && version != Version::Interleaved {
        return Err(DecodeError::UnsupportedFeature {
            feature: "VCD_CHECKSUM outside the 'S' version extension",
        });
    }
    if win_ind.contains(WinIndicator::VCD_TARGET) && !limits.allow_vcd_target {
        return Err(DecodeError::VcdTargetDisallowed);
    }

    let has_source =
        win_ind.contains(WinIndicator::VCD_SOURCE) || win_ind.contains(WinIndicator::VCD_TARGET);
    let source_segment = if has_source {
        let len = match cur.consume_varint_u31()? {
            Some(v) => v,
            None => return Ok(None),
        };
        let offset = match cur.consume_varint_u31()? {
            Some(v) => v,
            None => return Ok(None),
        };
        Some(SourceSegment {
            len,
            offset,
            from_target: win_ind.contains(WinIndicator::VCD_TARGET),
        })
    } else {
        None
    };

    let enc_len = match cur.consume_varint_u31()? {
        Some(v) => v,
        None => return Ok(None),
    };
    let target_window_len = match cur.consume_varint_u31()? {
        Some(v) => v,
        None => return Ok(None),
    };
    if target_window_len as u64 > limits.max_target_window_size {
        return Err(DecodeError::SizeLimitExceeded {
            reason: format!(
                "window target size {target_window_len} exceeds max_target_window_size {}",
                limits.max_target_window_size
            ),
        });
    }
    if target_bytes_so_far + target_window_len as u64 > limits.max_target_file_size {
        return Err(DecodeError::SizeLimitExceeded {
            reason: format!(
                "cumulative target size would reach {} bytes, exceeding max_target_file_size {}",
                target_bytes_so_far + target_window_len as u64,
                limits.max_target_file_size
            ),
        });
    }

    let delta_indicator: DeltaIndicator = match cur.consume_byte() {
        Some(b) => b,
        None => return Ok(None),
    };
    if delta_indicator != 0 {
        return Err(DecodeError::UnsupportedFeature {
            feature: "secondary compression of window sections (nonzero delta indicator)",
        });
    }

    let data_len = match cur.consume_varint_u31()? {
        Some(v) => v,
        None => return Ok(None),
    };
    let inst_len = match cur.consume_varint_u31()? {
        Some(v) => v,
        None => return Ok(None),
    };
    let addr_len = match cur.consume_varint_u31()? {
        Some(v) => v,
        None => return Ok(None),
    };

    let interleaved = version == Version::Interleaved && data_len == 0 && addr_len == 0;

    let checksum = if win_ind.contains(WinIndicator::VCD_CHECKSUM) {
        let raw = match cur.consume_varint_u64()? {
            Some(v) => v,
            None => return Ok(None),
        };
        let checksum = u32::try_from(raw).map_err(|_| DecodeError::MalformedHeader {
            reason: format!("checksum varint {raw} does not fit in 32 bits"),
        })?;
        Some(checksum)
    } else {
        None
    };

    let mut expected_enc_len = sizeof_u64(target_window_len as u64) as u64
        + 1 // delta indicator
        + sizeof_u64(data_len as u64) as u64
        + sizeof_u64(inst_len as u64) as u64
        + sizeof_u64(addr_len as u64) as u64
        + data_len as u64
        + inst_len as u64
        + addr_len as u64;
    if let Some(checksum) = checksum {
        expected_enc_len += sizeof_u64(checksum as u64) as u64;
    }
    if enc_len as u64 != expected_enc_len {
        return Err(DecodeError::MalformedHeader {
            reason: format!(
                "delta-encoding length {enc_len} does not match computed length {expected_enc_len}"
            ),
        });
    }

    Ok(Some(WindowHeader {
        win_ind,
        source_segment,
        target_window_len,
        data_len,
        inst_len,
        addr_len,
        checksum,
        interleaved,
    }))
}
