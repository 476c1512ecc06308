// Window executor: walks a window's instructions section, dispatching each
// half-instruction's ADD/RUN/COPY to the target buffer.
//
// The overlapping self-copy behavior (a COPY whose source range reaches
// into bytes this same window is still writing) is the one piece of xdelta3
// logic reused close to verbatim from the teacher's decoder: bulk slice
// copies are only safe when source and destination don't overlap, so a
// byte-by-byte loop is used whenever they might.

use crate::vcdiff::address_cache::AddressCache;
use crate::vcdiff::code_table::{CodeTable, XD3_ADD, XD3_CPY, XD3_NOOP, XD3_RUN};
use crate::vcdiff::error::{DecodeError, Section};
use crate::vcdiff::header::WindowHeader;
use crate::vcdiff::varint::read_u32;

/// Execute one window's instructions against `output`, appending the
/// decoded target bytes. `source_segment` is the (already materialized)
/// COPY source -- empty if the window declared neither VCD_SOURCE nor
/// VCD_TARGET.
pub fn execute_window(
    wh: &WindowHeader,
    data: &[u8],
    inst: &[u8],
    addr: &[u8],
    source_segment: &[u8],
    code_table: &CodeTable,
    acache: &mut AddressCache,
    output: &mut Vec<u8>,
) -> Result<(), DecodeError> {
    let base_offset = output.len();
    output.reserve(wh.target_window_len as usize);

    let source_len = source_segment.len() as u64;
    let interleaved = wh.interleaved;

    let mut data_pos = 0usize;
    let mut inst_pos = 0usize;
    let mut addr_pos = 0usize;

    while inst_pos < inst.len() {
        let opcode = inst[inst_pos];
        inst_pos += 1;
        let entry = code_table[opcode as usize];

        if entry.type1 != XD3_NOOP {
            execute_half(
                entry.type1,
                entry.size1,
                inst,
                &mut inst_pos,
                data,
                &mut data_pos,
                addr,
                &mut addr_pos,
                interleaved,
                acache,
                source_len,
                source_segment,
                base_offset,
                wh.target_window_len,
                output,
            )?;
            check_window_budget(output, base_offset, wh.target_window_len)?;
        }
        if entry.type2 != XD3_NOOP {
            execute_half(
                entry.type2,
                entry.size2,
                inst,
                &mut inst_pos,
                data,
                &mut data_pos,
                addr,
                &mut addr_pos,
                interleaved,
                acache,
                source_len,
                source_segment,
                base_offset,
                wh.target_window_len,
                output,
            )?;
            check_window_budget(output, base_offset, wh.target_window_len)?;
        }
    }

    if !interleaved {
        if data_pos != data.len() {
            return Err(DecodeError::SectionLengthMismatch {
                section: Section::Data,
                expected: data.len() as u64,
                actual: data_pos as u64,
            });
        }
        if addr_pos != addr.len() {
            return Err(DecodeError::SectionLengthMismatch {
                section: Section::Addresses,
                expected: addr.len() as u64,
                actual: addr_pos as u64,
            });
        }
    }

    let written = (output.len() - base_offset) as u64;
    if written != wh.target_window_len as u64 {
        return Err(DecodeError::SizeLimitExceeded {
            reason: format!(
                "window produced {written} bytes, expected exactly {}",
                wh.target_window_len
            ),
        });
    }

    if let Some(expected) = wh.checksum {
        let actual = crate::vcdiff::checksum::adler32(&output[base_offset..]);
        if actual != expected {
            return Err(DecodeError::ChecksumMismatch { expected, actual });
        }
    }

    Ok(())
}

/// Enforce the per-window target-size budget immediately after each
/// sub-instruction, per the spec's "after each sub-instruction,
/// target_bytes_written_in_this_window <= target_window_size" rule, rather
/// than only at the end of the enclosing (possibly compound) opcode.
fn check_window_budget(
    output: &[u8],
    base_offset: usize,
    target_window_len: u32,
) -> Result<(), DecodeError> {
    let written = (output.len() - base_offset) as u64;
    if written > target_window_len as u64 {
        return Err(DecodeError::SizeLimitExceeded {
            reason: format!(
                "window exceeded its declared target size of {target_window_len} bytes"
            ),
        });
    }
    Ok(())
}

/// Append `len` bytes read starting at `tgt_offset` in `output`'s own
/// target address space. `tgt_offset + len` may exceed `output.len()` at
/// the start of the copy (a self-referential COPY reading bytes this same
/// instruction is still producing), so a bulk slice copy is only safe when
/// the whole range already exists; otherwise each byte must be copied
/// individually, immediately becoming visible to the next iteration.
///
/// Safe by induction: before each push, `tgt_offset + i < output.len()`
/// holds because `tgt_offset < here`'s target-space bound (enforced by
/// `AddressCache::decode`'s `addr < here` check) and `i` only grows past
/// bytes already pushed by this same loop.
fn copy_from_target(output: &mut Vec<u8>, tgt_offset: usize, len: usize) {
    if tgt_offset + len <= output.len() {
        output.extend_from_within(tgt_offset..tgt_offset + len);
    } else {
        for i in 0..len {
            let byte = output[tgt_offset + i];
            output.push(byte);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn execute_half(
    itype: u8,
    size_field: u8,
    inst: &[u8],
    inst_pos: &mut usize,
    data: &[u8],
    data_pos: &mut usize,
    addr: &[u8],
    addr_pos: &mut usize,
    interleaved: bool,
    acache: &mut AddressCache,
    source_len: u64,
    source_segment: &[u8],
    base_offset: usize,
    target_window_len: u32,
    output: &mut Vec<u8>,
) -> Result<(), DecodeError> {
    let size = if size_field == 0 {
        let (val, consumed) = read_u32(&inst[*inst_pos..]).map_err(|_| {
            DecodeError::SectionLengthMismatch {
                section: Section::Instructions,
                expected: (*inst_pos + 1) as u64,
                actual: inst.len() as u64,
            }
        })?;
        *inst_pos += consumed;
        val
    } else {
        size_field as u32
    };
    let size_usize = size as usize;

    match itype {
        XD3_ADD => {
            let bytes = if interleaved {
                let slice = inst
                    .get(*inst_pos..*inst_pos + size_usize)
                    .ok_or(DecodeError::SectionLengthMismatch {
                        section: Section::Instructions,
                        expected: (*inst_pos + size_usize) as u64,
                        actual: inst.len() as u64,
                    })?;
                *inst_pos += size_usize;
                slice
            } else {
                let slice = data
                    .get(*data_pos..*data_pos + size_usize)
                    .ok_or(DecodeError::SectionLengthMismatch {
                        section: Section::Data,
                        expected: (*data_pos + size_usize) as u64,
                        actual: data.len() as u64,
                    })?;
                *data_pos += size_usize;
                slice
            };
            output.extend_from_slice(bytes);
        }

        XD3_RUN => {
            let byte = if interleaved {
                let b = *inst
                    .get(*inst_pos)
                    .ok_or(DecodeError::SectionLengthMismatch {
                        section: Section::Instructions,
                        expected: (*inst_pos + 1) as u64,
                        actual: inst.len() as u64,
                    })?;
                *inst_pos += 1;
                b
            } else {
                let b = *data.get(*data_pos).ok_or(DecodeError::SectionLengthMismatch {
                    section: Section::Data,
                    expected: (*data_pos + 1) as u64,
                    actual: data.len() as u64,
                })?;
                *data_pos += 1;
                b
            };
            let written = (output.len() - base_offset) as u64;
            let remaining = (target_window_len as u64).saturating_sub(written);
            if size as u64 > remaining {
                return Err(DecodeError::SizeLimitExceeded {
                    reason: format!(
                        "RUN of {size} bytes would exceed the window's declared target size of {target_window_len} bytes"
                    ),
                });
            }
            output.resize(output.len() + size_usize, byte);
        }

        _ => {
            // XD3_CPY + mode
            let mode = itype - XD3_CPY;
            let here = source_len + (output.len() - base_offset) as u64;

            let (address, consumed) = if interleaved {
                acache
                    .decode(mode, &inst[*inst_pos..], here)
                    .map_err(|_| DecodeError::BadAddress { address: 0, here })?
            } else {
                acache
                    .decode(mode, &addr[*addr_pos..], here)
                    .map_err(|_| DecodeError::BadAddress { address: 0, here })?
            };
            if interleaved {
                *inst_pos += consumed;
            } else {
                *addr_pos += consumed;
            }

            let end_addr = address + size as u64;
            if end_addr <= source_len {
                // Entirely within the source segment.
                let start = address as usize;
                let slice = source_segment
                    .get(start..start + size_usize)
                    .ok_or(DecodeError::BadAddress { address, here })?;
                output.extend_from_slice(slice);
            } else if address >= source_len {
                // Entirely within the target bytes already written.
                let tgt_offset = base_offset + (address - source_len) as usize;
                copy_from_target(output, tgt_offset, size_usize);
            } else {
                // Straddles the boundary: the low part comes from the tail
                // of the source segment, the rest from the front of the
                // target bytes produced so far (address space is
                // contiguous: source segment then target).
                let from_source = (source_len - address) as usize;
                let slice = source_segment
                    .get(address as usize..)
                    .ok_or(DecodeError::BadAddress { address, here })?;
                output.extend_from_slice(slice);
                debug_assert_eq!(slice.len(), from_source);
                copy_from_target(output, base_offset, size_usize - from_source);
            }
        }
    }

    Ok(())
}
