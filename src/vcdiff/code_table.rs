// VCDIFF default code table (RFC 3284, Section 5.6).
//
// Byte-for-byte compatible with xdelta3's `xd3_build_code_table` using the
// `__rfc3284_code_table_desc` descriptor.  The generated table has exactly
// 256 entries.

use crate::vcdiff::error::DecodeError;

/// Instruction types matching xdelta3's `xd3_rtype` constants.
pub const XD3_NOOP: u8 = 0;
pub const XD3_ADD: u8 = 1;
pub const XD3_RUN: u8 = 2;
/// COPY modes are represented as XD3_CPY + mode (0..8 for default table).
pub const XD3_CPY: u8 = 3;

/// Minimum match length for COPY instructions (RFC 3284).
pub const MIN_MATCH: u8 = 4;

/// A single entry in the 256-element VCDIFF code table.
///
/// Each opcode can encode one or two instructions.  When `type2 == XD3_NOOP`,
/// the opcode encodes a single instruction.  When `size1 == 0` (or `size2 == 0`),
/// the actual size is read as a varint from the instruction stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodeTableEntry {
    pub type1: u8,
    pub size1: u8,
    pub type2: u8,
    pub size2: u8,
}

/// The complete 256-entry VCDIFF code table.
pub type CodeTable = [CodeTableEntry; 256];

/// Build the default RFC 3284 code table.
///
/// This is an exact Rust translation of xdelta3's `xd3_build_code_table`
/// with the `__rfc3284_code_table_desc` descriptor.
pub fn build_default_code_table() -> CodeTable {
    let mut tbl = [CodeTableEntry::default(); 256];
    let mut idx: usize = 0;

    // Descriptor constants (from __rfc3284_code_table_desc).
    const ADD_SIZES: u8 = 17;
    const NEAR_MODES: usize = 4;
    const SAME_MODES: usize = 3;
    const CPY_SIZES: u8 = 15;
    const ADDCOPY_ADD_MAX: u8 = 4;
    const ADDCOPY_NEAR_CPY_MAX: u8 = 6;
    const ADDCOPY_SAME_CPY_MAX: u8 = 4;
    const COPYADD_ADD_MAX: u8 = 1;
    const COPYADD_NEAR_CPY_MAX: u8 = 4;
    const COPYADD_SAME_CPY_MAX: u8 = 4;
    const CPY_MODES: usize = 2 + NEAR_MODES + SAME_MODES; // 9

    // --- Index 0: RUN size=0 ---
    tbl[idx] = CodeTableEntry {
        type1: XD3_RUN,
        size1: 0,
        type2: XD3_NOOP,
        size2: 0,
    };
    idx += 1;

    // --- Index 1: ADD size=0 ---
    tbl[idx] = CodeTableEntry {
        type1: XD3_ADD,
        size1: 0,
        type2: XD3_NOOP,
        size2: 0,
    };
    idx += 1;

    // --- Indices 2..18: ADD size=1..17 ---
    for size1 in 1..=ADD_SIZES {
        tbl[idx] = CodeTableEntry {
            type1: XD3_ADD,
            size1,
            type2: XD3_NOOP,
            size2: 0,
        };
        idx += 1;
    }

    // --- COPY instructions: for each mode, size=0 then sizes 4..18 ---
    for mode in 0..CPY_MODES as u8 {
        // size=0 (size follows as varint)
        tbl[idx] = CodeTableEntry {
            type1: XD3_CPY + mode,
            size1: 0,
            type2: XD3_NOOP,
            size2: 0,
        };
        idx += 1;

        // sizes MIN_MATCH..MIN_MATCH+CPY_SIZES-1
        for size1 in MIN_MATCH..MIN_MATCH + CPY_SIZES {
            tbl[idx] = CodeTableEntry {
                type1: XD3_CPY + mode,
                size1,
                type2: XD3_NOOP,
                size2: 0,
            };
            idx += 1;
        }
    }

    // --- ADD+COPY double instructions ---
    for mode in 0..CPY_MODES as u8 {
        let near_limit = 2 + NEAR_MODES as u8;
        let cpy_max = if mode < near_limit {
            ADDCOPY_NEAR_CPY_MAX
        } else {
            ADDCOPY_SAME_CPY_MAX
        };

        for add_size in 1..=ADDCOPY_ADD_MAX {
            for cpy_size in MIN_MATCH..=cpy_max {
                tbl[idx] = CodeTableEntry {
                    type1: XD3_ADD,
                    size1: add_size,
                    type2: XD3_CPY + mode,
                    size2: cpy_size,
                };
                idx += 1;
            }
        }
    }

    // --- COPY+ADD double instructions ---
    for mode in 0..CPY_MODES as u8 {
        let near_limit = 2 + NEAR_MODES as u8;
        let cpy_max = if mode < near_limit {
            COPYADD_NEAR_CPY_MAX
        } else {
            COPYADD_SAME_CPY_MAX
        };

        for cpy_size in MIN_MATCH..=cpy_max {
            for add_size in 1..=COPYADD_ADD_MAX {
                tbl[idx] = CodeTableEntry {
                    type1: XD3_CPY + mode,
                    size1: cpy_size,
                    type2: XD3_ADD,
                    size2: add_size,
                };
                idx += 1;
            }
        }
    }

    debug_assert_eq!(idx, 256, "code table must have exactly 256 entries");
    tbl
}

/// Return a reference to the lazily-initialized default code table.
pub fn default_code_table() -> &'static CodeTable {
    use std::sync::LazyLock;
    static TABLE: LazyLock<CodeTable> = LazyLock::new(build_default_code_table);
    &TABLE
}

// ---------------------------------------------------------------------------
// Custom code tables (RFC 3284 Section 7 / `VCD_CODETABLE`)
//
// A custom table is transmitted as a 1536-byte image: six 256-byte arrays
// back to back, in order inst1, inst2, size1, size2, mode1, mode2. It is
// itself the decoded target of a nested, ordinary (non-custom-table) delta
// against the default table's own 1536-byte serialization -- see
// `crate::vcdiff::driver`, which drives that nested decode.
// ---------------------------------------------------------------------------

/// Byte length of the wire image of a code table.
pub const CODE_TABLE_IMAGE_LEN: usize = 1536;

/// Serialize a code table into its 1536-byte wire image.
///
/// This is the dictionary against which a custom code table is always
/// expressed as a delta (RFC 3284 Section 7).
pub fn serialize(table: &CodeTable) -> Vec<u8> {
    let mut out = vec![0u8; CODE_TABLE_IMAGE_LEN];
    for (i, entry) in table.iter().enumerate() {
        let (inst1, mode1) = split_instruction(entry.type1);
        let (inst2, mode2) = split_instruction(entry.type2);
        out[i] = inst1;
        out[256 + i] = inst2;
        out[512 + i] = entry.size1;
        out[768 + i] = entry.size2;
        out[1024 + i] = mode1;
        out[1280 + i] = mode2;
    }
    out
}

fn split_instruction(itype: u8) -> (u8, u8) {
    if itype >= XD3_CPY {
        (3, itype - XD3_CPY)
    } else {
        (itype, 0)
    }
}

/// Parse and validate a custom code table from its 1536-byte wire image.
///
/// `mode_count` is the number of address modes the delta's address cache
/// supports (`2 + s_near + s_same`); a COPY half-instruction naming a mode
/// at or beyond this count is rejected, as is any opcode whose two
/// half-instructions are both NOOP.
pub fn load_custom(image: &[u8], mode_count: usize) -> Result<CodeTable, DecodeError> {
    if image.len() != CODE_TABLE_IMAGE_LEN {
        return Err(DecodeError::MalformedHeader {
            reason: format!(
                "custom code table image is {} bytes, expected {CODE_TABLE_IMAGE_LEN}",
                image.len()
            ),
        });
    }
    let inst1 = &image[0..256];
    let inst2 = &image[256..512];
    let size1 = &image[512..768];
    let size2 = &image[768..1024];
    let mode1 = &image[1024..1280];
    let mode2 = &image[1280..1536];

    let mut table = [CodeTableEntry::default(); 256];
    for i in 0..256 {
        let type1 = decode_instruction_byte(i as u8, inst1[i], mode1[i], mode_count)?;
        let type2 = decode_instruction_byte(i as u8, inst2[i], mode2[i], mode_count)?;
        if type1 == XD3_NOOP && type2 == XD3_NOOP {
            return Err(DecodeError::BadOpcode {
                opcode: i as u8,
                reason: "both half-instructions are NOOP".into(),
            });
        }
        table[i] = CodeTableEntry {
            type1,
            size1: size1[i],
            type2,
            size2: size2[i],
        };
    }
    Ok(table)
}

fn decode_instruction_byte(
    opcode: u8,
    raw: u8,
    mode: u8,
    mode_count: usize,
) -> Result<u8, DecodeError> {
    match raw {
        0 => Ok(XD3_NOOP),
        1 => Ok(XD3_ADD),
        2 => Ok(XD3_RUN),
        3 => {
            if mode as usize >= mode_count {
                return Err(DecodeError::BadOpcode {
                    opcode,
                    reason: format!("COPY mode {mode} exceeds cache mode count {mode_count}"),
                });
            }
            Ok(XD3_CPY + mode)
        }
        other => Err(DecodeError::BadOpcode {
            opcode,
            reason: format!("invalid instruction code {other} (expected 0..=3)"),
        }),
    }
}

// ---------------------------------------------------------------------------
// High-level instruction type for public API
// ---------------------------------------------------------------------------

/// Decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Emit `len` literal bytes from the data section.
    Add { len: u32 },
    /// Copy `len` bytes starting at `addr` (in the combined source+target address space).
    Copy { len: u32, addr: u64, mode: u8 },
    /// Repeat a single byte (read from data section) `len` times.
    Run { len: u32 },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


