// VCDIFF address cache (RFC 3284, Section 5.3).
//
// Implements the NEAR and SAME address caches used to compactly decode
// COPY instruction addresses. The decode half of xdelta3's
// `xd3_addr_cache` / `xd3_decode_address`; encoding is out of scope.

use super::varint;

// ---------------------------------------------------------------------------
// Address modes (RFC 3284 Section 5.3)
// ---------------------------------------------------------------------------

/// Absolute address.
pub const VCD_SELF: u8 = 0;
/// Address relative to "here" (current position in address space).
pub const VCD_HERE: u8 = 1;

// ---------------------------------------------------------------------------
// Address cache
// ---------------------------------------------------------------------------

/// NEAR/SAME address cache.
///
/// Default configuration (s_near=4, s_same=3) gives 9 address modes:
///   0      VCD_SELF  — absolute
///   1      VCD_HERE  — here - value
///   2..5   NEAR      — near\[mode-2\] + value
///   6..8   SAME      — same\[(mode-6)*256 + byte\]
#[derive(Clone)]
pub struct AddressCache {
    s_near: usize,
    s_same: usize,
    near: Vec<u64>,
    same: Vec<u64>,
    next_slot: usize,
    /// The mode byte most recently used by `decode`. Recorded so a custom
    /// code table swap (§4.H) can observe cache state at the swap boundary;
    /// not otherwise load-bearing for decoding.
    last_mode: u8,
}

impl AddressCache {
    /// Default RFC 3284 cache: s_near=4, s_same=3.
    pub fn new() -> Self {
        Self::with_sizes(4, 3)
    }

    /// Create with custom cache sizes.
    pub fn with_sizes(s_near: usize, s_same: usize) -> Self {
        Self {
            s_near,
            s_same,
            near: vec![0; s_near],
            same: vec![0; s_same * 256],
            next_slot: 0,
            last_mode: 0,
        }
    }

    /// Reset cache state to initial (all zeros).
    ///
    /// Called once, when a decoder is armed with a dictionary -- *not* at
    /// the start of every window. RFC 3284 Section 5.3 defines NEAR and
    /// SAME as persisting across the whole delta; resetting per-window
    /// would make cross-window COPY addresses undecodable.
    pub fn init(&mut self) {
        self.near.fill(0);
        self.same.fill(0);
        self.next_slot = 0;
        self.last_mode = 0;
    }

    /// The mode byte used by the most recent `decode` call.
    #[inline]
    pub fn last_mode(&self) -> u8 {
        self.last_mode
    }

    /// Total number of address modes (2 + s_near + s_same).
    #[inline]
    pub fn mode_count(&self) -> usize {
        2 + self.s_near + self.s_same
    }

    /// Number of NEAR cache slots.
    #[inline]
    pub fn s_near(&self) -> usize {
        self.s_near
    }

    /// Number of SAME cache groups.
    #[inline]
    pub fn s_same(&self) -> usize {
        self.s_same
    }

    /// The first SAME mode index (2 + s_near).
    #[inline]
    fn same_start(&self) -> usize {
        2 + self.s_near
    }

    // -----------------------------------------------------------------------
    // Cache update (shared by encoder and decoder)
    //
    // Exact match of xdelta3 `xd3_update_cache`.
    // -----------------------------------------------------------------------

    /// Update the cache after encoding or decoding an address.
    #[inline]
    pub fn update(&mut self, addr: u64) {
        if self.s_near > 0 {
            self.near[self.next_slot] = addr;
            self.next_slot = (self.next_slot + 1) % self.s_near;
        }
        if self.s_same > 0 {
            let idx = addr as usize % (self.s_same * 256);
            self.same[idx] = addr;
        }
    }

    // -----------------------------------------------------------------------
    // Decoding (matches xdelta3 `xd3_decode_address`)
    // -----------------------------------------------------------------------

    /// Decode an address given the mode and the address section data.
    ///
    /// `mode` is the address mode from the instruction (0..mode_count).
    /// `addr_data` is the remaining address section bytes.
    /// `here` is the current position in the address space.
    ///
    /// Returns `(address, bytes_consumed)` or an error.
    pub fn decode(
        &mut self,
        mode: u8,
        addr_data: &[u8],
        here: u64,
    ) -> Result<(u64, usize), AddressCacheError> {
        let mode = mode as usize;
        let same_start = self.same_start();

        let (addr, consumed) = if mode < same_start {
            // SELF, HERE, or NEAR: read a varint.
            let (raw, consumed) =
                varint::read_u64(addr_data).map_err(|_| AddressCacheError::AddrUnderflow)?;

            let addr = match mode {
                0 => raw, // VCD_SELF
                1 => {
                    here.checked_sub(raw)
                        .ok_or(AddressCacheError::InvalidAddr)? // VCD_HERE
                }
                _ => {
                    // NEAR mode
                    self.near[mode - 2]
                        .checked_add(raw)
                        .ok_or(AddressCacheError::InvalidAddr)?
                }
            };
            (addr, consumed)
        } else {
            // SAME mode: read a single raw byte.
            if addr_data.is_empty() {
                return Err(AddressCacheError::AddrUnderflow);
            }
            let slot = mode - same_start;
            let byte = addr_data[0] as usize;
            let addr = self.same[slot * 256 + byte];
            (addr, 1)
        };

        // Validate: address must be < here.
        if addr >= here {
            return Err(AddressCacheError::InvalidAddr);
        }

        self.update(addr);
        self.last_mode = mode as u8;
        Ok((addr, consumed))
    }
}

impl Default for AddressCache {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressCacheError {
    /// Not enough bytes in the address section.
    AddrUnderflow,
    /// Decoded address is invalid (out of range or overflow).
    InvalidAddr,
}

impl std::fmt::Display for AddressCacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddrUnderflow => write!(f, "address section underflow"),
            Self::InvalidAddr => write!(f, "invalid COPY address"),
        }
    }
}

impl std::error::Error for AddressCacheError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


