// The streaming decode driver: a chunked, restartable state machine that
// turns a byte-at-a-time-or-larger feed of VCDIFF bytes into decoded target
// output.
//
// This replaces the teacher's synchronous `StreamDecoder<R: Read>`, whose
// shape (parse file header, then loop parsing+executing windows, deferring
// adler32 to a named helper) is preserved here, generalized onto a pull
// cursor over an owned, growable tail buffer instead of a blocking `Read`.

use crate::vcdiff::address_cache::AddressCache;
use crate::vcdiff::code_table::{self, CodeTable};
use crate::vcdiff::cursor::Cursor;
use crate::vcdiff::error::DecodeError;
use crate::vcdiff::executor;
use crate::vcdiff::header::{self, FileHeader, HeaderIndicator, Version, WindowLimits};
use crate::vcdiff::sink::DeltaSink;

/// Resource bounds and feature toggles for a [`Decoder`].
///
/// A plain `Copy` struct in the teacher's style (`EncodeOptions` in the
/// original crate): construct with `DecoderOptions { field: value,
/// ..Default::default() }` rather than a builder.
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Upper bound on any single window's target size.
    pub max_target_window_size: u64,
    /// Upper bound on the sum of all windows' target sizes.
    pub max_target_file_size: u64,
    /// If set, the decoder knows in advance exactly how many target bytes
    /// the whole delta will produce, and reports [`Decoder::finish`] success
    /// the moment that many bytes have been produced, even with trailer
    /// bytes still unconsumed (they belong to an enclosing format).
    pub planned_target_file_size: Option<u64>,
    /// Whether `VCD_TARGET` windows (source segment drawn from previously
    /// decoded target bytes) are permitted.
    pub allow_vcd_target: bool,
}

/// Default resource bound for both `max_target_window_size` and
/// `max_target_file_size`: 64 MiB. Well under the hard protocol ceiling of
/// `HARD_MAX_WINSIZE` (2^31 - 1 bytes), but generous for ordinary deltas;
/// callers decoding larger files opt in explicitly.
const DEFAULT_MAX_TARGET_SIZE: u64 = 64 * 1024 * 1024;

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_target_window_size: DEFAULT_MAX_TARGET_SIZE,
            max_target_file_size: DEFAULT_MAX_TARGET_SIZE,
            planned_target_file_size: None,
            allow_vcd_target: true,
        }
    }
}

enum CodeTableState {
    Default,
    Custom(Box<CodeTable>),
}

impl CodeTableState {
    fn as_table(&self) -> &CodeTable {
        match self {
            CodeTableState::Default => code_table::default_code_table(),
            CodeTableState::Custom(t) => t,
        }
    }
}

enum CodeTablePhase {
    AwaitingSizes,
    /// Decoding the nested delta whose target is the 1536-byte code-table
    /// image. The inner decoder runs with `allow_vcd_target: false`, which
    /// flushes and clears its own `target` buffer after every window --
    /// so the accumulated image must be collected from the sink the inner
    /// decoder flushes into, not read back from `inner.target` once it
    /// reports completion.
    Decoding(Box<Decoder<'static>>, Vec<u8>),
}

enum Phase {
    Header,
    CodeTable(CodeTablePhase),
    Windows,
}

enum WindowOutcome {
    NeedMoreData,
    Executed { consumed: usize },
}

/// A chunked, restartable VCDIFF decoder.
///
/// Lifecycle: construct with [`Decoder::new`], arm with [`Decoder::start`],
/// feed input via any number of [`Decoder::decode_chunk`] calls (of any
/// size, including a single byte), and call [`Decoder::finish`] once no more
/// input is coming. Any error poisons the decoder -- no further calls are
/// valid once one has returned `Err`.
pub struct Decoder<'d> {
    dictionary: &'d [u8],
    options: DecoderOptions,
    pending: Vec<u8>,
    file_header: Option<FileHeader>,
    code_table: CodeTableState,
    addr_cache: Option<AddressCache>,
    phase: Phase,
    target: Vec<u8>,
    flushed_up_to: usize,
    total_target_produced: u64,
    started: bool,
    complete: bool,
    poisoned: bool,
}

impl<'d> Decoder<'d> {
    pub fn new(options: DecoderOptions) -> Self {
        Self {
            dictionary: &[],
            options,
            pending: Vec::new(),
            file_header: None,
            code_table: CodeTableState::Default,
            addr_cache: None,
            phase: Phase::Header,
            target: Vec::new(),
            flushed_up_to: 0,
            total_target_produced: 0,
            started: false,
            complete: false,
            poisoned: false,
        }
    }

    /// Arm the decoder with its dictionary (the "source" file). Pass an
    /// empty slice if the delta never references a source segment.
    pub fn start(&mut self, dictionary: &'d [u8]) -> Result<(), DecodeError> {
        if self.started {
            return Err(DecodeError::LifecycleViolation {
                reason: "start called twice",
            });
        }
        self.dictionary = dictionary;
        self.started = true;
        Ok(())
    }

    /// Feed the next chunk of delta bytes, decoding as much as is currently
    /// possible and streaming decoded output into `sink`.
    pub fn decode_chunk<S: DeltaSink>(
        &mut self,
        bytes: &[u8],
        sink: &mut S,
    ) -> Result<(), DecodeError> {
        if self.poisoned {
            return Err(DecodeError::LifecycleViolation {
                reason: "decode_chunk called on a poisoned decoder",
            });
        }
        if !self.started {
            self.poisoned = true;
            return Err(DecodeError::LifecycleViolation {
                reason: "decode_chunk called before start",
            });
        }

        self.pending.extend_from_slice(bytes);
        if self.complete {
            // Planned size already reached; any further bytes belong to an
            // enclosing format and are simply held for unconsumed_input_size.
            return Ok(());
        }

        match self.drive(sink) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!("decode failed, poisoning decoder: {e}");
                self.poisoned = true;
                Err(e)
            }
        }
    }

    /// Signal that no more input is coming. Succeeds only if the decoder
    /// has fully parsed the header (and code table, if any) and has no
    /// partially-parsed window waiting on more bytes.
    pub fn finish(&mut self) -> Result<(), DecodeError> {
        if self.poisoned {
            return Err(DecodeError::LifecycleViolation {
                reason: "finish called on a poisoned decoder",
            });
        }
        if !self.started {
            return Err(DecodeError::LifecycleViolation {
                reason: "finish called before start",
            });
        }
        match &self.phase {
            Phase::Header => {
                return Err(DecodeError::LifecycleViolation {
                    reason: "finish: file header not fully parsed",
                });
            }
            Phase::CodeTable(_) => {
                return Err(DecodeError::LifecycleViolation {
                    reason: "finish: custom code table not fully parsed",
                });
            }
            Phase::Windows => {}
        }

        let planned_reached = self
            .options
            .planned_target_file_size
            .is_some_and(|planned| self.total_target_produced >= planned);
        if !self.pending.is_empty() && !planned_reached {
            return Err(DecodeError::LifecycleViolation {
                reason: "finish: unparsed trailing bytes with no partial structure expected",
            });
        }

        self.complete = true;
        Ok(())
    }

    /// Number of delta bytes buffered but not yet consumed into the decode.
    pub fn unconsumed_input_size(&self) -> usize {
        self.pending.len()
    }

    fn drive<S: DeltaSink>(&mut self, sink: &mut S) -> Result<(), DecodeError> {
        loop {
            match &mut self.phase {
                Phase::Header => {
                    let mut cur = Cursor::new(&self.pending);
                    match header::parse_file_header(&mut cur)? {
                        None => return Ok(()),
                        Some(fh) => {
                            let consumed = cur.position();
                            self.pending.drain(0..consumed);
                            let needs_codetable = fh.indicator.contains(HeaderIndicator::VCD_CODETABLE);
                            log::debug!(
                                "parsed file header: version={:?}, codetable={needs_codetable}",
                                fh.version
                            );
                            self.file_header = Some(fh);
                            if needs_codetable {
                                self.phase = Phase::CodeTable(CodeTablePhase::AwaitingSizes);
                            } else {
                                self.addr_cache = Some(AddressCache::new());
                                self.phase = Phase::Windows;
                            }
                        }
                    }
                }

                Phase::CodeTable(CodeTablePhase::AwaitingSizes) => {
                    let mut cur = Cursor::new(&self.pending);
                    let s_near = match cur.consume_varint_u31()? {
                        Some(v) => v,
                        None => return Ok(()),
                    };
                    let s_same = match cur.consume_varint_u31()? {
                        Some(v) => v,
                        None => return Ok(()),
                    };
                    if s_near > 255 || s_same > 255 || s_near as usize + s_same as usize > 254 {
                        return Err(DecodeError::MalformedHeader {
                            reason: format!(
                                "custom code table cache sizes out of range: s_near={s_near}, s_same={s_same}"
                            ),
                        });
                    }
                    let consumed = cur.position();
                    self.pending.drain(0..consumed);

                    self.addr_cache = Some(AddressCache::with_sizes(s_near as usize, s_same as usize));

                    let inner_opts = DecoderOptions {
                        max_target_window_size: code_table::CODE_TABLE_IMAGE_LEN as u64,
                        max_target_file_size: code_table::CODE_TABLE_IMAGE_LEN as u64,
                        planned_target_file_size: Some(code_table::CODE_TABLE_IMAGE_LEN as u64),
                        allow_vcd_target: false,
                    };
                    let mut inner: Box<Decoder<'static>> = Box::new(Decoder::new(inner_opts));
                    inner.start(default_table_dictionary())?;
                    self.phase = Phase::CodeTable(CodeTablePhase::Decoding(inner, Vec::new()));
                }

                Phase::CodeTable(CodeTablePhase::Decoding(inner, image_buf)) => {
                    let chunk = std::mem::take(&mut self.pending);
                    inner.decode_chunk(&chunk, image_buf)?;

                    if inner.complete || inner.total_target_produced >= code_table::CODE_TABLE_IMAGE_LEN as u64 {
                        inner.finish()?;
                        let image = std::mem::take(image_buf);
                        let leftover = std::mem::take(&mut inner.pending);
                        self.pending = leftover;

                        let mode_count = self
                            .addr_cache
                            .as_ref()
                            .expect("address cache installed before code table phase")
                            .mode_count();
                        let table = code_table::load_custom(&image, mode_count)?;
                        log::debug!("installed custom code table ({mode_count} address modes)");

                        // The outer addr_cache instance is untouched by the
                        // code-table swap -- only self.code_table changes --
                        // so its last_mode carries across the boundary by
                        // construction. No window is decoded before this
                        // point, so last_mode is still its initial value.
                        log::trace!(
                            "code table swap boundary: addr_cache.last_mode={}",
                            self.addr_cache
                                .as_ref()
                                .expect("address cache installed before code table phase")
                                .last_mode()
                        );

                        self.code_table = CodeTableState::Custom(Box::new(table));
                        self.phase = Phase::Windows;
                    } else {
                        return Ok(());
                    }
                }

                Phase::Windows => {
                    if let Some(outcome) = self.try_drain_one_window(sink)? {
                        match outcome {
                            WindowOutcome::NeedMoreData => return Ok(()),
                            WindowOutcome::Executed { .. } => {
                                if let Some(planned) = self.options.planned_target_file_size
                                    && self.total_target_produced >= planned
                                {
                                    self.complete = true;
                                    return Ok(());
                                }
                                // loop again: there may be another fully-buffered window
                            }
                        }
                    }
                }
            }
        }
    }

    fn try_drain_one_window<S: DeltaSink>(
        &mut self,
        sink: &mut S,
    ) -> Result<Option<WindowOutcome>, DecodeError> {
        let version = self
            .file_header
            .as_ref()
            .expect("file header parsed before entering the Windows phase")
            .version;
        let limits = WindowLimits {
            max_target_window_size: self.options.max_target_window_size,
            max_target_file_size: self.options.max_target_file_size,
            allow_vcd_target: self.options.allow_vcd_target,
        };

        let mut cur = Cursor::new(&self.pending);
        let wh = match header::parse_window_header(&mut cur, version, &limits, self.total_target_produced)? {
            None => return Ok(Some(WindowOutcome::NeedMoreData)),
            Some(wh) => wh,
        };
        log::trace!(
            "parsed window header: target_len={}, interleaved={}, checksum={}",
            wh.target_window_len,
            wh.interleaved,
            wh.checksum.is_some()
        );

        let body_len = wh.data_len as usize + wh.inst_len as usize + wh.addr_len as usize;
        let body = match cur.consume_fixed(body_len) {
            Some(b) => b,
            None => return Ok(Some(WindowOutcome::NeedMoreData)),
        };
        let (data, rest) = body.split_at(wh.data_len as usize);
        let (inst, addr) = rest.split_at(wh.inst_len as usize);

        let source = self.materialize_source_segment(&wh)?;

        let base_offset = self.target.len();
        {
            let acache = self
                .addr_cache
                .as_mut()
                .expect("address cache installed before entering the Windows phase");
            executor::execute_window(
                &wh,
                data,
                inst,
                addr,
                source.as_slice(),
                self.code_table.as_table(),
                acache,
                &mut self.target,
            )?;
        }

        let written = (self.target.len() - base_offset) as u64;
        self.total_target_produced += written;
        log::trace!("executed window: wrote {written} bytes, {} total", self.total_target_produced);

        if self.options.allow_vcd_target {
            if self.flushed_up_to < self.target.len() {
                sink.accept(&self.target[self.flushed_up_to..]);
            }
            self.flushed_up_to = self.target.len();
        } else {
            if base_offset < self.target.len() {
                sink.accept(&self.target[base_offset..]);
            }
            self.target.clear();
            self.flushed_up_to = 0;
        }

        let consumed = cur.position();
        self.pending.drain(0..consumed);
        Ok(Some(WindowOutcome::Executed { consumed }))
    }

    fn materialize_source_segment(&self, wh: &header::WindowHeader) -> Result<SourceSeg<'d>, DecodeError> {
        let Some(seg) = &wh.source_segment else {
            return Ok(SourceSeg::Empty);
        };
        let offset = seg.offset as usize;
        let len = seg.len as usize;
        let end = offset.checked_add(len).ok_or_else(|| DecodeError::MalformedHeader {
            reason: "source segment offset + length overflows".into(),
        })?;

        if seg.from_target {
            if end > self.target.len() {
                return Err(DecodeError::MalformedHeader {
                    reason: format!(
                        "VCD_TARGET source segment [{offset}, {end}) exceeds decoded target length {}",
                        self.target.len()
                    ),
                });
            }
            Ok(SourceSeg::Owned(self.target[offset..end].to_vec()))
        } else {
            if end > self.dictionary.len() {
                return Err(DecodeError::MalformedHeader {
                    reason: format!(
                        "VCD_SOURCE source segment [{offset}, {end}) exceeds dictionary length {}",
                        self.dictionary.len()
                    ),
                });
            }
            Ok(SourceSeg::Borrowed(&self.dictionary[offset..end]))
        }
    }
}

enum SourceSeg<'d> {
    Empty,
    Borrowed(&'d [u8]),
    Owned(Vec<u8>),
}

impl<'d> SourceSeg<'d> {
    fn as_slice(&self) -> &[u8] {
        match self {
            SourceSeg::Empty => &[],
            SourceSeg::Borrowed(s) => s,
            SourceSeg::Owned(v) => v,
        }
    }
}

fn default_table_dictionary() -> &'static [u8] {
    static DICT: std::sync::OnceLock<Vec<u8>> = std::sync::OnceLock::new();
    DICT.get_or_init(|| code_table::serialize(code_table::default_code_table()))
        .as_slice()
}

/// Decode a complete, in-memory delta in one call.
///
/// A thin convenience wrapper over the streaming driver, analogous to the
/// teacher's `decode_memory`: feeds `delta` as a single chunk, then calls
/// `finish`.
pub fn decode_all(dictionary: &[u8], delta: &[u8]) -> Result<Vec<u8>, DecodeError> {
    decode_all_with_options(dictionary, delta, DecoderOptions::default())
}

/// As [`decode_all`], with explicit [`DecoderOptions`].
pub fn decode_all_with_options(
    dictionary: &[u8],
    delta: &[u8],
    options: DecoderOptions,
) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = Decoder::new(options);
    decoder.start(dictionary)?;
    let mut output = Vec::new();
    decoder.decode_chunk(delta, &mut output)?;
    decoder.finish()?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcdiff::varint::encode_u64;

    fn varint_bytes(val: u64) -> Vec<u8> {
        let mut buf = [0u8; 10];
        let len = encode_u64(val, &mut buf);
        buf[10 - len..].to_vec()
    }

    /// Build a minimal RFC 3284 delta with a single VCD_SOURCE window whose
    /// instructions section is exactly `inst`, data section `data`, address
    /// section `addr`.
    fn build_delta(
        source_len: u32,
        source_off: u32,
        target_len: u32,
        data: &[u8],
        inst: &[u8],
        addr: &[u8],
    ) -> Vec<u8> {
        let mut out = vec![0xD6, 0xC3, 0xC4, 0x00, 0x00];
        out.push(0x01); // win_ind = VCD_SOURCE
        out.extend(varint_bytes(source_len as u64));
        out.extend(varint_bytes(source_off as u64));

        let enc_len = varint_bytes(target_len as u64).len()
            + 1
            + varint_bytes(data.len() as u64).len()
            + varint_bytes(inst.len() as u64).len()
            + varint_bytes(addr.len() as u64).len()
            + data.len()
            + inst.len()
            + addr.len();
        out.extend(varint_bytes(enc_len as u64));
        out.extend(varint_bytes(target_len as u64));
        out.push(0); // delta indicator
        out.extend(varint_bytes(data.len() as u64));
        out.extend(varint_bytes(inst.len() as u64));
        out.extend(varint_bytes(addr.len() as u64));
        out.extend_from_slice(data);
        out.extend_from_slice(inst);
        out.extend_from_slice(addr);
        out
    }

    #[test]
    fn decode_all_add_only() {
        // Opcode 1 = ADD size=0 (size follows as varint): ADD(5) "hello"
        let mut inst = vec![1u8];
        inst.extend(varint_bytes(5));
        let delta = build_delta(0, 0, 5, b"hello", &inst, &[]);
        let out = decode_all(&[], &delta).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn decode_all_copy_from_dictionary() {
        let dict = b"abcdefgh";
        // Opcode 20 = CPY mode 0, size=4 (default table).
        let inst = vec![20u8];
        let addr = varint_bytes(0); // VCD_SELF address 0
        let delta = build_delta(dict.len() as u32, 0, 4, &[], &inst, &addr);
        let out = decode_all(dict, &delta).unwrap();
        assert_eq!(out, b"abcd");
    }

    #[test]
    fn byte_at_a_time_feeding_matches_single_shot() {
        let mut inst = vec![1u8];
        inst.extend(varint_bytes(3));
        let delta = build_delta(0, 0, 3, b"xyz", &inst, &[]);

        let mut decoder = Decoder::new(DecoderOptions::default());
        decoder.start(&[]).unwrap();
        let mut out = Vec::new();
        for &b in &delta {
            decoder.decode_chunk(&[b], &mut out).unwrap();
        }
        decoder.finish().unwrap();
        assert_eq!(out, b"xyz");
    }

    #[test]
    fn rejects_vcd_target_when_disallowed() {
        let mut inst = vec![1u8];
        inst.extend(varint_bytes(1));
        let mut delta = vec![0xD6, 0xC3, 0xC4, 0x00, 0x00];
        delta.push(0x02); // win_ind = VCD_TARGET
        delta.extend(varint_bytes(0));
        delta.extend(varint_bytes(0));
        let enc_len = varint_bytes(1).len() + 1 + varint_bytes(1).len() + varint_bytes(inst.len() as u64).len() + varint_bytes(0).len() + 1 + inst.len();
        delta.extend(varint_bytes(enc_len as u64));
        delta.extend(varint_bytes(1));
        delta.push(0);
        delta.extend(varint_bytes(1));
        delta.extend(varint_bytes(inst.len() as u64));
        delta.extend(varint_bytes(0));
        delta.push(b'a');
        delta.extend_from_slice(&inst);

        let options = DecoderOptions {
            allow_vcd_target: false,
            ..Default::default()
        };
        let err = decode_all_with_options(&[], &delta, options).unwrap_err();
        assert!(matches!(err, DecodeError::VcdTargetDisallowed));
    }

    #[test]
    fn finish_before_header_complete_fails() {
        let mut decoder = Decoder::new(DecoderOptions::default());
        decoder.start(&[]).unwrap();
        let mut out = Vec::new();
        decoder.decode_chunk(&[0xD6, 0xC3], &mut out).unwrap();
        assert!(matches!(
            decoder.finish(),
            Err(DecodeError::LifecycleViolation { .. })
        ));
    }

    #[test]
    fn decode_chunk_before_start_fails() {
        let mut decoder: Decoder<'_> = Decoder::new(DecoderOptions::default());
        let mut out = Vec::new();
        assert!(matches!(
            decoder.decode_chunk(&[0xD6], &mut out),
            Err(DecodeError::LifecycleViolation { .. })
        ));
    }

    /// A full, self-contained VCDIFF delta with a single sourceless window
    /// that ADDs `target` verbatim.
    fn build_addonly_delta(target: &[u8]) -> Vec<u8> {
        let mut out = vec![0xD6, 0xC3, 0xC4, 0x00, 0x00];
        out.push(0x00); // win_ind: no source segment
        let mut inst = vec![1u8]; // ADD, size=0 (varint follows)
        inst.extend(varint_bytes(target.len() as u64));
        let enc_len = varint_bytes(target.len() as u64).len()
            + 1
            + varint_bytes(target.len() as u64).len()
            + varint_bytes(inst.len() as u64).len()
            + varint_bytes(0).len()
            + target.len()
            + inst.len();
        out.extend(varint_bytes(enc_len as u64));
        out.extend(varint_bytes(target.len() as u64));
        out.push(0); // delta indicator
        out.extend(varint_bytes(target.len() as u64));
        out.extend(varint_bytes(inst.len() as u64));
        out.extend(varint_bytes(0));
        out.extend_from_slice(target);
        out.extend_from_slice(&inst);
        out
    }

    #[test]
    fn decode_with_custom_code_table_matching_default() {
        // Component H: a VCD_CODETABLE delta whose nested delta's target is
        // the default table's own 1536-byte image, so the installed custom
        // table behaves exactly like the default one. s_near=4, s_same=3
        // reproduces the default table's own cache sizing (mode_count 9).
        let image = code_table::serialize(code_table::default_code_table());
        let nested = build_addonly_delta(&image);

        let mut delta = vec![0xD6, 0xC3, 0xC4, 0x00];
        delta.push(0x02); // header indicator: VCD_CODETABLE
        delta.extend(varint_bytes(4)); // s_near
        delta.extend(varint_bytes(3)); // s_same
        delta.extend_from_slice(&nested);

        // A window decoded using whatever table the driver has installed by
        // this point: opcode 1 = ADD size=0 (varint follows) in both the
        // default and (here, identical) custom table.
        let mut inst = vec![1u8];
        inst.extend(varint_bytes(5));
        delta.push(0x00); // win_ind: no source segment
        let enc_len = varint_bytes(5).len()
            + 1
            + varint_bytes(5).len()
            + varint_bytes(inst.len() as u64).len()
            + varint_bytes(0).len()
            + 5
            + inst.len();
        delta.extend(varint_bytes(enc_len as u64));
        delta.extend(varint_bytes(5));
        delta.push(0);
        delta.extend(varint_bytes(5));
        delta.extend(varint_bytes(inst.len() as u64));
        delta.extend(varint_bytes(0));
        delta.extend_from_slice(b"hello");
        delta.extend_from_slice(&inst);

        let out = decode_all(&[], &delta).unwrap();
        assert_eq!(out, b"hello");
    }
}
