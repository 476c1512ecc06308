#![no_main]
use libfuzzer_sys::fuzz_target;
use oxidelta::vcdiff::{Decoder, DecoderOptions, decode_all};

fuzz_target!(|data: &[u8]| {
    // Fuzz the decoder with arbitrary bytes as a delta against no source.
    // The decoder must never panic -- only return errors.
    let _ = decode_all(&[], data);

    // Also fuzz with a non-empty source, splitting the input between
    // "source" and "delta" halves.
    if data.len() >= 2 {
        let split = data.len() / 2;
        let (source, delta) = data.split_at(split);
        let _ = decode_all(source, delta);
    }

    // Feed the same bytes one byte at a time: the chunked driver must
    // behave identically to the one-shot path -- never panic, never read
    // past the buffered tail, never report success with a dangling
    // mid-structure parse.
    let mut decoder = Decoder::new(DecoderOptions::default());
    if decoder.start(&[]).is_ok() {
        let mut sink = Vec::new();
        for byte in data {
            if decoder.decode_chunk(std::slice::from_ref(byte), &mut sink).is_err() {
                return;
            }
        }
        let _ = decoder.finish();
    }
});
