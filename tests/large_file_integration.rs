// Large-input and resource-limit tests. This crate decodes in memory only
// (no file-oriented API), so "large" here means multi-megabyte byte slices
// rather than multi-gigabyte files.

use oxidelta::vcdiff::{DecodeError, Decoder, DecoderOptions, decode_all, decode_all_with_options};

fn lcg_bytes(n: usize, mut state: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        out.push((state >> 16) as u8);
    }
    out
}

#[test]
#[ignore = "multi-megabyte roundtrip is opt-in due to runtime"]
fn large_sparse_mutation_roundtrip() {
    let size = 32 * 1024 * 1024;
    let source = lcg_bytes(size, 1);
    let mut target = source.clone();
    for i in (0..target.len()).step_by(4096) {
        target[i] = target[i].wrapping_add(1);
    }
    target.extend_from_slice(b"appended trailer block");

    let delta = xdelta3::encode(&target, &source).expect("xdelta3 encode failed");
    let decoded = decode_all(&source, &delta).unwrap();
    assert_eq!(decoded.len(), target.len());
    assert_eq!(decoded, target);
}

#[test]
fn large_delta_fed_in_small_chunks_matches_single_shot() {
    let source = lcg_bytes(256 * 1024, 5);
    let mut target = source.clone();
    for i in (0..target.len()).step_by(97) {
        target[i] ^= 0x5A;
    }
    let delta = xdelta3::encode(&target, &source).expect("xdelta3 encode failed");

    let whole = decode_all(&source, &delta).unwrap();

    let mut decoder = Decoder::new(DecoderOptions::default());
    decoder.start(&source).unwrap();
    let mut chunked = Vec::new();
    for chunk in delta.chunks(37) {
        decoder.decode_chunk(chunk, &mut chunked).unwrap();
    }
    decoder.finish().unwrap();

    assert_eq!(chunked, whole);
    assert_eq!(chunked, target);
}

#[test]
fn cumulative_target_file_size_limit_is_enforced() {
    let source = lcg_bytes(8192, 3);
    let mut target = source.clone();
    target.extend_from_slice(&lcg_bytes(8192, 9));
    let delta = xdelta3::encode(&target, &source).expect("xdelta3 encode failed");

    let options = DecoderOptions {
        max_target_file_size: 1024,
        ..Default::default()
    };
    let err = decode_all_with_options(&source, &delta, options).unwrap_err();
    assert!(matches!(err, DecodeError::SizeLimitExceeded { .. }));
}

#[test]
fn edge_case_matrix() {
    let cases: Vec<(&[u8], &[u8])> = vec![
        (b"", b""),
        (b"", b"x"),
        (b"x", b""),
        (b"\0\0\0\0\0", b"\0\0\0\0\0"),
        (b"\0\0\0\0\0", b"\0\0\0\0\x01"),
    ];

    for (source, target) in cases {
        let delta = xdelta3::encode(target, source).expect("xdelta3 encode failed");
        let decoded = decode_all(source, &delta).unwrap();
        assert_eq!(decoded, target);
    }
}
