// A small fixed regression suite: named (source, target) pairs, each
// encoded with the real xdelta3 encoder and decoded with this crate. Keeps
// a stable set of named cases around so a future regression shows up as a
// specific failing vector name rather than a generic roundtrip failure.

struct Vector {
    name: &'static str,
    source: Vec<u8>,
    target: Vec<u8>,
}

fn lcg_bytes(n: usize, mut state: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        out.push((state >> 16) as u8);
    }
    out
}

fn vectors() -> Vec<Vector> {
    let lorem = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
        Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua."
        .to_vec();
    let mut lorem_mutated = lorem.clone();
    lorem_mutated.truncate(lorem.len() - 20);
    lorem_mutated.extend_from_slice(b" Duis aute irure dolor in reprehenderit.");

    let base = lcg_bytes(16 * 1024, 42);
    let mut patched = base.clone();
    for i in (0..patched.len()).step_by(777) {
        patched[i] ^= 0xFF;
    }

    vec![
        Vector {
            name: "empty_to_empty",
            source: Vec::new(),
            target: Vec::new(),
        },
        Vector {
            name: "empty_source",
            source: Vec::new(),
            target: b"brand new content".to_vec(),
        },
        Vector {
            name: "identical",
            source: lorem.clone(),
            target: lorem.clone(),
        },
        Vector {
            name: "small_edit",
            source: lorem.clone(),
            target: lorem_mutated,
        },
        Vector {
            name: "binary_scattered_mutation",
            source: base,
            target: patched,
        },
        Vector {
            name: "single_byte_source",
            source: b"A".to_vec(),
            target: b"AAAAAAAAAA".to_vec(),
        },
        Vector {
            name: "truncation",
            source: lcg_bytes(4096, 7),
            target: lcg_bytes(512, 7),
        },
    ]
}

#[test]
fn vector_list_is_non_empty() {
    assert!(!vectors().is_empty());
}

#[test]
fn xdelta_encode_oxidelta_decode_all_vectors() {
    for v in vectors() {
        let delta = xdelta3::encode(&v.target, &v.source)
            .unwrap_or_else(|| panic!("xdelta3 encode failed for vector {}", v.name));
        let decoded = oxidelta::vcdiff::decode_all(&v.source, &delta)
            .unwrap_or_else(|e| panic!("decode failed for vector {}: {e}", v.name));
        assert_eq!(decoded, v.target, "vector {}", v.name);
    }
}
