mod common;

use common::*;
use packbuf::Reader;

#[test]
fn varint32_wire_lengths() {
    let cases: &[(u32, usize)] = &[
        (0, 1),
        (127, 1),
        (128, 2),
        (16383, 2),
        (16384, 3),
        (0x1F_FFFF, 3),
        (0x0FFF_FFFF, 4),
        (0xFFFF_FFFF, 5),
    ];
    for &(value, wire_len) in cases {
        let mut w = writer();
        assert_eq!(w.write_varint32(value as i32, true).unwrap(), wire_len, "value {value:#x}");
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), wire_len, "value {value:#x}");

        let mut r = Reader::from_bytes(bytes);
        assert_eq!(r.read_varint32(true).unwrap() as u32, value);
        assert_eq!(r.position(), wire_len);
    }
}

#[test]
fn varint64_wire_lengths() {
    let mut w = writer();
    assert_eq!(w.write_varint64(0x7f, true).unwrap(), 1);
    assert_eq!(w.write_varint64(i64::MAX, true).unwrap(), 9);
    let mut r = Reader::from_bytes(w.into_inner());
    assert_eq!(r.read_varint64(true).unwrap(), 0x7f);
    assert_eq!(r.read_varint64(true).unwrap(), i64::MAX);
}

#[test]
fn zigzag_minus_one_is_a_single_byte() {
    let mut w = writer();
    assert_eq!(w.write_varint32(-1, false).unwrap(), 1);
    let bytes = w.into_inner();
    assert_eq!(bytes, vec![0x01]);

    let mut r = Reader::from_bytes(bytes);
    assert_eq!(r.read_varint32(false).unwrap(), -1);

    let mut w = writer();
    assert_eq!(w.write_varint64(-1, false).unwrap(), 1);
    let mut r = Reader::from_bytes(w.into_inner());
    assert_eq!(r.read_varint64(false).unwrap(), -1);
}

#[test]
fn decodes_known_vectors() {
    let mut r = Reader::from_bytes(vec![0xe5, 0x8e, 0x26]);
    assert_eq!(r.read_varint32(true).unwrap(), 624_485);
    assert_eq!(r.position(), 3);

    let mut r = Reader::from_bytes(vec![0x01]);
    assert_eq!(r.read_varint32(false).unwrap(), -1);
}

#[test]
fn fast_and_slow_paths_agree() {
    let values: &[i64] = &[
        0,
        1,
        -1,
        63,
        64,
        127,
        128,
        300,
        -300,
        16384,
        i64::from(i32::MAX),
        i64::from(i32::MIN),
        0x0102_0304_0506_0708,
        i64::MAX,
        i64::MIN,
    ];
    for &v in values {
        for &optimize_positive in &[true, false] {
            let mut w = writer();
            w.write_varint64(v, optimize_positive).unwrap();
            let bytes = w.into_inner();

            let mut fast = Reader::from_bytes(bytes.clone());
            assert_eq!(fast.read_varint64(optimize_positive).unwrap(), v);

            // a one-byte window forces the per-byte path
            let (source, _) = CountingSource::new(bytes, 1);
            let mut slow = Reader::from_source(source, 1);
            assert_eq!(slow.read_varint64(optimize_positive).unwrap(), v);
        }
    }

    for &v in &[0i32, 1, -1, 127, 128, 16384, i32::MAX, i32::MIN] {
        for &optimize_positive in &[true, false] {
            let mut w = writer();
            w.write_varint32(v, optimize_positive).unwrap();
            let bytes = w.into_inner();

            let mut fast = Reader::from_bytes(bytes.clone());
            assert_eq!(fast.read_varint32(optimize_positive).unwrap(), v);

            let (source, _) = CountingSource::new(bytes, 1);
            let mut slow = Reader::from_source(source, 1);
            assert_eq!(slow.read_varint32(optimize_positive).unwrap(), v);
        }
    }
}

#[test]
fn can_read_varint32_predicts_success() {
    let mut r = Reader::from_bytes(vec![0x05]);
    assert!(r.can_read_varint32().unwrap());
    assert_eq!(r.position(), 0);
    assert_eq!(r.read_varint32(true).unwrap(), 5);
    assert!(!r.can_read_varint32().unwrap());

    // residency ends on a continuation byte
    let mut r = Reader::from_bytes(vec![0x80, 0x80]);
    assert!(!r.can_read_varint32().unwrap());

    // five resident bytes always decode
    let mut r = Reader::from_bytes(vec![0x80; 5]);
    assert!(r.can_read_varint32().unwrap());
    assert!(r.read_varint32(true).is_ok());
}

#[test]
fn can_read_varint64_predicts_success() {
    let mut r = Reader::from_bytes(vec![0x7f]);
    assert!(r.can_read_varint64().unwrap());

    let mut r = Reader::from_bytes(vec![0x80; 8]);
    assert!(!r.can_read_varint64().unwrap());

    let mut r = Reader::from_bytes(vec![0x80; 9]);
    assert!(r.can_read_varint64().unwrap());
    assert!(r.read_varint64(true).is_ok());
}

#[test]
fn can_read_matches_read_for_arbitrary_prefixes() {
    // every truncation of a nine-byte varint
    let mut w = writer();
    w.write_varint64(i64::MIN, false).unwrap();
    let bytes = w.into_inner();
    for len in 0..=bytes.len() {
        let prefix = bytes[..len].to_vec();
        let can = Reader::from_bytes(prefix.clone()).can_read_varint64().unwrap();
        let ok = Reader::from_bytes(prefix).read_varint64(false).is_ok();
        assert_eq!(can, ok, "prefix length {len}");
    }
}
