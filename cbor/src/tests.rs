use crate::{decode, encode};
use hex_literal::hex;

#[test]
fn rfc_appendix_a_integers() {
    // RFC 8949, Appendix A: https://www.rfc-editor.org/rfc/rfc8949.html#appendix-A
    assert_eq!(encode::emit(&0u64).0, hex!("00"));
    assert_eq!(encode::emit(&1u64).0, hex!("01"));
    assert_eq!(encode::emit(&10u64).0, hex!("0a"));
    assert_eq!(encode::emit(&23u64).0, hex!("17"));
    assert_eq!(encode::emit(&24u64).0, hex!("1818"));
    assert_eq!(encode::emit(&25u64).0, hex!("1819"));
    assert_eq!(encode::emit(&100u64).0, hex!("1864"));
    assert_eq!(encode::emit(&1000u64).0, hex!("1903e8"));
    assert_eq!(encode::emit(&1000000u64).0, hex!("1a000f4240"));
    assert_eq!(
        encode::emit(&1000000000000u64).0,
        hex!("1b000000e8d4a51000")
    );
    assert_eq!(
        encode::emit(&18446744073709551615u64).0,
        hex!("1bffffffffffffffff")
    );
    assert_eq!(encode::emit(&-1i64).0, hex!("20"));
    assert_eq!(encode::emit(&-10i64).0, hex!("29"));
    assert_eq!(encode::emit(&-100i64).0, hex!("3863"));
    assert_eq!(encode::emit(&-1000i64).0, hex!("3903e7"));
}

#[test]
fn round_trip_uint() {
    for v in [0u64, 23, 24, 255, 256, 65535, 65536, u32::MAX as u64, u64::MAX] {
        let (bytes, _) = encode::emit(&v);
        let decoded = decode::parse::<u64>(&bytes).unwrap();
        assert_eq!(decoded, v);
        assert_eq!(decode::read_uint(&bytes).unwrap().1, bytes.len());
    }
}

#[test]
fn round_trip_int() {
    for v in [-1i64, -1000, 0, 1000, i32::MIN as i64, i32::MAX as i64] {
        let (bytes, _) = encode::emit(&v);
        let (decoded, len) = decode::read_int(&bytes).unwrap();
        assert_eq!(decoded, v);
        assert_eq!(len, bytes.len());
    }
}

#[test]
fn byte_string_round_trip() {
    let payload = b"hello, world";
    let (bytes, range) = encode::emit(&encode::Bytes(payload));
    assert_eq!(&bytes[range], payload);

    let (decoded_range, len) = decode::read_bytes(&bytes).unwrap();
    assert_eq!(&bytes[decoded_range], payload);
    assert_eq!(len, bytes.len());
}

#[test]
fn nested_array() {
    let (bytes, _) = encode::emit(&(1u64, (2u64, 3u64)));

    let ((a, (b, c)), len) =
        decode::parse::<(u64, (u64, u64))>(&bytes).map(|v| (v, 0)).unwrap();
    let _ = len;
    assert_eq!((a, b, c), (1, 2, 3));

    let (_, total_len) = <(u64, (u64, u64)) as decode::FromCbor>::from_cbor(&bytes).unwrap();
    assert_eq!(total_len, bytes.len());
}

/// CRC backfill protocol: reserve a zero-filled slot, compute a digest
/// over everything including the zeros, then patch the slot in place.
#[test]
fn reserve_and_patch_round_trips() {
    let mut e = encode::Encoder::new();
    e.emit_array(2, |a| {
        a.emit(&42u64);
        let range = a.reserve_bytes(2);
        a.patch(range, &[0xAB, 0xCD]);
    });
    let bytes = e.build();
    assert_eq!(bytes, hex!("82182a42abcd"));
}
