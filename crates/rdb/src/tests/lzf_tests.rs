use crate::lzf::decompress;

#[test]
fn literal_only_block() {
    assert_eq!(decompress(&[0x02, b'a', b'b', b'c'], 3).unwrap(), b"abc");
}

#[test]
fn empty_block_for_empty_output() {
    assert_eq!(decompress(&[], 0).unwrap(), Vec::<u8>::new());
}

#[test]
fn back_reference_overlapping_its_own_output() {
    // "a" then a 9-byte copy from distance 1.
    let block = [0x00, b'a', 0xE0, 0x00, 0x00];
    assert_eq!(decompress(&block, 10).unwrap(), b"aaaaaaaaaa");
}

#[test]
fn back_reference_repeating_a_pattern() {
    // "abc" then a 9-byte copy from distance 3.
    let block = [0x02, b'a', b'b', b'c', 0xE0, 0x00, 0x02];
    assert_eq!(decompress(&block, 12).unwrap(), b"abcabcabcabc");
}

#[test]
fn short_back_reference_uses_three_bit_length() {
    // "xy" then a 3-byte copy from distance 2.
    let block = [0x01, b'x', b'y', 0x20, 0x01];
    assert_eq!(decompress(&block, 5).unwrap(), b"xyxyx");
}

#[test]
fn extended_length_byte_is_added() {
    // "z" then 7 + 4 + 2 = 13 copies from distance 1.
    let block = [0x00, b'z', 0xE0, 0x04, 0x00];
    assert_eq!(decompress(&block, 14).unwrap(), vec![b'z'; 14]);
}

#[test]
fn reference_before_start_of_output_fails() {
    let err = decompress(&[0x00, b'a', 0x20, 0x05], 4).unwrap_err();
    assert!(err.contains("before start"), "{err}");
}

#[test]
fn reference_into_empty_output_fails() {
    assert!(decompress(&[0x20, 0x00], 3).is_err());
}

#[test]
fn output_overrunning_declared_length_fails() {
    let err = decompress(&[0x02, b'a', b'b', b'c'], 2).unwrap_err();
    assert!(err.contains("overflows"), "{err}");
    assert!(decompress(&[0x00, b'a', 0xE0, 0x00, 0x00], 5).is_err());
}

#[test]
fn short_output_fails() {
    assert!(decompress(&[0x02, b'a', b'b', b'c'], 5).is_err());
}

#[test]
fn truncated_instructions_fail() {
    assert!(decompress(&[0x05, b'a'], 6).is_err());
    assert!(decompress(&[0x00, b'a', 0xE0], 10).is_err());
    assert!(decompress(&[0x00, b'a', 0x20], 4).is_err());
}
