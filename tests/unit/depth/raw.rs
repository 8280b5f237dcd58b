use super::*;

fn bytes_of(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[test]
fn raw_values_are_sanitized() {
    let dims = Dimensions::new(3, 2).unwrap();
    let bytes = bytes_of(&[1.5, 0.0, f32::NAN, 0.05, 60.0, 9.0]);
    let s = decode_raw_f32(&bytes, dims, 0.1, 10.0).unwrap();
    assert_eq!(s.values(), &[1.5, 10.0, 10.0, 0.1, 10.0, 9.0]);
    assert_eq!(s.valid_count(), 3);
}

#[test]
fn raw_length_mismatch_is_a_format_error() {
    let dims = Dimensions::new(2, 2).unwrap();
    let bytes = bytes_of(&[1.0, 2.0, 3.0]);
    assert!(matches!(
        decode_raw_f32(&bytes, dims, 0.1, 10.0),
        Err(OdsError::Format(_))
    ));
}

#[test]
fn raw_roundtrip_is_exact() {
    let dims = Dimensions::new(2, 1).unwrap();
    let s = DepthSample::new(dims, 0.1, 10.0, vec![2.25, 10.0]).unwrap();
    let back = decode_raw_f32(&encode_raw_f32(&s), dims, 0.1, 10.0).unwrap();
    assert_eq!(back, s);
}
