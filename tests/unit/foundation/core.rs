use super::*;

#[test]
fn dimensions_reject_zero_axes() {
    assert!(Dimensions::new(0, 4).is_err());
    assert!(Dimensions::new(4, 0).is_err());
    let d = Dimensions::new(8, 4).unwrap();
    assert_eq!(d.pixel_count(), 32);
    assert_eq!(d.index(3, 2), 19);
}

#[test]
fn eye_index_and_sign_follow_stacking_order() {
    assert_eq!(Eye::Left.index(), 0);
    assert_eq!(Eye::Right.index(), 1);
    assert_eq!(Eye::Left.sign(), 1.0);
    assert_eq!(Eye::Right.sign(), -1.0);
    assert_eq!(Eye::BOTH.map(Eye::index), [0, 1]);
}

#[test]
fn rgba_reads_pixel_slices_and_detects_holes() {
    let c = Rgba8::new(10, 20, 30, 40);
    assert_eq!(Rgba8::from_slice(&[9, 10, 20, 30, 40][1..]), c);
    assert_eq!(c.to_array(), [10, 20, 30, 40]);
    assert!(Rgba8::BLACK.is_black_rgb());
    assert!(!c.is_black_rgb());
}
