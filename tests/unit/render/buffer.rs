use super::*;

fn dims() -> Dimensions {
    Dimensions::new(3, 2).unwrap()
}

#[test]
fn cleared_frame_is_opaque_black_at_infinity() {
    let f = StereoFrame::cleared(dims());
    assert_eq!(f.width(), 3);
    assert_eq!(f.height(), 4);
    assert_eq!(f.color_rgba8().len(), 3 * 4 * 4);
    assert!(f.color_rgba8().chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
    assert!(f.depth().iter().all(|d| *d == f32::INFINITY));
    assert_eq!(f.written_pixels(), 0);
}

#[test]
fn nearer_cells_win_then_lower_rank_then_smaller_rgb() {
    let red = Rgba8::new(255, 0, 0, 10);
    let blue = Rgba8::new(0, 0, 255, 10);
    assert!(pack_cell(1.0, 3, red) < pack_cell(1.5, 0, blue));
    assert!(pack_cell(1.0, 0, red) < pack_cell(1.0, 1, blue));
    assert!(pack_cell(1.0, 0, blue) < pack_cell(1.0, 0, red));
    assert!(pack_cell(f32::MAX, 255, Rgba8::new(255, 255, 255, 255)) < CLEAR_CELL);
}

#[test]
fn cells_carry_opaque_color() {
    let c = Rgba8::new(10, 20, 30, 40);
    assert_eq!(cell_color(pack_cell(2.5, 7, c)), Rgba8::new(10, 20, 30, 255));
    assert_eq!(cell_color(CLEAR_CELL), Rgba8::BLACK);
    assert_eq!(cell_depth_bits(pack_cell(2.5, 0, c)), u64::from(2.5f32.to_bits()));
    assert_eq!(cell_depth_bits(CLEAR_CELL), CLEAR_CELL);
}

#[test]
fn sequential_and_atomic_cells_keep_the_minimum() {
    let seq = SequentialCells::new(2);
    let atomic = AtomicCells::new(2);
    for cell in [9u64, 3, 7, 3, 12] {
        seq.store_min(1, cell);
        atomic.store_min(1, cell);
    }
    let a: Vec<u64> = seq.into_cells().collect();
    let b: Vec<u64> = atomic.into_cells().collect();
    assert_eq!(a, vec![CLEAR_CELL, 3]);
    assert_eq!(a, b);
}

#[test]
fn winner_depths_take_the_exact_depth_of_the_winning_cell() {
    let c = Rgba8::new(1, 2, 3, 4);
    let bias = 0.015f32;
    let exact = 3.968_066_f32;
    let offers = [
        (pack_cell(exact + 3.0 * bias, 3, c), exact),
        (pack_cell(4.5, 0, c), 4.5),
        (pack_cell(5.0, 1, c), 5.0 - bias),
    ];

    let test = DepthTest(SequentialCells::new(1));
    for (cell, depth) in offers {
        test.offer(0, cell, depth);
    }
    let winners: Vec<u64> = test.0.into_cells().collect();
    assert_eq!(winners, vec![offers[0].0]);

    let pass = WinnerDepths {
        winners: &winners,
        depths: AtomicCells::new(1),
    };
    for (cell, depth) in offers.into_iter().rev() {
        pass.offer(0, cell, depth);
    }
    // An equal cell from another texel keeps the smaller depth.
    pass.offer(0, offers[0].0, exact + 1e-6);
    let depths = pass.depths.into_cells().chain([CLEAR_CELL]).collect::<Vec<_>>();
    let f = StereoFrame::from_cells(
        Dimensions::new(1, 1).unwrap(),
        &[winners[0], CLEAR_CELL],
        depths.into_iter(),
    );
    assert_eq!(f.pixel(Eye::Left, 0, 0), (Rgba8::new(1, 2, 3, 255), exact));
    assert_eq!(f.pixel(Eye::Right, 0, 0), (Rgba8::BLACK, f32::INFINITY));
}

#[test]
fn eyes_are_stacked_left_over_right() {
    let d = dims();
    let mut cells = vec![CLEAR_CELL; d.pixel_count() * 2];
    cells[cell_index(d, Eye::Right, 2, 1)] = pack_cell(4.0, 0, Rgba8::new(1, 2, 3, 4));
    let f = StereoFrame::from_cells(d, &cells, cells.iter().map(|&c| cell_depth_bits(c)));

    assert_eq!(f.written_pixels(), 1);
    assert_eq!(f.pixel(Eye::Right, 2, 1), (Rgba8::new(1, 2, 3, 255), 4.0));
    assert_eq!(f.pixel(Eye::Left, 2, 1).1, f32::INFINITY);
    assert_eq!(&f.eye_color(Eye::Right)[20..24], &[1, 2, 3, 255]);
    assert_eq!(f.eye_depth(Eye::Left).len(), 6);
}
