use super::*;
use crate::depth::sample::DepthSample;
use crate::foundation::core::Rgba8;

const DIMS: (u32, u32) = (24, 12);

fn dims() -> Dimensions {
    Dimensions::new(DIMS.0, DIMS.1).unwrap()
}

fn textured_view(index: u8, position: Vec3, radius: f32) -> ReferenceView {
    let d = dims();
    let mut color = Vec::with_capacity(d.pixel_count() * 4);
    let mut depth = Vec::with_capacity(d.pixel_count());
    for y in 0..d.height {
        for x in 0..d.width {
            color.extend_from_slice(&[(x * 10) as u8, (y * 20) as u8, index * 80, 255]);
            // A sentinel column exercises the "no data" path.
            depth.push(if x == 3 { 20.0 } else { radius + 0.05 * (x % 4) as f32 });
        }
    }
    let sample = DepthSample::new(d, 0.1, 20.0, depth).unwrap();
    ReferenceView::new(format!("v{index}"), position, d, color, sample).unwrap()
}

fn three_view_rig() -> CameraRig {
    CameraRig::new(vec![
        textured_view(0, Vec3::new(-0.08, 1.82, 0.75), 2.0),
        textured_view(1, Vec3::new(-0.275, 1.62, 0.60), 2.5),
        textured_view(2, Vec3::new(0.275, 1.70, 0.85), 3.0),
    ])
    .unwrap()
}

fn opts(parallel: bool, splat: PointSplat) -> SynthesisOpts {
    SynthesisOpts {
        threading: SynthesisThreading {
            parallel,
            threads: parallel.then_some(3),
        },
        splat,
        ..SynthesisOpts::default()
    }
}

#[test]
fn identity_view_reproduces_the_source_in_both_eyes() {
    let position = Vec3::new(0.1, 1.6, -0.3);
    let rig = CameraRig::new(vec![textured_view(1, position, 2.0)]).unwrap();
    let frame = synthesize(&rig, position, &ViewParams::new(1, 0.0, 1.95)).unwrap();
    let view = &rig.views()[0];

    for eye in Eye::BOTH {
        for y in 0..DIMS.1 {
            for x in 0..DIMS.0 {
                let (color, depth) = frame.pixel(eye, x, y);
                match view.depth().depth_at(x, y) {
                    Some(expected) => {
                        let src = view.color_at(x, y);
                        assert_eq!(color, Rgba8::new(src.r, src.g, src.b, 255));
                        assert!((depth - expected).abs() < 1e-4);
                    }
                    None => {
                        assert_eq!(color, Rgba8::BLACK);
                        assert_eq!(depth, f32::INFINITY);
                    }
                }
            }
        }
    }
}

#[test]
fn zero_ipd_gives_identical_eyes() {
    let rig = three_view_rig();
    let frame = synthesize(&rig, Vec3::new(0.15, 1.77, 0.77), &ViewParams::new(3, 0.0, 1.95))
        .unwrap();
    assert_eq!(frame.eye_color(Eye::Left), frame.eye_color(Eye::Right));
    assert_eq!(frame.eye_depth(Eye::Left), frame.eye_depth(Eye::Right));
    assert!(frame.written_pixels() > 0);
}

#[test]
fn positive_ipd_separates_the_eyes() {
    let rig = three_view_rig();
    let frame = synthesize(&rig, Vec3::new(0.15, 1.77, 0.77), &ViewParams::new(3, 0.3, 1.95))
        .unwrap();
    assert_ne!(frame.eye_color(Eye::Left), frame.eye_color(Eye::Right));
}

#[test]
fn parallel_scatter_matches_sequential() {
    let rig = three_view_rig();
    let params = ViewParams::new(3, 0.065, 1.95);
    let query = Vec3::new(0.15, 1.77, 0.77);
    for splat in [PointSplat::Single, PointSplat::Adaptive] {
        let (seq, seq_stats) = Synthesizer::new(&rig, opts(false, splat))
            .unwrap()
            .synthesize_with_stats(query, &params)
            .unwrap();
        let (par, par_stats) = Synthesizer::new(&rig, opts(true, splat))
            .unwrap()
            .synthesize_with_stats(query, &params)
            .unwrap();
        assert_eq!(seq.color_rgba8(), par.color_rgba8());
        assert_eq!(seq.depth(), par.depth());
        assert_eq!(seq_stats, par_stats);
    }
}

#[test]
fn scatter_order_does_not_change_the_frame() {
    let rig = three_view_rig();
    let query = Vec3::new(0.15, 1.77, 0.77);
    let params = ViewParams::new(3, 0.065, 1.95);
    let synth = Synthesizer::new(&rig, opts(false, PointSplat::Adaptive)).unwrap();
    let expected = synth.synthesize(query, &params).unwrap();

    let selection = ViewSelector::new(SelectionStrategy::DiversityFirst)
        .select(&rig, query, 3)
        .unwrap();
    let jobs = scatter_jobs(&rig, &selection);
    let ctx = ScatterContext {
        projector: params.validate(3).unwrap(),
        query,
        eye_dims: dims(),
        splat: PointSplat::Adaptive,
        view_depth_bias: DEFAULT_VIEW_DEPTH_BIAS,
        cone: None,
    };

    let triples: Vec<(usize, u32, u32)> = (0..jobs.len())
        .flat_map(|j| (0..DIMS.1).flat_map(move |y| (0..DIMS.0).map(move |x| (j, x, y))))
        .collect();

    let cells = dims().pixel_count() * 2;
    let test = DepthTest(SequentialCells::new(cells));
    for (j, x, y) in shuffled(&triples, 0x2545_f491) {
        ctx.scatter_texel(&jobs[j], x, y, &test);
    }
    let winners: Vec<u64> = test.0.into_cells().collect();
    let pass = WinnerDepths {
        winners: &winners,
        depths: SequentialCells::new(cells),
    };
    for (j, x, y) in shuffled(&triples, 0x9e37_79b9) {
        ctx.scatter_texel(&jobs[j], x, y, &pass);
    }
    let frame = StereoFrame::from_cells(dims(), &winners, pass.depths.into_cells());
    assert_eq!(frame, expected);
}

/// Deterministic Fisher-Yates with a small LCG.
fn shuffled<T: Copy>(items: &[T], seed: u64) -> Vec<T> {
    let mut out = items.to_vec();
    let mut state = seed;
    for i in (1..out.len()).rev() {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let j = (state >> 33) as usize % (i + 1);
        out.swap(i, j);
    }
    out
}

fn hollow_view(index: u8, position: Vec3) -> ReferenceView {
    let d = dims();
    let color = std::iter::repeat_n([index * 60, 0, 0, 255], d.pixel_count())
        .flatten()
        .collect();
    let sample = DepthSample::empty(d, 0.1, 20.0).unwrap();
    ReferenceView::new(format!("h{index}"), position, d, color, sample).unwrap()
}

#[test]
fn rank_bias_does_not_leak_into_written_depth() {
    let query = Vec3::new(0.0, 1.6, 0.0);
    // Only the farthest view has depth, so every written pixel comes from rank 3.
    for radius in [1.1, 3.91, 7.77] {
        let rig = CameraRig::new(vec![
            hollow_view(0, query + Vec3::new(0.05, 0.0, 0.0)),
            hollow_view(1, query + Vec3::new(0.0, 0.06, 0.0)),
            hollow_view(2, query + Vec3::new(0.0, 0.0, -0.07)),
            textured_view(3, query + Vec3::new(-0.2, 0.1, 0.15), radius),
        ])
        .unwrap();
        let params = ViewParams::new(4, 0.065, 1.95);
        let render = |parallel: bool, bias: f32| {
            let (frame, stats) = Synthesizer::new(
                &rig,
                SynthesisOpts {
                    view_depth_bias: bias,
                    ..opts(parallel, PointSplat::Adaptive)
                },
            )
            .unwrap()
            .synthesize_with_stats(query, &params)
            .unwrap();
            assert_eq!(stats.views.indices().last(), Some(&3));
            frame
        };

        let unbiased = render(false, 0.0);
        assert!(unbiased.written_pixels() > 0);
        for parallel in [false, true] {
            let biased = render(parallel, DEFAULT_VIEW_DEPTH_BIAS);
            assert_eq!(biased.color_rgba8(), unbiased.color_rgba8());
            let bits = |f: &StereoFrame| f.depth().iter().map(|d| d.to_bits()).collect::<Vec<_>>();
            assert_eq!(bits(&biased), bits(&unbiased), "radius {radius}");
        }
    }
}

#[test]
fn near_ties_go_to_the_closest_reference_view() {
    let p = Vec3::new(0.0, 1.6, 0.0);
    let rig = CameraRig::new(vec![textured_view(0, p, 2.0), textured_view(1, p, 2.0)]).unwrap();
    for bias in [0.0, DEFAULT_VIEW_DEPTH_BIAS] {
        let synth = Synthesizer::new(
            &rig,
            SynthesisOpts {
                view_depth_bias: bias,
                ..SynthesisOpts::default()
            },
        )
        .unwrap();
        let frame = synth.synthesize(p, &ViewParams::new(2, 0.0, 1.95)).unwrap();
        let (color, depth) = frame.pixel(Eye::Left, 0, 5);
        assert_eq!(color.b, 0, "rank-0 view (blue 0) must win");
        assert!((depth - 2.0).abs() < 1e-4);
    }
}

#[test]
fn adaptive_splats_fill_magnified_regions() {
    let origin = Vec3::new(0.0, 1.6, 0.0);
    let rig = CameraRig::new(vec![textured_view(0, origin, 2.0)]).unwrap();
    let query = origin + Vec3::new(0.0, 0.0, -1.0);
    let params = ViewParams::new(1, 0.065, 1.95);
    let single = Synthesizer::new(&rig, opts(false, PointSplat::Single))
        .unwrap()
        .synthesize(query, &params)
        .unwrap();
    let adaptive = Synthesizer::new(&rig, opts(false, PointSplat::Adaptive))
        .unwrap()
        .synthesize(query, &params)
        .unwrap();
    assert!(adaptive.written_pixels() > single.written_pixels());
}

#[test]
fn view_cone_culls_points_behind_the_viewer() {
    let rig = three_view_rig();
    let query = Vec3::new(0.15, 1.77, 0.77);
    let synth = Synthesizer::new(&rig, SynthesisOpts::default()).unwrap();
    let open = ViewParams::new(3, 0.065, 1.95);
    let cone = ViewCone::new(1.2, 1.0, Vec3::new(0.0, 0.0, -1.0)).unwrap();

    let (full, full_stats) = synth.synthesize_with_stats(query, &open).unwrap();
    let (culled, culled_stats) = synth
        .synthesize_with_stats(query, &open.with_view_cone(cone))
        .unwrap();
    assert_eq!(full_stats.texels_culled, 0);
    assert!(culled_stats.texels_culled > 0);
    assert_eq!(
        culled_stats.texels_projected + culled_stats.texels_culled,
        full_stats.texels_projected
    );
    assert!(culled.written_pixels() < full.written_pixels());
}

#[test]
fn invalid_parameters_are_rejected_before_work() {
    let rig = three_view_rig();
    let synth = Synthesizer::new(&rig, SynthesisOpts::default()).unwrap();
    let q = Vec3::new(0.0, 1.7, 0.7);
    for params in [
        ViewParams::new(0, 0.065, 1.95),
        ViewParams::new(4, 0.065, 1.95),
        ViewParams::new(2, -0.065, 1.95),
        ViewParams::new(2, 0.065, 0.0),
        ViewParams::new(2, f32::NAN, 1.95),
    ] {
        assert!(matches!(
            synth.synthesize(q, &params),
            Err(OdsError::InvalidArgument(_))
        ));
    }

    let bad_bias = SynthesisOpts {
        view_depth_bias: -1.0,
        ..SynthesisOpts::default()
    };
    assert!(Synthesizer::new(&rig, bad_bias).is_err());

    let zero_threads = SynthesisOpts {
        threading: SynthesisThreading {
            parallel: true,
            threads: Some(0),
        },
        ..SynthesisOpts::default()
    };
    assert!(matches!(
        Synthesizer::new(&rig, zero_threads),
        Err(OdsError::InvalidArgument(_))
    ));
}
