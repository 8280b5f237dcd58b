use super::*;
use crate::depth::sample::DepthSample;
use crate::foundation::core::Dimensions;
use crate::rig::model::ReferenceView;

fn rig(positions: &[[f32; 3]]) -> CameraRig {
    let dims = Dimensions::new(1, 1).unwrap();
    let views = positions
        .iter()
        .enumerate()
        .map(|(i, &[x, y, z])| {
            let depth = DepthSample::empty(dims, 0.1, 10.0).unwrap();
            ReferenceView::new(format!("v{i}"), Vec3::new(x, y, z), dims, vec![0; 4], depth)
                .unwrap()
        })
        .collect();
    CameraRig::new(views).unwrap()
}

fn three_view_rig() -> CameraRig {
    rig(&[[-0.08, 1.82, 0.75], [-0.275, 1.62, 0.60], [0.275, 1.70, 0.85]])
}

const QUERY: Vec3 = Vec3::new(0.15, 1.77, 0.77);

fn assert_sorted_unique(rig: &CameraRig, query: Vec3, r: &SelectionResult) {
    let d: Vec<f32> = r
        .indices()
        .iter()
        .map(|&i| rig.views()[i].distance2_to(query))
        .collect();
    assert!(d.windows(2).all(|w| w[0] <= w[1]), "not sorted: {d:?}");
    let mut seen = r.indices().to_vec();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), r.len());
}

#[test]
fn diversity_first_three_view_scenario() {
    let rig = three_view_rig();
    let r = ViewSelector::new(SelectionStrategy::DiversityFirst)
        .select(&rig, QUERY, 3)
        .unwrap();
    assert_eq!(r.indices(), &[2, 0, 1]);
    assert_sorted_unique(&rig, QUERY, &r);
}

#[test]
fn closest_view_is_always_selected_first() {
    let rig = three_view_rig();
    for strategy in [SelectionStrategy::DiversityFirst, SelectionStrategy::Nearest] {
        let r = ViewSelector::new(strategy).select(&rig, QUERY, 1).unwrap();
        assert_eq!(r.indices(), &[2]);
    }
}

#[test]
fn diversity_prefers_views_across_the_query() {
    // Query at the origin. View 1 is nearer than view 2, but on the same side as the closest view.
    let rig = rig(&[
        [0.1, 0.1, 0.1],
        [0.2, 0.2, 0.2],
        [-0.5, -0.5, -0.5],
    ]);
    let r = ViewSelector::new(SelectionStrategy::DiversityFirst)
        .select(&rig, Vec3::ZERO, 2)
        .unwrap();
    assert_eq!(r.indices(), &[0, 2]);

    let r = ViewSelector::new(SelectionStrategy::Nearest)
        .select(&rig, Vec3::ZERO, 2)
        .unwrap();
    assert_eq!(r.indices(), &[0, 1]);
}

#[test]
fn diversity_mask_accumulates_across_picks() {
    // View 4 differs from the closest view on y and z. Once the mask carries those axes, views 2
    // and 3 both complete it and the nearer one (3) wins.
    let rig = rig(&[
        [0.1, 0.1, 0.1],
        [0.3, -0.3, 0.3],
        [-0.25, 0.25, 0.25],
        [-0.2, 0.1, 0.1],
        [0.9, -0.9, -0.9],
    ]);
    let r = ViewSelector::new(SelectionStrategy::DiversityFirst)
        .select(&rig, Vec3::ZERO, 3)
        .unwrap();
    assert_eq!(r.indices(), &[0, 3, 4]);
    assert_sorted_unique(&rig, Vec3::ZERO, &r);
}

#[test]
fn fixed_pair_always_contains_views_zero_and_one() {
    let rig = rig(&[
        [5.0, 0.0, 0.0],
        [6.0, 0.0, 0.0],
        [0.1, 0.0, 0.0],
        [0.2, 0.0, 0.0],
    ]);
    let r = ViewSelector::new(SelectionStrategy::FixedPairFirst)
        .select(&rig, Vec3::ZERO, 3)
        .unwrap();
    assert_eq!(r.indices(), &[2, 0, 1]);

    let r = ViewSelector::new(SelectionStrategy::FixedPairFirst)
        .select(&rig, Vec3::ZERO, 1)
        .unwrap();
    assert_eq!(r.indices(), &[2]);
}

#[test]
fn equal_distances_keep_pick_order() {
    let rig = rig(&[[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    let r = ViewSelector::new(SelectionStrategy::Nearest)
        .select(&rig, Vec3::ZERO, 3)
        .unwrap();
    assert_eq!(r.indices(), &[0, 1, 2]);
}

#[test]
fn selection_is_deterministic_and_complete() {
    let rig = rig(&[
        [0.3, 1.6, -0.2],
        [-0.4, 1.7, 0.1],
        [0.0, 1.5, 0.6],
        [0.2, 1.9, 0.4],
        [-0.1, 1.4, -0.5],
    ]);
    let queries = [
        Vec3::new(0.0, 1.6, 0.0),
        Vec3::new(0.25, 1.8, 0.3),
        Vec3::new(-0.3, 1.45, -0.4),
    ];
    for strategy in [
        SelectionStrategy::DiversityFirst,
        SelectionStrategy::FixedPairFirst,
        SelectionStrategy::Nearest,
    ] {
        let selector = ViewSelector::new(strategy);
        for q in queries {
            for k in 1..=rig.num_views() {
                let a = selector.select(&rig, q, k).unwrap();
                let b = selector.select(&rig, q, k).unwrap();
                assert_eq!(a, b);
                assert_eq!(a.len(), k);
                assert_sorted_unique(&rig, q, &a);
            }
        }
    }
}

#[test]
fn invalid_k_and_query_are_rejected() {
    let rig = three_view_rig();
    let selector = ViewSelector::default();
    assert!(matches!(
        selector.select(&rig, QUERY, 0),
        Err(OdsError::InvalidArgument(_))
    ));
    assert!(matches!(
        selector.select(&rig, QUERY, 4),
        Err(OdsError::InvalidArgument(_))
    ));
    assert!(matches!(
        selector.select(&rig, Vec3::new(f32::INFINITY, 0.0, 0.0), 1),
        Err(OdsError::InvalidArgument(_))
    ));
}
