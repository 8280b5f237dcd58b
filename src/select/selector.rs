use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::foundation::core::Vec3;
use crate::foundation::error::{OdsError, OdsResult};
use crate::rig::model::CameraRig;

/// How reference views are chosen for a query viewpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Closest view first, then greedily favor views on the other side of the query along as many
    /// axes as possible.
    #[default]
    DiversityFirst,
    /// Views 0 and 1 (the rig's fixed stereo pair) first, the rest by distance.
    FixedPairFirst,
    /// The `k` closest views.
    Nearest,
}

/// Indices of the selected views, ordered by ascending distance to the query.
///
/// The position of a view in this list is its rank: rank 0 is the closest view and is the one
/// favored when depths tie during compositing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionResult {
    indices: SmallVec<[usize; 8]>,
}

impl SelectionResult {
    /// Selected view indices in rank order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of selected views.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Always `false` for results produced by [`ViewSelector::select`].
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// `(rank, view_index)` pairs.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.indices.iter().copied().enumerate()
    }
}

/// Picks which reference views contribute to a synthesized frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct ViewSelector {
    strategy: SelectionStrategy,
}

impl ViewSelector {
    /// Selector using `strategy`.
    pub fn new(strategy: SelectionStrategy) -> Self {
        Self { strategy }
    }

    /// Configured strategy.
    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    /// Choose `k` distinct views of `rig` for a camera at `query`.
    ///
    /// `k` must lie in `[1, rig.num_views()]`. Whatever the strategy, the result is finally sorted
    /// by ascending squared distance to `query`; the sort is stable so equal distances keep their
    /// pick order.
    pub fn select(&self, rig: &CameraRig, query: Vec3, k: usize) -> OdsResult<SelectionResult> {
        let n = rig.num_views();
        if k == 0 || k > n {
            return Err(OdsError::invalid_argument(format!(
                "k must be in [1, {n}] (got {k})"
            )));
        }
        if !query.is_finite() {
            return Err(OdsError::invalid_argument(format!(
                "query position must be finite (got {query})"
            )));
        }

        let dist2: SmallVec<[f32; 16]> = rig
            .views()
            .iter()
            .map(|v| v.distance2_to(query))
            .collect();
        let offsets: SmallVec<[Vec3; 16]> =
            rig.views().iter().map(|v| query - v.position()).collect();

        let mut indices = match self.strategy {
            SelectionStrategy::DiversityFirst => diversity_first(&dist2, &offsets, k),
            SelectionStrategy::FixedPairFirst => fixed_pair_first(&dist2, k),
            SelectionStrategy::Nearest => nearest_excluding(&dist2, &[], k),
        };
        indices.sort_by(|&a, &b| dist2[a].total_cmp(&dist2[b]));
        Ok(SelectionResult { indices })
    }
}

/// Which axes of `v` have their sign bit set, one bit per axis.
fn sign_mask(v: Vec3) -> u8 {
    u8::from(v.x.is_sign_negative())
        | (u8::from(v.y.is_sign_negative()) << 1)
        | (u8::from(v.z.is_sign_negative()) << 2)
}

/// Index of the smallest distance; the lowest index wins ties.
fn closest(dist2: &[f32], taken: &[usize]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &d) in dist2.iter().enumerate() {
        if taken.contains(&i) {
            continue;
        }
        if best.is_none_or(|b| d < dist2[b]) {
            best = Some(i);
        }
    }
    best
}

fn diversity_first(dist2: &[f32], offsets: &[Vec3], k: usize) -> SmallVec<[usize; 8]> {
    let mut picked = SmallVec::<[usize; 8]>::new();
    let Some(first) = closest(dist2, &[]) else {
        return picked;
    };
    picked.push(first);
    let reference_signs = sign_mask(offsets[first]);

    // Axes on which some already-picked view sits on the other side of the query from the
    // closest view. Never cleared.
    let mut diff_mask = 0u8;
    while picked.len() < k {
        let mut best: Option<(usize, u8)> = None;
        for (i, &d) in dist2.iter().enumerate() {
            if picked.contains(&i) {
                continue;
            }
            let mask = diff_mask | (sign_mask(offsets[i]) ^ reference_signs);
            let score = mask.count_ones();
            let better = match best {
                None => true,
                Some((b, b_mask)) => {
                    let b_score = b_mask.count_ones();
                    score > b_score || (score == b_score && d < dist2[b])
                }
            };
            if better {
                best = Some((i, mask));
            }
        }
        let Some((next, mask)) = best else { break };
        picked.push(next);
        diff_mask = mask;
    }
    picked
}

fn fixed_pair_first(dist2: &[f32], k: usize) -> SmallVec<[usize; 8]> {
    if k < 2 {
        return nearest_excluding(dist2, &[], k);
    }
    let mut picked: SmallVec<[usize; 8]> = SmallVec::from_slice(&[0, 1]);
    let rest = nearest_excluding(dist2, &picked, k - 2);
    picked.extend(rest);
    picked
}

/// The `count` closest views not in `taken`, closest first.
fn nearest_excluding(dist2: &[f32], taken: &[usize], count: usize) -> SmallVec<[usize; 8]> {
    let mut picked = SmallVec::<[usize; 8]>::new();
    let mut excluded: SmallVec<[usize; 8]> = SmallVec::from_slice(taken);
    while picked.len() < count {
        let Some(i) = closest(dist2, &excluded) else {
            break;
        };
        picked.push(i);
        excluded.push(i);
    }
    picked
}

#[cfg(test)]
#[path = "../../tests/unit/select/selector.rs"]
mod tests;
