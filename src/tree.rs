//! Balanced kd-tree over a fixed point set.
//!
//! The tree is built once per clustering run and is immutable afterwards.
//! Every node carries the tight axis-aligned bounding box of its subtree
//! (`cell_min`/`cell_max`) and an [`Accumulator`] holding the subtree's
//! coordinate sum and point count — the node's "virtual point" used by the
//! filtering descent for coarse comparisons. Leaves hold exactly one point.
//!
//! Construction cycles the split axis with depth (`depth % D`), selects the
//! median with a partial selection rather than a full sort, and recurses on
//! the two halves, forking the recursion onto the rayon pool while the depth
//! is shallow enough for the split work to outweigh scheduling overhead.

use rayon::join;

use crate::point::Accumulator;

/// Depth below which recursive divide-and-conquer work is forked onto the
/// thread pool. Deeper subtrees run on the calling thread.
pub(crate) fn parallel_cutoff() -> usize {
    rayon::current_num_threads().ilog2() as usize + 1
}

/// A node of the kd-tree.
#[derive(Debug)]
pub(crate) struct KdNode<const D: usize> {
    /// Per-dimension lower corner of the tight bounding box of the subtree.
    pub(crate) cell_min: [f64; D],
    /// Per-dimension upper corner.
    pub(crate) cell_max: [f64; D],
    /// Coordinate sum and count over every point in the subtree.
    pub(crate) agg: Accumulator<D>,
    pub(crate) kind: NodeKind<D>,
}

#[derive(Debug)]
pub(crate) enum NodeKind<const D: usize> {
    /// Exactly one point. The cell degenerates to the point itself.
    Leaf { point: [f64; D] },
    /// Two children covering the left (`<=` median along the split axis) and
    /// right halves of this node's slot span.
    Split {
        left: Box<KdNode<D>>,
        right: Box<KdNode<D>>,
    },
}

/// Balanced spatial index over a point set.
///
/// Nodes span contiguous ranges of an internal slot permutation, which is
/// what lets a filtering pass hand disjoint assignment slices to concurrent
/// subtree walks. [`KdTree::slots`] maps a slot back to the point's index in
/// the input slice.
#[derive(Debug)]
pub struct KdTree<const D: usize> {
    root: KdNode<D>,
    slots: Vec<usize>,
}

impl<const D: usize> KdTree<D> {
    /// Build the tree. Returns `None` for an empty point set.
    pub fn build(points: &[[f64; D]]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut slots: Vec<usize> = (0..points.len()).collect();
        let cutoff = parallel_cutoff();
        let root = build_node(points, &mut slots, 0, cutoff);
        Some(Self { root, slots })
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always `false`: empty input never produces a tree.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn root(&self) -> &KdNode<D> {
        &self.root
    }

    /// Slot permutation: `slots()[slot]` is the point's input index.
    pub(crate) fn slots(&self) -> &[usize] {
        &self.slots
    }
}

fn build_node<const D: usize>(
    data: &[[f64; D]],
    slots: &mut [usize],
    depth: usize,
    cutoff: usize,
) -> KdNode<D> {
    debug_assert!(!slots.is_empty());

    // One O(len) pass per node: tight bounds plus the subtree aggregate.
    let mut cell_min = [f64::INFINITY; D];
    let mut cell_max = [f64::NEG_INFINITY; D];
    let mut agg = Accumulator::zero();
    for &slot in slots.iter() {
        let p = &data[slot];
        for i in 0..D {
            cell_min[i] = cell_min[i].min(p[i]);
            cell_max[i] = cell_max[i].max(p[i]);
        }
        agg.add(p);
    }

    if let [slot] = *slots {
        return KdNode {
            cell_min,
            cell_max,
            agg,
            kind: NodeKind::Leaf { point: data[slot] },
        };
    }

    let axis = depth % D;
    let mid = slots.len() / 2;
    slots.select_nth_unstable_by(mid, |&a, &b| data[a][axis].total_cmp(&data[b][axis]));
    let (lo, hi) = slots.split_at_mut(mid);

    let (left, right) = if depth < cutoff {
        join(
            || build_node(data, lo, depth + 1, cutoff),
            || build_node(data, hi, depth + 1, cutoff),
        )
    } else {
        (
            build_node(data, lo, depth + 1, cutoff),
            build_node(data, hi, depth + 1, cutoff),
        )
    };

    KdNode {
        cell_min,
        cell_max,
        agg,
        kind: NodeKind::Split {
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}
