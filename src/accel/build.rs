//! Top-down N-ary BVH builder over spheres.
//!
//! Each internal node is produced by up to `log2(branching_factor)` rounds of
//! binary splits over its primitive range. A split picks the axis of maximum
//! center variance and cuts at the mean (two-element ranges cut at the
//! midpoint on X). The construction tree lives in an index arena and is
//! flattened into a pre-order skip-index array before the arena is dropped.
//! Both passes run from explicit work stacks: coincident centers peel one
//! primitive per split, so tree depth can reach the primitive count.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::node::{BuildNode, FlatNode, NOT_A_LEAF, NO_NODE};
use super::traverse::FlatBvh;
use crate::geom::Sphere;
use crate::util::Vec3;

/// Builder parameters.
///
/// The cost constants are carried for compatibility with SAH-style
/// configurations; the variance split heuristic does not evaluate them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhParams {
    pub branching_factor: u32,
    pub traversal_cost: f32,
    pub isect_cost: f32,
    pub empty_bonus: f32,
}

impl Default for BvhParams {
    fn default() -> Self {
        Self {
            branching_factor: 4,
            traversal_cost: 1.0,
            isect_cost: 80.0,
            empty_bonus: 0.5,
        }
    }
}

/// Round a requested branching factor up to 2, 4 or 8.
pub fn clamp_branching_factor(requested: u32) -> u32 {
    match requested {
        0..=2 => 2,
        3..=4 => 4,
        _ => 8,
    }
}

/// Sphere BVH builder.
#[derive(Debug, Clone)]
pub struct BvhBuilder {
    params: BvhParams,
    split_rounds: u32,
}

impl BvhBuilder {
    pub fn new(params: BvhParams) -> Self {
        let branching_factor = clamp_branching_factor(params.branching_factor);
        Self {
            params: BvhParams { branching_factor, ..params },
            split_rounds: branching_factor.trailing_zeros(),
        }
    }

    pub fn params(&self) -> &BvhParams {
        &self.params
    }

    /// Build the flattened hierarchy over `primitives`.
    ///
    /// Leaf primitive indices refer to positions in `primitives`. The input
    /// must contain at least one sphere.
    #[tracing::instrument(skip_all, fields(prims = primitives.len()))]
    pub fn build(&self, primitives: &[Sphere]) -> FlatBvh {
        debug_assert!(!primitives.is_empty(), "BVH needs at least one primitive");
        if primitives.is_empty() {
            return FlatBvh::from_nodes(Vec::new());
        }

        let mut ctx = Construction {
            centers: primitives.iter().map(|s| s.center).collect(),
            primitives,
            indices: (0..primitives.len() as u32).collect(),
            arena: Vec::with_capacity(2 * primitives.len()),
            split_rounds: self.split_rounds,
        };
        let root = ctx.build_tree();

        let nodes = flatten(&ctx.arena, root);
        // arena dropped with ctx here; the flat array is all that survives

        let bvh = FlatBvh::from_nodes(nodes);
        debug_assert!(bvh.is_well_formed());
        bvh
    }
}

impl Default for BvhBuilder {
    fn default() -> Self {
        Self::new(BvhParams::default())
    }
}

struct Construction<'a> {
    primitives: &'a [Sphere],
    centers: Vec<Vec3>,
    indices: Vec<u32>,
    arena: Vec<BuildNode>,
    split_rounds: u32,
}

impl Construction<'_> {
    fn push(&mut self, node: BuildNode) -> u32 {
        self.arena.push(node);
        (self.arena.len() - 1) as u32
    }

    /// Allocate the arena node for `indices[begin..end]`.
    fn push_range(&mut self, begin: usize, end: usize) -> u32 {
        if end - begin == 1 {
            let prim = self.indices[begin];
            self.push(BuildNode::leaf(self.primitives[prim as usize], prim))
        } else {
            self.push(BuildNode::internal())
        }
    }

    /// Build the whole tree, returning the root's arena index.
    ///
    /// Children are always allocated after their parent, so internal bounds
    /// are filled in one reverse sweep over the arena at the end.
    fn build_tree(&mut self) -> u32 {
        let len = self.indices.len();
        let root = self.push_range(0, len);
        let mut work: Vec<(u32, usize, usize, usize)> = Vec::new();
        if len > 1 {
            work.push((root, 0, len, 0));
        }

        while let Some((node, begin, end, axis)) = work.pop() {
            let (bounds, axis) = self.split_range(begin, end, axis);
            let mut prev = NO_NODE;
            for w in bounds.windows(2) {
                let child = self.push_range(w[0], w[1]);
                if w[1] - w[0] > 1 {
                    work.push((child, w[0], w[1], axis));
                }
                if prev == NO_NODE {
                    self.arena[node as usize].first_child = child;
                } else {
                    self.arena[prev as usize].next_sibling = child;
                }
                prev = child;
            }
        }

        for i in (0..self.arena.len()).rev() {
            let n = &self.arena[i];
            if n.primitive != NOT_A_LEAF {
                continue;
            }
            let mut child = n.first_child;
            let mut bound = self.arena[child as usize].bound;
            child = self.arena[child as usize].next_sibling;
            while child != NO_NODE {
                let c = &self.arena[child as usize];
                bound = bound.union(&c.bound);
                child = c.next_sibling;
            }
            self.arena[i].bound = bound;
        }

        root
    }

    /// Run the split rounds over `indices[begin..end]`.
    ///
    /// Returns the child range boundaries and the axis handed to the children.
    fn split_range(&mut self, begin: usize, end: usize, axis: usize) -> (SmallVec<[usize; 9]>, usize) {
        let mut bounds: SmallVec<[usize; 9]> = SmallVec::new();
        bounds.push(begin);
        bounds.push(end);
        let mut axis = axis;

        for _ in 0..self.split_rounds {
            let mut next: SmallVec<[usize; 9]> = SmallVec::new();
            next.push(begin);
            for w in bounds.windows(2) {
                let (b, e) = (w[0], w[1]);
                if e - b >= 2 {
                    let (split_axis, value) = self.best_split(b, e, axis);
                    let mid = self.partition(b, e, split_axis, value);
                    // coincident centers must still be divided
                    next.push(mid.clamp(b + 1, e - 1));
                    axis = split_axis;
                }
                next.push(e);
            }
            bounds = next;
        }

        (bounds, axis)
    }

    /// Choose split axis and value for `indices[begin..end]`.
    ///
    /// `suggested` is used only when every center coincides.
    fn best_split(&self, begin: usize, end: usize, suggested: usize) -> (usize, f32) {
        let range = &self.indices[begin..end];
        if range.len() == 2 {
            let a = self.centers[range[0] as usize];
            let b = self.centers[range[1] as usize];
            return (0, (a.x + b.x) * 0.5);
        }

        let inv_n = 1.0 / range.len() as f32;
        let mean = range
            .iter()
            .fold(Vec3::ZERO, |acc, &i| acc + self.centers[i as usize])
            * inv_n;
        let variance = range.iter().fold(Vec3::ZERO, |acc, &i| {
            let d = self.centers[i as usize] - mean;
            acc + d * d
        });

        if variance == Vec3::ZERO {
            return (suggested, mean[suggested]);
        }

        let mut axis = 0;
        if variance.y > variance[axis] {
            axis = 1;
        }
        if variance.z > variance[axis] {
            axis = 2;
        }
        (axis, mean[axis])
    }

    /// Three-way partition of `indices[begin..end]` around `value` on `axis`:
    /// `[< value][== value][> value]`. Returns the absolute split index.
    fn partition(&mut self, begin: usize, end: usize, axis: usize, value: f32) -> usize {
        let centers = &self.centers;
        let slice = &mut self.indices[begin..end];
        let key = |i: u32| centers[i as usize][axis];

        let mut lt = 0;
        let mut i = 0;
        let mut gt = slice.len();
        while i < gt {
            let k = key(slice[i]);
            if k < value {
                slice.swap(lt, i);
                lt += 1;
                i += 1;
            } else if k > value {
                gt -= 1;
                slice.swap(i, gt);
            } else {
                i += 1;
            }
        }

        begin + if lt > 0 { lt } else { gt }
    }
}

enum Visit {
    Enter(u32),
    Close(usize),
}

/// Pre-order flatten; each slot's skip index points just past its subtree.
fn flatten(arena: &[BuildNode], root: u32) -> Vec<FlatNode> {
    let mut out = Vec::with_capacity(arena.len());
    let mut stack = vec![Visit::Enter(root)];
    let mut children: SmallVec<[u32; 8]> = SmallVec::new();

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(node) => {
                let n = &arena[node as usize];
                let slot = out.len();
                out.push(FlatNode::new(n.bound, n.primitive, slot as u32 + 1));
                if n.primitive != NOT_A_LEAF {
                    stack.push(Visit::Close(slot));
                    children.clear();
                    let mut child = n.first_child;
                    while child != NO_NODE {
                        children.push(child);
                        child = arena[child as usize].next_sibling;
                    }
                    stack.extend(children.iter().rev().map(|&c| Visit::Enter(c)));
                }
            }
            Visit::Close(slot) => out[slot].skip_index = out.len() as u32,
        }
    }

    out
}
