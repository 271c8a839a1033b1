//! Stackless traversal of the flattened BVH.

use super::node::FlatNode;
use crate::geom::{Ray, Sphere};

/// Closest hit reported by [`FlatBvh::intersect`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhHit {
    pub primitive: u32,
    pub sphere: Sphere,
    pub distance: f32,
}

/// Flattened sphere hierarchy: a relocatable array with no owning links.
///
/// Node `0` is the root; its `skip_index` equals the node count.
#[derive(Debug, Clone, Default)]
pub struct FlatBvh {
    nodes: Vec<FlatNode>,
}

impl FlatBvh {
    pub(crate) fn from_nodes(nodes: Vec<FlatNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[FlatNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node array as raw bytes for device upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    /// Bounding sphere of the whole hierarchy.
    pub fn bound(&self) -> Option<Sphere> {
        self.nodes.first().map(FlatNode::sphere)
    }

    /// Closest-hit query.
    ///
    /// Narrows `ray.maxt` each time a strictly closer leaf is found and keeps
    /// going until the whole array is consumed or skipped.
    #[inline]
    pub fn intersect(&self, ray: &mut Ray) -> Option<BvhHit> {
        let stop = self.nodes.first()?.skip_index as usize;
        let mut best = None;
        let mut i = 0;

        while i < stop {
            let node = &self.nodes[i];
            let sphere = node.sphere();
            let (hit, t) = sphere.intersect_p(ray);
            if !hit {
                i = node.skip_index as usize;
                continue;
            }
            if node.is_leaf() && t < ray.maxt {
                ray.maxt = t;
                best = Some(BvhHit { primitive: node.primitive, sphere, distance: t });
            }
            i += 1;
        }

        best
    }

    /// Any-hit query: stops at the first leaf with a valid root in the interval.
    #[inline]
    pub fn occluded(&self, ray: &Ray) -> bool {
        let Some(root) = self.nodes.first() else { return false };
        let stop = root.skip_index as usize;
        let mut i = 0;

        while i < stop {
            let node = &self.nodes[i];
            let (hit, t) = node.sphere().intersect_p(ray);
            if !hit {
                i = node.skip_index as usize;
                continue;
            }
            if node.is_leaf() && t.is_finite() {
                return true;
            }
            i += 1;
        }

        false
    }

    /// Number of leaf nodes (equals the primitive count).
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Maximum root-to-leaf depth (a single leaf has depth 1).
    pub fn depth(&self) -> usize {
        let mut open: Vec<usize> = Vec::new();
        let mut max_depth = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            while open.last().is_some_and(|&end| end <= i) {
                open.pop();
            }
            max_depth = max_depth.max(open.len() + 1);
            if !node.is_leaf() {
                open.push(node.skip_index as usize);
            }
        }
        max_depth
    }

    /// Check the pre-order skip layout.
    ///
    /// Root skips to the end, leaves skip to the next slot, and every internal
    /// node's children tile `[i + 1, skip_index)` exactly.
    pub fn is_well_formed(&self) -> bool {
        let len = self.nodes.len();
        if len == 0 {
            return true;
        }
        if self.nodes[0].skip_index as usize != len {
            return false;
        }
        for (i, node) in self.nodes.iter().enumerate() {
            let skip = node.skip_index as usize;
            if skip <= i || skip > len {
                return false;
            }
            if node.is_leaf() {
                if skip != i + 1 {
                    return false;
                }
                continue;
            }
            if skip == i + 1 {
                return false; // internal node without children
            }
            let mut j = i + 1;
            while j < skip {
                let child_skip = self.nodes[j].skip_index as usize;
                if child_skip <= j || child_skip > skip {
                    return false;
                }
                j = child_skip;
            }
            if j != skip {
                return false;
            }
        }
        true
    }
}
