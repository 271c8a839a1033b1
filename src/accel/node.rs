//! BVH node types.
//!
//! Two layouts:
//! - [`BuildNode`]: construction-time arena entry, first-child / next-sibling links
//! - [`FlatNode`]: traversal-time entry, 32 bytes, pre-order with skip indices

use bytemuck::{Pod, Zeroable};

use crate::geom::Sphere;
use crate::util::Vec3;

/// Primitive index stored in internal nodes.
pub const NOT_A_LEAF: u32 = u32::MAX;

/// Absent link in the construction arena.
pub(crate) const NO_NODE: u32 = u32::MAX;

/// Arena entry used while building. Never outlives [`super::BvhBuilder::build`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct BuildNode {
    pub bound: Sphere,
    pub primitive: u32,
    pub first_child: u32,
    pub next_sibling: u32,
}

impl BuildNode {
    pub fn leaf(bound: Sphere, primitive: u32) -> Self {
        Self { bound, primitive, first_child: NO_NODE, next_sibling: NO_NODE }
    }

    pub fn internal() -> Self {
        Self {
            bound: Sphere::new(Vec3::ZERO, 0.0),
            primitive: NOT_A_LEAF,
            first_child: NO_NODE,
            next_sibling: NO_NODE,
        }
    }
}

/// GPU-friendly flattened node (32 bytes, matches the WGSL `Node` struct).
///
/// The subtree rooted at array slot `i` occupies exactly `[i, skip_index)`.
/// Leaves carry the primitive index and the primitive's own sphere as bound.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FlatNode {
    pub center: [f32; 3],
    pub radius: f32,
    pub primitive: u32,
    pub skip_index: u32,
    pub _pad: [u32; 2],
}

impl FlatNode {
    pub fn new(bound: Sphere, primitive: u32, skip_index: u32) -> Self {
        Self {
            center: bound.center.to_array(),
            radius: bound.radius,
            primitive,
            skip_index,
            _pad: [0; 2],
        }
    }

    /// Bounding sphere of this node.
    #[inline]
    pub fn sphere(&self) -> Sphere {
        Sphere::new(Vec3::from_array(self.center), self.radius)
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.primitive != NOT_A_LEAF
    }
}
