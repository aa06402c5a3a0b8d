//! Spatial index over flowline bounding rectangles (Component A)
//!
//! A simple bulk-loaded, static R-tree indexed by ordinal position (not
//! `lineID`). Built once per region and queried by the snapper with a
//! windowed rectangle.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Leaf capacity used when bulk-loading. A reasonable default for
/// flowline-scale inputs (tens of thousands to low millions of segments).
pub const DEFAULT_LEAF_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        rect: Rect,
        entries: Vec<(Rect, usize)>,
    },
    Branch {
        rect: Rect,
        children: Vec<Node>,
    },
}

impl Node {
    fn rect(&self) -> Rect {
        match self {
            Node::Leaf { rect, .. } => *rect,
            Node::Branch { rect, .. } => *rect,
        }
    }

    fn query(&self, window: Rect, out: &mut Vec<usize>) {
        if !self.rect().intersects(&window) {
            return;
        }
        match self {
            Node::Leaf { entries, .. } => {
                for (rect, ordinal) in entries {
                    if rect.intersects(&window) {
                        out.push(*ordinal);
                    }
                }
            }
            Node::Branch { children, .. } => {
                for child in children {
                    child.query(window, out);
                }
            }
        }
    }
}

/// A 2-D bounding-box index over flowline geometries, queried by ordinal
/// position in the slice of rectangles it was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowlineIndex {
    root: Option<Node>,
    leaf_capacity: usize,
    len: usize,
}

impl FlowlineIndex {
    /// Builds the index over `rects`, indexed by position in the slice.
    /// Construction is deterministic for identical input: ties in the
    /// sort-tile-recursive bulk load are broken by ordinal position, so the
    /// tree shape (and therefore query result order before any caller-side
    /// sort) never depends on anything but the input values and order.
    pub fn build(rects: &[Rect]) -> Self {
        Self::build_with_capacity(rects, DEFAULT_LEAF_CAPACITY)
    }

    pub fn build_with_capacity(rects: &[Rect], leaf_capacity: usize) -> Self {
        let leaf_capacity = leaf_capacity.max(1);
        let mut entries: Vec<(Rect, usize)> =
            rects.iter().enumerate().map(|(i, r)| (*r, i)).collect();
        let root = build_node(&mut entries, leaf_capacity);
        Self {
            root,
            leaf_capacity,
            len: rects.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns every ordinal position whose bounding rectangle intersects
    /// `window`, in a deterministic order (ascending ordinal).
    pub fn query(&self, window: Rect) -> Vec<usize> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            root.query(window, &mut out);
        }
        out.sort_unstable();
        out
    }
}

/// Sort-tile-recursive style bulk load: repeatedly partitions entries by
/// their centroid's x and y coordinates into slabs of roughly
/// `leaf_capacity` size until each slab fits in a leaf.
fn build_node(entries: &mut [(Rect, usize)], leaf_capacity: usize) -> Option<Node> {
    if entries.is_empty() {
        return None;
    }
    if entries.len() <= leaf_capacity {
        entries.sort_by_key(|(_, ordinal)| *ordinal);
        let rect = union_rect(entries);
        return Some(Node::Leaf {
            rect,
            entries: entries.to_vec(),
        });
    }

    // Sort by centroid x, break into vertical slabs of sqrt(n) groups, then
    // sort each slab by centroid y and recurse. Ties broken by ordinal
    // position for determinism.
    entries.sort_by(|a, b| {
        centroid_x(&a.0)
            .partial_cmp(&centroid_x(&b.0))
            .unwrap()
            .then(a.1.cmp(&b.1))
    });

    let n_leaves = entries.len().div_ceil(leaf_capacity);
    let n_slabs = (n_leaves as f64).sqrt().ceil().max(1.0) as usize;
    let slab_size = entries.len().div_ceil(n_slabs);

    let mut children = Vec::new();
    for slab in entries.chunks_mut(slab_size.max(1)) {
        slab.sort_by(|a, b| {
            centroid_y(&a.0)
                .partial_cmp(&centroid_y(&b.0))
                .unwrap()
                .then(a.1.cmp(&b.1))
        });
        for group in slab.chunks_mut(leaf_capacity) {
            if let Some(node) = build_node(group, leaf_capacity) {
                children.push(node);
            }
        }
    }

    let rect = children
        .iter()
        .map(|c| c.rect())
        .reduce(|a, b| a.union(&b))
        .unwrap();
    Some(Node::Branch { rect, children })
}

fn union_rect(entries: &[(Rect, usize)]) -> Rect {
    entries
        .iter()
        .map(|(r, _)| *r)
        .reduce(|a, b| a.union(&b))
        .unwrap()
}

fn centroid_x(r: &Rect) -> f64 {
    (r.xmin + r.xmax) / 2.0
}

fn centroid_y(r: &Rect) -> f64 {
    (r.ymin + r.ymax) / 2.0
}
