//! Barrier, snapped barrier, and barrier-join types

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierKind {
    Dam,
    Waterfall,
    SmallBarrier,
}

/// Point feature to be placed onto the flowline graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barrier {
    pub barrier_id: u32,
    pub geometry: Point,
    pub kind: BarrierKind,
}

/// A barrier after snapping: carries the flowline it was attached to and
/// the snap diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnappedBarrier {
    pub barrier_id: u32,
    pub kind: BarrierKind,
    /// Snapped location, lying exactly on `line_id`'s geometry.
    pub geometry: Point,
    pub snap_dist: f64,
    pub nearby: u32,
    pub line_id: u32,
    pub nhdplus_id: u64,
    pub is_endpoint: bool,
}

/// For a barrier placed on the graph, the pair of `lineID`s immediately
/// upstream and downstream of it after cutting. Sentinel `0` is allowed on
/// either side when the barrier sits at a network extremity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierJoin {
    pub barrier_id: u32,
    pub upstream_id: u32,
    pub downstream_id: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BarrierTable {
    rows: Vec<Barrier>,
}

impl BarrierTable {
    pub fn new(rows: Vec<Barrier>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Barrier] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Filters to barriers of the enabled kinds; waterfalls are always
    /// enabled regardless of what the caller passes.
    pub fn filter_enabled(
        &self,
        enabled: &std::collections::HashSet<BarrierKind>,
    ) -> Vec<Barrier> {
        self.rows
            .iter()
            .filter(|b| b.kind == BarrierKind::Waterfall || enabled.contains(&b.kind))
            .cloned()
            .collect()
    }
}
