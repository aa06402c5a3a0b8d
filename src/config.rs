//! Engine configuration
//!
//! Named options with enumerated effects, carried through from the CLI or
//! constructed directly by embedders of this crate.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::barrier::BarrierKind;

/// Endpoint-classification threshold used by the cutter. Fixed at 1 metre;
/// present on `EngineConfig` for testability but not exposed as a CLI flag.
pub const EPSILON_ENDPOINT_M: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum snap distance, in metres.
    pub snap_tolerance_m: f64,
    /// Points within this distance of each other are deduplicated prior to
    /// snapping.
    pub duplicate_tolerance_m: f64,
    /// When true, barriers within tolerance of a flowline endpoint snap to
    /// that endpoint rather than their curvilinear projection.
    pub prefer_endpoint: bool,
    /// Barrier kinds that participate as cutting barriers in this run.
    /// Waterfalls are always included regardless of this set's contents.
    pub barrier_kinds_enabled: HashSet<BarrierKind>,
    /// Endpoint-classification threshold, metres. Not user-overridable via
    /// the CLI; see [`EPSILON_ENDPOINT_M`].
    pub epsilon_endpoint_m: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snap_tolerance_m: 100.0,
            duplicate_tolerance_m: 10.0,
            prefer_endpoint: false,
            barrier_kinds_enabled: HashSet::from([
                BarrierKind::Dam,
                BarrierKind::Waterfall,
                BarrierKind::SmallBarrier,
            ]),
            epsilon_endpoint_m: EPSILON_ENDPOINT_M,
        }
    }
}
