//! Network builder and per-network/per-barrier statistics (Component D)
//!
//! Builds functional networks from the rewired join graph by upstream
//! traversal bounded by barrier segments, then aggregates length,
//! length-weighted sinuosity, size-class diversity, and floodplain
//! naturalness per network, and derives per-barrier gain metrics.

use std::collections::{BTreeSet, HashSet, VecDeque};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::barrier::BarrierJoin;
use crate::error::NetworkError;
use crate::flowline::{is_sentinel, FlowlineTable};
use crate::floodplain::FloodplainStats;
use crate::geometry::Polyline;
use crate::join::JoinTable;

const METERS_PER_MILE: f64 = 1_609.344;
const METERS_TO_MILES: f64 = 1.0 / METERS_PER_MILE; // 0.000621371...

/// The roots a traversal starts from: barrier segments (immediately
/// upstream of a barrier) and origin roots (headwater-like segments not
/// already a barrier segment). Stored as `BTreeSet`s, not `HashSet`s, so
/// that `all()`'s iteration order — which drives `build_networks`'s
/// member-insertion order and therefore `network_stats`'/`barrier_metrics`'
/// output row order — is ascending by `lineID` and reproducible run to run,
/// rather than depending on `HashSet`'s randomized per-process hasher.
#[derive(Debug, Clone, Default)]
pub struct RootSet {
    pub barrier_segments: BTreeSet<u32>,
    pub origin_roots: BTreeSet<u32>,
}

impl RootSet {
    pub fn all(&self) -> impl Iterator<Item = u32> + '_ {
        self.barrier_segments.iter().chain(self.origin_roots.iter()).copied()
    }
}

/// Computes `S` (barrier segments) and origin roots per the root-selection
/// rule: origin roots are segments that appear as `upstream_id` in `joins`
/// but whose `downstream_id` is either sentinel or never itself an
/// `upstream_id`, and that are not already barrier segments.
pub fn select_roots(joins: &JoinTable, barrier_joins: &[BarrierJoin]) -> RootSet {
    let barrier_segments: BTreeSet<u32> = barrier_joins
        .iter()
        .filter(|bj| !is_sentinel(bj.upstream_id))
        .map(|bj| bj.upstream_id)
        .collect();

    let all_upstreams: HashSet<u32> =
        joins.rows().iter().map(|j| j.upstream_id).collect();

    let mut origin_roots = BTreeSet::new();
    for j in joins.rows() {
        let up = j.upstream_id;
        if is_sentinel(up) || barrier_segments.contains(&up) {
            continue;
        }
        let has_downstream_neighbour = !is_sentinel(j.downstream_id)
            && all_upstreams.contains(&j.downstream_id);
        if !has_downstream_neighbour {
            origin_roots.insert(up);
        }
    }

    RootSet {
        barrier_segments,
        origin_roots,
    }
}

/// `down -> [ups]` over rows with both endpoints nonzero whose upstream is
/// not a barrier segment; excluding barrier segments from the adjacency is
/// how a barrier stops upstream traversal from crossing it.
pub fn build_upstream_adjacency(
    joins: &JoinTable,
    barrier_segments: &BTreeSet<u32>,
) -> FxHashMap<u32, Vec<u32>> {
    let mut map: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
    for j in joins.rows() {
        if is_sentinel(j.upstream_id) || is_sentinel(j.downstream_id) {
            continue;
        }
        if barrier_segments.contains(&j.upstream_id) {
            continue;
        }
        map.entry(j.downstream_id).or_default().push(j.upstream_id);
    }
    map
}

#[derive(Debug, Clone, Default)]
pub struct NetworkAssignment {
    pub network_of: FxHashMap<u32, u32>,
    pub members: FxHashMap<u32, Vec<u32>>,
}

/// Builds functional networks by breadth-first upstream traversal from each
/// root. The same `lineID` is never assigned to two networks; this is
/// checked with a `debug_assert!` that is not compiled out of test builds.
pub fn build_networks(
    flowlines: &FlowlineTable,
    joins: &JoinTable,
    barrier_joins: &[BarrierJoin],
) -> NetworkAssignment {
    let _span = info_span!("build_networks", flowlines = flowlines.len()).entered();

    let roots = select_roots(joins, barrier_joins);
    let adjacency = build_upstream_adjacency(joins, &roots.barrier_segments);

    let mut assignment = NetworkAssignment::default();
    for root in roots.all() {
        if assignment.network_of.contains_key(&root) {
            continue;
        }
        let mut members = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(line_id) = queue.pop_front() {
            if assignment.network_of.contains_key(&line_id) {
                continue;
            }
            debug_assert!(
                !assignment.network_of.contains_key(&line_id),
                "lineID {line_id} assigned to two networks"
            );
            assignment.network_of.insert(line_id, root);
            members.push(line_id);
            if let Some(ups) = adjacency.get(&line_id) {
                for &up in ups {
                    if !assignment.network_of.contains_key(&up) {
                        queue.push_back(up);
                    }
                }
            }
        }
        debug!(network_id = root, members = members.len(), "built network");
        assignment.members.insert(root, members);
    }

    assignment
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub network_id: u32,
    pub total_length_m: f64,
    pub miles: f64,
    #[serde(rename = "NetworkSinuosity")]
    pub network_sinuosity: f64,
    #[serde(rename = "NumSizeClassGained")]
    pub num_size_classes_gained: i64,
    #[serde(rename = "PctNatFloodplain")]
    pub pct_nat_floodplain: f64,
    pub segment_count: u32,
}

/// Computes per-network aggregate statistics. Floodplain rows missing for a
/// member's `NHDPlusID` contribute 0 to both the floodplain and
/// natural-floodplain sums rather than failing the run.
pub fn network_stats(
    assignment: &NetworkAssignment,
    flowlines: &FlowlineTable,
    floodplain: &[FloodplainStats],
) -> Vec<NetworkStats> {
    let by_line = flowlines.index_by_line_id();
    let floodplain_by_id: FxHashMap<u64, &FloodplainStats> =
        floodplain.iter().map(|fp| (fp.nhdplus_id, fp)).collect();

    let mut out = Vec::with_capacity(assignment.members.len());
    for (&network_id, members) in &assignment.members {
        let mut total_length_m = 0.0;
        let mut sinuosity_weighted = 0.0;
        let mut size_classes = HashSet::new();
        let mut floodplain_km2 = 0.0;
        let mut nat_floodplain_km2 = 0.0;

        for &line_id in members {
            let Some(f) = by_line.get(&line_id) else {
                continue;
            };
            total_length_m += f.length;
            size_classes.insert(f.size_class);
            if let Some(fp) = floodplain_by_id.get(&f.nhdplus_id) {
                floodplain_km2 += fp.floodplain_km2;
                nat_floodplain_km2 += fp.nat_floodplain_km2;
            }
        }

        for &line_id in members {
            if let Some(f) = by_line.get(&line_id) {
                if total_length_m > 0.0 {
                    sinuosity_weighted += (f.length / total_length_m) * f.sinuosity;
                }
            }
        }

        let pct_nat_floodplain = if floodplain_km2 > 0.0 {
            100.0 * nat_floodplain_km2 / floodplain_km2
        } else {
            0.0
        };

        out.push(NetworkStats {
            network_id,
            total_length_m,
            miles: total_length_m * METERS_TO_MILES,
            network_sinuosity: sinuosity_weighted,
            num_size_classes_gained: size_classes.len() as i64 - 1,
            pct_nat_floodplain,
            segment_count: members.len() as u32,
        });
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarrierNetworkMetrics {
    pub barrier_id: u32,
    #[serde(rename = "upNetID")]
    pub up_net_id: u32,
    #[serde(rename = "UpstreamMiles")]
    pub upstream_miles: f64,
    #[serde(rename = "downNetID")]
    pub down_net_id: u32,
    #[serde(rename = "DownstreamMiles")]
    pub downstream_miles: f64,
    #[serde(rename = "AbsoluteGainMi")]
    pub absolute_gain_mi: f64,
    #[serde(rename = "NetworkSinuosity")]
    pub network_sinuosity: f64,
    #[serde(rename = "NumSizeClassGained")]
    pub num_size_classes_gained: i64,
    #[serde(rename = "PctNatFloodplain")]
    pub pct_nat_floodplain: f64,
}

/// Derives per-barrier upstream/downstream gain metrics from the barrier
/// join table and per-network statistics. When the downstream segment is
/// off-region (not assigned to any network), `down_net_id = 0` and
/// `downstream_miles = 0`, per the tolerated downstream-off-region case.
pub fn barrier_metrics(
    barrier_joins: &[BarrierJoin],
    assignment: &NetworkAssignment,
    stats: &[NetworkStats],
) -> Result<Vec<BarrierNetworkMetrics>, NetworkError> {
    let stats_by_id: FxHashMap<u32, &NetworkStats> =
        stats.iter().map(|s| (s.network_id, s)).collect();

    let mut out = Vec::with_capacity(barrier_joins.len());
    for bj in barrier_joins {
        let up_net_id = bj.upstream_id;
        let (upstream_miles, sinuosity, size_classes, pct_nat) = if is_sentinel(up_net_id) {
            (0.0, 0.0, 0, 0.0)
        } else {
            let s = stats_by_id
                .get(&up_net_id)
                .ok_or(NetworkError::DanglingBarrierJoin { line_id: up_net_id })?;
            (
                s.miles,
                s.network_sinuosity,
                s.num_size_classes_gained,
                s.pct_nat_floodplain,
            )
        };

        let (down_net_id, downstream_miles) = if is_sentinel(bj.downstream_id) {
            (0, 0.0)
        } else {
            match assignment.network_of.get(&bj.downstream_id) {
                Some(&net_id) => {
                    let s = stats_by_id
                        .get(&net_id)
                        .ok_or(NetworkError::DanglingBarrierJoin { line_id: net_id })?;
                    (net_id, s.miles)
                }
                None => (0, 0.0),
            }
        };

        let absolute_gain_mi = if is_sentinel(up_net_id) {
            downstream_miles
        } else if down_net_id == 0 {
            upstream_miles
        } else {
            upstream_miles.min(downstream_miles)
        };

        out.push(BarrierNetworkMetrics {
            barrier_id: bj.barrier_id,
            up_net_id,
            upstream_miles,
            down_net_id,
            downstream_miles,
            absolute_gain_mi,
            network_sinuosity: sinuosity,
            num_size_classes_gained: size_classes,
            pct_nat_floodplain: pct_nat,
        });
    }
    Ok(out)
}

/// Groups member flowline geometries by `network_id`. A pure downstream
/// artefact: this crate has no general geometry/GIS stack, so a network's
/// dissolved shape is just its members' geometries grouped together.
pub fn dissolve_networks(
    assignment: &NetworkAssignment,
    flowlines: &FlowlineTable,
) -> Vec<(u32, Vec<Polyline>)> {
    let by_line = flowlines.index_by_line_id();
    let mut out = Vec::with_capacity(assignment.members.len());
    for (&network_id, members) in &assignment.members {
        let geoms = members
            .iter()
            .filter_map(|line_id| by_line.get(line_id).map(|f| f.geometry.clone()))
            .collect();
        out.push((network_id, geoms));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowline::{Flowline, SizeClass};
    use crate::geometry::Point;
    use crate::join::{Join, JoinType};

    fn flowline(id: u32, length: f64) -> Flowline {
        let geometry = Polyline::new(vec![Point::new(0.0, 0.0), Point::new(length, 0.0)]);
        Flowline::derive_from_geometry(id, id as u64, geometry, SizeClass::Two, 1, false)
    }

    #[test]
    fn single_interior_barrier_yields_two_networks() {
        // Scenario 1 from the acceptance scenarios: one barrier splits one
        // origin-rooted line into an origin network and a barrier network.
        let flowlines = FlowlineTable::new(vec![flowline(1001, 40.0), flowline(1002, 60.0)]);
        let joins = JoinTable::new(vec![
            Join {
                upstream_id: 0,
                downstream_id: 1001,
                upstream: None,
                downstream: None,
                join_type: JoinType::Origin,
            },
            Join {
                upstream_id: 1001,
                downstream_id: 1002,
                upstream: None,
                downstream: None,
                join_type: JoinType::Internal,
            },
        ]);
        let barrier_joins = vec![BarrierJoin {
            barrier_id: 10,
            upstream_id: 1001,
            downstream_id: 1002,
        }];

        let assignment = build_networks(&flowlines, &joins, &barrier_joins);
        assert_eq!(assignment.network_of.get(&1001), Some(&1001));
        assert_eq!(assignment.network_of.get(&1002), Some(&1002));
        assert_eq!(assignment.members.len(), 2);

        let stats = network_stats(&assignment, &flowlines, &[]);
        let stats_by_id: FxHashMap<u32, &NetworkStats> =
            stats.iter().map(|s| (s.network_id, s)).collect();
        assert!((stats_by_id[&1001].miles - 40.0 * METERS_TO_MILES).abs() < 1e-9);
        assert!((stats_by_id[&1002].miles - 60.0 * METERS_TO_MILES).abs() < 1e-9);

        let metrics = barrier_metrics(&barrier_joins, &assignment, &stats).unwrap();
        assert_eq!(metrics.len(), 1);
        assert!(
            (metrics[0].absolute_gain_mi - (40.0 * METERS_TO_MILES).min(60.0 * METERS_TO_MILES))
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn barrier_excluded_from_adjacency_stops_traversal() {
        let flowlines = FlowlineTable::new(vec![
            flowline(1, 10.0),
            flowline(2, 10.0),
            flowline(3, 10.0),
        ]);
        // 1 -> 2 -> 3, barrier between 1 and 2: traversal from root 2 must
        // not cross into 1.
        let joins = JoinTable::new(vec![
            Join {
                upstream_id: 1,
                downstream_id: 2,
                upstream: None,
                downstream: None,
                join_type: JoinType::Internal,
            },
            Join {
                upstream_id: 2,
                downstream_id: 3,
                upstream: None,
                downstream: None,
                join_type: JoinType::Internal,
            },
        ]);
        let barrier_joins = vec![BarrierJoin {
            barrier_id: 1,
            upstream_id: 2,
            downstream_id: 3,
        }];

        let assignment = build_networks(&flowlines, &joins, &barrier_joins);
        assert_eq!(assignment.network_of.get(&2), Some(&2));
        assert_eq!(assignment.members.get(&2), Some(&vec![2]));
    }

    #[test]
    fn downstream_off_region_barrier_has_zero_downstream_miles() {
        let flowlines = FlowlineTable::new(vec![flowline(1001, 40.0)]);
        let joins = JoinTable::new(vec![]);
        let barrier_joins = vec![BarrierJoin {
            barrier_id: 10,
            upstream_id: 1001,
            downstream_id: 0,
        }];
        let assignment = build_networks(&flowlines, &joins, &barrier_joins);
        let stats = network_stats(&assignment, &flowlines, &[]);
        let metrics = barrier_metrics(&barrier_joins, &assignment, &stats).unwrap();
        assert_eq!(metrics[0].down_net_id, 0);
        assert_eq!(metrics[0].downstream_miles, 0.0);
        assert!((metrics[0].absolute_gain_mi - metrics[0].upstream_miles).abs() < 1e-9);
    }

    #[test]
    fn dangling_barrier_join_is_a_network_error() {
        let flowlines = FlowlineTable::new(vec![flowline(1, 10.0)]);
        let assignment = build_networks(&flowlines, &JoinTable::new(vec![]), &[]);
        let stats = network_stats(&assignment, &flowlines, &[]);
        let bogus = vec![BarrierJoin {
            barrier_id: 99,
            upstream_id: 12345,
            downstream_id: 0,
        }];
        let err = barrier_metrics(&bogus, &assignment, &stats).unwrap_err();
        assert_eq!(
            err,
            NetworkError::DanglingBarrierJoin { line_id: 12345 }
        );
    }
}
