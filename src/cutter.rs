//! Cutter (Component C)
//!
//! Splits flowlines at interior barrier positions, allocates new segment
//! IDs, rewires the join graph, and produces a barrier-to-(upstream,
//! downstream) join table. A pure transformation: never mutates its
//! inputs, and raises a validation/consistency error before any output is
//! produced rather than partially applying a cut.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info_span};

use crate::barrier::{BarrierJoin, SnappedBarrier};
use crate::error::CutError;
use crate::flowline::{Flowline, FlowlineTable, SENTINEL};
use crate::join::{Join, JoinTable, JoinType};

/// Where a barrier falls on the flowline it snapped to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    UpstreamEndpoint,
    DownstreamEndpoint,
    Interior(f64),
}

/// Classifies a barrier's position on `line` using the endpoint-vs-split
/// rule: within `eps` metres of an end counts as that endpoint, otherwise
/// it is an interior split.
pub fn classify(
    barrier: &SnappedBarrier,
    line: &Flowline,
    eps: f64,
) -> Result<Placement, CutError> {
    let s = line.geometry.project(&barrier.geometry);
    if s < -1e-6 {
        return Err(CutError::NegativeProjection {
            barrier_id: barrier.barrier_id,
            line_id: line.line_id,
        });
    }
    let s = s.max(0.0);
    if s <= eps {
        Ok(Placement::UpstreamEndpoint)
    } else if s >= line.length - eps {
        Ok(Placement::DownstreamEndpoint)
    } else {
        Ok(Placement::Interior(s))
    }
}

pub struct CutResult {
    pub flowlines: FlowlineTable,
    pub joins: JoinTable,
    pub barrier_joins: Vec<BarrierJoin>,
}

/// Splits `flowlines` at interior barrier positions and rewires `joins`,
/// per the endpoint-vs-split classification and rewiring rules.
pub fn cut_flowlines(
    flowlines: &FlowlineTable,
    joins: &JoinTable,
    barriers: &[SnappedBarrier],
    next_segment_id: Option<u32>,
    eps: f64,
) -> Result<CutResult, CutError> {
    let _span = info_span!("cut_flowlines", flowlines = flowlines.len(), barriers = barriers.len()).entered();

    let by_line = flowlines.index_by_line_id();
    for b in barriers {
        if !by_line.contains_key(&b.line_id) {
            return Err(CutError::UnknownLine {
                barrier_id: b.barrier_id,
                line_id: b.line_id,
            });
        }
    }

    let mut next_id = next_segment_id.unwrap_or_else(|| flowlines.max_line_id() + 1);

    let mut barrier_joins: Vec<BarrierJoin> = Vec::new();
    let mut new_downstream_of: HashMap<u32, u32> = HashMap::new(); // origLineID -> id of its new first sub-segment
    let mut new_upstream_of: HashMap<u32, u32> = HashMap::new(); // origLineID -> id of its new last sub-segment
    let mut replaced_lines: HashMap<u32, Vec<Flowline>> = HashMap::new();
    let mut new_internal_joins: Vec<Join> = Vec::new();

    // Group barriers by the line they snapped to, in a `BTreeMap` so
    // iteration (and therefore new-segment-ID allocation order, below) is
    // ascending by `line_id` and reproducible run to run. A `HashMap` here
    // would let the randomized default hasher decide which affected line
    // claims the lower block of new IDs, breaking spec.md §5's determinism
    // requirement whenever two or more lines have interior splits.
    let mut by_line_barriers: BTreeMap<u32, Vec<&SnappedBarrier>> = BTreeMap::new();
    for b in barriers {
        by_line_barriers.entry(b.line_id).or_default().push(b);
    }

    for (&line_id, group) in by_line_barriers.iter() {
        let line = by_line[&line_id];

        let mut upstream_endpoint_barriers = Vec::new();
        let mut downstream_endpoint_barriers = Vec::new();
        let mut interior: Vec<(&SnappedBarrier, f64)> = Vec::new();

        for &b in group {
            match classify(b, line, eps)? {
                Placement::UpstreamEndpoint => upstream_endpoint_barriers.push(b),
                Placement::DownstreamEndpoint => downstream_endpoint_barriers.push(b),
                Placement::Interior(s) => interior.push((b, s)),
            }
        }

        // Upstream-endpoint barriers: downstream is `line` itself; upstream
        // is every row with downstream_id == line (possibly several at a
        // confluence), or sentinel 0 if none.
        for b in &upstream_endpoint_barriers {
            let upstreams: Vec<u32> = joins.upstream_of(line_id).map(|j| j.upstream_id).collect();
            if upstreams.is_empty() {
                barrier_joins.push(BarrierJoin {
                    barrier_id: b.barrier_id,
                    upstream_id: SENTINEL,
                    downstream_id: line_id,
                });
            } else {
                for up in upstreams {
                    barrier_joins.push(BarrierJoin {
                        barrier_id: b.barrier_id,
                        upstream_id: up,
                        downstream_id: line_id,
                    });
                }
            }
        }

        // Downstream-endpoint barriers: upstream is `line`; downstream is
        // every row with upstream_id == line, or sentinel 0 if none.
        for b in &downstream_endpoint_barriers {
            let downstreams: Vec<u32> =
                joins.downstream_of(line_id).map(|j| j.downstream_id).collect();
            if downstreams.is_empty() {
                barrier_joins.push(BarrierJoin {
                    barrier_id: b.barrier_id,
                    upstream_id: line_id,
                    downstream_id: SENTINEL,
                });
            } else {
                for down in downstreams {
                    barrier_joins.push(BarrierJoin {
                        barrier_id: b.barrier_id,
                        upstream_id: line_id,
                        downstream_id: down,
                    });
                }
            }
        }

        if interior.is_empty() {
            continue;
        }

        // Sort ascending by position, tie-break by barrier_id ascending.
        interior.sort_by(|(a, sa), (b, sb)| {
            sa.partial_cmp(sb)
                .unwrap()
                .then(a.barrier_id.cmp(&b.barrier_id))
        });

        let positions: Vec<f64> = interior.iter().map(|(_, s)| *s).collect();
        if positions.windows(2).any(|w| w[0] > w[1]) {
            return Err(CutError::NonMonotonicSplits { line_id });
        }

        let sub_geoms = line.geometry.cut_at(&positions);
        debug!(line_id, splits = interior.len(), sub_segments = sub_geoms.len(), "splitting flowline");

        let mut sub_ids = Vec::with_capacity(sub_geoms.len());
        let mut sub_flowlines = Vec::with_capacity(sub_geoms.len());
        for geom in sub_geoms {
            let id = next_id;
            next_id += 1;
            sub_ids.push(id);
            sub_flowlines.push(Flowline::derive_from_geometry(
                id,
                line.nhdplus_id,
                geom,
                line.size_class,
                line.stream_order,
                line.is_loop,
            ));
        }

        new_downstream_of.insert(line_id, sub_ids[0]);
        new_upstream_of.insert(line_id, *sub_ids.last().unwrap());

        for w in sub_ids.windows(2) {
            new_internal_joins.push(Join {
                upstream_id: w[0],
                downstream_id: w[1],
                upstream: Some(line.nhdplus_id),
                downstream: Some(line.nhdplus_id),
                join_type: JoinType::Internal,
            });
        }

        for (i, (b, _)) in interior.iter().enumerate() {
            barrier_joins.push(BarrierJoin {
                barrier_id: b.barrier_id,
                upstream_id: sub_ids[i],
                downstream_id: sub_ids[i + 1],
            });
        }

        replaced_lines.insert(line_id, sub_flowlines);
    }

    // Build the new flowline table: lines with no barriers pass through
    // unchanged; lines with interior splits are replaced by their
    // sub-segments; lines that only had endpoint barriers are unchanged.
    let mut new_rows: Vec<Flowline> = Vec::with_capacity(flowlines.len());
    for f in flowlines.rows() {
        if let Some(subs) = replaced_lines.get(&f.line_id) {
            new_rows.extend(subs.iter().cloned());
        } else {
            new_rows.push(f.clone());
        }
    }
    let new_flowlines = FlowlineTable::new(new_rows);

    // Rewire joins: replace `downstream_id == ℓ` with the new first
    // sub-segment, and `upstream_id == ℓ` with the new last sub-segment.
    let mut new_joins: Vec<Join> = Vec::with_capacity(joins.len() + new_internal_joins.len());
    for j in joins.rows() {
        let mut j = j.clone();
        if let Some(&first) = new_downstream_of.get(&j.downstream_id) {
            j.downstream_id = first;
        }
        if let Some(&last) = new_upstream_of.get(&j.upstream_id) {
            j.upstream_id = last;
        }
        new_joins.push(j);
    }
    new_joins.extend(new_internal_joins);

    Ok(CutResult {
        flowlines: new_flowlines,
        joins: JoinTable::new(new_joins),
        barrier_joins,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::BarrierKind;
    use crate::flowline::SizeClass;
    use crate::geometry::{Point, Polyline};

    fn flowline(id: u32, coords: &[(f64, f64)]) -> Flowline {
        let geometry = Polyline::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect());
        Flowline::derive_from_geometry(id, id as u64, geometry, SizeClass::Two, 1, false)
    }

    fn snapped(barrier_id: u32, line: &Flowline, s: f64) -> SnappedBarrier {
        let geometry = line.geometry.interpolate(s);
        SnappedBarrier {
            barrier_id,
            kind: BarrierKind::Dam,
            geometry,
            snap_dist: 0.0,
            nearby: 1,
            line_id: line.line_id,
            nhdplus_id: line.nhdplus_id,
            is_endpoint: false,
        }
    }

    #[test]
    fn single_interior_barrier_splits_line_in_two() {
        let line = flowline(1, &[(0.0, 0.0), (100.0, 0.0)]);
        let flowlines = FlowlineTable::new(vec![line.clone()]);
        let joins = JoinTable::new(vec![Join {
            upstream_id: 0,
            downstream_id: 1,
            upstream: None,
            downstream: Some(1),
            join_type: JoinType::Origin,
        }]);
        let barriers = vec![snapped(10, &line, 40.0)];

        let result = cut_flowlines(&flowlines, &joins, &barriers, Some(1001), 1.0).unwrap();

        assert_eq!(result.flowlines.len(), 2);
        let ids: Vec<u32> = result.flowlines.rows().iter().map(|f| f.line_id).collect();
        assert_eq!(ids, vec![1001, 1002]);
        assert_eq!(result.joins.rows().len(), 2);
        assert!(result
            .joins
            .rows()
            .iter()
            .any(|j| j.upstream_id == 0 && j.downstream_id == 1001));
        assert!(result
            .joins
            .rows()
            .iter()
            .any(|j| j.upstream_id == 1001 && j.downstream_id == 1002));
        assert_eq!(result.barrier_joins.len(), 1);
        assert_eq!(result.barrier_joins[0].upstream_id, 1001);
        assert_eq!(result.barrier_joins[0].downstream_id, 1002);

        let total: f64 = result.flowlines.rows().iter().map(|f| f.length).sum();
        assert!((total - line.length).abs() < 1e-3);
    }

    #[test]
    fn y_junction_upstream_endpoint_emits_two_barrier_joins() {
        let l1 = flowline(1, &[(0.0, 0.0), (10.0, 0.0)]);
        let _l2 = flowline(2, &[(-10.0, 5.0), (0.0, 0.0)]);
        let _l3 = flowline(3, &[(-10.0, -5.0), (0.0, 0.0)]);
        let flowlines = FlowlineTable::new(vec![l1.clone(), _l2.clone(), _l3.clone()]);
        let joins = JoinTable::new(vec![
            Join {
                upstream_id: 2,
                downstream_id: 1,
                upstream: None,
                downstream: None,
                join_type: JoinType::Internal,
            },
            Join {
                upstream_id: 3,
                downstream_id: 1,
                upstream: None,
                downstream: None,
                join_type: JoinType::Internal,
            },
        ]);
        let barriers = vec![snapped(100, &l1, 0.0)];

        let result = cut_flowlines(&flowlines, &joins, &barriers, Some(1001), 1.0).unwrap();

        assert_eq!(result.flowlines.len(), 3);
        assert_eq!(result.joins.rows().len(), 2);
        assert_eq!(result.barrier_joins.len(), 2);
        assert!(result
            .barrier_joins
            .iter()
            .any(|bj| bj.upstream_id == 2 && bj.downstream_id == 1));
        assert!(result
            .barrier_joins
            .iter()
            .any(|bj| bj.upstream_id == 3 && bj.downstream_id == 1));
    }

    #[test]
    fn two_interior_barriers_produce_three_segments() {
        let line = flowline(1, &[(0.0, 0.0), (300.0, 0.0)]);
        let flowlines = FlowlineTable::new(vec![line.clone()]);
        let joins = JoinTable::new(vec![Join {
            upstream_id: 0,
            downstream_id: 1,
            upstream: None,
            downstream: None,
            join_type: JoinType::Origin,
        }]);
        let barriers = vec![snapped(10, &line, 100.0), snapped(11, &line, 200.0)];

        let result = cut_flowlines(&flowlines, &joins, &barriers, Some(1001), 1.0).unwrap();

        assert_eq!(result.flowlines.len(), 3);
        assert_eq!(result.barrier_joins.len(), 2);
        let internal_joins = result
            .joins
            .rows()
            .iter()
            .filter(|j| j.join_type == JoinType::Internal)
            .count();
        assert_eq!(internal_joins, 2);
    }

    #[test]
    fn line_with_no_barriers_passes_through_unchanged() {
        let line = flowline(1, &[(0.0, 0.0), (100.0, 0.0)]);
        let flowlines = FlowlineTable::new(vec![line.clone()]);
        let joins = JoinTable::new(vec![]);
        let result = cut_flowlines(&flowlines, &joins, &[], None, 1.0).unwrap();
        assert_eq!(result.flowlines.rows(), flowlines.rows());
        assert_eq!(result.barrier_joins.len(), 0);
    }

    #[test]
    fn unknown_line_is_a_fatal_error() {
        let flowlines = FlowlineTable::new(vec![flowline(1, &[(0.0, 0.0), (100.0, 0.0)])]);
        let joins = JoinTable::new(vec![]);
        let barriers = vec![SnappedBarrier {
            barrier_id: 1,
            kind: BarrierKind::Dam,
            geometry: Point::new(0.0, 0.0),
            snap_dist: 0.0,
            nearby: 1,
            line_id: 999,
            nhdplus_id: 1,
            is_endpoint: false,
        }];
        let err = cut_flowlines(&flowlines, &joins, &barriers, None, 1.0).unwrap_err();
        assert_eq!(
            err,
            CutError::UnknownLine {
                barrier_id: 1,
                line_id: 999
            }
        );
    }
}
