//! Snapper (Component B)
//!
//! Attaches each barrier point to the nearest flowline within tolerance,
//! recording snap distance and carrying the line's identifiers onto the
//! point. Points with no flowline within tolerance are dropped — that is
//! an expected outcome, not an error.

use std::collections::HashMap;

use rustc_hash::FxHashMap;
use tracing::{debug, info_span, warn};

use crate::barrier::{Barrier, SnappedBarrier};
use crate::flowline::FlowlineTable;
use crate::geometry::{Point, Rect};
use crate::spatial_index::FlowlineIndex;

/// Grid-snap deduplication: points within `tolerance` of each other
/// collapse to the first occurrence (by input order) within their grid
/// cell. Spatial de-duplication only — no evaluation of other attributes.
/// Applied by callers before [`snap`]; `snap` itself is pure and never
/// deduplicates its input.
pub fn dedupe_points(points: &[Barrier], tolerance: f64) -> Vec<Barrier> {
    if tolerance <= 0.0 {
        return points.to_vec();
    }
    let mut seen: HashMap<(i64, i64), ()> = HashMap::new();
    let mut out = Vec::with_capacity(points.len());
    for p in points {
        let cell = (
            (p.geometry.x / tolerance).floor() as i64,
            (p.geometry.y / tolerance).floor() as i64,
        );
        if seen.insert(cell, ()).is_none() {
            out.push(p.clone());
        }
    }
    out
}

/// Attaches each point in `points` to the nearest flowline within
/// `tolerance`, using `index` (built over `flowlines.rows()`'s bounding
/// rectangles, in the same order) to limit candidates to a windowed query.
pub fn snap(
    points: &[Barrier],
    flowlines: &FlowlineTable,
    index: &FlowlineIndex,
    tolerance: f64,
    prefer_endpoint: bool,
) -> Vec<SnappedBarrier> {
    let _span = info_span!("snap", points = points.len(), tolerance).entered();
    let rows = flowlines.rows();
    let mut out = Vec::new();

    for p in points {
        let window = Rect::from_point(p.geometry).buffer(tolerance);
        let candidates = index.query(window);

        let mut best: Option<(usize, f64)> = None;
        let mut nearby = 0u32;
        for ord in &candidates {
            let line = &rows[*ord];
            let dist = line.geometry.distance_to_point(&p.geometry);
            if dist <= tolerance {
                nearby += 1;
                if best.map(|(_, d)| dist < d).unwrap_or(true) {
                    best = Some((*ord, dist));
                }
            }
        }

        let Some((ord, snap_dist)) = best else {
            warn!(barrier_id = p.barrier_id, "no flowline within tolerance; dropping");
            continue;
        };

        let line = &rows[ord];
        let s = line.geometry.project(&p.geometry);
        let mut geometry = line.geometry.interpolate(s);
        let mut is_endpoint = false;
        let mut snap_dist = snap_dist;

        if prefer_endpoint {
            let first = line.geometry.first();
            let last = line.geometry.last();
            let d_first = first.distance_to(&p.geometry);
            let d_last = last.distance_to(&p.geometry);
            let endpoint_within_tolerance =
                d_first <= tolerance || d_last <= tolerance;
            if endpoint_within_tolerance {
                if d_first <= d_last {
                    geometry = first;
                    snap_dist = d_first;
                } else {
                    geometry = last;
                    snap_dist = d_last;
                }
                is_endpoint = true;
            }
        }

        debug!(barrier_id = p.barrier_id, line_id = line.line_id, snap_dist, "snapped");

        out.push(SnappedBarrier {
            barrier_id: p.barrier_id,
            kind: p.kind,
            geometry,
            snap_dist,
            nearby,
            line_id: line.line_id,
            nhdplus_id: line.nhdplus_id,
            is_endpoint,
        });
    }

    out
}

/// Groups snapped barriers by the `lineID` they were snapped to.
pub fn group_by_line(barriers: &[SnappedBarrier]) -> FxHashMap<u32, Vec<&SnappedBarrier>> {
    let mut map: FxHashMap<u32, Vec<&SnappedBarrier>> = FxHashMap::default();
    for b in barriers {
        map.entry(b.line_id).or_default().push(b);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::BarrierKind;
    use crate::flowline::{Flowline, SizeClass};
    use crate::geometry::Polyline;

    fn flowline(id: u32, coords: &[(f64, f64)]) -> Flowline {
        let geometry = Polyline::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect());
        Flowline::derive_from_geometry(id, id as u64, geometry, SizeClass::Two, 1, false)
    }

    fn barrier(id: u32, x: f64, y: f64) -> Barrier {
        Barrier {
            barrier_id: id,
            geometry: Point::new(x, y),
            kind: BarrierKind::Dam,
        }
    }

    #[test]
    fn snaps_to_nearest_line_within_tolerance() {
        let flowlines = FlowlineTable::new(vec![flowline(1, &[(0.0, 0.0), (100.0, 0.0)])]);
        let index = FlowlineIndex::build(
            &flowlines
                .rows()
                .iter()
                .map(|f| f.geometry.bounding_rect())
                .collect::<Vec<_>>(),
        );
        let points = vec![barrier(10, 40.0, 5.0)];
        let snapped = snap(&points, &flowlines, &index, 100.0, false);
        assert_eq!(snapped.len(), 1);
        assert_eq!(snapped[0].line_id, 1);
        assert!((snapped[0].snap_dist - 5.0).abs() < 1e-9);
        assert!((snapped[0].geometry.x - 40.0).abs() < 1e-9);
    }

    #[test]
    fn drops_points_beyond_tolerance() {
        let flowlines = FlowlineTable::new(vec![flowline(1, &[(0.0, 0.0), (100.0, 0.0)])]);
        let index = FlowlineIndex::build(
            &flowlines
                .rows()
                .iter()
                .map(|f| f.geometry.bounding_rect())
                .collect::<Vec<_>>(),
        );
        let points = vec![barrier(10, 50.0, 150.0)];
        let snapped = snap(&points, &flowlines, &index, 100.0, false);
        assert!(snapped.is_empty());
    }

    #[test]
    fn tie_break_is_lowest_ordinal() {
        let flowlines = FlowlineTable::new(vec![
            flowline(1, &[(0.0, -5.0), (100.0, -5.0)]),
            flowline(2, &[(0.0, 5.0), (100.0, 5.0)]),
        ]);
        let index = FlowlineIndex::build(
            &flowlines
                .rows()
                .iter()
                .map(|f| f.geometry.bounding_rect())
                .collect::<Vec<_>>(),
        );
        let points = vec![barrier(10, 50.0, 0.0)];
        let snapped = snap(&points, &flowlines, &index, 100.0, false);
        assert_eq!(snapped[0].line_id, 1);
    }

    #[test]
    fn prefer_endpoint_snaps_to_nearer_endpoint() {
        let flowlines = FlowlineTable::new(vec![flowline(1, &[(0.0, 0.0), (100.0, 0.0)])]);
        let index = FlowlineIndex::build(
            &flowlines
                .rows()
                .iter()
                .map(|f| f.geometry.bounding_rect())
                .collect::<Vec<_>>(),
        );
        let points = vec![barrier(10, 2.0, 2.0)];
        let snapped = snap(&points, &flowlines, &index, 100.0, true);
        assert!(snapped[0].is_endpoint);
        assert_eq!(snapped[0].geometry.x, 0.0);
        assert_eq!(snapped[0].geometry.y, 0.0);
    }

    #[test]
    fn snap_result_is_order_independent() {
        let flowlines = FlowlineTable::new(vec![
            flowline(1, &[(0.0, 0.0), (100.0, 0.0)]),
            flowline(2, &[(0.0, 20.0), (100.0, 20.0)]),
            flowline(3, &[(0.0, 40.0), (100.0, 40.0)]),
        ]);
        let index = FlowlineIndex::build(
            &flowlines
                .rows()
                .iter()
                .map(|f| f.geometry.bounding_rect())
                .collect::<Vec<_>>(),
        );
        let points = vec![
            barrier(1, 10.0, 1.0),
            barrier(2, 30.0, 19.0),
            barrier(3, 50.0, 41.0),
            barrier(4, 70.0, 2.0),
            barrier(5, 90.0, 200.0), // beyond tolerance, dropped either way
        ];

        let mut shuffled = points.clone();
        // A fixed, non-trivial permutation rather than input order or its
        // exact reverse, so a bug tied to first/last-element handling would
        // still surface.
        shuffled.swap(0, 3);
        shuffled.swap(1, 4);
        shuffled.reverse();

        let mut forward = snap(&points, &flowlines, &index, 10.0, false);
        let mut out_of_order = snap(&shuffled, &flowlines, &index, 10.0, false);
        forward.sort_by_key(|b| b.barrier_id);
        out_of_order.sort_by_key(|b| b.barrier_id);

        assert_eq!(forward, out_of_order);
    }

    #[test]
    fn dedupe_points_collapses_nearby_points() {
        let points = vec![barrier(1, 0.0, 0.0), barrier(2, 1.0, 1.0), barrier(3, 500.0, 500.0)];
        let deduped = dedupe_points(&points, 10.0);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].barrier_id, 1);
    }
}
