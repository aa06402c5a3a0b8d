//! Flowline type and flowline table
//!
//! A flowline is a directed polyline segment of a stream. Flowlines and
//! joins are created at ingestion and mutated only by the cutter; every
//! other component treats them as immutable.

use std::collections::HashMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::geometry::Polyline;

/// Reserved `lineID` meaning "no segment". Valid only in join endpoints,
/// never as a flowline's own `lineID`.
pub const SENTINEL: u32 = 0;

pub fn is_sentinel(id: u32) -> bool {
    id == SENTINEL
}

pub fn non_sentinel(id: u32) -> Option<u32> {
    if is_sentinel(id) {
        None
    } else {
        Some(id)
    }
}

/// Size-class bucket derived from upstream drainage area, per NHDPlus
/// convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    #[serde(rename = "a")]
    A,
    #[serde(rename = "1a")]
    OneA,
    #[serde(rename = "1b")]
    OneB,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3a")]
    ThreeA,
    #[serde(rename = "3b")]
    ThreeB,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
}

impl SizeClass {
    /// Derivation from upstream drainage area, following the thresholds
    /// used to bucket NHDPlus catchments by stream size. This is a
    /// supplemental ingestion helper: the core pipeline always takes
    /// `size_class` as given input and never calls this itself.
    pub fn from_drainage_area_sqkm(area_sqkm: f64) -> Self {
        match area_sqkm {
            a if a < 2.59 => SizeClass::A,
            a if a < 10.36 => SizeClass::OneA,
            a if a < 25.9 => SizeClass::OneB,
            a if a < 259.0 => SizeClass::Two,
            a if a < 518.0 => SizeClass::ThreeA,
            a if a < 2590.0 => SizeClass::ThreeB,
            a if a < 5180.0 => SizeClass::Four,
            _ => SizeClass::Five,
        }
    }
}

/// Directed polyline segment of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flowline {
    pub line_id: u32,
    pub nhdplus_id: u64,
    pub geometry: Polyline,
    pub length: f64,
    pub sinuosity: f64,
    pub size_class: SizeClass,
    pub stream_order: u8,
    #[serde(default)]
    pub is_loop: bool,
}

impl Flowline {
    /// Builds a flowline from its geometry, computing `length` and
    /// `sinuosity` rather than taking them as caller-supplied values. Used
    /// by the cutter when producing sub-segments.
    pub fn derive_from_geometry(
        line_id: u32,
        nhdplus_id: u64,
        geometry: Polyline,
        size_class: SizeClass,
        stream_order: u8,
        is_loop: bool,
    ) -> Self {
        let length = geometry.length();
        let sinuosity = geometry.sinuosity();
        Self {
            line_id,
            nhdplus_id,
            geometry,
            length,
            sinuosity,
            size_class,
            stream_order,
            is_loop,
        }
    }
}

/// Indexed collection of flowlines, keyed by `lineID`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowlineTable {
    rows: Vec<Flowline>,
}

impl FlowlineTable {
    pub fn new(rows: Vec<Flowline>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Flowline] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Flowline> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn max_line_id(&self) -> u32 {
        self.rows.iter().map(|f| f.line_id).max().unwrap_or(0)
    }

    /// Builds a `lineID -> &Flowline` lookup. Rebuilt by callers as needed;
    /// not cached on the table since the table is immutable after cutting
    /// and most callers build this once per stage.
    pub fn index_by_line_id(&self) -> FxHashMap<u32, &Flowline> {
        self.rows.iter().map(|f| (f.line_id, f)).collect()
    }

    pub fn by_line_id(&self, line_id: u32) -> Option<&Flowline> {
        self.rows.iter().find(|f| f.line_id == line_id)
    }

    /// Validates every invariant named for flowlines: non-sentinel unique
    /// `lineID`, at least two distinct coordinates, `length > 0`,
    /// `sinuosity >= 1`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen: HashMap<u32, ()> = HashMap::with_capacity(self.rows.len());
        for f in &self.rows {
            if is_sentinel(f.line_id) {
                return Err(ValidationError::ZeroLineId { line_id: f.line_id });
            }
            if seen.insert(f.line_id, ()).is_some() {
                return Err(ValidationError::DuplicateLineId(f.line_id));
            }
            let degenerate =
                f.geometry.coords.len() < 2 || f.geometry.length() == 0.0;
            if degenerate {
                return Err(ValidationError::DegenerateFlowline { line_id: f.line_id });
            }
            if f.length <= 0.0 {
                return Err(ValidationError::NonPositiveLength {
                    line_id: f.line_id,
                    length: f.length,
                });
            }
            if f.sinuosity < 1.0 {
                return Err(ValidationError::SinuosityBelowOne {
                    line_id: f.line_id,
                    sinuosity: f.sinuosity,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn flowline(id: u32, coords: &[(f64, f64)]) -> Flowline {
        let geometry = Polyline::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect());
        Flowline::derive_from_geometry(id, id as u64, geometry, SizeClass::Two, 1, false)
    }

    #[test]
    fn derive_from_geometry_computes_length_and_sinuosity() {
        let f = flowline(1, &[(0.0, 0.0), (100.0, 0.0)]);
        assert_eq!(f.length, 100.0);
        assert_eq!(f.sinuosity, 1.0);
    }

    #[test]
    fn validate_rejects_zero_line_id() {
        let table = FlowlineTable::new(vec![flowline(0, &[(0.0, 0.0), (1.0, 0.0)])]);
        assert_eq!(
            table.validate(),
            Err(ValidationError::ZeroLineId { line_id: 0 })
        );
    }

    #[test]
    fn validate_rejects_duplicate_line_id() {
        let table = FlowlineTable::new(vec![
            flowline(1, &[(0.0, 0.0), (1.0, 0.0)]),
            flowline(1, &[(0.0, 0.0), (2.0, 0.0)]),
        ]);
        assert_eq!(table.validate(), Err(ValidationError::DuplicateLineId(1)));
    }

    #[test]
    fn validate_accepts_well_formed_table() {
        let table = FlowlineTable::new(vec![
            flowline(1, &[(0.0, 0.0), (100.0, 0.0)]),
            flowline(2, &[(100.0, 0.0), (200.0, 50.0)]),
        ]);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn size_class_thresholds() {
        assert_eq!(SizeClass::from_drainage_area_sqkm(1.0), SizeClass::A);
        assert_eq!(SizeClass::from_drainage_area_sqkm(5.0), SizeClass::OneA);
        assert_eq!(SizeClass::from_drainage_area_sqkm(10000.0), SizeClass::Five);
    }
}
