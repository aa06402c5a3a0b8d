//! CSV ingestion and egress for the four input tables and five output
//! tables named in the external-interfaces contract.
//!
//! Geometry is carried in a single `geometry` column as a WKT-like
//! `LINESTRING(x1 y1, x2 y2, ...)` / `POINT(x y)` string — a small closed
//! subset, not a general WKT parser.

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::barrier::{Barrier, BarrierJoin, BarrierKind};
use crate::error::Error;
use crate::flowline::{Flowline, FlowlineTable, SizeClass};
use crate::floodplain::FloodplainStats;
use crate::geometry::{Point, Polyline};
use crate::join::{Join, JoinTable, JoinType};
use crate::network::{BarrierNetworkMetrics, NetworkStats};

fn wrap_csv_err(path: &Path, source: csv::Error) -> Error {
    Error::Csv {
        path: path.display().to_string(),
        source,
    }
}

fn wrap_io_err(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Renders a polyline as `LINESTRING(x1 y1, x2 y2, ...)`.
pub fn encode_linestring(line: &Polyline) -> String {
    let coords: Vec<String> = line
        .coords
        .iter()
        .map(|p| format!("{} {}", p.x, p.y))
        .collect();
    format!("LINESTRING({})", coords.join(", "))
}

/// Renders a point as `POINT(x y)`.
pub fn encode_point(p: &Point) -> String {
    format!("POINT({} {})", p.x, p.y)
}

/// Parses a `LINESTRING(x1 y1, x2 y2, ...)` string into a [`Polyline`].
pub fn parse_linestring(s: &str) -> Result<Polyline, String> {
    let inner = s
        .trim()
        .strip_prefix("LINESTRING(")
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| format!("malformed LINESTRING: {s}"))?;
    let coords = inner
        .split(',')
        .map(parse_xy)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polyline::new(coords))
}

/// Parses a `POINT(x y)` string into a [`Point`].
pub fn parse_point(s: &str) -> Result<Point, String> {
    let inner = s
        .trim()
        .strip_prefix("POINT(")
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| format!("malformed POINT: {s}"))?;
    parse_xy(inner)
}

fn parse_xy(s: &str) -> Result<Point, String> {
    let mut parts = s.trim().split_whitespace();
    let x: f64 = parts
        .next()
        .ok_or_else(|| format!("missing x coordinate in {s:?}"))?
        .parse()
        .map_err(|_| format!("invalid x coordinate in {s:?}"))?;
    let y: f64 = parts
        .next()
        .ok_or_else(|| format!("missing y coordinate in {s:?}"))?
        .parse()
        .map_err(|_| format!("invalid y coordinate in {s:?}"))?;
    Ok(Point::new(x, y))
}

#[derive(Debug, Deserialize)]
struct FlowlineCsvRecord {
    line_id: u32,
    nhdplus_id: u64,
    geometry: String,
    length: f64,
    sinuosity: f64,
    size_class: SizeClass,
    stream_order: u8,
    #[serde(default)]
    is_loop: bool,
}

impl FlowlineCsvRecord {
    fn to_domain(&self, line_no: usize) -> Result<Flowline, String> {
        let geometry = parse_linestring(&self.geometry)
            .map_err(|e| format!("line {line_no}: {e}"))?;
        Ok(Flowline {
            line_id: self.line_id,
            nhdplus_id: self.nhdplus_id,
            geometry,
            length: self.length,
            sinuosity: self.sinuosity,
            size_class: self.size_class,
            stream_order: self.stream_order,
            is_loop: self.is_loop,
        })
    }
}

pub fn read_flowlines_csv(path: impl AsRef<Path>) -> Result<FlowlineTable, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| wrap_io_err(path, e))?;
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<FlowlineCsvRecord>().enumerate() {
        let record = record.map_err(|e| wrap_csv_err(path, e))?;
        let flowline = record
            .to_domain(i + 2)
            .map_err(|e| wrap_csv_err(path, csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e))))?;
        rows.push(flowline);
    }
    Ok(FlowlineTable::new(rows))
}

#[derive(Debug, Serialize)]
struct FlowlineCsvOutRecord {
    line_id: u32,
    nhdplus_id: u64,
    geometry: String,
    length: f64,
    sinuosity: f64,
    size_class: SizeClass,
    stream_order: u8,
    is_loop: bool,
}

pub fn write_flowlines_csv(path: impl AsRef<Path>, table: &FlowlineTable) -> Result<(), Error> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| wrap_io_err(path, e))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    for f in table.rows() {
        writer
            .serialize(FlowlineCsvOutRecord {
                line_id: f.line_id,
                nhdplus_id: f.nhdplus_id,
                geometry: encode_linestring(&f.geometry),
                length: f.length,
                sinuosity: f.sinuosity,
                size_class: f.size_class,
                stream_order: f.stream_order,
                is_loop: f.is_loop,
            })
            .map_err(|e| wrap_csv_err(path, e))?;
    }
    writer.flush().map_err(|e| wrap_io_err(path, e))?;
    Ok(())
}

#[derive(Debug, Deserialize, Serialize)]
struct JoinCsvRecord {
    upstream_id: u32,
    downstream_id: u32,
    #[serde(default)]
    upstream: Option<u64>,
    #[serde(default)]
    downstream: Option<u64>,
    #[serde(rename = "type")]
    join_type: JoinType,
}

pub fn read_joins_csv(path: impl AsRef<Path>) -> Result<JoinTable, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| wrap_io_err(path, e))?;
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);

    let mut rows = Vec::new();
    for record in reader.deserialize::<JoinCsvRecord>() {
        let r = record.map_err(|e| wrap_csv_err(path, e))?;
        rows.push(Join {
            upstream_id: r.upstream_id,
            downstream_id: r.downstream_id,
            upstream: r.upstream,
            downstream: r.downstream,
            join_type: r.join_type,
        });
    }
    Ok(JoinTable::new(rows))
}

pub fn write_joins_csv(path: impl AsRef<Path>, table: &JoinTable) -> Result<(), Error> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| wrap_io_err(path, e))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    for j in table.rows() {
        writer
            .serialize(JoinCsvRecord {
                upstream_id: j.upstream_id,
                downstream_id: j.downstream_id,
                upstream: j.upstream,
                downstream: j.downstream,
                join_type: j.join_type,
            })
            .map_err(|e| wrap_csv_err(path, e))?;
    }
    writer.flush().map_err(|e| wrap_io_err(path, e))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct BarrierCsvRecord {
    barrier_id: u32,
    geometry: String,
    kind: BarrierKind,
}

pub fn read_barriers_csv(path: impl AsRef<Path>) -> Result<Vec<Barrier>, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| wrap_io_err(path, e))?;
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<BarrierCsvRecord>().enumerate() {
        let r = record.map_err(|e| wrap_csv_err(path, e))?;
        let geometry = parse_point(&r.geometry).map_err(|e| {
            wrap_csv_err(
                path,
                csv::Error::from(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("line {}: {e}", i + 2),
                )),
            )
        })?;
        rows.push(Barrier {
            barrier_id: r.barrier_id,
            geometry,
            kind: r.kind,
        });
    }
    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct FloodplainCsvRecord {
    nhdplus_id: u64,
    floodplain_km2: f64,
    nat_floodplain_km2: f64,
}

pub fn read_floodplain_csv(path: impl AsRef<Path>) -> Result<Vec<FloodplainStats>, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| wrap_io_err(path, e))?;
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);

    let mut rows = Vec::new();
    for record in reader.deserialize::<FloodplainCsvRecord>() {
        let r = record.map_err(|e| wrap_csv_err(path, e))?;
        rows.push(FloodplainStats {
            nhdplus_id: r.nhdplus_id,
            floodplain_km2: r.floodplain_km2,
            nat_floodplain_km2: r.nat_floodplain_km2,
        });
    }
    Ok(rows)
}

#[derive(Debug, Serialize)]
struct BarrierJoinCsvRecord {
    barrier_id: u32,
    upstream_id: u32,
    downstream_id: u32,
}

pub fn write_barrier_joins_csv(path: impl AsRef<Path>, rows: &[BarrierJoin]) -> Result<(), Error> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| wrap_io_err(path, e))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    for bj in rows {
        writer
            .serialize(BarrierJoinCsvRecord {
                barrier_id: bj.barrier_id,
                upstream_id: bj.upstream_id,
                downstream_id: bj.downstream_id,
            })
            .map_err(|e| wrap_csv_err(path, e))?;
    }
    writer.flush().map_err(|e| wrap_io_err(path, e))?;
    Ok(())
}

pub fn write_network_stats_csv(path: impl AsRef<Path>, rows: &[NetworkStats]) -> Result<(), Error> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| wrap_io_err(path, e))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    for s in rows {
        writer.serialize(s).map_err(|e| wrap_csv_err(path, e))?;
    }
    writer.flush().map_err(|e| wrap_io_err(path, e))?;
    Ok(())
}

pub fn write_barrier_metrics_csv(
    path: impl AsRef<Path>,
    rows: &[BarrierNetworkMetrics],
) -> Result<(), Error> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| wrap_io_err(path, e))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    for m in rows {
        writer.serialize(m).map_err(|e| wrap_csv_err(path, e))?;
    }
    writer.flush().map_err(|e| wrap_io_err(path, e))?;
    Ok(())
}
