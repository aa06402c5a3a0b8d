//! # Aquatic Connectivity
//!
//! Computes functional aquatic connectivity for barrier-fragmented stream
//! networks: snapping dams/waterfalls/small barriers onto a flowline
//! network, cutting flowlines at barrier positions, and partitioning the
//! rewired graph into upstream-traversal-bounded functional networks with
//! per-network and per-barrier statistics.
//!
//! ## Overview
//!
//! The library is organized into four pipeline stages plus their shared
//! data model:
//!
//! - [`geometry`] - 2-D polyline primitives (projection, interpolation, cutting)
//! - [`spatial_index`] - bulk-loaded static R-tree over flowline bounding rectangles
//! - [`flowline`], [`join`], [`barrier`], [`floodplain`] - the data model
//! - [`snapper`] - Component B: attaches barrier points to flowlines
//! - [`cutter`] - Component C: splits flowlines at barrier positions and rewires joins
//! - [`network`] - Component D: builds functional networks and their statistics
//! - [`config`] - engine configuration
//! - [`csv`] - CSV input/output for the four input and five output tables
//! - [`error`] - structured error taxonomy
//!
//! A region (one flowline/join/barrier/floodplain tuple) runs through the
//! four stages sequentially; see [`csv`] for the table schemas and the
//! `aquatic-connectivity` binary for the CLI driver.

pub mod barrier;
pub mod config;
pub mod csv;
pub mod cutter;
pub mod error;
pub mod floodplain;
pub mod flowline;
pub mod geometry;
pub mod join;
pub mod network;
pub mod snapper;
pub mod spatial_index;

pub use error::Error;
