//! Structured error taxonomy for the engine
//!
//! Each stage's failure modes are a closed set of kinds, not ad hoc
//! strings, per the fatal/tolerated split in the error-handling design:
//! input validation and cut/network consistency errors abort the run; snap
//! misses and missing floodplain rows are tolerated and never surface here.

use thiserror::Error;

/// Failures detected while validating a flowline or join table on ingest.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("flowline {line_id} has lineID 0, which is reserved as the sentinel")]
    ZeroLineId { line_id: u32 },

    #[error("duplicate lineID {0} in flowline table")]
    DuplicateLineId(u32),

    #[error("flowline {line_id} has fewer than two distinct coordinates")]
    DegenerateFlowline { line_id: u32 },

    #[error("flowline {line_id} has non-positive length {length}")]
    NonPositiveLength { line_id: u32, length: f64 },

    #[error("flowline {line_id} has sinuosity {sinuosity} < 1")]
    SinuosityBelowOne { line_id: u32, sinuosity: f64 },

    #[error("join references non-sentinel lineID {line_id} not present in flowline table")]
    DanglingJoinReference { line_id: u32 },

    #[error("join row has upstream_id == downstream_id == 0, which is disallowed")]
    DoubleSentinelJoin,

    #[error("duplicate join row (upstream_id={upstream_id}, downstream_id={downstream_id})")]
    DuplicateJoinRow { upstream_id: u32, downstream_id: u32 },
}

/// Failures detected while cutting flowlines at barrier positions. All are
/// fatal: the cutter performs no partial mutation.
#[derive(Debug, Error, PartialEq)]
pub enum CutError {
    #[error("barrier {barrier_id} snapped to lineID {line_id}, which is not in the flowline table")]
    UnknownLine { barrier_id: u32, line_id: u32 },

    #[error("barrier {barrier_id} on lineID {line_id} has negative projected position")]
    NegativeProjection { barrier_id: u32, line_id: u32 },

    #[error("split positions on lineID {line_id} are not monotonic after sorting")]
    NonMonotonicSplits { line_id: u32 },
}

/// Failures detected while building functional networks from rewired
/// flowlines and joins. Fatal: the inputs were supposed to be internally
/// consistent by construction of the cutter.
#[derive(Debug, Error, PartialEq)]
pub enum NetworkError {
    #[error("barrier join references lineID {line_id}, which is not present in the rewired flowline table")]
    DanglingBarrierJoin { line_id: u32 },
}

/// Top-level error type aggregating every stage's fatal error kinds, for
/// callers (the CLI) that want a single `Result` to propagate with `?`.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cut(#[from] CutError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("failed to read {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
