//! Join type and join table
//!
//! A join is a directed edge between two flowlines indicating
//! hydrographic connectivity.

use std::collections::HashSet;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::flowline::{is_sentinel, FlowlineTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Origin,
    Terminal,
    Internal,
    HucIn,
}

/// Directed edge `(upstream_id -> downstream_id)` in the flowline graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub upstream_id: u32,
    pub downstream_id: u32,
    #[serde(default)]
    pub upstream: Option<u64>,
    #[serde(default)]
    pub downstream: Option<u64>,
    #[serde(rename = "type")]
    pub join_type: JoinType,
}

impl Join {
    pub fn is_origin(&self) -> bool {
        is_sentinel(self.upstream_id)
    }

    pub fn is_terminal(&self) -> bool {
        is_sentinel(self.downstream_id)
    }
}

/// Collection of joins. Order is not semantically meaningful; duplicate
/// `(upstream_id, downstream_id)` rows are disallowed by `validate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinTable {
    rows: Vec<Join>,
}

impl JoinTable {
    pub fn new(rows: Vec<Join>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Join] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Join> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, join: Join) {
        self.rows.push(join);
    }

    pub fn extend(&mut self, joins: impl IntoIterator<Item = Join>) {
        self.rows.extend(joins);
    }

    /// All rows whose `downstream_id` equals `line_id` — the upstream
    /// neighbours of `line_id`.
    pub fn upstream_of(&self, line_id: u32) -> impl Iterator<Item = &Join> {
        self.rows.iter().filter(move |j| j.downstream_id == line_id)
    }

    /// All rows whose `upstream_id` equals `line_id` — the downstream
    /// neighbours of `line_id`.
    pub fn downstream_of(&self, line_id: u32) -> impl Iterator<Item = &Join> {
        self.rows.iter().filter(move |j| j.upstream_id == line_id)
    }

    /// Builds a `downstream_id -> [upstream_id]` map over all non-sentinel
    /// rows, with no exclusions. Used by the network builder which applies
    /// its own barrier-segment exclusion on top of this.
    pub fn upstream_adjacency(&self) -> FxHashMap<u32, Vec<u32>> {
        let mut map: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
        for j in &self.rows {
            if !is_sentinel(j.upstream_id) && !is_sentinel(j.downstream_id) {
                map.entry(j.downstream_id).or_default().push(j.upstream_id);
            }
        }
        map
    }

    /// Validates: no `(0, 0)` rows, every non-sentinel endpoint resolves to
    /// a flowline in `flowlines`, and no duplicate `(upstream_id,
    /// downstream_id)` pairs.
    pub fn validate(&self, flowlines: &FlowlineTable) -> Result<(), ValidationError> {
        let known: HashSet<u32> = flowlines.rows().iter().map(|f| f.line_id).collect();
        let mut seen: HashSet<(u32, u32)> = HashSet::with_capacity(self.rows.len());

        for j in &self.rows {
            if is_sentinel(j.upstream_id) && is_sentinel(j.downstream_id) {
                return Err(ValidationError::DoubleSentinelJoin);
            }
            if !is_sentinel(j.upstream_id) && !known.contains(&j.upstream_id) {
                return Err(ValidationError::DanglingJoinReference {
                    line_id: j.upstream_id,
                });
            }
            if !is_sentinel(j.downstream_id) && !known.contains(&j.downstream_id) {
                return Err(ValidationError::DanglingJoinReference {
                    line_id: j.downstream_id,
                });
            }
            if !seen.insert((j.upstream_id, j.downstream_id)) {
                return Err(ValidationError::DuplicateJoinRow {
                    upstream_id: j.upstream_id,
                    downstream_id: j.downstream_id,
                });
            }
        }
        Ok(())
    }
}
