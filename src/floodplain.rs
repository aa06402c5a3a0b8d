//! Per-`NHDPlusID` floodplain statistics, joined into network stats

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloodplainStats {
    pub nhdplus_id: u64,
    pub floodplain_km2: f64,
    pub nat_floodplain_km2: f64,
}
