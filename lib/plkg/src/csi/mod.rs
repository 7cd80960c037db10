//! Channel state ingestion: raw radio lines in, per-subcarrier mean
//! amplitude profile out.

use serde_derive::{Deserialize, Serialize};

pub mod aggregator;
pub mod parser;

pub use aggregator::Aggregator;
pub use parser::parse_line;

/// Marker the radio prints on every CSI record.
pub const CSI_MARKER: &str = "CSI_DATA";

/// A half-open subcarrier index range `[start, end)` considered useful.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct SubcarrierRange {
    pub start: usize,
    pub end: usize,
}

impl SubcarrierRange {
    pub fn new(start: usize, end: usize) -> SubcarrierRange {
        SubcarrierRange { start, end }
    }
}

/// The useful subcarriers of an HT40 symbol, nulls and pilots excluded.
pub fn default_ranges() -> Vec<SubcarrierRange> {
    vec![SubcarrierRange::new(10, 60), SubcarrierRange::new(70, 118)]
}
