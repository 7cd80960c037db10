use crate::cascade::CascadeConfig;
use crate::csi::{default_ranges, SubcarrierRange};
use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

/// Everything the three endpoints must agree on for one key generation
/// session. Embedded verbatim in the rig configuration file.
// Scalar fields stay ahead of the range and cascade tables so the struct
// serializes cleanly to TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionParams {
    /// Most recent frames retained per endpoint.
    pub window: usize,
    /// Number of quantizer anchors (the raw key carries two bits each).
    pub k_main: usize,
    /// Half-width of the quantizer voting window.
    pub m_neighbors: usize,
    /// Duration of each collection phase.
    pub phase_ms: u64,
    /// Settle delay between stages.
    pub settle_ms: u64,
    /// Whether to run the check/go barrier before collection.
    pub sync: bool,
    pub sync_timeout_ms: u64,
    /// How long receivers wait for the sealed probe.
    pub secure_timeout_ms: u64,
    /// Probe plaintext for the round-trip check.
    pub probe_plaintext: String,
    /// Useful subcarrier ranges of the amplitude profile.
    pub valid_ranges: Vec<SubcarrierRange>,
    pub cascade: CascadeConfig,
}

impl Default for SessionParams {
    fn default() -> SessionParams {
        SessionParams {
            window: 200,
            k_main: 16,
            m_neighbors: 2,
            phase_ms: 12_000,
            settle_ms: 500,
            sync: true,
            sync_timeout_ms: 10_000,
            secure_timeout_ms: 5_000,
            probe_plaintext: "Launch Codes: 999-000-XYZ".to_string(),
            valid_ranges: default_ranges(),
            cascade: CascadeConfig::default(),
        }
    }
}

impl SessionParams {
    #[inline]
    pub fn phase(&self) -> Duration {
        Duration::from_millis(self.phase_ms)
    }

    #[inline]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    #[inline]
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    #[inline]
    pub fn secure_timeout(&self) -> Duration {
        Duration::from_millis(self.secure_timeout_ms)
    }
}
