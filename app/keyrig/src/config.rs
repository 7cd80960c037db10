use plkg::radio::WifiConfig;
use plkg::session::SessionParams;
use plkg::support::Role;
use serde_derive::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BAUD: u32 = 921_600;

#[derive(Serialize, Deserialize, Clone)]
pub struct Endpoint {
    pub port: String,
    pub baud: u32,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct RigConfig {
    /// Directory for per-endpoint traffic CSVs; unset disables persistence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_dir: Option<String>,
    pub initiator: Endpoint,
    pub responder: Endpoint,
    pub eavesdropper: Endpoint,
    pub wifi: WifiConfig,
    pub session: SessionParams,
}

impl Default for RigConfig {
    fn default() -> RigConfig {
        RigConfig {
            capture_dir: None,
            initiator: Endpoint { port: "/dev/ttyUSB0".to_string(), baud: DEFAULT_BAUD },
            responder: Endpoint { port: "/dev/ttyUSB1".to_string(), baud: DEFAULT_BAUD },
            eavesdropper: Endpoint { port: "/dev/ttyUSB2".to_string(), baud: DEFAULT_BAUD },
            wifi: WifiConfig::default(),
            session: SessionParams::default(),
        }
    }
}

impl RigConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> RigConfig {
        serdeconv::from_toml_file(path).expect("Error loading rig configuration file")
    }

    pub fn to_toml(&self) -> String {
        serdeconv::to_toml_string(self).expect("Error rendering rig configuration")
    }

    pub fn endpoint(&self, role: Role) -> &Endpoint {
        match role {
            Role::Initiator => &self.initiator,
            Role::Responder => &self.responder,
            Role::Eavesdropper => &self.eavesdropper,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roundtrips_through_toml() {
        let config = RigConfig::default();

        let rendered = config.to_toml();
        let parsed: RigConfig = serdeconv::from_toml_str(&rendered).unwrap();

        assert_eq!(parsed.initiator.port, config.initiator.port);
        assert_eq!(parsed.session.k_main, config.session.k_main);
        assert_eq!(parsed.session.cascade.passes, config.session.cascade.passes);
        assert_eq!(parsed.wifi.broadcast_mac, config.wifi.broadcast_mac);
    }
}
