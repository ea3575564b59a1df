use meshcall_core::IceServerConfig;
use meshcall_core::utils::{DEFAULT_RELAY_PORT, DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use std::net::{Ipv4Addr, SocketAddr};

/// Relay settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    /// Advertised to every client right after it connects.
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_RELAY_PORT)),
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_owned(), DEFAULT_STUN_ADDR_2.to_owned()],
                username: None,
                credential: None,
            }],
        }
    }
}
