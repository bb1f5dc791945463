use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed endpoint `{0}`, expected `ip:port`")]
pub struct EndpointError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
/// An `ip:port` pair identifying one plane of a peer.
pub struct PeerEndpoint {
    pub ip: String,
    pub port: u16,
}

impl PeerEndpoint {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }
}

impl fmt::Display for PeerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl FromStr for PeerEndpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip, port) = s.rsplit_once(':').ok_or_else(|| EndpointError(s.to_string()))?;
        if ip.is_empty() {
            return Err(EndpointError(s.to_string()));
        }
        let port = port.parse().map_err(|_| EndpointError(s.to_string()))?;
        Ok(Self {
            ip: ip.to_string(),
            port,
        })
    }
}
