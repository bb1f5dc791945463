#[derive(Debug, Clone, PartialEq, Eq)]
/// A peer that claims to hold a chunk: control endpoint plus the transfer
/// rate it advertised in its RESPONSE.
pub struct ProviderRecord {
    pub ip: String,
    pub port: u16,
    pub rate: u32,
}

impl ProviderRecord {
    pub fn new(ip: impl Into<String>, port: u16, rate: u32) -> Self {
        Self {
            ip: ip.into(),
            port,
            rate,
        }
    }

    /// Providers are deduplicated by endpoint; the rate is informational.
    pub fn same_endpoint(&self, other: &ProviderRecord) -> bool {
        self.ip == other.ip && self.port == other.port
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}
