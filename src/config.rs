use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_STATSD_PORT: u16 = 8125;

/// Listen addresses for the standalone server.
///
/// The defaults match what a Datadog client expects out of the box: the Events
/// API on 8080 and DogStatsD on 8125, on all interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub http_port: u16,
    pub statsd_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: DEFAULT_HTTP_PORT,
            statsd_port: DEFAULT_STATSD_PORT,
        }
    }
}

impl ServerConfig {
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.http_port)
    }

    pub fn statsd_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.statsd_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_addresses() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.statsd_addr().to_string(), "0.0.0.0:8125");
    }

    #[test]
    fn test_custom_host() {
        let config = ServerConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            http_port: 18080,
            statsd_port: 18125,
        };
        assert_eq!(config.http_addr().to_string(), "127.0.0.1:18080");
        assert_eq!(config.statsd_addr().to_string(), "127.0.0.1:18125");
    }
}
