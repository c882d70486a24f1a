//! Runtime settings and server address parsing

use crate::error::AddressError;
use shared::{DEFAULT_PORT, TICK_INTERVAL_MS};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Echo every packet to stderr
    pub dump_packets: bool,
    /// Give up if the server has not acknowledged the join in time
    pub join_timeout: Option<Duration>,
    pub tick_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dump_packets: false,
            join_timeout: None,
            tick_interval: Duration::from_millis(TICK_INTERVAL_MS),
        }
    }
}

/// `host`, `host:port`, `[ipv6]` or `[ipv6]:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl FromStr for ServerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressError::Invalid(s.to_string());

        let (host, rest) = if let Some(bracketed) = s.strip_prefix('[') {
            let end = bracketed.find(']').ok_or_else(invalid)?;
            (&bracketed[..end], &bracketed[end + 1..])
        } else {
            match s.find(':') {
                Some(colon) => (&s[..colon], &s[colon..]),
                None => (s, ""),
            }
        };

        if host.is_empty() || host.contains(['[', ']']) {
            return Err(invalid());
        }

        let port = if rest.is_empty() {
            DEFAULT_PORT
        } else {
            let digits = rest.strip_prefix(':').ok_or_else(invalid)?;
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            digits.parse().map_err(|_| invalid())?
        };

        Ok(ServerAddress {
            host: host.to_string(),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<ServerAddress, AddressError> {
        s.parse()
    }

    #[test]
    fn test_host_only_uses_default_port() {
        let address = parse("play.example.net").unwrap();
        assert_eq!(address.host, "play.example.net");
        assert_eq!(address.port, 25565);
    }

    #[test]
    fn test_host_and_port() {
        let address = parse("127.0.0.1:25570").unwrap();
        assert_eq!(address.host, "127.0.0.1");
        assert_eq!(address.port, 25570);
    }

    #[test]
    fn test_bracketed_ipv6() {
        assert_eq!(
            parse("[::1]").unwrap(),
            ServerAddress {
                host: "::1".to_string(),
                port: 25565
            }
        );
        assert_eq!(
            parse("[fe80::1]:1234").unwrap(),
            ServerAddress {
                host: "fe80::1".to_string(),
                port: 1234
            }
        );
    }

    #[test]
    fn test_invalid_addresses() {
        let invalid = [
            "", "::1", "host:", "host:abc", "host:1:2", "[::1", "[]:80", "[::1]x", "host:99999",
        ];
        for bad in invalid {
            assert_eq!(parse(bad), Err(AddressError::Invalid(bad.to_string())), "{}", bad);
        }
    }

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert!(!config.dump_packets);
        assert!(config.join_timeout.is_none());
        assert_eq!(config.tick_interval, Duration::from_millis(50));
    }
}
