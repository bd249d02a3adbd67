// host.rs - Host component: hostname, IPv4 or IPv6 literal

use crate::UriError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Host portion of a SIP URI. Exactly one representation at a time; the
/// variant is decided at parse time and never re-guessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Host {
    Hostname(String),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
}

impl Host {
    /// Classify a raw host string. IPv4 dotted quads are matched strictly
    /// (each octet 0-255), IPv6 accepts both bracketed and bare literals,
    /// and anything else is kept as an opaque hostname -- SIP hostnames are
    /// not strictly validated.
    pub fn parse(raw: &str) -> Result<Self, UriError> {
        if raw.is_empty() {
            return Err(UriError::EmptyHost);
        }

        if let Ok(addr) = raw.parse::<Ipv4Addr>() {
            return Ok(Host::Ipv4(addr));
        }

        let bare = raw
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(raw);
        if let Ok(addr) = bare.parse::<Ipv6Addr>() {
            return Ok(Host::Ipv6(addr));
        }

        Ok(Host::Hostname(raw.to_string()))
    }

    pub fn hostname(name: &str) -> Self {
        Host::Hostname(name.to_string())
    }

    pub fn as_hostname(&self) -> Option<&str> {
        match self {
            Host::Hostname(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            Host::Ipv4(addr) => Some(*addr),
            _ => None,
        }
    }

    pub fn as_ipv6(&self) -> Option<Ipv6Addr> {
        match self {
            Host::Ipv6(addr) => Some(*addr),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), UriError> {
        match self {
            Host::Hostname(name) if name.is_empty() => Err(UriError::EmptyHost),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Hostname(name) => write!(f, "{}", name),
            Host::Ipv4(addr) => write!(f, "{}", addr),
            // RFC 3261 IPv6reference form
            Host::Ipv6(addr) => write!(f, "[{}]", addr),
        }
    }
}

impl From<Ipv4Addr> for Host {
    fn from(addr: Ipv4Addr) -> Self {
        Host::Ipv4(addr)
    }
}

impl From<Ipv6Addr> for Host {
    fn from(addr: Ipv6Addr) -> Self {
        Host::Ipv6(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_ipv4() {
        let host = Host::parse("192.168.0.26").unwrap();
        assert_eq!(host, Host::Ipv4(Ipv4Addr::new(192, 168, 0, 26)));
        assert_eq!(host.to_string(), "192.168.0.26");
    }

    #[test]
    fn test_out_of_range_octet_is_hostname() {
        let host = Host::parse("300.1.1.1").unwrap();
        assert_eq!(host, Host::Hostname("300.1.1.1".to_string()));
    }

    #[test]
    fn test_classifies_bracketed_ipv6() {
        let host = Host::parse("[fe80::1]").unwrap();
        assert_eq!(host.as_ipv6(), Some("fe80::1".parse().unwrap()));
        assert_eq!(host.to_string(), "[fe80::1]");
    }

    #[test]
    fn test_classifies_bare_ipv6() {
        let host = Host::parse("2001:db8::1").unwrap();
        assert!(host.as_ipv6().is_some());
        assert_eq!(host.to_string(), "[2001:db8::1]");
    }

    #[test]
    fn test_classifies_hostname() {
        let host = Host::parse("www.baidu.com").unwrap();
        assert_eq!(host.as_hostname(), Some("www.baidu.com"));
        assert_eq!(host.to_string(), "www.baidu.com");
    }

    #[test]
    fn test_empty_host_rejected() {
        assert_eq!(Host::parse(""), Err(UriError::EmptyHost));
        assert_eq!(
            Host::Hostname(String::new()).validate(),
            Err(UriError::EmptyHost)
        );
    }
}
