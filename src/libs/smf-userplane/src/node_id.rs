//! PFCP node identity
//!
//! A UPF is addressed by exactly one of an IPv4 address, an IPv6 address
//! or an FQDN. Only the IP shapes have a canonical textual IP used as a
//! secondary index key; FQDN nodes are keyed by their configured name
//! alone, so several FQDN UPFs can never collide on an empty resolved
//! string.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Tagged node identity of a user plane function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeId {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Fqdn(String),
}

impl NodeId {
    /// Classify a configured `nodeID` string. IPv4 wins over IPv6;
    /// anything that parses as neither is treated as an FQDN.
    pub fn parse(host: &str) -> Self {
        if let Ok(v4) = host.parse::<Ipv4Addr>() {
            return NodeId::Ipv4(v4);
        }
        if let Ok(v6) = host.parse::<Ipv6Addr>() {
            return NodeId::Ipv6(v6);
        }
        NodeId::Fqdn(host.to_string())
    }

    /// Canonical textual IP for index keys. FQDN nodes resolve through an
    /// external collaborator, never inside the core, so they carry no IP
    /// key at all.
    pub fn resolved_ip(&self) -> Option<String> {
        match self {
            NodeId::Ipv4(addr) => Some(addr.to_string()),
            NodeId::Ipv6(addr) => Some(addr.to_string()),
            NodeId::Fqdn(_) => None,
        }
    }

    pub fn is_fqdn(&self) -> bool {
        matches!(self, NodeId::Fqdn(_))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Ipv4(addr) => write!(f, "{addr}"),
            NodeId::Ipv6(addr) => write!(f, "{addr}"),
            NodeId::Fqdn(fqdn) => write!(f, "{fqdn}"),
        }
    }
}
