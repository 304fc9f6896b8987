//! UE IPv4 address pool
//!
//! Wraps a [`LazyReusePool`] over the 32-bit address space of an IPv4
//! CIDR. For a /N subnet the allocatable range is `[network+1,
//! broadcast-1]`; /31 and /32 collapse to the single network address.
//! IPv6 pool CIDRs are rejected outright — the allocator frontier is
//! 32-bit and anything else would hand out garbage.

use std::net::Ipv4Addr;

use ipnetwork::{IpNetwork, Ipv4Network};

use crate::error::UserPlaneError;
use crate::pool::LazyReusePool;

/// CIDR-scoped UE IP pool local to one (UPF, DNN).
#[derive(Debug)]
pub struct UeIpPool {
    subnet: Ipv4Network,
    pool: LazyReusePool,
}

impl UeIpPool {
    /// Build a pool from a CIDR string out of the declarative
    /// configuration.
    pub fn new(cidr: &str) -> Result<Self, UserPlaneError> {
        let subnet = match cidr.parse::<IpNetwork>() {
            Ok(IpNetwork::V4(net)) => net,
            Ok(IpNetwork::V6(_)) => {
                return Err(UserPlaneError::ConfigInvalid(format!(
                    "IPv6 UE IP pool is not supported: {cidr}"
                )));
            }
            Err(e) => {
                return Err(UserPlaneError::ConfigInvalid(format!(
                    "invalid UE IP pool CIDR {cidr}: {e}"
                )));
            }
        };

        let (first, last) = addr_range(&subnet);
        let pool = LazyReusePool::new(first, last).map_err(|e| {
            UserPlaneError::ConfigInvalid(format!("invalid UE IP pool CIDR {cidr}: {e}"))
        })?;

        Ok(Self { subnet, pool })
    }

    pub fn subnet(&self) -> Ipv4Network {
        self.subnet
    }

    /// CIDR text form, as it appears in configuration dumps.
    pub fn cidr(&self) -> String {
        self.subnet.to_string()
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.subnet.contains(addr)
    }

    /// True when this pool's range overlaps `other`'s.
    pub fn is_joint(&self, other: &UeIpPool) -> bool {
        self.pool.is_joint(&other.pool)
    }

    /// Allocate the next UE IP address, or `None` when the pool is dry.
    pub fn allocate(&mut self) -> Option<Ipv4Addr> {
        let value = self.pool.allocate()?;
        let addr = Ipv4Addr::from(value);
        log::info!("allocated UE IP address {addr} from {}", self.subnet);
        Some(addr)
    }

    /// Return an address to the pool. Addresses outside the subnet and
    /// double releases are warned about and ignored.
    pub fn release(&mut self, addr: Ipv4Addr) -> bool {
        if !self.contains(addr) {
            log::warn!("UE IP address {addr} is not within pool {}", self.subnet);
            return false;
        }
        if !self.pool.free(u32::from(addr)) {
            log::warn!("failed to release UE IP address {addr}: not in use");
            return false;
        }
        log::debug!("released UE IP address {addr}: {}", self.dump());
        true
    }

    pub fn available(&self) -> u64 {
        self.pool.available()
    }

    /// Free-range diagnostic dump, e.g. `[{10.60.0.1 - 10.60.0.254}]`.
    pub fn dump(&self) -> String {
        let mut out = String::from("[");
        for (i, (a, b)) in self.pool.dump().iter().enumerate() {
            if i > 0 {
                out.push_str("->");
            }
            out.push_str(&format!("{{{} - {}}}", Ipv4Addr::from(*a), Ipv4Addr::from(*b)));
        }
        out.push(']');
        out
    }
}

fn addr_range(subnet: &Ipv4Network) -> (u32, u32) {
    let base = u32::from(subnet.network());
    if subnet.prefix() >= 31 {
        // no room for network/broadcast split, single host
        return (base, base);
    }
    (base + 1, u32::from(subnet.broadcast()) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_24_range() {
        let mut pool = UeIpPool::new("10.60.0.0/24").unwrap();
        assert_eq!(pool.available(), 254);
        assert_eq!(pool.allocate(), Some(Ipv4Addr::new(10, 60, 0, 1)));
        assert_eq!(pool.allocate(), Some(Ipv4Addr::new(10, 60, 0, 2)));
    }

    #[test]
    fn test_slash_30_has_two_hosts() {
        let mut pool = UeIpPool::new("192.168.1.0/30").unwrap();
        assert_eq!(pool.allocate(), Some(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(pool.allocate(), Some(Ipv4Addr::new(192, 168, 1, 2)));
        assert_eq!(pool.allocate(), None);
    }

    #[test]
    fn test_slash_32_single_host() {
        let mut pool = UeIpPool::new("10.0.0.5/32").unwrap();
        assert_eq!(pool.allocate(), Some(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(pool.allocate(), None);
    }

    #[test]
    fn test_lazy_reuse() {
        let mut pool = UeIpPool::new("10.60.0.0/30").unwrap();
        let a1 = pool.allocate().unwrap();
        let _a2 = pool.allocate().unwrap();
        assert!(pool.release(a1));
        assert_eq!(pool.allocate(), Some(a1));
    }

    #[test]
    fn test_release_outside_subnet_is_noop() {
        let mut pool = UeIpPool::new("10.60.0.0/24").unwrap();
        let a = pool.allocate().unwrap();
        assert!(!pool.release(Ipv4Addr::new(192, 0, 2, 1)));
        assert!(!pool.release(Ipv4Addr::new(10, 60, 0, 100)));
        assert!(pool.release(a));
        assert!(!pool.release(a), "double release");
    }

    #[test]
    fn test_joint_pools() {
        let a = UeIpPool::new("10.0.0.0/24").unwrap();
        let b = UeIpPool::new("10.0.0.128/25").unwrap();
        let c = UeIpPool::new("10.0.1.0/24").unwrap();
        assert!(a.is_joint(&b));
        assert!(!a.is_joint(&c));
    }

    #[test]
    fn test_rejects_ipv6_cidr() {
        let err = UeIpPool::new("2001:db8::/64").unwrap_err();
        assert!(err.to_string().contains("IPv6"));
    }

    #[test]
    fn test_rejects_malformed_cidr() {
        assert!(UeIpPool::new("10.60.0.0/33").is_err());
        assert!(UeIpPool::new("not-a-cidr").is_err());
    }

    #[test]
    fn test_dump_format() {
        let mut pool = UeIpPool::new("10.60.0.0/29").unwrap();
        assert_eq!(pool.dump(), "[{10.60.0.1 - 10.60.0.6}]");
        pool.allocate();
        assert_eq!(pool.dump(), "[{10.60.0.2 - 10.60.0.6}]");
    }
}
