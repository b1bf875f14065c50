//! [`OriginGuard`] – network-origin allow-list.
//!
//! Every external "request next state" call must pass
//! [`OriginGuard::check`] before it reaches the state machine.  The guard
//! holds a list of CIDR blocks; an address outside all of them is rejected
//! with [`GateArmError::OriginRejected`] and logged as a security event.

use std::net::IpAddr;
use std::str::FromStr;

use iris_types::GateArmError;
use tracing::warn;

/// One CIDR network block, e.g. `10.1.0.0/16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrBlock {
    network: IpAddr,
    prefix: u8,
}

impl CidrBlock {
    /// Test whether `addr` lies inside this block.  IPv4-mapped IPv6
    /// addresses are matched against IPv4 blocks.
    pub fn contains(&self, addr: IpAddr) -> bool {
        let addr = match addr {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(addr),
            v4 => v4,
        };
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(a)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(a) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(a)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(a) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for CidrBlock {
    type Err = GateArmError;

    /// Parse `addr/prefix`; a bare address is a single-host block.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || GateArmError::Veto(format!("invalid CIDR block: {s}"));
        let (addr, prefix) = match s.trim().split_once('/') {
            Some((a, p)) => (a, Some(p)),
            None => (s.trim(), None),
        };
        let network: IpAddr = addr.parse().map_err(|_| bad())?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            Some(p) => p.parse::<u8>().map_err(|_| bad())?,
            None => max,
        };
        if prefix > max {
            return Err(bad());
        }
        Ok(Self { network, prefix })
    }
}

/// Allow-list of network blocks permitted to request gate arm state changes.
///
/// # Example
///
/// ```
/// use iris_kernel::OriginGuard;
///
/// let guard = OriginGuard::from_blocks(["10.1.0.0/16"]).unwrap();
/// assert!(guard.check("10.1.2.3".parse().unwrap()).is_ok());
/// assert!(guard.check("192.168.0.1".parse().unwrap()).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct OriginGuard {
    blocks: Vec<CidrBlock>,
}

impl OriginGuard {
    /// Create an empty guard.  An empty guard rejects every origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a guard from CIDR strings.
    ///
    /// # Errors
    ///
    /// Returns [`GateArmError::Veto`] for the first unparsable block.
    pub fn from_blocks<I, S>(blocks: I) -> Result<Self, GateArmError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut guard = Self::new();
        for b in blocks {
            guard.allow(b.as_ref())?;
        }
        Ok(guard)
    }

    /// Add a CIDR block to the allow-list.
    pub fn allow(&mut self, cidr: &str) -> Result<(), GateArmError> {
        let block = cidr.parse()?;
        if !self.blocks.contains(&block) {
            self.blocks.push(block);
        }
        Ok(())
    }

    pub fn is_allowed_origin(&self, addr: IpAddr) -> bool {
        self.blocks.iter().any(|b| b.contains(addr))
    }

    /// Return `Ok(())` when `addr` is inside an allowed block, or
    /// [`GateArmError::OriginRejected`] otherwise.
    pub fn check(&self, addr: IpAddr) -> Result<(), GateArmError> {
        if self.is_allowed_origin(addr) {
            Ok(())
        } else {
            warn!(target: "security", origin = %addr, "gate arm request from disallowed origin");
            Err(GateArmError::OriginRejected(addr.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn empty_guard_rejects_everything() {
        let guard = OriginGuard::new();
        assert!(matches!(
            guard.check(ip("127.0.0.1")),
            Err(GateArmError::OriginRejected(_))
        ));
    }

    #[test]
    fn ipv4_prefix_match() {
        let guard = OriginGuard::from_blocks(["10.1.0.0/16"]).unwrap();
        assert!(guard.is_allowed_origin(ip("10.1.255.7")));
        assert!(!guard.is_allowed_origin(ip("10.2.0.1")));
    }

    #[test]
    fn bare_address_is_single_host() {
        let guard = OriginGuard::from_blocks(["192.168.5.9"]).unwrap();
        assert!(guard.is_allowed_origin(ip("192.168.5.9")));
        assert!(!guard.is_allowed_origin(ip("192.168.5.10")));
    }

    #[test]
    fn zero_prefix_allows_all_of_family() {
        let guard = OriginGuard::from_blocks(["0.0.0.0/0"]).unwrap();
        assert!(guard.is_allowed_origin(ip("8.8.8.8")));
        assert!(!guard.is_allowed_origin(ip("2001:db8::1")));
    }

    #[test]
    fn ipv6_prefix_match() {
        let guard = OriginGuard::from_blocks(["2001:db8::/32", "::1/128"]).unwrap();
        assert!(guard.is_allowed_origin(ip("2001:db8:1::5")));
        assert!(guard.is_allowed_origin(ip("::1")));
        assert!(!guard.is_allowed_origin(ip("2001:db9::1")));
    }

    #[test]
    fn ipv4_mapped_address_matches_ipv4_block() {
        let guard = OriginGuard::from_blocks(["10.0.0.0/8"]).unwrap();
        assert!(guard.is_allowed_origin(ip("::ffff:10.9.8.7")));
    }

    #[test]
    fn invalid_blocks_are_rejected() {
        assert!(OriginGuard::from_blocks(["10.0.0.0/33"]).is_err());
        assert!(OriginGuard::from_blocks(["not-an-ip/8"]).is_err());
        assert!(OriginGuard::from_blocks(["10.0.0.0/x"]).is_err());
    }

    #[test]
    fn duplicate_blocks_are_idempotent() {
        let mut guard = OriginGuard::new();
        guard.allow("10.0.0.0/8").unwrap();
        guard.allow("10.0.0.0/8").unwrap();
        assert_eq!(guard.blocks.len(), 1);
    }
}
