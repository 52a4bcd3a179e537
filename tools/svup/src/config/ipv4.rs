//! IPv4 subnet arithmetic used to check that the networks handed to the Supervisor
//! are consistent with each other.

use std::{fmt, net::Ipv4Addr, str::FromStr};

use serde_with::DeserializeFromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeFromStr)]
pub struct Ipv4Cidr {
    address: Ipv4Addr,
    prefix_length: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, prefix_length: u8) -> Result<Self, String> {
        if prefix_length > 32 {
            return Err(format!("prefix length {prefix_length} is larger than 32"));
        }

        Ok(Self {
            address,
            prefix_length,
        })
    }

    fn mask(&self) -> u32 {
        // Shifting a u32 by 32 overflows
        if self.prefix_length == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix_length)
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) & self.mask())
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) | !self.mask())
    }

    /// Number of addresses in the subnet, including network and broadcast addresses.
    pub fn size(&self) -> u64 {
        1u64 << (32 - self.prefix_length)
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & self.mask() == u32::from(self.network())
    }

    /// True when `ip` is usable by a host, i.e. neither the network nor the broadcast address.
    pub fn contains_host(&self, ip: Ipv4Addr) -> bool {
        self.contains(ip) && ip != self.network() && ip != self.broadcast()
    }

    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.contains(other.network()) || other.contains(self.network())
    }

    /// The CIDR notation of the subnet with the host bits cleared, e.g. `10.0.0.0/24`.
    pub fn to_network_string(&self) -> String {
        format!("{}/{}", self.network(), self.prefix_length)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_length)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((address, prefix_length)) = s.split_once('/') else {
            return Err(format!("'{s}' is not in CIDR notation, expected e.g. 10.0.0.0/24"));
        };

        let address = address
            .parse::<Ipv4Addr>()
            .map_err(|e| format!("invalid address in '{s}': {e}"))?;

        let prefix_length = prefix_length
            .parse::<u8>()
            .map_err(|e| format!("invalid prefix length in '{s}': {e}"))?;

        Ipv4Cidr::new(address, prefix_length)
    }
}

/// Last address of a range of `count` consecutive addresses starting at `start`.
///
/// Returns `None` for empty ranges or ranges running past `255.255.255.255`.
pub fn last_address(start: Ipv4Addr, count: u16) -> Option<Ipv4Addr> {
    let offset = u32::from(count).checked_sub(1)?;
    u32::from(start).checked_add(offset).map(Ipv4Addr::from)
}

/// Whether `ip` lies within the inclusive range `start..=last`.
pub fn range_contains(start: Ipv4Addr, last: Ipv4Addr, ip: Ipv4Addr) -> bool {
    (u32::from(start)..=u32::from(last)).contains(&u32::from(ip))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn parses_and_normalises_cidr() {
        let cidr: Ipv4Cidr = "10.10.20.77/24".parse().unwrap();

        assert_eq!(cidr.network(), Ipv4Addr::new(10, 10, 20, 0));
        assert_eq!(cidr.broadcast(), Ipv4Addr::new(10, 10, 20, 255));
        assert_eq!(cidr.size(), 256);
        assert_eq!(cidr.to_network_string(), "10.10.20.0/24");
        assert_eq!(cidr.to_string(), "10.10.20.77/24");
    }

    #[test]
    fn rejects_malformed_cidr() {
        assert!("10.0.0.0".parse::<Ipv4Cidr>().is_err());
        assert!("10.0.0.0/33".parse::<Ipv4Cidr>().is_err());
        assert!("10.0.0/24".parse::<Ipv4Cidr>().is_err());
        assert!("10.0.0.0/x".parse::<Ipv4Cidr>().is_err());
    }

    #[test]
    fn zero_prefix_contains_everything() {
        let cidr: Ipv4Cidr = "0.0.0.0/0".parse().unwrap();

        assert!(cidr.contains(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(cidr.size(), 1 << 32);
    }

    #[test]
    fn host_addresses_exclude_network_and_broadcast() {
        let cidr: Ipv4Cidr = "192.168.1.0/30".parse().unwrap();

        assert!(!cidr.contains_host(Ipv4Addr::new(192, 168, 1, 0)));
        assert!(cidr.contains_host(Ipv4Addr::new(192, 168, 1, 1)));
        assert!(cidr.contains_host(Ipv4Addr::new(192, 168, 1, 2)));
        assert!(!cidr.contains_host(Ipv4Addr::new(192, 168, 1, 3)));
        assert!(!cidr.contains_host(Ipv4Addr::new(192, 168, 1, 4)));
    }

    #[test]
    fn overlap_is_symmetric() {
        let wide: Ipv4Cidr = "10.96.0.0/12".parse().unwrap();
        let narrow: Ipv4Cidr = "10.100.4.0/24".parse().unwrap();
        let other: Ipv4Cidr = "10.10.10.0/24".parse().unwrap();

        assert!(wide.overlaps(&narrow));
        assert!(narrow.overlaps(&wide));
        assert!(!wide.overlaps(&other));
        assert!(!other.overlaps(&narrow));
    }

    #[test]
    fn address_ranges() {
        let start = Ipv4Addr::new(10, 0, 0, 250);

        assert_eq!(last_address(start, 1), Some(start));
        assert_eq!(last_address(start, 10), Some(Ipv4Addr::new(10, 0, 1, 3)));
        assert_eq!(last_address(start, 0), None);
        assert_eq!(last_address(Ipv4Addr::new(255, 255, 255, 255), 2), None);

        let last = Ipv4Addr::new(10, 0, 1, 3);
        assert!(range_contains(start, last, Ipv4Addr::new(10, 0, 1, 0)));
        assert!(!range_contains(start, last, Ipv4Addr::new(10, 0, 0, 249)));
    }

    #[test]
    fn deserializes_from_json_string() {
        let cidr: Ipv4Cidr = serde_json::from_str("\"10.96.0.0/23\"").unwrap();

        assert_eq!(cidr.to_network_string(), "10.96.0.0/23");
        assert_eq!(cidr.size(), 512);
    }
}
