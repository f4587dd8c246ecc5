//! IPv4 CIDR parsing and netmask derivation.

use crate::ParseError;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 network in CIDR notation (e.g., 10.0.10.0/24).
///
/// The address is kept exactly as written; host bits are not cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv4Cidr {
    address: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Cidr {
    /// Maximum IPv4 prefix length.
    pub const MAX_PREFIX_LEN: u8 = 32;

    /// Creates a new CIDR.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds 32.
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > Self::MAX_PREFIX_LEN {
            return Err(ParseError::InvalidCidr(format!(
                "{}/{}: prefix length exceeds {}",
                address,
                prefix_len,
                Self::MAX_PREFIX_LEN
            )));
        }

        Ok(Ipv4Cidr {
            address,
            prefix_len,
        })
    }

    /// Returns the network address as written.
    pub const fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns the netmask: the top `prefix_len` bits of a 32-bit value set.
    pub fn netmask(&self) -> Ipv4Addr {
        let bits = u32::MAX
            .checked_shl(u32::from(Self::MAX_PREFIX_LEN - self.prefix_len))
            .unwrap_or(0);
        Ipv4Addr::from(bits)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .split_once('/')
            .ok_or_else(|| ParseError::InvalidCidr(s.to_string()))?;

        let address: Ipv4Addr = addr_str
            .parse()
            .map_err(|_| ParseError::InvalidCidr(s.to_string()))?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidCidr(s.to_string()))?;

        Ipv4Cidr::new(address, prefix_len).map_err(|_| ParseError::InvalidCidr(s.to_string()))
    }
}

/// Splits a CIDR string into its network address and dotted-decimal netmask.
///
/// ```
/// use vlanrecon_types::cidr_to_netmask;
///
/// let (network, mask) = cidr_to_netmask("10.0.0.0/24").unwrap();
/// assert_eq!(network, "10.0.0.0");
/// assert_eq!(mask, "255.255.255.0");
/// ```
pub fn cidr_to_netmask(cidr: &str) -> Result<(String, String), ParseError> {
    let parsed: Ipv4Cidr = cidr.parse()?;
    Ok((parsed.address().to_string(), parsed.netmask().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_netmask_common_prefixes() {
        let cases = [
            ("0.0.0.0/0", "0.0.0.0"),
            ("10.0.0.0/8", "255.0.0.0"),
            ("172.16.0.0/16", "255.255.0.0"),
            ("10.0.0.0/24", "255.255.255.0"),
            ("10.0.0.1/32", "255.255.255.255"),
        ];

        for (cidr, expected) in cases {
            let (_, mask) = cidr_to_netmask(cidr).unwrap();
            assert_eq!(mask, expected, "mask for {}", cidr);
        }
    }

    #[test]
    fn test_netmask_odd_prefixes() {
        let cidr: Ipv4Cidr = "192.168.0.0/20".parse().unwrap();
        assert_eq!(cidr.netmask(), Ipv4Addr::new(255, 255, 240, 0));

        let cidr: Ipv4Cidr = "192.168.0.0/1".parse().unwrap();
        assert_eq!(cidr.netmask(), Ipv4Addr::new(128, 0, 0, 0));
    }

    #[test]
    fn test_network_address_unchanged() {
        let (network, mask) = cidr_to_netmask("10.0.10.1/24").unwrap();
        assert_eq!(network, "10.0.10.1");
        assert_eq!(mask, "255.255.255.0");
    }

    #[test]
    fn test_invalid_prefix() {
        assert!(matches!(
            cidr_to_netmask("10.0.0.0/33"),
            Err(ParseError::InvalidCidr(_))
        ));
        assert!(matches!(
            cidr_to_netmask("10.0.0.0/abc"),
            Err(ParseError::InvalidCidr(_))
        ));
        assert!(matches!(
            cidr_to_netmask("10.0.0.0/-1"),
            Err(ParseError::InvalidCidr(_))
        ));
        assert!(cidr_to_netmask("10.0.0.0/").is_err());
    }

    #[test]
    fn test_invalid_address() {
        assert!(cidr_to_netmask("10.0.0/24").is_err());
        assert!(cidr_to_netmask("10.0.0.256/24").is_err());
        assert!(cidr_to_netmask("vlan/24").is_err());
        assert!(cidr_to_netmask("10.0.0.0").is_err());
    }

    #[test]
    fn test_display() {
        let cidr: Ipv4Cidr = "192.168.0.0/16".parse().unwrap();
        assert_eq!(cidr.to_string(), "192.168.0.0/16");
        assert_eq!(cidr.prefix_len(), 16);
    }
}
