//! Parsed address and network values.

mod parser;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;

use crate::error::{fatal, IntegrityError, Result};
use crate::Family;

/// An IPv4 or IPv6 address with a prefix length.
///
/// A host address carries the full-width prefix (32 or 128). Host bits below
/// the prefix are kept as written, so `10.1.2.3/8` stays `10.1.2.3/8`.
///
/// IPv4-mapped IPv6 input with a prefix of at least 96 bits is folded to
/// IPv4 at construction: `::ffff:192.0.2.1/96` becomes `192.0.2.1/0`.
///
/// # Examples
/// ```
/// use netmatch::{Address, Family};
///
/// let net: Address = "10.0.0.0/8".parse().unwrap();
/// assert_eq!(net.family(), Family::Ipv4);
/// assert!(net.contains(&"10.1.2.3".parse().unwrap()));
/// assert_eq!(net.to_string(), "10.0.0.0/8");
/// ```
#[derive(Debug, Clone)]
pub struct Address {
    ip: IpAddr,
    prefix_len: u8,
    /// IPv4 address in host byte order, zero for IPv6
    sort_key: u32,
    /// Canonical text, rendered on first use
    canonical: OnceCell<String>,
}

impl Address {
    /// Parse `addr` or `addr/prefix`.
    ///
    /// The whole input must match; surrounding whitespace is rejected.
    pub fn parse(input: &str) -> Result<Self> {
        parser::parse(input)
    }

    /// Build an address from parts, rejecting a prefix wider than the family.
    pub fn new(ip: IpAddr, prefix_len: u8) -> Result<Self> {
        let family = family_of_ip(&ip);
        if prefix_len > family.bits() {
            return Err(crate::Error::parse(
                &format!("{}/{}", ip, prefix_len),
                "prefix length out of range",
            ));
        }
        Ok(Self::from_parts(ip, prefix_len))
    }

    /// Build from a prefix already known to be in range.
    pub(crate) fn from_parts(ip: IpAddr, prefix_len: u8) -> Self {
        let (ip, prefix_len) = fold_mapped(ip, prefix_len);
        let sort_key = match ip {
            IpAddr::V4(v4) => u32::from(v4),
            IpAddr::V6(_) => 0,
        };
        Self {
            ip,
            prefix_len,
            sort_key,
            canonical: OnceCell::new(),
        }
    }

    /// Get the address family.
    pub fn family(&self) -> Family {
        family_of_ip(&self.ip)
    }

    /// Get the address as written, host bits included.
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Get the prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Whether the prefix covers the full address width.
    pub fn is_host(&self) -> bool {
        self.prefix_len == self.family().bits()
    }

    /// IPv4 address as a host-order integer. `None` for IPv6.
    pub fn sort_key(&self) -> Option<u32> {
        match self.ip {
            IpAddr::V4(_) => Some(self.sort_key),
            IpAddr::V6(_) => None,
        }
    }

    pub(crate) fn key(&self) -> u32 {
        self.sort_key
    }

    /// Canonical text: `addr`, or `addr/prefix` when the prefix is shorter
    /// than the address width.
    pub fn canonical(&self) -> &str {
        self.canonical.get_or_init(|| {
            if self.is_host() {
                self.ip.to_string()
            } else {
                format!("{}/{}", self.ip, self.prefix_len)
            }
        })
    }

    /// Whether the canonical text has been rendered.
    pub fn is_normalized(&self) -> bool {
        self.canonical.get().is_some()
    }

    /// Whether `candidate` lies inside this network.
    pub fn contains(&self, candidate: &Address) -> bool {
        crate::compare::contains(self, candidate)
    }

    /// Convert to an [`IpNet`], host bits included.
    pub fn to_ipnet(&self) -> IpNet {
        let net = match self.ip {
            IpAddr::V4(v4) => Ipv4Net::new(v4, self.prefix_len).map(IpNet::V4),
            IpAddr::V6(v6) => Ipv6Net::new(v6, self.prefix_len).map(IpNet::V6),
        };
        net.unwrap_or_else(|_| {
            fatal(IntegrityError::InvalidPrefix {
                family: self.family().as_str(),
                prefix: self.prefix_len,
            })
        })
    }
}

fn family_of_ip(ip: &IpAddr) -> Family {
    match ip {
        IpAddr::V4(_) => Family::Ipv4,
        IpAddr::V6(_) => Family::Ipv6,
    }
}

/// Fold `::ffff:a.b.c.d/p` (p >= 96) to `a.b.c.d/(p - 96)`.
fn fold_mapped(ip: IpAddr, prefix_len: u8) -> (IpAddr, u8) {
    if let IpAddr::V6(v6) = ip {
        if prefix_len >= 96 {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return (IpAddr::V4(v4), prefix_len - 96);
            }
        }
    }
    (ip, prefix_len)
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.prefix_len == other.prefix_len && self.ip == other.ip
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ip.hash(state);
        self.prefix_len.hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

impl std::str::FromStr for Address {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        let bits = family_of_ip(&ip).bits();
        Self::from_parts(ip, bits)
    }
}

impl From<IpNet> for Address {
    fn from(net: IpNet) -> Self {
        Self::from_parts(net.addr(), net.prefix_len())
    }
}

impl From<Ipv4Net> for Address {
    fn from(net: Ipv4Net) -> Self {
        IpNet::V4(net).into()
    }
}

impl From<Ipv6Net> for Address {
    fn from(net: Ipv6Net) -> Self {
        IpNet::V6(net).into()
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.canonical())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Address::parse(&text).map_err(serde::de::Error::custom)
    }
}
