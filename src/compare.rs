//! Ordering and containment between addresses and networks.
//!
//! [`compare`] is asymmetric: the first operand is a candidate address and
//! the second a network whose prefix length decides how many bits take part.
//! `Ordering::Equal` means the candidate lies inside the network.

use std::cmp::Ordering;
use std::net::IpAddr;

use crate::error::{fatal, IntegrityError};
use crate::Address;

/// Order `addr` against the network `net`.
///
/// - IPv4 sorts before IPv6.
/// - IPv4: equal when the masked keys match, otherwise by key.
/// - IPv6: bytewise over the prefix, larger network bytes first.
pub fn compare(addr: &Address, net: &Address) -> Ordering {
    match (addr.ip(), net.ip()) {
        (IpAddr::V4(_), IpAddr::V4(_)) => cmp_network4(addr, net),
        (IpAddr::V6(a), IpAddr::V6(n)) => cmp_network6(&a.octets(), &n.octets(), net.prefix_len()),
        (IpAddr::V4(_), IpAddr::V6(_)) => Ordering::Less,
        (IpAddr::V6(_), IpAddr::V4(_)) => Ordering::Greater,
    }
}

/// Whether `candidate` lies inside `net`.
pub fn contains(net: &Address, candidate: &Address) -> bool {
    compare(candidate, net) == Ordering::Equal
}

/// Top `prefix_len` bits set.
pub(crate) fn netmask4(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        1..=32 => u32::MAX << (32 - prefix_len),
        _ => fatal(IntegrityError::InvalidPrefix {
            family: "ipv4",
            prefix: prefix_len,
        }),
    }
}

fn cmp_network4(addr: &Address, net: &Address) -> Ordering {
    let mask = netmask4(net.prefix_len());
    if addr.key() & mask == net.key() & mask {
        return Ordering::Equal;
    }
    addr.key().cmp(&net.key())
}

fn cmp_network6(addr: &[u8; 16], net: &[u8; 16], prefix_len: u8) -> Ordering {
    if prefix_len > 128 {
        fatal(IntegrityError::InvalidPrefix {
            family: "ipv6",
            prefix: prefix_len,
        });
    }

    let whole = usize::from(prefix_len / 8);
    for i in 0..whole {
        match net[i].cmp(&addr[i]) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    let rem = prefix_len % 8;
    if rem != 0 {
        let mask = 0xFFu8 << (8 - rem);
        return (net[whole] & mask).cmp(&(addr[whole] & mask));
    }

    Ordering::Equal
}

/// Strict total order used to lay out a collection.
///
/// It agrees with [`compare`] on every pair `compare` does not report as
/// contained, so binary search with `compare` works on the result. Ties
/// between mutually contained entries fall back to the full address and then
/// the prefix length, which keeps sorting deterministic.
pub(crate) fn layout_order(a: &Address, b: &Address) -> Ordering {
    match (a.ip(), b.ip()) {
        (IpAddr::V4(_), IpAddr::V4(_)) => a.key().cmp(&b.key()),
        (IpAddr::V6(x), IpAddr::V6(y)) => y.octets().cmp(&x.octets()),
        (x, y) => x.is_ipv6().cmp(&y.is_ipv6()),
    }
    .then_with(|| a.prefix_len().cmp(&b.prefix_len()))
}
