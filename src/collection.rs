//! Sorted network collections and containment lookup.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use crate::compare::{compare, layout_order};
use crate::error::{fatal, Error, IntegrityError, Result};
use crate::{Address, Family, Registry, Value};

#[derive(Clone)]
struct Entry {
    value: Value,
    address: Arc<Address>,
}

/// Immutable, sorted sequence of networks.
///
/// Members are ordered IPv4 first, then IPv6, so that a candidate address can
/// be located by binary search with [`compare`](crate::compare::compare).
/// Overlapping and duplicate networks are kept as given, but the search is
/// only exact when members are disjoint: with nested or overlapping members
/// [`contains`](Self::contains) can miss a match. Use
/// [`has_overlaps`](Self::has_overlaps) to check.
///
/// Cloning is cheap and shares the members.
///
/// # Examples
/// ```
/// use netmatch::{Address, NetworkCollection, Registry};
///
/// let registry = Registry::new();
/// let nets = NetworkCollection::build(&registry, ["10.0.0.0/8", "2001:db8::/32"]).unwrap();
///
/// assert!(nets.contains(&Address::parse("10.1.2.3").unwrap()));
/// assert!(nets.contains(&Address::parse("2001:db8::1").unwrap()));
/// assert!(!nets.contains(&Address::parse("11.0.0.0").unwrap()));
/// ```
#[derive(Clone)]
pub struct NetworkCollection {
    entries: Arc<[Entry]>,
}

impl NetworkCollection {
    /// Parse every item and sort the result.
    ///
    /// Fails on the first item that does not parse, identifying it by index.
    pub fn build<I, S>(registry: &Registry, items: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            let value = Value::from_text(registry, item.as_ref());
            let address = value.address().map_err(|e| Error::Element {
                index,
                source: Box::new(e),
            })?;
            entries.push(Entry { value, address });
        }
        Ok(Self::from_entries(entries))
    }

    /// Parse whitespace-separated list text.
    pub(crate) fn parse_list(registry: &Registry, text: &str) -> Result<Self> {
        Self::build(registry, text.split_whitespace())
    }

    /// One-element collection holding a duplicate of `value`.
    pub(crate) fn promote(value: &Value) -> Self {
        let value = value.duplicate();
        // The duplicate carries the cached address, so this does not parse
        let address = value
            .address()
            .unwrap_or_else(|_| fatal(IntegrityError::Unparsable(value.text().to_string())));
        Self::from_entries(vec![Entry { value, address }])
    }

    fn from_entries(mut entries: Vec<Entry>) -> Self {
        entries.sort_by(|a, b| layout_order(&a.address, &b.address));
        log::debug!("built network collection with {} entries", entries.len());
        Self {
            entries: entries.into(),
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection has no members.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Members in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Address> + '_ {
        self.entries.iter().map(|entry| &*entry.address)
    }

    /// Member values in sorted order.
    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.entries.iter().map(|entry| &entry.value)
    }

    /// The only member of a one-element collection.
    pub(crate) fn single(&self) -> Option<Arc<Address>> {
        match &*self.entries {
            [only] => Some(only.address.clone()),
            _ => None,
        }
    }

    /// Whether a member network contains `candidate`, found by binary search.
    ///
    /// Exact when the members are disjoint. When one member is nested in or
    /// overlaps another, the search can take the wrong half and return
    /// `false` for a contained address.
    pub fn contains(&self, candidate: &Address) -> bool {
        self.entries
            .binary_search_by(|entry| compare(candidate, &entry.address).reverse())
            .is_ok()
    }

    /// Whether any two members share an address.
    ///
    /// CIDR blocks are either nested or disjoint, so after ordering the
    /// ranges by start only neighbours need checking.
    pub fn has_overlaps(&self) -> bool {
        let mut spans: Vec<(Family, u128, u128)> = self.iter().map(span).collect();
        spans.sort_unstable();
        spans
            .windows(2)
            .any(|pair| pair[0].0 == pair[1].0 && pair[1].1 <= pair[0].2)
    }

    /// Space-separated member texts.
    pub(crate) fn render(&self) -> String {
        self.entries
            .iter()
            .map(|entry| entry.value.text())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for NetworkCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| entry.address.canonical()))
            .finish()
    }
}

/// First and last address covered by `address`, as integers.
fn span(address: &Address) -> (Family, u128, u128) {
    let raw = match address.ip() {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    };
    let host_bits = u32::from(address.family().bits() - address.prefix_len());
    let host = u128::MAX.checked_shr(128 - host_bits).unwrap_or(0);
    let first = raw & !host;
    (address.family(), first, first | host)
}

/// Keys of the groups whose collection contains `candidate`, in input order.
///
/// Each group is searched with [`NetworkCollection::contains`], so a group
/// with nested or overlapping members can be missed.
pub fn lookup_groups<'a, K, I>(groups: I, candidate: &Address) -> Vec<K>
where
    I: IntoIterator<Item = (K, &'a NetworkCollection)>,
{
    groups
        .into_iter()
        .filter(|(_, networks)| networks.contains(candidate))
        .map(|(key, _)| key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn texts(networks: &NetworkCollection) -> Vec<String> {
        networks.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_build_sorts_by_family_then_address() {
        let registry = Registry::new();
        let networks = NetworkCollection::build(
            &registry,
            ["2001:db8::/32", "192.168.0.0/16", "fe80::/10", "10.0.0.0/8", "::1"],
        )
        .unwrap();
        assert_eq!(
            texts(&networks),
            vec!["10.0.0.0/8", "192.168.0.0/16", "fe80::/10", "2001:db8::/32", "::1"]
        );
    }

    #[test]
    fn test_build_reports_failing_element() {
        let registry = Registry::new();
        let err = NetworkCollection::build(&registry, ["10.0.0.0/8", "bogus", "10.0.0.0/33"])
            .unwrap_err();
        match err {
            Error::Element { index, source } => {
                assert_eq!(index, 1);
                assert!(matches!(*source, Error::Parse { ref input, .. } if input == "bogus"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // Members parsed before the failure were released again
        assert!(registry.is_empty());
    }

    #[test]
    fn test_contains_ipv4() {
        let registry = Registry::new();
        let networks = NetworkCollection::build(
            &registry,
            ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "203.0.113.7"],
        )
        .unwrap();
        assert!(networks.contains(&addr("10.1.2.3")));
        assert!(networks.contains(&addr("172.31.0.1")));
        assert!(networks.contains(&addr("192.168.255.255")));
        assert!(networks.contains(&addr("203.0.113.7")));
        assert!(!networks.contains(&addr("11.0.0.0")));
        assert!(!networks.contains(&addr("172.32.0.0")));
        assert!(!networks.contains(&addr("203.0.113.8")));
        assert!(!networks.contains(&addr("::ffff:0a00:1/64")));
    }

    #[test]
    fn test_contains_ipv6() {
        let registry = Registry::new();
        let networks = NetworkCollection::build(
            &registry,
            ["2001:db8::/33", "fc00::/7", "fe80::/10", "::1"],
        )
        .unwrap();
        assert!(networks.contains(&addr("2001:db8:0:1::1")));
        assert!(!networks.contains(&addr("2001:db8:8000::1")));
        assert!(networks.contains(&addr("fd12:3456::1")));
        assert!(networks.contains(&addr("fe80::abcd")));
        assert!(networks.contains(&addr("::1")));
        assert!(!networks.contains(&addr("::2")));
        assert!(!networks.contains(&addr("10.0.0.1")));
    }

    #[test]
    fn test_contains_mixed_families() {
        let registry = Registry::new();
        let networks =
            NetworkCollection::build(&registry, ["::/0", "0.0.0.0/1"]).unwrap();
        assert!(networks.contains(&addr("127.0.0.1")));
        assert!(!networks.contains(&addr("128.0.0.1")));
        assert!(networks.contains(&addr("2001:db8::1")));
    }

    #[test]
    fn test_empty_collection() {
        let registry = Registry::new();
        let networks = NetworkCollection::parse_list(&registry, "").unwrap();
        assert!(networks.is_empty());
        assert!(!networks.contains(&addr("10.0.0.1")));
        assert_eq!(networks.render(), "");
    }

    #[test]
    fn test_render_uses_member_text() {
        let registry = Registry::new();
        let networks =
            NetworkCollection::parse_list(&registry, "  192.168.0.0/16\t10.0.0.0/8 ").unwrap();
        assert_eq!(networks.render(), "10.0.0.0/8 192.168.0.0/16");
    }

    #[test]
    fn test_has_overlaps() {
        let registry = Registry::new();
        let build = |items: &[&str]| NetworkCollection::build(&registry, items).unwrap();

        assert!(!build(&[]).has_overlaps());
        assert!(!build(&["10.0.0.0/8", "11.0.0.0/8", "::/1", "8000::/1"]).has_overlaps());
        assert!(!build(&["0.0.0.0/0", "::/0"]).has_overlaps());
        assert!(build(&["0.0.0.0/0", "10.0.0.0/8"]).has_overlaps());
        assert!(build(&["10.0.0.0/8", "10.5.0.0/16", "10.9.0.0/16"]).has_overlaps());
        assert!(build(&["10.0.0.1", "10.0.0.1"]).has_overlaps());
        assert!(build(&["2001:db8::/32", "fe80::/10", "2001:db8:ff::1"]).has_overlaps());
        // Host bits below the prefix do not move the range
        assert!(build(&["10.1.2.3/8", "10.200.0.0/16"]).has_overlaps());
    }

    #[test]
    fn test_nested_members_can_hide_a_match() {
        let registry = Registry::new();
        let networks = NetworkCollection::build(&registry, ["0.0.0.0/0", "10.0.0.0/8"]).unwrap();
        let candidate = addr("200.0.0.1");

        assert!(networks.iter().any(|net| net.contains(&candidate)));
        // The search lands on 10.0.0.0/8 and moves away from 0.0.0.0/0
        assert!(!networks.contains(&candidate));
        assert!(networks.contains(&addr("10.1.1.1")));
        assert!(networks.has_overlaps());
    }

    #[test]
    fn test_lookup_groups_in_input_order() {
        let registry = Registry::new();
        let private = NetworkCollection::build(&registry, ["10.0.0.0/8", "192.168.0.0/16"]).unwrap();
        let corp = NetworkCollection::build(&registry, ["10.20.0.0/16"]).unwrap();
        let v6 = NetworkCollection::build(&registry, ["2001:db8::/32"]).unwrap();
        let groups = [("private", &private), ("corp", &corp), ("v6", &v6)];

        assert_eq!(lookup_groups(groups, &addr("10.20.1.1")), vec!["private", "corp"]);
        assert_eq!(lookup_groups(groups, &addr("192.168.1.1")), vec!["private"]);
        assert_eq!(lookup_groups(groups, &addr("2001:db8::5")), vec!["v6"]);
        assert!(lookup_groups(groups, &addr("8.8.8.8")).is_empty());
    }
}
