//! netmatch - IP address and CIDR network values with sorted containment
//! lookup.
//!
//! This crate parses IPv4 and IPv6 addresses and networks written as `addr`
//! or `addr/prefix`, renders them canonically, and answers "is this address
//! inside any of these networks" with a binary search over a sorted
//! collection.
//!
//! # Features
//!
//! - **Strict parsing**: dotted quads without leading zeros, RFC 3986 IPv6
//!   text with an optional trailing dotted quad, optional `/prefix`
//! - **IPv4-mapped folding**: `::ffff:a.b.c.d/p` with `p >= 96` becomes
//!   IPv4 with prefix `p - 96`
//! - **Canonical text**: rendered once and cached
//! - **Sorted collections**: IPv4 before IPv6, binary-search containment
//! - **Group lookup**: every named collection containing an address, in
//!   input order
//! - **Lifecycle registry**: cached parses are tracked and can be released
//!   in insertion order at shutdown
//!
//! # Quick Start
//!
//! ```
//! use netmatch::{Address, NetworkCollection, Registry};
//!
//! let registry = Registry::new();
//! let nets = NetworkCollection::build(&registry, ["10.0.0.0/8", "2001:db8::/33"]).unwrap();
//!
//! assert!(nets.contains(&"10.1.2.3".parse().unwrap()));
//! assert!(nets.contains(&"2001:db8:0:1::1".parse().unwrap()));
//! assert!(!nets.contains(&"2001:db8:8000::1".parse().unwrap()));
//!
//! let mapped = Address::parse("::ffff:192.0.2.1/96").unwrap();
//! assert_eq!(mapped.to_string(), "192.0.2.1/0");
//! ```
//!
//! # Host values
//!
//! [`Value`] holds text, a cached parse, or both, the way a host language
//! value would. The functions in [`ops`] work on values and mirror the
//! operations a host exposes: `type`, `normalize`, `valid`, `eq`,
//! `contained` and `lookup`.

mod address;
mod collection;
mod error;
mod family;
mod registry;
mod value;

pub mod compare;
pub mod config;
pub mod ops;

// Re-export core types
pub use address::Address;
pub use collection::{lookup_groups, NetworkCollection};
pub use error::{Error, IntegrityError, Result};
pub use family::Family;
pub use registry::{Registry, Release, ValueId};
pub use value::{Repr, Value};

// Re-export configuration
pub use config::NetworkGroups;

/// Whether `text` parses as an address or network.
///
/// # Examples
/// ```
/// assert!(netmatch::is_valid("192.0.2.0/24"));
/// assert!(!netmatch::is_valid("192.0.2.0/33"));
/// ```
pub fn is_valid(text: &str) -> bool {
    Address::parse(text).is_ok()
}
