//! Operations on host values.
//!
//! These are the entry points a host integration calls with its own values:
//! `type`, `normalize`, `valid`, `eq`, `contained` and `lookup`.

use crate::error::Result;
use crate::{Family, Value};

/// Family of the address held by `value`.
pub fn family_of(value: &Value) -> Result<Family> {
    Ok(value.address()?.family())
}

/// Value with canonical text. See [`Value::normalize`].
pub fn normalize(value: &Value) -> Result<Value> {
    value.normalize()
}

/// Whether `value` parses as an address. Parse errors are discarded.
pub fn is_valid(value: &Value) -> bool {
    value.address().is_ok()
}

/// Strict equality: same family, prefix length and address bits.
pub fn equal(a: &Value, b: &Value) -> Result<bool> {
    let a = a.address()?;
    let b = b.address()?;
    Ok(*a == *b)
}

/// Whether `ip` lies in any network of `networks`.
///
/// The collection is resolved before the candidate, so errors in the
/// collection are reported first.
pub fn contained(networks: &Value, ip: &Value) -> Result<bool> {
    let networks = networks.networks()?;
    let candidate = ip.address()?;
    Ok(networks.contains(&candidate))
}

/// Keys of the groups whose networks contain `ip`, in input order.
///
/// `ip` is parsed before any group is examined. A group that fails to parse
/// aborts the lookup.
pub fn lookup<'a, K, I>(groups: I, ip: &Value) -> Result<Vec<K>>
where
    I: IntoIterator<Item = (K, &'a Value)>,
{
    let candidate = ip.address()?;

    let mut matched = Vec::new();
    for (key, value) in groups {
        if value.networks()?.contains(&candidate) {
            matched.push(key);
        }
    }
    Ok(matched)
}
