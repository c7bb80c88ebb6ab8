//! Network group files.
//!
//! A group file is a YAML mapping from group name to either one network or a
//! list of networks:
//!
//! ```yaml
//! private:
//!   - 10.0.0.0/8
//!   - 172.16.0.0/12
//!   - 192.168.0.0/16
//! loopback: 127.0.0.0/8
//! docs: [192.0.2.0/24, "2001:db8::/32"]
//! ```
//!
//! Groups keep file order, which is the order lookups report matches in.
//!
//! Each group is searched by binary search, which is only exact when the
//! group's networks are disjoint. With nested or overlapping networks in one
//! group (`10.0.0.0/8` next to `10.5.0.0/16`) a lookup can miss that group.
//! Such groups are logged with a warning when they are inserted.

use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::{ops, Registry, Value};

#[derive(Deserialize)]
#[serde(untagged)]
enum GroupSpec {
    One(String),
    Many(Vec<String>),
}

impl GroupSpec {
    fn into_items(self) -> Vec<String> {
        match self {
            GroupSpec::One(item) => vec![item],
            GroupSpec::Many(items) => items,
        }
    }
}

/// Named network groups in file order.
#[derive(Debug, Clone, Default)]
pub struct NetworkGroups {
    groups: Vec<(String, Value)>,
}

impl NetworkGroups {
    /// Create an empty set of groups.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load groups from a YAML file.
    pub fn load(registry: &Registry, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("loading network groups from {}", path.display());
        Self::from_reader(registry, File::open(path)?)
    }

    /// Parse groups from a YAML reader.
    ///
    /// Every group is parsed eagerly so that a bad network is reported at
    /// load time, naming its group.
    pub fn from_reader<R: Read>(registry: &Registry, reader: R) -> Result<Self> {
        let doc: serde_yaml::Mapping = serde_yaml::from_reader(reader)?;

        let mut groups = Self::new();
        for (key, spec) in doc {
            let name = match key {
                serde_yaml::Value::String(name) => name,
                serde_yaml::Value::Number(n) => n.to_string(),
                other => {
                    return Err(Error::Config(format!(
                        "group names must be strings, got {:?}",
                        other
                    )))
                }
            };
            let items = serde_yaml::from_value::<GroupSpec>(spec)
                .map_err(|e| Error::Config(format!("group \"{}\": {}", name, e)))?
                .into_items();
            groups.insert(registry, name, items)?;
        }

        log::debug!("loaded {} network groups", groups.len());
        Ok(groups)
    }

    /// Append a group. Fails if any network does not parse.
    pub fn insert<I, S>(&mut self, registry: &Registry, name: impl Into<String>, items: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        let value = Value::list(registry, items);
        let networks = value
            .networks()
            .map_err(|e| Error::Config(format!("group \"{}\": {}", name, e)))?;
        if networks.has_overlaps() {
            log::warn!(
                "group \"{}\" has overlapping networks, lookups may miss it",
                name
            );
        }
        self.groups.push((name, value));
        Ok(())
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.iter().map(|(name, _)| name.as_str())
    }

    /// Groups in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.groups.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Names of the groups containing `ip`.
    ///
    /// A group whose networks overlap can be missed. See the module docs.
    pub fn lookup(&self, ip: &Value) -> Result<Vec<&str>> {
        ops::lookup(self.iter(), ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPS: &str = r#"
private:
  - 10.0.0.0/8
  - 172.16.0.0/12
  - 192.168.0.0/16
loopback: 127.0.0.0/8
docs: [192.0.2.0/24, "2001:db8::/32"]
10: 10.0.0.0/24
"#;

    #[test]
    fn test_groups_keep_file_order() {
        let registry = Registry::new();
        let groups = NetworkGroups::from_reader(&registry, GROUPS.as_bytes()).unwrap();
        assert_eq!(
            groups.names().collect::<Vec<_>>(),
            vec!["private", "loopback", "docs", "10"]
        );

        let ip = Value::from_text(&registry, "10.0.0.7");
        assert_eq!(groups.lookup(&ip).unwrap(), vec!["private", "10"]);

        let ip = Value::from_text(&registry, "2001:db8::7");
        assert_eq!(groups.lookup(&ip).unwrap(), vec!["docs"]);
    }

    #[test]
    fn test_bad_network_names_group() {
        let registry = Registry::new();
        let err = NetworkGroups::from_reader(&registry, "ok: 10.0.0.0/8\nbad: [1.2.3.4/40]\n".as_bytes())
            .unwrap_err();
        match err {
            Error::Config(msg) => assert!(msg.contains("group \"bad\""), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_non_list_group() {
        let registry = Registry::new();
        let result = NetworkGroups::from_reader(&registry, "bad: {a: b}\n".as_bytes());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_non_mapping_document() {
        let registry = Registry::new();
        let result = NetworkGroups::from_reader(&registry, "- 10.0.0.0/8\n".as_bytes());
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn test_overlapping_group_can_be_missed() {
        let registry = Registry::new();
        let groups = NetworkGroups::from_reader(
            &registry,
            "corp: [10.0.0.0/8, 10.5.0.0/16, 10.9.0.0/16]\n".as_bytes(),
        )
        .unwrap();

        let (_, corp) = groups.iter().next().unwrap();
        assert!(corp.networks().unwrap().has_overlaps());

        let ip = Value::from_text(&registry, "10.200.0.1");
        assert!(groups.lookup(&ip).unwrap().is_empty());
        let ip = Value::from_text(&registry, "10.5.1.1");
        assert_eq!(groups.lookup(&ip).unwrap(), vec!["corp"]);
    }

    #[test]
    fn test_insert() {
        let registry = Registry::new();
        let mut groups = NetworkGroups::new();
        groups.insert(&registry, "a", ["fe80::/10"]).unwrap();
        assert!(groups.insert(&registry, "b", ["fe80::/129"]).is_err());
        assert_eq!(groups.len(), 1);
    }
}
