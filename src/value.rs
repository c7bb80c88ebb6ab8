//! Host values holding text, a parsed form, or both.
//!
//! A [`Value`] starts from either side. Text is parsed on demand and the
//! parse is cached; a parsed value renders its text on demand. At most one
//! parsed form is cached per value, and each cached form is enrolled in the
//! value's [`Registry`] for as long as it lives.

use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::collection::NetworkCollection;
use crate::error::Result;
use crate::registry::{Registration, Registry, Release, ValueId};
use crate::Address;

/// Parsed form cached on a [`Value`].
#[derive(Debug, Clone)]
pub enum Repr {
    /// A single address or network
    Address(Arc<Address>),
    /// A sorted collection of networks
    Networks(NetworkCollection),
}

impl Repr {
    /// Copy for a duplicated value. Addresses are copied, collections share
    /// their members.
    fn duplicate(&self) -> Repr {
        match self {
            Repr::Address(address) => Repr::Address(Arc::new(Address::clone(address))),
            Repr::Networks(networks) => Repr::Networks(networks.clone()),
        }
    }
}

struct Parsed {
    repr: Repr,
    _registration: Registration,
}

#[derive(Default)]
struct State {
    text: Option<Arc<str>>,
    parsed: Option<Parsed>,
}

struct ValueCell {
    id: ValueId,
    registry: Registry,
    me: Weak<ValueCell>,
    state: Mutex<State>,
}

impl ValueCell {
    fn text(&self) -> Arc<str> {
        let mut state = self.state.lock();
        if let Some(text) = &state.text {
            return text.clone();
        }

        let rendered: Arc<str> = match state.parsed.as_ref().map(|p| &p.repr) {
            Some(Repr::Address(address)) => address.canonical().into(),
            Some(Repr::Networks(networks)) => networks.render().into(),
            None => Arc::from(""),
        };
        state.text = Some(rendered.clone());
        rendered
    }

    fn cached(&self) -> Option<Repr> {
        self.state.lock().parsed.as_ref().map(|p| p.repr.clone())
    }

    /// Replace the cached parse. The old one is deregistered first.
    fn store(&self, repr: Repr) {
        let mut state = self.state.lock();
        drop(state.parsed.take());

        let owner: Weak<dyn Release> = self.me.clone();
        let registration = self.registry.enroll(self.id, owner);
        state.parsed = Some(Parsed {
            repr,
            _registration: registration,
        });
    }
}

impl Release for ValueCell {
    fn release(&self) {
        // Keep the text so the value can be parsed again later
        self.text();
        let parsed = self.state.lock().parsed.take();
        drop(parsed);
    }
}

/// Reference-counted handle to a host value.
///
/// Clones share the same value. Use [`Value::duplicate`] for an independent
/// copy.
///
/// # Examples
/// ```
/// use netmatch::{Registry, Value};
///
/// let registry = Registry::new();
/// let nets = Value::list(&registry, ["192.168.0.0/16", "10.0.0.0/8"]);
/// let ip = Value::from_text(&registry, "10.1.2.3");
///
/// assert!(nets.networks().unwrap().contains(&ip.address().unwrap()));
/// ```
#[derive(Clone)]
pub struct Value {
    cell: Arc<ValueCell>,
}

impl Value {
    fn new(registry: &Registry, text: Option<Arc<str>>, repr: Option<Repr>) -> Self {
        let cell = Arc::new_cyclic(|me| ValueCell {
            id: registry.allocate_id(),
            registry: registry.clone(),
            me: me.clone(),
            state: Mutex::new(State { text, parsed: None }),
        });
        if let Some(repr) = repr {
            cell.store(repr);
        }
        Self { cell }
    }

    /// Create a value from text. Nothing is parsed yet.
    pub fn from_text(registry: &Registry, text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self::new(registry, Some(text.into()), None)
    }

    /// Create a value from an address. Text is rendered on demand.
    pub fn from_address(registry: &Registry, address: Address) -> Self {
        Self::new(registry, None, Some(Repr::Address(Arc::new(address))))
    }

    /// Create a list value from items, separated by single spaces.
    pub fn list<I, S>(registry: &Registry, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let text = items
            .into_iter()
            .map(|item| item.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        Self::from_text(registry, text)
    }

    /// Identity of this value in its registry.
    pub fn id(&self) -> ValueId {
        self.cell.id
    }

    /// Registry this value enrolls its parsed forms in.
    pub fn registry(&self) -> &Registry {
        &self.cell.registry
    }

    /// Text of the value, rendered from the parsed form when needed.
    pub fn text(&self) -> Arc<str> {
        self.cell.text()
    }

    /// Whether the value currently holds text.
    pub fn has_text(&self) -> bool {
        self.cell.state.lock().text.is_some()
    }

    /// The cached parsed form, if any.
    pub fn repr(&self) -> Option<Repr> {
        self.cell.cached()
    }

    /// Interpret the value as a single address.
    ///
    /// A collection with exactly one member yields that member without
    /// parsing. Otherwise the text is parsed and the result replaces the
    /// cached form. On error nothing is cached.
    pub fn address(&self) -> Result<Arc<Address>> {
        match self.cell.cached() {
            Some(Repr::Address(address)) => return Ok(address),
            Some(Repr::Networks(networks)) => {
                if let Some(single) = networks.single() {
                    return Ok(single);
                }
            }
            None => {}
        }

        let text = self.text();
        let address = Arc::new(Address::parse(&text)?);
        self.cell.store(Repr::Address(address.clone()));
        Ok(address)
    }

    /// Interpret the value as a network collection.
    ///
    /// An address is promoted to a new one-element collection built from a
    /// duplicate; this value keeps its address. Other values are parsed as a
    /// whitespace-separated list, and the sorted collection is cached.
    pub fn networks(&self) -> Result<NetworkCollection> {
        match self.cell.cached() {
            Some(Repr::Networks(networks)) => return Ok(networks),
            Some(Repr::Address(_)) => return Ok(NetworkCollection::promote(self)),
            None => {}
        }

        let text = self.text();
        let networks = NetworkCollection::parse_list(self.registry(), &text)?;
        self.cell.store(Repr::Networks(networks.clone()));
        Ok(networks)
    }

    /// Independent copy with the same text and a re-registered parsed form.
    pub fn duplicate(&self) -> Value {
        let (text, repr) = {
            let state = self.cell.state.lock();
            (
                state.text.clone(),
                state.parsed.as_ref().map(|p| p.repr.duplicate()),
            )
        };
        Self::new(self.registry(), text, repr)
    }

    /// Value whose text is canonical.
    ///
    /// Returns this value when it has no text yet or its address has already
    /// been rendered. Otherwise returns a fresh value holding a copy of the
    /// address, whose text renders canonically.
    pub fn normalize(&self) -> Result<Value> {
        let address = self.address()?;
        if self.has_text() && !address.is_normalized() {
            return Ok(Value::from_address(self.registry(), Address::clone(&address)));
        }
        Ok(self.clone())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.cell.state.lock();
        f.debug_struct("Value")
            .field("id", &self.cell.id)
            .field("text", &state.text)
            .field("parsed", &state.parsed.as_ref().map(|p| &p.repr))
            .finish()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}
