//! Lifecycle registry for parsed representations.
//!
//! Every [`Value`](crate::Value) that holds a parsed form is enrolled here
//! under its identity. The ledger keeps insertion order so that
//! [`Registry::release_all`] can tear everything down deterministically.
//!
//! Misuse (registering a present identity, deregistering an absent one) is an
//! integrity violation and panics.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::{fatal, IntegrityError};

/// Identity of a registered value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(u64);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Release hook invoked during teardown.
///
/// Implementations must deregister themselves before returning.
pub trait Release: Send + Sync {
    /// Drop the parsed representation.
    fn release(&self);
}

struct Node {
    prev: Option<ValueId>,
    next: Option<ValueId>,
    owner: Weak<dyn Release>,
}

/// Insertion-ordered list threaded through an identity index.
#[derive(Default)]
struct Ledger {
    next_id: u64,
    head: Option<ValueId>,
    tail: Option<ValueId>,
    nodes: AHashMap<ValueId, Node>,
}

impl Ledger {
    fn insert(&mut self, id: ValueId, owner: Weak<dyn Release>) -> Result<(), IntegrityError> {
        if self.nodes.contains_key(&id) {
            return Err(IntegrityError::AlreadyRegistered(id.0));
        }

        let node = Node {
            prev: self.tail,
            next: None,
            owner,
        };
        match self.tail.and_then(|tail| self.nodes.get_mut(&tail)) {
            Some(last) => last.next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.nodes.insert(id, node);
        Ok(())
    }

    fn remove(&mut self, id: ValueId) -> Result<(), IntegrityError> {
        let node = self
            .nodes
            .remove(&id)
            .ok_or(IntegrityError::NotRegistered(id.0))?;

        match node.prev.and_then(|prev| self.nodes.get_mut(&prev)) {
            Some(prev) => prev.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|next| self.nodes.get_mut(&next)) {
            Some(next) => next.prev = node.prev,
            None => self.tail = node.prev,
        }
        Ok(())
    }

    fn head(&self) -> Option<(ValueId, Weak<dyn Release>)> {
        let id = self.head?;
        self.nodes.get(&id).map(|node| (id, node.owner.clone()))
    }

    fn ids(&self) -> Vec<ValueId> {
        let mut ids = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.head;
        while let Some(id) = cursor {
            ids.push(id);
            cursor = self.nodes.get(&id).and_then(|node| node.next);
        }
        ids
    }
}

/// Shared handle to a lifecycle ledger.
///
/// Cloning the handle shares the ledger. Values keep a handle to the
/// registry they were created with.
///
/// # Examples
/// ```
/// use netmatch::{Registry, Value};
///
/// let registry = Registry::new();
/// let value = Value::from_text(&registry, "10.0.0.0/8");
/// assert!(registry.is_empty());
///
/// value.address().unwrap();
/// assert_eq!(registry.len(), 1);
///
/// registry.release_all();
/// assert!(registry.is_empty());
/// assert_eq!(&*value.text(), "10.0.0.0/8");
/// ```
#[derive(Clone, Default)]
pub struct Registry {
    ledger: Arc<Mutex<Ledger>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a fresh identity.
    pub fn allocate_id(&self) -> ValueId {
        let mut ledger = self.ledger.lock();
        ledger.next_id += 1;
        ValueId(ledger.next_id)
    }

    /// Append `id` to the ledger.
    ///
    /// # Panics
    /// If `id` is already registered.
    pub fn register(&self, id: ValueId, owner: Weak<dyn Release>) {
        let result = self.ledger.lock().insert(id, owner);
        match result {
            Ok(()) => log::trace!("registered value {}", id),
            Err(e) => fatal(e),
        }
    }

    /// Remove `id` from the ledger.
    ///
    /// # Panics
    /// If `id` is not registered.
    pub fn deregister(&self, id: ValueId) {
        let result = self.ledger.lock().remove(id);
        match result {
            Ok(()) => log::trace!("deregistered value {}", id),
            Err(e) => fatal(e),
        }
    }

    /// Register `id` and return a guard that deregisters it on drop.
    pub(crate) fn enroll(&self, id: ValueId, owner: Weak<dyn Release>) -> Registration {
        self.register(id, owner);
        Registration {
            registry: self.clone(),
            id,
        }
    }

    /// Whether `id` is currently registered.
    pub fn is_registered(&self, id: ValueId) -> bool {
        self.ledger.lock().nodes.contains_key(&id)
    }

    /// Number of registered values.
    pub fn len(&self) -> usize {
        self.ledger.lock().nodes.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered identities, oldest first.
    pub fn ids(&self) -> Vec<ValueId> {
        self.ledger.lock().ids()
    }

    /// Release every registered value, oldest first.
    ///
    /// The head is re-read after every release, so values registered by a
    /// release hook are released before this returns. Returns the number of
    /// releases performed.
    ///
    /// # Panics
    /// If a hook fails to deregister its value, or a registered value has
    /// already been dropped.
    pub fn release_all(&self) -> usize {
        let mut released = 0;

        loop {
            let head = self.ledger.lock().head();
            let Some((id, owner)) = head else { break };
            log::trace!("releasing value {}", id);

            match owner.upgrade() {
                Some(owner) => owner.release(),
                None => fatal(IntegrityError::Orphaned(id.0)),
            }
            if self.is_registered(id) {
                fatal(IntegrityError::HookDidNotDeregister(id.0));
            }
            released += 1;
        }

        let left = self.len();
        if left != 0 {
            fatal(IntegrityError::NotDrained(left));
        }

        log::debug!("released {} registered values", released);
        released
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("len", &self.len()).finish()
    }
}

/// Registration guard owned by a parsed representation.
pub(crate) struct Registration {
    registry: Registry,
    id: ValueId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}
