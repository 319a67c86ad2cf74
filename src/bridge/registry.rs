//! Registration registry
//!
//! Registrations of different host types live side by side behind the
//! object-safe [`RegisteredObject`]. The registry is shared between the
//! bridge and the signal handlers it connects, so it is internally locked.

use crate::bindings::capability::{CapabilityTable, Exposed, MemberSchema};
use crate::bindings::coercion::coerce_all;
use crate::bindings::protocol::CallEnvelope;
use crate::core::error::{BridgeError, BridgeResult};
use crate::surface::HandlerId;
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// A named, exposed host object with its table and injected stub
pub(crate) trait RegisteredObject: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> &[MemberSchema];

    fn stub_script(&self) -> &str;

    /// Look up, coerce and invoke; `Some` carries the reply value
    fn call(&self, envelope: &CallEnvelope) -> BridgeResult<Option<Value>>;

    /// Remember the navigation handler connected for this registration
    fn set_handler(&self, navigation: HandlerId);

    fn take_handler(&self) -> Option<HandlerId>;
}

pub(crate) struct Registration<T> {
    name: String,
    target: Weak<T>,
    table: CapabilityTable<T>,
    stub: String,
    navigation: Mutex<Option<HandlerId>>,
}

impl<T: Exposed> Registration<T> {
    pub(crate) fn new(name: &str, target: &Arc<T>, table: CapabilityTable<T>, stub: String) -> Self {
        Self {
            name: name.to_string(),
            target: Arc::downgrade(target),
            table,
            stub,
            navigation: Mutex::new(None),
        }
    }
}

impl<T: Exposed> RegisteredObject for Registration<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &[MemberSchema] {
        self.table.schema()
    }

    fn stub_script(&self) -> &str {
        &self.stub
    }

    fn call(&self, envelope: &CallEnvelope) -> BridgeResult<Option<Value>> {
        let descriptor = self
            .table
            .get(&envelope.target, envelope.kind)
            .ok_or_else(|| BridgeError::UnknownMember {
                name: self.name.clone(),
                member: envelope.target.clone(),
                kind: envelope.kind,
            })?;

        let arguments = coerce_all(envelope.parameters.clone(), descriptor.parameter_types())?;

        // the host may have dropped the object without revoking it
        let target = self
            .target
            .upgrade()
            .ok_or_else(|| BridgeError::UnknownName(self.name.clone()))?;

        descriptor.call(&target, arguments)
    }

    fn set_handler(&self, navigation: HandlerId) {
        *self.navigation.lock().unwrap_or_else(PoisonError::into_inner) = Some(navigation);
    }

    fn take_handler(&self) -> Option<HandlerId> {
        self.navigation.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Name to registration map
#[derive(Default)]
pub(crate) struct Registry {
    entries: RwLock<HashMap<String, Arc<dyn RegisteredObject>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert unless the name is taken; `on_insert` runs under the write lock
    pub(crate) fn insert_with(
        &self,
        registration: Arc<dyn RegisteredObject>,
        on_insert: impl FnOnce(&Arc<dyn RegisteredObject>),
    ) -> BridgeResult<()> {
        let mut entries = self.write();
        match entries.entry(registration.name().to_string()) {
            Entry::Occupied(entry) => Err(BridgeError::DuplicateName(entry.key().clone())),
            Entry::Vacant(entry) => {
                on_insert(&registration);
                entry.insert(registration);
                Ok(())
            }
        }
    }

    pub(crate) fn remove(&self, name: &str) -> Option<Arc<dyn RegisteredObject>> {
        self.write().remove(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<dyn RegisteredObject>> {
        self.read().get(name).cloned()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Sorted names
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn len(&self) -> usize {
        self.read().len()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn RegisteredObject>> {
        self.read().values().cloned().collect()
    }

    pub(crate) fn drain(&self) -> Vec<Arc<dyn RegisteredObject>> {
        self.write().drain().map(|(_, registration)| registration).collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn RegisteredObject>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn RegisteredObject>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
