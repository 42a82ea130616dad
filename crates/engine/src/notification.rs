// SPDX-License-Identifier: MIT

//! The Notification Processor (§4.7): tracks subscribers and dispatches
//! notifications to the Connection Manager. This crate stops at building
//! the notification record and looking up the matching subscribers — the
//! actual socket hand-off to a destination's session lives in the daemon's
//! Connection Manager.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sysrepo_core::SubscriptionId;

/// An event kind a subscription can register for. Mirrors the wire crate's
/// `EventKind` without depending on it, keeping the engine wire-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ModuleInstall,
    FeatureEnable,
    ModuleChange,
    Rpc,
}

/// An addressable notification recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub address: String,
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct SubscriptionKey {
    module: String,
    event: EventKind,
    destination: Destination,
}

/// A notification ready to hand to the Connection Manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub subscription: SubscriptionId,
    pub destination: Destination,
    pub module: String,
    pub event: EventKind,
    pub path: Option<String>,
}

/// Transient (process-lifetime) and persisted (module-change) subscriptions,
/// plus the destination→modules index used for O(log N) teardown on
/// subscriber disconnect (§4.7).
#[derive(Debug, Default)]
pub struct NotificationProcessor {
    transient: HashMap<SubscriptionId, SubscriptionKey>,
    persistent: HashMap<SubscriptionKey, SubscriptionId>,
    by_destination: HashMap<Destination, HashSet<SubscriptionKey>>,
    next_id: u32,
}

impl NotificationProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    /// `ModuleChange` subscriptions are persisted (survive a restart, loaded
    /// back from the persistence store); all other event kinds are transient.
    pub fn subscribe(&mut self, module: &str, event: EventKind, destination: Destination) -> SubscriptionId {
        let key = SubscriptionKey { module: module.to_string(), event, destination: destination.clone() };
        self.by_destination.entry(destination).or_default().insert(key.clone());
        if event == EventKind::ModuleChange {
            if let Some(&existing) = self.persistent.get(&key) {
                return existing;
            }
            let id = self.alloc_id();
            self.persistent.insert(key, id);
            id
        } else {
            let id = self.alloc_id();
            self.transient.insert(id, key);
            id
        }
    }

    /// The `(module, event, destination)` a subscription id was registered
    /// with, used by the Data Manager to locate the persisted entry (if any)
    /// to remove on `unsubscribe`.
    pub fn describe(&self, subscription: SubscriptionId) -> Option<(String, EventKind, Destination)> {
        if let Some(key) = self.transient.get(&subscription) {
            return Some((key.module.clone(), key.event, key.destination.clone()));
        }
        self.persistent
            .iter()
            .find(|(_, &id)| id == subscription)
            .map(|(key, _)| (key.module.clone(), key.event, key.destination.clone()))
    }

    pub fn unsubscribe(&mut self, subscription: SubscriptionId) {
        if let Some(key) = self.transient.remove(&subscription) {
            self.remove_from_index(&key);
            return;
        }
        if let Some((key, _)) = self.persistent.iter().find(|(_, &id)| id == subscription).map(|(k, v)| (k.clone(), *v))
        {
            self.persistent.remove(&key);
            self.remove_from_index(&key);
        }
    }

    fn remove_from_index(&mut self, key: &SubscriptionKey) {
        if let Some(set) = self.by_destination.get_mut(&key.destination) {
            set.remove(key);
            if set.is_empty() {
                self.by_destination.remove(&key.destination);
            }
        }
    }

    /// Purge all of a destination's subscriptions, transient and persistent.
    pub fn purge_destination(&mut self, destination: &Destination) {
        let Some(keys) = self.by_destination.remove(destination) else { return };
        for key in keys {
            self.persistent.remove(&key);
            self.transient.retain(|_, k| k != &key);
        }
    }

    /// Build notification records for every subscriber of `(module, event)`.
    pub fn dispatch(&self, module: &str, event: EventKind, path: Option<&str>) -> Vec<NotificationRecord> {
        let mut out = Vec::new();
        for (id, key) in &self.transient {
            if key.module == module && key.event == event {
                out.push(NotificationRecord {
                    subscription: *id,
                    destination: key.destination.clone(),
                    module: module.to_string(),
                    event,
                    path: path.map(str::to_string),
                });
            }
        }
        for (key, id) in &self.persistent {
            if key.module == module && key.event == event {
                out.push(NotificationRecord {
                    subscription: *id,
                    destination: key.destination.clone(),
                    module: module.to_string(),
                    event,
                    path: path.map(str::to_string),
                });
            }
        }
        out
    }
}
