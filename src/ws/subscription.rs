//! Per-connection subscription manager.
//!
//! Tracks which instances a WebSocket client follows and filters events
//! server-side.

use std::collections::HashSet;

use crate::domain::InstanceId;

/// Wildcard token accepted in subscribe/unsubscribe lists.
pub const WILDCARD: &str = "*";

/// Manages the set of instance subscriptions for a single WebSocket
/// connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed instances. Ignored while `subscribe_all` is set.
    instance_ids: HashSet<InstanceId>,
    /// Whether the client follows every instance (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds instances to the subscription set.
    pub fn subscribe(&mut self, ids: &[InstanceId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.instance_ids.extend(ids.iter().copied());
    }

    /// Removes instances from the subscription set. `wildcard` clears the
    /// follow-all flag.
    pub fn unsubscribe(&mut self, ids: &[InstanceId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.instance_ids.remove(id);
        }
    }

    /// Returns `true` if events for `instance_id` should be forwarded.
    #[must_use]
    pub fn matches(&self, instance_id: InstanceId) -> bool {
        self.subscribe_all || self.instance_ids.contains(&instance_id)
    }

    /// Returns the number of explicitly subscribed instances.
    #[must_use]
    pub fn count(&self) -> usize {
        self.instance_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

/// Splits raw ids into parsed instance ids and a wildcard flag. Entries
/// that are neither are returned as rejected.
pub fn parse_targets(raw: &[String]) -> (Vec<InstanceId>, bool, Vec<String>) {
    let mut ids = Vec::new();
    let mut wildcard = false;
    let mut rejected = Vec::new();
    for item in raw {
        if item == WILDCARD {
            wildcard = true;
        } else if let Ok(id) = item.parse::<InstanceId>() {
            ids.push(id);
        } else {
            rejected.push(item.clone());
        }
    }
    (ids, wildcard, rejected)
}
