//! Outbound payload assembly.
//!
//! Summaries are grouped by pluralized domain and wrapped as
//! `{"merge_variables": {"last_update": ..., "<domain>s": [...]}}`.
//! Group order follows the first appearance of each domain; entity order
//! within a group follows the configuration.

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::domain::EntitySummary;

/// Entities sharing one domain, in configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityGroup {
    /// Pluralized domain, e.g. `sensors`.
    pub key: String,
    /// Members of the group.
    pub entities: Vec<EntitySummary>,
}

/// Contents of the `merge_variables` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeVariables {
    /// Formatted refresh timestamp.
    pub last_update: String,
    /// Domain groups in first-seen order.
    pub groups: Vec<EntityGroup>,
}

impl Serialize for MergeVariables {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len() + 1))?;
        map.serialize_entry("last_update", &self.last_update)?;
        for group in &self.groups {
            map.serialize_entry(&group.key, &group.entities)?;
        }
        map.end()
    }
}

/// Complete webhook body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    /// Template variables consumed by the display.
    pub merge_variables: MergeVariables,
}

impl Payload {
    /// Number of entities across all groups.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.merge_variables
            .groups
            .iter()
            .map(|g| g.entities.len())
            .sum()
    }

    /// Encodes the payload exactly as it goes on the wire.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if encoding fails.
    pub fn to_wire(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Stateless payload assembler.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadBuilder;

impl PayloadBuilder {
    /// Groups `summaries` by domain under a `last_update` stamp.
    #[must_use]
    pub fn build(last_update: &str, summaries: &[EntitySummary]) -> Payload {
        let mut groups: Vec<EntityGroup> = Vec::new();
        for summary in summaries {
            let key = group_key(&summary.domain);
            match groups.iter_mut().find(|g| g.key == key) {
                Some(group) => group.entities.push(summary.clone()),
                None => groups.push(EntityGroup {
                    key,
                    entities: vec![summary.clone()],
                }),
            }
        }

        Payload {
            merge_variables: MergeVariables {
                last_update: last_update.to_string(),
                groups,
            },
        }
    }
}

/// `sensor` → `sensors`; domains already ending in `s` are kept.
#[must_use]
pub fn group_key(domain: &str) -> String {
    if domain.ends_with('s') {
        domain.to_string()
    } else {
        format!("{domain}s")
    }
}
