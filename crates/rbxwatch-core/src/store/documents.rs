// The three persisted documents.
//
// Each is a flat `{ "<id>": value }` object plus a `_version` marker.
// Unknown keys and unreadable entries are dropped on load; a top level
// that is not an object makes the whole document unreadable.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Serialize, Serializer};
use serde_json::Value;
use strum::{Display, EnumIter, IntoStaticStr};

use crate::model::lenient;
use crate::model::{RobloxId, Tenant, TenantId};

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum DocumentKind {
    Tenants,
    KnownBadges,
    LastPresence,
}

/// A document the [`StateStore`](super::StateStore) can load and save.
pub trait Document: Default + Serialize {
    const KIND: DocumentKind;

    /// Build from arbitrary JSON, keeping whatever is readable. `None`
    /// when the value is not a document object.
    fn from_json(value: Value) -> Option<Self>;
}

// ── Tenants ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenantsDocument {
    pub tenants: BTreeMap<TenantId, Tenant>,
}

impl Serialize for TenantsDocument {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        lenient::serialize_versioned(DOCUMENT_VERSION, &self.tenants, s)
    }
}

impl Document for TenantsDocument {
    const KIND: DocumentKind = DocumentKind::Tenants;

    fn from_json(value: Value) -> Option<Self> {
        lenient::id_map_from_document(value, "tenants").map(|tenants| Self { tenants })
    }
}

// ── Known badges ────────────────────────────────────────────────────

/// Badge ids already seen per entity. An entity with no entry has never
/// been fetched successfully.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownBadges {
    pub by_entity: BTreeMap<RobloxId, BTreeSet<RobloxId>>,
}

impl Serialize for KnownBadges {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        lenient::serialize_versioned(DOCUMENT_VERSION, &self.by_entity, s)
    }
}

impl Document for KnownBadges {
    const KIND: DocumentKind = DocumentKind::KnownBadges;

    fn from_json(value: Value) -> Option<Self> {
        lenient::id_map_from_document(value, "known_badges").map(|by_entity| Self { by_entity })
    }
}

// ── Last presence ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LastPresence {
    pub by_entity: BTreeMap<RobloxId, u8>,
}

impl LastPresence {
    /// Last recorded code; an entity never seen counts as offline.
    pub fn get(&self, entity: RobloxId) -> u8 {
        self.by_entity.get(&entity).copied().unwrap_or(0)
    }
}

impl Serialize for LastPresence {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        lenient::serialize_versioned(DOCUMENT_VERSION, &self.by_entity, s)
    }
}

impl Document for LastPresence {
    const KIND: DocumentKind = DocumentKind::LastPresence;

    fn from_json(value: Value) -> Option<Self> {
        lenient::id_map_from_document(value, "last_presence").map(|by_entity| Self { by_entity })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn known_badges_read_legacy_lists() {
        let doc = KnownBadges::from_json(json!({
            "_version": 1,
            "156": [1, 2, 3],
            "261": [],
            "bogus": [4],
            "300": "not a list"
        }))
        .unwrap();
        assert_eq!(doc.by_entity.len(), 2);
        assert_eq!(doc.by_entity[&156], BTreeSet::from([1, 2, 3]));
        assert!(doc.by_entity[&261].is_empty());
    }

    #[test]
    fn documents_carry_version_marker() {
        let mut doc = LastPresence::default();
        doc.by_entity.insert(156, 2);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value, json!({ "_version": 1, "156": 2 }));
        assert_eq!(LastPresence::from_json(value), Some(doc));
    }

    #[test]
    fn top_level_arrays_are_not_documents() {
        assert!(KnownBadges::from_json(json!([[156, [1, 2, 3]]])).is_none());
        assert!(TenantsDocument::from_json(json!("tenants")).is_none());
    }

    #[test]
    fn unknown_presence_defaults_to_offline() {
        assert_eq!(LastPresence::default().get(1), 0);
    }
}
