// In-memory copy of the three state documents.
//
// One `MonitorState` lives behind the monitor's mutex. Every loop holds the
// lock for its whole fetch/diff/save cycle, so loops never see each other's
// half-applied changes.
//
// The CLI edits the tenants document from its own process, so the copy
// here is re-read whenever the file changed since it was last loaded or
// saved by this process.

use std::collections::BTreeSet;

use tracing::info;

use crate::model::RobloxId;
use crate::store::{
    DocumentKind, FileStamp, KnownBadges, LastPresence, StateStore, TenantsDocument,
};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MonitorState {
    pub tenants: TenantsDocument,
    pub known_badges: KnownBadges,
    pub last_presence: LastPresence,
    /// Tenants file as of our last load or save.
    tenants_stamp: Option<FileStamp>,
}

impl MonitorState {
    pub fn load(store: &StateStore) -> Self {
        let state = Self {
            tenants: store.load(),
            known_badges: store.load(),
            last_presence: store.load(),
            tenants_stamp: store.stamp(DocumentKind::Tenants),
        };
        info!(
            tenants = state.tenants.tenants.len(),
            entities = state.tracked_entity_ids().len(),
            groups = state.tracked_group_ids().len(),
            "state loaded"
        );
        state
    }

    /// Re-read the tenants document if another process wrote it. Returns
    /// whether the in-memory copy was replaced.
    pub fn refresh_tenants(&mut self, store: &StateStore) -> bool {
        let current = store.stamp(DocumentKind::Tenants);
        if current == self.tenants_stamp {
            return false;
        }
        self.tenants = store.load();
        self.tenants_stamp = store.stamp(DocumentKind::Tenants);
        info!(
            tenants = self.tenants.tenants.len(),
            "tenants document changed on disk, reloaded"
        );
        true
    }

    /// Save the tenants document, remembering the written file's stamp.
    pub fn save_tenants(&mut self, store: &StateStore) -> bool {
        let saved = store.save(&self.tenants);
        if saved {
            self.tenants_stamp = store.stamp(DocumentKind::Tenants);
        }
        saved
    }

    /// Every entity tracked by at least one tenant, once.
    pub fn tracked_entity_ids(&self) -> BTreeSet<RobloxId> {
        self.tenants
            .tenants
            .values()
            .flat_map(|t| t.tracked_entities.keys().copied())
            .collect()
    }

    /// Every group tracked by at least one tenant, once.
    pub fn tracked_group_ids(&self) -> BTreeSet<RobloxId> {
        self.tenants
            .tenants
            .values()
            .flat_map(|t| t.tracked_groups.keys().copied())
            .collect()
    }
}
