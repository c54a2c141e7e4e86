// ── Change detection ──
//
// Pure diffs of live state against known state. Every function updates
// the known state unconditionally and reports what changed; whether and
// where to notify is decided afterwards by `fan_out`.

use std::collections::BTreeSet;

use crate::model::{ChangeEvent, Delivery, RobloxId, TrackedEntity, TrackedGroup};
use crate::store::{KnownBadges, LastPresence, TenantsDocument};

/// Badge ids in `current` not previously known for `entity`, in fetch
/// order.
///
/// The known set is replaced by `current`, not merged with it, so a badge
/// that drops out of a listing and later reappears is reported again.
/// An entity with no entry at all is seeded silently: its first listing
/// is history, not news.
pub fn diff_badges(
    known: &mut KnownBadges,
    entity: RobloxId,
    current: &[RobloxId],
) -> Vec<RobloxId> {
    let current_set: BTreeSet<RobloxId> = current.iter().copied().collect();

    let new_ids = match known.by_entity.get(&entity) {
        None => Vec::new(),
        Some(previous) => {
            let mut seen = BTreeSet::new();
            current
                .iter()
                .copied()
                .filter(|id| !previous.contains(id) && seen.insert(*id))
                .collect()
        }
    };

    known.by_entity.insert(entity, current_set);
    new_ids
}

/// A transition worth announcing: offline to any online state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceTransition {
    pub previous: u8,
    pub current: u8,
}

/// Record `current` for `entity`; report it only for a 0 to non-zero
/// transition. An entity with no record counts as offline.
pub fn diff_presence(
    last: &mut LastPresence,
    entity: RobloxId,
    current: u8,
) -> Option<PresenceTransition> {
    let previous = last.get(entity);
    last.by_entity.insert(entity, current);
    (previous == 0 && current > 0).then_some(PresenceTransition { previous, current })
}

/// Member count movement for one tenant's tracked group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberCountChange {
    pub old_count: u64,
    pub new_count: u64,
    pub delta: i64,
}

pub fn diff_group(group: &mut TrackedGroup, current: u64) -> Option<MemberCountChange> {
    let old_count = group.last_known_member_count;
    group.last_known_member_count = current;
    if old_count == current {
        return None;
    }

    let delta = i64::try_from(current).unwrap_or(i64::MAX)
        - i64::try_from(old_count).unwrap_or(i64::MAX);
    Some(MemberCountChange {
        old_count,
        new_count: current,
        delta,
    })
}

/// One delivery per tenant that tracks `entity` and has a destination.
///
/// `make` builds the event for a tenant from that tenant's record, so the
/// entity is announced under the name each tenant knows it by.
pub fn fan_out<F>(tenants: &TenantsDocument, entity: RobloxId, mut make: F) -> Vec<Delivery>
where
    F: FnMut(&TrackedEntity) -> ChangeEvent,
{
    tenants
        .tenants
        .iter()
        .filter_map(|(&tenant_id, tenant)| {
            let destination = tenant.destination()?;
            let tracked = tenant.tracked_entities.get(&entity)?;
            Some(Delivery {
                tenant: tenant_id,
                destination,
                event: make(tracked),
            })
        })
        .collect()
}
