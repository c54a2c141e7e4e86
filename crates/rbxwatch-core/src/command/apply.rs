// State mutations behind each tracking command. Callers hold the state
// lock and save the tenants document afterwards.

use rbxwatch_api::models::GroupMember;

use super::{CommandOutcome, ImportSummary};
use crate::config::TenantLimits;
use crate::model::{PrincipalId, RobloxId, TenantId, TrackedEntity, TrackedGroup};
use crate::store::TenantsDocument;

pub(crate) fn add_entity(
    doc: &mut TenantsDocument,
    limits: &TenantLimits,
    tenant: TenantId,
    entity: RobloxId,
    display_name: &str,
    principal: PrincipalId,
) -> CommandOutcome {
    let tenant = doc.tenants.entry(tenant).or_default();
    if tenant.tracks_entity(entity) {
        return CommandOutcome::AlreadyTracked;
    }
    if tenant.tracked_entities.len() >= limits.max_tracked_entities {
        return CommandOutcome::LimitExceeded {
            limit: limits.max_tracked_entities,
        };
    }
    tenant
        .tracked_entities
        .insert(entity, TrackedEntity::new(display_name, principal));
    CommandOutcome::Added
}

pub(crate) fn remove_entity(
    doc: &mut TenantsDocument,
    tenant: TenantId,
    entity: RobloxId,
) -> CommandOutcome {
    match doc
        .tenants
        .get_mut(&tenant)
        .and_then(|t| t.tracked_entities.remove(&entity))
    {
        Some(_) => CommandOutcome::Removed,
        None => CommandOutcome::NotFound,
    }
}

pub(crate) fn add_group(
    doc: &mut TenantsDocument,
    limits: &TenantLimits,
    tenant: TenantId,
    group: TrackedGroupSpec<'_>,
    principal: PrincipalId,
) -> CommandOutcome {
    let tenant = doc.tenants.entry(tenant).or_default();
    if tenant.tracks_group(group.id) {
        return CommandOutcome::AlreadyTracked;
    }
    if tenant.tracked_groups.len() >= limits.max_tracked_groups {
        return CommandOutcome::LimitExceeded {
            limit: limits.max_tracked_groups,
        };
    }
    tenant.tracked_groups.insert(
        group.id,
        TrackedGroup::new(group.display_name, group.member_count, principal),
    );
    CommandOutcome::Added
}

/// The parts of a group needed to start tracking it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TrackedGroupSpec<'a> {
    pub id: RobloxId,
    pub display_name: &'a str,
    pub member_count: u64,
}

pub(crate) fn remove_group(
    doc: &mut TenantsDocument,
    tenant: TenantId,
    group: RobloxId,
) -> CommandOutcome {
    match doc
        .tenants
        .get_mut(&tenant)
        .and_then(|t| t.tracked_groups.remove(&group))
    {
        Some(_) => CommandOutcome::Removed,
        None => CommandOutcome::NotFound,
    }
}

/// Track each member as an entity tagged with its origin group, stopping
/// once the tenant is full.
pub(crate) fn import_members(
    doc: &mut TenantsDocument,
    limits: &TenantLimits,
    tenant: TenantId,
    group: (RobloxId, &str),
    members: &[GroupMember],
    principal: PrincipalId,
) -> ImportSummary {
    let (group_id, group_name) = group;
    let tenant = doc.tenants.entry(tenant).or_default();
    let mut summary = ImportSummary {
        group_name: group_name.to_owned(),
        examined: members.len(),
        ..ImportSummary::default()
    };

    for member in members {
        if tenant.tracks_entity(member.user_id) {
            summary.already_tracked += 1;
            continue;
        }
        if tenant.tracked_entities.len() >= limits.max_tracked_entities {
            summary.skipped_limit += 1;
            continue;
        }
        let mut entity = TrackedEntity::new(&member.display_name, principal);
        entity.origin_group = Some(group_id);
        entity.origin_group_name = Some(group_name.to_owned());
        tenant.tracked_entities.insert(member.user_id, entity);
        summary.added += 1;
    }
    summary
}
