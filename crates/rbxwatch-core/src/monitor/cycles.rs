// One fetch/diff/save/deliver pass per loop kind.
//
// The state lock is held for the whole pass. Known state is saved after
// diffing and before anything is sent, so a crash during delivery loses
// notifications but never re-sends them.
//
// The tenants document may be rewritten by the CLI while a group pass is
// fetching; the pass re-reads it before saving and reapplies its counts.

use std::sync::atomic::Ordering;

use rbxwatch_api::models::{Badge, RobloxId, UserPresence};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{LoopKind, Monitor};
use crate::detect::{self, PresenceTransition};
use crate::error::CoreError;
use crate::model::{
    BadgeEarned, ChangeEvent, Delivery, GroupMemberCountChanged, PresenceChanged, TenantId,
    code_from_upstream,
};
use crate::store::TenantsDocument;

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Entities or groups fetched successfully.
    pub checked: usize,
    /// Fetches that failed; those ids are retried next cycle.
    pub failed: usize,
    /// Deliveries decided on.
    pub events: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
    /// Whether the state document was written.
    pub saved: bool,
}

impl CycleReport {
    fn all_failed(&self) -> bool {
        self.checked == 0 && self.failed > 0
    }
}

/// A badge listing change waiting for enrichment.
struct NewBadges {
    entity: RobloxId,
    badge_ids: Vec<RobloxId>,
    listing: Vec<Badge>,
}

impl Monitor {
    pub async fn run_badge_cycle(&self) -> Result<CycleReport, CoreError> {
        let api = &self.inner.api;
        let mut state = self.lock_state().await;
        let mut report = CycleReport::default();

        let entities = state.tracked_entity_ids();
        if entities.is_empty() {
            return Ok(report);
        }

        let mut pending = Vec::new();
        for entity in entities {
            if self.inner.cancel.is_cancelled() {
                break;
            }
            match api.fetch_all_badges(entity).await {
                Ok(listing) => {
                    report.checked += 1;
                    let ids: Vec<RobloxId> = listing.iter().map(|b| b.id).collect();
                    let badge_ids = detect::diff_badges(&mut state.known_badges, entity, &ids);
                    if !badge_ids.is_empty() {
                        info!(entity, new = badge_ids.len(), "new badges");
                        pending.push(NewBadges {
                            entity,
                            badge_ids,
                            listing,
                        });
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(entity, error = %e, "badge fetch failed, skipping this cycle");
                }
            }
        }

        if report.checked > 0 {
            report.saved = self.inner.store.save(&state.known_badges);
            if !report.saved {
                self.storage_failure("known badges").await;
            }
        }

        let mut deliveries = Vec::new();
        for change in pending {
            let avatar_url = api.fetch_avatar(change.entity).await.ok();
            for badge_id in change.badge_ids {
                let (badge_name, badge_description) =
                    self.badge_details(badge_id, &change.listing).await;
                deliveries.extend(detect::fan_out(&state.tenants, change.entity, |tracked| {
                    ChangeEvent::BadgeEarned(BadgeEarned {
                        entity: change.entity,
                        entity_name: tracked.display_name.clone(),
                        badge_id,
                        badge_name: badge_name.clone(),
                        badge_description: badge_description.clone(),
                        avatar_url: avatar_url.clone(),
                    })
                }));
            }
        }

        self.deliver_all(deliveries, &mut report).await;
        drop(state);

        self.log_stats_if_due();
        finish(LoopKind::Badges, report)
    }

    pub async fn run_presence_cycle(&self) -> Result<CycleReport, CoreError> {
        let api = &self.inner.api;
        let mut state = self.lock_state().await;
        let mut report = CycleReport::default();

        let entities: Vec<RobloxId> = state.tracked_entity_ids().into_iter().collect();
        if entities.is_empty() {
            return Ok(report);
        }

        let presences = api.fetch_presence(&entities).await?;
        report.checked = presences.len();

        let mut transitions: Vec<(UserPresence, PresenceTransition)> = Vec::new();
        for presence in presences {
            if entities.binary_search(&presence.user_id).is_err() {
                continue;
            }
            let code = code_from_upstream(presence.user_presence_type);
            let entity = presence.user_id;
            if let Some(t) = detect::diff_presence(&mut state.last_presence, entity, code) {
                transitions.push((presence, t));
            }
        }

        report.saved = self.inner.store.save(&state.last_presence);
        if !report.saved {
            self.storage_failure("last presence").await;
        }

        let mut deliveries = Vec::new();
        for (presence, transition) in transitions {
            let entity = presence.user_id;
            let avatar_url = api.fetch_avatar(entity).await.ok();
            let place_name = match presence.place_id {
                Some(place) if transition.current == 2 => {
                    api.fetch_place_info(place).await.ok().map(|p| p.name)
                }
                _ => None,
            };
            debug!(entity, from = transition.previous, to = transition.current, "came online");

            deliveries.extend(detect::fan_out(&state.tenants, entity, |tracked| {
                ChangeEvent::PresenceChanged(PresenceChanged {
                    entity,
                    entity_name: tracked.display_name.clone(),
                    previous: transition.previous,
                    current: transition.current,
                    place_id: presence.place_id,
                    place_name: place_name.clone(),
                    avatar_url: avatar_url.clone(),
                })
            }));
        }

        self.deliver_all(deliveries, &mut report).await;
        finish(LoopKind::Presence, report)
    }

    /// Member counts are compared per tenant: each tenant keeps the count
    /// it last saw, so a tenant that started tracking later is not told
    /// about changes that happened before.
    pub async fn run_group_cycle(&self) -> Result<CycleReport, CoreError> {
        let api = &self.inner.api;
        let mut state = self.lock_state().await;
        let mut report = CycleReport::default();

        let groups = state.tracked_group_ids();
        if groups.is_empty() {
            return Ok(report);
        }

        let mut deliveries = Vec::new();
        let mut counts: Vec<(TenantId, RobloxId, u64)> = Vec::new();
        for group in groups {
            if self.inner.cancel.is_cancelled() {
                break;
            }
            let info = match api.fetch_group_info_fresh(group).await {
                Ok(info) => info,
                Err(e) => {
                    report.failed += 1;
                    warn!(group, error = %e, "group fetch failed, skipping this cycle");
                    continue;
                }
            };
            report.checked += 1;

            for (&tenant_id, tenant) in &mut state.tenants.tenants {
                let destination = tenant.destination();
                let Some(tracked) = tenant.tracked_groups.get_mut(&group) else {
                    continue;
                };
                let Some(change) = detect::diff_group(tracked, info.member_count) else {
                    continue;
                };
                counts.push((tenant_id, group, change.new_count));
                info!(
                    tenant = tenant_id,
                    group,
                    old = change.old_count,
                    new = change.new_count,
                    "group member count changed"
                );
                let Some(destination) = destination else {
                    continue;
                };
                let group_name = if tracked.display_name.is_empty() {
                    info.name.clone()
                } else {
                    tracked.display_name.clone()
                };
                deliveries.push(Delivery {
                    tenant: tenant_id,
                    destination,
                    event: ChangeEvent::GroupMemberCountChanged(GroupMemberCountChanged {
                        group,
                        group_name,
                        old_count: change.old_count,
                        new_count: change.new_count,
                        delta: change.delta,
                    }),
                });
            }
        }

        if report.checked > 0 {
            if state.refresh_tenants(&self.inner.store) {
                reapply_counts(&mut state.tenants, &counts);
            }
            report.saved = state.save_tenants(&self.inner.store);
            if !report.saved {
                self.storage_failure("tenants").await;
            }
        }

        self.deliver_all(deliveries, &mut report).await;
        finish(LoopKind::Groups, report)
    }

    /// Badge name and description, preferring the badge info endpoint and
    /// falling back to what the listing carried.
    async fn badge_details(
        &self,
        badge_id: RobloxId,
        listing: &[Badge],
    ) -> (Option<String>, Option<String>) {
        let listed = listing.iter().find(|b| b.id == badge_id);
        match self.inner.api.fetch_badge_info(badge_id).await {
            Ok(info) => {
                let name = info
                    .display_name
                    .filter(|n| !n.is_empty())
                    .or_else(|| Some(info.name).filter(|n| !n.is_empty()));
                (name, info.description)
            }
            Err(e) => {
                debug!(badge_id, error = %e, "badge info unavailable, using listing");
                (
                    listed.map(|b| b.name.clone()).filter(|n| !n.is_empty()),
                    listed.and_then(|b| b.description.clone()),
                )
            }
        }
    }

    /// Send each delivery once. Failures are logged and counted, never
    /// retried.
    async fn deliver_all(&self, deliveries: Vec<Delivery>, report: &mut CycleReport) {
        report.events += deliveries.len();
        for delivery in deliveries {
            match self
                .inner
                .sink
                .deliver(delivery.destination, &delivery.event)
                .await
            {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.delivery_failures += 1;
                    warn!(
                        tenant = delivery.tenant,
                        destination = delivery.destination,
                        kind = delivery.event.kind(),
                        sink = self.inner.sink.name(),
                        error = %e,
                        "notification not delivered"
                    );
                }
            }
        }
    }

    fn log_stats_if_due(&self) {
        let every = self.inner.config.polling.stats_log_every;
        let cycles = self.inner.badge_cycles.fetch_add(1, Ordering::Relaxed) + 1;
        if every == 0 || cycles % every != 0 {
            return;
        }

        let stats = self.inner.api.stats();
        info!(
            cycles,
            total_calls = stats.total_calls,
            successful = stats.successful_calls,
            failed = stats.failed_calls,
            retries = stats.retries,
            cache_hits = stats.cache_hits,
            cache_entries = stats.cache_entries,
            success_rate = format!("{:.1}%", stats.success_rate),
            "API statistics"
        );

        let ttls = &self.inner.api.settings().cache;
        let longest = [
            ttls.user_info,
            ttls.avatar,
            ttls.badge_info,
            ttls.place_info,
            ttls.group_info,
        ]
        .into_iter()
        .max()
        .unwrap_or_default();
        let purged = self.inner.api.client().cache().purge_older_than(longest);
        if purged > 0 {
            debug!(purged, "expired cache entries dropped");
        }
    }
}

/// Carry member counts observed this pass over to a re-read document.
/// Groups untracked in the meantime stay untracked.
fn reapply_counts(tenants: &mut TenantsDocument, counts: &[(TenantId, RobloxId, u64)]) {
    for &(tenant_id, group, count) in counts {
        if let Some(tenant) = tenants.tenants.get_mut(&tenant_id) {
            if let Some(tracked) = tenant.tracked_groups.get_mut(&group) {
                tracked.last_known_member_count = count;
            }
        }
    }
}

fn finish(kind: LoopKind, report: CycleReport) -> Result<CycleReport, CoreError> {
    if report.all_failed() {
        return Err(CoreError::Api {
            message: format!("every {kind} fetch failed ({} attempted)", report.failed),
            status: None,
        });
    }
    if report.events > 0 {
        info!(
            %kind,
            events = report.events,
            delivered = report.delivered,
            failed = report.delivery_failures,
            "notifications sent"
        );
    }
    Ok(report)
}
