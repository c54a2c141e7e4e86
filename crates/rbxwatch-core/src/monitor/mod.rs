// ── Monitor ──
//
// Owns the engine: state behind one mutex, the API facade, the sink, the
// command gate and the supervised loops. Cheap to clone; every clone
// drives the same engine.

mod cycles;
mod supervisor;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use futures_util::FutureExt;
use rbxwatch_api::RobloxApi;
use rbxwatch_api::models::{BadgeInfo, GroupInfo, UserInfo};
use serde::Serialize;
use strum::IntoEnumIterator;
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use cycles::CycleReport;
pub use supervisor::{LoopKind, LoopSpawner, StatusSender, TaskStatus, Watchdog};

use crate::backup::BackupManager;
use crate::command::{self, CommandGate, CommandOutcome, TrackingCommand, TrackedGroupSpec};
use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::model::{
    ChannelId, PrincipalId, RobloxId, Tenant, TenantId, TrackedEntity, TrackedGroup,
};
use crate::notify::{Escalator, NotificationSink};
use crate::state::MonitorState;
use crate::store::{StateStore, TenantsDocument};

/// What `inspect_entity` reports about a Roblox user.
#[derive(Debug, Clone, Serialize)]
pub struct EntityProfile {
    pub info: UserInfo,
    pub avatar_url: Option<String>,
    pub badge_count: usize,
    pub latest_badge: Option<BadgeInfo>,
}

/// The change-detection engine.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    config: MonitorConfig,
    api: RobloxApi,
    sink: Arc<dyn NotificationSink>,
    store: StateStore,
    state: Mutex<MonitorState>,
    gate: CommandGate,
    escalator: Arc<Escalator>,
    backups: Arc<BackupManager>,
    statuses: BTreeMap<LoopKind, StatusSender>,
    badge_cycles: AtomicU64,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Monitor {
    /// Open storage and load state. Does not start polling; call
    /// [`start()`](Self::start) for that.
    ///
    /// Fails when the data directory is unusable.
    pub fn new(
        config: MonitorConfig,
        api: RobloxApi,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, CoreError> {
        let store = StateStore::open(config.storage.clone())?;
        let state = MonitorState::load(&store);

        let backup_dir = config
            .backup
            .directory
            .clone()
            .unwrap_or_else(|| store.data_dir().join("backups"));
        let backups = Arc::new(BackupManager::new(
            store.clone(),
            backup_dir,
            config.backup.max_backups,
        ));

        let mut escalator = Escalator::new(sink.clone(), &config.escalation);
        if config.backup.on_critical {
            escalator = escalator.with_backups(backups.clone());
        }

        let statuses = LoopKind::iter()
            .map(|kind| (kind, Arc::new(watch::channel(TaskStatus::Stopped).0)))
            .collect();

        Ok(Self {
            inner: Arc::new(MonitorInner {
                gate: CommandGate::new(config.access.clone()),
                config,
                api,
                sink,
                store,
                state: Mutex::new(state),
                escalator: Arc::new(escalator),
                backups,
                statuses,
                badge_cycles: AtomicU64::new(0),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn api(&self) -> &RobloxApi {
        &self.inner.api
    }

    pub fn backups(&self) -> &BackupManager {
        &self.inner.backups
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the watchdog (which starts the three polling loops) and the
    /// backup loop when enabled.
    pub async fn start(&self) {
        let monitor = self.clone();
        let spawner: LoopSpawner = Arc::new(
            move |kind: LoopKind, status: StatusSender, cancel: CancellationToken| {
                let monitor = monitor.clone();
                let polling = monitor.config().polling.clone();
                supervisor::run_loop(polling, kind, status, cancel, move || {
                    let monitor = monitor.clone();
                    async move { monitor.run_cycle(kind).await }
                })
                .boxed()
            },
        );

        let mut watchdog = Watchdog::new(
            self.inner.config.polling.clone(),
            spawner,
            self.inner.escalator.clone(),
            self.inner.cancel.clone(),
        );
        for (&kind, status) in &self.inner.statuses {
            watchdog.supervise(kind, status.clone());
        }

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(watchdog.run()));

        if self.inner.config.backup.enabled {
            handles.push(tokio::spawn(backup_task(
                self.inner.backups.clone(),
                self.inner.config.backup.interval,
                self.inner.cancel.clone(),
            )));
        }
        info!("monitor started");
    }

    /// Stop all loops and wait for them. A cycle in progress finishes its
    /// current step; state already saved stays saved.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        info!("monitor stopped");
    }

    /// Resolves once shutdown has been requested.
    pub async fn cancelled(&self) {
        self.inner.cancel.cancelled().await;
    }

    /// Run each loop's cycle once, in order, without supervision.
    pub async fn run_once(&self) -> Vec<(LoopKind, Result<CycleReport, CoreError>)> {
        let mut results = Vec::new();
        for kind in LoopKind::iter() {
            results.push((kind, self.run_cycle(kind).await));
        }
        results
    }

    pub async fn run_cycle(&self, kind: LoopKind) -> Result<CycleReport, CoreError> {
        match kind {
            LoopKind::Badges => self.run_badge_cycle().await,
            LoopKind::Presence => self.run_presence_cycle().await,
            LoopKind::Groups => self.run_group_cycle().await,
        }
    }

    pub fn task_status(&self, kind: LoopKind) -> watch::Receiver<TaskStatus> {
        self.inner
            .statuses
            .get(&kind)
            .map_or_else(|| watch::channel(TaskStatus::Stopped).1, |s| s.subscribe())
    }

    pub fn api_stats(&self) -> rbxwatch_api::ApiStats {
        self.inner.api.stats()
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Apply a tracking command on behalf of `principal`.
    ///
    /// Every mutation goes through here: authorization, rate limiting and
    /// validation happen before any state or upstream call is touched.
    pub async fn execute(
        &self,
        principal: PrincipalId,
        command: TrackingCommand,
    ) -> Result<CommandOutcome, CoreError> {
        let gate = &self.inner.gate;
        gate.authorize(principal)?;
        gate.admit(principal)?;
        command.validate(&self.inner.config.limits)?;

        info!(
            principal,
            tenant = command.tenant(),
            command = command.name(),
            "tracking command"
        );
        let limits = &self.inner.config.limits;

        let outcome = match command {
            TrackingCommand::AddEntity {
                tenant,
                entity,
                display_name,
            } => {
                self.mutate(|doc| {
                    command::add_entity(doc, limits, tenant, entity, &display_name, principal)
                })
                .await
            }
            TrackingCommand::RemoveEntity { tenant, entity } => {
                self.mutate(|doc| command::remove_entity(doc, tenant, entity))
                    .await
            }
            TrackingCommand::AddGroup {
                tenant,
                group,
                display_name,
                member_count,
            } => {
                let spec = TrackedGroupSpec {
                    id: group,
                    display_name: &display_name,
                    member_count,
                };
                self.mutate(|doc| command::add_group(doc, limits, tenant, spec, principal))
                    .await
            }
            TrackingCommand::RemoveGroup { tenant, group } => {
                self.mutate(|doc| command::remove_group(doc, tenant, group))
                    .await
            }
            TrackingCommand::ImportGroupMembers {
                tenant,
                group,
                limit,
            } => {
                let info = self.group_info(group).await?;
                let members = self.inner.api.fetch_group_members(group, limit).await?;
                self.mutate(|doc| {
                    CommandOutcome::Imported(command::import_members(
                        doc,
                        limits,
                        tenant,
                        (group, &info.name),
                        &members,
                        principal,
                    ))
                })
                .await
            }
            TrackingCommand::SetDestination {
                tenant,
                destination,
            } => self.set_destination(tenant, destination).await?,
        };

        debug!(?outcome, "tracking command applied");
        Ok(outcome)
    }

    async fn set_destination(
        &self,
        tenant: TenantId,
        destination: ChannelId,
    ) -> Result<CommandOutcome, CoreError> {
        match self.inner.sink.verify_destination(destination).await {
            Ok(()) => {}
            Err(e) if e.is_permission_denied() => {
                warn!(tenant, destination, error = %e, "destination rejected");
                return Ok(CommandOutcome::DestinationDenied {
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        Ok(self
            .mutate(|doc| {
                doc.tenants
                    .entry(tenant)
                    .or_default()
                    .config
                    .notification_destination = Some(destination);
                CommandOutcome::DestinationSet
            })
            .await)
    }

    /// Lock the state, first picking up tenant edits written by another
    /// process.
    pub(crate) async fn lock_state(&self) -> MutexGuard<'_, MonitorState> {
        let mut state = self.inner.state.lock().await;
        state.refresh_tenants(&self.inner.store);
        state
    }

    /// Apply `f` to the tenants document under the state lock and save
    /// it if anything changed.
    async fn mutate<F>(&self, f: F) -> CommandOutcome
    where
        F: FnOnce(&mut TenantsDocument) -> CommandOutcome,
    {
        let mut state = self.lock_state().await;
        let outcome = f(&mut state.tenants);
        let changed = matches!(
            outcome,
            CommandOutcome::Added
                | CommandOutcome::Removed
                | CommandOutcome::DestinationSet
                | CommandOutcome::Imported(_)
        );
        if changed && !state.save_tenants(&self.inner.store) {
            self.storage_failure("tenants").await;
        }
        outcome
    }

    pub(crate) async fn storage_failure(&self, document: &str) {
        let message = format!(
            "The {document} document could not be saved under {}. Changes are kept in memory \
             until the next successful save.",
            self.inner.store.data_dir().display()
        );
        self.inner
            .escalator
            .escalate("State could not be saved", &message)
            .await;
    }

    // ── Reads ────────────────────────────────────────────────────

    pub async fn tenant(&self, tenant: TenantId) -> Option<Tenant> {
        self.lock_state().await.tenants.tenants.get(&tenant).cloned()
    }

    pub async fn tenant_ids(&self) -> Vec<TenantId> {
        self.lock_state().await.tenants.tenants.keys().copied().collect()
    }

    pub async fn list_tracked_entities(&self, tenant: TenantId) -> Vec<(RobloxId, TrackedEntity)> {
        self.tenant(tenant)
            .await
            .map(|t| t.tracked_entities.into_iter().collect())
            .unwrap_or_default()
    }

    pub async fn list_tracked_groups(&self, tenant: TenantId) -> Vec<(RobloxId, TrackedGroup)> {
        self.tenant(tenant)
            .await
            .map(|t| t.tracked_groups.into_iter().collect())
            .unwrap_or_default()
    }

    /// Profile, badge count and most recent badge for a Roblox user.
    pub async fn inspect_entity(&self, entity: RobloxId) -> Result<EntityProfile, CoreError> {
        command::validate_id("entity", entity)?;
        let api = &self.inner.api;

        let info = api
            .fetch_user_info(entity)
            .await
            .map_err(|e| not_found(e, "user", entity))?;
        let avatar_url = api.fetch_avatar(entity).await.ok();
        let badges = api.fetch_all_badges(entity).await?;

        let latest_badge = match badges.first() {
            Some(badge) => api.fetch_badge_info(badge.id).await.ok(),
            None => None,
        };

        Ok(EntityProfile {
            info,
            avatar_url,
            badge_count: badges.len(),
            latest_badge,
        })
    }

    /// Look up a user id by username. `Ok(None)` if no such user.
    pub async fn resolve_username(&self, username: &str) -> Result<Option<RobloxId>, CoreError> {
        command::validate_username(username)?;
        Ok(self.inner.api.resolve_username(username).await?)
    }

    pub async fn user_info(&self, entity: RobloxId) -> Result<UserInfo, CoreError> {
        command::validate_id("entity", entity)?;
        self.inner
            .api
            .fetch_user_info(entity)
            .await
            .map_err(|e| not_found(e, "user", entity))
    }

    pub async fn group_info(&self, group: RobloxId) -> Result<GroupInfo, CoreError> {
        command::validate_id("group", group)?;
        self.inner
            .api
            .fetch_group_info(group)
            .await
            .map_err(|e| not_found(e, "group", group))
    }
}

fn not_found(err: rbxwatch_api::Error, entity_type: &'static str, id: RobloxId) -> CoreError {
    if err.is_not_found() {
        CoreError::NotFound { entity_type, id }
    } else {
        err.into()
    }
}

async fn backup_task(
    backups: Arc<BackupManager>,
    every: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let backups = backups.clone();
                match tokio::task::spawn_blocking(move || backups.create_backup("scheduled")).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "scheduled backup failed"),
                    Err(e) => warn!(error = %e, "scheduled backup task failed"),
                }
            }
        }
    }
}
