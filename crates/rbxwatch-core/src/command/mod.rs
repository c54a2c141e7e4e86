// ── Tracking commands ──
//
// Every change to what a tenant tracks is a `TrackingCommand` and goes
// through `Monitor::execute`, which runs the gate (authorize, admit,
// validate) before applying it.

mod apply;
mod gate;

use serde::Serialize;

pub(crate) use apply::{
    TrackedGroupSpec, add_entity, add_group, import_members, remove_entity, remove_group,
};
pub use gate::{CommandGate, validate_username};

use crate::config::TenantLimits;
use crate::error::CoreError;
use crate::model::{ChannelId, RobloxId, TenantId};

/// Largest Roblox id accepted from a caller.
pub const MAX_ID: RobloxId = 1_000_000_000_000_000;

/// All mutating operations on tenant tracking state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingCommand {
    AddEntity {
        tenant: TenantId,
        entity: RobloxId,
        display_name: String,
    },
    RemoveEntity {
        tenant: TenantId,
        entity: RobloxId,
    },
    AddGroup {
        tenant: TenantId,
        group: RobloxId,
        display_name: String,
        member_count: u64,
    },
    RemoveGroup {
        tenant: TenantId,
        group: RobloxId,
    },
    /// Track up to `limit` members of `group` as entities.
    ImportGroupMembers {
        tenant: TenantId,
        group: RobloxId,
        limit: usize,
    },
    SetDestination {
        tenant: TenantId,
        destination: ChannelId,
    },
}

impl TrackingCommand {
    pub fn tenant(&self) -> TenantId {
        match self {
            Self::AddEntity { tenant, .. }
            | Self::RemoveEntity { tenant, .. }
            | Self::AddGroup { tenant, .. }
            | Self::RemoveGroup { tenant, .. }
            | Self::ImportGroupMembers { tenant, .. }
            | Self::SetDestination { tenant, .. } => *tenant,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AddEntity { .. } => "add_entity",
            Self::RemoveEntity { .. } => "remove_entity",
            Self::AddGroup { .. } => "add_group",
            Self::RemoveGroup { .. } => "remove_group",
            Self::ImportGroupMembers { .. } => "import_group_members",
            Self::SetDestination { .. } => "set_destination",
        }
    }

    /// Check ids and bounds before anything is touched.
    pub fn validate(&self, limits: &TenantLimits) -> Result<(), CoreError> {
        validate_snowflake("tenant", self.tenant())?;
        match self {
            Self::AddEntity { entity, .. } | Self::RemoveEntity { entity, .. } => {
                validate_id("entity", *entity)
            }
            Self::AddGroup { group, .. } | Self::RemoveGroup { group, .. } => {
                validate_id("group", *group)
            }
            Self::ImportGroupMembers { group, limit, .. } => {
                validate_id("group", *group)?;
                if *limit == 0 || *limit > limits.max_group_import {
                    return Err(CoreError::validation(
                        "limit",
                        format!("must be between 1 and {}", limits.max_group_import),
                    ));
                }
                Ok(())
            }
            Self::SetDestination { destination, .. } => {
                validate_snowflake("destination", *destination)
            }
        }
    }
}

pub(crate) fn validate_id(field: &'static str, id: RobloxId) -> Result<(), CoreError> {
    if id == 0 || id > MAX_ID {
        return Err(CoreError::validation(field, format!("{id} is out of range")));
    }
    Ok(())
}

/// Discord ids only need to be non-zero.
fn validate_snowflake(field: &'static str, id: u64) -> Result<(), CoreError> {
    if id == 0 {
        return Err(CoreError::validation(field, "must not be zero"));
    }
    Ok(())
}

/// Result of a command that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Added,
    AlreadyTracked,
    LimitExceeded { limit: usize },
    Removed,
    NotFound,
    Imported(ImportSummary),
    DestinationSet,
    /// The sink cannot post to the requested destination.
    DestinationDenied { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub group_name: String,
    pub examined: usize,
    pub added: usize,
    pub already_tracked: usize,
    pub skipped_limit: usize,
}
