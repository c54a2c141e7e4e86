// Group info and member enumeration.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::{RobloxApi, decode, endpoint};
use crate::client::RequestSpec;
use crate::error::Error;
use crate::models::{CursorPage, GroupInfo, GroupMember, GroupRole, RoleMember, RobloxId, RolesResponse};
use crate::rate_limit::EndpointClass;

impl RobloxApi {
    /// Group details, served from cache when fresh.
    pub async fn fetch_group_info(&self, group: RobloxId) -> Result<GroupInfo, Error> {
        self.group_info(group, true).await
    }

    /// Group details straight from upstream.
    ///
    /// The monitoring loop uses this: a cached member count would hide
    /// exactly the changes it is looking for.
    pub async fn fetch_group_info_fresh(&self, group: RobloxId) -> Result<GroupInfo, Error> {
        self.group_info(group, false).await
    }

    async fn group_info(&self, group: RobloxId, cached: bool) -> Result<GroupInfo, Error> {
        let url = endpoint(&self.settings.endpoints.groups, &format!("/v1/groups/{group}"))?;
        let opts = self.settings.fetch.lookups;
        let mut spec = RequestSpec::get(url, EndpointClass::Groups)
            .retries(opts.max_retries)
            .timeout(opts.timeout);
        if cached {
            spec = spec.cached(self.settings.cache.group_info);
        }

        decode(self.client.request(&spec).await?, "group info")
    }

    pub async fn fetch_group_roles(&self, group: RobloxId) -> Result<Vec<GroupRole>, Error> {
        let url = endpoint(
            &self.settings.endpoints.groups,
            &format!("/v1/groups/{group}/roles"),
        )?;
        let opts = self.settings.fetch.lookups;
        let spec = RequestSpec::get(url, EndpointClass::Groups)
            .retries(opts.max_retries)
            .timeout(opts.timeout);

        let resp: RolesResponse = decode(self.client.request(&spec).await?, "group roles")?;
        Ok(resp.roles)
    }

    /// Up to `limit` distinct members of `group`, walking every role.
    ///
    /// Fails only if the role list itself cannot be fetched. A role whose
    /// member pages fail is skipped and the walk moves on to the next.
    pub async fn fetch_group_members(
        &self,
        group: RobloxId,
        limit: usize,
    ) -> Result<Vec<GroupMember>, Error> {
        let roles = self.fetch_group_roles(group).await?;
        let opts = self.settings.fetch.group_members;
        let paging = &self.settings.paging;
        let page_cap = usize::try_from(paging.page_size).unwrap_or(100);

        let mut members: Vec<GroupMember> = Vec::new();
        let mut seen: HashSet<RobloxId> = HashSet::new();

        for (idx, role) in roles.iter().enumerate() {
            if members.len() >= limit {
                break;
            }
            if idx > 0 {
                tokio::time::sleep(paging.role_delay).await;
            }

            let url = endpoint(
                &self.settings.endpoints.groups,
                &format!("/v1/groups/{group}/roles/{}/users", role.id),
            )?;
            let mut cursor: Option<String> = None;

            while members.len() < limit {
                let mut spec = RequestSpec::get(url.clone(), EndpointClass::Groups)
                    .param("limit", page_cap.min(limit - members.len()))
                    .param("sortOrder", "Asc")
                    .retries(opts.max_retries)
                    .timeout(opts.timeout);
                if let Some(c) = &cursor {
                    spec = spec.param("cursor", c);
                }

                let page = match self
                    .client
                    .request(&spec)
                    .await
                    .and_then(|v| decode::<CursorPage<RoleMember>>(v, "role members"))
                {
                    Ok(page) => page,
                    Err(e) => {
                        warn!(group_id = group, role_id = role.id, error = %e, "skipping role");
                        break;
                    }
                };

                if page.data.is_empty() {
                    break;
                }

                for m in page.data {
                    if members.len() >= limit {
                        break;
                    }
                    if !seen.insert(m.user_id) {
                        continue;
                    }
                    let username = if m.username.is_empty() {
                        format!("User{}", m.user_id)
                    } else {
                        m.username
                    };
                    let display_name = if m.display_name.is_empty() {
                        username.clone()
                    } else {
                        m.display_name
                    };
                    members.push(GroupMember {
                        user_id: m.user_id,
                        username,
                        display_name,
                        role: role.name.clone(),
                    });
                }

                match page.next_page_cursor.filter(|c| !c.is_empty()) {
                    Some(next) => {
                        cursor = Some(next);
                        tokio::time::sleep(paging.page_delay).await;
                    }
                    None => break,
                }
            }
        }

        debug!(group_id = group, count = members.len(), "collected group members");
        Ok(members)
    }
}
