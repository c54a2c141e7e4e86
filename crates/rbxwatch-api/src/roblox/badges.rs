// Badge listings and badge details.

use tracing::{debug, warn};

use super::{RobloxApi, decode, endpoint};
use crate::client::RequestSpec;
use crate::error::Error;
use crate::models::{Badge, BadgeInfo, CursorPage, RobloxId};
use crate::rate_limit::EndpointClass;

impl RobloxApi {
    /// Every badge `user` has earned, newest first.
    ///
    /// Follows `nextPageCursor` until the server stops returning one.
    /// A failed page is retried after a pause; after `max_page_failures`
    /// failed pages in total the whole fetch fails, so callers never
    /// mistake a partial listing for the full set.
    pub async fn fetch_all_badges(&self, user: RobloxId) -> Result<Vec<Badge>, Error> {
        let url = endpoint(
            &self.settings.endpoints.badges,
            &format!("/v1/users/{user}/badges"),
        )?;
        let opts = self.settings.fetch.badges;
        let paging = &self.settings.paging;

        let mut badges = Vec::new();
        let mut cursor: Option<String> = None;
        let mut failures = 0_u32;

        loop {
            let mut spec = RequestSpec::get(url.clone(), EndpointClass::Badges)
                .param("limit", paging.page_size)
                .param("sortOrder", "Desc")
                .retries(opts.max_retries)
                .timeout(opts.timeout);
            if let Some(c) = &cursor {
                spec = spec.param("cursor", c);
            }

            let page = self
                .client
                .request(&spec)
                .await
                .and_then(|v| decode::<CursorPage<Badge>>(v, "badge page"));

            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    failures += 1;
                    warn!(user_id = user, failures, error = %e, "badge page failed");
                    if failures >= paging.max_page_failures {
                        return Err(Error::PaginationAborted {
                            failures,
                            last_error: e.to_string(),
                        });
                    }
                    tokio::time::sleep(paging.failure_pause).await;
                    continue;
                }
            };

            badges.extend(page.data);

            match page.next_page_cursor.filter(|c| !c.is_empty()) {
                Some(next) => {
                    cursor = Some(next);
                    tokio::time::sleep(paging.page_delay).await;
                }
                None => break,
            }
        }

        debug!(user_id = user, count = badges.len(), "fetched badges");
        Ok(badges)
    }

    /// Details for a single badge (cached).
    pub async fn fetch_badge_info(&self, badge: RobloxId) -> Result<BadgeInfo, Error> {
        let url = endpoint(&self.settings.endpoints.badges, &format!("/v1/badges/{badge}"))?;
        let opts = self.settings.fetch.lookups;
        let spec = RequestSpec::get(url, EndpointClass::Badges)
            .retries(opts.max_retries)
            .timeout(opts.timeout)
            .cached(self.settings.cache.badge_info);

        decode(self.client.request(&spec).await?, "badge info")
    }
}
