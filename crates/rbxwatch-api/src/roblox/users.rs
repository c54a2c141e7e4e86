// User profile, avatar and username resolution.

use serde_json::json;

use super::{RobloxApi, decode, endpoint};
use crate::client::RequestSpec;
use crate::error::Error;
use crate::models::{DataList, RobloxId, Thumbnail, UserInfo, UsernameMatch};
use crate::rate_limit::EndpointClass;

impl RobloxApi {
    pub async fn fetch_user_info(&self, user: RobloxId) -> Result<UserInfo, Error> {
        let url = endpoint(&self.settings.endpoints.users, &format!("/v1/users/{user}"))?;
        let opts = self.settings.fetch.lookups;
        let spec = RequestSpec::get(url, EndpointClass::Users)
            .retries(opts.max_retries)
            .timeout(opts.timeout)
            .cached(self.settings.cache.user_info);

        decode(self.client.request(&spec).await?, "user info")
    }

    /// Headshot thumbnail URL for `user`.
    pub async fn fetch_avatar(&self, user: RobloxId) -> Result<String, Error> {
        let url = endpoint(&self.settings.endpoints.thumbnails, "/v1/users/avatar-headshot")?;
        let opts = self.settings.fetch.lookups;
        let spec = RequestSpec::get(url, EndpointClass::Users)
            .param("userIds", user)
            .param("size", "150x150")
            .param("format", "Png")
            .param("isCircular", "false")
            .retries(opts.max_retries)
            .timeout(opts.timeout)
            .cached(self.settings.cache.avatar);

        let list: DataList<Thumbnail> = decode(self.client.request(&spec).await?, "avatar")?;
        list.data
            .into_iter()
            .next()
            .and_then(|t| t.image_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::InvalidResponse(format!("no avatar thumbnail for user {user}")))
    }

    /// Look up a user id by exact username. `Ok(None)` if nobody has it.
    pub async fn resolve_username(&self, username: &str) -> Result<Option<RobloxId>, Error> {
        let url = endpoint(&self.settings.endpoints.users, "/v1/usernames/users")?;
        let opts = self.settings.fetch.lookups;
        let spec = RequestSpec::post(
            url,
            EndpointClass::Users,
            json!({ "usernames": [username], "excludeBannedUsers": false }),
        )
        .retries(opts.max_retries)
        .timeout(opts.timeout);

        let list: DataList<UsernameMatch> =
            decode(self.client.request(&spec).await?, "username lookup")?;
        Ok(list.data.first().map(|m| m.id))
    }
}
