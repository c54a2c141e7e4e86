// Batched presence lookup.

use serde_json::json;

use super::{RobloxApi, decode, endpoint};
use crate::client::RequestSpec;
use crate::error::Error;
use crate::models::{PresenceResponse, RobloxId, UserPresence};
use crate::rate_limit::EndpointClass;

impl RobloxApi {
    /// Presence for all `users` in one POST.
    ///
    /// Users the service omits from the response are simply absent from
    /// the result. An empty input makes no request.
    pub async fn fetch_presence(&self, users: &[RobloxId]) -> Result<Vec<UserPresence>, Error> {
        if users.is_empty() {
            return Ok(Vec::new());
        }

        let url = endpoint(&self.settings.endpoints.presence, "/v1/presence/users")?;
        let opts = self.settings.fetch.presence;
        let spec = RequestSpec::post(url, EndpointClass::Presence, json!({ "userIds": users }))
            .retries(opts.max_retries)
            .timeout(opts.timeout);

        let resp: PresenceResponse = decode(self.client.request(&spec).await?, "presence")?;
        Ok(resp.user_presences)
    }
}
