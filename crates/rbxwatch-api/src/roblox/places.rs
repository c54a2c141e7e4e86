use super::{RobloxApi, decode, endpoint};
use crate::client::RequestSpec;
use crate::error::Error;
use crate::models::{PlaceInfo, RobloxId};
use crate::rate_limit::EndpointClass;

impl RobloxApi {
    /// Name and universe of a place (cached).
    pub async fn fetch_place_info(&self, place: RobloxId) -> Result<PlaceInfo, Error> {
        let url = endpoint(
            &self.settings.endpoints.games,
            "/v1/games/multiget-place-details",
        )?;
        let opts = self.settings.fetch.lookups;
        let spec = RequestSpec::get(url, EndpointClass::Places)
            .param("placeIds", place)
            .retries(opts.max_retries)
            .timeout(opts.timeout)
            .cached(self.settings.cache.place_info);

        let places: Vec<PlaceInfo> = decode(self.client.request(&spec).await?, "place details")?;
        places
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse(format!("no details for place {place}")))
    }
}
