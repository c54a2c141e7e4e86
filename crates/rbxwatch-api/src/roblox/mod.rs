// Typed facade over the Roblox web APIs
//
// Thin compositions over `ApiClient`: each service file builds the
// `RequestSpec`s for its endpoints and decodes the payloads. Pagination
// and aggregation (badge cursors, group role walks) live here too so the
// change detector only ever sees complete lists or an error.

mod badges;
mod groups;
mod places;
mod presence;
mod users;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::client::{ApiClient, ApiStats};
use crate::error::Error;

// ── Endpoints ───────────────────────────────────────────────────────

/// Base URLs of the upstream services.
///
/// Paths are appended verbatim, so a base may carry a prefix when
/// calls are routed through a proxy.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub badges: Url,
    pub presence: Url,
    pub users: Url,
    pub thumbnails: Url,
    pub games: Url,
    pub groups: Url,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self::from_hosts(&[
            "https://badges.roblox.com",
            "https://presence.roblox.com",
            "https://users.roblox.com",
            "https://thumbnails.roblox.com",
            "https://games.roblox.com",
            "https://groups.roblox.com",
        ])
        .unwrap_or_else(|_| unreachable!("static endpoint URLs are valid"))
    }
}

impl ApiEndpoints {
    /// Route every service to the same base URL (mock servers, proxies).
    pub fn single(base: &str) -> Result<Self, Error> {
        Self::from_hosts(&[base; 6])
    }

    fn from_hosts(hosts: &[&str; 6]) -> Result<Self, Error> {
        let [badges, presence, users, thumbnails, games, groups] = hosts;
        Ok(Self {
            badges: Url::parse(badges)?,
            presence: Url::parse(presence)?,
            users: Url::parse(users)?,
            thumbnails: Url::parse(thumbnails)?,
            games: Url::parse(games)?,
            groups: Url::parse(groups)?,
        })
    }
}

/// Append `path` to `base`, keeping any path prefix on the base.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, Error> {
    let joined = format!("{}{}", base.as_str().trim_end_matches('/'), path);
    Ok(Url::parse(&joined)?)
}

// ── Per-call knobs ──────────────────────────────────────────────────

/// Retry budget and timeout for one kind of call.
#[derive(Debug, Clone, Copy)]
pub struct CallOptions {
    pub max_retries: u32,
    pub timeout: Duration,
}

impl CallOptions {
    pub const fn new(max_retries: u32, timeout_secs: u64) -> Self {
        Self {
            max_retries,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub badges: CallOptions,
    pub presence: CallOptions,
    pub lookups: CallOptions,
    pub group_members: CallOptions,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            badges: CallOptions::new(2, 20),
            presence: CallOptions::new(3, 15),
            lookups: CallOptions::new(2, 10),
            group_members: CallOptions::new(2, 15),
        }
    }
}

/// Cache lifetimes for the slow-changing lookups.
#[derive(Debug, Clone)]
pub struct CacheTtls {
    pub user_info: Duration,
    pub avatar: Duration,
    pub badge_info: Duration,
    pub place_info: Duration,
    pub group_info: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        const MINUTE: u64 = 60;
        Self {
            user_info: Duration::from_secs(10 * MINUTE),
            avatar: Duration::from_secs(30 * MINUTE),
            badge_info: Duration::from_secs(60 * MINUTE),
            place_info: Duration::from_secs(30 * MINUTE),
            group_info: Duration::from_secs(60 * MINUTE),
        }
    }
}

/// Pacing for paginated walks.
#[derive(Debug, Clone)]
pub struct PagingConfig {
    pub page_size: u32,
    pub page_delay: Duration,
    pub role_delay: Duration,
    /// Pause after a failed page before trying it again.
    pub failure_pause: Duration,
    pub max_page_failures: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            page_delay: Duration::from_millis(100),
            role_delay: Duration::from_millis(200),
            failure_pause: Duration::from_secs(2),
            max_page_failures: 3,
        }
    }
}

/// Everything the facade needs besides the client itself.
#[derive(Debug, Clone, Default)]
pub struct ApiSettings {
    pub endpoints: ApiEndpoints,
    pub fetch: FetchOptions,
    pub cache: CacheTtls,
    pub paging: PagingConfig,
}

// ── Facade ──────────────────────────────────────────────────────────

/// Typed access to every upstream operation rbxwatch uses.
///
/// List fetches return `Ok(vec![])` when the entity legitimately has
/// nothing; `Err` always means the data could not be obtained.
#[derive(Clone)]
pub struct RobloxApi {
    client: Arc<ApiClient>,
    settings: Arc<ApiSettings>,
}

impl RobloxApi {
    pub fn new(client: Arc<ApiClient>, settings: ApiSettings) -> Self {
        Self {
            client,
            settings: Arc::new(settings),
        }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    pub fn stats(&self) -> ApiStats {
        self.client.stats()
    }
}

/// Decode a JSON payload into `T`, reporting shape errors as
/// [`Error::InvalidResponse`].
pub(crate) fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|e| Error::InvalidResponse(format!("{what}: {e}")))
}
