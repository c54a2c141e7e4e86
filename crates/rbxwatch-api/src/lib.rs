// rbxwatch-api: rate-limited, retrying async client for the Roblox web APIs

pub mod cache;
pub mod client;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod roblox;
pub mod transport;

pub use client::{ApiClient, ApiStats, HttpMethod, RequestSpec, RetryPolicy};
pub use error::Error;
pub use rate_limit::{EndpointClass, RateLimiter, RateLimits};
pub use roblox::{
    ApiEndpoints, ApiSettings, CacheTtls, CallOptions, FetchOptions, PagingConfig, RobloxApi,
};
pub use transport::TransportConfig;
