// Integration tests for `ApiClient` and the `RobloxApi` facade using wiremock.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rbxwatch_api::{
    ApiClient, ApiEndpoints, ApiSettings, EndpointClass, Error, PagingConfig, RateLimiter,
    RequestSpec, RetryPolicy, RobloxApi,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn client() -> Arc<ApiClient> {
    Arc::new(ApiClient::with_client(
        reqwest::Client::new(),
        Arc::new(RateLimiter::default()),
        RetryPolicy::immediate(),
    ))
}

async fn setup() -> (MockServer, RobloxApi) {
    let server = MockServer::start().await;
    let settings = ApiSettings {
        endpoints: ApiEndpoints::single(&server.uri()).unwrap(),
        paging: PagingConfig {
            page_delay: Duration::ZERO,
            role_delay: Duration::ZERO,
            failure_pause: Duration::ZERO,
            ..PagingConfig::default()
        },
        ..ApiSettings::default()
    };
    (server, RobloxApi::new(client(), settings))
}

fn url(server: &MockServer, p: &str) -> Url {
    Url::parse(&format!("{}{p}", server.uri())).unwrap()
}

// ── Retry behaviour ─────────────────────────────────────────────────

#[tokio::test]
async fn test_server_error_exhausts_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let client = client();
    let spec = RequestSpec::get(url(&server, "/flaky"), EndpointClass::Users).retries(3);
    let err = client.request(&spec).await.unwrap_err();

    assert!(err.to_string().contains("503"), "got: {err}");
    let stats = client.stats();
    assert_eq!(stats.total_calls, 4);
    assert_eq!(stats.retries, 3);
    assert_eq!(stats.failed_calls, 1);
    assert_eq!(stats.successful_calls, 0);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client();
    let spec = RequestSpec::get(url(&server, "/missing"), EndpointClass::Users).retries(3);
    let err = client.request(&spec).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(client.stats().retries, 0);
}

#[tokio::test]
async fn test_rate_limited_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let client = client();
    let spec = RequestSpec::get(url(&server, "/busy"), EndpointClass::Users).retries(2);
    let body = client.request(&spec).await.unwrap();

    assert_eq!(body, json!({ "ok": true }));
    assert_eq!(client.stats().retries, 1);
}

#[tokio::test]
async fn test_invalid_json_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .expect(3)
        .mount(&server)
        .await;

    let client = client();
    let spec = RequestSpec::get(url(&server, "/garbled"), EndpointClass::Users).retries(2);
    let err = client.request(&spec).await.unwrap_err();

    assert!(matches!(err, Error::Deserialization { .. }));
}

// ── Cache ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cache_hit_skips_network_and_limiter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": 42, "name": "builderman" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client();
    let spec = RequestSpec::get(url(&server, "/v1/users/42"), EndpointClass::Users)
        .cached(Duration::from_secs(600));

    let first = client.request(&spec).await.unwrap();
    let second = client.request(&spec).await.unwrap();

    assert_eq!(first, second);
    let stats = client.stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.cache_entries, 1);
    assert!((stats.success_rate - 100.0).abs() < f64::EPSILON);
    assert_eq!(client.limiter().in_flight(EndpointClass::Users).await, 1);
}

// ── Badges ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_all_badges_follows_cursor() {
    let (server, api) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/1/badges"))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageCursor": null,
            "data": [{ "id": 3, "name": "Third" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/users/1/badges"))
        .and(query_param("limit", "100"))
        .and(query_param("sortOrder", "Desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageCursor": "page2",
            "data": [{ "id": 1, "name": "First" }, { "id": 2, "name": "Second" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let badges = api.fetch_all_badges(1).await.unwrap();
    let ids: Vec<u64> = badges.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_fetch_all_badges_empty_is_ok() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/9/badges"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    let badges = api.fetch_all_badges(9).await.unwrap();
    assert!(badges.is_empty());
}

#[tokio::test]
async fn test_fetch_all_badges_gives_up_after_three_failed_pages() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/5/badges"))
        .respond_with(ResponseTemplate::new(403))
        .expect(3)
        .mount(&server)
        .await;

    let err = api.fetch_all_badges(5).await.unwrap_err();
    assert!(matches!(err, Error::PaginationAborted { failures: 3, .. }));
}

// ── Presence ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_presence_batches_ids() {
    let (server, api) = setup().await;
    Mock::given(method("POST"))
        .and(path("/v1/presence/users"))
        .and(body_json(json!({ "userIds": [10, 20] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userPresences": [
                { "userId": 10, "userPresenceType": 0 },
                { "userId": 20, "userPresenceType": 2, "placeId": 606 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let presences = api.fetch_presence(&[10, 20]).await.unwrap();
    assert_eq!(presences.len(), 2);
    assert_eq!(presences[1].user_presence_type, 2);
    assert_eq!(presences[1].place_id, Some(606));
}

#[tokio::test]
async fn test_fetch_presence_without_ids_makes_no_call() {
    let (server, api) = setup().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    assert!(api.fetch_presence(&[]).await.unwrap().is_empty());
}

// ── Lookups ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_user_lookups() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 77, "name": "noob", "displayName": "Noob", "created": "2010-01-01T00:00:00Z"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/users/avatar-headshot"))
        .and(query_param("userIds", "77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "targetId": 77, "state": "Completed", "imageUrl": "https://tr.rbxcdn.com/x.png" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/usernames/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "requestedUsername": "noob", "id": 77, "name": "noob" }]
        })))
        .mount(&server)
        .await;

    let info = api.fetch_user_info(77).await.unwrap();
    assert_eq!(info.display_name, "Noob");
    assert_eq!(api.fetch_avatar(77).await.unwrap(), "https://tr.rbxcdn.com/x.png");
    assert_eq!(api.resolve_username("noob").await.unwrap(), Some(77));
}

#[tokio::test]
async fn test_unknown_username_resolves_to_none() {
    let (server, api) = setup().await;
    Mock::given(method("POST"))
        .and(path("/v1/usernames/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    assert_eq!(api.resolve_username("nobody_here").await.unwrap(), None);
}

#[tokio::test]
async fn test_user_info_missing_id_is_invalid() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "x" })))
        .mount(&server)
        .await;

    let err = api.fetch_user_info(3).await.unwrap_err();
    assert!(matches!(err, Error::InvalidResponse(_)));
}

#[tokio::test]
async fn test_place_and_badge_info() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/games/multiget-place-details"))
        .and(query_param("placeIds", "606"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "placeId": 606, "name": "Obby", "universeId": 1 }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/badges/55"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 55, "name": "Winner", "description": "Finish the obby"
        })))
        .mount(&server)
        .await;

    assert_eq!(api.fetch_place_info(606).await.unwrap().name, "Obby");
    let badge = api.fetch_badge_info(55).await.unwrap();
    assert_eq!(badge.description.as_deref(), Some("Finish the obby"));
}

// ── Groups ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_group_info_fresh_bypasses_cache() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/groups/8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 8, "name": "Builders", "memberCount": 10
        })))
        .expect(3)
        .mount(&server)
        .await;

    assert_eq!(api.fetch_group_info(8).await.unwrap().member_count, 10);
    assert_eq!(api.fetch_group_info(8).await.unwrap().member_count, 10);
    api.fetch_group_info_fresh(8).await.unwrap();
    api.fetch_group_info_fresh(8).await.unwrap();
    assert_eq!(api.stats().cache_hits, 1);
}

#[tokio::test]
async fn test_group_members_dedup_and_limit() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/groups/8/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "groupId": 8,
            "roles": [
                { "id": 100, "name": "Member", "rank": 1 },
                { "id": 200, "name": "Admin", "rank": 255 }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/groups/8/roles/100/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageCursor": null,
            "data": [
                { "userId": 1, "username": "a", "displayName": "A" },
                { "userId": 2, "username": "b", "displayName": "B" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/groups/8/roles/200/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageCursor": null,
            "data": [
                { "userId": 2, "username": "b", "displayName": "B" },
                { "userId": 3, "username": "c" },
                { "userId": 4, "username": "d" }
            ]
        })))
        .mount(&server)
        .await;

    let members = api.fetch_group_members(8, 3).await.unwrap();
    let ids: Vec<u64> = members.iter().map(|m| m.user_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(members[2].role, "Admin");
    assert_eq!(members[2].display_name, "c");
}

#[tokio::test]
async fn test_group_members_skip_failing_role() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/groups/8/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "roles": [{ "id": 100, "name": "Broken" }, { "id": 200, "name": "Ok" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/groups/8/roles/100/users"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/groups/8/roles/200/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "userId": 9, "username": "nine" }]
        })))
        .mount(&server)
        .await;

    let members = api.fetch_group_members(8, 50).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, 9);
}

#[tokio::test]
async fn test_group_members_fail_without_roles() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/groups/8/roles"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(api.fetch_group_members(8, 10).await.is_err());
}
