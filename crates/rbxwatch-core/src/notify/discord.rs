// Discord bot REST transport.
//
// Posts embeds with `POST {api_base}/channels/{id}/messages`. A 429 is
// waited out using `Retry-After` a bounded number of times; any other
// failure is returned to the caller once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};
use url::Url;

use super::{NotificationSink, SinkError, render};
use crate::model::{ChangeEvent, ChannelId};

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: SecretString,
    pub api_base: String,
    pub timeout: Duration,
}

impl DiscordConfig {
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            api_base: DEFAULT_API_BASE.into(),
            timeout: Duration::from_secs(15),
        }
    }
}

pub struct DiscordSink {
    config: DiscordConfig,
    http: reqwest::Client,
}

impl DiscordSink {
    pub fn new(config: DiscordConfig) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(
                "DiscordBot (https://github.com/rbxwatch/rbxwatch, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()?;
        Ok(Self { config, http })
    }

    fn channel_url(&self, channel: ChannelId, suffix: &str) -> Result<Url, SinkError> {
        let base = self.config.api_base.trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/channels/{channel}{suffix}"))?)
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.config.token.expose_secret())
    }

    async fn post_with_retry(
        &self,
        channel: ChannelId,
        payload: &serde_json::Value,
    ) -> Result<(), SinkError> {
        let url = self.channel_url(channel, "/messages")?;
        let mut attempts = 0;

        loop {
            attempts += 1;
            let resp = self
                .http
                .post(url.clone())
                .header(AUTHORIZATION, self.auth())
                .json(payload)
                .send()
                .await?;

            let status = resp.status();
            if status.is_success() {
                return Ok(());
            }

            if status.as_u16() == 429 {
                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    warn!(channel, attempts, "discord rate limit not lifting, giving up");
                    return Err(SinkError::RateLimited { attempts });
                }
                let wait = retry_after(&resp).unwrap_or(Duration::from_secs(1));
                debug!(channel, wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX), "discord rate limited");
                tokio::time::sleep(wait).await;
                continue;
            }

            return Err(classify(channel, status.as_u16(), resp.text().await.unwrap_or_default()));
        }
    }
}

fn retry_after(resp: &reqwest::Response) -> Option<Duration> {
    ["Retry-After", "X-RateLimit-Reset-After"]
        .iter()
        .filter_map(|h| resp.headers().get(*h))
        .filter_map(|v| v.to_str().ok()?.parse::<f64>().ok())
        .find(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

fn classify(destination: ChannelId, status: u16, message: String) -> SinkError {
    match status {
        403 => SinkError::Forbidden { destination },
        404 => SinkError::UnknownDestination { destination },
        _ => SinkError::Rejected { status, message },
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn deliver(&self, destination: ChannelId, event: &ChangeEvent) -> Result<(), SinkError> {
        self.post_with_retry(destination, &render::message(event))
            .await?;
        debug!(destination, kind = event.kind(), "discord notification sent");
        Ok(())
    }

    async fn verify_destination(&self, destination: ChannelId) -> Result<(), SinkError> {
        let url = self.channel_url(destination, "")?;
        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        Err(classify(destination, status.as_u16(), resp.text().await.unwrap_or_default()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::model::CriticalAlert;

    fn sink(server: &MockServer) -> DiscordSink {
        DiscordSink::new(DiscordConfig {
            api_base: server.uri(),
            ..DiscordConfig::new(SecretString::from("t0ken".to_owned()))
        })
        .unwrap()
    }

    fn alert() -> ChangeEvent {
        ChangeEvent::CriticalAlert(CriticalAlert {
            title: "test".into(),
            message: "hello".into(),
            at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn deliver_posts_embed_with_bot_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/42/messages"))
            .and(header("authorization", "Bot t0ken"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        sink(&server).deliver(42, &alert()).await.unwrap();
    }

    #[tokio::test]
    async fn rate_limit_is_waited_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/42/messages"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0.01"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/channels/42/messages"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        sink(&server).deliver(42, &alert()).await.unwrap();
    }

    #[tokio::test]
    async fn forbidden_channel_is_permission_denied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels/7"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = sink(&server).verify_destination(7).await.unwrap_err();
        assert!(err.is_permission_denied());
    }
}
