// Critical-condition escalation with a cooldown per alert title.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::NotificationSink;
use crate::backup::BackupManager;
use crate::config::EscalationConfig;
use crate::model::{ChangeEvent, ChannelId, CriticalAlert};

/// Raises critical conditions. Each one is logged and backed up; posting
/// to the escalation channel happens at most once per cooldown for a
/// given title.
pub struct Escalator {
    sink: Arc<dyn NotificationSink>,
    channel: Option<ChannelId>,
    cooldown: Duration,
    backups: Option<Arc<BackupManager>>,
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl Escalator {
    pub fn new(sink: Arc<dyn NotificationSink>, config: &EscalationConfig) -> Self {
        Self {
            sink,
            channel: config.channel,
            cooldown: config.cooldown,
            backups: None,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Take a `critical` backup on every escalation.
    pub fn with_backups(mut self, backups: Arc<BackupManager>) -> Self {
        self.backups = Some(backups);
        self
    }

    /// Returns `false` if posting was suppressed by the cooldown.
    pub async fn escalate(&self, title: &str, message: &str) -> bool {
        error!(critical = true, title, message, "critical condition");

        if let Some(backups) = &self.backups {
            if let Err(e) = backups.create_backup("critical") {
                warn!(error = %e, "critical backup failed");
            }
        }

        {
            let mut last = self.last_sent.lock().unwrap_or_else(PoisonError::into_inner);
            if last.get(title).is_some_and(|t| t.elapsed() < self.cooldown) {
                debug!(title, "escalation suppressed by cooldown");
                return false;
            }
            last.insert(title.to_owned(), Instant::now());
        }

        if let Some(channel) = self.channel {
            let event = ChangeEvent::CriticalAlert(CriticalAlert {
                title: title.to_owned(),
                message: message.to_owned(),
                at: Utc::now(),
            });
            if let Err(e) = self.sink.deliver(channel, &event).await {
                warn!(channel, error = %e, "could not deliver critical alert");
            }
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::config::StorageConfig;
    use crate::notify::SinkError;
    use crate::store::{LastPresence, StateStore};

    #[derive(Default)]
    struct RecordingSink {
        titles: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn deliver(&self, _: ChannelId, event: &ChangeEvent) -> Result<(), SinkError> {
            if let ChangeEvent::CriticalAlert(alert) = event {
                self.titles.lock().unwrap().push(alert.title.clone());
            }
            Ok(())
        }

        async fn verify_destination(&self, _: ChannelId) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn escalator(sink: Arc<RecordingSink>) -> Escalator {
        Escalator::new(
            sink,
            &EscalationConfig {
                channel: Some(9),
                cooldown: Duration::from_secs(300),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_applies_per_title() {
        let sink = Arc::new(RecordingSink::default());
        let escalator = escalator(sink.clone());

        assert!(escalator.escalate("State could not be saved", "disk full").await);
        assert!(!escalator.escalate("State could not be saved", "still full").await);
        assert!(escalator.escalate("Polling loop gave up", "badges").await);

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(escalator.escalate("State could not be saved", "again").await);

        assert_eq!(
            *sink.titles.lock().unwrap(),
            vec![
                "State could not be saved",
                "Polling loop gave up",
                "State could not be saved"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn every_escalation_takes_a_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(StorageConfig {
            data_dir: dir.path().to_path_buf(),
            ..StorageConfig::default()
        })
        .unwrap();
        assert!(store.save(&LastPresence::default()));
        let backups = Arc::new(BackupManager::new(store, dir.path().join("backups"), 10));

        let escalator =
            escalator(Arc::new(RecordingSink::default())).with_backups(backups.clone());
        assert!(escalator.escalate("State could not be saved", "first").await);
        assert!(!escalator.escalate("State could not be saved", "second").await);

        assert_eq!(backups.list().len(), 2);
    }
}
