//! Analytics events and their durable local queue.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::{
    launch::LaunchComponent,
    store::{Database, Entity},
    ActitoError, Context, Result,
};

/// File name of the events database.
pub const EVENTS_DATABASE: &str = "NotificareDatabase";
/// Seconds an undelivered event is kept.
pub const DEFAULT_EVENT_TTL: i32 = 86_400;
/// Failed resends after which a stored event is dropped.
pub const MAX_RETRIES: i16 = 5;

pub const EVENT_APPLICATION_INSTALL: &str = "re.notifica.event.application.Install";
pub const EVENT_APPLICATION_REGISTRATION: &str = "re.notifica.event.application.Registration";
pub const EVENT_APPLICATION_UPGRADE: &str = "re.notifica.event.application.Upgrade";
pub const EVENT_APPLICATION_OPEN: &str = "re.notifica.event.application.Open";
pub const EVENT_APPLICATION_CLOSE: &str = "re.notifica.event.application.Close";
pub const EVENT_NOTIFICATION_OPEN: &str = "re.notifica.event.notification.Open";
const CUSTOM_EVENT_PREFIX: &str = "re.notifica.event.custom.";

/// An event waiting for delivery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub device_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub notification_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub data: Option<JsonValue>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Seconds after `timestamp` the event stays deliverable.
    pub ttl: i32,
    #[serde(default)]
    pub retries: i16,
}

impl LocalEvent {
    pub fn new(kind: impl Into<String>, device_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            device_id: device_id.into(),
            session_id: None,
            notification_id: None,
            user_id: None,
            data: None,
            timestamp: at.timestamp_millis(),
            ttl: DEFAULT_EVENT_TTL,
            retries: 0,
        }
    }

    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_notification_id(mut self, notification_id: Option<String>) -> Self {
        self.notification_id = notification_id;
        self
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_data(mut self, data: Option<JsonValue>) -> Self {
        self.data = data;
        self
    }

    pub fn with_ttl(mut self, ttl: i32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Expired once `timestamp + ttl` is at or before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let expires_at = self
            .timestamp
            .saturating_add(i64::from(self.ttl).saturating_mul(1_000));
        expires_at <= now.timestamp_millis()
    }
}

impl Entity for LocalEvent {
    type Key = Uuid;
    const SCHEMA_VERSION: u32 = 1;

    fn key(&self) -> Uuid {
        self.id
    }
}

/// Durable queue of undelivered events.
#[derive(Clone, Debug)]
pub struct EventQueue {
    db: Database<LocalEvent>,
}

impl EventQueue {
    /// Opens the queue stored in `dir`, or a memory-only queue.
    pub async fn open(dir: Option<&Path>) -> Result<Self> {
        Ok(Self {
            db: Database::open(EVENTS_DATABASE, dir).await?,
        })
    }

    pub async fn add(&self, event: LocalEvent) -> Result<()> {
        self.db.insert(event).await
    }

    pub async fn fetch_all(&self) -> Result<Vec<LocalEvent>> {
        self.db.fetch_all().await
    }

    /// Persists the retry count of a queued event. Unknown events are
    /// ignored.
    pub async fn update(&self, event: &LocalEvent) -> Result<()> {
        self.db.update(event.clone()).await.map(|_| ())
    }

    /// Removes a queued event. Removing an unknown event is a no-op.
    pub async fn remove(&self, event: &LocalEvent) -> Result<()> {
        self.db.remove(event.id).await.map(|_| ())
    }

    pub async fn clear(&self) -> Result<()> {
        self.db.clear().await
    }

    /// Drops every expired event and returns how many were dropped.
    pub async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        self.db.retain(move |event| !event.is_expired(now)).await
    }
}

/// Outcome of one pass over the stored events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DrainSummary {
    pub sent: usize,
    pub expired: usize,
    pub retried: usize,
    pub discarded: usize,
}

/// Event logging with a local fallback queue.
#[derive(Debug)]
pub struct Events {
    context: Arc<Context>,
    queue: EventQueue,
    processing: AtomicBool,
}

impl Events {
    pub fn new(context: Arc<Context>, queue: EventQueue) -> Self {
        Self {
            context,
            queue,
            processing: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Sends an event, queueing it locally when delivery fails with a
    /// recoverable error.
    pub async fn log(
        &self,
        kind: &str,
        data: Option<JsonValue>,
        notification_id: Option<&str>,
    ) -> Result<()> {
        self.context.ensure_ready()?;
        let device = self.context.device()?;
        let event = LocalEvent::new(kind, device.id, Utc::now())
            .with_session_id(self.context.session_id())
            .with_notification_id(notification_id.map(str::to_owned))
            .with_user_id(device.user_id)
            .with_data(data);
        self.deliver(event).await
    }

    pub async fn log_application_install(&self) -> Result<()> {
        self.log(EVENT_APPLICATION_INSTALL, None, None).await
    }

    pub async fn log_application_registration(&self) -> Result<()> {
        self.log(EVENT_APPLICATION_REGISTRATION, None, None).await
    }

    pub async fn log_application_upgrade(&self) -> Result<()> {
        self.log(EVENT_APPLICATION_UPGRADE, None, None).await
    }

    pub async fn log_application_open(&self) -> Result<()> {
        self.log(EVENT_APPLICATION_OPEN, None, None).await
    }

    /// `session_length` is in seconds.
    pub async fn log_application_close(&self, session_length: f64) -> Result<()> {
        let data = json!({ "length": session_length.to_string() });
        self.log(EVENT_APPLICATION_CLOSE, Some(data), None).await
    }

    pub async fn log_notification_open(&self, notification_id: &str) -> Result<()> {
        self.log(EVENT_NOTIFICATION_OPEN, None, Some(notification_id))
            .await
    }

    /// Logs `re.notifica.event.custom.<name>`.
    pub async fn log_custom(&self, name: &str, data: Option<JsonValue>) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ActitoError::InvalidArgument(
                "custom event name must not be empty".to_owned(),
            ));
        }
        self.log(&format!("{CUSTOM_EVENT_PREFIX}{}", name.trim()), data, None)
            .await
    }

    async fn deliver(&self, event: LocalEvent) -> Result<()> {
        match self.context.client().log_event(&event).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_recoverable() => {
                #[cfg(feature = "tracing")]
                tracing::info!("queueing event '{}' for later delivery: {err}", event.kind);
                self.queue.add(event).await
            }
            Err(err) => Err(err),
        }
    }

    /// Resends every stored event once.
    ///
    /// Expired events are dropped. A recoverable failure bumps the event's
    /// retry count, dropping it once [`MAX_RETRIES`] is reached; any other
    /// failure drops it. Only one pass runs at a time: a concurrent call
    /// returns an empty summary immediately.
    pub async fn process_stored_events(&self) -> Result<DrainSummary> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(DrainSummary::default());
        }
        let _reset = ResetOnDrop(&self.processing);

        let mut summary = DrainSummary::default();
        let now = Utc::now();

        for mut event in self.queue.fetch_all().await? {
            if event.is_expired(now) {
                self.queue.remove(&event).await?;
                summary.expired += 1;
                continue;
            }

            match self.context.client().send_event(&event, 0).await {
                Ok(()) => {
                    self.queue.remove(&event).await?;
                    summary.sent += 1;
                }
                Err(err) if err.is_recoverable() => {
                    event.retries = event.retries.saturating_add(1);
                    if event.retries >= MAX_RETRIES {
                        self.queue.remove(&event).await?;
                        summary.discarded += 1;
                    } else {
                        self.queue.update(&event).await?;
                        summary.retried += 1;
                    }
                }
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("dropping undeliverable event '{}': {_err}", event.kind);
                    self.queue.remove(&event).await?;
                    summary.discarded += 1;
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("processed stored events: {summary:?}");

        Ok(summary)
    }
}

struct ResetOnDrop<'a>(&'a AtomicBool);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[async_trait]
impl LaunchComponent for Events {
    fn name(&self) -> &str {
        "events"
    }

    async fn launch(&self) -> Result<()> {
        self.process_stored_events().await.map(|_| ())
    }

    async fn clear_storage(&self) -> Result<()> {
        self.queue.clear().await
    }

    async fn execute_command(
        &self,
        command: &str,
        _data: Option<JsonValue>,
    ) -> Result<Option<JsonValue>> {
        match command {
            "processStoredEvents" => {
                let summary = self.process_stored_events().await?;
                Ok(Some(json!(summary)))
            }
            other => Err(ActitoError::InvalidArgument(format!(
                "unknown events command '{other}'"
            ))),
        }
    }
}
