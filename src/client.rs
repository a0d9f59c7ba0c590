use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, Url};

use crate::{
    events::LocalEvent,
    models::{Application, Asset, Device, InAppMessage, InboxItem, Notification, Pass},
    transport::{ReqwestTransport, Transport},
    wire::{self, EventPayload},
    ActitoConfig, ActitoError, ApiRequest, NetworkRequest, RequestExecutor, Result,
};

/// REST client for the Actito services API.
///
/// Every request carries Basic auth built from the application key and
/// secret, and goes through the retrying [`RequestExecutor`].
#[derive(Clone)]
pub struct ActitoClient {
    executor: RequestExecutor,
    config: ActitoConfig,
    base_url: Url,
}

impl fmt::Debug for ActitoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActitoClient")
            .field("base_url", &self.base_url.as_str())
            .field("application_key", &self.config.application_key)
            .field("application_secret", &"<redacted>")
            .field("options", &self.config.options)
            .finish()
    }
}

impl ActitoClient {
    /// Creates a client sending requests with `reqwest`.
    ///
    /// Fails with [`ActitoError::Config`] when the services URL is not an
    /// absolute http(s) URL.
    pub fn new(config: ActitoConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.options.timeout_ms);
        Self::with_transport(config, Arc::new(ReqwestTransport::new(timeout)))
    }

    /// Creates a client on top of a custom transport.
    pub fn with_transport(config: ActitoConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let base_url = parse_services_url(&config.services_url)?;
        let executor = RequestExecutor::new(transport, config.options.clone());
        Ok(Self {
            executor,
            config,
            base_url,
        })
    }

    /// Creates a client from `ACTITO_*` environment variables.
    ///
    /// See [`ActitoConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::new(ActitoConfig::from_env()?)
    }

    pub fn config(&self) -> &ActitoConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub async fn fetch_application(&self) -> Result<Application> {
        let request = self.request(Method::GET, &["application", "info"])?;
        let response: wire::ApplicationResponse =
            self.executor.perform_decode(self.network(request)).await?;
        Ok(response.application)
    }

    /// Sends one event with the configured retry count.
    pub async fn log_event(&self, event: &LocalEvent) -> Result<()> {
        self.send_event(event, self.config.options.max_retries).await
    }

    /// Sends one event with an explicit retry count.
    pub async fn send_event(&self, event: &LocalEvent, max_retries: usize) -> Result<()> {
        let payload = EventPayload {
            kind: &event.kind,
            timestamp: event.timestamp,
            device_id: &event.device_id,
            session_id: event.session_id.as_deref(),
            notification_id: event.notification_id.as_deref(),
            user_id: event.user_id.as_deref(),
            data: event.data.as_ref(),
        };
        let request = self.request(Method::POST, &["event"])?.json(&payload)?;
        self.executor
            .perform(
                NetworkRequest::new(request)
                    .max_retries(max_retries)
                    .allow_empty_data(true),
            )
            .await?;
        Ok(())
    }

    /// `GET /asset/forgroup/{group}`
    pub async fn fetch_assets(&self, group: &str, device: Option<&Device>) -> Result<Vec<Asset>> {
        let group = require_non_empty(group, "group")?;
        let request = self
            .request(Method::GET, &["asset", "forgroup", group])?
            .query_opt("deviceID", device.map(|device| device.id.clone()))
            .query_opt("userID", device.and_then(|device| device.user_id.clone()));
        let response: wire::AssetsResponse =
            self.executor.perform_decode(self.network(request)).await?;
        Ok(response.assets)
    }

    /// `GET /pass/forserial/{serial}`
    pub async fn fetch_pass(&self, serial: &str) -> Result<Pass> {
        let serial = require_non_empty(serial, "serial")?;
        let request = self.request(Method::GET, &["pass", "forserial", serial])?;
        let response: wire::PassResponse =
            self.executor.perform_decode(self.network(request)).await?;
        Ok(response.pass)
    }

    /// `GET /inappmessage/forcontext/{context}`
    pub async fn fetch_in_app_message(&self, context: &str, device_id: &str) -> Result<InAppMessage> {
        let context = require_non_empty(context, "context")?;
        let device_id = require_non_empty(device_id, "device id")?;
        let request = self
            .request(Method::GET, &["inappmessage", "forcontext", context])?
            .query("deviceID", device_id);
        let response: wire::InAppMessageResponse =
            self.executor.perform_decode(self.network(request)).await?;
        Ok(response.message)
    }

    /// `GET /notification/{id}`
    pub async fn fetch_notification(&self, id: &str) -> Result<Notification> {
        let id = require_non_empty(id, "notification id")?;
        let request = self.request(Method::GET, &["notification", id])?;
        let response: wire::NotificationResponse =
            self.executor.perform_decode(self.network(request)).await?;
        Ok(response.notification)
    }

    /// `GET /notification/userinbox/{id}/fordevice/{deviceId}`
    pub async fn fetch_user_inbox_notification(
        &self,
        id: &str,
        device_id: &str,
    ) -> Result<Notification> {
        let id = require_non_empty(id, "notification id")?;
        let device_id = require_non_empty(device_id, "device id")?;
        let request = self.request(
            Method::GET,
            &["notification", "userinbox", id, "fordevice", device_id],
        )?;
        let response: wire::NotificationResponse =
            self.executor.perform_decode(self.network(request)).await?;
        Ok(response.notification)
    }

    /// `GET /notification/inbox/fordevice/{deviceId}`
    pub async fn fetch_inbox(&self, device_id: &str) -> Result<Vec<InboxItem>> {
        let device_id = require_non_empty(device_id, "device id")?;
        let request = self.request(
            Method::GET,
            &["notification", "inbox", "fordevice", device_id],
        )?;
        let response: wire::InboxResponse =
            self.executor.perform_decode(self.network(request)).await?;
        Ok(response.inbox_items.into_iter().map(Into::into).collect())
    }

    /// `PUT /notification/inbox/{id}`
    pub async fn mark_inbox_item_opened(&self, id: &str) -> Result<()> {
        let id = require_non_empty(id, "inbox item id")?;
        let request = self
            .request(Method::PUT, &["notification", "inbox", id])?
            .json(&serde_json::json!({ "opened": true }))?;
        self.perform_empty(request).await
    }

    /// `PUT /notification/inbox/fordevice/{deviceId}`
    pub async fn mark_all_inbox_items_opened(&self, device_id: &str) -> Result<()> {
        let device_id = require_non_empty(device_id, "device id")?;
        let request = self.request(
            Method::PUT,
            &["notification", "inbox", "fordevice", device_id],
        )?;
        self.perform_empty(request).await
    }

    /// `DELETE /notification/inbox/{id}`
    pub async fn remove_inbox_item(&self, id: &str) -> Result<()> {
        let id = require_non_empty(id, "inbox item id")?;
        let request = self.request(Method::DELETE, &["notification", "inbox", id])?;
        self.perform_empty(request).await
    }

    /// `DELETE /notification/inbox/fordevice/{deviceId}`
    pub async fn clear_inbox(&self, device_id: &str) -> Result<()> {
        let device_id = require_non_empty(device_id, "device id")?;
        let request = self.request(
            Method::DELETE,
            &["notification", "inbox", "fordevice", device_id],
        )?;
        self.perform_empty(request).await
    }

    /// Appends `segments` to the services URL; each one is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ActitoError::Config(format!(
                    "services URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<ApiRequest> {
        let url = self.endpoint(segments)?;
        Ok(ApiRequest::new(method, url).basic_auth(
            &self.config.application_key,
            &self.config.application_secret,
        ))
    }

    fn network(&self, request: ApiRequest) -> NetworkRequest {
        NetworkRequest::new(request).max_retries(self.config.options.max_retries)
    }

    async fn perform_empty(&self, request: ApiRequest) -> Result<()> {
        self.executor
            .perform(self.network(request).allow_empty_data(true))
            .await?;
        Ok(())
    }
}

fn parse_services_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|err| ActitoError::Config(format!("invalid services URL '{raw}': {err}")))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ActitoError::Config(format!(
            "services URL '{raw}' must be an absolute http(s) URL"
        )));
    }
    Ok(url)
}

fn require_non_empty<'a>(value: &'a str, name: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ActitoError::InvalidArgument(format!("{name} must not be empty")));
    }
    Ok(trimmed)
}
