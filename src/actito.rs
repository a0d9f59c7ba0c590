use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::sync::watch;

use crate::{
    events::{EventQueue, Events},
    in_app::InAppMessaging,
    inbox::{Inbox, InboxCache},
    launch::{LaunchState, Launcher},
    models::{Application, Asset, Device, Notification, Pass},
    transport::{ReqwestTransport, Transport},
    ActitoClient, ActitoConfig, Context, Result,
};

/// Builds an [`Actito`] instance.
pub struct ActitoBuilder {
    config: ActitoConfig,
    transport: Option<Arc<dyn Transport>>,
    storage_dir: Option<PathBuf>,
}

impl ActitoBuilder {
    /// Sends requests through `transport` instead of `reqwest`.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Directory holding the local databases. Without one the databases
    /// only live in memory.
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    /// Opens the local databases and registers every peer module.
    pub async fn build(self) -> Result<Actito> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(Duration::from_millis(
                self.config.options.timeout_ms,
            ))),
        };
        let client = ActitoClient::with_transport(self.config, transport)?;
        let context = Arc::new(Context::new(client));

        let dir = self.storage_dir.as_deref();
        let events = Arc::new(Events::new(context.clone(), EventQueue::open(dir).await?));
        let inbox = Arc::new(Inbox::new(context.clone(), InboxCache::open(dir).await?));
        let in_app_messaging = Arc::new(InAppMessaging::new(context.clone()));

        let mut launcher = Launcher::new(context.clone());
        launcher.register(events.clone());
        launcher.register(inbox.clone());
        launcher.register(in_app_messaging.clone());

        Ok(Actito {
            context,
            launcher,
            events,
            inbox,
            in_app_messaging,
        })
    }
}

/// Entry point to the SDK. Peer modules hang off accessor methods.
#[derive(Debug)]
pub struct Actito {
    context: Arc<Context>,
    launcher: Launcher,
    events: Arc<Events>,
    inbox: Arc<Inbox>,
    in_app_messaging: Arc<InAppMessaging>,
}

impl Actito {
    pub fn builder(config: ActitoConfig) -> ActitoBuilder {
        ActitoBuilder {
            config,
            transport: None,
            storage_dir: None,
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn state(&self) -> LaunchState {
        self.context.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<LaunchState> {
        self.context.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.context.is_ready()
    }

    pub async fn configure(&self) -> Result<()> {
        self.launcher.configure().await
    }

    pub async fn launch(&self) -> Result<()> {
        self.launcher.launch().await
    }

    pub async fn unlaunch(&self) -> Result<()> {
        self.launcher.unlaunch().await
    }

    pub async fn execute_command(
        &self,
        component: &str,
        command: &str,
        data: Option<JsonValue>,
    ) -> Result<Option<JsonValue>> {
        self.launcher.execute_command(component, command, data).await
    }

    /// Sets the identity of the registered device.
    pub fn set_device(&self, device: Option<Device>) {
        self.context.set_device(device);
    }

    pub fn device(&self) -> Result<Device> {
        self.context.device()
    }

    pub fn set_session_id(&self, session_id: Option<String>) {
        self.context.set_session_id(session_id);
    }

    /// Application loaded during launch.
    pub fn application(&self) -> Result<Application> {
        self.context.application()
    }

    pub fn events(&self) -> &Events {
        &self.events
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    pub fn in_app_messaging(&self) -> &InAppMessaging {
        &self.in_app_messaging
    }

    /// Assets published for `group`, personalised for the device when one
    /// is set.
    pub async fn fetch_assets(&self, group: &str) -> Result<Vec<Asset>> {
        self.context.ensure_ready()?;
        let device = self.context.device().ok();
        self.context
            .client()
            .fetch_assets(group, device.as_ref())
            .await
    }

    pub async fn fetch_pass(&self, serial: &str) -> Result<Pass> {
        self.context.ensure_service(Application::SERVICE_LOYALTY)?;
        self.context.client().fetch_pass(serial).await
    }

    /// Notification delivered to the user inbox of the current device.
    pub async fn fetch_user_inbox_notification(
        &self,
        id: &str,
    ) -> Result<Notification> {
        self.context.ensure_ready()?;
        let device = self.context.device()?;
        self.context
            .client()
            .fetch_user_inbox_notification(id, &device.id)
            .await
    }
}
