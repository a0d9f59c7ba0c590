use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::{ActitoError, Context, Result};

/// Lifecycle of the SDK as driven by [`Launcher`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LaunchState {
    #[default]
    None,
    Configured,
    Launching,
    Ready,
}

/// Lifecycle hooks implemented by every peer module.
///
/// All hooks default to doing nothing.
#[async_trait]
pub trait LaunchComponent: Send + Sync {
    /// Name used to route [`LaunchComponent::execute_command`].
    fn name(&self) -> &str;

    /// Moves data left behind by older SDK versions.
    async fn migrate(&self) -> Result<()> {
        Ok(())
    }

    async fn configure(&self) -> Result<()> {
        Ok(())
    }

    async fn clear_storage(&self) -> Result<()> {
        Ok(())
    }

    async fn launch(&self) -> Result<()> {
        Ok(())
    }

    /// Runs once every component launched. Failures are logged, not fatal.
    async fn post_launch(&self) -> Result<()> {
        Ok(())
    }

    async fn unlaunch(&self) -> Result<()> {
        Ok(())
    }

    async fn execute_command(
        &self,
        _command: &str,
        _data: Option<JsonValue>,
    ) -> Result<Option<JsonValue>> {
        Ok(None)
    }
}

/// Drives registered components through the launch lifecycle.
pub struct Launcher {
    context: Arc<Context>,
    components: Vec<Arc<dyn LaunchComponent>>,
    lifecycle: Mutex<()>,
}

impl fmt::Debug for Launcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Launcher")
            .field("state", &self.context.state())
            .field(
                "components",
                &self.components.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Launcher {
    pub fn new(context: Arc<Context>) -> Self {
        Self {
            context,
            components: Vec::new(),
            lifecycle: Mutex::new(()),
        }
    }

    /// Registers a component. Components launch in registration order.
    pub fn register(&mut self, component: Arc<dyn LaunchComponent>) {
        self.components.push(component);
    }

    pub fn state(&self) -> LaunchState {
        self.context.state()
    }

    /// Migrates and configures every component.
    pub async fn configure(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if self.context.state() != LaunchState::None {
            #[cfg(feature = "tracing")]
            tracing::warn!("configure() ignored, already configured");
            return Ok(());
        }

        for component in &self.components {
            component.migrate().await?;
        }
        for component in &self.components {
            component.configure().await?;
        }

        self.context.set_state(LaunchState::Configured);
        Ok(())
    }

    /// Loads the application and launches every component.
    ///
    /// A failure at any step reverts to [`LaunchState::Configured`].
    pub async fn launch(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        match self.context.state() {
            LaunchState::None => return Err(ActitoError::NotConfigured),
            LaunchState::Ready => return Ok(()),
            LaunchState::Configured | LaunchState::Launching => {}
        }

        self.context.set_state(LaunchState::Launching);
        if let Err(err) = self.launch_components().await {
            #[cfg(feature = "tracing")]
            tracing::error!("launch failed: {err}");
            self.context.set_application(None);
            self.context.set_state(LaunchState::Configured);
            return Err(err);
        }
        self.context.set_state(LaunchState::Ready);

        for component in &self.components {
            if let Err(_err) = component.post_launch().await {
                #[cfg(feature = "tracing")]
                tracing::warn!("post-launch of '{}' failed: {_err}", component.name());
            }
        }

        Ok(())
    }

    async fn launch_components(&self) -> Result<()> {
        let application = self.context.client().fetch_application().await?;
        self.context.set_application(Some(application));

        for component in &self.components {
            component.launch().await?;
        }
        Ok(())
    }

    /// Unlaunches and wipes every component, last registered first.
    ///
    /// Teardown always runs to completion and leaves the SDK
    /// [`LaunchState::Configured`]. The first hook failure is returned.
    pub async fn unlaunch(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if self.context.state() != LaunchState::Ready {
            return Err(ActitoError::NotReady);
        }

        let mut first_error = None;
        for component in self.components.iter().rev() {
            if let Err(err) = component.unlaunch().await {
                #[cfg(feature = "tracing")]
                tracing::warn!("unlaunch of '{}' failed: {err}", component.name());
                first_error.get_or_insert(err);
            }
        }
        for component in self.components.iter().rev() {
            if let Err(err) = component.clear_storage().await {
                #[cfg(feature = "tracing")]
                tracing::warn!("clearing storage of '{}' failed: {err}", component.name());
                first_error.get_or_insert(err);
            }
        }

        self.context.set_application(None);
        self.context.set_state(LaunchState::Configured);
        first_error.map_or(Ok(()), Err)
    }

    /// Routes a command to the component registered under `component`.
    pub async fn execute_command(
        &self,
        component: &str,
        command: &str,
        data: Option<JsonValue>,
    ) -> Result<Option<JsonValue>> {
        let target = self
            .components
            .iter()
            .find(|candidate| candidate.name() == component)
            .ok_or_else(|| {
                ActitoError::InvalidArgument(format!("unknown component '{component}'"))
            })?;
        target.execute_command(command, data).await
    }
}
