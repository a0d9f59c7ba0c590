use std::sync::{PoisonError, RwLock};

use tokio::sync::watch;

use crate::{
    launch::LaunchState,
    models::{Application, Device},
    ActitoClient, ActitoError, Result,
};

/// State shared by the launcher and every peer module.
#[derive(Debug)]
pub struct Context {
    client: ActitoClient,
    state: watch::Sender<LaunchState>,
    application: RwLock<Option<Application>>,
    device: RwLock<Option<Device>>,
    session_id: RwLock<Option<String>>,
}

impl Context {
    pub fn new(client: ActitoClient) -> Self {
        let (state, _) = watch::channel(LaunchState::None);
        Self {
            client,
            state,
            application: RwLock::new(None),
            device: RwLock::new(None),
            session_id: RwLock::new(None),
        }
    }

    pub fn client(&self) -> &ActitoClient {
        &self.client
    }

    pub fn state(&self) -> LaunchState {
        *self.state.borrow()
    }

    /// Receives every launch state transition.
    pub fn subscribe(&self) -> watch::Receiver<LaunchState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: LaunchState) {
        let previous = self.state.send_replace(state);

        #[cfg(feature = "tracing")]
        if previous != state {
            tracing::debug!("launch state {previous:?} -> {state:?}");
        }
        #[cfg(not(feature = "tracing"))]
        let _ = previous;
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LaunchState::Ready
    }

    pub fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(ActitoError::NotReady)
        }
    }

    pub fn application(&self) -> Result<Application> {
        self.application
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ActitoError::ApplicationUnavailable)
    }

    pub(crate) fn set_application(&self, application: Option<Application>) {
        *self
            .application
            .write()
            .unwrap_or_else(PoisonError::into_inner) = application;
    }

    /// Requires a launched SDK whose application has `service` enabled.
    pub fn ensure_service(&self, service: &str) -> Result<Application> {
        self.ensure_ready()?;
        let application = self.application()?;
        if !application.has_service(service) {
            return Err(ActitoError::ServiceUnavailable(service.to_owned()));
        }
        Ok(application)
    }

    pub fn device(&self) -> Result<Device> {
        self.device
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ActitoError::DeviceUnavailable)
    }

    pub fn set_device(&self, device: Option<Device>) {
        *self.device.write().unwrap_or_else(PoisonError::into_inner) = device;
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_session_id(&self, session_id: Option<String>) {
        *self
            .session_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = session_id;
    }
}
