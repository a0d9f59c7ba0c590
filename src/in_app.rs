use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    launch::LaunchComponent,
    models::{Application, InAppMessage},
    presentation::PresentationSlot,
    Context, Result,
};

/// In-app message lookup and single-message presentation.
#[derive(Debug)]
pub struct InAppMessaging {
    context: Arc<Context>,
    slot: PresentationSlot,
}

impl InAppMessaging {
    pub fn new(context: Arc<Context>) -> Self {
        Self {
            context,
            slot: PresentationSlot::new(),
        }
    }

    /// Fetches the message to show for an application context such as
    /// `launch` or `foreground`.
    pub async fn fetch_message(&self, context: &str) -> Result<InAppMessage> {
        self.context
            .ensure_service(Application::SERVICE_IN_APP_MESSAGING)?;
        let device = self.context.device()?;
        self.context
            .client()
            .fetch_in_app_message(context, &device.id)
            .await
    }

    /// Claims the screen for `message`. Fails while another message is
    /// presented.
    pub fn present(&self, message: &InAppMessage) -> Result<()> {
        self.slot.present(&message.id)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("presenting in-app message '{}'", message.name);

        Ok(())
    }

    pub fn dismiss(&self) -> Option<String> {
        self.slot.dismiss()
    }

    pub fn presented(&self) -> Option<String> {
        self.slot.current()
    }
}

#[async_trait]
impl LaunchComponent for InAppMessaging {
    fn name(&self) -> &str {
        "inAppMessaging"
    }

    async fn unlaunch(&self) -> Result<()> {
        self.slot.dismiss();
        Ok(())
    }
}
