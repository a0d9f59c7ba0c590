//! Maps notification and action types to the way they are presented.

use std::sync::{Mutex, PoisonError};

use crate::{ActitoError, Result};

const NOTIFICATION_PREFIX: &str = "re.notifica.notification.";
const ACTION_PREFIX: &str = "re.notifica.action.";

/// How a notification's content is shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    None,
    Alert,
    InAppBrowser,
    WebView,
    Url,
    UrlResolver,
    UrlScheme,
    Image,
    Video,
    Map,
    Rate,
    Passbook,
    Store,
}

impl NotificationKind {
    /// Parses a `re.notifica.notification.*` type. Unknown types map to
    /// [`NotificationKind::None`].
    pub fn from_type(value: &str) -> Self {
        match value.strip_prefix(NOTIFICATION_PREFIX).unwrap_or("") {
            "Alert" => Self::Alert,
            "InAppBrowser" => Self::InAppBrowser,
            "WebView" => Self::WebView,
            "URL" => Self::Url,
            "URLResolver" => Self::UrlResolver,
            "URLScheme" => Self::UrlScheme,
            "Image" => Self::Image,
            "Video" => Self::Video,
            "Map" => Self::Map,
            "Rate" => Self::Rate,
            "Passbook" => Self::Passbook,
            "Store" => Self::Store,
            _ => Self::None,
        }
    }

    /// Whether presenting needs a view controller of its own, as opposed to
    /// handing off to the system or doing nothing.
    pub fn requires_view(self) -> bool {
        !matches!(
            self,
            Self::None | Self::Url | Self::UrlScheme | Self::InAppBrowser | Self::Rate
        )
    }
}

/// What happens when a notification action is tapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    App,
    Browser,
    Callback,
    Custom,
    InAppBrowser,
    Mail,
    Sms,
    Telephone,
    /// Unrecognised action type.
    None,
}

impl ActionKind {
    pub fn from_type(value: &str) -> Self {
        match value.strip_prefix(ACTION_PREFIX).unwrap_or("") {
            "App" => Self::App,
            "Browser" => Self::Browser,
            "Callback" => Self::Callback,
            "Custom" => Self::Custom,
            "InAppBrowser" => Self::InAppBrowser,
            "Mail" => Self::Mail,
            "SMS" => Self::Sms,
            "Telephone" => Self::Telephone,
            _ => Self::None,
        }
    }

    /// Callback actions may collect a message or a photo before firing.
    pub fn accepts_input(self) -> bool {
        self == Self::Callback
    }
}

/// Holds the id of the in-app message currently on screen.
///
/// A second presentation is rejected rather than queued.
#[derive(Debug, Default)]
pub struct PresentationSlot {
    current: Mutex<Option<String>>,
}

impl PresentationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn present(&self, message_id: &str) -> Result<()> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(presented) = current.as_deref() {
            return Err(ActitoError::AlreadyPresenting(presented.to_owned()));
        }
        *current = Some(message_id.to_owned());
        Ok(())
    }

    /// Frees the slot. Returns the id that was presented.
    pub fn dismiss(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn current(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
