use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::models::{
    Application, Asset, InAppMessage, InboxItem, Notification, NotificationAttachment, Pass,
};

#[derive(Debug, Deserialize)]
pub struct ApplicationResponse {
    pub application: Application,
}

#[derive(Debug, Deserialize)]
pub struct AssetsResponse {
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
pub struct PassResponse {
    pub pass: Pass,
}

#[derive(Debug, Deserialize)]
pub struct InAppMessageResponse {
    pub message: InAppMessage,
}

#[derive(Debug, Deserialize)]
pub struct NotificationResponse {
    pub notification: Notification,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxResponse {
    #[serde(default)]
    pub inbox_items: Vec<RemoteInboxItem>,
}

/// Inbox entry as listed by the API; carries only a partial notification.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteInboxItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub notification: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub attachment: Option<NotificationAttachment>,
    #[serde(default)]
    pub extra: Map<String, JsonValue>,
    #[serde(default)]
    pub opened: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

fn default_visible() -> bool {
    true
}

impl From<RemoteInboxItem> for InboxItem {
    fn from(remote: RemoteInboxItem) -> Self {
        Self {
            id: remote.id,
            notification: Notification {
                id: remote.notification,
                partial: true,
                kind: remote.kind,
                time: remote.time,
                title: remote.title,
                subtitle: remote.subtitle,
                message: remote.message,
                content: Vec::new(),
                actions: Vec::new(),
                attachments: remote.attachment.into_iter().collect(),
                extra: remote.extra,
            },
            time: remote.time,
            opened: remote.opened,
            visible: remote.visible,
            expires: remote.expires,
        }
    }
}

/// Body of `POST /event`.
#[derive(Debug, Serialize)]
pub struct EventPayload<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub timestamp: i64,
    #[serde(rename = "deviceID")]
    pub device_id: &'a str,
    #[serde(rename = "sessionID", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a str>,
    #[serde(rename = "notification", skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<&'a str>,
    #[serde(rename = "userID", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a JsonValue>,
}
