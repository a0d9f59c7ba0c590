use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub button: Option<AssetButton>,
    #[serde(default)]
    pub meta_data: Option<AssetMetaData>,
    #[serde(default)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetButton {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetaData {
    pub original_file_name: String,
    pub content_type: String,
    pub content_length: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub major: i32,
    #[serde(default)]
    pub minor: Option<i32>,
    #[serde(default)]
    pub triggers: bool,
    #[serde(default)]
    pub proximity: Proximity,
}

/// Last ranged distance to a beacon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proximity {
    #[default]
    Unknown,
    Immediate,
    Near,
    Far,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pass {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<PassType>,
    pub version: i32,
    #[serde(default)]
    pub passbook: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    pub serial: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub data: Map<String, JsonValue>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub google_pay_save_link: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PassType {
    Boarding,
    Coupon,
    Ticket,
    Generic,
    Card,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub partial: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    pub message: String,
    #[serde(default)]
    pub content: Vec<NotificationContent>,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
    #[serde(default)]
    pub attachments: Vec<NotificationAttachment>,
    #[serde(default)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: JsonValue,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub keyboard: bool,
    #[serde(default)]
    pub camera: bool,
    #[serde(default)]
    pub destructive: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAttachment {
    pub mime_type: String,
    pub uri: String,
}

/// A notification as kept in the local inbox.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboxItem {
    pub id: String,
    pub notification: Notification,
    pub time: DateTime<Utc>,
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

impl InboxItem {
    /// An item whose expiry is at or before `now` is expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    /// Visible and not expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.visible && !self.is_expired(now)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InAppMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub landscape_image: Option<String>,
    #[serde(default)]
    pub delay_seconds: i32,
    #[serde(default)]
    pub primary_action: Option<InAppMessageAction>,
    #[serde(default)]
    pub secondary_action: Option<InAppMessageAction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InAppMessageAction {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub destructive: bool,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub services: BTreeMap<String, bool>,
    #[serde(default)]
    pub inbox_config: Option<InboxConfig>,
}

impl Application {
    pub const SERVICE_INBOX: &'static str = "inbox";
    pub const SERVICE_LOYALTY: &'static str = "passbook";
    pub const SERVICE_IN_APP_MESSAGING: &'static str = "inAppMessaging";

    pub fn has_service(&self, name: &str) -> bool {
        self.services.get(name).copied().unwrap_or(false)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxConfig {
    #[serde(default)]
    pub use_inbox: bool,
    #[serde(default)]
    pub use_user_inbox: bool,
    #[serde(default)]
    pub auto_badge: bool,
}

/// Identity of the registered device. Registration itself happens outside
/// this crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

impl Device {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: None,
            user_name: None,
        }
    }
}
