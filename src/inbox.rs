//! Device inbox: a local cache of inbox items kept in sync with the API.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};

use crate::{
    launch::LaunchComponent,
    models::{Application, InboxItem, Notification},
    store::{Database, Entity},
    ActitoError, Context, Result,
};

/// File name of the inbox database.
pub const INBOX_DATABASE: &str = "NotificareInboxDatabase";

impl Entity for InboxItem {
    type Key = String;
    const SCHEMA_VERSION: u32 = 1;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Local store of inbox items.
#[derive(Clone, Debug)]
pub struct InboxCache {
    db: Database<InboxItem>,
}

impl InboxCache {
    pub async fn open(dir: Option<&Path>) -> Result<Self> {
        Ok(Self {
            db: Database::open(INBOX_DATABASE, dir).await?,
        })
    }

    pub async fn add(&self, item: InboxItem) -> Result<()> {
        self.db.insert(item).await
    }

    /// Every stored item, expired and hidden ones included.
    pub async fn items(&self) -> Result<Vec<InboxItem>> {
        self.db.fetch_all().await
    }

    pub async fn find(&self, id: &str) -> Result<Option<InboxItem>> {
        self.db.find(id.to_owned()).await
    }

    /// Visible, unexpired items, newest first.
    pub async fn active(&self, now: DateTime<Utc>) -> Result<Vec<InboxItem>> {
        let mut items: Vec<InboxItem> = self
            .db
            .fetch_all()
            .await?
            .into_iter()
            .filter(|item| item.is_active(now))
            .collect();
        items.sort_by(|a, b| b.time.cmp(&a.time));
        Ok(items)
    }

    /// Number of active items not opened yet.
    pub async fn badge(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self
            .active(now)
            .await?
            .iter()
            .filter(|item| !item.opened)
            .count())
    }

    /// Returns whether the item was found.
    pub async fn mark_opened(&self, id: &str) -> Result<bool> {
        let changed = self
            .db
            .modify(id.to_owned(), |item| item.opened = true)
            .await?;
        Ok(changed > 0)
    }

    pub async fn mark_all_opened(&self) -> Result<()> {
        self.db.modify_all(|item| item.opened = true).await.map(|_| ())
    }

    /// Replaces the stored notification, e.g. once a partial one is loaded.
    pub async fn set_notification(&self, id: &str, notification: Notification) -> Result<()> {
        self.db
            .modify(id.to_owned(), move |item| {
                item.notification = notification.clone()
            })
            .await
            .map(|_| ())
    }

    /// Removes an item. Unknown ids are a no-op.
    pub async fn remove(&self, id: &str) -> Result<()> {
        self.db.remove(id.to_owned()).await.map(|_| ())
    }

    pub async fn replace_all(&self, items: Vec<InboxItem>) -> Result<()> {
        self.db.replace_all(items).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.db.clear().await
    }

    /// Drops expired items and returns how many were dropped.
    pub async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        self.db.retain(move |item| !item.is_expired(now)).await
    }
}

/// Inbox operations for the registered device.
#[derive(Debug)]
pub struct Inbox {
    context: Arc<Context>,
    cache: InboxCache,
}

impl Inbox {
    pub fn new(context: Arc<Context>, cache: InboxCache) -> Self {
        Self { context, cache }
    }

    pub fn cache(&self) -> &InboxCache {
        &self.cache
    }

    /// Active items, newest first.
    pub async fn items(&self) -> Result<Vec<InboxItem>> {
        self.ensure_inbox()?;
        self.cache.active(Utc::now()).await
    }

    pub async fn badge(&self) -> Result<usize> {
        self.ensure_inbox()?;
        self.cache.badge(Utc::now()).await
    }

    /// Replaces the local cache with the items on the server.
    pub async fn refresh(&self) -> Result<()> {
        self.ensure_inbox()?;
        let device = self.context.device()?;
        let items = self.context.client().fetch_inbox(&device.id).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!("inbox refreshed with {} items", items.len());

        self.cache.replace_all(items).await
    }

    /// Loads the full notification for an item and marks it opened.
    pub async fn open(&self, id: &str) -> Result<Notification> {
        self.ensure_inbox()?;
        let item = self.find(id).await?;

        let notification = if item.notification.partial {
            let notification = self
                .context
                .client()
                .fetch_notification(&item.notification.id)
                .await?;
            self.cache.set_notification(id, notification.clone()).await?;
            notification
        } else {
            item.notification
        };

        if !item.opened {
            self.mark_as_read(id).await?;
        }
        Ok(notification)
    }

    pub async fn mark_as_read(&self, id: &str) -> Result<()> {
        self.ensure_inbox()?;
        self.context.client().mark_inbox_item_opened(id).await?;
        self.cache.mark_opened(id).await.map(|_| ())
    }

    pub async fn mark_all_as_read(&self) -> Result<()> {
        self.ensure_inbox()?;
        let device = self.context.device()?;
        self.context
            .client()
            .mark_all_inbox_items_opened(&device.id)
            .await?;
        self.cache.mark_all_opened().await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        self.ensure_inbox()?;
        self.context.client().remove_inbox_item(id).await?;
        self.cache.remove(id).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.ensure_inbox()?;
        let device = self.context.device()?;
        self.context.client().clear_inbox(&device.id).await?;
        self.cache.clear().await
    }

    async fn find(&self, id: &str) -> Result<InboxItem> {
        self.cache
            .find(id)
            .await?
            .ok_or_else(|| ActitoError::InvalidArgument(format!("unknown inbox item '{id}'")))
    }

    fn ensure_inbox(&self) -> Result<Application> {
        let application = self.context.ensure_service(Application::SERVICE_INBOX)?;
        let enabled = application
            .inbox_config
            .map_or(true, |config| config.use_inbox);
        if !enabled {
            return Err(ActitoError::ServiceUnavailable(
                Application::SERVICE_INBOX.to_owned(),
            ));
        }
        Ok(application)
    }
}

#[async_trait]
impl LaunchComponent for Inbox {
    fn name(&self) -> &str {
        "inbox"
    }

    async fn launch(&self) -> Result<()> {
        let _removed = self.cache.remove_expired(Utc::now()).await?;

        #[cfg(feature = "tracing")]
        if _removed > 0 {
            tracing::debug!("purged {_removed} expired inbox items");
        }

        Ok(())
    }

    async fn clear_storage(&self) -> Result<()> {
        self.cache.clear().await
    }

    async fn execute_command(
        &self,
        command: &str,
        _data: Option<JsonValue>,
    ) -> Result<Option<JsonValue>> {
        match command {
            "refresh" => {
                self.refresh().await?;
                Ok(None)
            }
            "badge" => Ok(Some(json!(self.badge().await?))),
            other => Err(ActitoError::InvalidArgument(format!(
                "unknown inbox command '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::Map;

    use super::InboxCache;
    use crate::models::{InboxItem, Notification};

    fn item(id: &str, time: DateTime<Utc>, expires: Option<DateTime<Utc>>) -> InboxItem {
        InboxItem {
            id: id.to_owned(),
            notification: Notification {
                id: format!("n-{id}"),
                partial: true,
                kind: "re.notifica.notification.Alert".to_owned(),
                time,
                title: None,
                subtitle: None,
                message: format!("message {id}"),
                content: vec![],
                actions: vec![],
                attachments: vec![],
                extra: Map::new(),
            },
            time,
            opened: false,
            visible: true,
            expires,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn active_excludes_expired_and_hidden_items() {
        let cache = InboxCache::open(None).await.expect("open");
        let now = now();
        let mut hidden = item("hidden", now - Duration::hours(1), None);
        hidden.visible = false;

        cache
            .replace_all(vec![
                item("older", now - Duration::hours(2), None),
                item("expired-now", now - Duration::hours(1), Some(now)),
                item("expired", now - Duration::hours(3), Some(now - Duration::minutes(1))),
                item("newer", now - Duration::minutes(5), Some(now + Duration::days(1))),
                hidden,
            ])
            .await
            .expect("replace");

        let ids: Vec<String> = cache
            .active(now)
            .await
            .expect("active")
            .into_iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec!["newer".to_owned(), "older".to_owned()]);
    }

    #[tokio::test]
    async fn badge_counts_unopened_active_items() {
        let cache = InboxCache::open(None).await.expect("open");
        let now = now();
        cache.add(item("a", now, None)).await.expect("add");
        cache.add(item("b", now, None)).await.expect("add");
        cache
            .add(item("c", now, Some(now - Duration::seconds(1))))
            .await
            .expect("add");

        assert_eq!(cache.badge(now).await.expect("badge"), 2);
        assert!(cache.mark_opened("a").await.expect("mark"));
        assert!(!cache.mark_opened("missing").await.expect("mark"));
        assert_eq!(cache.badge(now).await.expect("badge"), 1);

        cache.mark_all_opened().await.expect("mark all");
        assert_eq!(cache.badge(now).await.expect("badge"), 0);
    }

    #[tokio::test]
    async fn removing_unknown_item_is_a_no_op() {
        let cache = InboxCache::open(None).await.expect("open");
        cache.add(item("a", now(), None)).await.expect("add");

        cache.remove("does-not-exist").await.expect("no-op");
        cache.remove("a").await.expect("remove");
        cache.remove("a").await.expect("second remove is a no-op");
        assert!(cache.items().await.expect("items").is_empty());
    }

    #[tokio::test]
    async fn remove_expired_purges_only_expired() {
        let cache = InboxCache::open(None).await.expect("open");
        let now = now();
        cache
            .replace_all(vec![
                item("live", now, None),
                item("gone", now, Some(now - Duration::days(1))),
            ])
            .await
            .expect("replace");

        assert_eq!(cache.remove_expired(now).await.expect("purge"), 1);
        assert_eq!(cache.items().await.expect("items").len(), 1);
    }
}
