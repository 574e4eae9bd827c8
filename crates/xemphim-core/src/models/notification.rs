use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A push notification as recorded by the backend for this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub category_slug: Option<String>,
    #[serde(default)]
    pub product_slug: Option<String>,
    #[serde(default)]
    pub episode_number: Option<u32>,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

/// Where tapping a notification should lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTarget {
    Episode(String),
    Series(String),
}

impl Notification {
    /// Episode takes precedence over series.
    pub fn target(&self) -> Option<NotificationTarget> {
        if let Some(slug) = self.product_slug.as_deref().filter(|s| !s.is_empty()) {
            return Some(NotificationTarget::Episode(slug.to_string()));
        }
        self.category_slug
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| NotificationTarget::Series(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u32,
    pub pages: u32,
}

/// One page of the device's notification history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPage {
    pub data: Vec<Notification>,
    pub pagination: Pagination,
}

impl NotificationPage {
    pub fn next_page(&self) -> Option<u32> {
        (self.pagination.page < self.pagination.pages).then_some(self.pagination.page + 1)
    }
}
