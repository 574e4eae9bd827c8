use serde::Deserialize;

use xemphim_core::models::{CatalogPage, CategorySummary};

use crate::error::ApiError;

/// `{ "data": ... }` wrapper used by catalog endpoints.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub unread_count: u32,
}

fn default_success() -> bool {
    true
}

impl UnreadCountResponse {
    /// The count, or an error when the backend flagged the request as failed.
    pub fn into_count(self, status: u16) -> Result<u32, ApiError> {
        if self.success {
            Ok(self.unread_count)
        } else {
            Err(ApiError::Api {
                status,
                message: "unread count request reported failure".into(),
            })
        }
    }
}

/// `GET /category/latest/next` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestResponse {
    pub data: Envelope<Vec<CategorySummary>>,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_count: u32,
}

impl From<LatestResponse> for CatalogPage {
    fn from(resp: LatestResponse) -> Self {
        Self {
            series: resp.data.data,
            page: resp.current_page.max(1),
            pages: resp.total_pages,
            total: resp.total_count,
        }
    }
}
