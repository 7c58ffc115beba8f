//! Catalog items: purchasable audiobooks aggregating one or more audio units.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Tags kept per item after summarization
pub const MAX_TAGS: usize = 3;

/// A purchasable audiobook entity.
///
/// `description` and `tags` are derived data: the summarization pipeline
/// overwrites them wholesale, with no merge semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Unique identifier
    pub id: Uuid,

    /// Title shown in the store
    pub title: String,

    /// Author name
    pub author: String,

    /// Price in the store currency
    pub price: f64,

    /// Free-text description (filled by the summarization pipeline or by
    /// direct edit)
    pub description: String,

    /// Comma-separated tag list
    pub tags: String,

    /// Cover image locator
    pub cover_url: String,

    /// When the item was created
    pub created_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Split the comma-separated tag field into individual tags
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Overwrite description and tags from a summarization result.
    ///
    /// The summary is trimmed and at most [`MAX_TAGS`] tags are kept,
    /// joined with ", ".
    pub fn apply_summary(&mut self, summary: &str, tags: &[String]) {
        self.description = summary.trim().to_string();
        self.tags = tags
            .iter()
            .take(MAX_TAGS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
    }
}

/// Rejected creation request
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// A catalog item creation request, validated before anything is persisted.
#[derive(Debug, Clone, Default)]
pub struct NewCatalogItem {
    pub title: String,
    pub author: String,
    pub price: Option<f64>,
    pub cover_url: String,
}

impl NewCatalogItem {
    /// Validate the request and build the catalog row.
    ///
    /// Title, author, price and cover are all required; a request missing
    /// any of them is rejected synchronously and no task is ever enqueued
    /// for it.
    pub fn build(self) -> Result<CatalogItem, ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if self.author.trim().is_empty() {
            return Err(ValidationError::MissingField("author"));
        }
        let price = self.price.ok_or(ValidationError::MissingField("price"))?;
        if self.cover_url.trim().is_empty() {
            return Err(ValidationError::MissingField("cover_url"));
        }

        Ok(CatalogItem {
            id: Uuid::new_v4(),
            title: self.title,
            author: self.author,
            price,
            description: String::new(),
            tags: String::new(),
            cover_url: self.cover_url,
            created_at: Utc::now(),
        })
    }
}
