//! Document access and element lookup
//!
//! This module defines the page abstraction the automation layer works
//! against. It includes:
//! - Document: backend-neutral page access (query, click, mutation feed)
//! - ElementNode: snapshot of a located element
//! - SelectorSet / FieldSchema: priority-ordered selector configuration
//! - locator / text: first-match lookup and whitespace normalization
//! - HtmlDocument: in-memory backend built on `scraper`

pub mod element;
pub mod html;
pub mod locator;
pub mod selector_set;
pub mod text;

pub use element::{BoundingBox, ElementNode};
pub use html::HtmlDocument;
pub use locator::{locate, locate_all};
pub use selector_set::{FieldSchema, FieldSpec, SelectorSet};
pub use text::{normalize_text, normalize_whitespace};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// One batch of child-list mutations observed under a root.
///
/// `seq` increases with every batch; attribute and character-data changes
/// never produce a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationBatch {
    pub seq: u64,
    pub added: usize,
    pub removed: usize,
}

/// A live page that elements can be located in and clicked
#[async_trait]
pub trait Document: Send + Sync {
    /// First element matching `selector` in document order.
    ///
    /// An unparseable selector is an [`InvalidSelector`](crate::BrowserError::InvalidSelector) error.
    async fn query_first(&self, selector: &str) -> Result<Option<ElementNode>>;

    /// Every element matching `selector`, in document order
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementNode>>;

    /// Click the element a snapshot was taken from
    async fn click(&self, element: &ElementNode) -> Result<()>;

    /// Current page URL
    async fn url(&self) -> Result<String>;

    /// Subscribe to child-list mutations under the first element matching `root`
    async fn subscribe(&self, root: &str) -> Result<watch::Receiver<MutationBatch>>;
}
