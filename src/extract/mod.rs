//! Job posting extraction
//!
//! [`ExtractionPipeline`] resolves each field of a [`FieldSchema`](crate::dom::FieldSchema)
//! with the element locator and text normalizer, producing an immutable [`JobRecord`].

pub mod pipeline;
pub mod record;

pub use pipeline::ExtractionPipeline;
pub use record::{JobRecord, canonical_url};
