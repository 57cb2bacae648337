//! Chrome DevTools Protocol backend
//!
//! [`BrowserSession`] launches or attaches to Chrome; [`TabDocument`] exposes a
//! tab as a [`Document`](crate::dom::Document).

pub mod config;
pub mod session;
pub mod tab;

pub use config::{ConnectionOptions, LaunchOptions};
pub use session::BrowserSession;
pub use tab::TabDocument;
