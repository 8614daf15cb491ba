//! # postsync-renderer
//!
//! Renders Postfix `main.cf` from a [`postsync_core::SyncSnapshot`] with tera.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use postsync_core::SyncSnapshot;
//! use postsync_renderer::TemplateEngine;
//!
//! fn main_cf(snapshot: &SyncSnapshot) -> Result<String, postsync_renderer::RenderError> {
//!     TemplateEngine::new(None)?.render_snapshot(snapshot)
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::MainCfContext;
pub use engine::{TemplateEngine, MAIN_CF_TEMPLATE};
pub use error::RenderError;
