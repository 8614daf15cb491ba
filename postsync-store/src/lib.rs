//! # postsync-store
//!
//! The relay store behind the synchronizer.
//!
//! - [`Repository`]: async store contract (users, relays, domains)
//! - [`SqlRepository`]: sqlx `Any` backend for `mysql:` and `sqlite:` URIs
//! - [`MemoryRepository`]: in-process backend with the same semantics
//! - [`RelayCursor`]: bounded-page iteration over relays by ascending id

pub mod cursor;
pub mod error;
pub mod memory;
pub mod repository;
pub mod sql;

pub use cursor::{RelayCursor, RelayPageSource};
pub use error::StoreError;
pub use memory::MemoryRepository;
pub use repository::Repository;
pub use sql::{Dialect, SqlRepository};
