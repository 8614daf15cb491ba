//! postsync core library: domain types, configuration, errors.
//!
//! - [`types`]: relay, domain and user records
//! - [`config`]: layered configuration (env > file > default)
//! - [`snapshot`]: the per-run [`SyncSnapshot`] handed to the synchronizer
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod snapshot;
pub mod types;

pub use config::AppConfig;
pub use error::ConfigError;
pub use snapshot::{ConnectionDescriptor, MainCfSettings, SyncSnapshot};
pub use types::{
    DomainOwner, DomainRecord, MapMode, NewRelay, RelayId, RelayRecord, RelayUpdate, UserId,
    UserRecord,
};
