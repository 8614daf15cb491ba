//! The store contract the rest of the workspace programs against.

use std::num::NonZeroU32;

use async_trait::async_trait;

use postsync_core::{
    DomainOwner, DomainRecord, NewRelay, RelayId, RelayRecord, RelayUpdate, UserId, UserRecord,
};

use crate::error::StoreError;

/// Persistent store of users, relays and domains.
///
/// Implementations must be safe to share across concurrently running
/// emitters; every method takes `&self`.
#[async_trait]
pub trait Repository: Send + Sync {
    // -- users --------------------------------------------------------------

    /// Create-or-update on sign-in.
    ///
    /// A new user is created when `external_id` is unknown; the first user
    /// ever created is made admin. An existing user whose display name
    /// changed upstream gets the new name.
    async fn get_user_by_external_id(
        &self,
        external_id: &str,
        display_name: &str,
    ) -> Result<UserRecord, StoreError>;

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError>;

    /// All users ordered by id.
    async fn get_all_users(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Returns the number of rows changed.
    async fn set_admin(&self, id: UserId, admin: bool) -> Result<u64, StoreError>;

    /// Returns the number of rows changed.
    async fn set_display_name(&self, id: UserId, display_name: &str) -> Result<u64, StoreError>;

    // -- relays -------------------------------------------------------------

    /// Every relay ordered by id. Inactive relays only with `include_disabled`.
    async fn get_all_relays(&self, include_disabled: bool) -> Result<Vec<RelayRecord>, StoreError>;

    /// One cursor page: relays with `id > after`, ascending, at most
    /// `page_size`. With `include_disabled == false`, disabled and
    /// soft-deleted relays are left out of the page entirely. An empty page
    /// means there is nothing past `after`.
    async fn get_relays(
        &self,
        include_disabled: bool,
        after: RelayId,
        page_size: NonZeroU32,
    ) -> Result<Vec<RelayRecord>, StoreError>;

    /// Lookup among non-deleted relays.
    async fn get_relay_by_alias(&self, alias: &str) -> Result<Option<RelayRecord>, StoreError>;

    /// Insert and return the stored record. Fails with
    /// [`StoreError::Conflict`] when a non-deleted relay already uses the alias.
    async fn create_relay(&self, relay: NewRelay) -> Result<RelayRecord, StoreError>;

    /// Apply the present fields. Returns the number of rows changed.
    async fn update_relay(&self, update: RelayUpdate) -> Result<u64, StoreError>;

    /// Soft delete. Returns the number of rows changed.
    async fn delete_relay(&self, id: RelayId) -> Result<u64, StoreError>;

    /// Non-deleted relays owned by `user`, ordered by id.
    async fn get_users_relays(&self, user: UserId) -> Result<Vec<RelayRecord>, StoreError>;

    // -- domains ------------------------------------------------------------

    /// Shared domains plus the ones owned by `user`, ordered by name.
    async fn get_my_domains(&self, user: UserId) -> Result<Vec<DomainRecord>, StoreError>;

    /// Every domain ordered by name.
    async fn get_all_domains(&self) -> Result<Vec<DomainRecord>, StoreError>;

    async fn create_domain(
        &self,
        name: &str,
        owner: DomainOwner,
    ) -> Result<DomainRecord, StoreError>;

    /// Returns the number of rows removed.
    async fn delete_domain(&self, name: &str) -> Result<u64, StoreError>;

    // -- lifecycle ----------------------------------------------------------

    /// Release connections. Further calls may fail.
    async fn close(&self);
}
