//! In-memory repository.
//!
//! Same semantics as the SQL backend, backed by ordered maps behind a tokio
//! `RwLock`. Used by tests and for seeding fixture data.

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use async_trait::async_trait;
use tokio::sync::RwLock;

use postsync_core::{
    DomainOwner, DomainRecord, NewRelay, RelayId, RelayRecord, RelayUpdate, UserId, UserRecord,
};

use crate::error::StoreError;
use crate::repository::Repository;

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<UserId, UserRecord>,
    relays: BTreeMap<RelayId, RelayRecord>,
    domains: BTreeMap<String, DomainRecord>,
    last_user_id: i64,
    last_relay_id: i64,
}

impl State {
    fn alias_taken(&self, alias: &str, except: Option<RelayId>) -> bool {
        self.relays
            .values()
            .any(|r| !r.deleted && r.alias == alias && Some(r.id) != except)
    }
}

/// Repository held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with relays whose ids are kept as given.
    ///
    /// Later inserts continue after the highest seeded id.
    pub fn with_relays(relays: impl IntoIterator<Item = RelayRecord>) -> Self {
        let mut state = State::default();
        for relay in relays {
            state.last_relay_id = state.last_relay_id.max(relay.id.0);
            state.relays.insert(relay.id, relay);
        }
        Self {
            state: RwLock::new(state),
        }
    }
}

fn visible(relay: &RelayRecord, include_disabled: bool) -> bool {
    include_disabled || relay.is_active()
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user_by_external_id(
        &self,
        external_id: &str,
        display_name: &str,
    ) -> Result<UserRecord, StoreError> {
        let mut state = self.state.write().await;
        if let Some(user) = state
            .users
            .values_mut()
            .find(|u| u.external_id == external_id)
        {
            if user.display_name != display_name {
                user.display_name = display_name.to_string();
            }
            return Ok(user.clone());
        }

        state.last_user_id += 1;
        let user = UserRecord {
            id: UserId(state.last_user_id),
            external_id: external_id.to_string(),
            display_name: display_name.to_string(),
            admin: state.last_user_id == 1,
        };
        if user.admin {
            tracing::info!(user = %user.id, "first user created, granting admin");
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_all_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.state.read().await.users.values().cloned().collect())
    }

    async fn set_admin(&self, id: UserId, admin: bool) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        Ok(match state.users.get_mut(&id) {
            Some(user) => {
                user.admin = admin;
                1
            }
            None => 0,
        })
    }

    async fn set_display_name(&self, id: UserId, display_name: &str) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        Ok(match state.users.get_mut(&id) {
            Some(user) => {
                user.display_name = display_name.to_string();
                1
            }
            None => 0,
        })
    }

    async fn get_all_relays(&self, include_disabled: bool) -> Result<Vec<RelayRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .relays
            .values()
            .filter(|r| visible(r, include_disabled))
            .cloned()
            .collect())
    }

    async fn get_relays(
        &self,
        include_disabled: bool,
        after: RelayId,
        page_size: NonZeroU32,
    ) -> Result<Vec<RelayRecord>, StoreError> {
        let state = self.state.read().await;
        let mut page = Vec::new();
        for relay in state.relays.range(RelayId(after.0.saturating_add(1))..).map(|(_, r)| r) {
            if page.len() >= page_size.get() as usize {
                break;
            }
            if visible(relay, include_disabled) {
                page.push(relay.clone());
            }
        }
        Ok(page)
    }

    async fn get_relay_by_alias(&self, alias: &str) -> Result<Option<RelayRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .relays
            .values()
            .find(|r| !r.deleted && r.alias == alias)
            .cloned())
    }

    async fn create_relay(&self, relay: NewRelay) -> Result<RelayRecord, StoreError> {
        let mut state = self.state.write().await;
        if state.alias_taken(&relay.alias, None) {
            return Err(StoreError::Conflict {
                what: format!("alias '{}' already exists", relay.alias),
            });
        }
        state.last_relay_id += 1;
        let record = RelayRecord {
            id: RelayId(state.last_relay_id),
            user: relay.user,
            description: relay.description,
            enabled: relay.enabled,
            deleted: false,
            alias: relay.alias,
            destination: relay.destination,
            whitelist: relay.whitelist,
        };
        state.relays.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_relay(&self, update: RelayUpdate) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        // The record as it would look afterwards must not collide while live.
        if let Some(current) = state.relays.get(&update.id) {
            let alias = update.alias.as_deref().unwrap_or(&current.alias);
            let deleted = update.deleted.unwrap_or(current.deleted);
            if !deleted && state.alias_taken(alias, Some(update.id)) {
                return Err(StoreError::Conflict {
                    what: format!("alias '{alias}' already exists"),
                });
            }
        }
        Ok(match state.relays.get_mut(&update.id) {
            Some(relay) => {
                update.apply_to(relay);
                1
            }
            None => 0,
        })
    }

    async fn delete_relay(&self, id: RelayId) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        Ok(match state.relays.get_mut(&id) {
            Some(relay) if !relay.deleted => {
                relay.deleted = true;
                1
            }
            _ => 0,
        })
    }

    async fn get_users_relays(&self, user: UserId) -> Result<Vec<RelayRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .relays
            .values()
            .filter(|r| !r.deleted && r.user == Some(user))
            .cloned()
            .collect())
    }

    async fn get_my_domains(&self, user: UserId) -> Result<Vec<DomainRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .domains
            .values()
            .filter(|d| d.visible_to(user))
            .cloned()
            .collect())
    }

    async fn get_all_domains(&self) -> Result<Vec<DomainRecord>, StoreError> {
        Ok(self.state.read().await.domains.values().cloned().collect())
    }

    async fn create_domain(
        &self,
        name: &str,
        owner: DomainOwner,
    ) -> Result<DomainRecord, StoreError> {
        let mut state = self.state.write().await;
        if state.domains.contains_key(name) {
            return Err(StoreError::Conflict {
                what: format!("domain '{name}' already exists"),
            });
        }
        let record = DomainRecord {
            name: name.to_string(),
            owner,
        };
        state.domains.insert(record.name.clone(), record.clone());
        Ok(record)
    }

    async fn delete_domain(&self, name: &str) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.domains.remove(name).map_or(0, |_| 1))
    }

    async fn close(&self) {}
}
