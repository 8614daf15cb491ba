//! SQL repository over a sqlx `Any` pool.
//!
//! The backend is picked from the URI scheme, so the same code serves a
//! MySQL deployment (the database Postfix queries in live mode) and
//! a local sqlite file. Only `?` placeholders are used, which both accept.
//!
//! Integers are read as `i64` and booleans are stored as `0`/`1` integers:
//! the `Any` driver maps column types per backend and integer decoding is
//! the one conversion every backend agrees on.

use std::num::NonZeroU32;

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::AnyPool;
use sqlx::Row;

use postsync_core::{
    DomainOwner, DomainRecord, NewRelay, RelayId, RelayRecord, RelayUpdate, UserId, UserRecord,
};

use crate::error::StoreError;
use crate::repository::Repository;

const RELAY_COLUMNS: &str =
    "id, user_id, description, enabled, deleted, alias, destination, whitelist";

const SELECT_PAGE_ALL: &str = "SELECT id, user_id, description, enabled, deleted, alias, destination, whitelist \
     FROM relays WHERE id > ? ORDER BY id ASC LIMIT ?";

const SELECT_PAGE_ACTIVE: &str = "SELECT id, user_id, description, enabled, deleted, alias, destination, whitelist \
     FROM relays WHERE id > ? AND enabled = 1 AND deleted = 0 ORDER BY id ASC LIMIT ?";

/// SQL dialect, derived from the URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    MySql,
}

impl Dialect {
    pub fn from_uri(uri: &str) -> Result<Self, StoreError> {
        let scheme = uri.split(':').next().unwrap_or_default().to_ascii_lowercase();
        match scheme.as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "mysql" => Ok(Dialect::MySql),
            _ => Err(StoreError::UnsupportedScheme { scheme }),
        }
    }

    fn schema(&self) -> &'static [&'static str] {
        match self {
            Dialect::Sqlite => &[
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    external_id VARCHAR(128) NOT NULL UNIQUE,
                    display_name VARCHAR(255) NOT NULL DEFAULT '',
                    admin INTEGER NOT NULL DEFAULT 0
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS relays (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NULL REFERENCES users(id),
                    description TEXT NOT NULL DEFAULT '',
                    enabled INTEGER NOT NULL DEFAULT 1,
                    deleted INTEGER NOT NULL DEFAULT 0,
                    alias VARCHAR(128) NOT NULL,
                    destination VARCHAR(128) NOT NULL,
                    whitelist TEXT NOT NULL DEFAULT '[]'
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_relays_alias ON relays(alias)",
                r#"
                CREATE TABLE IF NOT EXISTS domains (
                    name VARCHAR(255) PRIMARY KEY,
                    owner INTEGER NOT NULL DEFAULT -1
                )
                "#,
            ],
            Dialect::MySql => &[
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id BIGINT PRIMARY KEY AUTO_INCREMENT,
                    external_id VARCHAR(128) NOT NULL UNIQUE,
                    display_name VARCHAR(255) NOT NULL DEFAULT '',
                    admin INTEGER NOT NULL DEFAULT 0
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS relays (
                    id BIGINT PRIMARY KEY AUTO_INCREMENT,
                    user_id BIGINT NULL,
                    description TEXT NOT NULL,
                    enabled INTEGER NOT NULL DEFAULT 1,
                    deleted INTEGER NOT NULL DEFAULT 0,
                    alias VARCHAR(128) NOT NULL,
                    destination VARCHAR(128) NOT NULL,
                    whitelist TEXT NOT NULL,
                    INDEX idx_relays_alias (alias),
                    FOREIGN KEY (user_id) REFERENCES users(id)
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS domains (
                    name VARCHAR(255) PRIMARY KEY,
                    owner BIGINT NOT NULL DEFAULT -1
                )
                "#,
            ],
        }
    }
}

/// Repository backed by a relational database.
#[derive(Clone)]
pub struct SqlRepository {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlRepository {
    /// Connect to `uri` and create the schema if it is missing.
    pub async fn connect(uri: &str) -> Result<Self, StoreError> {
        let dialect = Dialect::from_uri(uri)?;
        sqlx::any::install_default_drivers();

        // Every sqlite `:memory:` connection is its own database: pin the
        // pool to one connection that never expires.
        let options = if dialect == Dialect::Sqlite && uri.contains(":memory:") {
            AnyPoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            AnyPoolOptions::new().max_connections(10)
        };
        let pool = options.connect(uri).await?;

        let repo = Self { pool, dialect };
        repo.run_migrations().await?;
        tracing::debug!(dialect = ?dialect, "store connected");
        Ok(repo)
    }

    /// A fresh in-memory sqlite store (for testing).
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        for statement in self.dialect.schema() {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn fetch_user(&self, external_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, external_id, display_name, admin FROM users WHERE external_id = ?",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn fetch_relays(
        &self,
        sql: &str,
        bind: Option<i64>,
    ) -> Result<Vec<RelayRecord>, StoreError> {
        let mut query = sqlx::query(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(relay_from_row).collect()
    }
}

// ---------------------------------------------------------------------------
// Row mapping (storage boundary)
// ---------------------------------------------------------------------------

fn flag(row: &AnyRow, column: &str) -> Result<bool, StoreError> {
    Ok(row.try_get::<i64, _>(column)? != 0)
}

fn user_from_row(row: &AnyRow) -> Result<UserRecord, StoreError> {
    Ok(UserRecord {
        id: UserId(row.try_get("id")?),
        external_id: row.try_get("external_id")?,
        display_name: row.try_get("display_name")?,
        admin: flag(row, "admin")?,
    })
}

fn relay_from_row(row: &AnyRow) -> Result<RelayRecord, StoreError> {
    let whitelist: String = row.try_get("whitelist")?;
    Ok(RelayRecord {
        id: RelayId(row.try_get("id")?),
        user: row.try_get::<Option<i64>, _>("user_id")?.map(UserId),
        description: row.try_get("description")?,
        enabled: flag(row, "enabled")?,
        deleted: flag(row, "deleted")?,
        alias: row.try_get("alias")?,
        destination: row.try_get("destination")?,
        whitelist: decode_whitelist(&whitelist)?,
    })
}

fn domain_from_row(row: &AnyRow) -> Result<DomainRecord, StoreError> {
    Ok(DomainRecord {
        name: row.try_get("name")?,
        owner: DomainOwner::from(row.try_get::<i64, _>("owner")?),
    })
}

fn decode_whitelist(raw: &str) -> Result<Vec<String>, StoreError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(raw)?)
}

fn encode_whitelist(list: &[String]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(list)?)
}

fn int(b: bool) -> i64 {
    i64::from(b)
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[async_trait]
impl Repository for SqlRepository {
    async fn get_user_by_external_id(
        &self,
        external_id: &str,
        display_name: &str,
    ) -> Result<UserRecord, StoreError> {
        if let Some(mut user) = self.fetch_user(external_id).await? {
            if user.display_name != display_name {
                self.set_display_name(user.id, display_name).await?;
                user.display_name = display_name.to_string();
            }
            return Ok(user);
        }

        sqlx::query("INSERT INTO users (external_id, display_name, admin) VALUES (?, ?, 0)")
            .bind(external_id)
            .bind(display_name)
            .execute(&self.pool)
            .await?;
        let mut user = self
            .fetch_user(external_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                what: format!("user '{external_id}' after insert"),
            })?;

        // Decided after the insert: ids are unique, so concurrent first
        // sign-ins cannot both hold the smallest one.
        let first: i64 = sqlx::query("SELECT MIN(id) AS first FROM users")
            .fetch_one(&self.pool)
            .await?
            .try_get("first")?;
        if user.id.0 == first {
            self.set_admin(user.id, true).await?;
            user.admin = true;
            tracing::info!(external_id, "first user created, granting admin");
        }
        Ok(user)
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query("SELECT id, external_id, display_name, admin FROM users WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_all_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows =
            sqlx::query("SELECT id, external_id, display_name, admin FROM users ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn set_admin(&self, id: UserId, admin: bool) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE users SET admin = ? WHERE id = ?")
            .bind(int(admin))
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn set_display_name(&self, id: UserId, display_name: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE users SET display_name = ? WHERE id = ?")
            .bind(display_name)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_all_relays(&self, include_disabled: bool) -> Result<Vec<RelayRecord>, StoreError> {
        let sql = if include_disabled {
            format!("SELECT {RELAY_COLUMNS} FROM relays ORDER BY id ASC")
        } else {
            format!(
                "SELECT {RELAY_COLUMNS} FROM relays WHERE enabled = 1 AND deleted = 0 ORDER BY id ASC"
            )
        };
        self.fetch_relays(&sql, None).await
    }

    async fn get_relays(
        &self,
        include_disabled: bool,
        after: RelayId,
        page_size: NonZeroU32,
    ) -> Result<Vec<RelayRecord>, StoreError> {
        let sql = if include_disabled {
            SELECT_PAGE_ALL
        } else {
            SELECT_PAGE_ACTIVE
        };
        let rows = sqlx::query(sql)
            .bind(after.0)
            .bind(i64::from(page_size.get()))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(relay_from_row).collect()
    }

    async fn get_relay_by_alias(&self, alias: &str) -> Result<Option<RelayRecord>, StoreError> {
        let sql = format!("SELECT {RELAY_COLUMNS} FROM relays WHERE alias = ? AND deleted = 0");
        let row = sqlx::query(&sql)
            .bind(alias)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(relay_from_row).transpose()
    }

    async fn create_relay(&self, relay: NewRelay) -> Result<RelayRecord, StoreError> {
        if self.get_relay_by_alias(&relay.alias).await?.is_some() {
            return Err(StoreError::Conflict {
                what: format!("alias '{}' already exists", relay.alias),
            });
        }
        sqlx::query(
            "INSERT INTO relays (user_id, description, enabled, deleted, alias, destination, whitelist) \
             VALUES (?, ?, ?, 0, ?, ?, ?)",
        )
        .bind(relay.user.map(|u| u.0))
        .bind(relay.description.as_str())
        .bind(int(relay.enabled))
        .bind(relay.alias.as_str())
        .bind(relay.destination.as_str())
        .bind(encode_whitelist(&relay.whitelist)?)
        .execute(&self.pool)
        .await?;

        self.get_relay_by_alias(&relay.alias)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                what: format!("relay '{}' after insert", relay.alias),
            })
    }

    async fn update_relay(&self, update: RelayUpdate) -> Result<u64, StoreError> {
        let sql = format!("SELECT {RELAY_COLUMNS} FROM relays WHERE id = ?");
        let Some(mut current) = self
            .fetch_relays(&sql, Some(update.id.0))
            .await?
            .into_iter()
            .next()
        else {
            return Ok(0);
        };

        update.apply_to(&mut current);

        // The record as it would look afterwards must not collide while live.
        if !current.deleted {
            if let Some(other) = self.get_relay_by_alias(&current.alias).await? {
                if other.id != update.id {
                    return Err(StoreError::Conflict {
                        what: format!("alias '{}' already exists", current.alias),
                    });
                }
            }
        }

        let result = sqlx::query(
            "UPDATE relays SET user_id = ?, description = ?, enabled = ?, deleted = ?, \
             alias = ?, destination = ?, whitelist = ? WHERE id = ?",
        )
        .bind(current.user.map(|u| u.0))
        .bind(current.description.as_str())
        .bind(int(current.enabled))
        .bind(int(current.deleted))
        .bind(current.alias.as_str())
        .bind(current.destination.as_str())
        .bind(encode_whitelist(&current.whitelist)?)
        .bind(current.id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_relay(&self, id: RelayId) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE relays SET deleted = 1 WHERE id = ? AND deleted = 0")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_users_relays(&self, user: UserId) -> Result<Vec<RelayRecord>, StoreError> {
        let sql = format!(
            "SELECT {RELAY_COLUMNS} FROM relays WHERE user_id = ? AND deleted = 0 ORDER BY id ASC"
        );
        self.fetch_relays(&sql, Some(user.0)).await
    }

    async fn get_my_domains(&self, user: UserId) -> Result<Vec<DomainRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT name, owner FROM domains WHERE owner = ? OR owner = ? ORDER BY name ASC",
        )
        .bind(DomainOwner::Shared.as_raw())
        .bind(user.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(domain_from_row).collect()
    }

    async fn get_all_domains(&self) -> Result<Vec<DomainRecord>, StoreError> {
        let rows = sqlx::query("SELECT name, owner FROM domains ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(domain_from_row).collect()
    }

    async fn create_domain(
        &self,
        name: &str,
        owner: DomainOwner,
    ) -> Result<DomainRecord, StoreError> {
        let exists = sqlx::query("SELECT name FROM domains WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        if exists {
            return Err(StoreError::Conflict {
                what: format!("domain '{name}' already exists"),
            });
        }
        sqlx::query("INSERT INTO domains (name, owner) VALUES (?, ?)")
            .bind(name)
            .bind(owner.as_raw())
            .execute(&self.pool)
            .await?;
        Ok(DomainRecord {
            name: name.to_string(),
            owner,
        })
    }

    async fn delete_domain(&self, name: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM domains WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
