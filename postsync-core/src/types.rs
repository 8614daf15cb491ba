//! Domain types for the relay store.
//!
//! Records are plain values: the store hands out copies and takes update
//! payloads, nothing here talks to a database.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Store-assigned relay identifier. Strictly increasing in insertion order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct RelayId(pub i64);

impl RelayId {
    /// Cursor position before the first record.
    pub const START: RelayId = RelayId(0);
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for RelayId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Store-assigned user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for UserId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Raw owner value the store uses for domains shared with every user.
pub const SHARED_OWNER: i64 = -1;

/// Who may see a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum DomainOwner {
    /// Visible to every user.
    Shared,
    User(UserId),
}

impl DomainOwner {
    pub fn as_raw(&self) -> i64 {
        match self {
            DomainOwner::Shared => SHARED_OWNER,
            DomainOwner::User(id) => id.0,
        }
    }
}

impl From<i64> for DomainOwner {
    fn from(raw: i64) -> Self {
        if raw == SHARED_OWNER {
            DomainOwner::Shared
        } else {
            DomainOwner::User(UserId(raw))
        }
    }
}

impl From<DomainOwner> for i64 {
    fn from(owner: DomainOwner) -> Self {
        owner.as_raw()
    }
}

impl fmt::Display for DomainOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainOwner::Shared => write!(f, "shared"),
            DomainOwner::User(id) => write!(f, "user {id}"),
        }
    }
}

/// How the lookup-map files are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MapMode {
    /// Connection parameters plus a query template; the mail agent queries
    /// the live store at delivery time.
    #[default]
    LiveQuery,
    /// Static tables materialized from the store at sync time.
    PreRendered,
}

impl MapMode {
    /// Postfix lookup table type for the generated maps.
    ///
    /// `texthash` reads the plain `key value` files directly, so no
    /// `postmap` step is needed after a sync.
    pub fn table_type(&self) -> &'static str {
        match self {
            MapMode::LiveQuery => "mysql",
            MapMode::PreRendered => "texthash",
        }
    }

    /// File name of the domain lookup map.
    pub fn domain_map_file(&self) -> &'static str {
        match self {
            MapMode::LiveQuery => "mysql_virtual_domains.cf",
            MapMode::PreRendered => "virtual_domains",
        }
    }

    /// File name of the alias lookup map.
    pub fn alias_map_file(&self) -> &'static str {
        match self {
            MapMode::LiveQuery => "mysql_virtual_alias_maps.cf",
            MapMode::PreRendered => "virtual_alias",
        }
    }
}

impl fmt::Display for MapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapMode::LiveQuery => write!(f, "live-query"),
            MapMode::PreRendered => write!(f, "pre-rendered"),
        }
    }
}

impl FromStr for MapMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live-query" | "live" => Ok(MapMode::LiveQuery),
            "pre-rendered" | "prerendered" => Ok(MapMode::PreRendered),
            other => Err(format!(
                "unknown map mode '{other}'; expected: live-query, pre-rendered"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A single alias → destination relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRecord {
    pub id: RelayId,
    /// Owning user, if any.
    pub user: Option<UserId>,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    /// Soft-deleted: kept for history, never delivered.
    #[serde(default)]
    pub deleted: bool,
    pub alias: String,
    pub destination: String,
    #[serde(default)]
    pub whitelist: Vec<String>,
}

impl RelayRecord {
    /// Enabled and not soft-deleted.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.deleted
    }
}

/// Insert payload for a new relay. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRelay {
    pub user: Option<UserId>,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    pub alias: String,
    pub destination: String,
    #[serde(default)]
    pub whitelist: Vec<String>,
}

impl NewRelay {
    /// Enabled relay with no owner, description or whitelist.
    pub fn new(alias: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            user: None,
            description: String::new(),
            enabled: true,
            alias: alias.into(),
            destination: destination.into(),
            whitelist: Vec::new(),
        }
    }
}

/// Partial update of an existing relay; `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelayUpdate {
    pub id: RelayId,
    pub user: Option<UserId>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub deleted: Option<bool>,
    pub alias: Option<String>,
    pub destination: Option<String>,
    pub whitelist: Option<Vec<String>>,
}

impl RelayUpdate {
    pub fn new(id: RelayId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Apply the present fields to `relay`.
    pub fn apply_to(&self, relay: &mut RelayRecord) {
        if let Some(user) = self.user {
            relay.user = Some(user);
        }
        if let Some(description) = &self.description {
            relay.description = description.clone();
        }
        if let Some(enabled) = self.enabled {
            relay.enabled = enabled;
        }
        if let Some(deleted) = self.deleted {
            relay.deleted = deleted;
        }
        if let Some(alias) = &self.alias {
            relay.alias = alias.clone();
        }
        if let Some(destination) = &self.destination {
            relay.destination = destination.clone();
        }
        if let Some(whitelist) = &self.whitelist {
            relay.whitelist = whitelist.clone();
        }
    }
}

/// A virtual domain accepted by the mail agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub name: String,
    pub owner: DomainOwner,
}

impl DomainRecord {
    pub fn visible_to(&self, user: UserId) -> bool {
        match self.owner {
            DomainOwner::Shared => true,
            DomainOwner::User(owner) => owner == user,
        }
    }
}

/// A user known through an external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    /// Opaque token from the identity provider (unique).
    pub external_id: String,
    pub display_name: String,
    pub admin: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn relay() -> RelayRecord {
        RelayRecord {
            id: RelayId(7),
            user: Some(UserId(1)),
            description: String::new(),
            enabled: true,
            deleted: false,
            alias: "a@x".to_string(),
            destination: "b@y".to_string(),
            whitelist: vec![],
        }
    }

    #[test]
    fn newtype_display() {
        assert_eq!(RelayId(12).to_string(), "12");
        assert_eq!(UserId(3).to_string(), "3");
    }

    #[test]
    fn shared_owner_uses_sentinel() {
        assert_eq!(DomainOwner::from(-1), DomainOwner::Shared);
        assert_eq!(DomainOwner::from(4), DomainOwner::User(UserId(4)));
        assert_eq!(DomainOwner::Shared.as_raw(), SHARED_OWNER);
        let json = serde_json::to_string(&DomainOwner::Shared).unwrap();
        assert_eq!(json, "-1");
    }

    #[test]
    fn shared_domain_visible_to_everyone() {
        let shared = DomainRecord {
            name: "example.org".into(),
            owner: DomainOwner::Shared,
        };
        let private = DomainRecord {
            name: "mine.org".into(),
            owner: DomainOwner::User(UserId(2)),
        };
        assert!(shared.visible_to(UserId(9)));
        assert!(private.visible_to(UserId(2)));
        assert!(!private.visible_to(UserId(9)));
    }

    #[test]
    fn active_requires_enabled_and_not_deleted() {
        let mut r = relay();
        assert!(r.is_active());
        r.deleted = true;
        assert!(!r.is_active());
        r.deleted = false;
        r.enabled = false;
        assert!(!r.is_active());
    }

    #[test]
    fn update_only_touches_present_fields() {
        let mut r = relay();
        let mut update = RelayUpdate::new(r.id);
        update.enabled = Some(false);
        update.whitelist = Some(vec!["10.0.0.0/8".into()]);
        update.apply_to(&mut r);
        assert!(!r.enabled);
        assert_eq!(r.alias, "a@x");
        assert_eq!(r.whitelist, vec!["10.0.0.0/8".to_string()]);
    }

    #[test]
    fn map_mode_parses_both_spellings() {
        assert_eq!("live-query".parse::<MapMode>().unwrap(), MapMode::LiveQuery);
        assert_eq!("Pre-Rendered".parse::<MapMode>().unwrap(), MapMode::PreRendered);
        assert!("hash".parse::<MapMode>().is_err());
        assert_eq!(MapMode::PreRendered.to_string(), "pre-rendered");
    }

    #[test]
    fn map_files_follow_mode() {
        assert_eq!(MapMode::LiveQuery.table_type(), "mysql");
        assert_eq!(MapMode::LiveQuery.alias_map_file(), "mysql_virtual_alias_maps.cf");
        assert_eq!(MapMode::PreRendered.table_type(), "texthash");
        assert_eq!(MapMode::PreRendered.domain_map_file(), "virtual_domains");
    }
}
