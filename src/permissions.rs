//! Permission model: scoped grants, the fixed action vocabularies, and the
//! builder that assembles grants into a permission-set definition.
//!
//! Everything here is local. Nothing in this module talks to the server; a
//! rejected grant never costs a round trip.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{PermissionSet, PermissionSetRef};

pub const GLOBAL_ACTIONS: &[&str] = &[
    "addShard", "applicationMessage", "appendOplogNote", "auditLogRotate",
    "changeCustomData", "changePassword", "changeOwnPassword", "changeOwnCustomData",
    "checkFreeMonitoringStatus", "closeAllDatabases", "connPoolStats",
    "connPoolSync", "cpuProfiler", "createDatabase", "createRole",
    "createUser", "dropDatabase", "dropRole", "dropUser", "enableSharding",
    "flushRouterConfig", "fsync", "getCmdLineOpts", "getLog", "getParameter",
    "getShardMap", "getShardVersion", "grantRole", "hostInfo", "invalidateUserCache",
    "killop", "listDatabases", "listSessions", "listShards", "logRotate",
    "netstat", "removeShard", "replSetConfigure", "replSetGetConfig",
    "replSetGetStatus", "replSetHeartbeat", "replSetReconfig",
    "replSetResizeOplog", "replSetStateChange", "resync", "revokeRole",
    "serverStatus", "setFeatureCompatibilityVersion", "setFreeMonitoring",
    "setParameter", "shardCollection", "shutdown", "splitChunk", "splitVector",
    "top", "touch", "trafficRecord", "unlock", "useUUID", "viewRole", "viewUser",
];

pub const DATABASE_ACTIONS: &[&str] = &[
    "changeStream", "collStats", "convertToCapped", "createCollection",
    "createIndex", "dbHash", "dbStats", "dropCollection", "dropDatabase",
    "dropIndex", "enableProfiler", "killCursors", "listCollections",
    "listIndexes", "planCacheRead", "planCacheWrite", "reIndex",
    "renameCollectionSameDB", "repairDatabase", "storageDetails",
];

pub const COLLECTION_ACTIONS: &[&str] = &[
    "find", "insert", "remove", "update", "bypassDocumentValidation",
    "changeStream", "collStats", "convertToCapped", "createCollection",
    "createIndex", "dbHash", "dbStats", "dropCollection", "dropIndex",
    "emptycapped", "listCollections", "listIndexes", "planCacheRead",
    "reIndex", "renameCollectionSameDB", "storageDetails", "validate",
];

/// Roles the server ships with. Deleting one of these is refused locally.
pub const BUILTIN_PERMISSION_SETS: &[&str] = &[
    "read", "readWrite", "dbAdmin", "dbOwner", "userAdmin",
    "clusterAdmin", "clusterManager", "clusterMonitor", "hostManager",
    "backup", "restore", "readAnyDatabase", "readWriteAnyDatabase",
    "userAdminAnyDatabase", "dbAdminAnyDatabase", "root", "__system",
    "__queryableBackup", "enableSharding", "directShardOperations",
    "searchCoordinator",
];

pub fn is_builtin_permission_set(name: &str) -> bool {
    BUILTIN_PERMISSION_SETS.contains(&name)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrantRejected {
    #[error("A database name is required for this privilege")]
    MissingDatabase,
    #[error("Select a collection or enable all collections")]
    MissingCollection,
    #[error("Select at least one action")]
    NoActions,
    #[error("Action '{action}' is not valid for {scope} privileges")]
    UnknownAction { action: String, scope: &'static str },
    #[error("Role name and database are required")]
    MissingDefinitionName,
    #[error("Malformed privilege: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionTarget {
    Named(String),
    All,
}

/// Where a grant applies. A sum type, so a global grant can never carry a
/// database and a collection grant can never lose one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantScope {
    Global,
    Database(String),
    Collection(String, CollectionTarget),
}

impl GrantScope {
    pub fn kind(&self) -> &'static str {
        match self {
            GrantScope::Global => "global",
            GrantScope::Database(_) => "database",
            GrantScope::Collection(..) => "collection",
        }
    }

    pub fn vocabulary(&self) -> &'static [&'static str] {
        match self {
            GrantScope::Global => GLOBAL_ACTIONS,
            GrantScope::Database(_) => DATABASE_ACTIONS,
            GrantScope::Collection(..) => COLLECTION_ACTIONS,
        }
    }
}

impl fmt::Display for GrantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantScope::Global => write!(f, "cluster"),
            GrantScope::Database(db) => write!(f, "{}", db),
            GrantScope::Collection(db, CollectionTarget::All) => write!(f, "{}.*", db),
            GrantScope::Collection(db, CollectionTarget::Named(c)) => write!(f, "{}.{}", db, c),
        }
    }
}

/// One scoped rule: a set of named actions over a scope.
///
/// On the wire this is the server's privilege document:
/// `{ resource: { cluster: true } | { db, collection }, actions: [...] }`.
/// An empty collection name covers the whole database. Whether that reads back
/// as a database grant or an every-collection grant depends on the actions.
/// A bare `{ db }` is accepted as a database grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ServerPrivilege", into = "ServerPrivilege")]
pub struct PermissionGrant {
    pub scope: GrantScope,
    pub actions: BTreeSet<String>,
}

impl PermissionGrant {
    pub fn new<I, S>(scope: GrantScope, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scope,
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn global<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(GrantScope::Global, actions)
    }

    pub fn database<I, S>(db: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(GrantScope::Database(db.into()), actions)
    }

    /// Mirrors the collection tab of a privilege form: `all_collections` wins
    /// over whatever was typed into the collection field.
    pub fn collection<I, S>(
        db: impl Into<String>,
        collection: impl Into<String>,
        all_collections: bool,
        actions: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collection = collection.into();
        let target = if all_collections {
            CollectionTarget::All
        } else {
            CollectionTarget::Named(collection)
        };
        Self::new(GrantScope::Collection(db.into(), target), actions)
    }

    pub fn validate(&self) -> Result<(), GrantRejected> {
        match &self.scope {
            GrantScope::Global => {}
            GrantScope::Database(db) => {
                if db.trim().is_empty() {
                    return Err(GrantRejected::MissingDatabase);
                }
            }
            GrantScope::Collection(db, target) => {
                if db.trim().is_empty() {
                    return Err(GrantRejected::MissingDatabase);
                }
                if let CollectionTarget::Named(name) = target {
                    if name.trim().is_empty() {
                        return Err(GrantRejected::MissingCollection);
                    }
                }
            }
        }

        if self.actions.is_empty() {
            return Err(GrantRejected::NoActions);
        }

        let vocabulary = self.scope.vocabulary();
        if let Some(unknown) = self
            .actions
            .iter()
            .find(|action| !vocabulary.contains(&action.as_str()))
        {
            return Err(GrantRejected::UnknownAction {
                action: unknown.clone(),
                scope: self.scope.kind(),
            });
        }

        Ok(())
    }
}

/// Appends `candidate` if it is well formed. Order is kept for display only.
pub fn add_grant(
    current: &[PermissionGrant],
    candidate: PermissionGrant,
) -> Result<Vec<PermissionGrant>, GrantRejected> {
    candidate.validate()?;
    let mut grants = current.to_vec();
    grants.push(candidate);
    Ok(grants)
}

/// Removes the grant at `index`.
///
/// # Panics
///
/// Panics if `index` is out of bounds.
pub fn remove_grant(current: &[PermissionGrant], index: usize) -> Vec<PermissionGrant> {
    assert!(
        index < current.len(),
        "grant index {} out of range ({} grants)",
        index,
        current.len()
    );
    let mut grants = current.to_vec();
    grants.remove(index);
    grants
}

/// Collects the pieces of a custom permission set before `createRole`.
#[derive(Debug, Clone, Default)]
pub struct PermissionSetBuilder {
    name: String,
    home_database: String,
    inherited_sets: Vec<PermissionSetRef>,
    grants: Vec<PermissionGrant>,
}

impl PermissionSetBuilder {
    pub fn new(name: impl Into<String>, home_database: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            home_database: home_database.into(),
            ..Default::default()
        }
    }

    /// Inherits another set. A reference without a database resolves to the
    /// home database of the set being built.
    pub fn inherit(mut self, mut set: PermissionSetRef) -> Self {
        if set.db.is_empty() {
            set.db = self.home_database.clone();
        }
        self.inherited_sets.push(set);
        self
    }

    pub fn add_grant(&mut self, candidate: PermissionGrant) -> Result<(), GrantRejected> {
        self.grants = add_grant(&self.grants, candidate)?;
        Ok(())
    }

    pub fn remove_grant(&mut self, index: usize) {
        self.grants = remove_grant(&self.grants, index);
    }

    pub fn grants(&self) -> &[PermissionGrant] {
        &self.grants
    }

    pub fn build(self) -> Result<PermissionSet, GrantRejected> {
        if self.name.trim().is_empty() || self.home_database.trim().is_empty() {
            return Err(GrantRejected::MissingDefinitionName);
        }
        Ok(PermissionSet {
            name: self.name,
            home_database: self.home_database,
            builtin: false,
            inherited_sets: self.inherited_sets,
            grants: self.grants,
        })
    }
}

/// CLI shorthand:
/// `global:a,b` | `database:<db>:a,b` | `collection:<db>.<coll>:a,b` | `collection:<db>.*:a,b`
impl FromStr for PermissionGrant {
    type Err = GrantRejected;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || GrantRejected::Malformed(s.to_string());
        let split_actions = |list: &str| -> Vec<String> {
            list.split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect()
        };

        let (kind, rest) = s.split_once(':').ok_or_else(malformed)?;
        match kind {
            "global" => Ok(PermissionGrant::global(split_actions(rest))),
            "database" | "db" => {
                let (db, actions) = rest.split_once(':').ok_or_else(malformed)?;
                Ok(PermissionGrant::database(db, split_actions(actions)))
            }
            "collection" | "coll" => {
                let (target, actions) = rest.split_once(':').ok_or_else(malformed)?;
                let (db, collection) = target.split_once('.').ok_or_else(malformed)?;
                Ok(PermissionGrant::collection(
                    db,
                    collection,
                    collection == "*",
                    split_actions(actions),
                ))
            }
            _ => Err(malformed()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ServerResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    db: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cluster: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerPrivilege {
    resource: ServerResource,
    #[serde(default)]
    actions: Vec<String>,
}

impl From<PermissionGrant> for ServerPrivilege {
    fn from(grant: PermissionGrant) -> Self {
        let resource = match grant.scope {
            GrantScope::Global => ServerResource {
                cluster: Some(true),
                ..Default::default()
            },
            // The server has no db-only resource; a whole database is `collection: ""`.
            GrantScope::Database(db) => ServerResource {
                db: Some(db),
                collection: Some(String::new()),
                cluster: None,
            },
            GrantScope::Collection(db, target) => ServerResource {
                db: Some(db),
                collection: Some(match target {
                    CollectionTarget::All => String::new(),
                    CollectionTarget::Named(name) => name,
                }),
                cluster: None,
            },
        };
        ServerPrivilege {
            resource,
            actions: grant.actions.into_iter().collect(),
        }
    }
}

impl TryFrom<ServerPrivilege> for PermissionGrant {
    type Error = GrantRejected;

    // Structural only: content checks happen in add_grant.
    fn try_from(privilege: ServerPrivilege) -> Result<Self, Self::Error> {
        let ServerResource {
            db,
            collection,
            cluster,
        } = privilege.resource;

        let scope = match (cluster, db, collection) {
            (Some(true), None, None) => GrantScope::Global,
            (None | Some(false), Some(db), None) => GrantScope::Database(db),
            (None | Some(false), Some(db), Some(collection)) if collection.is_empty() => {
                let database_only = privilege
                    .actions
                    .iter()
                    .all(|action| DATABASE_ACTIONS.contains(&action.as_str()));
                if database_only {
                    GrantScope::Database(db)
                } else {
                    GrantScope::Collection(db, CollectionTarget::All)
                }
            }
            (None | Some(false), Some(db), Some(collection)) => {
                GrantScope::Collection(db, CollectionTarget::Named(collection))
            }
            _ => {
                return Err(GrantRejected::Malformed(
                    "resource must be either {cluster: true} or name a db".to_string(),
                ))
            }
        };

        Ok(PermissionGrant::new(scope, privilege.actions))
    }
}
