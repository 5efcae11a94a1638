//! Core role reference types

use crate::codec::compact_date;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Opaque store identifier
pub type RecordId = i64;

/// `principal_type` stamped on every join row for externally-sourced principals
pub const EXTERNAL_PRINCIPAL_TYPE: i32 = 0;

/// Kind of principal a role can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrincipalKind {
    /// A user
    User,
    /// A group of users
    Group,
    /// A nested role
    Role,
}

impl PrincipalKind {
    /// All kinds, in reconciliation order
    pub const ALL: [PrincipalKind; 3] = [PrincipalKind::User, PrincipalKind::Group, PrincipalKind::Role];

    /// Stable slot used by dispatch tables
    pub fn index(self) -> usize {
        match self {
            PrincipalKind::User => 0,
            PrincipalKind::Group => 1,
            PrincipalKind::Role => 2,
        }
    }

    /// Upper-case name used in logs and deferred failures
    pub fn as_str(self) -> &'static str {
        match self {
            PrincipalKind::User => "USER",
            PrincipalKind::Group => "GROUP",
            PrincipalKind::Role => "ROLE",
        }
    }

    /// Message returned to the caller when a member does not exist in strict mode
    pub fn missing_message(self, name: &str) -> String {
        let label = match self {
            PrincipalKind::User => "user",
            PrincipalKind::Group => "Group",
            PrincipalKind::Role => "Role",
        };
        format!("{} with name: {} does not exist ", label, name)
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member entry in a role declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleMember {
    /// Principal name
    pub name: String,

    /// Whether the member may administer the role
    #[serde(default)]
    pub is_admin: bool,
}

impl RoleMember {
    /// Create a non-admin member
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_admin: false,
        }
    }

    /// Create an admin member
    pub fn admin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_admin: true,
        }
    }
}

/// Declared membership of a role, one collection per principal kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSet {
    #[serde(default)]
    pub users: Vec<RoleMember>,

    #[serde(default)]
    pub groups: Vec<RoleMember>,

    /// Nested roles
    #[serde(default)]
    pub roles: Vec<RoleMember>,
}

impl MemberSet {
    /// Declared members of one kind
    pub fn of_kind(&self, kind: PrincipalKind) -> &[RoleMember] {
        match kind {
            PrincipalKind::User => &self.users,
            PrincipalKind::Group => &self.groups,
            PrincipalKind::Role => &self.roles,
        }
    }

    /// Distinct, non-blank member names of one kind
    pub fn distinct_names(&self, kind: PrincipalKind) -> BTreeSet<String> {
        self.of_kind(kind)
            .iter()
            .filter(|m| !m.name.trim().is_empty())
            .map(|m| m.name.clone())
            .collect()
    }
}

/// Role definition (aggregate root under reconciliation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Store id; `None` only until the role row is persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub options: HashMap<String, String>,

    #[serde(flatten)]
    pub members: MemberSet,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_user: Option<String>,

    #[serde(default, with = "compact_date::option", skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,

    #[serde(default, with = "compact_date::option", skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl Role {
    /// Create a role with no members
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            options: HashMap::new(),
            members: MemberSet::default(),
            created_by_user: None,
            create_time: None,
            update_time: None,
        }
    }

    /// Set the store id
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_users<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.users.extend(names.into_iter().map(RoleMember::new));
        self
    }

    pub fn with_groups<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.groups.extend(names.into_iter().map(RoleMember::new));
        self
    }

    pub fn with_roles<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.roles.extend(names.into_iter().map(RoleMember::new));
        self
    }
}

/// An existing principal of some kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalRecord {
    pub id: RecordId,
    pub kind: PrincipalKind,
    pub name: String,
}

/// Audit columns stamped on newly created rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFields {
    /// Creating user
    pub added_by_id: Option<RecordId>,

    /// Last updating user
    pub upd_by_id: Option<RecordId>,

    #[serde(with = "compact_date")]
    pub create_time: DateTime<Utc>,

    #[serde(with = "compact_date")]
    pub update_time: DateTime<Utc>,
}

impl AuditFields {
    /// Fields for a row created now by `user_id`
    pub fn created_by(user_id: Option<RecordId>, now: DateTime<Utc>) -> Self {
        Self {
            added_by_id: user_id,
            upd_by_id: user_id,
            create_time: now,
            update_time: now,
        }
    }
}

/// Denormalized join row linking a role to one of its principals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRefRow {
    /// Row id; `None` until inserted
    pub id: Option<RecordId>,

    /// Which join table the row lives in
    pub kind: PrincipalKind,

    pub role_id: RecordId,

    pub principal_id: RecordId,

    pub principal_name: String,

    /// Always `EXTERNAL_PRINCIPAL_TYPE` for rows written by reconciliation
    pub principal_type: i32,

    pub audit: AuditFields,
}

/// Where a user record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserSource {
    Internal,
    External,
}

/// User store record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Option<RecordId>,
    pub name: String,
    pub description: Option<String>,
    pub source: UserSource,
}

impl UserRecord {
    /// New externally-sourced user (a "service-config user")
    pub fn external(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            source: UserSource::External,
        }
    }
}

/// Where a group record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupSource {
    Internal,
    External,
}

/// Group store record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub id: Option<RecordId>,
    pub name: String,
    pub description: Option<String>,
    pub source: GroupSource,
}

impl GroupRecord {
    /// New external group; the name doubles as description
    pub fn external(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: None,
            description: Some(name.clone()),
            name,
            source: GroupSource::External,
        }
    }
}

/// Audit context attached to transaction-log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationContext {
    Create,
}

/// Transaction-log entry for a group change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAuditEntry {
    pub group: GroupRecord,
    pub previous: Option<GroupRecord>,
    pub context: OperationContext,
}
