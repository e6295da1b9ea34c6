use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Access level lattice: `reader < writer < manager < owner`.
///
/// Ordering is derived from declaration order so `<`/`<=` on `AccessLevel`
/// implement the lattice directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Reader,
    Writer,
    Manager,
    Owner,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Reader => "reader",
            AccessLevel::Writer => "writer",
            AccessLevel::Manager => "manager",
            AccessLevel::Owner => "owner",
        }
    }

    /// Whether `self` satisfies a required minimum level.
    pub fn satisfies(&self, min: AccessLevel) -> bool {
        *self >= min
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reader" => Ok(AccessLevel::Reader),
            "writer" => Ok(AccessLevel::Writer),
            "manager" => Ok(AccessLevel::Manager),
            "owner" => Ok(AccessLevel::Owner),
            _ => Err(format!("invalid access level: {s}")),
        }
    }
}

/// Composite-key access grant on `(group_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ConversationMembership {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub access_level: AccessLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct AddMembership {
    pub user_id: Uuid,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct UpdateMembership {
    pub access_level: AccessLevel,
}

/// An audit record produced for every membership/ownership mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct MembershipAuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: MembershipAuditAction,
    pub actor_id: Uuid,
    pub group_id: Uuid,
    pub target_user_id: Uuid,
    pub from_access_level: Option<AccessLevel>,
    pub to_access_level: Option<AccessLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum MembershipAuditAction {
    Add,
    Update,
    Remove,
    Transfer,
}

impl fmt::Display for MembershipAuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MembershipAuditAction::Add => "add",
            MembershipAuditAction::Update => "update",
            MembershipAuditAction::Remove => "remove",
            MembershipAuditAction::Transfer => "transfer",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_ordering() {
        assert!(AccessLevel::Reader < AccessLevel::Writer);
        assert!(AccessLevel::Writer < AccessLevel::Manager);
        assert!(AccessLevel::Manager < AccessLevel::Owner);
        assert_eq!(AccessLevel::Reader.cmp(&AccessLevel::Reader), Ordering::Equal);
    }

    #[test]
    fn satisfies_is_reflexive_and_monotonic() {
        assert!(AccessLevel::Owner.satisfies(AccessLevel::Reader));
        assert!(AccessLevel::Writer.satisfies(AccessLevel::Writer));
        assert!(!AccessLevel::Reader.satisfies(AccessLevel::Writer));
    }

    #[test]
    fn roundtrip_str() {
        for lvl in [
            AccessLevel::Reader,
            AccessLevel::Writer,
            AccessLevel::Manager,
            AccessLevel::Owner,
        ] {
            assert_eq!(AccessLevel::from_str(lvl.as_str()).unwrap(), lvl);
        }
        assert!(AccessLevel::from_str("bogus").is_err());
    }
}
