//! Identity & Access: resolving the caller and enforcing the 4-level
//! access lattice against group membership (§4.1, §6.1).

use std::sync::Arc;

use uuid::Uuid;

pub use crate::models::membership::AccessLevel;
use crate::db::repos::MembershipRepo;
use crate::error::{CoreError, CoreResult};

/// The resolved identity of whoever is making a call: a human user
/// authenticated via OIDC, or an agent authenticated via API key and
/// mapped to a `clientId` (§6.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerIdentity {
    User { user_id: Uuid },
    Agent { client_id: String },
}

impl CallerIdentity {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            CallerIdentity::User { user_id } => Some(*user_id),
            CallerIdentity::Agent { .. } => None,
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        match self {
            CallerIdentity::Agent { client_id } => Some(client_id),
            CallerIdentity::User { .. } => None,
        }
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, CallerIdentity::Agent { .. })
    }

    pub fn is_user(&self) -> bool {
        matches!(self, CallerIdentity::User { .. })
    }
}

/// Evaluates membership for a caller against a group's access lattice.
///
/// Agent callers never hold memberships directly: they act on behalf of
/// whichever group they were granted access to at the boundary. This
/// checker is deliberately user-centric; callers needing to authorize an
/// agent operation resolve the owning user first (handled at the
/// transport boundary, out of scope here).
pub struct AccessChecker {
    memberships: Arc<dyn MembershipRepo>,
}

impl AccessChecker {
    pub fn new(memberships: Arc<dyn MembershipRepo>) -> Self {
        Self { memberships }
    }

    /// Returns the caller's effective access level on `group_id`, or
    /// `forbidden` if they hold no membership at all.
    pub async fn effective_level(&self, user_id: Uuid, group_id: Uuid) -> CoreResult<AccessLevel> {
        let membership = self
            .memberships
            .get(group_id, user_id)
            .await
            .map_err(CoreError::from)?;
        membership
            .map(|m| m.access_level)
            .ok_or(CoreError::Forbidden {
                required: AccessLevel::Reader,
            })
    }

    /// Require at least `min_level` on `group_id` for `user_id`. Returns
    /// the effective level on success so callers needing it (e.g. to
    /// distinguish owner from manager) don't re-query.
    pub async fn require_access(
        &self,
        user_id: Uuid,
        group_id: Uuid,
        min_level: AccessLevel,
    ) -> CoreResult<AccessLevel> {
        let effective = match self.memberships.get(group_id, user_id).await {
            Ok(Some(m)) => m.access_level,
            Ok(None) => {
                return Err(CoreError::Forbidden {
                    required: min_level,
                });
            }
            Err(e) => return Err(CoreError::from(e)),
        };
        if effective.satisfies(min_level) {
            Ok(effective)
        } else {
            Err(CoreError::Forbidden {
                required: min_level,
            })
        }
    }
}
