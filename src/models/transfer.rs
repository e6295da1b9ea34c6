use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// At-most-one-pending ownership transfer per group. Accepted or rejected
/// transfers are hard-deleted; the outcome lives in the mutated memberships
/// and an audit record, not in this row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct OwnershipTransfer {
    pub id: Uuid,
    pub group_id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct CreateOwnershipTransfer {
    pub to_user_id: Uuid,
}

/// Machine-stable conflict code surfaced when a group already has a pending
/// transfer.
pub const TRANSFER_ALREADY_PENDING: &str = "TRANSFER_ALREADY_PENDING";

/// Who is resolving a pending transfer, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferResolution {
    /// The recipient accepts: ownership moves, previous owner becomes manager.
    Accept,
    /// The sender cancels, or the recipient rejects. Either way the row is
    /// dropped with no membership change.
    Cancel,
}
