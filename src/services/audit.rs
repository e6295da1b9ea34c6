//! Structured audit logging for membership and ownership mutations
//! (§4.1): every add/update/remove/transfer emits one record, both to the
//! tracing log and to the event bus so admin tooling can subscribe.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::access::AccessLevel;
use crate::events::{EventBus, ServerEvent};
use crate::models::membership::{MembershipAuditAction, MembershipAuditRecord};
use crate::observability::metrics;

/// Emits one [`MembershipAuditRecord`] per call. Cheap and infallible:
/// logging and event publication never fail the calling operation.
pub struct AuditRecorder {
    events: Arc<EventBus>,
}

impl AuditRecorder {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self { events }
    }

    pub fn record(
        &self,
        action: MembershipAuditAction,
        actor_id: Uuid,
        group_id: Uuid,
        target_user_id: Uuid,
        from_access_level: Option<AccessLevel>,
        to_access_level: Option<AccessLevel>,
    ) -> MembershipAuditRecord {
        let record = MembershipAuditRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            actor_id,
            group_id,
            target_user_id,
            from_access_level,
            to_access_level,
        };

        tracing::info!(
            action = %action,
            actor = %actor_id,
            conversation = %group_id,
            target = %target_user_id,
            from = from_access_level.map(|l| l.as_str()),
            to = to_access_level.map(|l| l.as_str()),
            "membership audit record"
        );

        self.events.publish(ServerEvent::AuditLogCreated {
            id: record.id,
            timestamp: record.timestamp,
            action: action.to_string(),
            actor_id,
            group_id,
            target_user_id,
            from_access_level: from_access_level.map(|l| l.as_str().to_string()),
            to_access_level: to_access_level.map(|l| l.as_str().to_string()),
        });

        metrics::record_membership_mutation(&action.to_string());

        record
    }
}
