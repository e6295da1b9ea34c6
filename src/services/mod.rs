//! Conversation/Group Store (§4.1): the access-control-aware facade over
//! conversations, memberships, and ownership transfers. The Entry Engine
//! (`crate::engine`) is the only component that reads or writes entries;
//! these services own everything else about a group's shape.

pub mod audit;
pub mod conversations;
pub mod memberships;
pub mod transfers;

#[cfg(all(test, feature = "database-sqlite"))]
mod tests;

pub use audit::AuditRecorder;
pub use conversations::ConversationService;
pub use memberships::MembershipService;
pub use transfers::TransferService;
