//! End-to-end tests for the Conversation/Group Store services, exercising
//! real SQLite-backed repositories (§8 S5, fork creation).

use std::sync::Arc;

use uuid::Uuid;

use super::{ConversationService, MembershipService, TransferService};
use crate::access::{AccessChecker, AccessLevel, CallerIdentity};
use crate::config::EncryptionConfig;
use crate::db::DbPool;
use crate::db::tests::harness::{create_sqlite_pool, run_sqlite_migrations};
use crate::encryption::EnvelopeService;
use crate::error::CoreError;
use crate::events::EventBus;
use crate::models::conversation::CreateConversation;
use crate::models::membership::AddMembership;
use crate::models::transfer::TRANSFER_ALREADY_PENDING;
use crate::secrets::{MemorySecretManager, SecretManager};

struct TestFixture {
    conversations: ConversationService,
    memberships: MembershipService,
    transfers: TransferService,
}

async fn fixture() -> TestFixture {
    let pool = create_sqlite_pool().await;
    run_sqlite_migrations(&pool).await;
    let db = Arc::new(DbPool::from_sqlite(pool));
    let access = Arc::new(AccessChecker::new(db.memberships()));
    let secrets: Arc<dyn SecretManager> = Arc::new(MemorySecretManager::new());
    let encryption = Arc::new(
        EnvelopeService::from_config(
            &EncryptionConfig {
                enabled: false,
                providers: Vec::new(),
            },
            &secrets,
        )
        .await
        .unwrap(),
    );
    let events = Arc::new(EventBus::new());

    TestFixture {
        conversations: ConversationService::new(db.clone(), access.clone(), encryption.clone(), events.clone()),
        memberships: MembershipService::new(db.clone(), access.clone(), events.clone()),
        transfers: TransferService::new(db.clone(), access.clone(), events.clone()),
    }
}

fn user(id: Uuid) -> CallerIdentity {
    CallerIdentity::User { user_id: id }
}

#[tokio::test]
async fn create_root_conversation_installs_owner_membership() {
    let f = fixture().await;
    let alice = Uuid::new_v4();

    let conversation = f
        .conversations
        .create(
            &user(alice),
            CreateConversation {
                title: Some("hello".to_string()),
                metadata: Default::default(),
                forked_from: None,
            },
        )
        .await
        .unwrap();

    assert!(conversation.is_root());
    assert_eq!(conversation.id, conversation.group_id);
    assert_eq!(conversation.owner_user_id, alice);

    let memberships = f.memberships.list(&user(alice), conversation.group_id).await.unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].access_level, AccessLevel::Owner);
}

#[tokio::test]
async fn non_owner_cannot_delete_conversation() {
    let f = fixture().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let conversation = f
        .conversations
        .create(
            &user(alice),
            CreateConversation {
                title: None,
                metadata: Default::default(),
                forked_from: None,
            },
        )
        .await
        .unwrap();

    f.memberships
        .share(
            &user(alice),
            conversation.group_id,
            AddMembership {
                user_id: bob,
                access_level: AccessLevel::Writer,
            },
        )
        .await
        .unwrap();

    let err = f
        .conversations
        .delete(&user(bob), conversation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden { .. }));
}

#[tokio::test]
async fn delete_cascades_and_hard_deletes_memberships() {
    let f = fixture().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let conversation = f
        .conversations
        .create(
            &user(alice),
            CreateConversation {
                title: None,
                metadata: Default::default(),
                forked_from: None,
            },
        )
        .await
        .unwrap();

    f.memberships
        .share(
            &user(alice),
            conversation.group_id,
            AddMembership {
                user_id: bob,
                access_level: AccessLevel::Writer,
            },
        )
        .await
        .unwrap();

    f.conversations.delete(&user(alice), conversation.id).await.unwrap();

    let err = f
        .conversations
        .get(&user(alice), conversation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden { .. }));
}

// S5 — ownership transfer (§8).
#[tokio::test]
async fn ownership_transfer_end_to_end() {
    let f = fixture().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let carol = Uuid::new_v4();

    let conversation = f
        .conversations
        .create(
            &user(alice),
            CreateConversation {
                title: None,
                metadata: Default::default(),
                forked_from: None,
            },
        )
        .await
        .unwrap();
    let group_id = conversation.group_id;

    f.memberships
        .share(
            &user(alice),
            group_id,
            AddMembership {
                user_id: bob,
                access_level: AccessLevel::Writer,
            },
        )
        .await
        .unwrap();

    f.transfers.create(&user(alice), group_id, bob).await.unwrap();

    // A second pending transfer conflicts with a machine-stable code and
    // the existing transfer's id.
    f.memberships
        .share(
            &user(alice),
            group_id,
            AddMembership {
                user_id: carol,
                access_level: AccessLevel::Writer,
            },
        )
        .await
        .unwrap();
    let err = f.transfers.create(&user(alice), group_id, carol).await.unwrap_err();
    match err {
        CoreError::Conflict { code, .. } => assert_eq!(code, TRANSFER_ALREADY_PENDING),
        other => panic!("expected conflict, got {other:?}"),
    }

    // Removing bob's membership auto-cancels the pending transfer.
    f.memberships.remove(&user(alice), group_id, bob).await.unwrap();
    assert!(f.transfers.get(&user(alice), group_id).await.unwrap().is_none());

    // Re-add bob, re-create the transfer, and accept it.
    f.memberships
        .share(
            &user(alice),
            group_id,
            AddMembership {
                user_id: bob,
                access_level: AccessLevel::Writer,
            },
        )
        .await
        .unwrap();
    f.transfers.create(&user(alice), group_id, bob).await.unwrap();
    f.transfers.accept(&user(bob), group_id).await.unwrap();

    let memberships = f.memberships.list(&user(bob), group_id).await.unwrap();
    let bob_level = memberships.iter().find(|m| m.user_id == bob).unwrap().access_level;
    let alice_level = memberships.iter().find(|m| m.user_id == alice).unwrap().access_level;
    assert_eq!(bob_level, AccessLevel::Owner);
    assert_eq!(alice_level, AccessLevel::Manager);

    let root = f.conversations.get(&user(bob), conversation.id).await.unwrap();
    assert_eq!(root.owner_user_id, bob);
}

#[tokio::test]
async fn transfer_to_non_member_is_rejected() {
    let f = fixture().await;
    let alice = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let conversation = f
        .conversations
        .create(
            &user(alice),
            CreateConversation {
                title: None,
                metadata: Default::default(),
                forked_from: None,
            },
        )
        .await
        .unwrap();

    let err = f
        .transfers
        .create(&user(alice), conversation.group_id, stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

#[tokio::test]
async fn owner_membership_can_never_be_removed() {
    let f = fixture().await;
    let alice = Uuid::new_v4();

    let conversation = f
        .conversations
        .create(
            &user(alice),
            CreateConversation {
                title: None,
                metadata: Default::default(),
                forked_from: None,
            },
        )
        .await
        .unwrap();

    let err = f
        .memberships
        .remove(&user(alice), conversation.group_id, alice)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

#[tokio::test]
async fn list_forks_returns_fork_tree_in_group() {
    let f = fixture().await;
    let alice = Uuid::new_v4();

    let root = f
        .conversations
        .create(
            &user(alice),
            CreateConversation {
                title: Some("root".to_string()),
                metadata: Default::default(),
                forked_from: None,
            },
        )
        .await
        .unwrap();

    let forks = f.conversations.list_forks(&user(alice), root.id).await.unwrap();
    assert_eq!(forks.len(), 1);
    assert_eq!(forks[0].id, root.id);
}
