//! Shared tests for ConversationRepo implementations
//!
//! Tests are written as async functions that take repo trait objects. This
//! allows the same test logic to run against both SQLite and PostgreSQL.

use uuid::Uuid;

use crate::db::repos::{
    ConversationRepo, ConversationUpdate, GroupRepo, ListParams, NewConversation,
};
use crate::models::conversation::ListConversationsMode;

fn new_conversation(group_id: Uuid, owner: Uuid) -> NewConversation {
    NewConversation {
        id: Uuid::new_v4(),
        group_id,
        owner_user_id: owner,
        title_ciphertext: b"ciphertext".to_vec(),
        metadata: serde_json::json!({}),
        forked_at_conversation_id: None,
        forked_at_entry_id: None,
    }
}

pub async fn test_create_and_get_roundtrip(groups: &dyn GroupRepo, repo: &dyn ConversationRepo) {
    let group_id = Uuid::new_v4();
    let owner = Uuid::new_v4();
    groups.create(group_id).await.unwrap();

    let created = repo.create(new_conversation(group_id, owner)).await.unwrap();
    let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();

    assert_eq!(fetched.owner_user_id, owner);
    assert_eq!(fetched.title_ciphertext, b"ciphertext".to_vec());
    assert!(fetched.deleted_at.is_none());
}

pub async fn test_get_by_id_not_found(_groups: &dyn GroupRepo, repo: &dyn ConversationRepo) {
    assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

pub async fn test_list_by_group_orders_by_created_at(
    groups: &dyn GroupRepo,
    repo: &dyn ConversationRepo,
) {
    let group_id = Uuid::new_v4();
    let owner = Uuid::new_v4();
    groups.create(group_id).await.unwrap();

    let first = repo.create(new_conversation(group_id, owner)).await.unwrap();
    let second = repo.create(new_conversation(group_id, owner)).await.unwrap();

    let all = repo.list_by_group(group_id).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, first.id);
    assert_eq!(all[1].id, second.id);
}

pub async fn test_update_title_and_metadata(groups: &dyn GroupRepo, repo: &dyn ConversationRepo) {
    let group_id = Uuid::new_v4();
    let owner = Uuid::new_v4();
    groups.create(group_id).await.unwrap();
    let created = repo.create(new_conversation(group_id, owner)).await.unwrap();

    let updated = repo
        .update(
            created.id,
            ConversationUpdate {
                title_ciphertext: Some(b"new-title".to_vec()),
                metadata: Some(serde_json::json!({"pinned": true})),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title_ciphertext, b"new-title".to_vec());
    assert_eq!(
        updated.metadata.get("pinned").and_then(|v| v.as_bool()),
        Some(true)
    );
    assert!(updated.updated_at >= created.updated_at);
}

pub async fn test_update_not_found(_groups: &dyn GroupRepo, repo: &dyn ConversationRepo) {
    let result = repo.update(Uuid::new_v4(), ConversationUpdate::default()).await;
    assert!(matches!(result, Err(crate::db::error::DbError::NotFound)));
}

pub async fn test_soft_delete_then_update_is_not_found(
    groups: &dyn GroupRepo,
    repo: &dyn ConversationRepo,
) {
    let group_id = Uuid::new_v4();
    let owner = Uuid::new_v4();
    groups.create(group_id).await.unwrap();
    let created = repo.create(new_conversation(group_id, owner)).await.unwrap();

    repo.soft_delete(created.id).await.unwrap();
    let result = repo.update(created.id, ConversationUpdate::default()).await;
    assert!(matches!(result, Err(crate::db::error::DbError::NotFound)));
}

pub async fn test_soft_delete_twice_is_not_found(
    groups: &dyn GroupRepo,
    repo: &dyn ConversationRepo,
) {
    let group_id = Uuid::new_v4();
    let owner = Uuid::new_v4();
    groups.create(group_id).await.unwrap();
    let created = repo.create(new_conversation(group_id, owner)).await.unwrap();

    repo.soft_delete(created.id).await.unwrap();
    let result = repo.soft_delete(created.id).await;
    assert!(matches!(result, Err(crate::db::error::DbError::NotFound)));
}

pub async fn test_set_owner_for_group_updates_all_conversations(
    groups: &dyn GroupRepo,
    repo: &dyn ConversationRepo,
) {
    let group_id = Uuid::new_v4();
    let original_owner = Uuid::new_v4();
    let new_owner = Uuid::new_v4();
    groups.create(group_id).await.unwrap();

    repo.create(new_conversation(group_id, original_owner)).await.unwrap();
    repo.create(new_conversation(group_id, original_owner)).await.unwrap();

    repo.set_owner_for_group(group_id, new_owner).await.unwrap();

    let all = repo.list_by_group(group_id).await.unwrap();
    assert!(all.iter().all(|c| c.owner_user_id == new_owner));
}

pub async fn test_hard_delete_soft_deleted_before_cutoff(
    groups: &dyn GroupRepo,
    repo: &dyn ConversationRepo,
) {
    let group_id = Uuid::new_v4();
    let owner = Uuid::new_v4();
    groups.create(group_id).await.unwrap();
    let created = repo.create(new_conversation(group_id, owner)).await.unwrap();
    repo.soft_delete(created.id).await.unwrap();

    let cutoff = chrono::Utc::now() + chrono::Duration::seconds(1);
    let deleted = repo
        .hard_delete_soft_deleted_before(cutoff, 100, 1000)
        .await
        .unwrap();

    assert_eq!(deleted, 1);
    assert!(repo.get_by_id(created.id).await.unwrap().is_none());
}

pub async fn test_list_for_user_excludes_other_groups(
    groups: &dyn GroupRepo,
    repo: &dyn ConversationRepo,
) {
    // Membership rows are a prerequisite for list_for_user's join; this
    // suite only exercises repos, so it inserts memberships is out of
    // scope here. The service-layer tests cover the full join path.
    let group_id = Uuid::new_v4();
    groups.create(group_id).await.unwrap();

    let result = repo
        .list_for_user(Uuid::new_v4(), ListConversationsMode::All, ListParams::default())
        .await
        .unwrap();
    assert!(result.items.is_empty());
}

#[cfg(all(test, feature = "database-sqlite"))]
mod sqlite_tests {
    use super::*;
    use crate::db::{
        sqlite::{SqliteConversationRepo, SqliteGroupRepo},
        tests::harness::{create_sqlite_pool, run_sqlite_migrations},
    };

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let pool = create_sqlite_pool().await;
                run_sqlite_migrations(&pool).await;
                let groups = SqliteGroupRepo::new(pool.clone());
                let repo = SqliteConversationRepo::new(pool);
                super::$name(&groups, &repo).await;
            }
        };
    }

    sqlite_test!(test_create_and_get_roundtrip);
    sqlite_test!(test_get_by_id_not_found);
    sqlite_test!(test_list_by_group_orders_by_created_at);
    sqlite_test!(test_update_title_and_metadata);
    sqlite_test!(test_update_not_found);
    sqlite_test!(test_soft_delete_then_update_is_not_found);
    sqlite_test!(test_soft_delete_twice_is_not_found);
    sqlite_test!(test_set_owner_for_group_updates_all_conversations);
    sqlite_test!(test_hard_delete_soft_deleted_before_cutoff);
    sqlite_test!(test_list_for_user_excludes_other_groups);
}

#[cfg(all(test, feature = "database-postgres"))]
mod postgres_tests {
    use super::*;
    use crate::db::{
        postgres::{PostgresConversationRepo, PostgresGroupRepo},
        tests::harness::postgres::{create_isolated_postgres_pool, run_postgres_migrations},
    };

    macro_rules! postgres_test {
        ($name:ident) => {
            #[tokio::test]
            #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
            async fn $name() {
                let pool = create_isolated_postgres_pool().await;
                run_postgres_migrations(&pool).await;
                let groups = PostgresGroupRepo::new(pool.clone());
                let repo = PostgresConversationRepo::new(pool);
                super::$name(&groups, &repo).await;
            }
        };
    }

    postgres_test!(test_create_and_get_roundtrip);
    postgres_test!(test_get_by_id_not_found);
    postgres_test!(test_list_by_group_orders_by_created_at);
    postgres_test!(test_update_title_and_metadata);
    postgres_test!(test_update_not_found);
    postgres_test!(test_soft_delete_then_update_is_not_found);
    postgres_test!(test_soft_delete_twice_is_not_found);
    postgres_test!(test_set_owner_for_group_updates_all_conversations);
    postgres_test!(test_hard_delete_soft_deleted_before_cutoff);
    postgres_test!(test_list_for_user_excludes_other_groups);
}
