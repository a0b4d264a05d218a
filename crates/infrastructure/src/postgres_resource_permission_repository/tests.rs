use chrono::{DateTime, Utc};
use grantry_application::{
    ActorGrant, GetResourcesPermissionsQuery, ResourcePermissionRepository,
    ResourcePermissionsQuery, SetActorPermissionsInput, SetInstancePermissionsInput,
};
use grantry_core::OrgId;
use grantry_domain::{ActionSet, ActorRef, BuiltinRole, ResourceInstance, TeamId, UserId};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresResourcePermissionRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(4)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres resource permission tests: {error}");
    }

    Some(pool)
}

/// Every test runs in its own organization so that a shared database stays usable.
fn fresh_org() -> OrgId {
    let (high, _) = Uuid::new_v4().as_u64_pair();
    let value = i64::try_from(high >> 1).unwrap_or(i64::MAX).max(1);
    OrgId::new(value).unwrap_or_else(|_| unreachable!())
}

fn user(value: i64) -> ActorRef {
    ActorRef::User(UserId::new(value).unwrap_or_else(|_| unreachable!()))
}

fn team(value: i64) -> ActorRef {
    ActorRef::Team(TeamId::new(value).unwrap_or_else(|_| unreachable!()))
}

fn set_input(actor: ActorRef, actions: &[&str], resource_id: &str) -> SetActorPermissionsInput {
    SetActorPermissionsInput {
        actor,
        instance: ResourceInstance::new("datasources", resource_id)
            .unwrap_or_else(|_| unreachable!()),
        actions: ActionSet::new(actions.iter().copied()).unwrap_or_else(|_| unreachable!()),
    }
}

fn query(actions: &[&str], resource_ids: &[&str]) -> ResourcePermissionsQuery {
    ResourcePermissionsQuery::from_query(GetResourcesPermissionsQuery {
        actions: actions.iter().map(|action| (*action).to_owned()).collect(),
        resource: "datasources".to_owned(),
        resource_ids: resource_ids.iter().map(|id| (*id).to_owned()).collect(),
    })
    .unwrap_or_else(|_| unreachable!())
}

async fn stored_rows(pool: &PgPool, role_id: i64) -> Vec<(i64, String, DateTime<Utc>)> {
    let rows = sqlx::query_as::<_, (i64, String, DateTime<Utc>)>(
        r#"
        SELECT id, action, updated_at
        FROM managed_permissions
        WHERE role_id = $1
        ORDER BY id
        "#,
    )
    .bind(role_id)
    .fetch_all(pool)
    .await;
    assert!(rows.is_ok());
    rows.unwrap_or_default()
}

#[tokio::test]
async fn set_then_get_round_trips_actions_and_scope() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresResourcePermissionRepository::new(pool);
    let org_id = fresh_org();

    let added = repository
        .set_actor_permissions(org_id, set_input(user(1), &["datasources:query"], "1"))
        .await;
    assert!(added.is_ok());
    let added = added.ok().flatten();
    assert!(added.is_some());
    let added = added.unwrap_or_else(|| unreachable!());
    assert_eq!(added.scope, "datasources:id:1");
    assert_eq!(added.role_name, "managed:users:1:datasources");

    let listed = repository
        .list_resources_permissions(org_id, query(&[], &["1"]))
        .await;
    assert!(listed.is_ok());
    let listed = listed.unwrap_or_default();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].actions.to_vec(), vec!["datasources:query".to_owned()]);
    assert_eq!(listed[0].resource_id, "1");
    assert_eq!(listed[0].actor, user(1));
}

#[tokio::test]
async fn repeated_set_causes_no_row_churn() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresResourcePermissionRepository::new(pool.clone());
    let org_id = fresh_org();
    let input = set_input(team(4), &["datasources:query", "datasources:write"], "1");

    let first = repository.set_actor_permissions(org_id, input.clone()).await;
    assert!(first.is_ok());
    let first = first.ok().flatten().unwrap_or_else(|| unreachable!());
    let rows_before = stored_rows(&pool, first.role_id).await;

    let second = repository.set_actor_permissions(org_id, input).await;
    assert!(second.is_ok());
    let second = second.ok().flatten().unwrap_or_else(|| unreachable!());
    let rows_after = stored_rows(&pool, second.role_id).await;

    assert_eq!(first.role_id, second.role_id);
    assert_eq!(first.actions, second.actions);
    assert_eq!(rows_before.len(), 2);
    assert_eq!(rows_before, rows_after);
}

#[tokio::test]
async fn empty_action_list_revokes_grants() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresResourcePermissionRepository::new(pool);
    let org_id = fresh_org();

    let seeded = repository
        .set_actor_permissions(org_id, set_input(user(1), &["datasources:query"], "1"))
        .await;
    assert!(seeded.is_ok());

    let revoked = repository
        .set_actor_permissions(org_id, set_input(user(1), &[], "1"))
        .await;
    assert!(matches!(revoked, Ok(None)));

    let listed = repository
        .list_resources_permissions(org_id, query(&[], &["1"]))
        .await;
    assert!(listed.is_ok());
    assert!(listed.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn incremental_grant_keeps_existing_row() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresResourcePermissionRepository::new(pool.clone());
    let org_id = fresh_org();

    let seeded = repository
        .set_actor_permissions(
            org_id,
            set_input(ActorRef::BuiltinRole(BuiltinRole::Viewer), &["datasources:write"], "1"),
        )
        .await;
    let seeded = seeded.ok().flatten().unwrap_or_else(|| unreachable!());
    let seeded_rows = stored_rows(&pool, seeded.role_id).await;

    let updated = repository
        .set_actor_permissions(
            org_id,
            set_input(
                ActorRef::BuiltinRole(BuiltinRole::Viewer),
                &["datasources:query", "datasources:write"],
                "1",
            ),
        )
        .await;
    let updated = updated.ok().flatten().unwrap_or_else(|| unreachable!());
    let updated_rows = stored_rows(&pool, updated.role_id).await;

    assert_eq!(updated.actions.len(), 2);
    assert_eq!(updated_rows.len(), 2);
    let write_row = updated_rows
        .iter()
        .find(|(_, action, _)| action == "datasources:write");
    assert_eq!(write_row, seeded_rows.first());
}

#[tokio::test]
async fn actors_on_same_instance_are_isolated() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresResourcePermissionRepository::new(pool);
    let org_id = fresh_org();

    let user_grant = repository
        .set_actor_permissions(org_id, set_input(user(9), &["datasources:query"], "1"))
        .await;
    assert!(user_grant.is_ok());
    let team_grant = repository
        .set_actor_permissions(org_id, set_input(team(9), &["datasources:write"], "1"))
        .await;
    assert!(team_grant.is_ok());

    let team_revoked = repository
        .set_actor_permissions(org_id, set_input(team(9), &[], "1"))
        .await;
    assert!(matches!(team_revoked, Ok(None)));

    let listed = repository
        .list_resources_permissions(org_id, query(&[], &["1"]))
        .await
        .unwrap_or_default();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].actor, user(9));
    assert_eq!(listed[0].actions.to_vec(), vec!["datasources:query".to_owned()]);
}

#[tokio::test]
async fn bulk_query_returns_one_record_per_actor_and_instance() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresResourcePermissionRepository::new(pool);
    let org_id = fresh_org();
    let resource_ids = ["1", "2"];
    let user_count = 3;

    for resource_id in resource_ids {
        for user_id in 1..=user_count {
            let result = repository
                .set_actor_permissions(
                    org_id,
                    set_input(user(user_id), &["datasources:query"], resource_id),
                )
                .await;
            assert!(result.is_ok());
        }
    }

    let listed = repository
        .list_resources_permissions(org_id, query(&["datasources:query"], &resource_ids))
        .await;
    assert!(listed.is_ok());
    assert_eq!(listed.unwrap_or_default().len(), 6);

    let other_org = repository
        .list_resources_permissions(fresh_org(), query(&[], &resource_ids))
        .await;
    assert!(other_org.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn action_filter_requires_superset_but_returns_full_set() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresResourcePermissionRepository::new(pool);
    let org_id = fresh_org();

    let full = repository
        .set_actor_permissions(
            org_id,
            set_input(user(1), &["datasources:query", "datasources:write"], "1"),
        )
        .await;
    assert!(full.is_ok());
    let partial = repository
        .set_actor_permissions(org_id, set_input(user(2), &["datasources:write"], "1"))
        .await;
    assert!(partial.is_ok());

    let listed = repository
        .list_resources_permissions(org_id, query(&["datasources:query"], &["1"]))
        .await
        .unwrap_or_default();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].actor, user(1));
    assert_eq!(listed[0].actions.len(), 2);
}

#[tokio::test]
async fn concurrent_sets_on_same_tuple_keep_one_desired_list() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresResourcePermissionRepository::new(pool);
    let org_id = fresh_org();
    let left = ["datasources:query", "datasources:read"];
    let right = ["datasources:write"];

    for _ in 0..5 {
        let (left_result, right_result) = tokio::join!(
            repository.set_actor_permissions(org_id, set_input(user(5), &left, "1")),
            repository.set_actor_permissions(org_id, set_input(user(5), &right, "1")),
        );
        assert!(left_result.is_ok());
        assert!(right_result.is_ok());

        let listed = repository
            .list_resources_permissions(org_id, query(&[], &["1"]))
            .await
            .unwrap_or_default();
        assert_eq!(listed.len(), 1);

        let stored = listed[0].actions.clone();
        let left_set = ActionSet::new(left).unwrap_or_default();
        let right_set = ActionSet::new(right).unwrap_or_default();
        assert!(stored == left_set || stored == right_set);
    }
}

#[tokio::test]
async fn concurrent_first_grants_share_one_managed_role() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresResourcePermissionRepository::new(pool.clone());
    let org_id = fresh_org();

    let (first, second) = tokio::join!(
        repository.set_actor_permissions(org_id, set_input(team(11), &["datasources:query"], "1")),
        repository.set_actor_permissions(org_id, set_input(team(11), &["datasources:query"], "2")),
    );
    let first = first.ok().flatten().unwrap_or_else(|| unreachable!());
    let second = second.ok().flatten().unwrap_or_else(|| unreachable!());
    assert_eq!(first.role_id, second.role_id);

    let role_count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM managed_roles
        WHERE org_id = $1
        "#,
    )
    .bind(org_id.as_i64())
    .fetch_one(&pool)
    .await;
    assert_eq!(role_count.ok(), Some(1));
}

#[tokio::test]
async fn batch_set_applies_all_actors_atomically() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresResourcePermissionRepository::new(pool);
    let org_id = fresh_org();
    let instance = ResourceInstance::new("datasources", "3").unwrap_or_else(|_| unreachable!());

    let seeded = repository
        .set_actor_permissions(org_id, set_input(team(2), &["datasources:query"], "3"))
        .await;
    assert!(seeded.is_ok());

    let applied = repository
        .set_instance_permissions(
            org_id,
            SetInstancePermissionsInput {
                instance,
                grants: vec![
                    ActorGrant {
                        actor: user(1),
                        actions: ActionSet::new(["datasources:query", "datasources:write"])
                            .unwrap_or_default(),
                    },
                    ActorGrant {
                        actor: team(2),
                        actions: ActionSet::default(),
                    },
                    ActorGrant {
                        actor: ActorRef::BuiltinRole(BuiltinRole::Editor),
                        actions: ActionSet::new(["datasources:query"]).unwrap_or_default(),
                    },
                ],
            },
        )
        .await;
    assert!(applied.is_ok());
    assert_eq!(applied.unwrap_or_default().len(), 2);

    let listed = repository
        .list_resources_permissions(org_id, query(&[], &["3"]))
        .await
        .unwrap_or_default();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|permission| permission.actor != team(2)));
}

/// Holds the (role, scope) lock taken by reconciliation on a separate connection.
async fn hold_scope_lock(
    pool: &PgPool,
    role_id: i64,
    scope: &str,
) -> sqlx::Transaction<'static, sqlx::Postgres> {
    let transaction = pool.begin().await;
    assert!(transaction.is_ok());
    let mut transaction = transaction.unwrap_or_else(|_| unreachable!());

    let locked = sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($2, $1))")
        .bind(role_id)
        .bind(scope)
        .execute(&mut *transaction)
        .await;
    assert!(locked.is_ok());

    transaction
}

#[tokio::test]
async fn cancelled_batch_rolls_back_earlier_entries() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresResourcePermissionRepository::new(pool.clone());
    let org_id = fresh_org();

    let seeded_user = repository
        .set_actor_permissions(org_id, set_input(user(1), &["datasources:query"], "9"))
        .await;
    assert!(seeded_user.is_ok());
    let seeded_team = repository
        .set_actor_permissions(org_id, set_input(team(2), &["datasources:query"], "9"))
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| unreachable!());

    let lock = hold_scope_lock(&pool, seeded_team.role_id, "datasources:id:9").await;

    // Users sort before teams, so the user entry is written before the batch blocks.
    let batch = tokio::time::timeout(
        std::time::Duration::from_millis(500),
        repository.set_instance_permissions(
            org_id,
            SetInstancePermissionsInput {
                instance: ResourceInstance::new("datasources", "9")
                    .unwrap_or_else(|_| unreachable!()),
                grants: vec![
                    ActorGrant {
                        actor: team(2),
                        actions: ActionSet::new(["datasources:write"]).unwrap_or_default(),
                    },
                    ActorGrant {
                        actor: user(1),
                        actions: ActionSet::new(["datasources:delete"]).unwrap_or_default(),
                    },
                ],
            },
        ),
    )
    .await;
    assert!(batch.is_err());

    let released = lock.rollback().await;
    assert!(released.is_ok());

    let listed = repository
        .list_resources_permissions(org_id, query(&[], &["9"]))
        .await
        .unwrap_or_default();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|permission| {
        permission.actions.to_vec() == vec!["datasources:query".to_owned()]
    }));
}

#[tokio::test]
async fn cancelled_set_leaves_previous_grants() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresResourcePermissionRepository::new(pool.clone());
    let org_id = fresh_org();

    let seeded = repository
        .set_actor_permissions(
            org_id,
            set_input(user(4), &["datasources:query", "datasources:write"], "5"),
        )
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| unreachable!());

    let lock = hold_scope_lock(&pool, seeded.role_id, "datasources:id:5").await;

    let revoked = tokio::time::timeout(
        std::time::Duration::from_millis(300),
        repository.set_actor_permissions(org_id, set_input(user(4), &[], "5")),
    )
    .await;
    assert!(revoked.is_err());

    let released = lock.rollback().await;
    assert!(released.is_ok());

    let listed = repository
        .list_resources_permissions(org_id, query(&[], &["5"]))
        .await
        .unwrap_or_default();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].actions, seeded.actions);
}
