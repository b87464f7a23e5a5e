use crate::error::annotate;
use anyhow::{Context, Result};
use fgr_reconcile::{EdgeRow, EdgeWrite, GroupInsert, GroupRefresh, GroupRow, MembershipRow, Uid};
use fgr_runtime::{ReconcileStore, UnitOfWork};
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;

/// Postgres-backed [`ReconcileStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// One REPEATABLE READ transaction. Dropping it without `commit` rolls back.
pub struct PgWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl ReconcileStore for PgStore {
    type Work = PgWork;

    async fn begin(&self, lock_wait: Option<Duration>) -> Result<PgWork> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| annotate(e, "begin transaction"))?;

        // Must precede any other statement in the transaction.
        sqlx::query("set transaction isolation level repeatable read")
            .execute(&mut *tx)
            .await
            .map_err(|e| annotate(e, "set isolation level"))?;

        if let Some(wait) = lock_wait {
            // is_local = true: reverts at transaction end. 0ms means no limit.
            sqlx::query("select set_config('lock_timeout', $1, true)")
                .bind(lock_timeout_setting(wait))
                .execute(&mut *tx)
                .await
                .map_err(|e| annotate(e, "set lock_timeout"))?;
        }

        tracing::debug!(lock_wait_ms = ?lock_wait.map(|d| d.as_millis()), "transaction open");
        Ok(PgWork { tx })
    }
}

fn lock_timeout_setting(wait: Duration) -> String {
    format!("{}ms", wait.as_millis().max(1))
}

#[async_trait::async_trait]
impl UnitOfWork for PgWork {
    async fn edge_owners(&mut self) -> Result<Vec<Uid>> {
        let rows: Vec<(String,)> = sqlx::query_as("select distinct uid from friend order by uid")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| annotate(e, "select edge owners"))?;
        Ok(rows.into_iter().map(|(uid,)| uid).collect())
    }

    async fn registry_owners(&mut self) -> Result<Vec<Uid>> {
        let rows: Vec<(String,)> = sqlx::query_as("select uid from users order by uid")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| annotate(e, "select registered users"))?;
        Ok(rows.into_iter().map(|(uid,)| uid).collect())
    }

    async fn load_groups(&mut self) -> Result<Vec<GroupRow>> {
        let rows: Vec<(i64, String, String, bool, Option<bool>, Option<i64>)> = sqlx::query_as(
            r#"
            select id, uid, name, is_default, is_deleted, version
            from friend_group
            order by id
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| annotate(e, "select friend_group"))?;

        Ok(rows
            .into_iter()
            .map(|(id, uid, name, is_default, is_deleted, version)| GroupRow {
                id,
                uid,
                name,
                is_default,
                is_deleted,
                version,
            })
            .collect())
    }

    async fn load_memberships(&mut self) -> Result<Vec<MembershipRow>> {
        let rows: Vec<(i64, String, String, Option<bool>)> = sqlx::query_as(
            r#"
            select group_id, uid, friend_uid, is_deleted
            from friend_group_member
            order by id
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| annotate(e, "select friend_group_member"))?;

        Ok(rows
            .into_iter()
            .map(|(group_id, uid, friend_uid, is_deleted)| MembershipRow {
                group_id,
                uid,
                friend_uid,
                is_deleted,
            })
            .collect())
    }

    async fn load_edges(&mut self) -> Result<Vec<EdgeRow>> {
        // Row locks keep the apply step on exactly the rows counted here.
        let rows: Vec<(i64, String, String, Option<i64>, Option<bool>, Option<i64>)> =
            sqlx::query_as(
                r#"
                select id, uid, to_uid, friend_group_id, is_deleted, version
                from friend
                order by id
                for update
                "#,
            )
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| annotate(e, "select friend for update"))?;

        Ok(rows
            .into_iter()
            .map(|(id, uid, to_uid, friend_group_id, is_deleted, version)| EdgeRow {
                id,
                uid,
                to_uid,
                friend_group_id,
                is_deleted,
                version,
            })
            .collect())
    }

    async fn upsert_default_groups(&mut self, name: &str, rows: &[GroupInsert]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let uids: Vec<String> = rows.iter().map(|r| r.uid.clone()).collect();
        let versions: Vec<i64> = rows.iter().map(|r| r.version).collect();

        // A soft-deleted row already holding (uid, name) is resurrected in place.
        let res = sqlx::query(
            r#"
            insert into friend_group (uid, name, is_default, is_deleted, version)
            select t.uid, $1, true, false, t.version
            from unnest($2::varchar[], $3::bigint[]) as t(uid, version)
            on conflict (uid, name) do update
              set is_default = true,
                  is_deleted = false,
                  version    = excluded.version
            "#,
        )
        .bind(name)
        .bind(&uids)
        .bind(&versions)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| annotate(e, "upsert default friend_group"))?;

        Ok(res.rows_affected())
    }

    async fn refresh_default_groups(&mut self, rows: &[GroupRefresh]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.group_id).collect();
        let versions: Vec<i64> = rows.iter().map(|r| r.version).collect();

        let res = sqlx::query(
            r#"
            update friend_group g
               set is_default = true,
                   is_deleted = false,
                   version    = t.version
              from unnest($1::bigint[], $2::bigint[]) as t(id, version)
             where g.id = t.id
            "#,
        )
        .bind(&ids)
        .bind(&versions)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| annotate(e, "refresh default friend_group"))?;

        Ok(res.rows_affected())
    }

    async fn apply_edge_updates(&mut self, rows: &[EdgeWrite]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.edge_id).collect();
        let expected: Vec<i64> = rows.iter().map(|r| r.expected).collect();
        let targets: Vec<i64> = rows.iter().map(|r| r.target).collect();
        let versions: Vec<i64> = rows.iter().map(|r| r.version).collect();

        let res = sqlx::query(
            r#"
            update friend f
               set friend_group_id = t.target,
                   version         = t.version
              from unnest($1::bigint[], $2::bigint[], $3::bigint[], $4::bigint[])
                   as t(id, expected, target, version)
             where f.id = t.id
               and coalesce(f.friend_group_id, 0) = t.expected
            "#,
        )
        .bind(&ids)
        .bind(&expected)
        .bind(&targets)
        .bind(&versions)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| annotate(e, "update friend"))?;

        Ok(res.rows_affected())
    }

    async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| annotate(e, "commit"))
            .context("reconciliation transaction not committed")
    }

    async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| annotate(e, "rollback"))
    }
}
