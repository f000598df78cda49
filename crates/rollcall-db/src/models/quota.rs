//! Quota record model: per-tenant remaining-operation counters.

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Per-tenant remaining counters. None may ever go negative; the guarded
/// UPDATE in [`QuotaRecord::apply_delta`] and the table CHECK constraints
/// both enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuotaRecord {
    pub tenant_id: Uuid,
    pub events_remaining: i64,
    pub folders_remaining: i64,
    pub members_remaining: i64,
    pub operations_remaining: i64,
}

impl QuotaRecord {
    /// Create the quota record for a tenant.
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        events: i64,
        folders: i64,
        members: i64,
        operations: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO quota_records (
                tenant_id, events_remaining, folders_remaining,
                members_remaining, operations_remaining
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(tenant_id)
        .bind(events)
        .bind(folders)
        .bind(members)
        .bind(operations)
        .fetch_one(pool)
        .await
    }

    /// Find the quota record for a tenant.
    pub async fn find_by_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM quota_records WHERE tenant_id = $1
            ",
        )
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Conditionally apply a signed delta to every counter at once.
    ///
    /// The UPDATE matches only when every resulting counter stays >= 0, so
    /// the apply is atomic: all counters move or none do. Returns whether a
    /// row matched (i.e. the record existed and the guard passed).
    pub async fn apply_delta(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        events: i64,
        folders: i64,
        members: i64,
        operations: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE quota_records
            SET events_remaining = events_remaining + $2,
                folders_remaining = folders_remaining + $3,
                members_remaining = members_remaining + $4,
                operations_remaining = operations_remaining + $5
            WHERE tenant_id = $1
              AND events_remaining + $2 >= 0
              AND folders_remaining + $3 >= 0
              AND members_remaining + $4 >= 0
              AND operations_remaining + $5 >= 0
            ",
        )
        .bind(tenant_id)
        .bind(events)
        .bind(folders)
        .bind(members)
        .bind(operations)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Whether the given signed delta would keep every counter >= 0.
    #[must_use]
    pub fn allows(&self, events: i64, folders: i64, members: i64, operations: i64) -> bool {
        self.events_remaining + events >= 0
            && self.folders_remaining + folders >= 0
            && self.members_remaining + members >= 0
            && self.operations_remaining + operations >= 0
    }
}
