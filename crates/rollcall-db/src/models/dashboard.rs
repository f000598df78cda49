//! Dashboard aggregate model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Derived per-tenant statistics.
///
/// Recomputed wholly from the committed event/member/bucket sets on every
/// sync and replaced in place — never patched incrementally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Dashboard {
    pub tenant_id: Uuid,
    pub event_count: i64,
    pub member_count: i64,
    pub attendance_count: i64,
    pub points_awarded: i64,
    pub generated_at: DateTime<Utc>,
}

impl Dashboard {
    /// An empty dashboard for a tenant.
    #[must_use]
    pub fn empty(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            event_count: 0,
            member_count: 0,
            attendance_count: 0,
            points_awarded: 0,
            generated_at: Utc::now(),
        }
    }

    /// Find the dashboard for a tenant.
    pub async fn find_by_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM dashboards WHERE tenant_id = $1
            ",
        )
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Replace the tenant's dashboard with this one.
    pub async fn replace(conn: &mut PgConnection, dashboard: &Dashboard) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO dashboards (
                tenant_id, event_count, member_count, attendance_count,
                points_awarded, generated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id) DO UPDATE
            SET event_count = EXCLUDED.event_count,
                member_count = EXCLUDED.member_count,
                attendance_count = EXCLUDED.attendance_count,
                points_awarded = EXCLUDED.points_awarded,
                generated_at = EXCLUDED.generated_at
            ",
        )
        .bind(dashboard.tenant_id)
        .bind(dashboard.event_count)
        .bind(dashboard.member_count)
        .bind(dashboard.attendance_count)
        .bind(dashboard.points_awarded)
        .bind(dashboard.generated_at)
        .execute(conn)
        .await?;

        Ok(())
    }
}
